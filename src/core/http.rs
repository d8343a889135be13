//! Blocking JSON client over an ordered list of equivalent endpoints.
//!
//! Connection failures fall through to the next endpoint; an HTTP error status from
//! any endpoint is final.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde_json::Value;

use crate::error::{Error, Result};

fn http_error(url: &str, e: reqwest::Error) -> Error {
    Error::api_request_failed(url, None, e.to_string())
}

fn api_error(url: &str, status: u16, body: &str) -> Error {
    Error::api_request_failed(url, Some(status), body.trim())
}

pub struct ApiClient {
    client: Client,
    endpoints: Vec<String>,
}

impl ApiClient {
    /// `key` names the configuration entry the endpoints came from, for error reporting.
    pub fn new(key: &str, endpoints: &[String]) -> Result<Self> {
        let endpoints: Vec<String> = endpoints
            .iter()
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .map(with_scheme)
            .collect();

        if endpoints.is_empty() {
            return Err(Error::config_missing_key(key, None)
                .with_hint(format!("Set '{}' in the application file", key)));
        }

        Ok(Self {
            client: Client::new(),
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, None)
    }

    pub fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, path, Some(body))
    }

    pub fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PUT, path, Some(body))
    }

    pub fn delete(&self, path: &str) -> Result<Value> {
        self.send(Method::DELETE, path, None)
    }

    fn request(&self, method: &Method, url: &str, body: Option<&Value>) -> RequestBuilder {
        let request = self.client.request(method.clone(), url);
        match body {
            Some(body) => request.json(body),
            None => request,
        }
    }

    fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut last_error = None;

        for base in &self.endpoints {
            let url = format!("{}{}", base, path);
            match self.request(&method, &url, body).send() {
                Ok(response) => return parse_json_response(&url, response),
                Err(e) => {
                    log_status!("http", "{} {} unreachable: {}", method, url, e);
                    last_error = Some(http_error(&url, e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal_unexpected("no endpoints configured")))
    }
}

fn with_scheme(endpoint: String) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint
    } else {
        format!("https://{}", endpoint)
    }
}

fn parse_json_response(url: &str, response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().map_err(|e| http_error(url, e))?;

    if !status.is_success() {
        return Err(api_error(url, status.as_u16(), &body));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(|e| Error::api_response_invalid(url, e.to_string()))
}
