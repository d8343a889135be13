//! Long-running service registry client (Marathon-style REST API).
//!
//! Bulk operations keep going past individual failures: every failure is logged and
//! recorded in the returned [`BatchResult`].

use heck::{ToLowerCamelCase, ToSnakeCase};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::core::http::ApiClient;
use crate::error::{Error, Result};
use crate::output::BatchResult;
use crate::utils::io;
use crate::utils::pattern::{self, Pattern};

/// A registered service: its identifier plus the registry's full record.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: String,
    pub definition: Value,
}

/// Recursively convert object keys to snake_case, descending into arrays.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_snake_case(), normalize_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Inverse of [`normalize_keys`]: the registry API expects camelCase keys.
pub fn wire_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lower_camel_case(), wire_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(wire_keys).collect()),
        other => other,
    }
}

/// Prepare a definition document for submission: normalized keys, empty task list.
pub fn prepare_definition(document: Value) -> Result<(String, Value)> {
    let id = document
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::validation_invalid_argument("id", "service definition has no string 'id'", None, None)
        })?;

    let mut definition = normalize_keys(document);
    if let Value::Object(map) = &mut definition {
        map.insert("tasks".to_string(), Value::Array(Vec::new()));
    }
    Ok((id, definition))
}

/// Definition files in `dir`, sorted by name.
pub fn definition_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::validation_invalid_argument(
            "registry",
            "not a directory",
            Some(dir.display().to_string()),
            None,
        ));
    }
    let pattern = dir.join("*.json").display().to_string();
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| Error::internal_unexpected(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort();
    Ok(files)
}

pub trait ServiceRegistry: Send + Sync {
    fn list_services(&self) -> Result<Vec<Service>>;

    fn delete_service(&self, id: &str) -> Result<()>;

    fn create_service(&self, id: &str, definition: &Value) -> Result<()>;

    /// Delete every service whose id matches `pattern` (all when `None`).
    fn delete_services(&self, pattern: Option<&Pattern>) -> Result<BatchResult> {
        let mut result = BatchResult::new();
        for service in self.list_services()? {
            if !pattern::matches(pattern, &service.id) {
                log_status!(
                    "services",
                    "Ignoring {}: does not match {}",
                    service.id,
                    pattern.map(Pattern::as_str).unwrap_or("")
                );
                result.record_skipped(service.id);
                continue;
            }

            log_status!("services", "Deleting {}", service.id);
            match self.delete_service(&service.id) {
                Ok(()) => result.record_deleted(service.id),
                Err(err) => {
                    log_warn!("services", "Unable to delete {}: {}", service.id, err);
                    result.record_error(service.id, err.to_string());
                }
            }
        }
        Ok(result)
    }

    /// Create a service from every `*.json` definition in `dir`.
    fn register_services(&self, dir: &Path) -> Result<BatchResult> {
        let mut result = BatchResult::new();
        for file in definition_files(dir)? {
            let label = file.display().to_string();
            let prepared = io::read_json::<Value>(&file, "read service definition")
                .and_then(prepare_definition);

            let (id, definition) = match prepared {
                Ok(prepared) => prepared,
                Err(err) => {
                    log_warn!("services", "Skipping {}: {}", label, err);
                    result.record_error(label, err.to_string());
                    continue;
                }
            };

            log_status!("services", "Creating {}", id);
            match self.create_service(&id, &definition) {
                Ok(()) => result.record_created(id),
                Err(err) => {
                    log_warn!("services", "Unable to create {}: {}", id, err);
                    result.record_error(id, err.to_string());
                }
            }
        }
        Ok(result)
    }
}

pub struct ServiceClient {
    api: ApiClient,
}

impl ServiceClient {
    pub fn new(endpoints: &[String]) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new("endpoints.services", endpoints)?,
        })
    }
}

fn app_path(id: &str) -> String {
    format!("/v2/apps/{}", id.trim_start_matches('/'))
}

impl ServiceRegistry for ServiceClient {
    fn list_services(&self) -> Result<Vec<Service>> {
        let response = self.api.get("/v2/apps")?;
        let apps = response
            .get("apps")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::api_response_invalid("/v2/apps", "missing 'apps' array"))?;

        Ok(apps
            .iter()
            .filter_map(|app| {
                let id = app.get("id").and_then(Value::as_str)?;
                Some(Service {
                    id: id.to_string(),
                    definition: app.clone(),
                })
            })
            .collect())
    }

    fn delete_service(&self, id: &str) -> Result<()> {
        self.api
            .delete(&format!("{}?force=true", app_path(id)))
            .map(|_| ())
    }

    fn create_service(&self, _id: &str, definition: &Value) -> Result<()> {
        self.api
            .post("/v2/apps", &wire_keys(definition.clone()))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryRegistry {
        services: Mutex<Vec<Service>>,
        fail_on: Option<String>,
    }

    impl MemoryRegistry {
        fn with(ids: &[&str]) -> Self {
            let services = ids
                .iter()
                .map(|id| Service {
                    id: id.to_string(),
                    definition: json!({ "id": id }),
                })
                .collect();
            Self {
                services: Mutex::new(services),
                fail_on: None,
            }
        }

        fn ids(&self) -> Vec<String> {
            self.services.lock().unwrap().iter().map(|s| s.id.clone()).collect()
        }
    }

    impl ServiceRegistry for MemoryRegistry {
        fn list_services(&self) -> Result<Vec<Service>> {
            Ok(self.services.lock().unwrap().clone())
        }

        fn delete_service(&self, id: &str) -> Result<()> {
            if self.fail_on.as_deref() == Some(id) {
                return Err(Error::api_request_failed(app_path(id), Some(409), "locked"));
            }
            self.services.lock().unwrap().retain(|s| s.id != id);
            Ok(())
        }

        fn create_service(&self, id: &str, definition: &Value) -> Result<()> {
            if self.fail_on.as_deref() == Some(id) {
                return Err(Error::api_request_failed("/v2/apps", Some(409), "exists"));
            }
            self.services.lock().unwrap().push(Service {
                id: id.to_string(),
                definition: definition.clone(),
            });
            Ok(())
        }
    }

    #[test]
    fn normalizes_nested_keys() {
        let normalized = normalize_keys(json!({
            "id": "/web",
            "listenerUrl": "http://h0",
            "container": { "dockerImage": "nginx", "portMappings": [{ "containerPort": 80 }] }
        }));
        assert_eq!(normalized["listener_url"], "http://h0");
        assert_eq!(normalized["container"]["docker_image"], "nginx");
        assert_eq!(normalized["container"]["port_mappings"][0]["container_port"], 80);
        assert_eq!(normalized["id"], "/web");
    }

    #[test]
    fn posted_definition_uses_camel_case_keys() {
        let (_, definition) = prepare_definition(json!({
            "id": "/web",
            "healthChecks": [{ "gracePeriodSeconds": 30 }],
            "container": { "docker": { "portMappings": [{ "containerPort": 80 }] } }
        }))
        .unwrap();

        let wire = wire_keys(definition);
        assert_eq!(wire["healthChecks"][0]["gracePeriodSeconds"], 30);
        assert_eq!(wire["container"]["docker"]["portMappings"][0]["containerPort"], 80);
        assert_eq!(wire["tasks"], json!([]));
        assert!(wire.get("health_checks").is_none());
    }

    #[test]
    fn prepare_sets_empty_tasks() {
        let (id, definition) = prepare_definition(json!({
            "id": "/etl-auto",
            "tasks": [{"host": "w0"}],
            "healthChecks": []
        }))
        .unwrap();
        assert_eq!(id, "/etl-auto");
        assert_eq!(definition["tasks"], json!([]));
        assert!(definition.get("health_checks").is_some());
        assert!(prepare_definition(json!({ "cmd": "x" })).is_err());
    }

    #[test]
    fn delete_matching_continues_past_failures() {
        let mut registry = MemoryRegistry::with(&["/etl-auto", "/api-auto", "/web"]);
        registry.fail_on = Some("/etl-auto".to_string());
        let pattern = Pattern::new(".*auto$").unwrap();

        let result = registry.delete_services(Some(&pattern)).unwrap();

        assert_eq!(result.errors, 1);
        assert_eq!(result.deleted, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(registry.ids(), vec!["/etl-auto", "/web"]);
    }

    #[test]
    fn delete_without_pattern_removes_everything() {
        let registry = MemoryRegistry::with(&["/a", "/b"]);
        let result = registry.delete_services(None).unwrap();
        assert_eq!(result.deleted, 2);
        assert!(registry.ids().is_empty());
    }

    #[test]
    fn register_reads_sorted_definitions_and_skips_bad_ones() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), r#"{"id":"/b","listenerUrl":"x"}"#).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"id":"/a","cpus":0.5}"#).unwrap();
        fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = MemoryRegistry::default();
        let result = registry.register_services(dir.path()).unwrap();

        assert_eq!(result.created, 2);
        assert_eq!(result.errors, 1);
        assert_eq!(registry.ids(), vec!["/a", "/b"]);
        let b = &registry.services.lock().unwrap()[1];
        assert_eq!(b.definition["listener_url"], "x");
        assert_eq!(b.definition["tasks"], json!([]));
    }

    #[test]
    fn register_missing_directory_is_an_error() {
        let registry = MemoryRegistry::default();
        assert!(registry.register_services(Path::new("/nonexistent/marathon")).is_err());
    }

    #[test]
    fn app_paths_strip_leading_slash() {
        assert_eq!(app_path("/etl-auto"), "/v2/apps/etl-auto");
        assert_eq!(app_path("group/app"), "/v2/apps/group/app");
    }
}
