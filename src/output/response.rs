//! CLI response formatting and output.
//!
//! Provides JSON envelope, printing, and exit code mapping.

use stars::error::Hint;
use stars::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = response.to_json()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(()); // Exit gracefully on SIGPIPE
        }
        return Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        ));
    }
    Ok(())
}

pub fn print_success<T: Serialize>(data: T) -> Result<()> {
    print_response(&CliResponse::success(data))
}

pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize response".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationMissingArgument
        | ErrorCode::ValidationInvalidArgument
        | ErrorCode::ValidationInvalidJson
        | ErrorCode::ModeInvalid => 2,

        ErrorCode::TargetNotFound | ErrorCode::RoleNotFound | ErrorCode::InventoryGroupNotFound => 4,

        ErrorCode::SshIdentityFileNotFound | ErrorCode::SshConnectFailed => 10,

        ErrorCode::RemoteCommandFailed
        | ErrorCode::RemoteUploadFailed
        | ErrorCode::ApiRequestFailed
        | ErrorCode::ApiResponseInvalid
        | ErrorCode::CoordinationFailed => 20,

        ErrorCode::InternalIoError | ErrorCode::InternalJsonError | ErrorCode::InternalUnexpected => 1,
    }
}

pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    match result {
        Ok(data) => print_success(data),
        Err(err) => print_response(&CliResponse::<()>::from_error(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_exit_codes_by_family() {
        let (result, code) = map_cmd_result_to_json::<()>(Err(Error::invalid_mode("mode=purge")));
        assert!(result.is_err());
        assert_eq!(code, 2);

        let (_, code) = map_cmd_result_to_json::<()>(Err(Error::target_not_found("nope", vec![])));
        assert_eq!(code, 4);

        let (_, code) = map_cmd_result_to_json::<()>(Err(Error::coordination_failed("/a", "boom")));
        assert_eq!(code, 20);
    }

    #[test]
    fn success_keeps_command_exit_code() {
        let (result, code) = map_cmd_result_to_json(Ok((vec!["base"], 1)));
        assert_eq!(result.unwrap(), serde_json::json!(["base"]));
        assert_eq!(code, 1);
    }

    #[test]
    fn error_envelope_omits_empty_hints() {
        let response = CliResponse::<()>::from_error(&Error::coordination_failed("/a", "boom"));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "coordination.failed");
        assert_eq!(json["error"]["details"]["path"], "/a");
        assert!(json["error"].get("hints").is_none());
    }

    #[test]
    fn error_envelope_carries_hints() {
        let response = CliResponse::<()>::from_error(&Error::invalid_mode("x"));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"]["code"], "mode.invalid");
        assert_eq!(json["error"]["hints"][0]["message"], "Use mode=install or mode=clean");
    }
}
