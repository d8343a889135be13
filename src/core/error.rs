use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationInvalidJson,
    ModeInvalid,

    TargetNotFound,
    RoleNotFound,
    InventoryGroupNotFound,

    SshIdentityFileNotFound,
    SshConnectFailed,

    RemoteCommandFailed,
    RemoteUploadFailed,

    ApiRequestFailed,
    ApiResponseInvalid,
    CoordinationFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",
            ErrorCode::ModeInvalid => "mode.invalid",

            ErrorCode::TargetNotFound => "target.not_found",
            ErrorCode::RoleNotFound => "role.not_found",
            ErrorCode::InventoryGroupNotFound => "inventory.group_not_found",

            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",
            ErrorCode::SshConnectFailed => "ssh.connect_failed",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",
            ErrorCode::RemoteUploadFailed => "remote.upload_failed",

            ErrorCode::ApiRequestFailed => "api.request_failed",
            ErrorCode::ApiResponseInvalid => "api.response_invalid",
            ErrorCode::CoordinationFailed => "coordination.failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundDetails {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequestFailedDetails {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub error: String,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            serde_json::json!({ "args": args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn invalid_mode(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(
            ErrorCode::ModeInvalid,
            format!("Invalid mode '{}'", value),
            serde_json::json!({ "value": value, "allowed": ["install", "clean"] }),
        )
        .with_hint("Use mode=install or mode=clean")
    }

    pub fn target_not_found(id: impl Into<String>, available: Vec<String>) -> Self {
        Self::not_found(ErrorCode::TargetNotFound, "Target not found", id, available)
            .with_hint("Run 'stars targets' to see available targets")
    }

    pub fn role_not_found(id: impl Into<String>, available: Vec<String>) -> Self {
        Self::not_found(ErrorCode::RoleNotFound, "Role not found", id, available)
    }

    pub fn inventory_group_not_found(id: impl Into<String>, available: Vec<String>) -> Self {
        Self::not_found(
            ErrorCode::InventoryGroupNotFound,
            "Inventory group not found",
            id,
            available,
        )
    }

    fn not_found(
        code: ErrorCode,
        message: &str,
        id: impl Into<String>,
        available: Vec<String>,
    ) -> Self {
        let details = to_details(NotFoundDetails {
            id: id.into(),
            available,
        });
        Self::new(code, message, details)
    }

    pub fn ssh_identity_file_not_found(host: impl Into<String>, identity_file: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            serde_json::json!({ "host": host.into(), "identityFile": identity_file.into() }),
        )
    }

    pub fn ssh_connect_failed(host: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::SshConnectFailed,
            "SSH connection failed",
            serde_json::json!({ "host": host.into(), "error": error.into() }),
        )
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        let message = match &details.host {
            Some(host) => format!("Command failed on {} (exit {})", host, details.exit_code),
            None => format!("Local command failed (exit {})", details.exit_code),
        };
        Self::new(ErrorCode::RemoteCommandFailed, message, to_details(details))
    }

    pub fn remote_upload_failed(
        destination: impl Into<String>,
        host: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::RemoteUploadFailed,
            "File upload failed",
            serde_json::json!({
                "destination": destination.into(),
                "host": host,
                "error": error.into(),
            }),
        )
    }

    pub fn api_request_failed(url: impl Into<String>, status: Option<u16>, error: impl Into<String>) -> Self {
        let message = match status {
            Some(status) => format!("API error: HTTP {}", status),
            None => "HTTP request failed".to_string(),
        };
        let details = to_details(ApiRequestFailedDetails {
            url: url.into(),
            status,
            error: error.into(),
        });
        Self::new(ErrorCode::ApiRequestFailed, message, details)
    }

    pub fn api_response_invalid(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ApiResponseInvalid,
            "Unexpected API response",
            serde_json::json!({ "url": url.into(), "error": error.into() }),
        )
    }

    pub fn coordination_failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::CoordinationFailed,
            "Coordination store request failed",
            serde_json::json!({ "path": path.into(), "error": error.into() }),
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let details = to_details(ConfigMissingKeyDetails {
            key: key.into(),
            path,
        });

        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            serde_json::json!({ "path": path.into(), "error": err.to_string() }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
