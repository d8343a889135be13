use serde::Serialize;
use std::str::FromStr;

use super::inventory::InventoryHost;
use crate::config::SshSettings;
use crate::error::{Error, Result};
use crate::ssh::SshClient;
use crate::utils::shell;

/// Generic modules a fleet task can run through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    /// Arguments run through `sh -c` (pipes, redirects, variables).
    Shell,
    /// Whitespace-separated words run as one program; shell operators are literal.
    Command,
    /// Arguments sent untouched.
    Raw,
}

impl FromStr for Module {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "shell" => Ok(Module::Shell),
            "command" => Ok(Module::Command),
            "raw" => Ok(Module::Raw),
            other => Err(Error::validation_invalid_argument(
                "module",
                format!("unsupported module '{}'", other),
                Some(other.to_string()),
                Some(vec!["shell".into(), "command".into(), "raw".into()]),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FleetTask {
    pub module: String,
    pub args: String,
    pub privileged: bool,
    /// Sudo password fed on stdin for privileged tasks.
    pub password: Option<String>,
}

impl FleetTask {
    pub fn new(module: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            args: args.into(),
            privileged: false,
            password: None,
        }
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }
}

/// Command line to send for `module` with `args`.
pub fn module_command(module: Module, args: &str, privileged: bool, with_password: bool) -> String {
    let inner = match module {
        Module::Shell => shell::sh_c(args),
        Module::Command => args
            .split_whitespace()
            .map(shell::quote_arg)
            .collect::<Vec<_>>()
            .join(" "),
        Module::Raw => args.to_string(),
    };
    match (privileged, with_password) {
        (false, _) => inner,
        (true, true) => format!("sudo -S -p '' {}", inner),
        (true, false) => format!("sudo -n {}", inner),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HostResultStatus {
    Ok,
    Failed,
    Unreachable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResult {
    pub host: String,
    pub status: HostResultStatus,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl HostResult {
    pub fn failed(host: impl Into<String>, status: HostResultStatus, msg: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            status,
            changed: false,
            rc: None,
            stdout: String::new(),
            stderr: String::new(),
            msg: Some(msg.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == HostResultStatus::Ok
    }
}

/// Runs one task on one host. Implementations report every failure in the result.
pub trait AutomationBackend: Send + Sync {
    fn run(&self, host: &InventoryHost, task: &FleetTask) -> HostResult;
}

/// Backend over the system `ssh` client.
pub struct SshBackend {
    settings: SshSettings,
    default_user: String,
}

impl SshBackend {
    pub fn new(settings: SshSettings, default_user: impl Into<String>) -> Self {
        Self {
            settings,
            default_user: default_user.into(),
        }
    }
}

impl AutomationBackend for SshBackend {
    fn run(&self, host: &InventoryHost, task: &FleetTask) -> HostResult {
        let module = match task.module.parse::<Module>() {
            Ok(module) => module,
            Err(_) => {
                return HostResult::failed(
                    &host.name,
                    HostResultStatus::Failed,
                    format!("unsupported module '{}'", task.module),
                )
            }
        };

        let user = host.user.as_deref().unwrap_or(&self.default_user);
        let mut client = match SshClient::new(&host.address, user, &self.settings) {
            Ok(client) => client,
            Err(err) => {
                return HostResult::failed(&host.name, HostResultStatus::Unreachable, err.message)
            }
        };
        if let Some(port) = host.port {
            client.port = port;
        }

        let password = task.password.as_deref().filter(|_| task.privileged);
        let command = module_command(module, &task.args, task.privileged, password.is_some());
        let output = match password {
            Some(password) => client.execute_with_stdin(&command, format!("{}\n", password).as_bytes()),
            None => client.execute(&command),
        };

        // 255 is ssh's own failure status.
        let status = match (output.success, output.exit_code) {
            (true, _) => HostResultStatus::Ok,
            (false, 255) => HostResultStatus::Unreachable,
            (false, _) => HostResultStatus::Failed,
        };
        HostResult {
            host: host.name.clone(),
            status,
            changed: output.success,
            rc: Some(output.exit_code),
            msg: (!output.success).then(|| format!("non-zero return code {}", output.exit_code)),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}
