//! Command transport - routes to local execution or SSH based on the target host.
//!
//! A [`Transport`] only moves commands and bytes. Elevation, warn-only handling and
//! error mapping live in [`crate::context::ExecutionContext`].

use std::sync::Arc;

use crate::config::SshSettings;
use crate::error::Result;
use crate::ssh::{
    execute_local_command, execute_local_command_with_stdin, CommandOutput, SshClient,
};
use crate::utils::shell;

pub trait Transport: Send + Sync {
    /// Run `command` on `host`, or on the controlling machine when `host` is `None`.
    fn exec(&self, host: Option<&str>, user: &str, command: &str) -> Result<CommandOutput>;

    /// Write `content` to `remote_path` on `host` (or locally when `host` is `None`).
    fn upload(
        &self,
        host: Option<&str>,
        user: &str,
        content: &[u8],
        remote_path: &str,
    ) -> Result<CommandOutput>;
}

/// Default transport: `sh -c` locally, `ssh` for remote hosts.
pub struct SshTransport {
    settings: SshSettings,
}

impl SshTransport {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    pub fn shared(settings: SshSettings) -> Arc<dyn Transport> {
        Arc::new(Self::new(settings))
    }
}

impl Transport for SshTransport {
    fn exec(&self, host: Option<&str>, user: &str, command: &str) -> Result<CommandOutput> {
        match host {
            None => Ok(execute_local_command(command)),
            Some(host) => Ok(SshClient::new(host, user, &self.settings)?.execute(command)),
        }
    }

    fn upload(
        &self,
        host: Option<&str>,
        user: &str,
        content: &[u8],
        remote_path: &str,
    ) -> Result<CommandOutput> {
        match host {
            None => {
                let command = format!("cat > {}", shell::quote_path(remote_path));
                Ok(execute_local_command_with_stdin(&command, content))
            }
            Some(host) => Ok(SshClient::new(host, user, &self.settings)?.upload(content, remote_path)),
        }
    }
}
