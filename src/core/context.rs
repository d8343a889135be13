//! Explicit execution context threaded through every operation.
//!
//! Carries who runs commands, where, with which privileges, plus the installation
//! layout and cluster topology. Scoped variants (`on_host`, `elevated`, `in_dir`,
//! `warn_only`) are cheap clones; nothing here is process-global.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::executor::Transport;
use crate::paths::InstallPaths;
use crate::ssh::CommandOutput;
use crate::topology::Topology;
use crate::utils::shell;

#[derive(Clone)]
pub struct ExecutionContext {
    user: String,
    host: Option<String>,
    privileged: bool,
    warn_only: bool,
    cwd: Option<String>,
    paths: Arc<InstallPaths>,
    topology: Arc<Topology>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("privileged", &self.privileged)
            .field("warn_only", &self.warn_only)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    pub fn new(
        user: impl Into<String>,
        paths: InstallPaths,
        topology: Topology,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            user: user.into(),
            host: None,
            privileged: false,
            warn_only: false,
            cwd: None,
            paths: Arc::new(paths),
            topology: Arc::new(topology),
            transport,
        }
    }

    pub fn from_settings(settings: &Settings, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            settings.app.user.clone(),
            settings.paths.clone(),
            settings.app.topology(),
            transport,
        )
    }

    // ------------------------------------------------------------------
    // Scoped variants
    // ------------------------------------------------------------------

    /// Target `host`; `None` targets the controlling machine.
    pub fn on_host(&self, host: Option<&str>) -> Self {
        let mut ctx = self.clone();
        ctx.host = host.map(str::to_string);
        ctx
    }

    pub fn local(&self) -> Self {
        self.on_host(None)
    }

    /// Every command issued through the returned context runs elevated.
    pub fn elevated(&self) -> Self {
        let mut ctx = self.clone();
        ctx.privileged = true;
        ctx
    }

    pub fn in_dir(&self, dir: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.cwd = Some(dir.into());
        ctx
    }

    /// Run `f` with non-zero exit statuses logged instead of raised.
    pub fn warn_only<T>(&self, f: impl FnOnce(&ExecutionContext) -> Result<T>) -> Result<T> {
        let mut ctx = self.clone();
        ctx.warn_only = true;
        f(&ctx)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn host_label(&self) -> &str {
        self.host.as_deref().unwrap_or("local")
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    pub fn is_warn_only(&self) -> bool {
        self.warn_only
    }

    pub fn paths(&self) -> &InstallPaths {
        &self.paths
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    // ------------------------------------------------------------------
    // Remote execution
    // ------------------------------------------------------------------

    /// Run as the configured user (elevated inside an `elevated()` scope).
    pub fn run(&self, command: &str) -> Result<CommandOutput> {
        self.exec(command, false)
    }

    /// Run with elevation.
    pub fn sudo(&self, command: &str) -> Result<CommandOutput> {
        self.exec(command, true)
    }

    /// Run on the controlling machine regardless of the active host.
    pub fn run_local(&self, command: &str) -> Result<CommandOutput> {
        self.local().exec(command, false)
    }

    /// Run and return the output whatever the exit status. Used for guard checks.
    pub fn probe(&self, command: &str) -> Result<CommandOutput> {
        let command = self.compose(command, false);
        self.transport
            .exec(self.host.as_deref(), &self.user, &command)
    }

    /// Write `content` to `destination` on the active host.
    ///
    /// Privileged writes go through a unique temp file that is then moved into
    /// place with elevation.
    pub fn put(&self, content: &[u8], destination: &str, privileged: bool) -> Result<()> {
        if !(privileged || self.privileged) {
            return self.upload(content, destination);
        }

        let staging = format!("/tmp/stars-{}", uuid::Uuid::new_v4());
        self.upload(content, &staging)?;
        self.sudo(&format!(
            "mv {} {}",
            shell::quote_path(&staging),
            shell::quote_path(destination)
        ))?;
        Ok(())
    }

    fn upload(&self, content: &[u8], destination: &str) -> Result<()> {
        log_status!("put", "[{}] {}", self.host_label(), destination);
        let output = self
            .transport
            .upload(self.host.as_deref(), &self.user, content, destination)?;
        if output.success {
            Ok(())
        } else {
            Err(Error::remote_upload_failed(
                destination,
                self.host.clone(),
                output.stderr,
            ))
        }
    }

    fn compose(&self, command: &str, elevate: bool) -> String {
        let command = match &self.cwd {
            Some(dir) => format!("cd {} && {}", shell::quote_path(dir), command),
            None => command.to_string(),
        };

        if elevate || self.privileged {
            format!("sudo -n {}", shell::sh_c(&command))
        } else {
            command
        }
    }

    fn exec(&self, command: &str, elevate: bool) -> Result<CommandOutput> {
        let command = self.compose(command, elevate);
        log_status!("run", "[{}] {}", self.host_label(), command);

        let output = self
            .transport
            .exec(self.host.as_deref(), &self.user, &command)?;

        if output.success {
            return Ok(output);
        }

        if self.warn_only {
            log_warn!(
                "run",
                "[{}] '{}' exited {} (continuing): {}",
                self.host_label(),
                command,
                output.exit_code,
                output.stderr.trim()
            );
            return Ok(output);
        }

        Err(Error::remote_command_failed(RemoteCommandFailedDetails {
            command,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            host: self.host.clone(),
        }))
    }
}
