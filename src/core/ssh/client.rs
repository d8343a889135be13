use crate::config::SshSettings;
use crate::error::{Error, Result};
use crate::utils::shell;
use std::io::Write;
use std::process::{Command, Stdio};

#[derive(Debug, Clone)]
pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the host is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }
}

impl SshClient {
    pub fn new(host: &str, user: &str, settings: &SshSettings) -> Result<Self> {
        let identity_file = match &settings.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(host, expanded));
                }
                Some(expanded)
            }
            _ => None,
        };

        Ok(Self {
            host: host.to_string(),
            user: user.to_string(),
            port: settings.port,
            identity_file,
            is_local: is_local_host(host),
        })
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Batch mode plus keepalives so a stalled connection surfaces as an error
        // instead of an interactive prompt.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    pub fn execute(&self, command: &str) -> CommandOutput {
        self.execute_with_retry(command, None, 3)
    }

    pub fn execute_with_stdin(&self, command: &str, stdin: &[u8]) -> CommandOutput {
        self.execute_with_retry(command, Some(stdin), 3)
    }

    /// Stream `content` into `remote_path` on the host.
    pub fn upload(&self, content: &[u8], remote_path: &str) -> CommandOutput {
        let remote_command = format!("cat > {}", shell::quote_path(remote_path));
        self.execute_with_stdin(&remote_command, content)
    }

    fn execute_with_retry(
        &self,
        command: &str,
        stdin: Option<&[u8]>,
        max_attempts: u32,
    ) -> CommandOutput {
        let backoff_secs = [0, 2, 5];
        let mut last = CommandOutput::failed(-1, "SSH retry exhausted");

        for attempt in 0..max_attempts {
            let result = self.execute_once(command, stdin);

            // Only retry on transient connection errors, not command failures
            if result.success || attempt + 1 >= max_attempts || !is_transient_ssh_error(&result) {
                return result;
            }

            let delay = backoff_secs.get(attempt as usize + 1).copied().unwrap_or(5);
            log_status!(
                "ssh",
                "{}: connection failed (attempt {}/{}), retrying in {}s...",
                self.host,
                attempt + 1,
                max_attempts,
                delay
            );
            std::thread::sleep(std::time::Duration::from_secs(delay));
            last = result;
        }

        last
    }

    fn execute_once(&self, command: &str, stdin: Option<&[u8]>) -> CommandOutput {
        if self.is_local {
            return run_with_stdin(local_shell(command), stdin);
        }

        let mut cmd = Command::new("ssh");
        cmd.args(self.build_ssh_args(command));
        run_with_stdin(cmd, stdin)
    }
}

fn local_shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

fn run_with_stdin(mut cmd: Command, stdin: Option<&[u8]>) -> CommandOutput {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return CommandOutput::failed(-1, format!("Command error: {}", e)),
    };

    if let (Some(bytes), Some(mut pipe)) = (stdin, child.stdin.take()) {
        if let Err(e) = pipe.write_all(bytes) {
            drop(pipe);
            let _ = child.kill();
            let _ = child.wait();
            return CommandOutput::failed(-1, format!("Failed to write stdin: {}", e));
        }
        // Dropping the pipe closes stdin so `cat` sees EOF.
    }

    match child.wait_with_output() {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput::failed(-1, format!("Command error: {}", e)),
    }
}

/// Run a command on the controlling machine through `sh -c`.
pub fn execute_local_command(command: &str) -> CommandOutput {
    run_with_stdin(local_shell(command), None)
}

/// Run a command locally, feeding `stdin` to it.
pub(crate) fn execute_local_command_with_stdin(command: &str, stdin: &[u8]) -> CommandOutput {
    run_with_stdin(local_shell(command), Some(stdin))
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Check if an SSH failure is a transient connection error worth retrying.
fn is_transient_ssh_error(output: &CommandOutput) -> bool {
    let stderr = output.stderr.to_lowercase();
    // SSH exit code 255 = connection error (not a remote command failure)
    let is_connection_exit = output.exit_code == 255;

    let transient_patterns = [
        "connection refused",
        "connection reset",
        "connection timed out",
        "no route to host",
        "network is unreachable",
        "temporary failure in name resolution",
        "broken pipe",
        "ssh_exchange_identification",
        "connection closed by remote host",
    ];

    is_connection_exit || transient_patterns.iter().any(|p| stderr.contains(p))
}
