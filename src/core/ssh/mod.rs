mod client;

pub(crate) use client::execute_local_command_with_stdin;
pub use client::{execute_local_command, is_local_host, CommandOutput, SshClient};
