//! Test doubles shared by unit tests.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::executor::Transport;
use crate::paths::InstallPaths;
use crate::ssh::CommandOutput;
use crate::topology::{Role, Topology};

#[derive(Debug, Clone)]
pub struct Upload {
    pub host: String,
    pub path: String,
    pub content: String,
}

enum Rule {
    /// Optional host, command substring, canned output.
    Respond(Option<String>, String, CommandOutput),
    Unreachable(String),
}

/// Records every command and upload; answers from substring rules.
#[derive(Default)]
pub struct RecordingTransport {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<(String, String)>>,
    uploads: Mutex<Vec<Upload>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Commands containing `needle` succeed with `stdout`.
    pub fn respond(&self, needle: &str, stdout: &str) {
        self.rules
            .lock()
            .unwrap()
            .push(Rule::Respond(None, needle.to_string(), CommandOutput::ok(stdout)));
    }

    /// Commands containing `needle` exit with `code`.
    pub fn fail_when(&self, needle: &str, code: i32) {
        self.rules.lock().unwrap().push(Rule::Respond(
            None,
            needle.to_string(),
            CommandOutput::failed(code, format!("{} failed", needle)),
        ));
    }

    /// Commands on `host` containing `needle` exit with `code`.
    pub fn fail_on(&self, host: &str, needle: &str, code: i32) {
        self.rules.lock().unwrap().push(Rule::Respond(
            Some(host.to_string()),
            needle.to_string(),
            CommandOutput::failed(code, format!("{} failed on {}", needle, host)),
        ));
    }

    /// Every call to `host` fails at the transport level.
    pub fn unreachable(&self, host: &str) {
        self.rules
            .lock()
            .unwrap()
            .push(Rule::Unreachable(host.to_string()));
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    fn answer(&self, host: &str, command: &str) -> Result<CommandOutput> {
        for rule in self.rules.lock().unwrap().iter() {
            match rule {
                Rule::Unreachable(h) if h == host => {
                    return Err(Error::ssh_connect_failed(host, "connection refused"));
                }
                Rule::Respond(only, needle, output)
                    if only.as_deref().is_none_or(|h| h == host)
                        && command.contains(needle.as_str()) =>
                {
                    return Ok(output.clone());
                }
                _ => {}
            }
        }
        Ok(CommandOutput::ok(""))
    }
}

impl Transport for RecordingTransport {
    fn exec(&self, host: Option<&str>, _user: &str, command: &str) -> Result<CommandOutput> {
        let host = host.unwrap_or("local").to_string();
        self.calls
            .lock()
            .unwrap()
            .push((host.clone(), command.to_string()));
        self.answer(&host, command)
    }

    fn upload(
        &self,
        host: Option<&str>,
        _user: &str,
        content: &[u8],
        remote_path: &str,
    ) -> Result<CommandOutput> {
        let host = host.unwrap_or("local").to_string();
        if let Some(Rule::Unreachable(_)) = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|r| matches!(r, Rule::Unreachable(h) if *h == host))
        {
            return Err(Error::ssh_connect_failed(&host, "connection refused"));
        }
        self.uploads.lock().unwrap().push(Upload {
            host,
            path: remote_path.to_string(),
            content: String::from_utf8_lossy(content).to_string(),
        });
        Ok(CommandOutput::ok(""))
    }
}

pub fn topology() -> Topology {
    Topology::new()
        .with_hosts(Role::Head, ["h0"])
        .with_hosts(Role::Worker, ["w0", "w1"])
        .with_hosts(Role::Coordination, ["h0"])
}

/// Context rooted at the system temp dir with a small three-node topology.
pub fn context(transport: &Arc<RecordingTransport>) -> ExecutionContext {
    let transport: Arc<dyn Transport> = transport.clone();
    context_with(transport)
}

pub fn context_with(transport: Arc<dyn Transport>) -> ExecutionContext {
    let root = std::env::temp_dir();
    let paths = InstallPaths::new(&root, None).unwrap();
    ExecutionContext::new("evry", paths, topology(), transport)
}

/// Observable state of one simulated machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostState {
    pub packages: BTreeSet<String>,
    pub files: BTreeMap<String, String>,
    pub dirs: BTreeSet<String>,
    pub owners: BTreeMap<String, String>,
}

impl HostState {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path) || self.dirs.contains(path)
    }

    fn remove_tree(&mut self, path: &str) {
        let nested = format!("{}/", path.trim_end_matches('/'));
        let under = |p: &String| p == path || p.starts_with(&nested);
        self.files.retain(|p, _| !under(p));
        self.dirs.retain(|p| !under(p));
        self.owners.retain(|p, _| !under(p));
    }
}

/// Transport that interprets the small command vocabulary the operations emit
/// (`mkdir`, `chown`, `cp`, `mv`, `rm`, `touch`, `sha256sum`, guarded `yum` and
/// `if [ -f ]` forms) against in-memory per-host state.
#[derive(Default)]
pub struct SimulatedHosts {
    hosts: Mutex<BTreeMap<String, HostState>>,
}

impl SimulatedHosts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self, host: &str) -> HostState {
        self.hosts.lock().unwrap().get(host).cloned().unwrap_or_default()
    }

    pub fn seed_file(&self, host: &str, path: &str, content: &str) {
        let mut hosts = self.hosts.lock().unwrap();
        let state = hosts.entry(host.to_string()).or_default();
        state.files.insert(path.to_string(), content.to_string());
    }

    pub fn seed_package(&self, host: &str, package: &str) {
        let mut hosts = self.hosts.lock().unwrap();
        let state = hosts.entry(host.to_string()).or_default();
        state.packages.insert(package.to_string());
    }
}

/// Split a command line into words. Single and double quotes group, `\x` escapes,
/// and an unquoted `;` is a word of its own.
fn words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '"' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                    current.push(q);
                }
            }
            '\\' => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ';' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
                words.push(";".to_string());
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

fn statements(words: &[String]) -> Vec<&[String]> {
    words
        .split(|w| w == ";")
        .filter(|s| !s.is_empty())
        .collect()
}

fn status(ok: bool, what: &str) -> CommandOutput {
    if ok {
        CommandOutput::ok("")
    } else {
        CommandOutput::failed(1, format!("{}: failed", what))
    }
}

fn simulate(state: &mut HostState, user: &str, words: &[String]) -> CommandOutput {
    let w: Vec<&str> = words.iter().map(String::as_str).collect();
    match w.as_slice() {
        ["sudo", "-n", "sh", "-c", inner] => run_line(state, "root", inner),
        ["sudo", "-n", rest @ ..] => simulate(state, "root", &words[words.len() - rest.len()..]),
        ["if", "[", ..] => run_if(state, user, words),
        ["mkdir", "-p", path] => {
            state.dirs.insert(path.to_string());
            CommandOutput::ok("")
        }
        ["chown", owner, path] => {
            let exists = state.exists(path);
            if exists {
                state.owners.insert(path.to_string(), owner.to_string());
            }
            status(exists, "chown")
        }
        ["touch", path] => {
            state.files.entry(path.to_string()).or_default();
            CommandOutput::ok("")
        }
        ["rm", "-rf", path] => {
            state.remove_tree(path);
            CommandOutput::ok("")
        }
        ["rm", "-f", path] => {
            state.files.remove(*path);
            state.owners.remove(*path);
            CommandOutput::ok("")
        }
        ["cp", source, dest] => match state.files.get(*source).cloned() {
            Some(content) => {
                state.files.insert(dest.to_string(), content);
                CommandOutput::ok("")
            }
            None => status(false, "cp"),
        },
        ["mv", source, dest] => match state.files.remove(*source) {
            Some(content) => {
                state.owners.remove(*source);
                state.files.insert(dest.to_string(), content);
                CommandOutput::ok("")
            }
            None => status(false, "mv"),
        },
        ["sha256sum", path, ..] => match state.files.get(*path) {
            Some(content) => {
                let digest = Sha256::digest(content.as_bytes());
                CommandOutput::ok(format!("{:x}  {}\n", digest, path))
            }
            None => status(false, "sha256sum"),
        },
        ["yum", "install", "--assumeyes", "--quiet", package] => {
            state.packages.insert(package.to_string());
            CommandOutput::ok("")
        }
        ["yum", "remove", "--assumeyes", "--quiet", package] => {
            state.packages.remove(*package);
            CommandOutput::ok("")
        }
        _ => CommandOutput::failed(127, format!("{}: command not found", words.join(" "))),
    }
}

fn run_line(state: &mut HostState, user: &str, line: &str) -> CommandOutput {
    let words = words(line);
    if words.first().map(String::as_str) == Some("if") {
        return simulate(state, user, &words);
    }
    let mut last = CommandOutput::ok("");
    for statement in statements(&words) {
        last = simulate(state, user, statement);
        if !last.success {
            break;
        }
    }
    last
}

/// `if [ <test> ]; then <body>; fi`
fn run_if(state: &mut HostState, user: &str, words: &[String]) -> CommandOutput {
    let close = words.iter().position(|w| w == "]");
    let then = words.iter().position(|w| w == "then");
    let fi = words.iter().rposition(|w| w == "fi");
    let (Some(close), Some(then), Some(fi)) = (close, then, fi) else {
        return CommandOutput::failed(2, "syntax error");
    };

    let test: Vec<&str> = words[2..close].iter().map(String::as_str).collect();
    let holds = match test.as_slice() {
        ["!", "-f", path] => !state.files.contains_key(*path),
        ["-f", path] => state.files.contains_key(*path),
        [query, op, "0"] => {
            let Some(pattern) = query
                .strip_prefix("$(rpm -qa | grep -c ")
                .and_then(|q| q.strip_suffix(')'))
            else {
                return CommandOutput::failed(2, "unsupported test");
            };
            let count = state.packages.iter().filter(|p| p.contains(pattern)).count();
            match *op {
                "-eq" => count == 0,
                "-gt" => count > 0,
                _ => return CommandOutput::failed(2, "unsupported test"),
            }
        }
        _ => return CommandOutput::failed(2, "unsupported test"),
    };

    if !holds {
        return CommandOutput::ok("");
    }
    let mut last = CommandOutput::ok("");
    for statement in statements(&words[then + 1..fi]) {
        last = simulate(state, user, statement);
        if !last.success {
            break;
        }
    }
    last
}

impl Transport for SimulatedHosts {
    fn exec(&self, host: Option<&str>, user: &str, command: &str) -> Result<CommandOutput> {
        let host = host.unwrap_or("local").to_string();
        let mut hosts = self.hosts.lock().unwrap();
        let state = hosts.entry(host).or_default();
        Ok(run_line(state, user, command))
    }

    fn upload(
        &self,
        host: Option<&str>,
        _user: &str,
        content: &[u8],
        remote_path: &str,
    ) -> Result<CommandOutput> {
        let host = host.unwrap_or("local").to_string();
        let mut hosts = self.hosts.lock().unwrap();
        hosts.entry(host).or_default().files.insert(
            remote_path.to_string(),
            String::from_utf8_lossy(content).to_string(),
        );
        Ok(CommandOutput::ok(""))
    }
}
