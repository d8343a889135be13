//! Walk and prune the coordination service's hierarchical namespace.
//!
//! Patterns apply to the final path segment only. Listing always descends into every
//! child, matched or not.

use serde::Serialize;

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::output::BatchResult;
use crate::utils::pattern::{self, Pattern};
use crate::utils::shell;

pub trait CoordinationStore: Send + Sync {
    /// Names (not paths) of the direct children of `path`.
    fn children(&self, path: &str) -> Result<Vec<String>>;

    /// Delete `path` and everything beneath it.
    fn delete_recursive(&self, path: &str) -> Result<()>;
}

pub fn join(parent: &str, child: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, child)
    } else {
        format!("{}/{}", parent, child)
    }
}

pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub paths: Vec<String>,
}

pub struct CoordinationClient {
    store: Box<dyn CoordinationStore>,
}

impl CoordinationClient {
    pub fn new(store: Box<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// Every descendant of `root` whose final segment matches `pattern`, depth first.
    pub fn list_matching(&self, root: &str, pattern: Option<&Pattern>) -> Result<Vec<String>> {
        let mut result = Vec::new();
        for child in self.store.children(root)? {
            self.walk(&join(root, &child), pattern, &mut result);
        }
        Ok(result)
    }

    fn walk(&self, path: &str, pattern: Option<&Pattern>, result: &mut Vec<String>) {
        if pattern::matches(pattern, last_segment(path)) {
            result.push(path.to_string());
        }
        match self.store.children(path) {
            Ok(children) => {
                for child in children {
                    self.walk(&join(path, &child), pattern, result);
                }
            }
            // Nodes can vanish mid-walk when another client prunes concurrently.
            Err(err) => log_warn!("coord", "Cannot list {}: {}", path, err),
        }
    }

    /// Delete every subtree whose final segment matches `pattern`. Deletion errors are
    /// logged and recorded, never raised.
    pub fn delete_matching(&self, pattern: &Pattern) -> Result<BatchResult> {
        let mut result = BatchResult::new();
        let mut removed: Vec<String> = Vec::new();

        for path in self.list_matching("/", None)? {
            if !pattern.is_match(last_segment(&path)) {
                continue;
            }
            if removed.iter().any(|r| path.starts_with(&format!("{}/", r))) {
                continue;
            }

            log_status!("coord", "Deleting {}", path);
            match self.store.delete_recursive(&path) {
                Ok(()) => {
                    removed.push(path.clone());
                    result.record_deleted(path);
                }
                Err(err) => {
                    log_warn!("coord", "Ignoring failed delete of {}: {}", path, err);
                    result.record_error(path, err.to_string());
                }
            }
        }
        Ok(result)
    }
}

/// Store backed by the coordination service's command-line client, run through the
/// execution context (locally or on a coordination node).
pub struct ZkCliStore {
    ctx: ExecutionContext,
    cli: String,
    servers: String,
}

impl ZkCliStore {
    pub fn new(ctx: ExecutionContext, cli: impl Into<String>, servers: impl Into<String>) -> Self {
        Self {
            ctx,
            cli: cli.into(),
            servers: servers.into(),
        }
    }

    fn command(&self, verb: &str, path: &str) -> String {
        format!(
            "{} -server {} {} {}",
            self.cli,
            shell::quote_arg(&self.servers),
            verb,
            shell::quote_path(path)
        )
    }

    fn invoke(&self, verb: &str, path: &str) -> Result<String> {
        let output = self
            .ctx
            .probe(&self.command(verb, path))
            .map_err(|e| Error::coordination_failed(path, e.message))?;

        let combined = format!("{}\n{}", output.stdout, output.stderr);
        if !output.success || combined.contains("Node does not exist") {
            let reason = combined
                .lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("command failed")
                .to_string();
            return Err(Error::coordination_failed(path, reason));
        }
        Ok(output.stdout)
    }
}

/// Parse the bracketed child list the CLI prints last: `[a, b]`.
pub fn parse_children(output: &str) -> Option<Vec<String>> {
    let line = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('[') && l.ends_with(']'))?;
    let inner = &line[1..line.len() - 1];
    Some(
        inner
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

impl CoordinationStore for ZkCliStore {
    fn children(&self, path: &str) -> Result<Vec<String>> {
        let stdout = self.invoke("ls", path)?;
        parse_children(&stdout)
            .ok_or_else(|| Error::coordination_failed(path, "no child list in output"))
    }

    fn delete_recursive(&self, path: &str) -> Result<()> {
        self.invoke("deleteall", path).map(|_| ())
    }
}
