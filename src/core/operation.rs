//! Idempotent, reversible unit of remote state change.
//!
//! Every operation carries both directions. `install` must converge when repeated;
//! `clean` undoes what `install` established. Actions use guard checks ("create if
//! absent", "remove if present") rather than assuming prior state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Install,
    Clean,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Install => "install",
            Mode::Clean => "clean",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    /// Accepts `install`, `clean`, or the `mode=<value>` form used on the command line.
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        let value = value.strip_prefix("mode=").unwrap_or(value);
        match value {
            "install" => Ok(Mode::Install),
            "clean" => Ok(Mode::Clean),
            _ => Err(Error::invalid_mode(s.trim())),
        }
    }
}

/// Run `install` or `clean` according to `mode`.
///
/// Returns whether the target is now in the installed state.
pub fn execute_op<I, C>(mode: Mode, install: I, clean: C) -> Result<bool>
where
    I: FnOnce() -> Result<()>,
    C: FnOnce() -> Result<()>,
{
    match mode {
        Mode::Install => {
            install()?;
            Ok(true)
        }
        Mode::Clean => {
            clean()?;
            Ok(false)
        }
    }
}

pub type Action = Arc<dyn Fn(&ExecutionContext) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct Operation {
    name: String,
    description: Option<String>,
    install: Action,
    clean: Action,
    reversible: bool,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("reversible", &self.reversible)
            .finish_non_exhaustive()
    }
}

impl Operation {
    pub fn new<I, C>(name: impl Into<String>, install: I, clean: C) -> Self
    where
        I: Fn(&ExecutionContext) -> Result<()> + Send + Sync + 'static,
        C: Fn(&ExecutionContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            install: Arc::new(install),
            clean: Arc::new(clean),
            reversible: true,
        }
    }

    pub fn builder(name: impl Into<String>) -> OperationBuilder {
        OperationBuilder {
            name: name.into(),
            description: None,
            install: None,
            clean: None,
            reversible: true,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark `clean` as best effort: it cannot fully restore pre-install state.
    pub fn irreversible(mut self) -> Self {
        self.reversible = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_reversible(&self) -> bool {
        self.reversible
    }

    /// Invoke the action selected by `mode` exactly once.
    pub fn apply(&self, ctx: &ExecutionContext, mode: Mode) -> Result<bool> {
        log_status!("op", "[{}] {} {}", ctx.host_label(), mode, self.name);
        if mode == Mode::Clean && !self.is_reversible() {
            log_warn!("op", "[{}] {} is only partially undone by clean", ctx.host_label(), self.name);
        }
        execute_op(mode, || (self.install)(ctx), || (self.clean)(ctx))
    }
}

pub struct OperationBuilder {
    name: String,
    description: Option<String>,
    install: Option<Action>,
    clean: Option<Action>,
    reversible: bool,
}

impl OperationBuilder {
    pub fn install<F>(mut self, action: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<()> + Send + Sync + 'static,
    {
        self.install = Some(Arc::new(action));
        self
    }

    pub fn clean<F>(mut self, action: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<()> + Send + Sync + 'static,
    {
        self.clean = Some(Arc::new(action));
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn irreversible(mut self) -> Self {
        self.reversible = false;
        self
    }

    /// Both actions are required.
    pub fn build(self) -> Result<Operation> {
        let missing: Vec<&str> = [("install", self.install.is_none()), ("clean", self.clean.is_none())]
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(name, _)| name)
            .collect();

        match (self.install, self.clean) {
            (Some(install), Some(clean)) => Ok(Operation {
                name: self.name,
                description: self.description,
                install,
                clean,
                reversible: self.reversible,
            }),
            _ => Err(Error::validation_invalid_argument(
                "operation",
                format!("missing {} action", missing.join(" and ")),
                Some(self.name),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{context, RecordingTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn execute_op_install_runs_install_once() {
        let (mut installs, mut cleans) = (0, 0);
        let installed = execute_op(
            Mode::Install,
            || {
                installs += 1;
                Ok(())
            },
            || {
                cleans += 1;
                Ok(())
            },
        )
        .unwrap();
        assert!(installed);
        assert_eq!((installs, cleans), (1, 0));
    }

    #[test]
    fn execute_op_clean_runs_clean_once() {
        let (mut installs, mut cleans) = (0, 0);
        let installed = execute_op(
            Mode::Clean,
            || {
                installs += 1;
                Ok(())
            },
            || {
                cleans += 1;
                Ok(())
            },
        )
        .unwrap();
        assert!(!installed);
        assert_eq!((installs, cleans), (0, 1));
    }

    #[test]
    fn execute_op_propagates_action_error() {
        let err = execute_op(
            Mode::Install,
            || Err(Error::internal_unexpected("boom")),
            || Ok(()),
        )
        .unwrap_err();
        assert_eq!(err.code.as_str(), "internal.unexpected");
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("install".parse::<Mode>().unwrap(), Mode::Install);
        assert_eq!("mode=clean".parse::<Mode>().unwrap(), Mode::Clean);
        let err = "mode=purge".parse::<Mode>().unwrap_err();
        assert_eq!(err.code.as_str(), "mode.invalid");
        assert!("".parse::<Mode>().is_err());
    }

    #[test]
    fn apply_selects_action_by_mode() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport).on_host(Some("h0"));
        let op = Operation::new(
            "quorum",
            |ctx| ctx.sudo("echo 2 > /etc/mesos-master/quorum").map(|_| ()),
            |ctx| ctx.sudo("rm -rf /etc/mesos-master/quorum").map(|_| ()),
        );

        assert!(op.apply(&ctx, Mode::Install).unwrap());
        assert!(!op.apply(&ctx, Mode::Clean).unwrap());

        let commands = transport.commands_for("h0");
        assert_eq!(commands.len(), 2);
        assert!(commands[0].contains("echo 2"));
        assert!(commands[1].contains("rm -rf"));
    }

    #[test]
    fn irreversible_clean_still_runs_clean_action() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let op = Operation::new("counted", |_| Ok(()), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .describe("counts cleans")
        .irreversible();
        assert!(!op.is_reversible());

        let transport = RecordingTransport::new();
        assert!(!op.apply(&context(&transport), Mode::Clean).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn builder_requires_both_actions() {
        let err = Operation::builder("half")
            .install(|_| Ok(()))
            .build()
            .unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
        assert_eq!(err.details["problem"], "missing clean action");

        let op = Operation::builder("status")
            .describe("memory statistics")
            .install(|ctx| ctx.run("free -h").map(|_| ()))
            .clean(|ctx| ctx.run("free -h").map(|_| ()))
            .irreversible()
            .build()
            .unwrap();
        assert!(!op.is_reversible());

        let transport = RecordingTransport::new();
        op.apply(&context(&transport), Mode::Install).unwrap();
        assert_eq!(transport.commands(), vec!["free -h"]);
    }
}
