//! Named, host-scoped compositions of operations and sub-targets.
//!
//! Ordering is declared data: a target lists a `prelude` (run first in either mode),
//! an `install_order` and a `clean_order`. Clean order is never derived from install
//! order; a target that wants reverse teardown lists it that way.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::operation::{Mode, Operation};
use crate::topology::Role;

/// Where a target runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostScope {
    /// The controlling machine only.
    Local,
    /// Every host holding any of these roles.
    Roles(Vec<Role>),
}

impl HostScope {
    pub fn roles(roles: &[Role]) -> Self {
        HostScope::Roles(roles.to_vec())
    }

    pub fn label(&self) -> Vec<String> {
        match self {
            HostScope::Local => vec!["local".to_string()],
            HostScope::Roles(roles) => roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Op(Arc<Operation>),
    /// Another registered target, expanded in place on the same host.
    Target(String),
}

impl Step {
    pub fn op(op: Operation) -> Self {
        Step::Op(Arc::new(op))
    }

    pub fn target(name: impl Into<String>) -> Self {
        Step::Target(name.into())
    }

    pub fn label(&self) -> String {
        match self {
            Step::Op(op) => op.name().to_string(),
            Step::Target(name) => format!("@{}", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub description: String,
    pub scope: HostScope,
    pub parallel: bool,
    pub prelude: Vec<Step>,
    pub install_order: Vec<Step>,
    pub clean_order: Vec<Step>,
}

impl Target {
    pub fn new(name: impl Into<String>, scope: HostScope) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            scope,
            parallel: false,
            prelude: Vec::new(),
            install_order: Vec::new(),
            clean_order: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn prelude(mut self, steps: Vec<Step>) -> Self {
        self.prelude = steps;
        self
    }

    pub fn install_order(mut self, steps: Vec<Step>) -> Self {
        self.install_order = steps;
        self
    }

    pub fn clean_order(mut self, steps: Vec<Step>) -> Self {
        self.clean_order = steps;
        self
    }

    /// Same steps in both modes; each operation picks its own direction.
    pub fn body(self, steps: Vec<Step>) -> Self {
        let clean = steps.clone();
        self.install_order(steps).clean_order(clean)
    }

    pub fn steps(&self, mode: Mode) -> impl Iterator<Item = &Step> {
        let main = match mode {
            Mode::Install => &self.install_order,
            Mode::Clean => &self.clean_order,
        };
        self.prelude.iter().chain(main.iter())
    }

    pub fn info(&self) -> TargetInfo {
        let labels = |steps: &[Step]| steps.iter().map(Step::label).collect::<Vec<_>>();
        TargetInfo {
            name: self.name.clone(),
            kind: "target",
            description: self.description.clone(),
            hosts: self.scope.label(),
            parallel: self.parallel,
            prelude: labels(&self.prelude),
            install_order: labels(&self.install_order),
            clean_order: labels(&self.clean_order),
            stages: Vec::new(),
        }
    }
}

/// One stage of an aggregate: a target run against an explicit host scope.
#[derive(Debug, Clone)]
pub struct Stage {
    pub target: String,
    pub scope: HostScope,
}

/// Ordered multi-target run. Stage order is the same in both modes.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub name: String,
    pub description: String,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub name: String,
    pub kind: &'static str,
    pub description: String,
    pub hosts: Vec<String>,
    pub parallel: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prelude: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub install_order: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clean_order: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,
}

pub enum Entry<'a> {
    Target(&'a Target),
    Aggregate(&'a Aggregate),
}

#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<Target>,
    aggregates: Vec<Aggregate>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `target`, replacing any earlier target with the same name.
    pub fn register(&mut self, target: Target) {
        self.targets.retain(|t| t.name != target.name);
        self.targets.push(target);
    }

    pub fn register_aggregate(&mut self, aggregate: Aggregate) {
        self.aggregates.retain(|a| a.name != aggregate.name);
        self.aggregates.push(aggregate);
    }

    pub fn target(&self, name: &str) -> Result<&Target> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::target_not_found(name, self.names()))
    }

    pub fn get(&self, name: &str) -> Result<Entry<'_>> {
        if let Some(aggregate) = self.aggregates.iter().find(|a| a.name == name) {
            return Ok(Entry::Aggregate(aggregate));
        }
        self.target(name).map(Entry::Target)
    }

    pub fn names(&self) -> Vec<String> {
        self.targets
            .iter()
            .map(|t| t.name.clone())
            .chain(self.aggregates.iter().map(|a| a.name.clone()))
            .collect()
    }

    pub fn list(&self) -> Vec<TargetInfo> {
        let mut infos: Vec<TargetInfo> = self.targets.iter().map(Target::info).collect();
        infos.extend(self.aggregates.iter().map(|a| TargetInfo {
            name: a.name.clone(),
            kind: "aggregate",
            description: a.description.clone(),
            hosts: Vec::new(),
            parallel: false,
            prelude: Vec::new(),
            install_order: Vec::new(),
            clean_order: Vec::new(),
            stages: a
                .stages
                .iter()
                .map(|s| format!("{}@{}", s.target, s.scope.label().join("+")))
                .collect(),
        }));
        infos
    }

    /// Flatten `name` into the operations one host runs for `mode`, in order.
    pub fn expand(&self, name: &str, mode: Mode) -> Result<Vec<Arc<Operation>>> {
        let mut ops = Vec::new();
        let mut stack = Vec::new();
        self.expand_into(name, mode, &mut stack, &mut ops)?;
        Ok(ops)
    }

    fn expand_into(
        &self,
        name: &str,
        mode: Mode,
        stack: &mut Vec<String>,
        ops: &mut Vec<Arc<Operation>>,
    ) -> Result<()> {
        if stack.iter().any(|n| n == name) {
            stack.push(name.to_string());
            return Err(Error::validation_invalid_argument(
                "target",
                format!("cycle: {}", stack.join(" -> ")),
                Some(name.to_string()),
                None,
            ));
        }

        let target = self.target(name)?;
        stack.push(name.to_string());
        for step in target.steps(mode) {
            match step {
                Step::Op(op) => ops.push(op.clone()),
                Step::Target(sub) => self.expand_into(sub, mode, stack, ops)?,
            }
        }
        stack.pop();
        Ok(())
    }
}
