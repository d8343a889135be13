//! Resolve a target's hosts and run its expansion on each of them.
//!
//! Parallel targets fan out one thread per host and join all before the target is
//! done. Serial targets run host by host and stop at the first failing host. Either
//! way, operations for one host run strictly in order, and a failing host never
//! affects the outcome recorded for another.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::thread;

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::jobs::{JobOutcome, JobRequest, JobRunner};
use crate::operation::{Mode, Operation};
use crate::output::BulkSummary;
use crate::target::{Entry, HostScope, Stage, TargetRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl From<&Error> for HostError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostOutcome {
    pub host: String,
    pub status: HostStatus,
    /// Operations completed on this host, in order.
    pub operations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<HostError>,
}

impl HostOutcome {
    fn skipped(host: &str) -> Self {
        Self {
            host: host.to_string(),
            status: HostStatus::Skipped,
            operations: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub target: String,
    pub parallel: bool,
    pub hosts: Vec<HostOutcome>,
    pub summary: BulkSummary,
}

impl StageReport {
    fn new(target: &str, parallel: bool, hosts: Vec<HostOutcome>) -> Self {
        let count = |status| hosts.iter().filter(|h| h.status == status).count();
        let summary = BulkSummary {
            total: hosts.len(),
            succeeded: count(HostStatus::Success),
            failed: count(HostStatus::Failed),
            skipped: count(HostStatus::Skipped),
        };
        Self {
            target: target.to_string(),
            parallel,
            hosts,
            summary,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub target: String,
    pub mode: Mode,
    pub stages: Vec<StageReport>,
    pub summary: BulkSummary,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn host(&self, host: &str) -> Option<&HostOutcome> {
        self.stages
            .iter()
            .flat_map(|s| s.hosts.iter())
            .find(|h| h.host == host)
    }
}

/// A stage whose operations were expanded up front, before any host is touched.
struct Plan {
    target: String,
    parallel: bool,
    hosts: Vec<Option<String>>,
    ops: Arc<Vec<Arc<Operation>>>,
}

pub struct Dispatcher {
    ctx: ExecutionContext,
    registry: TargetRegistry,
    jobs: Box<dyn JobRunner>,
}

impl Dispatcher {
    pub fn new(ctx: ExecutionContext, registry: TargetRegistry, jobs: Box<dyn JobRunner>) -> Self {
        Self {
            ctx,
            registry,
            jobs,
        }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// `None` is the controlling machine.
    pub fn resolve_hosts(&self, scope: &HostScope) -> Vec<Option<String>> {
        match scope {
            HostScope::Local => vec![None],
            HostScope::Roles(roles) => self
                .ctx
                .topology()
                .hosts_for(roles)
                .into_iter()
                .map(Some)
                .collect(),
        }
    }

    /// Run `name` in `mode`.
    ///
    /// Unknown targets and malformed compositions fail before any remote action.
    /// Host failures are reported in the returned report, not raised.
    pub fn dispatch(&self, name: &str, mode: Mode) -> Result<DispatchReport> {
        let plans = match self.registry.get(name)? {
            Entry::Target(target) => vec![self.plan(&target.name, &target.scope, target.parallel, mode)?],
            Entry::Aggregate(aggregate) => aggregate
                .stages
                .iter()
                .map(|Stage { target, scope }| {
                    let parallel = self.registry.target(target)?.parallel;
                    self.plan(target, scope, parallel, mode)
                })
                .collect::<Result<Vec<_>>>()?,
        };

        log_status!("dispatch", "{} {} ({} stage(s))", mode, name, plans.len());

        let mut stages = Vec::with_capacity(plans.len());
        let mut halted = false;
        for plan in plans {
            let stage = if halted {
                let hosts = plan.hosts.iter().map(|h| HostOutcome::skipped(label(h))).collect();
                StageReport::new(&plan.target, plan.parallel, hosts)
            } else {
                self.run_stage(plan, mode)
            };
            halted = halted || stage.summary.failed > 0;
            stages.push(stage);
        }

        let summary = stages.iter().fold(BulkSummary::default(), |acc, s| BulkSummary {
            total: acc.total + s.summary.total,
            succeeded: acc.succeeded + s.summary.succeeded,
            failed: acc.failed + s.summary.failed,
            skipped: acc.skipped + s.summary.skipped,
        });

        Ok(DispatchReport {
            target: name.to_string(),
            mode,
            stages,
            summary,
        })
    }

    /// Hand a workflow command line to the injected job runner.
    pub fn submit_job(&self, request: &JobRequest) -> Result<JobOutcome> {
        self.jobs.setup(request)?;
        let mapped = JobRequest {
            command_line: request.command_line.clone(),
            inputs: self.jobs.map_paths(&request.inputs),
        };
        self.jobs.execute(&mapped)
    }

    fn plan(&self, target: &str, scope: &HostScope, parallel: bool, mode: Mode) -> Result<Plan> {
        let ops = self.registry.expand(target, mode)?;
        let hosts = self.resolve_hosts(scope);
        if hosts.is_empty() {
            log_warn!("dispatch", "{}: no hosts for {}", target, scope.label().join(", "));
        }
        Ok(Plan {
            target: target.to_string(),
            parallel,
            hosts,
            ops: Arc::new(ops),
        })
    }

    fn run_stage(&self, plan: Plan, mode: Mode) -> StageReport {
        log_status!(
            "dispatch",
            "{} on {} host(s){}",
            plan.target,
            plan.hosts.len(),
            if plan.parallel { " in parallel" } else { "" }
        );

        let outcomes = if plan.parallel && plan.hosts.len() > 1 {
            self.run_parallel(&plan, mode)
        } else {
            self.run_serial(&plan, mode)
        };

        for outcome in outcomes.iter().filter(|o| o.status == HostStatus::Failed) {
            if let Some(err) = &outcome.error {
                log_warn!("dispatch", "[{}] {} failed: {}", outcome.host, plan.target, err.message);
            }
        }

        StageReport::new(&plan.target, plan.parallel, outcomes)
    }

    fn run_serial(&self, plan: &Plan, mode: Mode) -> Vec<HostOutcome> {
        let mut outcomes = Vec::with_capacity(plan.hosts.len());
        let mut failed = false;
        for host in &plan.hosts {
            if failed {
                outcomes.push(HostOutcome::skipped(label(host)));
                continue;
            }
            let outcome = run_host(&self.ctx.on_host(host.as_deref()), &plan.ops, mode);
            failed = outcome.status == HostStatus::Failed;
            outcomes.push(outcome);
        }
        outcomes
    }

    fn run_parallel(&self, plan: &Plan, mode: Mode) -> Vec<HostOutcome> {
        let handles: Vec<_> = plan
            .hosts
            .iter()
            .map(|host| {
                let ctx = self.ctx.on_host(host.as_deref());
                let ops = Arc::clone(&plan.ops);
                let host = label(host).to_string();
                (host, thread::spawn(move || run_host(&ctx, &ops, mode)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(host, handle)| {
                handle.join().unwrap_or_else(|_| HostOutcome {
                    error: Some(HostError::from(&Error::internal_unexpected(format!(
                        "execution thread for {} panicked",
                        host
                    )))),
                    host,
                    status: HostStatus::Failed,
                    operations: Vec::new(),
                })
            })
            .collect()
    }
}

fn label(host: &Option<String>) -> &str {
    host.as_deref().unwrap_or("local")
}

/// Apply every operation in order on one host, stopping at the first error.
fn run_host(ctx: &ExecutionContext, ops: &[Arc<Operation>], mode: Mode) -> HostOutcome {
    let mut completed = Vec::with_capacity(ops.len());
    for op in ops {
        if let Err(err) = op.apply(ctx, mode) {
            return HostOutcome {
                host: ctx.host_label().to_string(),
                status: HostStatus::Failed,
                operations: completed,
                error: Some(HostError::from(&err)),
            };
        }
        completed.push(op.name().to_string());
    }
    HostOutcome {
        host: ctx.host_label().to_string(),
        status: HostStatus::Success,
        operations: completed,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{context, RecordingTransport};
    use crate::jobs::JobStatus;
    use crate::ops;
    use crate::target::{Aggregate, Step, Target};
    use crate::topology::Role;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        seen: Mutex<Vec<JobRequest>>,
    }

    impl JobRunner for RecordingRunner {
        fn map_paths(&self, paths: &[String]) -> Vec<String> {
            paths.iter().map(|p| format!("/shared{}", p)).collect()
        }

        fn execute(&self, request: &JobRequest) -> Result<JobOutcome> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(JobOutcome {
                name: "job-1".to_string(),
                command: request.command_line.join(" "),
                status: JobStatus::Submitted,
                error: None,
            })
        }
    }

    fn registry() -> TargetRegistry {
        let mut registry = TargetRegistry::new();
        registry.register(
            Target::new("work", HostScope::roles(&[Role::Worker]))
                .parallel()
                .body(vec![
                    Step::op(ops::command("agent", "systemctl restart mesos-slave", "", true)),
                    Step::op(ops::command("firewall", "service iptables stop", "", true)),
                ]),
        );
        registry.register(
            Target::new("work-serial", HostScope::roles(&[Role::Worker])).body(vec![Step::op(
                ops::command("agent", "systemctl restart mesos-slave", "", true),
            )]),
        );
        registry.register(
            Target::new("head", HostScope::roles(&[Role::Head]))
                .body(vec![Step::op(ops::command("marathon", "echo marathon", "", false))]),
        );
        registry.register_aggregate(Aggregate {
            name: "all".to_string(),
            description: String::new(),
            stages: vec![
                Stage {
                    target: "work-serial".to_string(),
                    scope: HostScope::roles(&[Role::Worker]),
                },
                Stage {
                    target: "head".to_string(),
                    scope: HostScope::roles(&[Role::Head]),
                },
            ],
        });
        registry
    }

    fn dispatcher(transport: &Arc<RecordingTransport>) -> Dispatcher {
        Dispatcher::new(context(transport), registry(), Box::new(RecordingRunner::default()))
    }

    #[test]
    fn fan_out_isolates_host_failures() {
        let transport = RecordingTransport::new();
        transport.fail_on("w0", "mesos-slave", 1);

        let report = dispatcher(&transport).dispatch("work", Mode::Install).unwrap();

        let w0 = report.host("w0").unwrap();
        let w1 = report.host("w1").unwrap();
        assert_eq!(w0.status, HostStatus::Failed);
        assert!(w0.operations.is_empty());
        assert_eq!(w0.error.as_ref().unwrap().code, "remote.command_failed");
        assert_eq!(w1.status, HostStatus::Success);
        assert_eq!(w1.operations, vec!["agent", "firewall"]);
        assert_eq!(transport.commands_for("w1").len(), 2);
        // w0 stopped after its failing operation
        assert_eq!(transport.commands_for("w0").len(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn unreachable_host_is_reported_failed() {
        let transport = RecordingTransport::new();
        transport.unreachable("w1");

        let report = dispatcher(&transport).dispatch("work", Mode::Install).unwrap();

        assert_eq!(report.host("w0").unwrap().status, HostStatus::Success);
        let w1 = report.host("w1").unwrap();
        assert_eq!(w1.status, HostStatus::Failed);
        assert_eq!(w1.error.as_ref().unwrap().code, "ssh.connect_failed");
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.succeeded, 1);
    }

    #[test]
    fn serial_stops_at_first_failing_host() {
        let transport = RecordingTransport::new();
        transport.fail_on("w0", "mesos-slave", 1);

        let report = dispatcher(&transport).dispatch("work-serial", Mode::Install).unwrap();

        assert_eq!(report.host("w0").unwrap().status, HostStatus::Failed);
        assert_eq!(report.host("w1").unwrap().status, HostStatus::Skipped);
        assert!(transport.commands_for("w1").is_empty());
    }

    #[test]
    fn aggregate_runs_stages_in_order() {
        let transport = RecordingTransport::new();

        let report = dispatcher(&transport).dispatch("all", Mode::Clean).unwrap();

        assert!(report.is_success());
        let targets: Vec<&str> = report.stages.iter().map(|s| s.target.as_str()).collect();
        assert_eq!(targets, vec!["work-serial", "head"]);
        assert_eq!(report.mode, Mode::Clean);
    }

    #[test]
    fn aggregate_halts_after_failed_stage() {
        let transport = RecordingTransport::new();
        transport.fail_on("w1", "mesos-slave", 1);

        let report = dispatcher(&transport).dispatch("all", Mode::Install).unwrap();

        assert_eq!(report.stages[1].summary.skipped, 1);
        assert!(transport.commands_for("h0").is_empty());
    }

    #[test]
    fn unknown_target_fails_before_any_remote_action() {
        let transport = RecordingTransport::new();
        let err = dispatcher(&transport).dispatch("nope", Mode::Install).unwrap_err();
        assert_eq!(err.code.as_str(), "target.not_found");
        assert!(transport.commands().is_empty());
    }

    #[test]
    fn submit_job_maps_paths_through_runner() {
        let transport = RecordingTransport::new();
        let dispatcher = dispatcher(&transport);
        let request = JobRequest {
            command_line: vec!["wc".to_string(), "-l".to_string()],
            inputs: vec!["/data/in.txt".to_string()],
        };

        let outcome = dispatcher.submit_job(&request).unwrap();

        assert_eq!(outcome.status, JobStatus::Submitted);
        assert_eq!(outcome.command, "wc -l");
    }

    #[test]
    fn local_scope_runs_on_controlling_machine() {
        let transport = RecordingTransport::new();
        let dispatcher = dispatcher(&transport);
        assert_eq!(dispatcher.resolve_hosts(&HostScope::Local), vec![None]);
        assert_eq!(
            dispatcher.resolve_hosts(&HostScope::roles(&[Role::Worker, Role::Head])),
            vec![Some("w0".to_string()), Some("w1".to_string()), Some("h0".to_string())]
        );
    }
}
