//! Ad hoc multi-host command execution against a YAML inventory.
//!
//! A fixed pool of worker threads pulls hosts off a shared queue and streams each
//! result back over a channel, so the callback sees results in completion order. Only
//! setup problems (inventory, group, vault) fail the call; host failures are results.

pub mod backend;
pub mod callback;
pub mod inventory;

pub use backend::{
    module_command, AutomationBackend, FleetTask, HostResult, HostResultStatus, Module, SshBackend,
};
pub use callback::{LoggingCallback, ResultCallback};
pub use inventory::{Inventory, InventoryHost};

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use crate::error::{Error, Result};
use crate::output::BulkSummary;
use crate::utils::{io, shell};

pub const DEFAULT_FORKS: usize = 10;
pub const DEFAULT_MODULE: &str = "shell";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetReport {
    pub group: String,
    pub environment: String,
    pub module: String,
    pub command: String,
    pub hosts: Vec<HostResult>,
    pub summary: BulkSummary,
}

impl FleetReport {
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0
    }
}

pub struct Automator {
    inventory_dir: PathBuf,
    backend: Arc<dyn AutomationBackend>,
    callback: Arc<dyn ResultCallback>,
    forks: usize,
    vault_password: Option<String>,
    services: BTreeMap<String, Vec<String>>,
}

impl Automator {
    pub fn new(inventory_dir: impl Into<PathBuf>, backend: Arc<dyn AutomationBackend>) -> Self {
        Self {
            inventory_dir: inventory_dir.into(),
            backend,
            callback: Arc::new(LoggingCallback),
            forks: DEFAULT_FORKS,
            vault_password: None,
            services: BTreeMap::new(),
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn ResultCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn with_forks(mut self, forks: usize) -> Self {
        self.forks = forks.max(1);
        self
    }

    /// Services per group, in stop order.
    pub fn with_services(mut self, services: BTreeMap<String, Vec<String>>) -> Self {
        self.services = services;
        self
    }

    /// Read the vault password from `path` (tilde expanded, surrounding whitespace removed).
    pub fn with_vault_file(mut self, path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).to_string();
        let password = io::read_file(Path::new(&expanded), "read vault password file")?;
        let password = password.trim();
        if password.is_empty() {
            return Err(Error::config_invalid_value(
                "vault",
                Some(expanded),
                "password file is empty",
            ));
        }
        self.vault_password = Some(password.to_string());
        Ok(self)
    }

    /// Run `command` through `module` (default [`DEFAULT_MODULE`]) on every host in
    /// `group` of the `environment` inventory.
    pub fn execute(
        &self,
        group: &str,
        environment: &str,
        module: Option<&str>,
        command: &str,
    ) -> Result<FleetReport> {
        let task = FleetTask::new(module.unwrap_or(DEFAULT_MODULE), command);
        self.execute_task(group, environment, task)
    }

    pub fn execute_task(&self, group: &str, environment: &str, mut task: FleetTask) -> Result<FleetReport> {
        if task.args.trim().is_empty() {
            return Err(Error::validation_missing_argument(vec!["command".to_string()]));
        }
        let inventory = Inventory::resolve(&self.inventory_dir, environment)?;
        let hosts = inventory.group(group)?;

        if task.privileged {
            task.password = self.vault_password.clone();
        }

        log_status!(
            "fleet",
            "{} on {} host(s) in {}: {}",
            task.module,
            hosts.len(),
            group,
            task.args
        );
        let results = self.fan_out(hosts, &task);

        let mut summary = BulkSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in &results {
            if result.is_ok() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }

        Ok(FleetReport {
            group: group.to_string(),
            environment: environment.to_string(),
            module: task.module,
            command: task.args,
            hosts: results,
            summary,
        })
    }

    fn fan_out(&self, hosts: Vec<InventoryHost>, task: &FleetTask) -> Vec<HostResult> {
        if hosts.is_empty() {
            return Vec::new();
        }
        let order: Vec<String> = hosts.iter().map(|h| h.name.clone()).collect();
        let workers = self.forks.min(hosts.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(hosts)));
        let (tx, rx) = mpsc::channel::<HostResult>();

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let backend = Arc::clone(&self.backend);
                let tx = tx.clone();
                let task = task.clone();
                thread::spawn(move || loop {
                    let next = match queue.lock() {
                        Ok(mut queue) => queue.pop_front(),
                        Err(_) => None,
                    };
                    let Some(host) = next else { break };
                    if tx.send(backend.run(&host, &task)).is_err() {
                        break;
                    }
                })
            })
            .collect();
        drop(tx);

        let mut results = Vec::with_capacity(order.len());
        for result in rx {
            self.callback.on_result(&result);
            results.push(result);
        }
        for handle in handles {
            if handle.join().is_err() {
                log_warn!("fleet", "A worker thread panicked");
            }
        }

        // A panicked worker loses the host it was running.
        for name in &order {
            if !results.iter().any(|r| &r.host == name) {
                let lost = HostResult::failed(name, HostResultStatus::Failed, "worker thread panicked");
                self.callback.on_result(&lost);
                results.push(lost);
            }
        }

        results.sort_by_key(|r| order.iter().position(|n| *n == r.host));
        results
    }

    /// Run `service <svc> <action>` with elevation for each service configured for
    /// `group`: configured order, reversed for `start`.
    pub fn service(&self, group: &str, environment: &str, action: &str) -> Result<Vec<FleetReport>> {
        let action = action.trim();
        if action.is_empty() {
            return Err(Error::validation_missing_argument(vec!["action".to_string()]));
        }
        let configured = self.services.get(group).ok_or_else(|| {
            Error::config_missing_key(format!("fleetServices.{}", group), None)
                .with_hint(format!("Configured groups: {}", self.service_groups().join(", ")))
        })?;

        let mut services = configured.clone();
        if action == "start" {
            services.reverse();
        }

        services
            .iter()
            .map(|svc| {
                let command = format!("service {} {}", shell::quote_arg(svc), shell::quote_arg(action));
                self.execute_task(group, environment, FleetTask::new("command", command).privileged(true))
            })
            .collect()
    }

    pub fn service_groups(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const INVENTORY: &str = "masters:\n  hosts:\n    h0:\nworkers:\n  hosts:\n    w0:\n    w1:\n    w2:\n";

    #[derive(Default)]
    struct FakeBackend {
        runs: Mutex<Vec<(String, String, Option<String>)>>,
        failing: Vec<String>,
    }

    impl AutomationBackend for FakeBackend {
        fn run(&self, host: &InventoryHost, task: &FleetTask) -> HostResult {
            self.runs
                .lock()
                .unwrap()
                .push((host.name.clone(), task.args.clone(), task.password.clone()));
            if self.failing.contains(&host.name) {
                return HostResult::failed(&host.name, HostResultStatus::Unreachable, "no route to host");
            }
            HostResult {
                host: host.name.clone(),
                status: HostResultStatus::Ok,
                changed: true,
                rc: Some(0),
                stdout: format!("ran {}", task.args),
                stderr: String::new(),
                msg: None,
            }
        }
    }

    #[derive(Default)]
    struct Collecting(Mutex<Vec<String>>);

    impl ResultCallback for Collecting {
        fn on_result(&self, result: &HostResult) {
            self.0.lock().unwrap().push(result.host.clone());
        }
    }

    fn inventory_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("prod.yml"), INVENTORY).unwrap();
        dir
    }

    #[test]
    fn reports_every_host_and_isolates_failures() {
        let dir = inventory_dir();
        let backend = Arc::new(FakeBackend {
            failing: vec!["w1".to_string()],
            ..Default::default()
        });
        let callback = Arc::new(Collecting::default());
        let automator = Automator::new(dir.path(), backend)
            .with_callback(callback.clone())
            .with_forks(2);

        let report = automator.execute("workers", "prod", None, "uptime").unwrap();

        let hosts: Vec<&str> = report.hosts.iter().map(|h| h.host.as_str()).collect();
        assert_eq!(hosts, vec!["w0", "w1", "w2"]);
        assert_eq!(report.hosts[1].status, HostResultStatus::Unreachable);
        assert_eq!(report.summary.succeeded, 2);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.module, "shell");
        assert_eq!(callback.0.lock().unwrap().len(), 3);
    }

    #[test]
    fn setup_failures_fail_the_call() {
        let dir = inventory_dir();
        let automator = Automator::new(dir.path(), Arc::new(FakeBackend::default()));

        let err = automator.execute("workers", "staging", None, "uptime").unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");

        let err = automator.execute("dbs", "prod", None, "uptime").unwrap_err();
        assert_eq!(err.code.as_str(), "inventory.group_not_found");
    }

    #[test]
    fn vault_password_only_reaches_privileged_tasks() {
        let dir = inventory_dir();
        fs::write(dir.path().join("vault"), "  s3cret\n").unwrap();
        let backend = Arc::new(FakeBackend::default());
        let automator = Automator::new(dir.path(), backend.clone())
            .with_vault_file(&dir.path().join("vault").display().to_string())
            .unwrap();

        automator.execute("masters", "prod", None, "id").unwrap();
        automator
            .execute_task("masters", "prod", FleetTask::new("raw", "id").privileged(true))
            .unwrap();

        let runs = backend.runs.lock().unwrap();
        assert_eq!(runs[0].2, None);
        assert_eq!(runs[1].2.as_deref(), Some("s3cret"));
    }

    #[test]
    fn service_start_runs_in_reverse_order() {
        let dir = inventory_dir();
        let backend = Arc::new(FakeBackend::default());
        let mut services = BTreeMap::new();
        services.insert(
            "masters".to_string(),
            vec!["marathon".to_string(), "mesos-master".to_string(), "zookeeper".to_string()],
        );
        let automator = Automator::new(dir.path(), backend.clone()).with_services(services);

        automator.service("masters", "prod", "stop").unwrap();
        automator.service("masters", "prod", "start").unwrap();

        let commands: Vec<String> = backend.runs.lock().unwrap().iter().map(|r| r.1.clone()).collect();
        assert_eq!(
            commands,
            vec![
                "service marathon stop",
                "service mesos-master stop",
                "service zookeeper stop",
                "service zookeeper start",
                "service mesos-master start",
                "service marathon start",
            ]
        );
    }

    #[test]
    fn service_for_unconfigured_group_is_an_error() {
        let dir = inventory_dir();
        let automator = Automator::new(dir.path(), Arc::new(FakeBackend::default()));
        let err = automator.service("workers", "prod", "restart").unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
    }
}
