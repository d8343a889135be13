//! Workflow jobs handed to the cluster scheduler instead of running locally.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::sync::Arc;

use crate::config::JobDefaults;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::scheduler::{Job, JobScheduler};
use crate::utils::shell;

/// A command line produced by a workflow step.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub command_line: Vec<String>,
    /// Input paths referenced by the command line.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
}

impl JobRequest {
    pub fn new(command_line: Vec<String>) -> Self {
        Self {
            command_line,
            inputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Submitted,
    Completed,
    PermanentFail,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub name: String,
    pub command: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Executes workflow jobs.
pub trait JobRunner: Send + Sync {
    /// Prepare to run `request`. Runners that execute remotely have nothing to stage.
    fn setup(&self, _request: &JobRequest) -> Result<()> {
        Ok(())
    }

    /// Translate input paths into the paths the executing side sees.
    fn map_paths(&self, paths: &[String]) -> Vec<String> {
        paths.to_vec()
    }

    fn execute(&self, request: &JobRequest) -> Result<JobOutcome>;
}

/// `<prefix>-YYYYmmdd_HHMMSS`.
pub fn job_name(prefix: &str, at: NaiveDateTime) -> String {
    format!("{}-{}", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// Submits each job to the scheduler to run immediately, once.
pub struct SchedulerJobRunner {
    scheduler: Arc<dyn JobScheduler>,
    defaults: JobDefaults,
    clock: fn() -> NaiveDateTime,
}

impl SchedulerJobRunner {
    pub fn new(scheduler: Arc<dyn JobScheduler>, defaults: JobDefaults) -> Self {
        Self {
            scheduler,
            defaults,
            clock: || Local::now().naive_local(),
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    fn build_job(&self, request: &JobRequest) -> Result<Job> {
        if request.command_line.is_empty() {
            return Err(Error::validation_missing_argument(vec![
                "command_line".to_string(),
            ]));
        }
        let name = job_name(&self.defaults.name_prefix, (self.clock)());
        let command = request.command_line.join(" ");
        let mut job = Job::from_defaults(&name, &command, &self.defaults)?;
        job.execute_now = true;
        Ok(job)
    }
}

impl JobRunner for SchedulerJobRunner {
    fn execute(&self, request: &JobRequest) -> Result<JobOutcome> {
        let job = self.build_job(request)?;
        log_status!("job", "[{}] {}", job.name, shell::quote_args(&request.command_line));

        match self.scheduler.add_job(&job) {
            Ok(()) => Ok(JobOutcome {
                name: job.name,
                command: job.command,
                status: JobStatus::Submitted,
                error: None,
            }),
            Err(err) => {
                log_warn!("job", "[{}] submission failed: {}", job.name, err);
                Ok(JobOutcome {
                    name: job.name,
                    command: job.command,
                    status: JobStatus::PermanentFail,
                    error: Some(err.message),
                })
            }
        }
    }
}

/// Runs each job on the controlling machine and waits for it. Used when no scheduler
/// endpoint is configured.
pub struct LocalJobRunner {
    ctx: ExecutionContext,
}

impl LocalJobRunner {
    pub fn new(ctx: &ExecutionContext) -> Self {
        Self { ctx: ctx.local() }
    }
}

impl JobRunner for LocalJobRunner {
    fn execute(&self, request: &JobRequest) -> Result<JobOutcome> {
        if request.command_line.is_empty() {
            return Err(Error::validation_missing_argument(vec![
                "command_line".to_string(),
            ]));
        }
        let command = shell::quote_args(&request.command_line);
        let name = job_name("local", Local::now().naive_local());
        log_status!("job", "[{}] {}", name, command);

        let output = self.ctx.probe(&command)?;
        if output.success {
            return Ok(JobOutcome {
                name,
                command,
                status: JobStatus::Completed,
                error: None,
            });
        }
        log_warn!("job", "[{}] exited with {}", name, output.exit_code);
        Ok(JobOutcome {
            name,
            command,
            status: JobStatus::PermanentFail,
            error: Some(format!("exit code {}: {}", output.exit_code, output.stderr.trim())),
        })
    }
}
