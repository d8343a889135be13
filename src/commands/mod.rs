use clap::Args;
use std::sync::Arc;

use stars::cluster;
use stars::config::Settings;
use stars::dispatch::Dispatcher;
use stars::executor::SshTransport;
use stars::jobs::{JobRunner, LocalJobRunner, SchedulerJobRunner};
use stars::scheduler::SchedulerClient;
use stars::ExecutionContext;

pub type CmdResult<T> = stars::Result<(T, i32)>;

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct GlobalArgs {
    /// Installation root (overrides STARS_HOME)
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<String>,

    /// Application name or file (overrides STARS_APP)
    #[arg(long, global = true, value_name = "APP")]
    pub app: Option<String>,
}

impl GlobalArgs {
    pub fn settings(&self) -> stars::Result<Settings> {
        Settings::load(self.home.as_deref(), self.app.as_deref())
    }
}

pub(crate) fn context(settings: &Settings) -> ExecutionContext {
    ExecutionContext::from_settings(settings, SshTransport::shared(settings.app.ssh.clone()))
}

/// Dispatcher over the cluster targets. Workflow jobs go to the scheduler when one is
/// configured, otherwise they run on this machine.
pub(crate) fn dispatcher(settings: &Settings) -> stars::Result<Dispatcher> {
    let ctx = context(settings);
    let registry = cluster::registry(&settings.app, &settings.paths)?;

    let jobs: Box<dyn JobRunner> = if settings.app.endpoints.scheduler.is_empty() {
        Box::new(LocalJobRunner::new(&ctx))
    } else {
        let scheduler = SchedulerClient::new(&settings.app.endpoints.scheduler)?;
        Box::new(SchedulerJobRunner::new(
            Arc::new(scheduler),
            settings.app.job_defaults.clone(),
        ))
    };

    Ok(Dispatcher::new(ctx, registry, jobs))
}

pub mod coord;
pub mod fleet;
pub mod jobs;
pub mod render;
pub mod run;
pub mod services;
pub mod targets;

macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (stars::Result<serde_json::Value>, i32) {
    match command {
        // Commands without global context
        crate::Commands::Render(args) => dispatch!(args, render),

        // Commands with global context
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Targets(args) => dispatch!(args, global, targets),
        crate::Commands::Fleet(args) => dispatch!(args, global, fleet),
        crate::Commands::Services(args) => dispatch!(args, global, services),
        crate::Commands::Jobs(args) => dispatch!(args, global, jobs),
        crate::Commands::Coord(args) => dispatch!(args, global, coord),
    }
}
