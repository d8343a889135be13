use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;

use stars::jobs::{JobOutcome, JobRequest, JobStatus};
use stars::scheduler::SchedulerClient;

use super::CmdResult;

#[derive(Args)]
pub struct JobsArgs {
    #[command(subcommand)]
    command: JobsCommand,
}

#[derive(Subcommand)]
enum JobsCommand {
    /// Hand a command line to the job runner (scheduler when configured)
    Submit {
        /// Input paths the command reads
        #[arg(long = "input", value_name = "PATH")]
        inputs: Vec<String>,

        #[arg(num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        command_line: Vec<String>,
    },
    /// List scheduled jobs
    List,
    /// Trigger a job now
    Run { name: String },
    /// Delete a job
    Delete { name: String },
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum JobsOutput {
    Submit(JobOutcome),
    List { jobs: Vec<Value> },
    Run { name: String },
    Delete { name: String },
}

pub fn run(args: JobsArgs, global: &super::GlobalArgs) -> CmdResult<JobsOutput> {
    let settings = global.settings()?;
    let scheduler = || SchedulerClient::new(&settings.app.endpoints.scheduler);

    match args.command {
        JobsCommand::Submit {
            inputs,
            command_line,
        } => {
            let dispatcher = super::dispatcher(&settings)?;
            let request = JobRequest {
                command_line,
                inputs,
            };
            let outcome = dispatcher.submit_job(&request)?;
            let exit_code = if outcome.status == JobStatus::PermanentFail { 1 } else { 0 };
            Ok((JobsOutput::Submit(outcome), exit_code))
        }
        JobsCommand::List => Ok((
            JobsOutput::List {
                jobs: scheduler()?.list_jobs()?,
            },
            0,
        )),
        JobsCommand::Run { name } => {
            scheduler()?.run_job(&name)?;
            Ok((JobsOutput::Run { name }, 0))
        }
        JobsCommand::Delete { name } => {
            scheduler()?.delete_job(&name)?;
            Ok((JobsOutput::Delete { name }, 0))
        }
    }
}
