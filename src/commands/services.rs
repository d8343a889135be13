use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use stars::output::BatchResult;
use stars::services::{Service, ServiceClient, ServiceRegistry};
use stars::utils::pattern;

use super::CmdResult;

#[derive(Args)]
pub struct ServicesArgs {
    #[command(subcommand)]
    command: ServicesCommand,
}

#[derive(Subcommand)]
enum ServicesCommand {
    /// List registered long-running services
    List,
    /// Delete services whose id matches a pattern (all when omitted)
    Delete {
        /// Pattern anchored at the start of the id
        pattern: Option<String>,
    },
    /// Register every `*.json` service definition in a directory
    Register { dir: PathBuf },
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ServicesOutput {
    List { services: Vec<Service> },
    Delete(BatchResult),
    Register(BatchResult),
}

pub fn run(args: ServicesArgs, global: &super::GlobalArgs) -> CmdResult<ServicesOutput> {
    let settings = global.settings()?;
    let client = ServiceClient::new(&settings.app.endpoints.services)?;

    match args.command {
        ServicesCommand::List => {
            let services = client.list_services()?;
            Ok((ServicesOutput::List { services }, 0))
        }
        ServicesCommand::Delete { pattern } => {
            let pattern = pattern::compile(pattern.as_deref())?;
            let result = client.delete_services(pattern.as_ref())?;
            let exit_code = batch_exit_code(&result);
            Ok((ServicesOutput::Delete(result), exit_code))
        }
        ServicesCommand::Register { dir } => {
            let result = client.register_services(&dir)?;
            let exit_code = batch_exit_code(&result);
            Ok((ServicesOutput::Register(result), exit_code))
        }
    }
}

fn batch_exit_code(result: &BatchResult) -> i32 {
    if result.has_errors() {
        1
    } else {
        0
    }
}
