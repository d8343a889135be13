use clap::{Args, Subcommand};
use serde::Serialize;

use stars::config::Settings;
use stars::coordination::{CoordinationClient, Listing, ZkCliStore};
use stars::output::BatchResult;
use stars::utils::pattern::{self, Pattern};

use super::CmdResult;

#[derive(Args)]
pub struct CoordArgs {
    #[command(subcommand)]
    command: CoordCommand,
}

#[derive(Subcommand)]
enum CoordCommand {
    /// List paths under a root whose final segment matches a pattern
    List {
        #[arg(default_value = "/")]
        root: String,
        pattern: Option<String>,
    },
    /// Recursively delete every path whose final segment matches a pattern
    Delete { pattern: String },
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum CoordOutput {
    List(Listing),
    Delete(BatchResult),
}

/// Client that runs the coordination CLI on the first coordination node.
fn client(settings: &Settings) -> CoordinationClient {
    let ctx = super::context(settings);
    let node = settings.app.zookeeper_nodes.first().map(String::as_str);
    let store = ZkCliStore::new(
        ctx.on_host(node),
        settings.app.zk_cli.clone(),
        settings.app.coordination_servers(),
    );
    CoordinationClient::new(Box::new(store))
}

pub fn run(args: CoordArgs, global: &super::GlobalArgs) -> CmdResult<CoordOutput> {
    let settings = global.settings()?;

    match args.command {
        CoordCommand::List { root, pattern } => {
            let pattern = pattern::compile(pattern.as_deref())?;
            let paths = client(&settings).list_matching(&root, pattern.as_ref())?;
            Ok((
                CoordOutput::List(Listing {
                    root,
                    pattern: pattern.as_ref().map(|p| p.as_str().to_string()),
                    paths,
                }),
                0,
            ))
        }
        CoordCommand::Delete { pattern } => {
            let pattern = Pattern::new(&pattern)?;
            let result = client(&settings).delete_matching(&pattern)?;
            let exit_code = if result.has_errors() { 1 } else { 0 };
            Ok((CoordOutput::Delete(result), exit_code))
        }
    }
}
