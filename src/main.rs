use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;

use commands::{coord, fleet, jobs, render, run, services, targets};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "stars")]
#[command(version = VERSION)]
#[command(about = "Provision and operate a multi-node compute cluster")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install or clean a target on its hosts
    Run(run::RunArgs),
    /// List targets with their roles and step orders
    Targets(targets::TargetsArgs),
    /// Ad hoc commands and service control across an inventory group
    Fleet(fleet::FleetArgs),
    /// Long-running service registry
    Services(services::ServicesArgs),
    /// Scheduled jobs and workflow job submission
    Jobs(jobs::JobsArgs),
    /// Coordination store maintenance
    Coord(coord::CoordArgs),
    /// Render a template with KEY=VALUE substitutions
    Render(render::RenderArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command, &cli.global);
    // Output errors (a closed stdout) leave nothing to report to.
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
