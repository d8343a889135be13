use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use stars::config::Settings;
use stars::fleet::{
    Automator, FleetReport, FleetTask, Inventory, SshBackend, DEFAULT_FORKS, DEFAULT_MODULE,
};

use super::CmdResult;

#[derive(Args)]
pub struct FleetArgs {
    #[command(subcommand)]
    command: FleetCommand,
}

#[derive(Subcommand)]
enum FleetCommand {
    /// Run an ad hoc command on every host in an inventory group
    Exec {
        /// Inventory group (`all` covers every host)
        group: String,

        /// Inventory environment (`<home>/inventory/<env>.yml`) or inventory file path
        environment: String,

        /// Command arguments
        #[arg(num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,

        /// Module: shell, command, or raw
        #[arg(long, short = 'm', default_value = DEFAULT_MODULE)]
        module: String,

        /// Run with elevation
        #[arg(long = "become", short = 'b')]
        privileged: bool,

        /// File holding the sudo password
        #[arg(long, value_name = "FILE")]
        vault_file: Option<String>,

        /// Hosts handled at once
        #[arg(long, short = 'f', default_value_t = DEFAULT_FORKS)]
        forks: usize,
    },
    /// Start, stop, or restart the services configured for a group
    Service {
        group: String,
        environment: String,
        /// Service action (start, stop, restart, status)
        action: String,

        /// File holding the sudo password
        #[arg(long, value_name = "FILE")]
        vault_file: Option<String>,
    },
    /// List the inventory groups of an environment
    Groups { environment: String },
}

#[derive(Default, Serialize)]
pub struct FleetOutput {
    pub command: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<FleetReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

pub fn run(args: FleetArgs, global: &super::GlobalArgs) -> CmdResult<FleetOutput> {
    let settings = global.settings()?;
    match args.command {
        FleetCommand::Exec {
            group,
            environment,
            command,
            module,
            privileged,
            vault_file,
            forks,
        } => {
            let automator = automator(&settings, vault_file.as_deref())?.with_forks(forks);
            let task = FleetTask::new(module, command.join(" ")).privileged(privileged);
            let report = automator.execute_task(&group, &environment, task)?;
            finish("fleet.exec", vec![report])
        }
        FleetCommand::Service {
            group,
            environment,
            action,
            vault_file,
        } => {
            let automator = automator(&settings, vault_file.as_deref())?;
            let reports = automator.service(&group, &environment, &action)?;
            finish("fleet.service", reports)
        }
        FleetCommand::Groups { environment } => {
            let inventory = Inventory::resolve(&settings.paths.inventory(), &environment)?;
            Ok((
                FleetOutput {
                    command: "fleet.groups".to_string(),
                    groups: Some(inventory.group_names()),
                    ..Default::default()
                },
                0,
            ))
        }
    }
}

fn automator(settings: &Settings, vault_file: Option<&str>) -> stars::Result<Automator> {
    let backend = SshBackend::new(settings.app.ssh.clone(), settings.app.user.clone());
    let automator = Automator::new(settings.paths.inventory(), Arc::new(backend))
        .with_services(settings.app.fleet_services.clone());
    match vault_file {
        Some(path) => automator.with_vault_file(path),
        None => Ok(automator),
    }
}

fn finish(command: &str, reports: Vec<FleetReport>) -> CmdResult<FleetOutput> {
    let exit_code = if reports.iter().all(FleetReport::is_success) { 0 } else { 1 };
    Ok((
        FleetOutput {
            command: command.to_string(),
            reports,
            ..Default::default()
        },
        exit_code,
    ))
}
