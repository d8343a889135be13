use clap::Args;
use serde::Serialize;

use stars::cluster;
use stars::target::TargetInfo;

use super::CmdResult;

#[derive(Args)]
pub struct TargetsArgs {
    /// Show a single target
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct TargetsOutput {
    pub app: String,
    pub targets: Vec<TargetInfo>,
}

pub fn run(args: TargetsArgs, global: &super::GlobalArgs) -> CmdResult<TargetsOutput> {
    let settings = global.settings()?;
    let registry = cluster::registry(&settings.app, &settings.paths)?;

    let targets = match args.name {
        Some(name) => {
            registry.get(&name)?;
            registry.list().into_iter().filter(|t| t.name == name).collect()
        }
        None => registry.list(),
    };

    Ok((
        TargetsOutput {
            app: settings.app_path.display().to_string(),
            targets,
        },
        0,
    ))
}
