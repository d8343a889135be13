use clap::Args;

use stars::dispatch::DispatchReport;
use stars::Mode;

use super::CmdResult;

#[derive(Args)]
pub struct RunArgs {
    /// Target or aggregate name (see `stars targets`)
    pub target: String,

    /// `install` or `clean`, optionally written as `mode=<value>`
    #[arg(default_value = "install")]
    pub mode: String,
}

pub fn run(args: RunArgs, global: &super::GlobalArgs) -> CmdResult<DispatchReport> {
    // Reject a bad mode before touching configuration or hosts.
    let mode: Mode = args.mode.parse()?;
    let settings = global.settings()?;
    let dispatcher = super::dispatcher(&settings)?;

    let report = dispatcher.dispatch(&args.target, mode)?;
    let exit_code = if report.is_success() { 0 } else { 1 };
    Ok((report, exit_code))
}
