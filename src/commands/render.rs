use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use stars::core::template::{self, RenderContext};
use stars::Error;

use super::CmdResult;

#[derive(Args)]
pub struct RenderArgs {
    /// Template file with `$NAME` or `${NAME}` placeholders
    pub template: PathBuf,

    /// Substitutions as KEY=VALUE
    #[arg(num_args = 0..)]
    pub vars: Vec<String>,
}

#[derive(Serialize)]
pub struct RenderOutput {
    pub template: String,
    pub content: String,
}

pub fn parse_vars(vars: &[String]) -> stars::Result<RenderContext> {
    vars.iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .map(|(key, value)| (key.trim().to_string(), value.to_string()))
                .ok_or_else(|| {
                    Error::validation_invalid_argument(
                        "vars",
                        "expected KEY=VALUE",
                        Some(pair.clone()),
                        None,
                    )
                })
        })
        .collect()
}

pub fn run(args: RenderArgs) -> CmdResult<RenderOutput> {
    let context = parse_vars(&args.vars)?;
    let content = template::render(&args.template, &context)?;
    Ok((
        RenderOutput {
            template: args.template.display().to_string(),
            content,
        },
        0,
    ))
}
