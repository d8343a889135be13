use std::path::PathBuf;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operation::Operation;
use crate::core::template::{self, RenderContext};
use crate::utils::shell;

fn remove(ctx: &ExecutionContext, path: &str, privileged: bool) -> Result<()> {
    let command = format!("rm -rf {}", shell::quote_path(path));
    if privileged {
        ctx.sudo(&command)?;
    } else {
        ctx.run(&command)?;
    }
    Ok(())
}

/// Directory owned by the connecting user.
pub fn owned_dir(path: impl Into<String>) -> Operation {
    let path = path.into();
    let clean_path = path.clone();
    Operation::new(
        format!("dir:{}", path),
        move |ctx| {
            let quoted = shell::quote_path(&path);
            ctx.sudo(&format!("mkdir -p {}", quoted))?;
            ctx.sudo(&format!("chown {} {}", shell::quote_arg(ctx.user()), quoted))?;
            Ok(())
        },
        move |ctx| remove(ctx, &clean_path, true),
    )
}

/// File owned by the connecting user. Existing content is preserved.
pub fn owned_file(path: impl Into<String>) -> Operation {
    let path = path.into();
    let clean_path = path.clone();
    Operation::new(
        format!("file:{}", path),
        move |ctx| {
            let quoted = shell::quote_path(&path);
            ctx.sudo(&format!("touch {}", quoted))?;
            ctx.sudo(&format!("chown {} {}", shell::quote_arg(ctx.user()), quoted))?;
            Ok(())
        },
        move |ctx| ctx.sudo(&format!("rm -f {}", shell::quote_path(&clean_path))).map(|_| ()),
    )
}

/// Render `template` with a context computed on the active host, then deploy.
pub fn config_template_with<F>(
    template: impl Into<PathBuf>,
    destination: impl Into<String>,
    privileged: bool,
    context: F,
) -> Operation
where
    F: Fn(&ExecutionContext) -> Result<RenderContext> + Send + Sync + 'static,
{
    let template = template.into();
    let destination = destination.into();
    let clean_destination = destination.clone();
    Operation::new(
        format!("template:{}", destination),
        move |ctx| {
            let vars = context(ctx)?;
            template::deploy(ctx, &template, &vars, &destination, privileged).map(|_| ())
        },
        move |ctx| remove(ctx, &clean_destination, privileged),
    )
}

/// Render `template` with a fixed context and deploy it to `destination`.
pub fn config_template(
    template: impl Into<PathBuf>,
    context: RenderContext,
    destination: impl Into<String>,
    privileged: bool,
) -> Operation {
    config_template_with(template, destination, privileged, move |_| Ok(context.clone()))
}

/// Copy a shipped file into place. Clean removes the copy.
pub fn installed_file(source: impl Into<String>, destination: impl Into<String>) -> Operation {
    let source = source.into();
    let destination = destination.into();
    let clean_destination = destination.clone();
    Operation::new(
        format!("copy:{}", destination),
        move |ctx| {
            ctx.sudo(&format!(
                "cp {} {}",
                shell::quote_path(&source),
                shell::quote_path(&destination)
            ))
            .map(|_| ())
        },
        move |ctx| {
            ctx.sudo(&format!("rm -f {}", shell::quote_path(&clean_destination)))
                .map(|_| ())
        },
    )
}

/// Replace a system file, keeping the first original as `<destination>.orig`.
/// Clean moves the original back.
pub fn backup_and_replace(source: impl Into<String>, destination: impl Into<String>) -> Operation {
    let source = source.into();
    let destination = destination.into();
    let clean_destination = destination.clone();
    Operation::new(
        format!("replace:{}", destination),
        move |ctx| {
            let dest = shell::quote_path(&destination);
            let orig = shell::quote_path(&format!("{}.orig", destination));
            ctx.sudo(&format!(
                "if [ ! -f {orig} ]; then cp {dest} {orig}; fi",
                orig = orig,
                dest = dest
            ))?;
            ctx.sudo(&format!("cp {} {}", shell::quote_path(&source), dest))?;
            Ok(())
        },
        move |ctx| {
            let dest = shell::quote_path(&clean_destination);
            let orig = shell::quote_path(&format!("{}.orig", clean_destination));
            ctx.sudo(&format!(
                "if [ -f {orig} ]; then mv {orig} {dest}; fi",
                orig = orig,
                dest = dest
            ))
            .map(|_| ())
        },
    )
}
