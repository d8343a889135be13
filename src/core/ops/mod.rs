//! Catalog of guard-checked operations composed by the cluster targets.
//!
//! Each constructor returns an [`Operation`] whose `install` converges when repeated and
//! whose `clean` removes what `install` put in place.

mod archive;
mod files;
mod package;
mod service;

pub use archive::{git_checkout, local_tarball, tarball};
pub use files::{
    backup_and_replace, config_template, config_template_with, installed_file, owned_dir, owned_file,
};
pub use package::{gem, package, packages, repo_rpm, yum_command};
pub use service::service;

use crate::error::Result;
use crate::operation::{Mode, Operation};

/// One-off step: `install_cmd` on install, `clean_cmd` on clean, both elevated when
/// `privileged`. An empty command is a no-op for that direction.
pub fn command(
    name: impl Into<String>,
    install_cmd: impl Into<String>,
    clean_cmd: impl Into<String>,
    privileged: bool,
) -> Operation {
    let install_cmd = install_cmd.into();
    let clean_cmd = clean_cmd.into();
    let runner = move |cmd: &str, ctx: &crate::context::ExecutionContext| -> Result<()> {
        if cmd.is_empty() {
            return Ok(());
        }
        if privileged {
            ctx.sudo(cmd)?;
        } else {
            ctx.run(cmd)?;
        }
        Ok(())
    };
    Operation::new(
        name,
        move |ctx| runner(&install_cmd, ctx),
        move |ctx| runner(&clean_cmd, ctx),
    )
}

/// Several operations applied as one: install runs them in order, clean in reverse.
pub fn bundle(name: impl Into<String>, ops: Vec<Operation>) -> Operation {
    let ops = std::sync::Arc::new(ops);
    let install_ops = ops.clone();
    Operation::new(
        name,
        move |ctx| {
            for op in install_ops.iter() {
                op.apply(ctx, Mode::Install)?;
            }
            Ok(())
        },
        move |ctx| {
            for op in ops.iter().rev() {
                op.apply(ctx, Mode::Clean)?;
            }
            Ok(())
        },
    )
}

/// Run `op` with non-zero exits tolerated in both directions.
pub fn tolerant(op: Operation) -> Operation {
    let name = op.name().to_string();
    let op = std::sync::Arc::new(op);
    let clean_op = op.clone();
    Operation::new(
        name,
        move |ctx| ctx.warn_only(|ctx| op.apply(ctx, Mode::Install).map(|_| ())),
        move |ctx| ctx.warn_only(|ctx| clean_op.apply(ctx, Mode::Clean).map(|_| ())),
    )
}
