use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operation::Operation;
use crate::utils::shell;

#[derive(Clone)]
enum Source {
    /// Downloaded into `dist` before extraction.
    Remote(String),
    /// Already present in `dist`.
    Local(String),
}

impl Source {
    fn file_name(&self) -> &str {
        match self {
            Source::Remote(uri) => uri.rsplit('/').next().unwrap_or(uri),
            Source::Local(file) => file,
        }
    }
}

fn stack_dir(ctx: &ExecutionContext, name: &str) -> String {
    ctx.paths().stack().join(name).display().to_string()
}

fn unpack(ctx: &ExecutionContext, name: &str, source: &Source) -> Result<()> {
    let dist = ctx.paths().dist().display().to_string();
    if let Source::Remote(uri) = source {
        ctx.run(&format!("mkdir -p {}", shell::quote_path(&dist)))?;
        ctx.in_dir(dist.as_str())
            .run(&format!("wget --timestamping --quiet {}", shell::quote_arg(uri)))?;
    }

    let path = stack_dir(ctx, name);
    ctx.run(&format!("mkdir -p {}", shell::quote_path(&path)))?;

    let archive = format!("{}/{}", dist, source.file_name());
    let here = ctx.in_dir(path);
    here.run(&format!(
        "if [ ! -h current ]; then tar xzf {}; fi",
        shell::quote_path(&archive)
    ))?;
    here.run(&format!(
        "if [ ! -h current ]; then ln -s *{}* current; fi",
        name
    ))?;
    Ok(())
}

fn archive_op(name: String, source: Source) -> Operation {
    let clean_name = name.clone();
    Operation::new(
        format!("tarball:{}", name),
        move |ctx| unpack(ctx, &name, &source),
        move |ctx| {
            ctx.run(&format!("rm -rf {}", shell::quote_path(&stack_dir(ctx, &clean_name))))
                .map(|_| ())
        },
    )
}

/// Download `uri` into `dist`, unpack into `stack/<name>` and link `current` to it.
/// Extraction and linking are skipped once `current` exists.
pub fn tarball(name: impl Into<String>, uri: impl Into<String>) -> Operation {
    archive_op(name.into(), Source::Remote(uri.into()))
}

/// Like [`tarball`] for an archive already present in `dist`.
pub fn local_tarball(name: impl Into<String>, file_name: impl Into<String>) -> Operation {
    archive_op(name.into(), Source::Local(file_name.into()))
}

/// Clone `uri` into `<parent>/<name>`, or fast-forward an existing checkout.
pub fn git_checkout(
    name: impl Into<String>,
    uri: impl Into<String>,
    parent: impl Into<String>,
) -> Operation {
    let name = name.into();
    let uri = uri.into();
    let parent = parent.into();
    let target = format!("{}/{}", parent, name);
    let clean_target = target.clone();
    Operation::new(
        format!("git:{}", name),
        move |ctx| {
            let dir = shell::quote_path(&target);
            ctx.run(&format!(
                "if [ -d {dir}/.git ]; then git -C {dir} pull --quiet; else git clone --quiet {uri} {dir}; fi",
                dir = dir,
                uri = shell::quote_arg(&uri)
            ))
            .map(|_| ())
        },
        move |ctx| {
            ctx.sudo(&format!("rm -rf {}", shell::quote_path(&clean_target)))
                .map(|_| ())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{context, RecordingTransport};
    use crate::operation::Mode;

    #[test]
    fn remote_tarball_downloads_then_links() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport).on_host(Some("w0"));

        tarball("scala", "http://www.scala-lang.org/files/archive/scala-2.10.4.tgz")
            .apply(&ctx, Mode::Install)
            .unwrap();

        let commands = transport.commands_for("w0");
        assert_eq!(commands.len(), 5);
        assert!(commands[1].contains("wget --timestamping --quiet"));
        assert!(commands[3].contains("tar xzf "));
        assert!(commands[3].ends_with("/scala-2.10.4.tgz'; fi"));
        assert!(commands[4].contains("ln -s *scala* current"));
    }

    #[test]
    fn local_tarball_skips_download() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport);

        local_tarball("jdk", "jdk-8u60-linux-x64.tar.gz")
            .apply(&ctx, Mode::Install)
            .unwrap();

        assert!(transport.commands().iter().all(|c| !c.contains("wget")));
    }

    #[test]
    fn tarball_clean_removes_stack_dir() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport);

        tarball("node", "https://nodejs.org/dist/v0.12.7/node-v0.12.7-linux-x64.tar.gz")
            .apply(&ctx, Mode::Clean)
            .unwrap();

        let commands = transport.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].starts_with("rm -rf "));
        assert!(commands[0].ends_with("/stack/node'"));
    }

    #[test]
    fn git_checkout_pulls_existing_clone() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport);

        git_checkout("orchestration", "https://github.com/stevencox/orchestration.git", "/opt/app")
            .apply(&ctx, Mode::Install)
            .unwrap();

        let commands = transport.commands();
        assert!(commands[0].contains("if [ -d '/opt/app/orchestration'/.git ]"));
        assert!(commands[0].contains("git clone --quiet https://github.com/stevencox/orchestration.git"));
    }
}
