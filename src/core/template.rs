//! Configuration templates: render with safe substitution, deploy to the active host.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::utils::{io, shell, template};

/// Variable name → value. Values are plain strings; absent names render literally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    vars: BTreeMap<String, String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.vars.insert(name.into(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for RenderContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Self::new();
        for (k, v) in iter {
            ctx.insert(k, v);
        }
        ctx
    }
}

pub fn render_str(text: &str, context: &RenderContext) -> String {
    template::render_map(text, &context.vars)
}

/// Render the template file at `template_path`. Missing placeholders are kept.
pub fn render(template_path: &Path, context: &RenderContext) -> Result<String> {
    let text = io::read_file(template_path, "read template")?;
    Ok(render_str(&text, context))
}

fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Render and write to `destination` on the active host.
///
/// Returns `false` when the destination already holds identical content.
pub fn deploy(
    ctx: &ExecutionContext,
    template_path: &Path,
    context: &RenderContext,
    destination: &str,
    privileged: bool,
) -> Result<bool> {
    let rendered = render(template_path, context)?;
    deploy_content(ctx, rendered.as_bytes(), destination, privileged)
}

pub(crate) fn deploy_content(
    ctx: &ExecutionContext,
    content: &[u8],
    destination: &str,
    privileged: bool,
) -> Result<bool> {
    let digest = sha256_hex(content);

    let mut check = format!("sha256sum {} 2>/dev/null", shell::quote_path(destination));
    if privileged {
        check = format!("sudo -n {}", check);
    }
    let current = ctx.probe(&check)?;
    let unchanged = current.success
        && current
            .stdout
            .split_whitespace()
            .next()
            .is_some_and(|sum| sum == digest);

    if unchanged {
        log_status!("template", "[{}] {} unchanged", ctx.host_label(), destination);
        return Ok(false);
    }

    ctx.put(content, destination, privileged)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{context, RecordingTransport};
    use std::fs;

    fn template_file(body: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), body).unwrap();
        file
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        let file = template_file("Hello, ${NAME}!");
        assert_eq!(
            render(file.path(), &RenderContext::new()).unwrap(),
            "Hello, ${NAME}!"
        );
        assert_eq!(
            render(file.path(), &RenderContext::new().with("NAME", "World")).unwrap(),
            "Hello, World!"
        );
    }

    #[test]
    fn context_accepts_non_string_values() {
        let ctx: RenderContext = [("QUORUM", 2)].into_iter().collect();
        assert_eq!(render_str("quorum=$QUORUM", &ctx), "quorum=2");
    }

    #[test]
    fn render_missing_template_is_io_error() {
        let err = render(Path::new("/nonexistent/zoo.cfg"), &RenderContext::new()).unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn deploy_writes_when_content_differs() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport).on_host(Some("h0"));
        let file = template_file("server.1=$IPADDR:2888:3888");

        let written = deploy(
            &ctx,
            file.path(),
            &RenderContext::new().with("IPADDR", "10.0.0.1"),
            "/etc/zookeeper/conf/zoo.cfg",
            true,
        )
        .unwrap();

        assert!(written);
        let uploads = transport.uploads();
        assert_eq!(uploads[0].content, "server.1=10.0.0.1:2888:3888");
    }

    #[test]
    fn deploy_skips_identical_content() {
        let transport = RecordingTransport::new();
        let digest = sha256_hex(b"tickTime=2000");
        transport.respond("sha256sum", &format!("{}  /etc/zoo.cfg\n", digest));
        let ctx = context(&transport).on_host(Some("h0"));
        let file = template_file("tickTime=2000");

        let written = deploy(&ctx, file.path(), &RenderContext::new(), "/etc/zoo.cfg", false).unwrap();

        assert!(!written);
        assert!(transport.uploads().is_empty());
    }
}
