use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Remote directory that applications are installed under on every node.
pub const OPT: &str = "/opt/app";

/// Layout of an installation root (`STARS_HOME`) on the controlling machine.
///
/// The same layout is mirrored on cluster nodes, which see the installation root
/// through a shared mount.
#[derive(Debug, Clone)]
pub struct InstallPaths {
    root: PathBuf,
    conf: PathBuf,
}

impl InstallPaths {
    /// Validate `root` and derive the layout. `conf` overrides `<root>/conf`.
    pub fn new(root: impl Into<PathBuf>, conf: Option<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::config_invalid_value(
                "STARS_HOME",
                Some(root.display().to_string()),
                "must be set to the root directory of the stars installation",
            ));
        }
        let conf = conf.unwrap_or_else(|| root.join("conf"));
        Ok(Self { root, conf })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configuration files and templates.
    pub fn conf(&self) -> &Path {
        &self.conf
    }

    /// Application topology definitions.
    pub fn app(&self) -> PathBuf {
        self.root.join("app")
    }

    /// Unpacked third-party tooling.
    pub fn stack(&self) -> PathBuf {
        self.root.join("stack")
    }

    /// Downloaded distribution archives.
    pub fn dist(&self) -> PathBuf {
        self.root.join("dist")
    }

    /// Fleet inventories, one file per environment.
    pub fn inventory(&self) -> PathBuf {
        self.root.join("inventory")
    }

    /// Path to a file under `conf`, as a string suitable for remote commands.
    pub fn conf_file(&self, relative: &str) -> String {
        self.conf.join(relative).display().to_string()
    }

    /// Remote path of a checked-out application under [`OPT`].
    pub fn opt(name: &str) -> String {
        format!("{}/{}", OPT, name)
    }
}
