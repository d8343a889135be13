//! Process-wide configuration.
//!
//! Two inputs are required before anything touches a host: the installation root
//! (`STARS_HOME`) and the application identifier (`STARS_APP`) that resolves to an
//! application file describing the cluster. Everything else has defaults that can be
//! overridden in the application file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths::InstallPaths;
use crate::topology::{Role, Topology};
use crate::utils::io;

pub const HOME_VAR: &str = "STARS_HOME";
pub const APP_VAR: &str = "STARS_APP";

/// Application file: the cluster's hosts plus overrides of built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Unprivileged account used on every node.
    pub user: String,

    #[serde(default)]
    pub conf: Option<PathBuf>,

    #[serde(default)]
    pub head_nodes: Vec<String>,
    #[serde(default)]
    pub work_nodes: Vec<String>,
    #[serde(default)]
    pub db_nodes: Vec<String>,
    #[serde(default)]
    pub zookeeper_nodes: Vec<String>,

    #[serde(default)]
    pub ssh: SshSettings,

    #[serde(default)]
    pub endpoints: Endpoints,

    /// Packages installed on every node, as (rpm query, package name).
    #[serde(default = "default_base_apps")]
    pub base_apps: Vec<BasePackage>,

    /// Distribution archives: name → URI, or a file name already present in `dist`.
    #[serde(default = "default_dist")]
    pub dist: BTreeMap<String, String>,

    #[serde(default = "default_orchestration_git_uri")]
    pub orchestration_git_uri: String,

    /// Services per fleet group, in stop order.
    #[serde(default = "default_fleet_services")]
    pub fleet_services: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub job_defaults: JobDefaults,

    #[serde(default = "default_zk_cli")]
    pub zk_cli: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshSettings {
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            identity_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    /// Service registry base URLs, tried in order.
    #[serde(default)]
    pub services: Vec<String>,
    /// Job scheduler base URLs, tried in order.
    #[serde(default)]
    pub scheduler: Vec<String>,
    /// Coordination servers as `host:port`. Defaults to the coordination nodes.
    #[serde(default)]
    pub coordination: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasePackage {
    pub query: String,
    pub package: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefaults {
    #[serde(default = "default_job_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_job_owner")]
    pub owner: String,
    #[serde(default = "default_job_user")]
    pub run_as_user: String,
    #[serde(default = "default_job_schedule")]
    pub schedule: String,
    /// `[attribute, operator, value]` triples.
    #[serde(default)]
    pub constraints: Vec<[String; 3]>,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            name_prefix: default_job_prefix(),
            owner: default_job_owner(),
            run_as_user: default_job_user(),
            schedule: default_job_schedule(),
            constraints: Vec::new(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_ssh_port() -> u16 {
    22
}

fn default_base_apps() -> Vec<BasePackage> {
    [
        ("python-virtualenv", "python-virtualenv"),
        ("git-", "git"),
        ("emacs-24", "emacs"),
    ]
    .into_iter()
    .map(|(query, package)| BasePackage {
        query: query.to_string(),
        package: package.to_string(),
    })
    .collect()
}

fn default_dist() -> BTreeMap<String, String> {
    [
        ("spark", "http://apache.arvixe.com/spark/spark-1.5.0/spark-1.5.0-bin-hadoop2.6.tgz"),
        ("scala", "http://www.scala-lang.org/files/archive/scala-2.10.4.tgz"),
        ("jdk", "jdk-8u60-linux-x64.tar.gz"),
        ("maven", "http://apache.mirrors.lucidnetworks.net/maven/maven-3/3.3.3/binaries/apache-maven-3.3.3-bin.tar.gz"),
        ("mongodb", "https://fastdl.mongodb.org/linux/mongodb-linux-x86_64-rhel70-3.0.6.tgz"),
        ("node", "https://nodejs.org/dist/v0.12.7/node-v0.12.7-linux-x64.tar.gz"),
        ("hadoop", "http://apache.arvixe.com/hadoop/common/hadoop-2.6.0/hadoop-2.6.0.tar.gz"),
        ("tachyon", "http://tachyon-project.org/downloads/files/0.7.1/tachyon-0.7.1-bin.tar.gz"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_orchestration_git_uri() -> String {
    "https://github.com/stevencox/orchestration.git".to_string()
}

fn default_fleet_services() -> BTreeMap<String, Vec<String>> {
    let mut services = BTreeMap::new();
    services.insert(
        "masters".to_string(),
        ["mesos-dns", "marathon", "mesos-master", "zookeeper"]
            .map(String::from)
            .to_vec(),
    );
    services.insert(
        "workers".to_string(),
        ["mesos-slave", "docker"].map(String::from).to_vec(),
    );
    services
}

fn default_job_prefix() -> String {
    "datacommonscwl".to_string()
}

fn default_job_owner() -> String {
    "ops@localhost".to_string()
}

fn default_job_user() -> String {
    "root".to_string()
}

fn default_job_schedule() -> String {
    "R/3000-01-01T00:00:00Z/PT60M".to_string()
}

fn default_zk_cli() -> String {
    "/usr/share/zookeeper/bin/zkCli.sh".to_string()
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: AppConfig = io::read_json(path, "read application file")?;
        if config.user.trim().is_empty() {
            return Err(Error::config_missing_key(
                "user",
                Some(path.display().to_string()),
            ));
        }
        Ok(config)
    }

    pub fn topology(&self) -> Topology {
        Topology::new()
            .with_hosts(Role::Head, self.head_nodes.iter().cloned())
            .with_hosts(Role::Worker, self.work_nodes.iter().cloned())
            .with_hosts(Role::Database, self.db_nodes.iter().cloned())
            .with_hosts(Role::Coordination, self.zookeeper_nodes.iter().cloned())
    }

    /// Archive source for `name`: the application's entry, else the built-in one.
    pub fn dist_source(&self, name: &str) -> Option<String> {
        self.dist
            .get(name)
            .cloned()
            .or_else(|| default_dist().remove(name))
    }

    /// Coordination servers as a `host:port,...` connect string.
    pub fn coordination_servers(&self) -> String {
        if self.endpoints.coordination.is_empty() {
            self.zookeeper_nodes
                .iter()
                .map(|h| format!("{}:2181", h))
                .collect::<Vec<_>>()
                .join(",")
        } else {
            self.endpoints.coordination.join(",")
        }
    }
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub paths: InstallPaths,
    pub app: AppConfig,
    pub app_path: PathBuf,
}

impl Settings {
    /// Load from explicit values, falling back to `STARS_HOME` / `STARS_APP`.
    pub fn load(home: Option<&str>, app: Option<&str>) -> Result<Self> {
        let home = resolve_var(home, HOME_VAR)?;
        let app = resolve_var(app, APP_VAR)?;

        let root = PathBuf::from(shellexpand::tilde(&home).to_string());
        let probe = InstallPaths::new(&root, None)?;
        let app_path = resolve_app_path(&probe, &app)?;
        let app = AppConfig::load(&app_path)?;

        let conf = app.conf.as_ref().map(|c| {
            if c.is_absolute() {
                c.clone()
            } else {
                root.join(c)
            }
        });
        let paths = InstallPaths::new(root, conf)?;

        Ok(Self {
            paths,
            app,
            app_path,
        })
    }
}

fn resolve_var(explicit: Option<&str>, var: &str) -> Result<String> {
    if let Some(value) = explicit.filter(|v| !v.trim().is_empty()) {
        return Ok(value.to_string());
    }
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::config_missing_key(var, None))
}

/// An application identifier is either a path to an application file or a name
/// resolved under `<root>/app/<name>.json`.
fn resolve_app_path(paths: &InstallPaths, app: &str) -> Result<PathBuf> {
    let direct = PathBuf::from(shellexpand::tilde(app).to_string());
    if direct.is_file() {
        return Ok(direct);
    }

    let named = paths.app().join(format!("{}.json", app));
    if named.is_file() {
        return Ok(named);
    }

    Err(Error::config_invalid_value(
        APP_VAR,
        Some(app.to_string()),
        format!(
            "must name an application file or a definition in {}",
            paths.app().display()
        ),
    ))
}
