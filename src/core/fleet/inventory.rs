//! YAML host inventory, one file per environment.
//!
//! ```yaml
//! masters:
//!   hosts:
//!     h0:
//!     h1:
//!       ansible_host: 10.0.0.11
//!       ansible_user: centos
//!       ansible_port: 2222
//! workers:
//!   hosts:
//!     w0:
//! cluster:
//!   children:
//!     masters:
//!     workers:
//! ```
//!
//! Group `all` is implicit and holds every host in order of first appearance.

use serde::{Deserialize, Serialize};
use serde_yml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::io;

pub const ALL_GROUP: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryHost {
    pub name: String,
    /// Address to connect to; the inventory name unless overridden.
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct HostVars {
    ansible_host: Option<String>,
    ansible_user: Option<String>,
    ansible_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct GroupDef {
    #[serde(default)]
    hosts: Option<Mapping>,
    #[serde(default)]
    children: Option<Mapping>,
}

#[derive(Debug, Clone)]
pub struct Inventory {
    source: String,
    groups: Vec<(String, Vec<String>, Vec<String>)>,
    hosts: Vec<InventoryHost>,
}

fn key_name(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Inventory {
    pub fn parse(source: &str, content: &str) -> Result<Self> {
        let invalid = |problem: String| {
            Error::config_invalid_value("inventory", Some(source.to_string()), problem)
        };

        let mut inventory = Inventory {
            source: source.to_string(),
            groups: Vec::new(),
            hosts: Vec::new(),
        };
        if content.trim().is_empty() {
            return Ok(inventory);
        }

        let document: Option<Mapping> =
            serde_yml::from_str(content).map_err(|e| invalid(e.to_string()))?;

        for (key, value) in document.unwrap_or_default() {
            let group = key_name(&key).ok_or_else(|| invalid("group names must be strings".into()))?;
            let def: GroupDef = match value {
                Value::Null => GroupDef::default(),
                other => serde_yml::from_value(other)
                    .map_err(|e| invalid(format!("group '{}': {}", group, e)))?,
            };

            let mut members = Vec::new();
            for (host_key, vars) in def.hosts.unwrap_or_default() {
                let name = key_name(&host_key)
                    .ok_or_else(|| invalid(format!("group '{}': host names must be strings", group)))?;
                let vars: HostVars = match vars {
                    Value::Null => HostVars::default(),
                    other => serde_yml::from_value(other)
                        .map_err(|e| invalid(format!("host '{}': {}", name, e)))?,
                };
                inventory.add_host(&name, vars);
                members.push(name);
            }

            let children = def
                .children
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(k, _)| key_name(&k))
                .collect();

            inventory.groups.push((group, members, children));
        }

        Ok(inventory)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = io::read_file(path, "read inventory")?;
        Self::parse(&path.display().to_string(), &content)
    }

    /// Resolve `environment` as a direct file path, or as `<dir>/<environment>.yml`
    /// (`.yaml` also accepted).
    pub fn resolve(dir: &Path, environment: &str) -> Result<Self> {
        let direct = PathBuf::from(shellexpand::tilde(environment).to_string());
        if direct.is_file() {
            return Self::load(&direct);
        }
        for ext in ["yml", "yaml"] {
            let candidate = dir.join(format!("{}.{}", environment, ext));
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }
        Err(Error::config_invalid_value(
            "inventory",
            Some(environment.to_string()),
            format!("no inventory for this environment in {}", dir.display()),
        ))
    }

    fn add_host(&mut self, name: &str, vars: HostVars) {
        if let Some(existing) = self.hosts.iter_mut().find(|h| h.name == name) {
            if let Some(address) = vars.ansible_host {
                existing.address = address;
            }
            existing.user = vars.ansible_user.or(existing.user.take());
            existing.port = vars.ansible_port.or(existing.port);
            return;
        }
        self.hosts.push(InventoryHost {
            name: name.to_string(),
            address: vars.ansible_host.unwrap_or_else(|| name.to_string()),
            user: vars.ansible_user,
            port: vars.ansible_port,
        });
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|(n, _, _)| n.clone()).collect();
        if !names.iter().any(|n| n == ALL_GROUP) {
            names.insert(0, ALL_GROUP.to_string());
        }
        names
    }

    /// Hosts in `group`, including those of child groups, without duplicates.
    pub fn group(&self, group: &str) -> Result<Vec<InventoryHost>> {
        if group == ALL_GROUP && !self.groups.iter().any(|(n, _, _)| n == ALL_GROUP) {
            return Ok(self.hosts.clone());
        }

        let mut names = Vec::new();
        let mut visiting = Vec::new();
        self.collect(group, &mut names, &mut visiting)?;

        let by_name: BTreeMap<&str, &InventoryHost> =
            self.hosts.iter().map(|h| (h.name.as_str(), h)).collect();
        Ok(names
            .iter()
            .filter_map(|n| by_name.get(n.as_str()).map(|h| (*h).clone()))
            .collect())
    }

    fn collect(&self, group: &str, names: &mut Vec<String>, visiting: &mut Vec<String>) -> Result<()> {
        if visiting.iter().any(|v| v == group) {
            return Ok(());
        }
        let (_, members, children) = self
            .groups
            .iter()
            .find(|(n, _, _)| n == group)
            .ok_or_else(|| Error::inventory_group_not_found(group, self.group_names()))?;

        visiting.push(group.to_string());
        for member in members {
            if !names.contains(member) {
                names.push(member.clone());
            }
        }
        for child in children {
            self.collect(child, names, visiting)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const INVENTORY: &str = r#"
masters:
  hosts:
    h0:
    h1:
      ansible_host: 10.0.0.11
      ansible_user: centos
      ansible_port: 2222
workers:
  hosts:
    w0:
    w1:
cluster:
  children:
    masters:
    workers:
"#;

    #[test]
    fn parses_groups_and_overrides() {
        let inventory = Inventory::parse("test", INVENTORY).unwrap();
        let masters = inventory.group("masters").unwrap();

        assert_eq!(masters.len(), 2);
        assert_eq!(masters[0].address, "h0");
        assert_eq!(masters[1].address, "10.0.0.11");
        assert_eq!(masters[1].user.as_deref(), Some("centos"));
        assert_eq!(masters[1].port, Some(2222));
    }

    #[test]
    fn all_group_is_implicit() {
        let inventory = Inventory::parse("test", INVENTORY).unwrap();
        let names: Vec<String> = inventory.group("all").unwrap().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["h0", "h1", "w0", "w1"]);
        assert_eq!(inventory.group_names()[0], "all");
    }

    #[test]
    fn children_are_flattened() {
        let inventory = Inventory::parse("test", INVENTORY).unwrap();
        let names: Vec<String> = inventory.group("cluster").unwrap().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["h0", "h1", "w0", "w1"]);
    }

    #[test]
    fn unknown_group_lists_available() {
        let inventory = Inventory::parse("test", INVENTORY).unwrap();
        let err = inventory.group("dbs").unwrap_err();
        assert_eq!(err.code.as_str(), "inventory.group_not_found");
        assert_eq!(err.details["available"][1], "masters");
    }

    #[test]
    fn resolves_environment_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("prod.yml"), INVENTORY).unwrap();

        let inventory = Inventory::resolve(dir.path(), "prod").unwrap();
        assert!(inventory.source().ends_with("prod.yml"));

        let err = Inventory::resolve(dir.path(), "staging").unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn empty_inventory_has_no_hosts() {
        let inventory = Inventory::parse("empty", "").unwrap();
        assert!(inventory.group("all").unwrap().is_empty());
    }
}
