//! Static role → hosts registry.
//!
//! Roles may overlap (head nodes commonly double as coordination nodes). The union of
//! every role's hosts is the universe of addressable hosts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Scheduler masters and control services.
    Head,
    Worker,
    Database,
    /// Coordination-service quorum members.
    Coordination,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Head, Role::Worker, Role::Database, Role::Coordination];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Head => "head",
            Role::Worker => "worker",
            Role::Database => "database",
            Role::Coordination => "coordination",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "head" | "heads" | "control" | "master" | "masters" => Ok(Role::Head),
            "worker" | "workers" | "work" => Ok(Role::Worker),
            "database" | "db" => Ok(Role::Database),
            "coordination" | "zookeeper" | "zk" => Ok(Role::Coordination),
            other => Err(Error::role_not_found(
                other,
                Role::ALL.iter().map(|r| r.to_string()).collect(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Topology {
    roles: BTreeMap<Role, Vec<String>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add hosts to a role, skipping hosts already present in that role.
    pub fn with_hosts<I, S>(mut self, role: Role, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.roles.entry(role).or_default();
        for host in hosts {
            let host = host.into();
            if !entry.contains(&host) {
                entry.push(host);
            }
        }
        self
    }

    pub fn hosts(&self, role: Role) -> &[String] {
        self.roles.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hosts for a set of roles, in role order, each host listed once.
    pub fn hosts_for(&self, roles: &[Role]) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for role in roles {
            for host in self.hosts(*role) {
                if !hosts.contains(host) {
                    hosts.push(host.clone());
                }
            }
        }
        hosts
    }

    /// Every addressable host.
    pub fn all_hosts(&self) -> Vec<String> {
        self.hosts_for(&Role::ALL)
    }

    pub fn roles_of(&self, host: &str) -> Vec<Role> {
        self.roles
            .iter()
            .filter(|(_, hosts)| hosts.iter().any(|h| h == host))
            .map(|(role, _)| *role)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Topology {
        Topology::new()
            .with_hosts(Role::Head, ["head0", "head1"])
            .with_hosts(Role::Worker, ["w0", "w1"])
            .with_hosts(Role::Coordination, ["head0", "head1", "dc2"])
    }

    #[test]
    fn roles_may_overlap() {
        let t = topology();
        assert_eq!(t.roles_of("head0"), vec![Role::Head, Role::Coordination]);
    }

    #[test]
    fn union_lists_each_host_once() {
        let t = topology();
        assert_eq!(t.all_hosts(), vec!["head0", "head1", "w0", "w1", "dc2"]);
    }

    #[test]
    fn unknown_role_has_no_hosts() {
        assert!(topology().hosts(Role::Database).is_empty());
    }

    #[test]
    fn parses_role_aliases() {
        assert_eq!("masters".parse::<Role>().unwrap(), Role::Head);
        assert_eq!("zookeeper".parse::<Role>().unwrap(), Role::Coordination);
        assert_eq!(
            "edge".parse::<Role>().unwrap_err().code.as_str(),
            "role.not_found"
        );
    }

    #[test]
    fn duplicate_hosts_in_a_role_are_ignored() {
        let t = Topology::new().with_hosts(Role::Worker, ["w0", "w0"]);
        assert_eq!(t.hosts(Role::Worker), ["w0".to_string()]);
    }
}
