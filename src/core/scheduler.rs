//! Job scheduler client (Chronos-style REST API).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::config::JobDefaults;
use crate::core::http::ApiClient;
use crate::error::{Error, Result};

/// ISO 8601 repeating interval: `R[n]/<start>/<period>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// `None` repeats forever.
    pub repeat: Option<u32>,
    pub start: String,
    pub period: String,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repeat {
            Some(n) => write!(f, "R{}/{}/{}", n, self.start, self.period),
            None => write!(f, "R/{}/{}", self.start, self.period),
        }
    }
}

impl FromStr for Schedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |problem: &str| {
            Error::validation_invalid_argument("schedule", problem, Some(s.to_string()), None)
        };

        let parts: Vec<&str> = s.trim().split('/').collect();
        let [repeat, start, period] = parts.as_slice() else {
            return Err(invalid("expected R[n]/<start>/<period>"));
        };

        let repeat = repeat
            .strip_prefix('R')
            .ok_or_else(|| invalid("must start with R"))?;
        let repeat = if repeat.is_empty() {
            None
        } else {
            Some(
                repeat
                    .parse::<u32>()
                    .map_err(|_| invalid("repeat count must be a number"))?,
            )
        };

        if start.is_empty() || !period.starts_with('P') {
            return Err(invalid("start must be set and period must be an ISO 8601 duration"));
        }

        Ok(Self {
            repeat,
            start: start.to_string(),
            period: period.to_string(),
        })
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|e: Error| serde::de::Error::custom(e.message))
    }
}

/// Placement constraint, serialized as `[attribute, operator, value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub attribute: String,
    pub operator: String,
    pub value: String,
}

impl Constraint {
    pub fn new(attribute: &str, operator: &str, value: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            operator: operator.to_string(),
            value: value.to_string(),
        }
    }
}

impl From<[String; 3]> for Constraint {
    fn from([attribute, operator, value]: [String; 3]) -> Self {
        Self {
            attribute,
            operator,
            value,
        }
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [&self.attribute, &self.operator, &self.value].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        <[String; 3]>::deserialize(deserializer).map(Constraint::from)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub command: String,
    pub owner: String,
    #[serde(rename = "runAsUser")]
    pub run_as_user: String,
    pub schedule: Schedule,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub execute_now: bool,
}

impl Job {
    /// A job for `command` using the configured owner, user, schedule and constraints.
    pub fn from_defaults(name: &str, command: &str, defaults: &JobDefaults) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            command: command.to_string(),
            owner: defaults.owner.clone(),
            run_as_user: defaults.run_as_user.clone(),
            schedule: defaults.schedule.parse()?,
            constraints: defaults
                .constraints
                .iter()
                .cloned()
                .map(Constraint::from)
                .collect(),
            execute_now: false,
        })
    }
}

/// Job submission seam. The HTTP client implements it; tests record submissions.
pub trait JobScheduler: Send + Sync {
    fn add_job(&self, job: &Job) -> Result<()>;
}

pub struct SchedulerClient {
    api: ApiClient,
}

impl SchedulerClient {
    pub fn new(endpoints: &[String]) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new("endpoints.scheduler", endpoints)?,
        })
    }

    pub fn list_jobs(&self) -> Result<Vec<Value>> {
        let url = "/scheduler/jobs";
        match self.api.get(url)? {
            Value::Array(jobs) => Ok(jobs),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::api_response_invalid(
                url,
                format!("expected a job list, got {}", other),
            )),
        }
    }

    /// Trigger `name` now, outside its schedule.
    pub fn run_job(&self, name: &str) -> Result<()> {
        log_status!("scheduler", "Running job {}", name);
        self.api
            .put(&format!("/scheduler/job/{}", name), &Value::Null)
            .map(|_| ())
    }

    pub fn delete_job(&self, name: &str) -> Result<()> {
        log_status!("scheduler", "Deleting job {}", name);
        self.api
            .delete(&format!("/scheduler/job/{}", name))
            .map(|_| ())
    }
}

impl JobScheduler for SchedulerClient {
    fn add_job(&self, job: &Job) -> Result<()> {
        log_status!("scheduler", "Submitting job {}: {}", job.name, job.command);
        let body = serde_json::to_value(job)
            .map_err(|e| Error::internal_json(e.to_string(), Some("serialize job".to_string())))?;
        self.api.post("/scheduler/iso8601", &body).map(|_| ())
    }
}
