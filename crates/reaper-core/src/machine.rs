//! Machine records as returned by the CloudAPI

use crate::error::{ReaperError, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider timestamp format. Fractional seconds are optional on input.
pub const ISO_8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Parse a provider timestamp; the trailing `Z` means the value is UTC.
pub fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, ISO_8601_FORMAT).map(|naive| naive.and_utc())
}

/// Render a timestamp the way the provider does (millisecond precision).
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Machine lifecycle state
///
/// The provider's vocabulary may grow; anything not listed here is kept
/// verbatim in `Unknown` instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MachineState {
    Running,
    Stopped,
    Stopping,
    Provisioning,
    Deleted,
    Failed,
    Offline,
    Ready,
    Unknown(String),
}

impl MachineState {
    pub fn as_str(&self) -> &str {
        match self {
            MachineState::Running => "running",
            MachineState::Stopped => "stopped",
            MachineState::Stopping => "stopping",
            MachineState::Provisioning => "provisioning",
            MachineState::Deleted => "deleted",
            MachineState::Failed => "failed",
            MachineState::Offline => "offline",
            MachineState::Ready => "ready",
            MachineState::Unknown(other) => other,
        }
    }

    /// Only settled states may be stopped and deleted.
    pub fn is_reapable(&self) -> bool {
        matches!(self, MachineState::Running | MachineState::Stopped)
    }
}

impl From<&str> for MachineState {
    fn from(value: &str) -> Self {
        match value {
            "running" => MachineState::Running,
            "stopped" => MachineState::Stopped,
            "stopping" => MachineState::Stopping,
            "provisioning" => MachineState::Provisioning,
            "deleted" => MachineState::Deleted,
            "failed" => MachineState::Failed,
            "offline" => MachineState::Offline,
            "ready" => MachineState::Ready,
            other => MachineState::Unknown(other.to_string()),
        }
    }
}

impl From<String> for MachineState {
    fn from(value: String) -> Self {
        MachineState::from(value.as_str())
    }
}

impl From<MachineState> for String {
    fn from(state: MachineState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A virtual machine owned by the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub state: MachineState,
    /// Kept as the raw provider string; see [`Machine::created_at`].
    pub created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default)]
    pub ips: Vec<String>,
}

impl Machine {
    pub fn new(id: impl Into<String>, state: MachineState, created: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: None,
            state,
            created: format_timestamp(created),
            updated: None,
            package: None,
            ips: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Provisioning time. An unparsable value is a provider contract
    /// violation and is reported as [`ReaperError::InvalidTimestamp`].
    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.created).map_err(|source| ReaperError::InvalidTimestamp {
            machine_id: self.id.clone(),
            value: self.created.clone(),
            source,
        })
    }

    pub fn age(&self, now: DateTime<Utc>) -> Result<TimeDelta> {
        Ok(now - self.created_at()?)
    }
}
