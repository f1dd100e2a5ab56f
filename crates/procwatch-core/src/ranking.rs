//! Deterministic ordering of a process sample

use crate::types::ProcessRecord;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Attribute a sample can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Pid,
    Name,
    Username,
    CpuPercent,
    MemoryPercent,
    Status,
    CreateTime,
}

impl SortKey {
    pub const ALL: [SortKey; 7] = [
        SortKey::Pid,
        SortKey::Name,
        SortKey::Username,
        SortKey::CpuPercent,
        SortKey::MemoryPercent,
        SortKey::Status,
        SortKey::CreateTime,
    ];

    /// Field name as used in exports and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Pid => "pid",
            SortKey::Name => "name",
            SortKey::Username => "username",
            SortKey::CpuPercent => "cpu_percent",
            SortKey::MemoryPercent => "memory_percent",
            SortKey::Status => "status",
            SortKey::CreateTime => "create_time",
        }
    }

    /// Column header for the process table
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Pid => "PID",
            SortKey::Name => "Name",
            SortKey::Username => "User",
            SortKey::CpuPercent => "CPU%",
            SortKey::MemoryPercent => "Memory%",
            SortKey::Status => "Status",
            SortKey::CreateTime => "Started",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SortKey::Pid | SortKey::CpuPercent | SortKey::MemoryPercent | SortKey::CreateTime
        )
    }

    /// Direction a freshly selected key starts with: biggest numbers first,
    /// text in alphabetical order
    pub fn default_descending(&self) -> bool {
        self.is_numeric()
    }

    fn compare(&self, a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
        match self {
            SortKey::Pid => a.pid.cmp(&b.pid),
            SortKey::Name => a.name.cmp(&b.name),
            // Missing owner sorts as the empty string
            SortKey::Username => a.username_or_empty().cmp(b.username_or_empty()),
            SortKey::CpuPercent => a.cpu_percent.total_cmp(&b.cpu_percent),
            SortKey::MemoryPercent => a.memory_percent.total_cmp(&b.memory_percent),
            SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
            SortKey::CreateTime => a.create_time.cmp(&b.create_time),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    /// Accepts field names, column labels and a few short aliases
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pid" => Ok(SortKey::Pid),
            "name" => Ok(SortKey::Name),
            "username" | "user" => Ok(SortKey::Username),
            "cpu_percent" | "cpu%" | "cpu" => Ok(SortKey::CpuPercent),
            "memory_percent" | "memory%" | "memory" | "mem" => Ok(SortKey::MemoryPercent),
            "status" | "state" => Ok(SortKey::Status),
            "create_time" | "started" | "start" => Ok(SortKey::CreateTime),
            _ => Err(Error::UnknownSortKey(s.to_string())),
        }
    }
}

/// How a sort request on a column changes the direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortPolicy {
    /// Every request flips the direction, whichever key is chosen
    #[default]
    Toggle,
    /// Same key flips the direction, a new key starts at its default direction
    ResetOnNewKey,
}

/// Active ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub descending: bool,
}

impl SortSpec {
    pub fn new(key: SortKey, descending: bool) -> Self {
        Self { key, descending }
    }

    /// Spec resulting from a sort request on `key`
    pub fn toggled(self, key: SortKey, policy: SortPolicy) -> Self {
        let descending = match policy {
            SortPolicy::Toggle => !self.descending,
            SortPolicy::ResetOnNewKey if key == self.key => !self.descending,
            SortPolicy::ResetOnNewKey => key.default_descending(),
        };
        Self { key, descending }
    }

    pub fn apply(&self, records: Vec<ProcessRecord>) -> Vec<ProcessRecord> {
        rank(records, self.key, self.descending)
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::MemoryPercent,
            descending: true,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.descending { "desc" } else { "asc" };
        write!(f, "{} {}", self.key, arrow)
    }
}

/// Order records by `key`.
///
/// The sort is stable in both directions: records with equal keys keep
/// their input order.
pub fn rank(mut records: Vec<ProcessRecord>, key: SortKey, descending: bool) -> Vec<ProcessRecord> {
    if descending {
        records.sort_by(|a, b| key.compare(b, a));
    } else {
        records.sort_by(|a, b| key.compare(a, b));
    }

    debug!(
        "Ranked {} records by {} ({})",
        records.len(),
        key,
        if descending { "desc" } else { "asc" }
    );
    records
}
