use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One process as seen by a single sampling pass.
///
/// Records carry no identity across samples: the same `pid` in a later
/// sample may belong to a different process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub username: Option<String>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub status: ProcessStatus,
    /// Start time, Unix epoch seconds
    pub create_time: u64,
}

impl ProcessRecord {
    pub fn new(
        pid: u32,
        name: impl Into<String>,
        username: Option<String>,
        cpu_percent: f64,
        memory_percent: f64,
        status: ProcessStatus,
        create_time: u64,
    ) -> Self {
        Self {
            pid,
            name: name.into(),
            username,
            cpu_percent,
            memory_percent,
            status,
            create_time,
        }
    }

    /// Owner name, or an empty string when it could not be resolved
    pub fn username_or_empty(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    /// Start time as local wall-clock `HH:MM:SS`
    pub fn create_time_display(&self) -> String {
        local_time(self.create_time)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string())
    }
}

fn local_time(epoch_secs: u64) -> Option<DateTime<Local>> {
    let secs = i64::try_from(epoch_secs).ok()?;
    Local.timestamp_opt(secs, 0).single()
}

/// OS process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessStatus {
    Running,
    Sleeping,
    DiskSleep, // Uninterruptible sleep (usually I/O)
    Idle,
    Stopped,
    TracingStop,
    Zombie,
    Dead,
    Waking,
    Parked,
    Unknown,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Sleeping => "sleeping",
            ProcessStatus::DiskSleep => "disk-sleep",
            ProcessStatus::Idle => "idle",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::TracingStop => "tracing-stop",
            ProcessStatus::Zombie => "zombie",
            ProcessStatus::Dead => "dead",
            ProcessStatus::Waking => "waking",
            ProcessStatus::Parked => "parked",
            ProcessStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<sysinfo::ProcessStatus> for ProcessStatus {
    fn from(status: sysinfo::ProcessStatus) -> Self {
        use sysinfo::ProcessStatus as Os;
        match status {
            Os::Run => ProcessStatus::Running,
            Os::Sleep => ProcessStatus::Sleeping,
            Os::UninterruptibleDiskSleep => ProcessStatus::DiskSleep,
            Os::Idle => ProcessStatus::Idle,
            Os::Stop => ProcessStatus::Stopped,
            Os::Tracing => ProcessStatus::TracingStop,
            Os::Zombie => ProcessStatus::Zombie,
            Os::Dead => ProcessStatus::Dead,
            Os::Waking => ProcessStatus::Waking,
            Os::Parked => ProcessStatus::Parked,
            _ => ProcessStatus::Unknown,
        }
    }
}

/// Host-wide aggregate metrics for the stats panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub process_count: usize,
    pub collected_at: DateTime<Local>,
}
