//! Host-wide aggregate metrics
//!
//! The collector never fails: any metric the OS cannot provide is reported
//! as 0, since the values only feed a display panel.

use crate::types::SystemStats;
use chrono::Local;
use std::path::{Path, PathBuf};
use sysinfo::{Disks, ProcessRefreshKind, System};
use tracing::debug;

/// Space figures for one mounted filesystem
#[derive(Debug, Clone, PartialEq)]
pub struct DiskUsage {
    pub mount_point: PathBuf,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Aggregate stats collector
///
/// Keeps its own `System`, independent of the process sampler, so both can
/// run on separate timelines.
pub struct StatsCollector {
    system: System,
    disks: Disks,
    disk_path: PathBuf,
}

impl StatsCollector {
    /// Collector reporting disk usage of the filesystem holding `/`
    pub fn new() -> Self {
        Self::for_disk_path("/")
    }

    pub fn for_disk_path(path: impl Into<PathBuf>) -> Self {
        Self {
            system: System::new(),
            disks: Disks::new(),
            disk_path: path.into(),
        }
    }

    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }

    pub fn collect(&mut self) -> SystemStats {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_processes_specifics(ProcessRefreshKind::new());
        self.disks.refresh_list();

        let cpu_percent = sanitize_percent(f64::from(self.system.global_cpu_info().cpu_usage()));
        let memory_percent = percent(self.system.used_memory(), self.system.total_memory());

        let mounts: Vec<DiskUsage> = self
            .disks
            .list()
            .iter()
            .map(|disk| DiskUsage {
                mount_point: disk.mount_point().to_path_buf(),
                total_bytes: disk.total_space(),
                available_bytes: disk.available_space(),
            })
            .collect();
        let disk_percent = disk_percent(&self.disk_path, &mounts);

        let stats = SystemStats {
            cpu_percent,
            memory_percent,
            disk_percent,
            process_count: self
                .system
                .processes()
                .values()
                .filter(|p| p.thread_kind().is_none())
                .count(),
            collected_at: Local::now(),
        };

        debug!(
            "Stats: cpu={:.1}% mem={:.1}% disk={:.1}% procs={}",
            stats.cpu_percent, stats.memory_percent, stats.disk_percent, stats.process_count
        );
        stats
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// `used / total` as a percentage, 0 when the total is unknown
pub fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    sanitize_percent(used as f64 / total as f64 * 100.0)
}

/// Clamp into 0..=100, non-finite values become 0
pub fn sanitize_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Usage of the filesystem whose mount point is the longest prefix of `path`
pub fn disk_percent(path: &Path, mounts: &[DiskUsage]) -> f64 {
    mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.components().count())
        .map(|m| {
            percent(
                m.total_bytes.saturating_sub(m.available_bytes),
                m.total_bytes,
            )
        })
        .unwrap_or(0.0)
}
