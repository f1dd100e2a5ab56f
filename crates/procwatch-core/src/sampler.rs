use crate::types::{ProcessRecord, ProcessStatus};
use std::collections::HashSet;
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind, Users};
use thiserror::Error;
use tracing::{debug, trace};

/// Why a single process was left out of a sample.
///
/// Never surfaced to callers of [`Sampler::sample`]; a failed probe only
/// means "skip this pid".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("process {0} exited during the scan")]
    Vanished(u32),

    #[error("access to process {0} denied")]
    AccessDenied(u32),

    #[error("process {0} is a zombie")]
    Zombie(u32),

    #[error("process {pid}: {field} unreadable")]
    Unreadable { pid: u32, field: &'static str },
}

/// OS view used by the sampler
pub trait ProcessSource {
    /// Refresh the OS view and return the pids visible right now
    fn refresh(&mut self) -> Vec<u32>;

    /// Read every attribute of one process
    fn probe(&self, pid: u32) -> Result<ProcessRecord, ProbeError>;
}

/// Process source backed by `sysinfo`
///
/// The `System` is kept between refreshes so CPU usage is averaged over the
/// interval since the previous refresh.
pub struct SysinfoSource {
    system: System,
    users: Users,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            users: Users::new(),
        }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::new()
            .with_cpu()
            .with_memory()
            .with_user(UpdateKind::OnlyIfNotSet)
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoSource {
    fn refresh(&mut self) -> Vec<u32> {
        self.system.refresh_memory();
        self.system.refresh_processes_specifics(Self::refresh_kind());
        self.users.refresh_list();

        // Linux lists userland threads alongside processes
        self.system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }

    fn probe(&self, pid: u32) -> Result<ProcessRecord, ProbeError> {
        let process = self
            .system
            .process(Pid::from_u32(pid))
            .ok_or(ProbeError::Vanished(pid))?;

        let status = ProcessStatus::from(process.status());
        if status == ProcessStatus::Zombie {
            return Err(ProbeError::Zombie(pid));
        }

        let name = process.name();
        if name.is_empty() {
            return Err(ProbeError::Unreadable { pid, field: "name" });
        }

        let cpu_percent = f64::from(process.cpu_usage());
        if !cpu_percent.is_finite() {
            return Err(ProbeError::Unreadable {
                pid,
                field: "cpu_percent",
            });
        }

        let total_memory = self.system.total_memory();
        if total_memory == 0 {
            return Err(ProbeError::Unreadable {
                pid,
                field: "memory_percent",
            });
        }
        let memory_percent = process.memory() as f64 / total_memory as f64 * 100.0;

        // Unresolvable owner is allowed, the record is kept
        let username = process
            .user_id()
            .and_then(|uid| self.users.get_user_by_id(uid))
            .map(|user| user.name().to_string());

        Ok(ProcessRecord::new(
            pid,
            name,
            username,
            cpu_percent,
            memory_percent,
            status,
            process.start_time(),
        ))
    }
}

/// Best-effort process sampler
pub struct Sampler<S: ProcessSource = SysinfoSource> {
    source: S,
}

impl Sampler<SysinfoSource> {
    pub fn new() -> Self {
        Self::with_source(SysinfoSource::new())
    }
}

impl Default for Sampler<SysinfoSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ProcessSource> Sampler<S> {
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    /// Take one sample of every visible process.
    ///
    /// Processes that exit, turn into zombies or deny access while the scan
    /// is running are skipped. Output order is whatever the OS enumeration
    /// produced.
    pub fn sample(&mut self) -> Vec<ProcessRecord> {
        let pids = self.source.refresh();
        let visible = pids.len();

        let source = &self.source;
        let mut seen = HashSet::with_capacity(visible);

        let records: Vec<ProcessRecord> = pids
            .into_iter()
            .filter(|pid| seen.insert(*pid))
            .filter_map(|pid| match source.probe(pid) {
                Ok(record) => Some(record),
                Err(e) => {
                    trace!("Skipping pid {}: {}", pid, e);
                    None
                }
            })
            .collect();

        debug!("Sampled {} of {} visible processes", records.len(), visible);
        records
    }

    /// Take and discard one sample, then wait long enough for the next
    /// sample to report meaningful CPU usage
    pub fn prime(&mut self) {
        let _ = self.sample();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
