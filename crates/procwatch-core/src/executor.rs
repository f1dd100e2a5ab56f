use crate::types::{ProcessRecord, ProcessStatus};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fmt;
use sysinfo::{ProcessRefreshKind, System};
use tracing::{info, warn};

/// Process action executor
pub struct ProcessExecutor;

/// Reason a termination request was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refusal {
    InvalidPid,
    NotFound,
    AlreadyExited,
    Reused,
    PermissionDenied,
    Os(Errno),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::InvalidPid => f.write_str("invalid pid"),
            Refusal::NotFound => f.write_str("no such process"),
            Refusal::AlreadyExited => f.write_str("process already exited"),
            Refusal::Reused => f.write_str("pid now belongs to a different process"),
            Refusal::PermissionDenied => f.write_str("permission denied"),
            Refusal::Os(errno) => write!(f, "{}", errno),
        }
    }
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Ask a process to terminate (single SIGTERM).
    ///
    /// The process is looked up live at call time. Returns `false` when it
    /// does not exist, already exited, or the signal is refused by the OS.
    /// No retry and no SIGKILL escalation.
    pub fn terminate(pid: u32) -> bool {
        Self::report(pid, Self::try_terminate(pid, None))
    }

    /// Like [`terminate`](Self::terminate), but only if the live process
    /// still has the record's start time, so a recycled pid is left alone
    pub fn terminate_record(record: &ProcessRecord) -> bool {
        Self::report(
            record.pid,
            Self::try_terminate(record.pid, Some(record.create_time)),
        )
    }

    fn report(pid: u32, result: Result<(), Refusal>) -> bool {
        match result {
            Ok(()) => {
                info!("Sent SIGTERM to process {}", pid);
                true
            }
            Err(reason) => {
                warn!("Not terminating process {}: {}", pid, reason);
                false
            }
        }
    }

    fn try_terminate(pid: u32, expected_start: Option<u64>) -> Result<(), Refusal> {
        // pid 0 and negative values would signal whole process groups
        let raw = i32::try_from(pid).map_err(|_| Refusal::InvalidPid)?;
        if raw <= 0 {
            return Err(Refusal::InvalidPid);
        }

        let (status, start_time) = Self::lookup(pid).ok_or(Refusal::NotFound)?;

        if matches!(status, ProcessStatus::Zombie | ProcessStatus::Dead) {
            return Err(Refusal::AlreadyExited);
        }

        if let Some(expected) = expected_start {
            if expected != start_time {
                return Err(Refusal::Reused);
            }
        }

        kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|e| match e {
            Errno::ESRCH => Refusal::AlreadyExited,
            Errno::EPERM => Refusal::PermissionDenied,
            other => Refusal::Os(other),
        })
    }

    /// Live status and start time of `pid`
    ///
    /// Thread ids are not processes: signalling one would hit its whole
    /// thread group, so they are reported as not found.
    fn lookup(pid: u32) -> Option<(ProcessStatus, u64)> {
        let os_pid = sysinfo::Pid::from_u32(pid);
        let mut system = System::new();

        // A full listing is needed for sysinfo to tell threads apart
        system.refresh_processes_specifics(ProcessRefreshKind::new());

        system
            .process(os_pid)
            .filter(|p| p.thread_kind().is_none())
            .map(|p| (ProcessStatus::from(p.status()), p.start_time()))
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}
