use crate::{
    error::Result,
    executor::ProcessExecutor,
    export::{ExportFormat, Exporter},
    ranking::{SortKey, SortPolicy, SortSpec},
    sampler::{ProcessSource, Sampler, SysinfoSource},
    stats::StatsCollector,
    types::{ProcessRecord, SystemStats},
};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::{debug, info};

/// Outcome of an interactive refresh
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh {
    /// Fresh sample and the sort it was ranked by
    Completed(Vec<ProcessRecord>, SortSpec),
    /// Another sample was already running; this request was dropped
    Busy,
}

/// Owning context for the sampling pipeline
///
/// Holds the active sort, the shared sampler and the stats collector. Each
/// sits behind its own lock, so collecting stats never waits for a process
/// sample and a sort change never lands in the middle of a rank.
pub struct ProcessMonitor<S: ProcessSource = SysinfoSource> {
    sampler: Mutex<Sampler<S>>,
    sort: Mutex<SortSpec>,
    policy: SortPolicy,
    stats: Mutex<StatsCollector>,
    exporter: Exporter,
}

impl ProcessMonitor<SysinfoSource> {
    pub fn new() -> Self {
        Self::with_sampler(Sampler::new())
    }
}

impl Default for ProcessMonitor<SysinfoSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ProcessSource> ProcessMonitor<S> {
    pub fn with_sampler(sampler: Sampler<S>) -> Self {
        Self {
            sampler: Mutex::new(sampler),
            sort: Mutex::new(SortSpec::default()),
            policy: SortPolicy::default(),
            stats: Mutex::new(StatsCollector::new()),
            exporter: Exporter::default(),
        }
    }

    pub fn with_sort(self, spec: SortSpec) -> Self {
        *lock(&self.sort) = spec;
        self
    }

    pub fn with_policy(mut self, policy: SortPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_stats_collector(mut self, collector: StatsCollector) -> Self {
        self.stats = Mutex::new(collector);
        self
    }

    pub fn with_exporter(mut self, exporter: Exporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn sort_spec(&self) -> SortSpec {
        *lock(&self.sort)
    }

    pub fn policy(&self) -> SortPolicy {
        self.policy
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    /// Apply a sort request on `key` according to the configured policy
    pub fn set_sort(&self, key: SortKey) -> SortSpec {
        let mut spec = lock(&self.sort);
        *spec = spec.toggled(key, self.policy);
        debug!("Sort changed to {}", *spec);
        *spec
    }

    /// Replace the active sort outright
    pub fn set_sort_spec(&self, spec: SortSpec) {
        *lock(&self.sort) = spec;
        debug!("Sort set to {}", spec);
    }

    /// Sample and rank, unless another sample is already in flight
    pub fn refresh(&self) -> Refresh {
        let mut sampler = match self.sampler.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                debug!("Refresh skipped, a sample is already running");
                return Refresh::Busy;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let records = sampler.sample();
        drop(sampler);

        let spec = self.sort_spec();
        Refresh::Completed(spec.apply(records), spec)
    }

    /// Sample and rank, waiting for any sample in flight to finish first
    pub fn snapshot(&self) -> Vec<ProcessRecord> {
        let records = lock(&self.sampler).sample();
        self.sort_spec().apply(records)
    }

    /// Prime CPU accounting so the next sample reports real usage
    pub fn prime(&self) {
        lock(&self.sampler).prime();
    }

    pub fn terminate(&self, pid: u32) -> bool {
        ProcessExecutor::terminate(pid)
    }

    /// Terminate the process a sampled record describes, unless its pid has
    /// since been reused
    pub fn terminate_record(&self, record: &ProcessRecord) -> bool {
        ProcessExecutor::terminate_record(record)
    }

    /// Write a freshly sampled, ranked snapshot and return its path
    pub fn export_snapshot(&self, format: ExportFormat) -> Result<PathBuf> {
        let records = self.snapshot();
        let path = self.exporter.write(&records, format)?;
        info!("Snapshot of {} processes saved as {}", records.len(), format);
        Ok(path)
    }

    pub fn collect_stats(&self) -> SystemStats {
        lock(&self.stats).collect()
    }
}

/// Lock, recovering the data if a previous holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::ProbeError;
    use crate::types::ProcessStatus;
    use crate::Error;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    struct TableSource {
        table: Vec<ProcessRecord>,
    }

    impl ProcessSource for TableSource {
        fn refresh(&mut self) -> Vec<u32> {
            self.table.iter().map(|r| r.pid).collect()
        }

        fn probe(&self, pid: u32) -> std::result::Result<ProcessRecord, ProbeError> {
            self.table
                .iter()
                .find(|r| r.pid == pid)
                .cloned()
                .ok_or(ProbeError::Vanished(pid))
        }
    }

    /// Source whose refresh blocks until released
    struct GatedSource {
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl ProcessSource for GatedSource {
        fn refresh(&mut self) -> Vec<u32> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            Vec::new()
        }

        fn probe(&self, pid: u32) -> std::result::Result<ProcessRecord, ProbeError> {
            Err(ProbeError::Vanished(pid))
        }
    }

    fn record(pid: u32, cpu: f64, mem: f64) -> ProcessRecord {
        ProcessRecord::new(
            pid,
            format!("p{}", pid),
            None,
            cpu,
            mem,
            ProcessStatus::Running,
            1_700_000_000,
        )
    }

    fn monitor_with(table: Vec<ProcessRecord>) -> ProcessMonitor<TableSource> {
        ProcessMonitor::with_sampler(Sampler::with_source(TableSource { table }))
    }

    fn pids(records: &[ProcessRecord]) -> Vec<u32> {
        records.iter().map(|r| r.pid).collect()
    }

    #[test]
    fn test_default_sort_is_memory_descending() {
        let monitor = monitor_with(Vec::new());
        assert_eq!(
            monitor.sort_spec(),
            SortSpec::new(SortKey::MemoryPercent, true)
        );
        assert_eq!(monitor.policy(), SortPolicy::Toggle);
    }

    #[test]
    fn test_refresh_uses_active_sort() {
        let monitor = monitor_with(vec![record(1, 50.0, 10.0), record(2, 90.0, 5.0)]);

        let by_cpu = SortSpec::new(SortKey::CpuPercent, true);
        monitor.set_sort_spec(by_cpu);
        assert_eq!(
            monitor.refresh(),
            Refresh::Completed(monitor.snapshot(), by_cpu)
        );

        match monitor.refresh() {
            Refresh::Completed(records, _) => assert_eq!(pids(&records), vec![2, 1]),
            Refresh::Busy => panic!("nothing else is sampling"),
        }

        monitor.set_sort_spec(SortSpec::new(SortKey::MemoryPercent, false));
        assert_eq!(pids(&monitor.snapshot()), vec![2, 1]);
    }

    #[test]
    fn test_refresh_reports_the_sort_it_used() {
        let monitor = monitor_with(vec![record(1, 50.0, 10.0), record(2, 90.0, 5.0)]);

        let result = monitor.refresh();
        monitor.set_sort(SortKey::Pid);

        match result {
            Refresh::Completed(records, spec) => {
                assert_eq!(spec, SortSpec::new(SortKey::MemoryPercent, true));
                assert_eq!(pids(&records), vec![1, 2]);
            }
            Refresh::Busy => panic!("nothing else is sampling"),
        }
        assert_ne!(monitor.sort_spec(), SortSpec::new(SortKey::MemoryPercent, true));
    }

    #[test]
    fn test_set_sort_toggle_policy() {
        let monitor = monitor_with(Vec::new());

        let spec = monitor.set_sort(SortKey::CpuPercent);
        assert_eq!(spec, SortSpec::new(SortKey::CpuPercent, false));

        let spec = monitor.set_sort(SortKey::CpuPercent);
        assert_eq!(spec, SortSpec::new(SortKey::CpuPercent, true));
        assert_eq!(monitor.sort_spec(), spec);
    }

    #[test]
    fn test_set_sort_reset_policy() {
        let monitor = monitor_with(Vec::new()).with_policy(SortPolicy::ResetOnNewKey);

        assert_eq!(
            monitor.set_sort(SortKey::Name),
            SortSpec::new(SortKey::Name, false)
        );
        assert_eq!(
            monitor.set_sort(SortKey::Name),
            SortSpec::new(SortKey::Name, true)
        );
        assert_eq!(
            monitor.set_sort(SortKey::Pid),
            SortSpec::new(SortKey::Pid, true)
        );
    }

    #[test]
    fn test_with_sort_overrides_default() {
        let spec = SortSpec::new(SortKey::Pid, false);
        let monitor = monitor_with(Vec::new()).with_sort(spec);
        assert_eq!(monitor.sort_spec(), spec);
    }

    #[test]
    fn test_refresh_while_sampling_is_busy() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let monitor = Arc::new(ProcessMonitor::with_sampler(Sampler::with_source(
            GatedSource {
                entered: entered_tx,
                release: release_rx,
            },
        )));

        let background = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.refresh())
        };

        entered_rx.recv().expect("background refresh must start");
        assert_eq!(monitor.refresh(), Refresh::Busy);

        // Sort changes stay available while sampling
        monitor.set_sort(SortKey::Pid);

        release_tx.send(()).unwrap();
        // Ranked after sampling, so the change made meanwhile applies
        assert_eq!(
            background.join().unwrap(),
            Refresh::Completed(Vec::new(), SortSpec::new(SortKey::Pid, false))
        );
    }

    #[test]
    fn test_terminate_missing_pid_keeps_state() {
        let monitor = monitor_with(vec![record(1, 1.0, 1.0)]);
        let before = monitor.sort_spec();

        assert!(!monitor.terminate(4_194_305));
        assert_eq!(monitor.sort_spec(), before);
    }

    #[test]
    fn test_export_snapshot_json_is_ranked() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_with(vec![record(1, 50.0, 10.0), record(2, 90.0, 5.0)])
            .with_sort(SortSpec::new(SortKey::CpuPercent, true))
            .with_exporter(Exporter::new(dir.path()));

        let path = monitor.export_snapshot(ExportFormat::Json).unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let parsed: Vec<ProcessRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, vec![record(2, 90.0, 5.0), record(1, 50.0, 10.0)]);
    }

    #[test]
    fn test_export_snapshot_empty_csv() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_with(Vec::new()).with_exporter(Exporter::new(dir.path()));

        let path = monitor.export_snapshot(ExportFormat::Csv).unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            text,
            "pid,name,username,cpu_percent,memory_percent,status,create_time\r\n"
        );
    }

    #[test]
    fn test_export_snapshot_io_error_propagates() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_with(vec![record(1, 1.0, 1.0)])
            .with_exporter(Exporter::new(dir.path().join("missing")));

        let result = monitor.export_snapshot(ExportFormat::Json);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_collect_stats_in_range() {
        let monitor = monitor_with(Vec::new());
        let stats = monitor.collect_stats();

        assert!((0.0..=100.0).contains(&stats.memory_percent));
        assert!((0.0..=100.0).contains(&stats.disk_percent));
    }
}
