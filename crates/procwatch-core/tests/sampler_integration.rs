// Integration tests for the sampling pipeline
// These tests read the live process table of the machine running them

use procwatch_core::{
    rank, ExportFormat, Exporter, ProcessExecutor, ProcessMonitor, ProcessRecord, Refresh,
    Sampler, SortKey, SortSpec, StatsCollector,
};
use std::collections::HashSet;
use std::process::Command;
#[cfg(target_os = "linux")]
use std::sync::{Arc, Barrier};
#[cfg(target_os = "linux")]
use std::thread::{self, JoinHandle};
use tempfile::TempDir;

#[test]
fn test_sample_contains_current_process() {
    let mut sampler = Sampler::new();
    let records = sampler.sample();

    let own_pid = std::process::id();
    assert!(records.iter().any(|r| r.pid == own_pid));
}

#[test]
fn test_sample_pids_are_unique() {
    let mut sampler = Sampler::new();
    let records = sampler.sample();

    let unique: HashSet<u32> = records.iter().map(|r| r.pid).collect();
    assert_eq!(unique.len(), records.len());
}

#[test]
fn test_sample_values_are_sane() {
    let mut sampler = Sampler::new();
    sampler.prime();

    for record in sampler.sample() {
        assert!(!record.name.is_empty());
        assert!(record.cpu_percent >= 0.0);
        assert!((0.0..=100.0).contains(&record.memory_percent));
        assert_ne!(record.status, procwatch_core::ProcessStatus::Zombie);
    }
}

/// Spawn `count` threads that stay alive until the returned barrier is passed
#[cfg(target_os = "linux")]
fn park_threads(count: usize) -> (Arc<Barrier>, Vec<JoinHandle<()>>) {
    let barrier = Arc::new(Barrier::new(count + 1));
    let workers = (0..count)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
            })
        })
        .collect();
    (barrier, workers)
}

#[cfg(target_os = "linux")]
fn release_threads(barrier: Arc<Barrier>, workers: Vec<JoinHandle<()>>) {
    barrier.wait();
    for worker in workers {
        worker.join().expect("worker thread panicked");
    }
}

/// Numeric entries under `dir`: pids for /proc, thread ids for a task dir
#[cfg(target_os = "linux")]
fn numeric_entries(dir: &str) -> Vec<u32> {
    std::fs::read_dir(dir)
        .expect("procfs must be mounted")
        .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
        .collect()
}

#[cfg(target_os = "linux")]
#[test]
fn test_sample_excludes_threads() {
    let (barrier, workers) = park_threads(4);

    let own_pid = std::process::id();
    let thread_ids: Vec<u32> = numeric_entries("/proc/self/task")
        .into_iter()
        .filter(|tid| *tid != own_pid)
        .collect();
    assert!(thread_ids.len() >= 4);

    let records = Sampler::new().sample();
    release_threads(barrier, workers);

    assert!(records.iter().any(|r| r.pid == own_pid));
    let sampled_threads: Vec<u32> = records
        .iter()
        .map(|r| r.pid)
        .filter(|pid| thread_ids.contains(pid))
        .collect();
    assert!(
        sampled_threads.is_empty(),
        "thread ids sampled as processes: {:?}",
        sampled_threads
    );
}

#[cfg(target_os = "linux")]
#[test]
fn test_process_count_excludes_threads() {
    let (barrier, workers) = park_threads(32);

    let visible = numeric_entries("/proc").len();
    let stats = StatsCollector::new().collect();
    release_threads(barrier, workers);

    // Slack for processes started between the two reads
    assert!(
        stats.process_count <= visible + 16,
        "process_count {} vs {} entries in /proc",
        stats.process_count,
        visible
    );
}

#[test]
fn test_terminated_child_disappears_from_sample() {
    let mut child = Command::new("sleep")
        .arg("60")
        .spawn()
        .expect("Failed to spawn test process");
    let pid = child.id();

    let mut sampler = Sampler::new();
    assert!(sampler.sample().iter().any(|r| r.pid == pid));

    assert!(ProcessExecutor::terminate(pid));
    child.wait().expect("Failed to reap child");

    assert!(sampler.sample().iter().all(|r| r.pid != pid));
}

#[test]
fn test_live_sample_ranking_is_stable() {
    let mut sampler = Sampler::new();
    let records = sampler.sample();

    let once = rank(records.clone(), SortKey::Name, false);
    let twice = rank(records, SortKey::Name, false);
    assert_eq!(once, twice);

    let names: Vec<&str> = once.iter().map(|r| r.name.as_str()).collect();
    assert!(names.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_monitor_refresh_orders_by_pid() {
    let monitor = ProcessMonitor::new().with_sort(SortSpec::new(SortKey::Pid, false));

    match monitor.refresh() {
        Refresh::Completed(records, spec) => {
            assert_eq!(spec, SortSpec::new(SortKey::Pid, false));
            assert!(!records.is_empty());
            assert!(records.windows(2).all(|w| w[0].pid < w[1].pid));
        }
        Refresh::Busy => panic!("no concurrent sample is running"),
    }
}

#[test]
fn test_live_json_export_round_trip() {
    let dir = TempDir::new().unwrap();
    let monitor = ProcessMonitor::new().with_exporter(Exporter::new(dir.path()));

    let path = monitor
        .export_snapshot(ExportFormat::Json)
        .expect("export must succeed");

    let text = std::fs::read_to_string(&path).unwrap();
    let parsed: Vec<ProcessRecord> = serde_json::from_str(&text).unwrap();
    assert!(!parsed.is_empty());
    assert!(parsed
        .windows(2)
        .all(|w| w[0].memory_percent >= w[1].memory_percent));
}

#[test]
fn test_live_csv_export_row_count() {
    let dir = TempDir::new().unwrap();
    let monitor = ProcessMonitor::new().with_exporter(Exporter::new(dir.path()));

    let path = monitor
        .export_snapshot(ExportFormat::Csv)
        .expect("export must succeed");

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("pid,name,username,cpu_percent,memory_percent,status,create_time")
    );
    assert!(lines.count() > 0);
}
