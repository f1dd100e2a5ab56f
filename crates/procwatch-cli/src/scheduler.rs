//! Watch mode scheduling
//!
//! Two independent timelines feed one render loop:
//! - stats task: collects [`SystemStats`] every `stats_every`
//! - refresh task: samples and ranks every `refresh_every`, or sooner when
//!   woken by a refresh request
//!
//! Both run their OS queries on the blocking pool and await them before the
//! next tick, so a timeline never overlaps itself and never stalls the other.

use crate::commands::Command;
use crate::display::{DisplaySink, Level, COMMAND_HELP};
use anyhow::{Context, Result};
use procwatch_core::{
    ProcessFilter, ProcessMonitor, ProcessRecord, ProcessSource, Refresh, SortSpec,
    SysinfoSource, SystemStats,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A parsed line from the operator, or the reason it was rejected
pub type CommandInput = std::result::Result<Command, String>;

enum Event {
    Stats(SystemStats),
    Processes(Vec<ProcessRecord>, SortSpec),
}

/// Latest ranked sample, the sort it is in and the filter applied on top
#[derive(Default)]
struct View {
    latest: Vec<ProcessRecord>,
    sort: SortSpec,
    filter: Option<ProcessFilter>,
}

impl View {
    fn visible(&self) -> Vec<ProcessRecord> {
        match &self.filter {
            Some(filter) => filter.apply(self.latest.clone()),
            None => self.latest.clone(),
        }
    }
}

pub struct Scheduler<S: ProcessSource = SysinfoSource> {
    monitor: Arc<ProcessMonitor<S>>,
    refresh_every: Duration,
    stats_every: Duration,
    wake: Arc<Notify>,
}

impl<S> Scheduler<S>
where
    S: ProcessSource + Send + 'static,
{
    pub fn new(monitor: Arc<ProcessMonitor<S>>, refresh_every: Duration, stats_every: Duration) -> Self {
        Self {
            monitor,
            refresh_every,
            stats_every,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Run until `shutdown` resolves or a quit command arrives
    pub async fn run<D: DisplaySink>(
        self,
        display: &mut D,
        mut commands: mpsc::Receiver<CommandInput>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        info!(
            "Watching processes (refresh every {:?}, stats every {:?})",
            self.refresh_every, self.stats_every
        );

        let (events_tx, mut events) = mpsc::channel(16);

        let stats_task = tokio::spawn(stats_loop(
            Arc::clone(&self.monitor),
            self.stats_every,
            events_tx.clone(),
        ));
        let refresh_task = tokio::spawn(refresh_loop(
            Arc::clone(&self.monitor),
            self.refresh_every,
            Arc::clone(&self.wake),
            events_tx,
        ));

        let mut view = View {
            sort: self.monitor.sort_spec(),
            ..View::default()
        };
        let mut commands_open = true;
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                Some(event) = events.recv() => match event {
                    Event::Stats(stats) => display.show_stats(&stats),
                    Event::Processes(records, sort) => {
                        view.latest = records;
                        view.sort = sort;
                        display.show_processes(&view.visible(), view.sort);
                    }
                },
                input = commands.recv(), if commands_open => match input {
                    // Input closed; keep watching until shutdown
                    None => commands_open = false,
                    Some(Ok(Command::Quit)) => break Ok(()),
                    Some(Ok(command)) => {
                        if let Err(e) = self.handle(command, &mut view, display).await {
                            break Err(e);
                        }
                    }
                    Some(Err(message)) => display.show_message(Level::Warn, &message),
                },
                else => break Ok(()),
            }
        };

        stats_task.abort();
        refresh_task.abort();
        info!("Watch stopped");

        result
    }

    async fn handle<D: DisplaySink>(
        &self,
        command: Command,
        view: &mut View,
        display: &mut D,
    ) -> Result<()> {
        debug!("Handling {:?}", command);

        match command {
            Command::Refresh => self.wake.notify_one(),
            Command::Sort(key) => {
                let spec = self.monitor.set_sort(key);
                view.latest = spec.apply(std::mem::take(&mut view.latest));
                view.sort = spec;
                display.show_processes(&view.visible(), spec);
                display.show_message(Level::Info, &format!("Sorted by {}", spec));
            }
            Command::Kill(pid) => {
                // A pid seen in the last sample must still be that process
                let sampled = view.latest.iter().find(|r| r.pid == pid).cloned();
                let monitor = Arc::clone(&self.monitor);
                let terminated = task::spawn_blocking(move || match sampled {
                    Some(record) => monitor.terminate_record(&record),
                    None => monitor.terminate(pid),
                })
                .await
                .context("Terminate task panicked")?;

                if terminated {
                    display.show_message(Level::Info, &format!("Sent SIGTERM to process {}", pid));
                    self.wake.notify_one();
                } else {
                    display.show_message(Level::Warn, &format!("Failed to terminate process {}", pid));
                }
            }
            Command::Export(format) => {
                let monitor = Arc::clone(&self.monitor);
                let exported = task::spawn_blocking(move || monitor.export_snapshot(format))
                    .await
                    .context("Export task panicked")?;

                match exported {
                    Ok(path) => {
                        display.show_message(Level::Info, &format!("Exported to {}", path.display()))
                    }
                    Err(e) => {
                        warn!("Export failed: {}", e);
                        display.show_message(Level::Error, &format!("Export failed: {}", e));
                    }
                }
            }
            Command::Filter(None) => {
                view.filter = None;
                display.show_processes(&view.visible(), view.sort);
                display.show_message(Level::Info, "Filter cleared");
            }
            Command::Filter(Some(pattern)) => match ProcessFilter::new(&pattern) {
                Ok(filter) => {
                    view.filter = Some(filter);
                    display.show_processes(&view.visible(), view.sort);
                    display.show_message(Level::Info, &format!("Filter: {}", pattern));
                }
                Err(e) => display.show_message(Level::Error, &e.to_string()),
            },
            Command::Help => display.show_message(Level::Info, COMMAND_HELP),
            Command::Quit => {}
        }

        Ok(())
    }
}

async fn stats_loop<S>(monitor: Arc<ProcessMonitor<S>>, every: Duration, events: mpsc::Sender<Event>)
where
    S: ProcessSource + Send + 'static,
{
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let worker = Arc::clone(&monitor);
        let stats = match task::spawn_blocking(move || worker.collect_stats()).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Stats collection failed: {}", e);
                continue;
            }
        };

        if events.send(Event::Stats(stats)).await.is_err() {
            break;
        }
    }
}

async fn refresh_loop<S>(
    monitor: Arc<ProcessMonitor<S>>,
    every: Duration,
    wake: Arc<Notify>,
    events: mpsc::Sender<Event>,
) where
    S: ProcessSource + Send + 'static,
{
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wake.notified() => debug!("Refresh requested"),
        }

        let worker = Arc::clone(&monitor);
        match task::spawn_blocking(move || worker.refresh()).await {
            Ok(Refresh::Completed(records, sort)) => {
                if events.send(Event::Processes(records, sort)).await.is_err() {
                    break;
                }
            }
            Ok(Refresh::Busy) => debug!("Refresh coalesced with a running sample"),
            Err(e) => warn!("Process refresh failed: {}", e),
        }
    }
}
