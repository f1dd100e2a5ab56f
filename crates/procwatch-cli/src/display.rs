//! Terminal rendering
//!
//! The scheduler talks to a [`DisplaySink`]; [`TerminalDisplay`] is the
//! `colored` implementation used by the binary. The `render_*` functions
//! return plain strings so one-shot commands can print them directly.

use colored::*;
use procwatch_core::{ProcessRecord, SortKey, SortSpec, SystemStats};
use std::io::{self, Write};

/// Severity of a status line message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Consumer of monitor output
pub trait DisplaySink {
    fn show_stats(&mut self, stats: &SystemStats);
    fn show_processes(&mut self, records: &[ProcessRecord], sort: SortSpec);
    fn show_message(&mut self, level: Level, message: &str);
}

pub const COMMAND_HELP: &str =
    "r refresh | s <key> sort | k <pid> kill | e <json|csv> export | f [pattern] filter | q quit";

/// Redraws the whole screen on every update
pub struct TerminalDisplay {
    name_width: usize,
    max_rows: usize,
    stats: Option<SystemStats>,
    records: Vec<ProcessRecord>,
    sort: SortSpec,
    message: Option<(Level, String)>,
}

impl TerminalDisplay {
    pub fn new(name_width: usize, max_rows: usize) -> Self {
        Self {
            name_width,
            max_rows,
            stats: None,
            records: Vec::new(),
            sort: SortSpec::default(),
            message: None,
        }
    }

    fn redraw(&self) {
        let mut screen = String::from("\x1B[2J\x1B[1;1H");

        match &self.stats {
            Some(stats) => screen.push_str(&render_stats(stats)),
            None => screen.push_str(&format!("{}\n", "Collecting system stats...".dimmed())),
        }
        screen.push('\n');
        screen.push_str(&render_table(
            &self.records,
            self.sort,
            self.name_width,
            self.max_rows,
        ));
        screen.push('\n');

        if let Some((level, message)) = &self.message {
            screen.push_str(&render_message(*level, message));
            screen.push('\n');
        }
        screen.push_str(&format!("{}\n> ", COMMAND_HELP.dimmed()));

        let mut stdout = io::stdout().lock();
        // A closed stdout only loses this frame
        let _ = stdout.write_all(screen.as_bytes());
        let _ = stdout.flush();
    }
}

impl DisplaySink for TerminalDisplay {
    fn show_stats(&mut self, stats: &SystemStats) {
        self.stats = Some(stats.clone());
        self.redraw();
    }

    fn show_processes(&mut self, records: &[ProcessRecord], sort: SortSpec) {
        self.records = records.to_vec();
        self.sort = sort;
        self.redraw();
    }

    fn show_message(&mut self, level: Level, message: &str) {
        self.message = Some((level, message.to_string()));
        self.redraw();
    }
}

/// Shorten `name` to at most `width` characters, marking the cut with `~`
pub fn truncate_name(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut short: String = name.chars().take(width.saturating_sub(1)).collect();
    short.push('~');
    short
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

fn usage_color(text: String, value: f64) -> ColoredString {
    if value >= 90.0 {
        text.red().bold()
    } else if value >= 70.0 {
        text.yellow()
    } else {
        text.green()
    }
}

/// Aggregate panel: CPU, memory, disk and process count
pub fn render_stats(stats: &SystemStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "System".bold()));
    out.push_str(&format!(
        "  CPU:       {}\n",
        usage_color(format_percent(stats.cpu_percent), stats.cpu_percent)
    ));
    out.push_str(&format!(
        "  MEMORY:    {}\n",
        usage_color(format_percent(stats.memory_percent), stats.memory_percent)
    ));
    out.push_str(&format!(
        "  DISK:      {}\n",
        usage_color(format_percent(stats.disk_percent), stats.disk_percent)
    ));
    out.push_str(&format!("  PROCESSES: {}\n", stats.process_count));
    out.push_str(&format!(
        "  {}\n",
        format!("updated {}", stats.collected_at.format("%H:%M:%S")).dimmed()
    ));
    out
}

fn header_label(key: SortKey, sort: SortSpec) -> String {
    if key == sort.key {
        let arrow = if sort.descending { "v" } else { "^" };
        format!("{}{}", key.label(), arrow)
    } else {
        key.label().to_string()
    }
}

/// Process table, ranked as given, cut to `max_rows` rows
pub fn render_table(
    records: &[ProcessRecord],
    sort: SortSpec,
    name_width: usize,
    max_rows: usize,
) -> String {
    let header = format!(
        "{:>7} {:<name_width$} {:<12} {:>7} {:>8} {:<12} {:>8}",
        header_label(SortKey::Pid, sort),
        header_label(SortKey::Name, sort),
        header_label(SortKey::Username, sort),
        header_label(SortKey::CpuPercent, sort),
        header_label(SortKey::MemoryPercent, sort),
        header_label(SortKey::Status, sort),
        header_label(SortKey::CreateTime, sort),
        name_width = name_width,
    );

    let mut out = format!("{}\n", header.bold());

    for record in records.iter().take(max_rows) {
        out.push_str(&format!(
            "{:>7} {:<name_width$} {:<12} {:>7} {:>8} {:<12} {:>8}\n",
            record.pid,
            truncate_name(&record.name, name_width),
            truncate_name(record.username_or_empty(), 12),
            format_percent(record.cpu_percent),
            format_percent(record.memory_percent),
            record.status.as_str(),
            record.create_time_display(),
            name_width = name_width,
        ));
    }

    if records.len() > max_rows {
        out.push_str(&format!(
            "{}\n",
            format!("... {} more", records.len() - max_rows).dimmed()
        ));
    }

    out
}

pub fn render_message(level: Level, message: &str) -> String {
    match level {
        Level::Info => format!("{}", message.green()),
        Level::Warn => format!("{}", message.yellow()),
        Level::Error => format!("{}", message.red()),
    }
}
