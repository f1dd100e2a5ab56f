//! Snapshot export to JSON and CSV
//!
//! Both writers share one explicit field schema, so a CSV file always has a
//! header row, even for an empty sample.

use crate::types::ProcessRecord;
use crate::{Error, Result};
use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldType,
}

impl Field {
    /// Numbers never need quoting; text is escaped per RFC 4180
    fn csv_cell(&self, value: String) -> String {
        match self.kind {
            FieldType::Integer | FieldType::Float => value,
            FieldType::String => escape_csv(&value),
        }
    }
}

/// Exported fields, in column order
pub const SCHEMA: [Field; 7] = [
    Field { name: "pid", kind: FieldType::Integer },
    Field { name: "name", kind: FieldType::String },
    Field { name: "username", kind: FieldType::String },
    Field { name: "cpu_percent", kind: FieldType::Float },
    Field { name: "memory_percent", kind: FieldType::Float },
    Field { name: "status", kind: FieldType::String },
    Field { name: "create_time", kind: FieldType::Integer },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Writes ranked samples into timestamped files
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `processes_<YYYYMMDD>_<HHMMSS>.<ext>`
    ///
    /// Second resolution: two exports of the same format within one second
    /// share a name and the later one replaces the earlier.
    pub fn filename(format: ExportFormat, at: NaiveDateTime) -> String {
        format!(
            "processes_{}.{}",
            at.format("%Y%m%d_%H%M%S"),
            format.extension()
        )
    }

    /// Write `records` as given (already ranked) and return the file path
    pub fn write(&self, records: &[ProcessRecord], format: ExportFormat) -> Result<PathBuf> {
        let path = self
            .output_dir
            .join(Self::filename(format, Local::now().naive_local()));

        let result = write_atomic(&path, |writer| match format {
            ExportFormat::Json => write_json(writer, records),
            ExportFormat::Csv => write_csv(writer, records),
        });

        match result {
            Ok(()) => {
                info!("Exported {} processes to {}", records.len(), path.display());
                Ok(path)
            }
            Err(e) => {
                warn!("Export to {} failed: {}", path.display(), e);
                Err(e)
            }
        }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Pretty-printed JSON array of flat objects
pub fn write_json<W: Write>(writer: &mut W, records: &[ProcessRecord]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, records)?;
    writeln!(writer)?;
    Ok(())
}

/// Header row from [`SCHEMA`], then one row per record
pub fn write_csv<W: Write>(writer: &mut W, records: &[ProcessRecord]) -> Result<()> {
    let header: Vec<&str> = SCHEMA.iter().map(|field| field.name).collect();
    write!(writer, "{}\r\n", header.join(","))?;

    for record in records {
        let cells: Vec<String> = SCHEMA
            .iter()
            .zip(csv_row(record))
            .map(|(field, cell)| field.csv_cell(cell))
            .collect();
        write!(writer, "{}\r\n", cells.join(","))?;
    }

    Ok(())
}

fn csv_row(record: &ProcessRecord) -> [String; 7] {
    [
        record.pid.to_string(),
        record.name.clone(),
        record.username_or_empty().to_string(),
        record.cpu_percent.to_string(),
        record.memory_percent.to_string(),
        record.status.as_str().to_string(),
        record.create_time.to_string(),
    ]
}

/// Quote a field if it contains a separator, quote or line break
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Write through a hidden temp file in the same directory, then rename.
///
/// On failure the temp file is removed and nothing appears under `path`.
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let tmp = temp_path(path);

    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write(&mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
