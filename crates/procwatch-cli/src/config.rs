use procwatch_core::{SortKey, SortPolicy, SortSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for procwatch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Refresh cadences and the disk to report on
    pub monitoring: MonitoringConfig,

    /// Process table layout
    pub display: DisplayConfig,

    /// Initial ordering and the sort toggle policy
    pub sort: SortConfig,

    /// Snapshot export settings
    pub export: ExportConfig,

    /// Logging configuration
    pub logging: LogConfig,
}

/// General monitoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Process list refresh interval in seconds (default: 5)
    pub refresh_interval_secs: u64,

    /// Stats panel refresh interval in seconds (default: 2)
    pub stats_interval_secs: u64,

    /// Path whose filesystem is reported as disk usage (default: /)
    pub disk_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Process names longer than this are truncated in the table (default: 20)
    pub name_width: usize,

    /// Rows shown in watch mode (default: 40)
    pub max_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Initial sort key (default: memory_percent)
    pub key: String,

    /// Initial direction (default: true)
    pub descending: bool,

    /// What a sort request does to the direction (default: toggle)
    pub policy: SortPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory exported snapshots are written to (default: .)
    pub output_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log directory path (default: ./logs)
    pub log_dir: PathBuf,

    /// Log file name, rotated daily (default: procwatch.log)
    pub file_name: String,

    /// Level used when RUST_LOG is not set (default: info)
    pub level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 5,
            stats_interval_secs: 2,
            disk_path: PathBuf::from("/"),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            name_width: 20,
            max_rows: 40,
        }
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            key: SortKey::MemoryPercent.as_str().to_string(),
            descending: true,
            policy: SortPolicy::Toggle,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            file_name: "procwatch.log".to_string(),
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// Missing sections and keys fall back to their defaults.
    ///
    /// # Example
    /// ```no_run
    /// use procwatch_cli::config::Config;
    ///
    /// let config = Config::load_from_file("procwatch.toml").unwrap();
    /// println!("Stats every {}s", config.monitoring.stats_interval_secs);
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.monitoring.refresh_interval_secs == 0 {
            return Err("Refresh interval must be > 0".to_string());
        }

        if self.monitoring.stats_interval_secs == 0 {
            return Err("Stats interval must be > 0".to_string());
        }

        if self.display.name_width < 4 {
            return Err(format!(
                "Name width must be at least 4, got: {}",
                self.display.name_width
            ));
        }

        if self.display.max_rows == 0 {
            return Err("Max rows must be > 0".to_string());
        }

        self.sort_spec()?;

        if self.logging.file_name.is_empty() {
            return Err("Log file name must not be empty".to_string());
        }

        if self.logging.level.trim().is_empty() {
            return Err("Log level must not be empty".to_string());
        }

        Ok(())
    }

    /// Initial sort from the `[sort]` section
    pub fn sort_spec(&self) -> Result<SortSpec, String> {
        let key = self
            .sort
            .key
            .parse::<SortKey>()
            .map_err(|e| e.to_string())?;
        Ok(SortSpec::new(key, self.sort.descending))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.refresh_interval_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.stats_interval_secs)
    }
}
