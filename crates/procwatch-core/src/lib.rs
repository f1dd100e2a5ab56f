//! procwatch Core Library
//!
//! Process sampling, deterministic ranking, termination and snapshot export
//! for the procwatch process monitor.

pub mod error;
pub mod executor;
pub mod export;
pub mod filter;
pub mod monitor;
pub mod ranking;
pub mod sampler;
pub mod stats;
pub mod types;

pub use error::{Error, Result};
pub use executor::ProcessExecutor;
pub use export::{ExportFormat, Exporter, SCHEMA};
pub use filter::ProcessFilter;
pub use monitor::{ProcessMonitor, Refresh};
pub use ranking::{rank, SortKey, SortPolicy, SortSpec};
pub use sampler::{ProbeError, ProcessSource, Sampler, SysinfoSource};
pub use stats::StatsCollector;
pub use types::{ProcessRecord, ProcessStatus, SystemStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_schema_covers_every_sort_key() {
        for key in SortKey::ALL {
            assert!(SCHEMA.iter().any(|field| field.name == key.as_str()));
        }
    }
}
