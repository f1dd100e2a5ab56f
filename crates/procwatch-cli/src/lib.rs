//! procwatch CLI Library
//!
//! Configuration, logging setup, terminal rendering and the watch scheduler
//! behind the `procwatch` binary.

pub mod commands;
pub mod config;
pub mod display;
pub mod logging;
pub mod scheduler;

pub use commands::Command;
pub use config::Config;
pub use display::{DisplaySink, Level, TerminalDisplay};
pub use scheduler::{CommandInput, Scheduler};
