//! ARQ CLI Library
//!
//! Shared functionality for the ARQ command-line tools.

pub mod config;
pub mod stats;

pub use config::{ConfigError, RunConfig, WorkloadConfig};
pub use stats::{display_compact_stats, display_report, format_bytes, format_rate};
