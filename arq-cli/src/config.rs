//! Configuration file support for the ARQ CLI tools

use arq_protocol::ProtocolConfig;
use arq_sim::ChannelConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Workload to push through the simulated link
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Number of messages to submit
    #[serde(default = "default_messages")]
    pub messages: usize,
    /// Size of each message in bytes
    #[serde(default = "default_message_size")]
    pub message_size: usize,
    /// Virtual time limit for the run, in seconds
    #[serde(default = "default_limit_secs")]
    pub limit_secs: u64,
}

fn default_messages() -> usize {
    100
}

fn default_message_size() -> usize {
    500
}

fn default_limit_secs() -> u64 {
    3600
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            messages: default_messages(),
            message_size: default_message_size(),
            limit_secs: default_limit_secs(),
        }
    }
}

/// Combined run configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl RunConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&contents)?;
        config.protocol.validate()?;
        Ok(config)
    }

    /// Example configuration in TOML form
    pub fn example() -> &'static str {
        "\
[workload]
messages = 100
message_size = 500
limit_secs = 3600

# Durations are in milliseconds.
[protocol]
window_size = 10
timeout = 300
max_payload = 124

[channel]
loss_rate = 0.15
corrupt_rate = 0.15
duplicate_rate = 0.1
latency = 100
jitter = 80
seed = 1
"
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Protocol(#[from] arq_protocol::ConfigError),
}
