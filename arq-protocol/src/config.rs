//! Protocol configuration
//!
//! All knobs are fixed at initialization time and never mutated at runtime.
//! The defaults match the reference sizing: a window of 10 packets, a
//! 300 ms retransmission timeout, and payloads filling a 128-byte packet.

use crate::packet::MAX_PAYLOAD_SIZE;
use crate::sequence::SEQ_MODULUS;
use serde::Deserialize;
use std::time::Duration;

/// Configuration shared by sender and receiver
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Maximum number of packets in flight at once
    pub window_size: usize,
    /// Retransmission timeout
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Largest payload placed in a single packet
    pub max_payload: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            window_size: 10,
            timeout: Duration::from_millis(300),
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }
}

impl ProtocolConfig {
    /// Validate the configuration
    ///
    /// The window must fit in half the sequence space so a full window of
    /// in-flight packets can never be confused with a stale one, and the
    /// payload bound must fit the wire format's length byte.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 || self.window_size > usize::from(SEQ_MODULUS) / 2 {
            return Err(ConfigError::InvalidWindowSize {
                window_size: self.window_size,
                max: usize::from(SEQ_MODULUS) / 2,
            });
        }
        if self.max_payload == 0 || self.max_payload > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::InvalidMaxPayload {
                max_payload: self.max_payload,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid window size {window_size} (must be 1..={max})")]
    InvalidWindowSize { window_size: usize, max: usize },

    #[error("Invalid max payload {max_payload} (must be 1..={max})")]
    InvalidMaxPayload { max_payload: usize, max: usize },

    #[error("Timeout must be non-zero")]
    ZeroTimeout,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ProtocolConfig::default().validate().is_ok());
    }

    #[test]
    fn test_window_bounds() {
        let mut config = ProtocolConfig {
            window_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWindowSize { .. })
        ));

        config.window_size = usize::from(SEQ_MODULUS) / 2 + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWindowSize { .. })
        ));

        config.window_size = usize::from(SEQ_MODULUS) / 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_payload_bounds() {
        let config = ProtocolConfig {
            max_payload: MAX_PAYLOAD_SIZE + 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxPayload { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ProtocolConfig {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_deserialize_toml() {
        let config: ProtocolConfig =
            toml::from_str("window_size = 4\ntimeout = 250\nmax_payload = 100\n").unwrap();
        assert_eq!(config.window_size, 4);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.max_payload, 100);
    }
}
