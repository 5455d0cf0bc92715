//! Channel impairment model
//!
//! Models an unreliable datagram channel: packets may be lost, corrupted
//! (single bit flip), duplicated, and delayed by a random jitter on top of
//! a base latency. Jitter is what produces reordering. All randomness comes
//! from a seeded xorshift generator so every run is reproducible.

use serde::Deserialize;
use std::time::Duration;

/// Impairment configuration for one direction of the channel
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Probability a packet copy is silently dropped
    pub loss_rate: f64,
    /// Probability a delivered packet has one bit flipped
    pub corrupt_rate: f64,
    /// Probability a packet is delivered twice
    pub duplicate_rate: f64,
    /// Base one-way latency
    #[serde(with = "duration_millis")]
    pub latency: Duration,
    /// Maximum extra delay added uniformly at random; non-zero jitter
    /// reorders packets
    #[serde(with = "duration_millis")]
    pub jitter: Duration,
    /// RNG seed
    pub seed: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            latency: Duration::from_millis(100),
            jitter: Duration::ZERO,
            seed: 1,
        }
    }
}

impl ChannelConfig {
    /// A channel with the given impairment rates and enough jitter to
    /// reorder, for adversarial runs
    pub fn adversarial(seed: u64) -> Self {
        ChannelConfig {
            loss_rate: 0.15,
            corrupt_rate: 0.15,
            duplicate_rate: 0.1,
            latency: Duration::from_millis(100),
            jitter: Duration::from_millis(80),
            seed,
        }
    }
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

/// Counters for what the channel did to traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Packet transmissions offered to the channel (both directions)
    pub offered: u64,
    /// Copies dropped
    pub dropped: u64,
    /// Copies delivered with a flipped bit
    pub corrupted: u64,
    /// Extra copies created by duplication
    pub duplicated: u64,
    /// Copies that reached the far side (corrupted or not)
    pub delivered: u64,
}

/// Seeded xorshift64* generator; deterministic and dependency-free
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        // A zero state would be a fixed point
        Rng {
            state: seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1,
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform float in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Bernoulli trial
    pub fn chance(&mut self, probability: f64) -> bool {
        probability > 0.0 && self.next_f64() < probability
    }

    /// Uniform integer in `[0, bound)`; `bound` must be non-zero
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }

    /// Uniform duration in `[0, bound]`
    pub fn jitter(&mut self, bound: Duration) -> Duration {
        if bound.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_micros(self.below(bound.as_micros() as u64 + 1))
        }
    }
}
