//! Deterministic channel simulation for the ARQ protocol core
//!
//! Wires a [`Sender`](arq_protocol::Sender) and
//! [`Receiver`](arq_protocol::Receiver) back to back through a configurable
//! lossy channel and drives them on a virtual clock. Runs are fully
//! reproducible from the channel seed, which makes failures bisectable and
//! lets the test suite exercise heavy loss, corruption, duplication and
//! reordering without wall-clock cost.

pub mod channel;
pub mod simulator;

pub use channel::{ChannelConfig, ChannelStats, Rng};
pub use simulator::{SimError, Simulator};
