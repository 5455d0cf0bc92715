//! Sliding-Window ARQ Protocol Core
//!
//! This crate implements a reliable, in-order byte-stream delivery protocol
//! over an unreliable datagram channel that may lose, corrupt, reorder and
//! duplicate packets. It contains the packet codec with CRC-16 validation,
//! cyclic sequence-number arithmetic, the sender's window/timer/
//! retransmission state machine and the receiver's reordering/reassembly
//! state machine.
//!
//! The core is single-threaded and callback-driven: the channel collaborator
//! invokes [`Sender::submit`], [`Sender::on_ack`], [`Sender::on_timeout`]
//! and [`Receiver::on_packet`] synchronously, and side effects flow back
//! through the [`SenderIo`] and [`ReceiverIo`] traits.

pub mod checksum;
pub mod config;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod sequence;
pub mod stats;
pub mod time;

pub use config::{ConfigError, ProtocolConfig};
pub use packet::{AckPacket, DataPacket, Packet, PacketError, HEADER_SIZE, MAX_PAYLOAD_SIZE, PACKET_SIZE};
pub use receiver::{Receiver, ReceiverIo};
pub use sender::{Sender, SenderIo};
pub use sequence::{SeqNumber, MAX_SEQ_NUMBER, SEQ_MODULUS};
pub use stats::{ReceiverStats, SenderStats};
pub use time::Timestamp;
