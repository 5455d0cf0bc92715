//! Receiver state machine
//!
//! Owns the expectation cursor, the out-of-order holding area and the
//! reassembly accumulator. Incoming packets are validated, deduplicated and
//! reordered; contiguous fragments are folded into the accumulator and
//! complete messages are delivered upward exactly once, in submission
//! order. Acknowledgments are cumulative and emitted only when the cursor
//! advances (or as a corrective ack for out-of-window arrivals).

use crate::config::{ConfigError, ProtocolConfig};
use crate::packet::{AckPacket, Packet};
use crate::sequence::{SeqNumber, SEQ_MODULUS};
use crate::stats::ReceiverStats;
use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

/// Channel- and application-facing side effects of the receiver
pub trait ReceiverIo {
    /// Hand an acknowledgment to the channel (fire-and-forget)
    fn transmit(&mut self, ack: &AckPacket);
    /// Deliver a fully reassembled message to the application
    fn deliver(&mut self, message: Bytes);
}

/// One fragment parked ahead of the expectation cursor
#[derive(Debug, Clone)]
struct Fragment {
    payload: Bytes,
    last: bool,
}

/// Sliding-window ARQ receiver
pub struct Receiver {
    config: ProtocolConfig,
    /// Next sequence number accepted in order
    expected: SeqNumber,
    /// Holding area indexed by raw sequence number, one slot per value in
    /// the sequence space; `None` marks an empty slot
    slots: Vec<Option<Fragment>>,
    /// In-order fragments of the message currently being reassembled
    assembly: Vec<Bytes>,
    stats: ReceiverStats,
}

impl Receiver {
    /// Create a receiver with the given configuration
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Receiver {
            config,
            expected: SeqNumber::new(0),
            slots: (0..SEQ_MODULUS).map(|_| None).collect(),
            assembly: Vec::new(),
            stats: ReceiverStats::default(),
        })
    }

    /// Next sequence number the receiver will accept in order
    pub fn expected(&self) -> SeqNumber {
        self.expected
    }

    /// Whether a message is partially reassembled
    pub fn message_in_progress(&self) -> bool {
        !self.assembly.is_empty()
    }

    /// Transfer counters
    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Process a raw packet from the channel
    ///
    /// Corrupt packets are dropped with no observable effect. Packets
    /// outside the acceptance window `[cursor, cursor + window_size)` are
    /// answered with a corrective ack for `cursor - 1` and not buffered.
    /// A packet at the cursor is accepted, contiguous buffered fragments
    /// are flushed behind it, and a single cumulative ack is emitted.
    /// In-window packets ahead of the cursor are parked first-writer-wins.
    pub fn on_packet(&mut self, raw: &[u8], io: &mut impl ReceiverIo) {
        let packet = match Packet::from_bytes(raw) {
            Ok(Packet::Data(packet)) => packet,
            Ok(Packet::Ack(ack)) => {
                warn!(seq = %ack.seq, "ack on the data path, dropping");
                return;
            }
            Err(err) => {
                debug!(%err, "corrupt packet dropped");
                self.stats.packets_corrupted += 1;
                return;
            }
        };

        // The codec bounds the payload by the wire format; the negotiated
        // limit may be tighter
        if packet.payload.len() > self.config.max_payload {
            debug!(seq = %packet.seq, size = packet.payload.len(), "payload over limit, dropping");
            self.stats.packets_corrupted += 1;
            return;
        }

        let window_end = self.expected.offset(self.config.window_size as u8);
        if !SeqNumber::between(self.expected, packet.seq, window_end) {
            // Stale or far-future: remind the sender of the real frontier
            debug!(seq = %packet.seq, expected = %self.expected, "out of window, re-acking frontier");
            self.stats.out_of_window += 1;
            self.send_ack(io);
            return;
        }

        if packet.seq == self.expected {
            trace!(seq = %packet.seq, last = packet.last, "in-order packet accepted");
            self.accept(packet.payload, packet.last, io);

            // Flush fragments that arrived ahead and are now contiguous
            while let Some(fragment) = self.slots[usize::from(self.expected.as_raw())].take() {
                trace!(seq = %self.expected, "flushing buffered fragment");
                self.accept(fragment.payload, fragment.last, io);
            }

            self.send_ack(io);
        } else {
            let slot = &mut self.slots[usize::from(packet.seq.as_raw())];
            if slot.is_none() {
                trace!(seq = %packet.seq, expected = %self.expected, "out-of-order packet buffered");
                *slot = Some(Fragment {
                    payload: packet.payload,
                    last: packet.last,
                });
                self.stats.packets_buffered += 1;
            } else {
                // First writer wins; the flush will ack it eventually
                trace!(seq = %packet.seq, "slot occupied, duplicate dropped");
                self.stats.duplicates_discarded += 1;
            }
        }
    }

    /// Fold an in-order fragment into the accumulator and advance the
    /// cursor; a last-flagged fragment completes the message and delivers
    /// it upward
    fn accept(&mut self, payload: Bytes, last: bool, io: &mut impl ReceiverIo) {
        self.stats.packets_accepted += 1;
        if last {
            let total = self.assembly.iter().map(Bytes::len).sum::<usize>() + payload.len();
            let mut message = BytesMut::with_capacity(total);
            for fragment in self.assembly.drain(..) {
                message.extend_from_slice(&fragment);
            }
            message.extend_from_slice(&payload);
            debug!(seq = %self.expected, size = total, "message reassembled, delivering");
            io.deliver(message.freeze());
            self.stats.messages_delivered += 1;
        } else {
            self.assembly.push(payload);
        }
        self.expected.increment();
    }

    /// Emit the cumulative acknowledgment for everything contiguously
    /// received so far
    fn send_ack(&mut self, io: &mut impl ReceiverIo) {
        let ack = AckPacket::new(self.expected.prev());
        trace!(ack = %ack.seq, "sending ack");
        io.transmit(&ack);
        self.stats.acks_sent += 1;
    }
}
