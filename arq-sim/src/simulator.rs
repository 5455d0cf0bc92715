//! Virtual-time channel simulator
//!
//! Drives one sender/receiver pair through an impaired channel on a
//! deterministic virtual clock. Packet transmissions become timestamped
//! arrival events (possibly lost, corrupted, duplicated or delayed), the
//! sender's single timer becomes a timeout event, and everything is pumped
//! from one event queue in strict time order, matching the protocol's
//! synchronous callback contract.

use crate::channel::{ChannelConfig, ChannelStats, Rng};
use arq_protocol::packet::{AckPacket, DataPacket};
use arq_protocol::{
    ConfigError, ProtocolConfig, Receiver, ReceiverIo, ReceiverStats, Sender, SenderIo,
    SenderStats, Timestamp,
};
use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Simulation errors
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid protocol configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Virtual time limit of {limit:?} exceeded with {in_flight} packets unacknowledged")]
    TimeLimitExceeded { limit: Duration, in_flight: usize },

    #[error("Delivery mismatch at message {index}: submitted {submitted} bytes, delivered {delivered} bytes")]
    DeliveryMismatch {
        index: usize,
        submitted: usize,
        delivered: usize,
    },

    #[error("{delivered} messages delivered, {submitted} submitted")]
    DeliveryCount { submitted: usize, delivered: usize },
}

#[derive(Debug)]
enum Event {
    /// Raw bytes arriving on the sender side (acknowledgment path)
    SenderRx(Vec<u8>),
    /// Raw bytes arriving on the receiver side (data path)
    ReceiverRx(Vec<u8>),
    /// The sender's armed timer elapsed; stale generations are skipped
    SenderTimeout { generation: u64 },
}

struct Scheduled {
    at: Timestamp,
    /// Tie-breaker preserving scheduling order at equal timestamps
    id: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.id == other.id
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert for earliest-first ordering
        (other.at, other.id).cmp(&(self.at, self.id))
    }
}

/// Mailbox collecting the sender's side effects during one operation
#[derive(Default)]
struct SenderPort {
    transmitted: Vec<DataPacket>,
    timer_ops: Vec<TimerOp>,
}

enum TimerOp {
    Start(Duration),
    Stop,
}

impl SenderIo for SenderPort {
    fn transmit(&mut self, packet: &DataPacket) {
        self.transmitted.push(packet.clone());
    }

    fn start_timer(&mut self, timeout: Duration) {
        self.timer_ops.push(TimerOp::Start(timeout));
    }

    fn stop_timer(&mut self) {
        self.timer_ops.push(TimerOp::Stop);
    }
}

/// Mailbox collecting the receiver's side effects during one operation
#[derive(Default)]
struct ReceiverPort {
    acks: Vec<AckPacket>,
    delivered: Vec<Bytes>,
}

impl ReceiverIo for ReceiverPort {
    fn transmit(&mut self, ack: &AckPacket) {
        self.acks.push(*ack);
    }

    fn deliver(&mut self, message: Bytes) {
        self.delivered.push(message);
    }
}

/// One sender/receiver pair wired through an impaired virtual channel
pub struct Simulator {
    channel: ChannelConfig,
    sender: Sender,
    receiver: Receiver,
    queue: BinaryHeap<Scheduled>,
    now: Timestamp,
    next_id: u64,
    /// Generation of the currently armed sender timer; timeout events from
    /// older generations are ignored
    timer_generation: u64,
    rng: Rng,
    submitted: Vec<Bytes>,
    delivered: Vec<Bytes>,
    channel_stats: ChannelStats,
}

impl Simulator {
    /// Create a simulator over the given protocol and channel configuration
    pub fn new(protocol: ProtocolConfig, channel: ChannelConfig) -> Result<Self, SimError> {
        let sender = Sender::new(protocol.clone())?;
        let receiver = Receiver::new(protocol)?;
        let rng = Rng::new(channel.seed);
        Ok(Simulator {
            channel,
            sender,
            receiver,
            queue: BinaryHeap::new(),
            now: Timestamp::ZERO,
            next_id: 0,
            timer_generation: 0,
            rng,
            submitted: Vec::new(),
            delivered: Vec::new(),
            channel_stats: ChannelStats::default(),
        })
    }

    /// Current virtual time
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Messages delivered to the receiving application so far
    pub fn delivered(&self) -> &[Bytes] {
        &self.delivered
    }

    /// Packets currently occupying the sender's window
    pub fn in_flight(&self) -> usize {
        self.sender.in_flight()
    }

    pub fn sender_stats(&self) -> SenderStats {
        self.sender.stats()
    }

    pub fn receiver_stats(&self) -> ReceiverStats {
        self.receiver.stats()
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.channel_stats
    }

    /// Submit a message to the sending application at the current virtual
    /// time
    pub fn send_message(&mut self, message: &[u8]) {
        self.submitted.push(Bytes::copy_from_slice(message));
        let mut port = SenderPort::default();
        self.sender.submit(message, self.now, &mut port);
        self.apply_sender_port(port);
    }

    /// Pump events until all traffic settles or `limit` of virtual time
    /// passes
    pub fn run_until_idle(&mut self, limit: Duration) -> Result<(), SimError> {
        let deadline = Timestamp::ZERO + limit;
        while let Some(scheduled) = self.queue.pop() {
            if scheduled.at > deadline {
                return Err(SimError::TimeLimitExceeded {
                    limit,
                    in_flight: self.sender.in_flight() + self.sender.queued(),
                });
            }
            debug_assert!(scheduled.at >= self.now, "events must replay in time order");
            self.now = scheduled.at;

            match scheduled.event {
                Event::SenderRx(raw) => {
                    let mut port = SenderPort::default();
                    self.sender.on_ack(&raw, self.now, &mut port);
                    self.apply_sender_port(port);
                }
                Event::ReceiverRx(raw) => {
                    let mut port = ReceiverPort::default();
                    self.receiver.on_packet(&raw, &mut port);
                    self.apply_receiver_port(port);
                }
                Event::SenderTimeout { generation } => {
                    if generation != self.timer_generation {
                        trace!(at = %self.now, generation, "stale timeout skipped");
                        continue;
                    }
                    // The armed timer is consumed by firing
                    self.timer_generation += 1;
                    let mut port = SenderPort::default();
                    self.sender.on_timeout(self.now, &mut port);
                    self.apply_sender_port(port);
                }
            }
        }
        Ok(())
    }

    /// Check that every submitted message was delivered exactly once, byte
    /// for byte, in submission order
    pub fn verify_delivery(&self) -> Result<(), SimError> {
        if self.submitted.len() != self.delivered.len() {
            return Err(SimError::DeliveryCount {
                submitted: self.submitted.len(),
                delivered: self.delivered.len(),
            });
        }
        for (index, (submitted, delivered)) in
            self.submitted.iter().zip(&self.delivered).enumerate()
        {
            if submitted != delivered {
                return Err(SimError::DeliveryMismatch {
                    index,
                    submitted: submitted.len(),
                    delivered: delivered.len(),
                });
            }
        }
        Ok(())
    }

    fn apply_sender_port(&mut self, port: SenderPort) {
        for packet in port.transmitted {
            let raw = packet.to_bytes().to_vec();
            self.offer(raw, true);
        }
        for op in port.timer_ops {
            match op {
                TimerOp::Start(timeout) => {
                    self.timer_generation += 1;
                    let generation = self.timer_generation;
                    let at = self.now + timeout;
                    trace!(at = %self.now, fires = %at, generation, "timer armed");
                    self.schedule(at, Event::SenderTimeout { generation });
                }
                TimerOp::Stop => {
                    // Lazy cancel: invalidate the generation, the stale
                    // event is skipped when it surfaces
                    self.timer_generation += 1;
                }
            }
        }
    }

    fn apply_receiver_port(&mut self, port: ReceiverPort) {
        for ack in port.acks {
            let raw = ack.to_bytes().to_vec();
            self.offer(raw, false);
        }
        for message in port.delivered {
            debug!(at = %self.now, size = message.len(), "message delivered upward");
            self.delivered.push(message);
        }
    }

    /// Run one transmission through the impairment model and schedule the
    /// surviving copies as arrival events
    fn offer(&mut self, raw: Vec<u8>, to_receiver: bool) {
        self.channel_stats.offered += 1;
        let copies = if self.rng.chance(self.channel.duplicate_rate) {
            self.channel_stats.duplicated += 1;
            2
        } else {
            1
        };

        for _ in 0..copies {
            if self.rng.chance(self.channel.loss_rate) {
                self.channel_stats.dropped += 1;
                trace!(at = %self.now, "channel dropped a copy");
                continue;
            }

            let mut copy = raw.clone();
            if self.rng.chance(self.channel.corrupt_rate) {
                let bit = self.rng.below(copy.len() as u64 * 8);
                copy[(bit / 8) as usize] ^= 1 << (bit % 8);
                self.channel_stats.corrupted += 1;
            }

            let delay = self.channel.latency + self.rng.jitter(self.channel.jitter);
            let at = self.now + delay;
            self.channel_stats.delivered += 1;
            let event = if to_receiver {
                Event::ReceiverRx(copy)
            } else {
                Event::SenderRx(copy)
            };
            self.schedule(at, event);
        }
    }

    fn schedule(&mut self, at: Timestamp, event: Event) {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Scheduled { at, id, event });
    }
}
