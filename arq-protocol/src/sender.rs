//! Sender state machine
//!
//! Owns the transmit window, the overflow queue and the per-packet timer
//! list. The sender fragments application messages into packets, transmits
//! up to `window_size` of them, parks the rest in a FIFO overflow queue,
//! and retransmits on timeout until every packet is cumulatively
//! acknowledged.
//!
//! Timer bookkeeping uses lazy cancellation: entries live in a FIFO in
//! expiry order, cancelling one only sets a flag, and the cost of skipping
//! cancelled entries is paid when they reach the front. The channel exposes
//! a single hardware timer; exactly one is armed whenever packets are in
//! flight, and it always corresponds to the front non-superseded entry.

use crate::config::{ConfigError, ProtocolConfig};
use crate::packet::{DataPacket, Packet};
use crate::sequence::SeqNumber;
use crate::stats::SenderStats;
use crate::time::Timestamp;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Channel-facing side effects of the sender
///
/// Invoked synchronously from within `submit`/`on_ack`/`on_timeout`. The
/// implementation must support at most one armed timer; the sender upholds
/// a stop-before-start discipline on its side.
pub trait SenderIo {
    /// Hand a fully encoded packet to the channel (fire-and-forget)
    fn transmit(&mut self, packet: &DataPacket);
    /// Arm the timer to fire after `timeout`
    fn start_timer(&mut self, timeout: Duration);
    /// Stop the armed timer
    fn stop_timer(&mut self);
}

/// One entry in the lazy-cancellation timer FIFO
#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    /// Sequence number of the in-flight packet this entry guards
    seq: SeqNumber,
    /// Absolute expiry time
    expires_at: Timestamp,
    /// Set when the packet was retired before this entry reached the front
    superseded: bool,
}

/// Sliding-window ARQ sender
pub struct Sender {
    config: ProtocolConfig,
    /// Next sequence number to assign
    next_seq: SeqNumber,
    /// Window slots; in-flight packets occupy `base .. base + nbuffered`
    /// circularly
    window: Vec<Option<DataPacket>>,
    /// Slot index of the oldest in-flight packet
    base: usize,
    /// Number of packets currently in flight
    nbuffered: usize,
    /// Packets formed while the window was full, drained in FIFO order
    pending: VecDeque<DataPacket>,
    /// Timer entries in expiry order
    timers: VecDeque<TimerEntry>,
    /// Whether the channel timer is currently armed
    timer_armed: bool,
    stats: SenderStats,
}

impl Sender {
    /// Create a sender with the given configuration
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = (0..config.window_size).map(|_| None).collect();
        Ok(Sender {
            config,
            next_seq: SeqNumber::new(0),
            window,
            base: 0,
            nbuffered: 0,
            pending: VecDeque::new(),
            timers: VecDeque::new(),
            timer_armed: false,
            stats: SenderStats::default(),
        })
    }

    /// Number of packets currently in flight
    pub fn in_flight(&self) -> usize {
        self.nbuffered
    }

    /// Number of packets waiting in the overflow queue
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    /// Whether everything submitted so far has been acknowledged
    pub fn is_idle(&self) -> bool {
        self.nbuffered == 0 && self.pending.is_empty()
    }

    /// Next sequence number that will be assigned
    pub fn next_seq(&self) -> SeqNumber {
        self.next_seq
    }

    /// Transfer counters
    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// Submit an application message for reliable delivery
    ///
    /// The message is split into fragments of at most `max_payload` bytes;
    /// the final fragment carries the last-fragment flag. Fragments are
    /// transmitted (or queued, when the window is full) strictly in
    /// creation order. An empty message produces no packets.
    pub fn submit(&mut self, message: &[u8], now: Timestamp, io: &mut impl SenderIo) {
        self.stats.messages_submitted += 1;
        let num_frags = message.len().div_ceil(self.config.max_payload);
        for (i, chunk) in message.chunks(self.config.max_payload).enumerate() {
            let seq = self.next_seq.fetch_increment();
            let last = i + 1 == num_frags;
            let packet = DataPacket {
                seq,
                last,
                payload: Bytes::copy_from_slice(chunk),
            };
            self.stats.fragments_created += 1;

            if self.nbuffered < self.config.window_size && self.pending.is_empty() {
                self.admit(packet, now, io);
            } else {
                trace!(at = %now, seq = %packet.seq, "window full, queueing packet");
                self.pending.push_back(packet);
                self.stats.packets_queued += 1;
            }
        }
    }

    /// Process a raw packet from the channel, treated as an acknowledgment
    ///
    /// Corrupt acks are dropped silently. A valid ack is cumulative: it
    /// retires every in-flight packet whose sequence number lies cyclically
    /// at or before the acked value, then refills the freed window slots
    /// from the overflow queue.
    pub fn on_ack(&mut self, raw: &[u8], now: Timestamp, io: &mut impl SenderIo) {
        let ack = match Packet::from_bytes(raw) {
            Ok(Packet::Ack(ack)) => ack,
            Ok(Packet::Data(pkt)) => {
                warn!(at = %now, seq = %pkt.seq, "data packet on the ack path, dropping");
                return;
            }
            Err(err) => {
                debug!(at = %now, %err, "corrupt ack dropped");
                self.stats.acks_corrupted += 1;
                return;
            }
        };

        trace!(at = %now, ack = %ack.seq, in_flight = self.nbuffered, "ack received");
        self.stats.acks_received += 1;

        // Retire the oldest in-flight packet while the ack covers it
        while self.nbuffered > 0 {
            let Some(oldest) = self.window[self.base].as_ref() else {
                break;
            };
            let oldest_seq = oldest.seq;
            let newest_slot = (self.base + self.nbuffered - 1) % self.config.window_size;
            let Some(newest) = self.window[newest_slot].as_ref() else {
                break;
            };
            if !SeqNumber::between(oldest_seq, ack.seq, newest.seq.next()) {
                break;
            }

            debug!(at = %now, seq = %oldest_seq, "packet acknowledged, retiring");
            self.window[self.base] = None;
            self.base = (self.base + 1) % self.config.window_size;
            self.nbuffered -= 1;
            self.retire_timer(oldest_seq, now, io);
        }

        // Drain the overflow queue into the freed slots
        while self.nbuffered < self.config.window_size {
            let Some(packet) = self.pending.pop_front() else {
                break;
            };
            self.admit(packet, now, io);
        }
    }

    /// Process a timeout notification from the channel
    ///
    /// The front timer entry is the one that fired: its packet is
    /// retransmitted unconditionally and a fresh full-interval entry joins
    /// the back of the FIFO. Superseded entries behind it are discarded,
    /// and any live entry whose remaining time already elapsed is
    /// retransmitted immediately as well. The channel timer is re-armed
    /// exactly once, for the first live entry still in the future (a fresh
    /// entry, at the latest, since it expires a full interval from now).
    pub fn on_timeout(&mut self, now: Timestamp, io: &mut impl SenderIo) {
        self.timer_armed = false;
        let Some(expired) = self.timers.pop_front() else {
            warn!(at = %now, "timeout with no pending timer entries");
            return;
        };

        debug!(at = %now, seq = %expired.seq, "timeout, retransmitting");
        self.retransmit(expired.seq, now, io);

        while let Some(front) = self.timers.front().copied() {
            if front.superseded {
                trace!(seq = %front.seq, "discarding superseded timer entry");
                self.timers.pop_front();
                continue;
            }
            let remaining = front.expires_at.saturating_since(now);
            if !remaining.is_zero() {
                io.start_timer(remaining);
                self.timer_armed = true;
                return;
            }
            // Expired while waiting behind the front entry
            self.timers.pop_front();
            debug!(at = %now, seq = %front.seq, "timer already past due, retransmitting");
            self.retransmit(front.seq, now, io);
        }
    }

    /// Place a packet into the next free window slot, transmit it and arm
    /// its timer
    fn admit(&mut self, packet: DataPacket, now: Timestamp, io: &mut impl SenderIo) {
        let slot = (self.base + self.nbuffered) % self.config.window_size;
        debug!(at = %now, seq = %packet.seq, size = packet.payload.len(), "sending packet");
        io.transmit(&packet);
        let seq = packet.seq;
        self.window[slot] = Some(packet);
        self.nbuffered += 1;
        self.stats.packets_sent += 1;
        self.push_timer(seq, now, io);
    }

    /// Retransmit the in-flight packet with the given sequence number and
    /// append a fresh timer entry for it
    ///
    /// Does not touch the channel timer; the timeout walk arms it once it
    /// knows which entry is next.
    fn retransmit(&mut self, seq: SeqNumber, now: Timestamp, io: &mut impl SenderIo) {
        let packet = self
            .window
            .iter()
            .flatten()
            .find(|p| p.seq == seq)
            .cloned();
        match packet {
            Some(packet) => {
                io.transmit(&packet);
                self.stats.packets_retransmitted += 1;
                self.schedule_entry(seq, now);
            }
            None => {
                // Retired between expiry and processing; nothing to resend
                debug!(at = %now, seq = %seq, "timer fired for retired packet");
            }
        }
    }

    fn schedule_entry(&mut self, seq: SeqNumber, now: Timestamp) {
        let expires_at = now + self.config.timeout;
        trace!(at = %now, seq = %seq, expires = %expires_at, "timer scheduled");
        self.timers.push_back(TimerEntry {
            seq,
            expires_at,
            superseded: false,
        });
    }

    fn push_timer(&mut self, seq: SeqNumber, now: Timestamp, io: &mut impl SenderIo) {
        self.schedule_entry(seq, now);
        if !self.timer_armed {
            io.start_timer(self.config.timeout);
            self.timer_armed = true;
        }
    }

    /// Cancel the timer entry for a retired packet
    ///
    /// If the entry sits at the front, it owns the armed channel timer: stop
    /// it, drop the entry together with any superseded successors, and
    /// re-arm for the first live entry's remaining time. Otherwise the entry
    /// is only flagged and skipped lazily later.
    fn retire_timer(&mut self, seq: SeqNumber, now: Timestamp, io: &mut impl SenderIo) {
        if self.timers.front().is_some_and(|front| front.seq == seq) {
            io.stop_timer();
            self.timer_armed = false;
            self.timers.pop_front();
            while let Some(front) = self.timers.front().copied() {
                if front.superseded {
                    self.timers.pop_front();
                    continue;
                }
                let remaining = front.expires_at.saturating_since(now);
                trace!(at = %now, seq = %front.seq, ?remaining, "re-arming timer");
                io.start_timer(remaining);
                self.timer_armed = true;
                break;
            }
        } else if let Some(entry) = self.timers.iter_mut().find(|t| t.seq == seq) {
            trace!(at = %now, seq = %seq, "timer entry superseded");
            entry.superseded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::AckPacket;

    #[derive(Default)]
    struct MockIo {
        sent: Vec<DataPacket>,
        timer: Option<Duration>,
        timers_started: u32,
    }

    impl SenderIo for MockIo {
        fn transmit(&mut self, packet: &DataPacket) {
            self.sent.push(packet.clone());
        }

        fn start_timer(&mut self, timeout: Duration) {
            assert!(self.timer.is_none(), "timer armed while already armed");
            self.timer = Some(timeout);
            self.timers_started += 1;
        }

        fn stop_timer(&mut self) {
            assert!(self.timer.is_some(), "stopping a timer that is not armed");
            self.timer = None;
        }
    }

    fn config(window_size: usize, max_payload: usize) -> ProtocolConfig {
        ProtocolConfig {
            window_size,
            max_payload,
            timeout: Duration::from_millis(300),
        }
    }

    fn ack_bytes(seq: u8) -> Vec<u8> {
        AckPacket::new(SeqNumber::new(seq)).to_bytes().to_vec()
    }

    fn at_ms(ms: u64) -> Timestamp {
        Timestamp::from_micros(ms * 1_000)
    }

    #[test]
    fn test_submit_single_fragment() {
        let mut sender = Sender::new(config(10, 100)).unwrap();
        let mut io = MockIo::default();

        sender.submit(b"hello", at_ms(0), &mut io);

        assert_eq!(io.sent.len(), 1);
        assert_eq!(io.sent[0].seq, SeqNumber::new(0));
        assert!(io.sent[0].last);
        assert_eq!(&io.sent[0].payload[..], b"hello");
        assert_eq!(sender.in_flight(), 1);
        assert_eq!(io.timer, Some(Duration::from_millis(300)));
    }

    #[test]
    fn test_fragmentation_marks_only_final_fragment() {
        // 300-byte message with max_payload 100: fragments 0, 1, 2 with the
        // last flag only on the third
        let mut sender = Sender::new(config(10, 100)).unwrap();
        let mut io = MockIo::default();

        sender.submit(&[0x42u8; 300], at_ms(0), &mut io);

        assert_eq!(io.sent.len(), 3);
        for (i, pkt) in io.sent.iter().enumerate() {
            assert_eq!(pkt.seq, SeqNumber::new(i as u8));
            assert_eq!(pkt.payload.len(), 100);
            assert_eq!(pkt.last, i == 2);
        }
        assert_eq!(sender.in_flight(), 3);

        // Cumulative ack for the third retires everything
        sender.on_ack(&ack_bytes(2), at_ms(10), &mut io);
        assert_eq!(sender.in_flight(), 0);
        assert!(sender.is_idle());
        assert!(io.timer.is_none());
    }

    #[test]
    fn test_uneven_final_fragment() {
        let mut sender = Sender::new(config(10, 100)).unwrap();
        let mut io = MockIo::default();

        sender.submit(&[1u8; 250], at_ms(0), &mut io);

        assert_eq!(io.sent.len(), 3);
        assert_eq!(io.sent[2].payload.len(), 50);
        assert!(io.sent[2].last);
    }

    #[test]
    fn test_empty_message_produces_nothing() {
        let mut sender = Sender::new(config(10, 100)).unwrap();
        let mut io = MockIo::default();

        sender.submit(b"", at_ms(0), &mut io);

        assert!(io.sent.is_empty());
        assert!(sender.is_idle());
        assert!(io.timer.is_none());
    }

    #[test]
    fn test_window_full_queues_overflow() {
        let mut sender = Sender::new(config(2, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(&[7u8; 35], at_ms(0), &mut io); // 4 fragments

        assert_eq!(io.sent.len(), 2);
        assert_eq!(sender.in_flight(), 2);
        assert_eq!(sender.queued(), 2);

        // Ack the first: one slot frees, one queued packet goes out
        sender.on_ack(&ack_bytes(0), at_ms(50), &mut io);
        assert_eq!(io.sent.len(), 3);
        assert_eq!(io.sent[2].seq, SeqNumber::new(2));
        assert_eq!(sender.in_flight(), 2);
        assert_eq!(sender.queued(), 1);
    }

    #[test]
    fn test_submit_behind_nonempty_queue_keeps_order() {
        let mut sender = Sender::new(config(1, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(&[1u8; 25], at_ms(0), &mut io); // seq 0 sent, 1 and 2 queued
        sender.submit(b"tail", at_ms(1), &mut io); // seq 3 must queue behind

        assert_eq!(io.sent.len(), 1);
        assert_eq!(sender.queued(), 3);

        for (ack, expect_next) in [(0u8, 1u8), (1, 2), (2, 3)] {
            sender.on_ack(&ack_bytes(ack), at_ms(10 + u64::from(ack)), &mut io);
            assert_eq!(io.sent.last().unwrap().seq, SeqNumber::new(expect_next));
        }
    }

    #[test]
    fn test_cumulative_ack_retires_prefix_only() {
        let mut sender = Sender::new(config(10, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(&[9u8; 50], at_ms(0), &mut io); // seq 0..=4

        sender.on_ack(&ack_bytes(2), at_ms(20), &mut io);
        assert_eq!(sender.in_flight(), 2);

        // Ack below the window base changes nothing
        sender.on_ack(&ack_bytes(1), at_ms(30), &mut io);
        assert_eq!(sender.in_flight(), 2);

        sender.on_ack(&ack_bytes(4), at_ms(40), &mut io);
        assert_eq!(sender.in_flight(), 0);
    }

    #[test]
    fn test_corrupt_ack_dropped() {
        let mut sender = Sender::new(config(10, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(b"data", at_ms(0), &mut io);

        let mut raw = ack_bytes(0);
        raw[3] ^= 0x01;
        sender.on_ack(&raw, at_ms(10), &mut io);

        assert_eq!(sender.in_flight(), 1);
        assert_eq!(sender.stats().acks_corrupted, 1);
        assert_eq!(sender.stats().acks_received, 0);
    }

    #[test]
    fn test_timeout_retransmits_oldest_and_rearms_for_next() {
        // Three packets in flight, staggered send times. The oldest expires:
        // exactly one retransmission, and the timer is re-armed with the
        // next-oldest entry's remaining duration.
        let mut sender = Sender::new(config(10, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(b"a", at_ms(0), &mut io); // expires at 300
        sender.submit(b"b", at_ms(100), &mut io); // expires at 400
        sender.submit(b"c", at_ms(200), &mut io); // expires at 500
        assert_eq!(io.sent.len(), 3);

        io.timer = None; // the armed timer fires
        sender.on_timeout(at_ms(300), &mut io);

        assert_eq!(io.sent.len(), 4);
        assert_eq!(io.sent[3].seq, SeqNumber::new(0));
        assert_eq!(sender.stats().packets_retransmitted, 1);
        assert_eq!(io.timer, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_timeout_flushes_entries_already_past_due() {
        // All three sent at once share an expiry; one timeout event must
        // retransmit all of them and re-arm for the earliest fresh entry.
        let mut sender = Sender::new(config(10, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(&[3u8; 25], at_ms(0), &mut io); // seq 0, 1, 2

        io.timer = None;
        sender.on_timeout(at_ms(300), &mut io);

        assert_eq!(io.sent.len(), 6);
        let resent: Vec<u8> = io.sent[3..].iter().map(|p| p.seq.as_raw()).collect();
        assert_eq!(resent, vec![0, 1, 2]);
        assert_eq!(io.timer, Some(Duration::from_millis(300)));
    }

    #[test]
    fn test_timeout_arms_timer_exactly_once() {
        // A single timeout event can retransmit several past-due packets,
        // each appending a fresh timer entry, but the channel timer must be
        // armed exactly once, for the next live entry.
        let mut sender = Sender::new(config(10, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(&[8u8; 25], at_ms(0), &mut io); // seq 0, 1, 2 expire at 300
        sender.submit(b"d", at_ms(100), &mut io); // seq 3 expires at 400
        let armed_before = io.timers_started;

        io.timer = None; // the armed timer fires
        sender.on_timeout(at_ms(300), &mut io);

        assert_eq!(sender.stats().packets_retransmitted, 3);
        assert_eq!(io.timers_started, armed_before + 1);
        assert_eq!(io.timer, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_ack_of_front_rearms_remaining_time() {
        let mut sender = Sender::new(config(10, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(b"a", at_ms(0), &mut io); // expires at 300
        sender.submit(b"b", at_ms(150), &mut io); // expires at 450

        sender.on_ack(&ack_bytes(0), at_ms(200), &mut io);
        assert_eq!(sender.in_flight(), 1);
        assert_eq!(io.timer, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_superseded_entries_skipped_lazily() {
        // A retransmission moves a packet's fresh timer entry to the back
        // of the FIFO while the packet stays oldest in the window. Acks that
        // then retire it can only flag the entry; the flags must be skipped
        // when those entries surface at the front.
        let mut sender = Sender::new(config(10, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(b"a", at_ms(0), &mut io); // seq 0, expires 300
        sender.submit(b"b", at_ms(50), &mut io); // seq 1, expires 350
        sender.submit(b"c", at_ms(100), &mut io); // seq 2, expires 400

        io.timer = None;
        sender.on_timeout(at_ms(300), &mut io);
        // Entries now [1@350, 2@400, 0@600]; timer armed for seq 1
        assert_eq!(io.sent.last().unwrap().seq, SeqNumber::new(0));
        assert_eq!(io.timer, Some(Duration::from_millis(50)));

        // Retiring seq 0 cannot touch the armed timer: its entry is last
        sender.on_ack(&ack_bytes(0), at_ms(310), &mut io);
        assert_eq!(sender.in_flight(), 2);
        assert_eq!(io.timer, Some(Duration::from_millis(50)));

        io.timer = None;
        sender.on_timeout(at_ms(350), &mut io);
        // Entries now [2@400, 0@600 superseded, 1@650]; armed for seq 2
        assert_eq!(io.sent.last().unwrap().seq, SeqNumber::new(1));
        assert_eq!(io.timer, Some(Duration::from_millis(50)));

        // Cumulative ack retires 1 and 2; the walk must pop the superseded
        // entries for 0 and 1 and end with no armed timer
        sender.on_ack(&ack_bytes(2), at_ms(360), &mut io);
        assert!(sender.is_idle());
        assert!(io.timer.is_none());
        assert_eq!(sender.stats().packets_retransmitted, 2);
    }

    #[test]
    fn test_sequence_numbers_wrap() {
        let mut sender = Sender::new(config(4, 10)).unwrap();
        let mut io = MockIo::default();

        // Push the send cursor near the top of the sequence space
        for i in 0u8..126 {
            sender.submit(b"x", at_ms(u64::from(i)), &mut io);
            sender.on_ack(&ack_bytes(i), at_ms(u64::from(i)), &mut io);
        }
        assert!(sender.is_idle());

        sender.submit(&[1u8; 40], at_ms(200), &mut io); // seq 126, 127, 0, 1
        let seqs: Vec<u8> = io.sent[126..].iter().map(|p| p.seq.as_raw()).collect();
        assert_eq!(seqs, vec![126, 127, 0, 1]);

        // Cumulative ack across the wrap point retires all four
        sender.on_ack(&ack_bytes(1), at_ms(250), &mut io);
        assert!(sender.is_idle());
        assert!(io.timer.is_none());
    }

    #[test]
    fn test_window_bound_never_exceeded() {
        let mut sender = Sender::new(config(3, 10)).unwrap();
        let mut io = MockIo::default();

        sender.submit(&[5u8; 100], at_ms(0), &mut io); // 10 fragments
        assert_eq!(sender.in_flight(), 3);

        for i in 0..10u8 {
            sender.on_ack(&ack_bytes(i), at_ms(10 + u64::from(i)), &mut io);
            assert!(sender.in_flight() <= 3);
        }
        assert!(sender.is_idle());
        assert_eq!(io.sent.len(), 10);
    }
}
