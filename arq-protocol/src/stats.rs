//! Per-endpoint transfer counters

/// Sender-side statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Messages accepted from the application
    pub messages_submitted: u64,
    /// Fragments produced by fragmentation
    pub fragments_created: u64,
    /// Packets handed to the channel (first transmissions)
    pub packets_sent: u64,
    /// Packets re-sent after a timeout
    pub packets_retransmitted: u64,
    /// Valid acknowledgments processed
    pub acks_received: u64,
    /// Acknowledgments dropped for checksum failure
    pub acks_corrupted: u64,
    /// Packets parked in the overflow queue at least once
    pub packets_queued: u64,
}

/// Receiver-side statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Packets dropped for checksum failure
    pub packets_corrupted: u64,
    /// Packets accepted in order at the cursor
    pub packets_accepted: u64,
    /// Out-of-order packets parked in the holding area
    pub packets_buffered: u64,
    /// Out-of-order packets discarded because their holding-area slot was
    /// already filled
    pub duplicates_discarded: u64,
    /// Packets outside the acceptance window (stale retransmissions or
    /// duplicate copies behind the cursor) answered with a corrective ack
    pub out_of_window: u64,
    /// Acknowledgments emitted
    pub acks_sent: u64,
    /// Complete messages delivered upward
    pub messages_delivered: u64,
}
