//! End-to-end delivery tests over the simulated channel
//!
//! Each test wires a sender and receiver through an impaired virtual
//! channel and checks the one promise that matters: every submitted
//! message comes out the far side exactly once, intact, in order.

use arq_protocol::ProtocolConfig;
use arq_sim::{ChannelConfig, Simulator};
use std::time::Duration;

fn run(channel: ChannelConfig, messages: &[Vec<u8>], limit: Duration) -> Simulator {
    let mut sim = Simulator::new(ProtocolConfig::default(), channel).unwrap();
    for message in messages {
        sim.send_message(message);
    }
    sim.run_until_idle(limit).unwrap();
    sim.verify_delivery().unwrap();
    sim
}

fn varied_messages(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            let len = 1 + (i * 37) % 600;
            vec![(i % 251) as u8; len]
        })
        .collect()
}

#[test]
fn test_single_message_clean_channel() {
    let sim = run(
        ChannelConfig::default(),
        &[b"hello".to_vec()],
        Duration::from_secs(10),
    );
    assert_eq!(sim.delivered().len(), 1);
    assert_eq!(sim.sender_stats().packets_retransmitted, 0);
    assert_eq!(sim.receiver_stats().duplicates_discarded, 0);
}

#[test]
fn test_message_spanning_three_fragments() {
    // 300 bytes over 124-byte payloads: two full fragments and a 52-byte
    // tail carrying the last flag
    let sim = run(
        ChannelConfig::default(),
        &[vec![0xAB; 300]],
        Duration::from_secs(10),
    );
    assert_eq!(sim.sender_stats().fragments_created, 3);
    assert_eq!(sim.delivered()[0].len(), 300);
    assert_eq!(sim.receiver_stats().messages_delivered, 1);
}

#[test]
fn test_loss_only_channel() {
    let channel = ChannelConfig {
        loss_rate: 0.25,
        seed: 42,
        ..Default::default()
    };
    let sim = run(channel, &varied_messages(25), Duration::from_secs(600));
    assert!(sim.sender_stats().packets_retransmitted > 0);
}

#[test]
fn test_corruption_only_channel() {
    let channel = ChannelConfig {
        corrupt_rate: 0.25,
        seed: 42,
        ..Default::default()
    };
    let sim = run(channel, &varied_messages(25), Duration::from_secs(600));
    let corrupt_seen =
        sim.receiver_stats().packets_corrupted + sim.sender_stats().acks_corrupted;
    assert!(corrupt_seen > 0);
}

#[test]
fn test_duplication_only_channel() {
    // Without jitter a duplicated copy trails its original, so it arrives
    // behind the advanced cursor and is answered with a corrective ack
    // rather than parked in the holding area
    let channel = ChannelConfig {
        duplicate_rate: 0.4,
        seed: 42,
        ..Default::default()
    };
    let sim = run(channel, &varied_messages(25), Duration::from_secs(600));
    assert!(sim.channel_stats().duplicated > 0);
    assert!(sim.receiver_stats().out_of_window > 0);
    assert_eq!(sim.delivered().len(), 25);
}

#[test]
fn test_reordering_only_channel() {
    // Heavy jitter relative to latency scrambles arrival order
    let channel = ChannelConfig {
        latency: Duration::from_millis(10),
        jitter: Duration::from_millis(200),
        seed: 42,
        ..Default::default()
    };
    let sim = run(channel, &varied_messages(25), Duration::from_secs(600));
    assert_eq!(sim.delivered().len(), 25);
}

#[test]
fn test_adversarial_channel_bulk_transfer() {
    let sim = run(
        ChannelConfig::adversarial(7),
        &varied_messages(50),
        Duration::from_secs(3600),
    );
    assert_eq!(sim.delivered().len(), 50);
}

#[test]
fn test_adversarial_channel_across_seeds() {
    for seed in 1..=8 {
        let mut sim =
            Simulator::new(ProtocolConfig::default(), ChannelConfig::adversarial(seed)).unwrap();
        for message in varied_messages(15) {
            sim.send_message(&message);
        }
        sim.run_until_idle(Duration::from_secs(3600)).unwrap();
        sim.verify_delivery()
            .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
    }
}

#[test]
fn test_burst_beyond_window_drains_queue() {
    // 40 single-fragment messages submitted at once against a window of
    // 10; the rest must wait their turn and still arrive in order
    let messages: Vec<Vec<u8>> = (0..40).map(|i| vec![i as u8; 50]).collect();
    let sim = run(
        ChannelConfig::default(),
        &messages,
        Duration::from_secs(60),
    );
    assert!(sim.sender_stats().packets_queued > 0);
    assert_eq!(sim.delivered().len(), 40);
}

#[test]
fn test_sequence_space_wraps_during_transfer() {
    // Well over 128 fragments forces the 7-bit sequence space to wrap
    let messages: Vec<Vec<u8>> = (0..300).map(|i| vec![(i % 251) as u8; 60]).collect();
    let channel = ChannelConfig {
        loss_rate: 0.1,
        seed: 3,
        ..Default::default()
    };
    let sim = run(channel, &messages, Duration::from_secs(3600));
    assert_eq!(sim.delivered().len(), 300);
}

#[test]
fn test_small_window_still_correct() {
    let protocol = ProtocolConfig {
        window_size: 1,
        ..Default::default()
    };
    let mut sim = Simulator::new(protocol, ChannelConfig::adversarial(11)).unwrap();
    for message in varied_messages(10) {
        sim.send_message(&message);
    }
    sim.run_until_idle(Duration::from_secs(3600)).unwrap();
    sim.verify_delivery().unwrap();
}

#[test]
fn test_total_loss_never_settles() {
    let channel = ChannelConfig {
        loss_rate: 1.0,
        ..Default::default()
    };
    let mut sim = Simulator::new(ProtocolConfig::default(), channel).unwrap();
    sim.send_message(b"into the void");
    assert!(sim.run_until_idle(Duration::from_secs(10)).is_err());
}
