//! Statistics display and formatting

use arq_protocol::{ReceiverStats, SenderStats, Timestamp};
use arq_sim::ChannelStats;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Ratio as a percentage string, "-" when the denominator is zero
pub fn format_rate(num: u64, denom: u64) -> String {
    if denom == 0 {
        "-".to_string()
    } else {
        format!("{:.1}%", num as f64 * 100.0 / denom as f64)
    }
}

/// Display a full end-of-run report
pub fn display_report(
    elapsed: Timestamp,
    payload_bytes: u64,
    sender: &SenderStats,
    receiver: &ReceiverStats,
    channel: &ChannelStats,
) {
    println!("\n┌─────────────────────────────────────────────┐");
    println!("│ RUN REPORT                                  │");
    println!("├─────────────────────────────────────────────┤");
    println!("│ Virtual time elapsed: {:<21} │", elapsed.to_string());
    println!(
        "│ Payload transferred:  {:<21} │",
        format_bytes(payload_bytes)
    );
    println!("├─ Sender ────────────────────────────────────┤");
    println!("│ Messages submitted:   {:<21} │", sender.messages_submitted);
    println!("│ Fragments created:    {:<21} │", sender.fragments_created);
    println!("│ Packets sent:         {:<21} │", sender.packets_sent);
    println!(
        "│ Retransmissions:      {:<21} │",
        format!(
            "{} ({})",
            sender.packets_retransmitted,
            format_rate(sender.packets_retransmitted, sender.packets_sent)
        )
    );
    println!("│ Acks received:        {:<21} │", sender.acks_received);
    println!("│ Acks corrupted:       {:<21} │", sender.acks_corrupted);
    println!("├─ Receiver ──────────────────────────────────┤");
    println!("│ Packets accepted:     {:<21} │", receiver.packets_accepted);
    println!("│ Packets buffered:     {:<21} │", receiver.packets_buffered);
    println!(
        "│ Duplicates dropped:   {:<21} │",
        receiver.duplicates_discarded
    );
    println!("│ Corrupt dropped:      {:<21} │", receiver.packets_corrupted);
    println!("│ Acks sent:            {:<21} │", receiver.acks_sent);
    println!(
        "│ Messages delivered:   {:<21} │",
        receiver.messages_delivered
    );
    println!("├─ Channel ───────────────────────────────────┤");
    println!("│ Transmissions:        {:<21} │", channel.offered);
    println!(
        "│ Dropped:              {:<21} │",
        format!(
            "{} ({})",
            channel.dropped,
            format_rate(channel.dropped, channel.offered)
        )
    );
    println!("│ Corrupted:            {:<21} │", channel.corrupted);
    println!("│ Duplicated:           {:<21} │", channel.duplicated);
    println!("└─────────────────────────────────────────────┘");
}

/// Display compact one-line statistics
pub fn display_compact_stats(
    elapsed: Timestamp,
    sender: &SenderStats,
    receiver: &ReceiverStats,
) {
    println!(
        "t={} sent={} retx={} acked={} delivered={}",
        elapsed, sender.packets_sent, sender.packets_retransmitted, sender.acks_received,
        receiver.messages_delivered
    );
}
