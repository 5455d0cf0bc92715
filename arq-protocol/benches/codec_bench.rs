use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use arq_protocol::checksum::crc16;
use arq_protocol::packet::{AckPacket, DataPacket, Packet, MAX_PAYLOAD_SIZE};
use arq_protocol::sequence::SeqNumber;

fn bench_data_packet_encode(c: &mut Criterion) {
    let payload = Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE]);
    let packet = DataPacket::new(SeqNumber::new(100), false, payload).unwrap();

    c.bench_function("data_packet_encode", |b| {
        b.iter(|| {
            let bytes = black_box(&packet).to_bytes();
            black_box(bytes);
        });
    });
}

fn bench_data_packet_decode(c: &mut Criterion) {
    let payload = Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE]);
    let packet = DataPacket::new(SeqNumber::new(100), false, payload).unwrap();
    let bytes = packet.to_bytes();

    c.bench_function("data_packet_decode", |b| {
        b.iter(|| {
            let packet = Packet::from_bytes(black_box(&bytes)).unwrap();
            black_box(packet);
        });
    });
}

fn bench_ack_packet_encode(c: &mut Criterion) {
    let ack = AckPacket::new(SeqNumber::new(42));

    c.bench_function("ack_packet_encode", |b| {
        b.iter(|| {
            let bytes = black_box(&ack).to_bytes();
            black_box(bytes);
        });
    });
}

fn bench_crc16(c: &mut Criterion) {
    let data = vec![0xA5u8; MAX_PAYLOAD_SIZE + 2];

    c.bench_function("crc16_full_packet", |b| {
        b.iter(|| {
            let crc = crc16(black_box(&data));
            black_box(crc);
        });
    });
}

fn bench_seq_number_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_number");

    group.bench_function("increment", |b| {
        let mut seq = SeqNumber::new(100);
        b.iter(|| {
            seq.increment();
            black_box(&seq);
        });
    });

    group.bench_function("between", |b| {
        let base = SeqNumber::new(120);
        let seq = SeqNumber::new(3);
        let end = SeqNumber::new(10);
        b.iter(|| {
            let result = SeqNumber::between(black_box(base), black_box(seq), black_box(end));
            black_box(result);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_data_packet_encode,
    bench_data_packet_decode,
    bench_ack_packet_encode,
    bench_crc16,
    bench_seq_number_ops,
);
criterion_main!(benches);
