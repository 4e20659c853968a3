//! Criterion benchmarks for the tablet frame codec.
//!
//! Status updates arrive from every tablet in the room several times a
//! minute, so decoding them is the protocol's hot path.
//!
//! Run with:
//! ```bash
//! cargo bench --package classroom-core --bench codec_bench
//! ```

use classroom_core::protocol::{
    decode_device_message, encode_command, encode_device_message, DeviceMessage, ServerCommand,
};
use classroom_core::{DeviceStatus, DeviceStatusReport};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

// ── Message fixtures ──────────────────────────────────────────────────────────

fn make_status_update() -> DeviceMessage {
    DeviceMessage::StatusUpdate(DeviceStatusReport {
        device_id: Uuid::new_v4(),
        status: DeviceStatus::OnTask,
        battery_level: Some(76),
        current_material_id: Some(Uuid::new_v4()),
        student_view: Some("question-4".to_string()),
        timestamp: 1_700_000_000_000,
    })
}

fn make_hand_raised() -> DeviceMessage {
    DeviceMessage::HandRaised {
        device_id: Uuid::new_v4(),
    }
}

fn make_pairing_request() -> DeviceMessage {
    DeviceMessage::PairingRequest {
        device_id: Uuid::new_v4(),
    }
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_decode(c: &mut Criterion) {
    let messages = [
        ("StatusUpdate", make_status_update()),
        ("HandRaised", make_hand_raised()),
        ("PairingRequest", make_pairing_request()),
    ];
    let mut group = c.benchmark_group("decode_device_message");
    for (name, msg) in &messages {
        let bytes = encode_device_message(msg).expect("encode must succeed for benchmark setup");
        group.bench_with_input(BenchmarkId::new("msg", name), &bytes, |b, bytes| {
            b.iter(|| decode_device_message(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

fn bench_encode_command(c: &mut Criterion) {
    let hand_ack = ServerCommand::HandAck {
        device_id: Uuid::new_v4(),
    };
    c.bench_function("encode_command/HandAck", |b| {
        b.iter(|| encode_command(black_box(&hand_ack)))
    });
}

/// A read that delivered a burst of status updates from one tablet.
fn bench_decode_burst(c: &mut Criterion) {
    let mut burst = Vec::new();
    for _ in 0..32 {
        burst.extend(encode_device_message(&make_status_update()).expect("encode"));
    }
    c.bench_function("decode_burst/32_status_updates", |b| {
        b.iter(|| {
            let mut offset = 0;
            while offset < burst.len() {
                let (_, n) = decode_device_message(black_box(&burst[offset..])).expect("decode");
                offset += n;
            }
        })
    });
}

criterion_group!(benches, bench_decode, bench_encode_command, bench_decode_burst);
criterion_main!(benches);
