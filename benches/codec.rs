//! Codec and round-trip benchmark suite.
//!
//! - Command frame encode/decode
//! - Request body parsing (plain and enveloped)
//! - Full bridge round-trip against the emulated device
//!
//! Run with: cargo bench --bench codec
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use serial_bridge::{Bridge, Command, EmulatedDevice, Request, SessionHandle};

// ============================================================================
// Benchmark: Command Codec
// ============================================================================

fn bench_command_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_codec");

    for command in [Command::on(3), Command::off(6), Command::read(2)] {
        let frame = String::from_utf8(command.encode()).expect("utf-8 frame");

        group.bench_with_input(BenchmarkId::new("encode", &command), &command, |b, command| {
            b.iter(|| black_box(command).encode());
        });

        group.bench_with_input(BenchmarkId::new("decode", &command), &frame, |b, frame| {
            b.iter(|| Command::decode(black_box(frame)).expect("decode"));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Request Parsing
// ============================================================================

fn bench_request_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse");

    let bodies = [
        ("plain", r#"{"command":0,"id":3}"#),
        ("envelope", r#"{"message":{"command":"read","id":1}}"#),
        ("extra_keys", r#"{"command":1,"id":4,"request":"x","ts":1700000000}"#),
    ];

    for (name, body) in bodies {
        let request = Request::new(SessionHandle::new(1)).with_message(body);
        group.bench_with_input(BenchmarkId::new("parse", name), &request, |b, request| {
            b.iter(|| black_box(request).parse_command().expect("parse"));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Bridge Round-Trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let bridge = rt.block_on(async {
        let (device, _probe) = EmulatedDevice::new();
        Bridge::builder()
            .reset_delay(Duration::ZERO)
            .queue_poll(Duration::from_millis(5))
            .start_with_transport(device)
            .await
            .expect("start")
    });
    let handle = SessionHandle::new(1);
    bridge.create_session(handle).expect("create");

    let mut group = c.benchmark_group("round_trip");
    group.sample_size(50);

    group.bench_function("led_on", |b| {
        b.to_async(&rt).iter(|| async {
            bridge
                .handle_message(Request::new(handle).with_message(r#"{"command":0,"id":3}"#))
                .expect("queued")
                .wait()
                .await
                .expect("event")
        });
    });

    group.finish();

    rt.block_on(bridge.shutdown());
}

criterion_group!(benches, bench_command_codec, bench_request_parse, bench_round_trip);
criterion_main!(benches);
