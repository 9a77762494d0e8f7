//! # Subscription Relay Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | `on_message` running, handler acks | < 5µs per message |
//! | `on_message` stopped (refusal) | < 2µs per message |
//! | `execute(pause)` + `execute(resume)` | < 50µs for 64 adapters |

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relay_core::{
    handler_fn, AckDecision, AckHandle, AckMode, AckSink, ControlCommand, ControlPlane,
    HandlerDirectory, MessageId, RelayConfig, TransportError,
};

struct DiscardSink;

impl AckSink for DiscardSink {
    fn settle(&self, _: MessageId, _: AckDecision) -> Result<(), TransportError> {
        Ok(())
    }
}

fn plane(adapters: usize) -> ControlPlane {
    let mut config = RelayConfig::new(AckMode::Manual);
    for i in 0..adapters {
        config = config.with_subscription(format!("sub-{i}"), "bench", "ack");
    }
    let mut directory = HandlerDirectory::new();
    directory
        .register(
            "ack",
            handler_fn(|payload, ack| {
                black_box(payload.len());
                ack.ack()?;
                Ok(())
            }),
        )
        .expect("fresh directory");
    ControlPlane::bootstrap(&config, &directory).expect("valid config")
}

fn bench_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("delivery");
    let sink: Arc<dyn AckSink> = Arc::new(DiscardSink);
    let payload = vec![0u8; 256];

    let running = plane(1);
    group.throughput(Throughput::Elements(1));
    group.bench_function("on_message_running", |b| {
        let adapter = &running.adapters()[0];
        b.iter(|| {
            let ack = AckHandle::new(MessageId::new(), Arc::clone(&sink));
            black_box(adapter.on_message(&payload, ack).expect("settled"))
        })
    });

    let stopped = plane(1);
    stopped.execute(ControlCommand::Pause);
    group.bench_function("on_message_stopped", |b| {
        let adapter = &stopped.adapters()[0];
        b.iter(|| {
            let ack = AckHandle::new(MessageId::new(), Arc::clone(&sink));
            black_box(adapter.on_message(&payload, ack).expect("settled"))
        })
    });

    group.finish();
}

fn bench_control(c: &mut Criterion) {
    let mut group = c.benchmark_group("control");

    for adapters in [1, 8, 64] {
        let plane = plane(adapters);
        group.throughput(Throughput::Elements(adapters as u64));
        group.bench_with_input(
            BenchmarkId::new("pause_resume", adapters),
            &plane,
            |b, plane| {
                b.iter(|| {
                    black_box(plane.execute(ControlCommand::Pause));
                    black_box(plane.execute(ControlCommand::Resume));
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_delivery, bench_control);
criterion_main!(benches);
