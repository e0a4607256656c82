//! Broker benchmark suite.
//!
//! - Event fan-out to 1, 10 and 100 subscriptions
//! - Command correlation round trips, 1 and 64 in flight
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures_util::future::join_all;
use serde_json::{Value, json};
use tokio::runtime::Runtime;

use webdriver_bidi::{Broker, ChannelTransport, EventHandler, SessionOptions};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const SUBSCRIPTION_COUNTS: &[usize] = &[1, 10, 100];
const IN_FLIGHT: &[usize] = &[1, 64];

fn event_frame() -> String {
    json!({
        "type": "event",
        "method": "network.beforeRequestSent",
        "params": {
            "isBlocked": true,
            "intercepts": ["i-1"],
            "redirectCount": 0,
            "request": { "request": "r-1", "url": "https://example.com/", "method": "GET" },
            "timestamp": 0
        }
    })
    .to_string()
}

// ============================================================================
// Benchmark: Event Fan-out
// ============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let frame = event_frame();

    let mut group = c.benchmark_group("event_fan_out");
    group.throughput(Throughput::Elements(1));

    for &count in SUBSCRIPTION_COUNTS {
        let (transport, _inbound, _remote) = ChannelTransport::pair();
        let broker = Broker::new(Arc::new(transport), SessionOptions::new());
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..count {
            let hits = Arc::clone(&hits);
            let handler = EventHandler::sync(move |event| {
                if event.params["isBlocked"].as_bool() == Some(true) {
                    hits.fetch_add(1, Ordering::Relaxed);
                }
            });
            broker
                .subscribe("network.beforeRequestSent", handler, None)
                .expect("subscribe");
        }

        group.bench_with_input(BenchmarkId::new("subscriptions", count), &count, |b, _| {
            b.iter(|| broker.on_message(black_box(&frame)).expect("dispatch"));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Command Correlation
// ============================================================================

fn bench_correlation(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("command_correlation");

    for &in_flight in IN_FLIGHT {
        let (broker, responder) = rt.block_on(async {
            let (transport, _inbound, mut remote) = ChannelTransport::pair();
            let broker = Broker::new(Arc::new(transport), SessionOptions::new());

            // Echo every command back as a success response
            let echo = broker.clone();
            let responder = tokio::spawn(async move {
                while let Some(text) = remote.recv().await {
                    let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let reply = json!({ "id": frame["id"], "result": frame["params"] });
                    let _ = echo.on_message(&reply.to_string());
                }
            });
            (broker, responder)
        });

        group.throughput(Throughput::Elements(in_flight as u64));
        group.bench_with_input(
            BenchmarkId::new("in_flight", in_flight),
            &in_flight,
            |b, &n| {
                b.to_async(&rt).iter(|| {
                    let broker = broker.clone();
                    async move {
                        let calls = (0..n).map(|i| broker.send_raw("bench.echo", json!({ "i": i })));
                        for result in join_all(calls).await {
                            black_box(result.expect("echo"));
                        }
                    }
                });
            },
        );

        broker.close("benchmark finished");
        responder.abort();
    }

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_correlation);
criterion_main!(benches);
