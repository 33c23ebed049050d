//! Event fan-out benchmark suite.
//!
//! Measures the cost of decoding one event and queueing it for every
//! matching subscription:
//! - Subscriber counts: 1, 16, 128
//! - Policies: drop-oldest ring, drop-newest queue
//!
//! Run with: cargo bench --bench event_fanout
//! Results saved to: target/criterion/

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;

use cdp_session::events::EventBus;
use cdp_session::protocol::RawEvent;
use cdp_session::{EventDecoders, EventFilter, OverflowPolicy};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const SUBSCRIBER_COUNTS: &[usize] = &[1, 16, 128];
const BUFFER: usize = 1024;

// ============================================================================
// Helpers
// ============================================================================

fn decoders() -> Arc<EventDecoders> {
    Arc::new(
        EventDecoders::builder()
            .raw("Network.requestWillBeSent")
            .raw("Page.loadEventFired")
            .build(),
    )
}

fn network_event() -> RawEvent {
    RawEvent::from_value(
        "Network.requestWillBeSent",
        &json!({
            "requestId": "1000.1",
            "loaderId": "L1",
            "documentURL": "https://example.com/",
            "request": { "url": "https://example.com/app.js", "method": "GET", "headers": {} },
            "timestamp": 1234.5,
            "type": "Script"
        }),
    )
    .expect("raw event")
}

// ============================================================================
// Benchmark: Publish
// ============================================================================

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    group.throughput(Throughput::Elements(1));

    for policy in [OverflowPolicy::DropOldest, OverflowPolicy::DropNewest] {
        for &count in SUBSCRIBER_COUNTS {
            let bus = EventBus::new(decoders(), BUFFER, policy);
            let mut streams: Vec<_> = (0..count)
                .map(|_| bus.subscribe(EventFilter::domain("Network")).expect("subscribe"))
                .collect();
            // Never matches; measures filter cost for non-subscribers too
            let _page = bus.subscribe(EventFilter::domain("Page")).expect("subscribe");

            let id = format!("{policy:?}/{count}");
            group.bench_with_input(BenchmarkId::new("subscribers", &id), &count, |b, _| {
                b.iter(|| {
                    bus.publish(network_event()).expect("publish");
                    for stream in &mut streams {
                        stream.try_recv();
                    }
                });
            });
        }
    }

    group.finish();
}

// ============================================================================
// Benchmark: Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let decoders = decoders();

    c.bench_function("decode/requestWillBeSent", |b| {
        b.iter(|| decoders.decode(network_event()).expect("decode"));
    });
}

criterion_group!(benches, bench_publish, bench_decode);
criterion_main!(benches);
