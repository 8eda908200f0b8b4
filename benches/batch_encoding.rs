//! Benchmarks comparing per-event encoding with batch encoding.

use chrono::Utc;
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use fluent_logger::{Event, encode_batch, encode_event, record};

fn sample_events(count: usize) -> Vec<Event> {
    let now = Utc::now();
    (0..count)
        .map(|id| {
            Event::new(
                "bench.tag",
                record! { "id" => format!("{id:032x}"), "ok" => true },
                now,
            )
        })
        .collect()
}

fn bench_encoding(c: &mut Criterion) {
    let events = sample_events(1000);

    c.bench_function("encode_event x1000", |b| {
        b.iter(|| {
            for event in &events {
                black_box(encode_event(&event.tag, event.time, &event.record).unwrap());
            }
        })
    });

    c.bench_function("encode_batch 1000", |b| {
        b.iter(|| black_box(encode_batch(&events).unwrap()))
    });

    c.bench_function("encode_event opaque fallback", |b| {
        b.iter_batched(
            || record! { "at" => Utc::now(), "n" => 1 },
            |record| black_box(encode_event("bench.tag", 0, &record).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_encoding);
criterion_main!(benches);
