use criterion::{criterion_group, criterion_main, Criterion};
use fitbit_subscriber::models::Notification;
use fitbit_subscriber::services::signature::{sign, verify};
use std::hint::black_box;

fn sample_batch(len: usize) -> Vec<u8> {
    let batch: Vec<_> = (0..len)
        .map(|i| {
            serde_json::json!({
                "collectionType": "activities",
                "date": "2024-01-01",
                "ownerId": format!("user{}", i),
                "ownerType": "user",
                "subscriptionId": format!("user{}", i)
            })
        })
        .collect();
    serde_json::to_vec(&batch).expect("Failed to serialize batch")
}

fn benchmark_webhook_ingest(c: &mut Criterion) {
    let secret = "benchmark_secret";
    let small = sample_batch(1);
    let large = sample_batch(100);
    let small_sig = sign(&small, secret);
    let large_sig = sign(&large, secret);

    let mut group = c.benchmark_group("webhook_ingest");

    group.bench_function("verify_single_notification", |b| {
        b.iter(|| verify(black_box(&small), black_box(&small_sig), secret))
    });

    group.bench_function("verify_100_notifications", |b| {
        b.iter(|| verify(black_box(&large), black_box(&large_sig), secret))
    });

    group.bench_function("verify_and_parse_100_notifications", |b| {
        b.iter(|| {
            assert!(verify(black_box(&large), &large_sig, secret));
            Notification::parse_batch(black_box(&large)).expect("Failed to parse batch")
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_webhook_ingest);
criterion_main!(benches);
