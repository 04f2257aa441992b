//! Latency benchmarks for the refresh pipeline
//!
//! A full mempool holds a few hundred transactions; classification and ordering of
//! one snapshot should stay well below a millisecond.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use txtop::classify::classify;
use txtop::config::SortMode;
use txtop::metadata::encode_message;
use txtop::snapshot::{select_entries, TxEntry};
use txtop::source::{Certificate, DecodedTx, TxOutput};

fn sample_tx() -> DecodedTx {
    DecodedTx {
        hash: "ab".repeat(32),
        metadata: encode_message(&["Minswap: Swap Exact In Order"]).ok(),
        outputs: vec![
            TxOutput::new("addr1qy2jt0qpqz2z2z9zx5w4xemekkce7yderz53kjue53lpqv90lkfa9sgrfjuz6uvt4uqtrqhl2kj0a9lnr9ndzutx32gqleeckv"),
            TxOutput::with_stake("addr1q9xyz", "stake1uxyz"),
        ],
        certificates: vec![Certificate::StakeDelegation],
    }
}

/// Benchmark classifying one transaction through all four rule families
fn bench_classify(c: &mut Criterion) {
    let tx = sample_tx();

    c.bench_function("classify_transaction", |b| b.iter(|| black_box(classify(black_box(&tx)))));
}

/// Benchmark ordering and truncating a full snapshot
fn bench_select_entries(c: &mut Criterion) {
    let entries: Vec<TxEntry> = (0..500u64)
        .map(|i| TxEntry {
            size_bytes: (i * 7919) % 16384,
            category: None,
            hash: format!("{:064x}", i),
        })
        .collect();

    c.bench_function("select_entries_by_size", |b| {
        b.iter(|| black_box(select_entries(black_box(entries.clone()), SortMode::BySize, 100)))
    });
}

criterion_group!(benches, bench_classify, bench_select_entries);

criterion_main!(benches);
