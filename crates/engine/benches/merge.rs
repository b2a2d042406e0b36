//! Benchmarks for the candidate merge
//!
//! Run with: cargo bench --package engine

use catalog::ItemId;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use engine::{merge_candidates, merge_recommendations};
use models::{CandidateSource, rank_candidates};

/// Two lists of `len` ids where every other content id also appears in the
/// collaborative list
fn overlapping_lists(len: usize) -> (Vec<ItemId>, Vec<ItemId>) {
    let collaborative = (0..len).map(|i| format!("m{}", i)).collect();
    let content = (0..len)
        .map(|i| if i % 2 == 0 { format!("m{}", i) } else { format!("c{}", i) })
        .collect();
    (collaborative, content)
}

fn bench_merge_recommendations(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_recommendations");
    for len in [10usize, 300, 3000] {
        let (a, b) = overlapping_lists(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |bench, _| {
            bench.iter(|| {
                let merged = merge_recommendations(black_box(&a), black_box(&b), black_box(10));
                black_box(merged)
            })
        });
    }
    group.finish();
}

fn bench_merge_all(c: &mut Criterion) {
    let (a, b) = overlapping_lists(300);

    c.bench_function("merge_recommendations_untruncated", |bench| {
        bench.iter(|| {
            let merged = merge_recommendations(black_box(&a), black_box(&b), black_box(i64::MAX));
            black_box(merged)
        })
    });
}

fn bench_merge_candidates(c: &mut Criterion) {
    let (a, b) = overlapping_lists(300);

    c.bench_function("merge_candidates", |bench| {
        bench.iter(|| {
            let collaborative = rank_candidates(a.clone(), CandidateSource::Collaborative);
            let content = rank_candidates(b.clone(), CandidateSource::Content);
            black_box(merge_candidates(collaborative, content, black_box(10)))
        })
    });
}

criterion_group!(
    benches,
    bench_merge_recommendations,
    bench_merge_all,
    bench_merge_candidates
);
criterion_main!(benches);
