use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sd_core::config::{ScoreRule, SearchSettings};
use sd_perm::matrix::PermutationMatrix;
use sd_perm::score::{score, torus_distance_score};
use sd_perm::search::{AnnealParams, ScoreBand, search_annealed, search_exhaustive};

fn bench_score(c: &mut Criterion) {
    let m = PermutationMatrix::seed(4).unwrap_or_else(|e| panic!("{e}"));
    c.bench_function("score_4x4", |b| b.iter(|| score(black_box(&m))));
    c.bench_function("torus_distance_4x4", |b| {
        b.iter(|| torus_distance_score(black_box(&m)));
    });
}

fn bench_exhaustive(c: &mut Criterion) {
    let mut group = c.benchmark_group("exhaustive");
    group.sample_size(10);
    group.bench_function("3x3_top288", |b| {
        b.iter(|| search_exhaustive(3, ScoreRule::Adjacency, ScoreBand::ANY, 288));
    });
    group.finish();
}

fn bench_anneal(c: &mut Criterion) {
    let params = AnnealParams {
        iterations: 100_000,
        ..AnnealParams::from_settings(&SearchSettings {
            seed: Some(1),
            chains: 1,
            ..SearchSettings::default()
        })
    };
    let mut group = c.benchmark_group("anneal");
    group.sample_size(10);
    group.bench_function("4x4_100k", |b| b.iter(|| search_annealed(4, black_box(&params))));
    group.finish();
}

criterion_group!(benches, bench_score, bench_exhaustive, bench_anneal);
criterion_main!(benches);
