use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sd_core::config::{ModeKind, SearchSettings};
use sd_core::{DecisionBuffer, DitherConfig, FragmentBuffer};
use sd_dither::DitherPass;

const SIDE: u32 = 256;

fn ramp() -> FragmentBuffer {
    let mut input = FragmentBuffer::new(SIDE, SIDE).unwrap_or_else(|e| panic!("{e}"));
    for (i, f) in input.fragments.iter_mut().enumerate() {
        f.coverage = (i as u32 % SIDE) as f32 / (SIDE - 1) as f32;
        f.object_id = i as u32 / 4096;
    }
    input
}

fn bench_execute(c: &mut Criterion) {
    let input = ramp();
    let mut group = c.benchmark_group("execute_256");
    for kind in [
        ModeKind::Grid3x3,
        ModeKind::Grid4x4,
        ModeKind::RussianRoulette,
        ModeKind::Adaptive,
        ModeKind::Reservoir,
    ] {
        let config = DitherConfig {
            mode: kind,
            search: SearchSettings {
                anneal_iterations: 50_000,
                seed: Some(3),
                ..SearchSettings::default()
            },
            ..DitherConfig::default()
        };
        let mut pass = DitherPass::new(config).unwrap_or_else(|e| panic!("{e}"));
        let mut out = DecisionBuffer::new(SIDE, SIDE);
        group.bench_function(BenchmarkId::from_parameter(kind.name()), |b| {
            b.iter(|| pass.execute(&input, &mut out));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_execute);
criterion_main!(benches);
