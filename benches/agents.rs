//! Benchmarks for CPU-side setup: agent spawning and shader validation.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::UVec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

use particle_agents::shader::{validate, ShaderFile, ShaderLanguage};
use particle_agents::spawn_agents;

fn bench_spawn_agents(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_agents");
    let size = UVec2::new(1400, 1000);

    for count in [10_000u32, 100_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter(|| black_box(spawn_agents(count, size, &mut rng)))
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for (name, code) in [
        ("agent", include_str!("../agent.wgsl")),
        ("field", include_str!("../field.wgsl")),
    ] {
        let file = ShaderFile {
            path: PathBuf::from(format!("{}.wgsl", name)),
            language: ShaderLanguage::Wgsl,
            code: code.to_string(),
        };
        group.bench_function(name, |b| b.iter(|| black_box(validate(&file))));
    }

    group.finish();
}

criterion_group!(benches, bench_spawn_agents, bench_validate);
criterion_main!(benches);
