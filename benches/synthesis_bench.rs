//! Synthesis throughput: sample-accurate vs control-rate rendering.
//!
//! Run with: cargo bench --bench synthesis_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use loopdeck::channel::StereoBuffer;
use loopdeck::engine::{render_channel, EngineConfig};
use loopdeck::script::compile;

fn bench_render(c: &mut Criterion) {
    let program = compile("mod(1/4);sin(220);exp(8);mul(.8)").expect("bench script compiles");
    let cross_program =
        compile("mod(1/4);sin((B.L*180)+55,1.29);mul(A.L)").expect("bench script compiles");
    let neighbor_a = StereoBuffer::zeroed(24_000);
    let neighbor_b = StereoBuffer::zeroed(24_000);

    let mut group = c.benchmark_group("render_channel");
    for &block_size in &[1usize, 16, 64] {
        let config = EngineConfig {
            sample_rate: 48_000,
            block_size,
        };
        group.bench_with_input(
            BenchmarkId::new("oscillator", block_size),
            &config,
            |b, config| {
                b.iter(|| {
                    render_channel(black_box(0), &program, 24_000, 2.0, config, &[&neighbor_a])
                })
            },
        );
        group.bench_with_input(
            BenchmarkId::new("cross_channel", block_size),
            &config,
            |b, config| {
                b.iter(|| {
                    render_channel(
                        black_box(2),
                        &cross_program,
                        96_000,
                        2.0,
                        config,
                        &[&neighbor_a, &neighbor_b, &StereoBuffer::zeroed(0)],
                    )
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
