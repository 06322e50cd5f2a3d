use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use uplink_rl::{Quantizer, Trainer, TrainerConfig};

fn bench_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    group.sample_size(10);
    for &episodes in &[50usize, 250usize] {
        let cfg = TrainerConfig {
            episodes,
            eval_episodes: 1,
            log_every: 0,
            ..TrainerConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("episodes", episodes), &cfg, |b, cfg| {
            b.iter(|| {
                let report = Trainer::new(*cfg, Quantizer::default())
                    .unwrap()
                    .train()
                    .unwrap();
                black_box(report.greedy_mean);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_train);
criterion_main!(benches);
