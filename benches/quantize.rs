use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use uplink_rl::{Decider, EnvConfig, LinkEnv, Observation, QTable, Quantizer, Uplink};

fn observations(n: usize) -> Vec<Observation> {
    let mut env = LinkEnv::new(EnvConfig::default().with_seed(7).with_episode_len(n)).unwrap();
    let mut out = Vec::with_capacity(n);
    out.push(env.reset(None));
    while out.len() < n {
        out.push(env.step(Uplink::A).unwrap().observation);
    }
    out
}

fn bench_quantize(c: &mut Criterion) {
    let q = Quantizer::default();
    let obs = observations(1024);

    c.bench_function("quantize_1024", |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for o in &obs {
                acc ^= q.quantize(black_box(o));
            }
            black_box(acc);
        })
    });

    // Untrained rows: every call goes through the lookahead fallback.
    let decider = Decider::new(QTable::for_quantizer(&q), q.clone()).unwrap();
    c.bench_function("decide_lookahead", |b| {
        b.iter(|| black_box(decider.decide(black_box(&obs[0]))))
    });
}

criterion_group!(benches, bench_quantize);
criterion_main!(benches);
