use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use secretpaths::{annotate, compile_policy, Policy, RawRule};

const SEGMENTS: [&str; 8] = ["team", "app", "db", "api", "ops", "billing", "infra", "shared"];

fn gen_paths(n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let depth = rng.gen_range(1..6);
            let mut p = String::from("secret");
            for _ in 0..depth {
                p.push('/');
                p.push_str(SEGMENTS[rng.gen_range(0..SEGMENTS.len())]);
            }
            p.push_str(&format!("/key{}", i));
            p
        })
        .collect()
}

fn gen_policies(n: usize, rules_per_policy: usize, seed: u64) -> Vec<Policy> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let raw: Vec<RawRule> = (0..rules_per_policy)
                .map(|_| {
                    let a = SEGMENTS[rng.gen_range(0..SEGMENTS.len())];
                    let b = SEGMENTS[rng.gen_range(0..SEGMENTS.len())];
                    let pattern = match rng.gen_range(0..4) {
                        0 => format!("secret/{}/*", a),
                        1 => format!("secret/+/{}/*", b),
                        2 => format!("secret/{}/{}", a, b),
                        _ => format!("secret/{}-*", a),
                    };
                    let caps: &[&str] = if rng.gen_bool(0.1) { &["deny"] } else { &["read", "list"] };
                    RawRule::new(pattern, caps.iter().copied())
                })
                .collect();
            compile_policy(format!("policy-{}", i), &raw).unwrap()
        })
        .collect()
}

fn bench_evaluate(c: &mut Criterion) {
    let paths = gen_paths(10_000, 0xBEEF_CAFE);
    let mut group = c.benchmark_group("policy_evaluate");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(20);

    for &rules in &[4usize, 32, 128] {
        let policy = gen_policies(1, rules, 0xDEAD_BEEF).remove(0);
        group.throughput(Throughput::Elements(paths.len() as u64));
        group.bench_with_input(BenchmarkId::new("rules", rules), &policy, |b, policy| {
            b.iter(|| {
                let granted = paths.iter().filter(|p| policy.evaluate(p)).count();
                criterion::black_box(granted);
            });
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_compile");
    group.sample_size(20);
    let mut rng = StdRng::seed_from_u64(7);
    let raw: Vec<RawRule> = (0..256)
        .map(|i| RawRule::new(format!("secret/{}/+/k{}*", SEGMENTS[rng.gen_range(0..SEGMENTS.len())], i), ["read"]))
        .collect();
    group.bench_function("256_rules", |b| {
        b.iter(|| criterion::black_box(compile_policy("bench", &raw).unwrap()));
    });
    group.finish();
}

fn bench_annotate(c: &mut Criterion) {
    let paths = gen_paths(20_000, 0x1234_5678);
    let policies = gen_policies(50, 16, 0x8765_4321);
    let mut group = c.benchmark_group("annotate");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(10);
    group.throughput(Throughput::Elements(paths.len() as u64));

    for &workers in &[1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &w| {
            b.iter(|| criterion::black_box(annotate(&paths, &policies, w)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_compile, bench_annotate);
criterion_main!(benches);
