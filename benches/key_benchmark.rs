use cached_result::backend::InMemoryBackend;
use cached_result::key::KeySource;
use cached_result::{ArgList, CacheKeyBuilder, CacheService, KeyDigest, KeyTemplate, Result};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use serde::Serialize;
use std::hint::black_box;

#[derive(Serialize)]
struct User {
    id: u64,
    name: String,
    tags: Vec<String>,
}

fn sample_args() -> ArgList {
    let user = User {
        id: 42,
        name: "Wade".to_string(),
        tags: vec!["admin".to_string(), "beta".to_string()],
    };
    ArgList::with_receiver(&user, &(7u32, "summary")).expect("sample args")
}

fn bench_template_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("template");
    group.throughput(Throughput::Elements(1));

    group.bench_function("parse", |b| {
        b.iter(|| KeyTemplate::parse(black_box("user-{0.id}-{0.tags[1]}:{1}:{2}")))
    });

    let template = KeyTemplate::parse("user-{0.id}-{0.tags[1]}:{1}:{2}").expect("template");
    let args = sample_args();
    group.bench_function("render", |b| b.iter(|| template.render(black_box(&args))));

    group.finish();
}

fn bench_key_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_builder");
    let args = sample_args();

    let plain = CacheKeyBuilder::from_template("user-{0.name}-{1}").expect("builder");
    group.bench_function("plain", |b| b.iter(|| plain.build(black_box(&args))));

    let template = KeyTemplate::parse("user-{0.name}-{1}").expect("template");
    let hashed = CacheKeyBuilder::new(KeySource::Template(template), KeyDigest::Sha256);
    group.bench_function("sha256", |b| b.iter(|| hashed.build(black_box(&args))));

    group.finish();
}

async fn square(value: u64) -> Result<u64> {
    Ok(value * value)
}

fn bench_cached_call(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let service = CacheService::new(InMemoryBackend::new());
    let cached = service
        .builder()
        .key("square_{0}")
        .function(|(value,): (u64,)| square(value))
        .expect("cached function");

    rt.block_on(async {
        cached.call((9,)).await.expect("warm up");
    });

    c.bench_function("cached_call_hit", |b| {
        b.iter(|| rt.block_on(cached.call(black_box((9u64,)))))
    });
}

criterion_group!(
    benches,
    bench_template_parse,
    bench_key_builder,
    bench_cached_call
);
criterion_main!(benches);
