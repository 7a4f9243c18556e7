//! Benchmarks for the defpipe parsing stages.

use std::fs;
use std::path::{Path, PathBuf};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use defpipe::parser::{build_tree, preprocess, tokenize, FsReader, MemoryReader};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_fixture(name: &str) -> String {
    fs::read_to_string(fixtures_dir().join(name)).unwrap()
}

/// A flat file with `n` definitions, each with a small block.
fn generated_source(n: usize) -> String {
    let mut source = String::from("% version 1\n");
    for i in 0..n {
        source.push_str(&format!(
            "[Texture tex{i} {size}]{{\n    [Filter linear]\n    [Wrap repeat]\n}}\n",
            size = 64 << (i % 4)
        ));
    }
    source
}

fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess");

    let scene_path = fixtures_dir().join("scene.def");
    let scene = load_fixture("scene.def");
    let large = generated_source(1_000);
    let memory = MemoryReader::new();

    group.bench_function("fixture_with_include", |b| {
        b.iter(|| preprocess(black_box(&scene_path), black_box(&scene), &FsReader))
    });

    group.bench_function("generated_1000", |b| {
        b.iter(|| preprocess(Path::new("gen.def"), black_box(&large), &memory))
    });

    group.finish();
}

fn bench_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree");

    let scene = preprocess(&fixtures_dir().join("scene.def"), &load_fixture("scene.def"), &FsReader);
    let small = generated_source(10);
    let large = generated_source(1_000);

    group.bench_function("fixture", |b| {
        b.iter(|| build_tree(black_box(&scene.text), "scene.def"))
    });

    group.bench_function("generated_10", |b| {
        b.iter(|| build_tree(black_box(&small), "gen.def"))
    });

    group.bench_function("generated_1000", |b| {
        b.iter(|| build_tree(black_box(&large), "gen.def"))
    });

    group.bench_function("tokenize_words", |b| {
        b.iter(|| tokenize(black_box(r#"Object crate "models/crate.obj" 0 2 10 scale2"#)))
    });

    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_tree);
criterion_main!(benches);
