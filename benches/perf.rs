use ccss_oxide::{compile, CompileOptions};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::{Path, PathBuf};

struct Case {
    name: &'static str,
    source: &'static str,
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn compile_benchmarks(c: &mut Criterion) {
    let cases = [
        Case {
            name: "baseline",
            source: include_str!("../fixtures/benchmark.ccss"),
        },
        Case {
            name: "import",
            source: include_str!("../fixtures/import.ccss"),
        },
        Case {
            name: "macros",
            source: include_str!("../fixtures/macros.ccss"),
        },
        Case {
            name: "sprites",
            source: include_str!("../fixtures/sprites.ccss"),
        },
    ];

    for case in &cases {
        bench_case(c, case);
    }
}

fn bench_case(c: &mut Criterion, case: &Case) {
    let mut group = c.benchmark_group(format!("ccss_compile/{}", case.name));
    group.throughput(Throughput::Bytes(case.source.len() as u64));

    for minify in [false, true] {
        let id = BenchmarkId::new(case.name, if minify { "min" } else { "pretty" });
        group.bench_with_input(id, &minify, |b, &minify| {
            b.iter(|| {
                compile(
                    case.source,
                    CompileOptions {
                        minify,
                        current_dir: Some(fixtures_dir()),
                        ..CompileOptions::default()
                    },
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, compile_benchmarks);
criterion_main!(benches);
