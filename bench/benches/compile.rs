use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use venice::{codegen::Backend, compile, CompileOptions};

static INPUTS: &[(&str, &str)] = &[
    ("shapes", include_str!("../../demos/shapes.vn")),
    ("words", include_str!("../../demos/words.vn")),
    ("scopes", include_str!("../../demos/scopes.vn")),
];

fn criterion_benchmark(c: &mut Criterion) {
    for &(name, input) in INPUTS {
        for &backend in Backend::ALL {
            let options = CompileOptions { backend };
            c.bench_function(&format!("compile {name} to {backend}"), |b| {
                b.iter(|| {
                    let code = compile(black_box(input), &options).unwrap();
                    black_box(code);
                })
            });
        }
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
