use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use venice::{lexer, token::Token, util::BreakableIteratorExt};

static INPUT: &str = include_str!("../../demos/shapes.vn");

fn lexer(input: &str) {
    let mut i = 0;
    let lexer = lexer::Lexer::new(input);
    for token in lexer.up_to(|token| token.as_ref().map_or(true, Token::is_eof)) {
        if token.is_err() {
            break;
        }
        i += 1;
    }
    black_box(i);
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lexer", |b| {
        b.iter(|| {
            black_box(lexer(black_box(INPUT)));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
