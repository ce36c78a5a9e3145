//! Criterion benchmarks for vector parsing and the full pipeline.

use std::fmt::Write as _;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use isomill_core::{plan_board, BoardInput, MillingParams};

/// Synthesize a copper layer with `traces` horizontal traces and one pad
/// per trace end.
fn synth_copper(traces: u32) -> String {
    let mut text = String::from("%FSLAX46Y46*%\n%MOMM*%\n%ADD10C,0.250000*%\n%ADD11C,1.000000*%\nG01*\n");
    for index in 0..traces {
        let y = i64::from(index) * 2_000_000;
        let _ = writeln!(text, "D10*");
        let _ = writeln!(text, "X0Y{y}D02*");
        let _ = writeln!(text, "X10000000Y{y}D01*");
        let _ = writeln!(text, "D11*");
        let _ = writeln!(text, "X10000000Y{y}D03*");
    }
    text.push_str("M02*\n");
    text
}

fn pipeline_bench(c: &mut Criterion) {
    let copper = synth_copper(40);
    let params = MillingParams::default();
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    group.bench_function("gerber_parse", |b| {
        b.iter(|| {
            black_box(isomill_core::gerber::parser::parse(black_box(
                copper.as_bytes(),
            )))
        });
    });

    group.bench_function("plan_board", |b| {
        b.iter(|| {
            let input = BoardInput {
                copper: black_box(copper.as_str()),
                outline: None,
                drill: None,
            };
            black_box(plan_board(&input, &params))
        });
    });

    group.finish();
}

criterion_group!(benches, pipeline_bench);
criterion_main!(benches);
