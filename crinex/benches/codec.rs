//! Benchmarking of the low level CRINEX kernels
use crinex::numdiff::{split_value, write_delta, FieldDiff};
use crinex::textdiff;

extern crate criterion;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rand::{rngs::StdRng, Rng, SeedableRng};

fn numdiff_compression(pool: &[(i64, i64)]) {
    let mut prev = FieldDiff::blank();
    let mut out = String::with_capacity(16);
    for (index, (u, l)) in pool.iter().enumerate() {
        let mut current = FieldDiff::blank();
        current.load(*u, *l);
        if index == 0 {
            current.restart();
        } else {
            current.take_diff(&prev);
        }
        let (du, dl) = current.top();
        out.clear();
        write_delta(du, dl, 100_000, 5, &mut out);
        black_box(&out);
        prev = current;
    }
}

fn numdiff_decompression(deltas: &[String]) {
    let mut prev = FieldDiff::blank();
    for (index, delta) in deltas.iter().enumerate() {
        let (u, l) = split_value(delta, 5).unwrap();
        let mut current = FieldDiff::blank();
        if index == 0 {
            current.init_arc(3, u, l);
        } else {
            current.continue_arc(&prev, u, l);
        }
        current.accumulate(&prev);
        black_box(current.top());
        prev = current;
    }
}

fn textdiff_compression(epochs: &[String]) {
    let mut base = String::from("&");
    let mut out = String::with_capacity(128);
    for epoch in epochs {
        out.clear();
        textdiff::diff(&base, epoch, &mut out);
        black_box(&out);
        base = epoch.clone();
    }
}

fn textdiff_decompression(deltas: &[String]) {
    let mut line = String::new();
    for delta in deltas {
        textdiff::merge(&mut line, delta);
        black_box(&line);
    }
}

fn benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    // a carrier-phase-like walk, in thousandths units
    let mut value: i64 = 126_298_057_858;
    let pool: Vec<(i64, i64)> = (0..1024)
        .map(|_| {
            value += rng.gen_range(-20_000_000_i64..20_000_000_i64);
            (value / 100_000, value % 100_000)
        })
        .collect();

    let deltas: Vec<String> = {
        let mut prev = FieldDiff::blank();
        pool.iter()
            .enumerate()
            .map(|(index, (u, l))| {
                let mut current = FieldDiff::blank();
                current.load(*u, *l);
                if index == 0 {
                    current.restart();
                } else {
                    current.take_diff(&prev);
                }
                let (du, dl) = current.top();
                let mut out = String::new();
                write_delta(du, dl, 100_000, 5, &mut out);
                prev = current;
                out
            })
            .collect()
    };

    let epochs: Vec<String> = (0..256)
        .map(|i| {
            format!(
                " 21  1  1  0 {:2} {:2}.0000000  0  2G{:02}G{:02}",
                i / 2 % 60,
                (i % 2) * 30,
                1 + i % 30,
                1 + (i + 7) % 30,
            )
        })
        .collect();
    let epoch_deltas: Vec<String> = {
        let mut base = String::from("&");
        epochs
            .iter()
            .map(|epoch| {
                let mut out = String::new();
                textdiff::diff(&base, epoch, &mut out);
                base = epoch.clone();
                out.trim_end_matches('\n').to_string()
            })
            .collect()
    };

    let mut grp = c.benchmark_group("numdiff");
    grp.bench_function("compression", |b| b.iter(|| numdiff_compression(&pool)));
    grp.bench_function("decompression", |b| b.iter(|| numdiff_decompression(&deltas)));
    grp.finish();

    let mut grp = c.benchmark_group("textdiff");
    grp.bench_function("compression", |b| b.iter(|| textdiff_compression(&epochs)));
    grp.bench_function("decompression", |b| {
        b.iter(|| textdiff_decompression(&epoch_deltas))
    });
    grp.finish();
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
