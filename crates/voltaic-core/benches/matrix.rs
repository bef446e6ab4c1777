//! Benchmarks for the dense kernel.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra::{DMatrix, DVector};
use voltaic_core::matrix::{mat_rank, mat_solve, mat_solve_rq};

fn test_system(n: usize) -> (DMatrix<f64>, DVector<f64>) {
    let a = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            n as f64 + 1.0
        } else {
            1.0 / ((i as f64 - j as f64).abs() + 1.0)
        }
    });
    let b = DVector::from_fn(n, |i, _| (i + 1) as f64);
    (a, b)
}

fn bench_solve(c: &mut Criterion) {
    let (a, b) = test_system(30);
    c.bench_function("mat_solve_30x30", |bench| {
        bench.iter(|| mat_solve(black_box(&a), black_box(&b)).unwrap());
    });
    c.bench_function("mat_solve_rq_30x30", |bench| {
        bench.iter(|| mat_solve_rq(black_box(&a), black_box(&b)).unwrap());
    });
}

fn bench_rank(c: &mut Criterion) {
    let (a, _) = test_system(30);
    c.bench_function("mat_rank_30x30", |bench| {
        bench.iter(|| mat_rank(black_box(&a)));
    });
}

criterion_group!(benches, bench_solve, bench_rank);
criterion_main!(benches);
