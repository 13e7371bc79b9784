//! Criterion benchmark for the sweep loop: snapshot/restore overhead
//! dominates per trial, so the interesting axis is the candidate count.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lr_sweep::nn::{FullyConnected, MSELoss, Module};
use lr_sweep::optim::SGD;
use lr_sweep::sweep::loss_per_learning_rate;
use lr_sweep::tensor::randn;

fn bench_sweep(c: &mut Criterion) {
    let mut model = FullyConnected::new(8, &[64, 32, 16, 8], 4, 0.01);
    let x = randn(&[16, 8], false);
    let y = randn(&[16, 4], false);
    let criterion = MSELoss::new();
    let mut optimizer = SGD::simple(model.parameters().into_values(), 0.0).unwrap();

    let rates: Vec<f32> = (0..100).map(|i| 0.05 * i as f32).collect();

    c.bench_function("loss_per_learning_rate/100_candidates", |b| {
        b.iter(|| {
            let losses = loss_per_learning_rate(
                &mut model,
                &x,
                &y,
                &criterion,
                &mut optimizer,
                black_box(&rates),
                true,
            )
            .unwrap();
            black_box(losses)
        })
    });
}

criterion_group!(benches, bench_sweep);
criterion_main!(benches);
