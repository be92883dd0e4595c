use criterion::{criterion_group, criterion_main, Criterion};
use rhoforge::config::SpectrumParams;
use rhoforge::likelihood::lookup::required_configs;
use rhoforge::likelihood::{bind, log_likelihood_curve, LikelihoodSurface, RateGrid};
use rhoforge::matrix::{AlleleMatrix, Ploidy, MISSING};
use rhoforge::spectrum;
use std::hint::black_box;

fn random_matrix(nseq: usize, nsites: usize, seed: u64) -> AlleleMatrix {
    let mut rng = fastrand::Rng::with_seed(seed);
    let rows: Vec<Vec<u8>> = (0..nseq)
        .map(|_| {
            (0..nsites)
                .map(|_| if rng.f32() < 0.02 { MISSING } else { rng.u8(0..2) })
                .collect()
        })
        .collect();
    AlleleMatrix::from_rows(&rows, Ploidy::Haploid).expect("Failed to build matrix")
}

fn criterion_benchmark(c: &mut Criterion) {
    let matrix = random_matrix(20, 400, 42);
    let params = SpectrumParams {
        window: 50,
        strict_pairs: false,
    };

    c.bench_function("spectrum build (20 x 400, window 50)", |b| {
        b.iter(|| spectrum::build(black_box(&matrix), black_box(&params)))
    });

    // Flat synthetic surface: lookup and marginalization cost only
    let mut spectrum = spectrum::build(&matrix, &params).expect("Failed to build spectrum");
    let grid = RateGrid::new(100.0, 101).expect("Failed to build grid");
    let mut surface = LikelihoodSurface::new(20, Ploidy::Haploid, grid);
    for config in required_configs(&spectrum.registry) {
        let base = -(config.total() as f64) * 0.01;
        let row = grid.values().iter().map(|r| base - r * 1e-3).collect();
        surface.insert(&config, row).expect("Failed to insert row");
    }

    c.bench_function("bind surface", |b| {
        b.iter(|| {
            let mut registry = spectrum.registry.clone();
            bind(black_box(&mut registry), black_box(&surface), false)
        })
    });

    let bound = bind(&mut spectrum.registry, &surface, false).expect("Failed to bind surface");
    c.bench_function("composite curve", |b| {
        b.iter(|| log_likelihood_curve(black_box(&spectrum.registry), black_box(&bound)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
