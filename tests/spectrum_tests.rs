use rhoforge::config::SpectrumParams;
use rhoforge::matrix::{AlleleMatrix, Ploidy, MISSING};
use rhoforge::spectrum::{self, PairConfig, PairSpectrum};

fn random_rows(nseq: usize, nsites: usize, codes: u8, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..nseq)
        .map(|_| {
            (0..nsites)
                .map(|_| if rng.f32() < 0.03 { MISSING } else { rng.u8(0..codes) })
                .collect()
        })
        .collect()
}

fn params(window: usize) -> SpectrumParams {
    SpectrumParams {
        window,
        strict_pairs: true,
    }
}

fn type_list(spectrum: &PairSpectrum) -> Vec<(PairConfig, u64, bool)> {
    spectrum
        .registry
        .iter()
        .map(|t| (t.config, t.count, t.missing))
        .collect()
}

#[test]
fn test_diploid_spectrum_ignores_allele_labels() {
    let rows = random_rows(12, 300, 3, 21);
    let swapped: Vec<Vec<u8>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(site, &g)| match (site % 3, g) {
                    (0, 0) => 1,
                    (0, 1) => 0,
                    _ => g,
                })
                .collect()
        })
        .collect();

    let a = AlleleMatrix::from_rows(&rows, Ploidy::Diploid).unwrap();
    let b = AlleleMatrix::from_rows(&swapped, Ploidy::Diploid).unwrap();
    let sa = spectrum::build(&a, &params(10)).unwrap();
    let sb = spectrum::build(&b, &params(10)).unwrap();

    assert!(sa.registry.len() > 1);
    assert_eq!(type_list(&sa), type_list(&sb));
    assert_eq!(sa.pairs, sb.pairs);
    assert_eq!(sa.stats, sb.stats);
}

#[test]
fn test_build_does_not_depend_on_thread_count() {
    let rows = random_rows(20, 200, 2, 8);
    let matrix = AlleleMatrix::from_rows(&rows, Ploidy::Haploid).unwrap();

    let build_with = |threads: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| spectrum::build(&matrix, &params(25)).unwrap())
    };
    let single = build_with(1);
    let many = build_with(8);

    assert_eq!(type_list(&single), type_list(&many));
    assert_eq!(single.pairs, many.pairs);
    assert_eq!(single.stats, many.stats);
    assert_eq!(single.registry.total_pairs(), single.stats.classified);
}
