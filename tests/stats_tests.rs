use rhoforge::config::SpectrumParams;
use rhoforge::locs::{Locs, Model};
use rhoforge::matrix::{AlleleMatrix, Ploidy};
use rhoforge::spectrum::{self, PairSpectrum};
use rhoforge::stats::{ld_distance_test, min_recombination_events, LdStatistic};

fn spectrum_of(rows: &[Vec<u8>], window: usize) -> PairSpectrum {
    let matrix = AlleleMatrix::from_rows(rows, Ploidy::Haploid).unwrap();
    spectrum::build(
        &matrix,
        &SpectrumParams {
            window,
            strict_pairs: true,
        },
    )
    .unwrap()
}

#[test]
fn test_rmin_counts_disjoint_incompatible_intervals() {
    // Every pair except (1,2) fails the four-gamete test
    let rows = vec![
        vec![0, 0, 0, 0],
        vec![0, 1, 1, 1],
        vec![1, 0, 0, 1],
        vec![1, 1, 1, 0],
        vec![0, 0, 1, 1],
    ];
    let spectrum = spectrum_of(&rows, 3);
    let rmin = min_recombination_events(&spectrum);
    assert_eq!(rmin.events, 2);
    assert_eq!(rmin.intervals, vec![(0, 1), (1, 3)]);
    assert_eq!(rmin.incompatible_pairs, 5);
}

#[test]
fn test_rmin_is_zero_for_compatible_data() {
    let rows = vec![
        vec![0, 0, 0],
        vec![0, 0, 1],
        vec![1, 0, 1],
        vec![1, 1, 1],
    ];
    let rmin = min_recombination_events(&spectrum_of(&rows, 2));
    assert_eq!(rmin.events, 0);
    assert_eq!(rmin.incompatible_pairs, 0);
}

fn decaying_rows() -> Vec<Vec<u8>> {
    // Nested carrier sets: r2 falls as the sites move apart
    (0..9)
        .map(|seq| (0..8).map(|site| u8::from(seq <= site)).collect())
        .collect()
}

#[test]
fn test_ld_distance_test_is_seeded_and_bounded() {
    let spectrum = spectrum_of(&decaying_rows(), 7);
    let locs = Locs::new((1..=8).map(|p| p as f64 * 10.0).collect(), 100.0, Model::CrossingOver)
        .unwrap();

    let a = ld_distance_test(&spectrum, &locs, LdStatistic::R2, 200, Some(4)).unwrap();
    let b = ld_distance_test(&spectrum, &locs, LdStatistic::R2, 200, Some(4)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.pairs, 28);
    assert!(a.correlation < 0.0);
    let p = a.p_value.unwrap();
    assert!((0.0..=1.0).contains(&p));
    assert_eq!(a.shuffles, 200);
}

#[test]
fn test_ld_distance_test_without_shuffles() {
    let spectrum = spectrum_of(&decaying_rows(), 3);
    let locs = Locs::contiguous(8);
    let t = ld_distance_test(&spectrum, &locs, LdStatistic::DPrime, 0, None).unwrap();
    assert_eq!(t.p_value, None);
    assert_eq!(t.shuffles, 0);
    assert_eq!(t.statistic.to_string(), "|D'|");
}

#[test]
fn test_ld_distance_test_checks_positions() {
    let spectrum = spectrum_of(&decaying_rows(), 3);
    let short = Locs::contiguous(4);
    assert!(ld_distance_test(&spectrum, &short, LdStatistic::R2, 10, Some(1)).is_err());
}
