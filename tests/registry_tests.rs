use proptest::prelude::*;
use rhoforge::error::RhoError;
use rhoforge::matrix::{AlleleMatrix, Ploidy};
use rhoforge::spectrum::config::{HET, MISS};
use rhoforge::spectrum::{PairConfig, SiteTypeRegistry};
use rstest::rstest;

fn haploid(cells: &[((usize, usize), u32)]) -> PairConfig {
    let mut config = PairConfig::zero();
    for &((a, b), n) in cells {
        config.0[a * 4 + b] = n;
    }
    config
}

fn swap_alleles_at_a(config: &PairConfig) -> PairConfig {
    let mut out = PairConfig::zero();
    let perm = [1, 0, 2, 3];
    for a in 0..4 {
        for b in 0..4 {
            out.0[perm[a] * 4 + b] = config.cell(a, b);
        }
    }
    out
}

fn transpose(config: &PairConfig) -> PairConfig {
    let mut out = PairConfig::zero();
    for a in 0..4 {
        for b in 0..4 {
            out.0[b * 4 + a] = config.cell(a, b);
        }
    }
    out
}

#[rstest]
#[case(&[((0, 0), 1), ((0, 1), 1), ((1, 0), 1), ((1, 1), 1)], 1)] // all four gametes
#[case(&[((0, 0), 2), ((1, 1), 2)], 0)] // AB and ab only
#[case(&[((0, 0), 1), ((0, 1), 1), ((1, 0), 2)], 0)] // ab missing
#[case(&[((0, 0), 1), ((0, 1), 1), ((1, 0), 1), ((1, MISS), 1)], 0)] // fourth only with a missing call
fn test_four_gamete_haploid(#[case] cells: &[((usize, usize), u32)], #[case] expected: u8) {
    let mut registry = SiteTypeRegistry::new(4, Ploidy::Haploid);
    let id = registry.classify(&haploid(cells)).unwrap();
    assert_eq!(registry.get(id).unwrap().min_recombinations, expected);
}

#[test]
fn test_four_gamete_diploid_from_heterozygotes() {
    // Hom/het rows imply both haplotypes with the homozygous allele
    let mut config = PairConfig::zero();
    config.0[HET] = 1;
    config.0[4 + HET] = 1;
    let mut registry = SiteTypeRegistry::new(2, Ploidy::Diploid);
    let id = registry.classify(&config).unwrap();
    assert_eq!(registry.get(id).unwrap().min_recombinations, 1);

    // Double heterozygotes are phase-ambiguous and imply nothing
    let mut ambiguous = PairConfig::zero();
    ambiguous.0[HET * 4 + HET] = 2;
    let id = registry.classify(&ambiguous).unwrap();
    assert_eq!(registry.get(id).unwrap().min_recombinations, 0);
}

#[test]
fn test_two_sequence_scan_never_needs_recombination() {
    // Two haploid sequences show at most two haplotypes per pair
    let matrix = AlleleMatrix::from_rows(
        &[vec![0, 0, 1, 1], vec![1, 1, 0, 1]],
        Ploidy::Haploid,
    )
    .unwrap();
    let params = rhoforge::config::SpectrumParams {
        window: 4,
        strict_pairs: true,
    };
    let spectrum = rhoforge::spectrum::build(&matrix, &params).unwrap();
    assert!(spectrum.registry.iter().all(|t| t.min_recombinations == 0));
}

#[test]
fn test_scenario_four_gametes_within_window() {
    // Sites 0/1 carry all four haplotypes; sites 0/2 only AB and ab
    let matrix = AlleleMatrix::from_rows(
        &[
            vec![0, 0, 0, 1],
            vec![0, 1, 0, 0],
            vec![1, 0, 1, 1],
            vec![1, 1, 1, 0],
        ],
        Ploidy::Haploid,
    )
    .unwrap();
    let params = rhoforge::config::SpectrumParams {
        window: 4,
        strict_pairs: true,
    };
    let spectrum = rhoforge::spectrum::build(&matrix, &params).unwrap();

    let rm_of = |l: usize, r: usize| {
        let record = spectrum
            .pairs
            .iter()
            .find(|p| p.left == l && p.right == r)
            .unwrap();
        spectrum.registry.get(record.type_id).unwrap().min_recombinations
    };
    assert_eq!(rm_of(0, 1), 1);
    assert_eq!(rm_of(0, 2), 0);
}

#[test]
fn test_symmetric_images_share_one_type() {
    let config = haploid(&[((0, 0), 3), ((0, 1), 1), ((1, 1), 2)]);
    let mut registry = SiteTypeRegistry::new(6, Ploidy::Haploid);

    let id = registry.classify(&config).unwrap();
    assert_eq!(registry.classify(&swap_alleles_at_a(&config)).unwrap(), id);
    assert_eq!(registry.classify(&transpose(&config)).unwrap(), id);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get(id).unwrap().count, 3);
}

#[test]
fn test_classify_is_idempotent() {
    let config = haploid(&[((0, 0), 2), ((1, 0), 1), ((1, MISS), 1)]);
    let mut registry = SiteTypeRegistry::new(4, Ploidy::Haploid);
    let first = registry.classify(&config).unwrap();
    let snapshot = registry.get(first).unwrap().clone();

    let second = registry.classify(&config).unwrap();
    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);

    let after = registry.get(first).unwrap();
    assert_eq!(after.count, snapshot.count + 1);
    assert_eq!(after.config, snapshot.config);
    assert!(after.missing);
}

#[test]
fn test_malformed_config_leaves_registry_unchanged() {
    let mut registry = SiteTypeRegistry::new(4, Ploidy::Haploid);
    let good = haploid(&[((0, 0), 2), ((1, 1), 2)]);
    let id = registry.classify(&good).unwrap();

    let bad = haploid(&[((0, 0), 2), ((1, 1), 3)]);
    let err = registry.classify(&bad).unwrap_err();
    assert!(matches!(err, RhoError::InvalidConfiguration(_)));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get(id).unwrap().count, 1);
    assert_eq!(registry.lookup(&bad), None);
}

#[test]
fn test_haploid_rejects_heterozygote_cells() {
    let mut registry = SiteTypeRegistry::new(2, Ploidy::Haploid);
    let mut config = PairConfig::zero();
    config.0[HET * 4] = 2;
    assert!(matches!(
        registry.classify(&config),
        Err(RhoError::InvalidConfiguration(_))
    ));
    assert!(registry.is_empty());
}

#[test]
fn test_seeded_types_count_as_zero() {
    let mut registry = SiteTypeRegistry::new(2, Ploidy::Haploid);
    registry.seed(&haploid(&[((0, 1), 1), ((1, 0), 1)])).unwrap();
    registry.classify(&haploid(&[((0, 0), 1), ((1, 1), 1)])).unwrap();
    assert_eq!(registry.zero_count(), 1);
    assert_eq!(registry.total_pairs(), 1);
}

#[test]
fn test_merge_keeps_insertion_order() {
    let mut left = SiteTypeRegistry::new(4, Ploidy::Haploid);
    let a = haploid(&[((0, 0), 2), ((1, 1), 2)]);
    let b = haploid(&[((0, 0), 3), ((1, 1), 1)]);
    let c = haploid(&[((0, 0), 1), ((0, 1), 1), ((1, 0), 1), ((1, 1), 1)]);
    left.classify(&a).unwrap();
    left.classify(&b).unwrap();

    let mut right = SiteTypeRegistry::new(4, Ploidy::Haploid);
    right.classify(&c).unwrap();
    right.classify(&a).unwrap();

    let remap = left.merge(&right);
    assert_eq!(remap, vec![2, 0]);
    assert_eq!(left.get(0).unwrap().count, 2);
    assert_eq!(left.get(2).unwrap().config, c.canonical());
}

#[test]
fn test_ld_stats_perfect_association() {
    let config = haploid(&[((0, 0), 2), ((1, 1), 2)]);
    let [r2, d, dprime] = config.ld_stats(Ploidy::Haploid);
    assert!((r2 - 1.0).abs() < 1e-12);
    assert!((d - 0.25).abs() < 1e-12);
    assert!((dprime - 1.0).abs() < 1e-12);
}

#[test]
fn test_genotype_ld_perfect_association() {
    // hom/hom, alt/alt and het/het: dosages move together
    let config = haploid(&[((0, 0), 1), ((1, 1), 1), ((2, 2), 2)]);
    let [r2, d, dprime] = config.ld_stats(Ploidy::Diploid);
    assert!((r2 - 1.0).abs() < 1e-12);
    assert!((d - 0.25).abs() < 1e-12);
    assert!((dprime - 1.0).abs() < 1e-12);

    // Relabeling one site flips the sign of D only
    let [r2s, ds, dprimes] = swap_alleles_at_a(&config).ld_stats(Ploidy::Diploid);
    assert!((r2s - r2).abs() < 1e-12);
    assert!((ds + d).abs() < 1e-12);
    assert!((dprimes + dprime).abs() < 1e-12);
}

fn arb_haploid_config(nseq: u32) -> impl Strategy<Value = PairConfig> {
    // Split nseq over the nine cells without heterozygotes
    prop::collection::vec(0u32..=nseq, 8).prop_map(move |mut cuts| {
        cuts.sort_unstable();
        let cells = [0, 1, 3, 4, 5, 7, 12, 13, 15];
        let mut config = PairConfig::zero();
        let mut prev = 0;
        for (i, &cell) in cells.iter().enumerate() {
            let next = if i < 8 { cuts[i] } else { nseq };
            config.0[cell] = next - prev;
            prev = next;
        }
        config
    })
}

fn arb_diploid_config(nseq: u32) -> impl Strategy<Value = PairConfig> {
    // Genotype states 0, 1 and het at both sites, plus missing rows
    prop::collection::vec(0u32..=nseq, 15).prop_map(move |mut cuts| {
        cuts.sort_unstable();
        let mut config = PairConfig::zero();
        let mut prev = 0;
        for cell in 0..16 {
            let next = if cell < 15 { cuts[cell] } else { nseq };
            config.0[cell] = next - prev;
            prev = next;
        }
        config
    })
}

proptest! {
    #[test]
    fn prop_orbit_members_classify_identically(config in arb_haploid_config(10)) {
        let mut registry = SiteTypeRegistry::new(10, Ploidy::Haploid);
        let id = registry.classify(&config).unwrap();
        for image in config.orbit() {
            prop_assert_eq!(registry.classify(&PairConfig(image)).unwrap(), id);
        }
        prop_assert_eq!(registry.len(), 1);
        prop_assert_eq!(registry.get(id).unwrap().count, 9);
    }

    #[test]
    fn prop_canonical_form_is_stable(config in arb_haploid_config(12)) {
        let canonical = config.canonical();
        prop_assert!(canonical.is_canonical());
        prop_assert_eq!(canonical.total(), 12);
        prop_assert_eq!(
            canonical.min_recombinations(Ploidy::Haploid),
            config.min_recombinations(Ploidy::Haploid)
        );
    }

    #[test]
    fn prop_diploid_orbit_members_classify_identically(config in arb_diploid_config(8)) {
        let mut registry = SiteTypeRegistry::new(8, Ploidy::Diploid);
        let id = registry.classify(&config).unwrap();
        let rm = registry.get(id).unwrap().min_recombinations;
        for image in config.orbit() {
            let image = PairConfig(image);
            prop_assert_eq!(registry.classify(&image).unwrap(), id);
            prop_assert_eq!(image.min_recombinations(Ploidy::Diploid), rm);
        }
        prop_assert_eq!(registry.len(), 1);
        prop_assert_eq!(registry.get(id).unwrap().count, 9);
        prop_assert!(registry.get(id).unwrap().config.is_canonical());
    }
}
