use crate::error::{RhoError, RhoResult};
use crate::locs::Locs;
use crate::spectrum::PairSpectrum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use tracing::debug;

/// Hudson-Kaplan lower bound on recombination events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rmin {
    pub events: usize,
    pub incompatible_pairs: usize,
    /// Disjoint site intervals each requiring one event.
    pub intervals: Vec<(usize, usize)>,
}

/// Counts the largest set of non-overlapping intervals spanned by pairs
/// that fail the four-gamete test.
pub fn min_recombination_events(spectrum: &PairSpectrum) -> Rmin {
    let mut incompatible: Vec<(usize, usize)> = spectrum
        .pairs
        .iter()
        .filter(|p| {
            spectrum
                .registry
                .get(p.type_id)
                .is_some_and(|t| t.min_recombinations > 0)
        })
        .map(|p| (p.left, p.right))
        .collect();
    let incompatible_pairs = incompatible.len();

    incompatible.sort_by_key(|&(l, r)| (r, l));
    let mut intervals = Vec::new();
    let mut last_end = 0;
    for (l, r) in incompatible {
        if l >= last_end {
            intervals.push((l, r));
            last_end = r;
        }
    }

    Rmin {
        events: intervals.len(),
        incompatible_pairs,
        intervals,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum LdStatistic {
    #[strum(serialize = "r2")]
    R2,
    #[strum(serialize = "|D'|")]
    DPrime,
}

impl LdStatistic {
    fn pick(self, ld: &[f64; 3]) -> f64 {
        match self {
            LdStatistic::R2 => ld[0],
            LdStatistic::DPrime => ld[2].abs(),
        }
    }
}

/// Correlation of an LD statistic with distance and its permutation
/// p-value (share of shuffles at or below the observed correlation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LdDistanceTest {
    pub statistic: LdStatistic,
    pub pairs: usize,
    pub correlation: f64,
    pub p_value: Option<f64>,
    pub shuffles: usize,
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if xs.len() < 2 {
        return f64::NAN;
    }
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    sxy / (sxx * syy).sqrt()
}

/// Tests whether LD decays with distance by permuting SNP positions.
pub fn ld_distance_test(
    spectrum: &PairSpectrum,
    locs: &Locs,
    statistic: LdStatistic,
    shuffles: usize,
    seed: Option<u64>,
) -> RhoResult<LdDistanceTest> {
    if let Some(p) = spectrum.pairs.iter().find(|p| p.right >= locs.len()) {
        return Err(RhoError::Validation(format!(
            "Pair ({}, {}) lies beyond the {} known SNP positions",
            p.left,
            p.right,
            locs.len()
        )));
    }

    let mut sites = Vec::new();
    let mut values = Vec::new();
    for p in &spectrum.pairs {
        let Some(t) = spectrum.registry.get(p.type_id) else {
            continue;
        };
        let v = statistic.pick(&t.ld_stats);
        if v.is_finite() {
            sites.push((p.left, p.right));
            values.push(v);
        }
    }

    let distances: Vec<f64> = sites.iter().map(|&(l, r)| locs.distance(l, r)).collect();
    let correlation = pearson(&distances, &values);
    if !correlation.is_finite() || shuffles == 0 {
        return Ok(LdDistanceTest {
            statistic,
            pairs: values.len(),
            correlation,
            p_value: None,
            shuffles: 0,
        });
    }

    let base_seed = seed.unwrap_or_else(|| fastrand::u64(..));
    let at_or_below: usize = (0..shuffles)
        .into_par_iter()
        .map(|i| {
            let mut rng = fastrand::Rng::with_seed(base_seed.wrapping_add(i as u64));
            let mut positions = locs.positions.clone();
            rng.shuffle(&mut positions);
            let shuffled: Vec<f64> = sites
                .iter()
                .map(|&(l, r)| (positions[r] - positions[l]).abs())
                .collect();
            usize::from(pearson(&shuffled, &values) <= correlation)
        })
        .sum();
    debug!(
        "{} of {} shuffles at or below r = {:.4} for {}",
        at_or_below, shuffles, correlation, statistic
    );

    Ok(LdDistanceTest {
        statistic,
        pairs: values.len(),
        correlation,
        p_value: Some(at_or_below as f64 / shuffles as f64),
        shuffles,
    })
}
