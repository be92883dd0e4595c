use super::lookup::{row_max, BoundSurface};
use super::RateGrid;
use crate::error::{RhoError, RhoResult};
use crate::locs::Locs;
use crate::spectrum::{PairRecord, PairSpectrum, SiteTypeRegistry, TypeId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Best grid point of a composite curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub index: usize,
    pub rate: f64,
    pub loglik: f64,
}

fn check_bound(registry: &SiteTypeRegistry, bound: &BoundSurface) -> RhoResult<()> {
    if bound.len() != registry.len() {
        return Err(RhoError::Validation(format!(
            "Surface is bound to {} types, registry holds {}",
            bound.len(),
            registry.len()
        )));
    }
    Ok(())
}

fn check_locs(spectrum: &PairSpectrum, locs: &Locs) -> RhoResult<()> {
    if let Some(p) = spectrum.pairs.iter().find(|p| p.right >= locs.len()) {
        return Err(RhoError::Validation(format!(
            "Pair ({}, {}) lies beyond the {} known SNP positions",
            p.left,
            p.right,
            locs.len()
        )));
    }
    Ok(())
}

/// Composite log-likelihood `sum_t count[t] * surface[t][r]` at every grid
/// point. Types are summed in registry order; unusable and unobserved types
/// add nothing.
pub fn log_likelihood_curve(
    registry: &SiteTypeRegistry,
    bound: &BoundSurface,
) -> RhoResult<Vec<f64>> {
    check_bound(registry, bound)?;
    let counts: Vec<u64> = registry.iter().map(|t| t.count).collect();
    Ok(curve_from_counts(&counts, bound))
}

/// As [`log_likelihood_curve`] with caller-supplied counts per type id.
pub fn curve_from_counts(counts: &[u64], bound: &BoundSurface) -> Vec<f64> {
    let weighted: Vec<(f64, &[f64])> = counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0)
        .filter_map(|(id, &c)| bound.row(id).map(|row| (c as f64, row)))
        .collect();

    (0..bound.grid().points)
        .into_par_iter()
        .map(|r| weighted.iter().map(|(c, row)| c * row[r]).sum::<f64>())
        .collect()
}

pub fn maximize(curve: &[f64], grid: &RateGrid) -> RhoResult<Estimate> {
    let (index, loglik) = row_max(curve).ok_or_else(|| {
        RhoError::Validation("Composite likelihood is not finite at any rate".to_string())
    })?;
    Ok(Estimate {
        index,
        rate: grid.value(index),
        loglik,
    })
}

/// Composite curve where each recorded pair sees the grid rate scaled by
/// its share of the region, read off its type row by interpolation.
pub fn distance_curve(
    spectrum: &PairSpectrum,
    bound: &BoundSurface,
    locs: &Locs,
    tract: f64,
) -> RhoResult<Vec<f64>> {
    check_bound(&spectrum.registry, bound)?;
    check_locs(spectrum, locs)?;
    let region = locs.region_separation(tract);
    if region <= 0.0 {
        return Err(RhoError::Validation(
            "Region length must be positive".to_string(),
        ));
    }
    let scaled: Vec<(f64, &[f64])> = spectrum
        .pairs
        .iter()
        .filter_map(|p| {
            bound
                .row(p.type_id)
                .map(|row| (locs.separation(p.left, p.right, tract) / region, row))
        })
        .collect();

    let grid = bound.grid();
    Ok((0..grid.points)
        .into_par_iter()
        .map(|r| {
            let rate = grid.value(r);
            scaled
                .iter()
                .map(|(share, row)| grid.interpolate(row, rate * share))
                .sum::<f64>()
        })
        .collect())
}

/// Estimate from the pairs wholly inside one run of SNPs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEstimate {
    pub first_site: usize,
    pub last_site: usize,
    pub start: f64,
    pub end: f64,
    pub pairs: u64,
    pub estimate: Option<Estimate>,
}

/// Sliding windows of `width` SNPs advanced by `step` SNPs.
pub fn window_estimates(
    spectrum: &PairSpectrum,
    bound: &BoundSurface,
    locs: &Locs,
    width: usize,
    step: usize,
) -> RhoResult<Vec<WindowEstimate>> {
    check_bound(&spectrum.registry, bound)?;
    check_locs(spectrum, locs)?;
    if width < 2 || step == 0 {
        return Err(RhoError::Config(format!(
            "Window of {} SNPs with step {} is not usable",
            width, step
        )));
    }
    let nsites = locs.len();
    let starts: Vec<usize> = (0..nsites.saturating_sub(width - 1)).step_by(step).collect();

    starts
        .into_par_iter()
        .map(|first| {
            let last = first + width - 1;
            let inside = |p: &&PairRecord| p.left >= first && p.right <= last;
            let mut counts = vec![0u64; spectrum.registry.len()];
            let mut pairs = 0;
            for p in spectrum.pairs.iter().filter(inside) {
                counts[p.type_id] += 1;
                pairs += 1;
            }
            let estimate = if pairs > 0 {
                maximize(&curve_from_counts(&counts, bound), bound.grid()).ok()
            } else {
                None
            };
            Ok(WindowEstimate {
                first_site: first,
                last_site: last,
                start: locs.positions[first],
                end: locs.positions[last],
                pairs,
                estimate,
            })
        })
        .collect()
}

/// Per-type contribution to the curve at one grid point.
pub fn type_contributions(
    registry: &SiteTypeRegistry,
    bound: &BoundSurface,
    index: usize,
) -> Vec<(TypeId, f64)> {
    registry
        .iter()
        .enumerate()
        .filter_map(|(id, t)| {
            bound
                .row(id)
                .filter(|_| t.count > 0)
                .map(|row| (id, t.count as f64 * row[index]))
        })
        .collect()
}
