use super::{LikelihoodSurface, RateGrid};
use crate::error::{RhoError, RhoResult};
use crate::matrix::Ploidy;
use crate::spectrum::config::{HET, MISS};
use crate::spectrum::{PairConfig, SiteType, SiteTypeRegistry, TypeId};
use fnv::FnvHashSet;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Upper bound on the completions summed for one type with missing calls.
pub const MAX_EXTENSIONS: u64 = 250_000;

const HAPLOID_CELLS: [usize; 4] = [0, 1, 4, 5];
const DIPLOID_CELLS: [usize; 9] = [0, 1, 2, 4, 5, 6, 8, 9, 10];

fn complete_cells(ploidy: Ploidy) -> &'static [usize] {
    match ploidy {
        Ploidy::Haploid => &HAPLOID_CELLS,
        Ploidy::Diploid => &DIPLOID_CELLS,
    }
}

/// Registry-aligned log-likelihood rows, one per type id.
#[derive(Debug, Clone)]
pub struct BoundSurface {
    grid: RateGrid,
    rows: Vec<Option<Vec<f64>>>,
    unsupported: Vec<TypeId>,
    degenerate: Vec<TypeId>,
}

impl BoundSurface {
    pub fn grid(&self) -> &RateGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: TypeId) -> Option<&[f64]> {
        self.rows.get(id).and_then(|r| r.as_deref())
    }

    /// Types left out of every sum because no usable row exists.
    pub fn unsupported(&self) -> &[TypeId] {
        &self.unsupported
    }

    /// Types without a single complete row; they score zero everywhere.
    pub fn degenerate(&self) -> &[TypeId] {
        &self.degenerate
    }
}

enum Lookup {
    Row(Vec<f64>),
    Degenerate(Vec<f64>),
}

/// Resolves a surface row for every registered type and caches each
/// type's best rate. Types with missing calls are scored by summing over
/// completions of their complete rows.
pub fn bind(
    registry: &mut SiteTypeRegistry,
    surface: &LikelihoodSurface,
    strict: bool,
) -> RhoResult<BoundSurface> {
    if registry.nseq() != surface.nseq() || registry.ploidy() != surface.ploidy() {
        return Err(RhoError::Validation(format!(
            "Surface is for {} sequences (ploidy {}), data has {} (ploidy {})",
            surface.nseq(),
            surface.ploidy(),
            registry.nseq(),
            registry.ploidy()
        )));
    }

    let lookups: Vec<RhoResult<Lookup>> = registry
        .types()
        .par_iter()
        .map(|t| type_row(t, surface))
        .collect();

    let grid = *surface.grid();
    let mut rows = Vec::with_capacity(lookups.len());
    let mut unsupported = Vec::new();
    let mut degenerate = Vec::new();

    for (id, lookup) in lookups.into_iter().enumerate() {
        let row = match lookup {
            Ok(Lookup::Row(row)) => row,
            Ok(Lookup::Degenerate(row)) => {
                degenerate.push(id);
                row
            }
            Err(e) if strict => return Err(e),
            Err(e) => {
                debug!("{}", e);
                unsupported.push(id);
                rows.push(None);
                continue;
            }
        };
        if let (Some(entry), Some((index, value))) = (registry.get_mut(id), row_max(&row)) {
            entry.rate_at_max = Some(grid.value(index));
            entry.max_loglik = Some(value);
        }
        rows.push(Some(row));
    }

    if !unsupported.is_empty() {
        let pairs: u64 = unsupported
            .iter()
            .filter_map(|&id| registry.get(id))
            .map(|t| t.count)
            .sum();
        warn!(
            "{} pair types ({} pairs) have no usable likelihood and are left out",
            unsupported.len(),
            pairs
        );
    }
    if !degenerate.is_empty() {
        info!("{} pair types have no complete rows", degenerate.len());
    }

    Ok(BoundSurface {
        grid,
        rows,
        unsupported,
        degenerate,
    })
}

/// First index holding the largest finite value.
pub fn row_max(row: &[f64]) -> Option<(usize, f64)> {
    row.iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

fn unsupported(config: &PairConfig, reason: impl Into<String>) -> RhoError {
    RhoError::UnsupportedConfiguration {
        config: config.to_string(),
        reason: reason.into(),
    }
}

fn type_row(site: &SiteType, surface: &LikelihoodSurface) -> RhoResult<Lookup> {
    let config = &site.config;
    if !config.has_missing() {
        let row = surface
            .row(config)
            .ok_or_else(|| unsupported(config, "not present in the likelihood surface"))?;
        return finite_row(config, row.to_vec()).map(Lookup::Row);
    }

    let sub = config.complete_part();
    let m = sub.total();
    if m == 0 {
        return Ok(Lookup::Degenerate(vec![0.0; surface.grid().points]));
    }
    marginal_row(config, &sub, surface).map(Lookup::Row)
}

fn finite_row(config: &PairConfig, row: Vec<f64>) -> RhoResult<Vec<f64>> {
    if row.iter().any(|v| v.is_finite()) {
        Ok(row)
    } else {
        Err(unsupported(config, "log-likelihood is not finite at any rate"))
    }
}

fn ln_factorials(n: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(n + 1);
    let mut acc = 0.0;
    out.push(acc);
    for k in 1..=n {
        acc += (k as f64).ln();
        out.push(acc);
    }
    out
}

fn ln_binom(lf: &[f64], n: u32, k: u32) -> f64 {
    lf[n as usize] - lf[k as usize] - lf[(n - k) as usize]
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Number of ways to spread `extra` rows over `cells` cells.
pub fn extension_count(extra: u32, cells: usize) -> u64 {
    let k = (cells - 1) as u64;
    let n = extra as u64 + k;
    let mut acc: u64 = 1;
    for i in 0..k {
        acc = acc.saturating_mul(n - i) / (i + 1);
    }
    acc
}

fn extend(
    current: &mut PairConfig,
    cells: &[usize],
    extra: u32,
    out: &mut Vec<PairConfig>,
) {
    let Some((&first, rest)) = cells.split_first() else {
        return;
    };
    if rest.is_empty() {
        current.0[first] += extra;
        out.push(*current);
        current.0[first] -= extra;
        return;
    }
    for k in 0..=extra {
        current.0[first] += k;
        extend(current, rest, extra - k, out);
        current.0[first] -= k;
    }
}

/// Every full-sample complete table that contains `sub`.
pub fn extensions(sub: &PairConfig, nseq: usize, ploidy: Ploidy) -> RhoResult<Vec<PairConfig>> {
    let cells = complete_cells(ploidy);
    let extra = (nseq as u32).saturating_sub(sub.total());
    let count = extension_count(extra, cells.len());
    if count > MAX_EXTENSIONS {
        return Err(unsupported(
            sub,
            format!("{} completions exceed the limit of {}", count, MAX_EXTENSIONS),
        ));
    }
    let mut out = Vec::with_capacity(count as usize);
    let mut current = *sub;
    extend(&mut current, cells, extra, &mut out);
    Ok(out)
}

fn marginal_row(
    config: &PairConfig,
    sub: &PairConfig,
    surface: &LikelihoodSurface,
) -> RhoResult<Vec<f64>> {
    let nseq = surface.nseq();
    let points = surface.grid().points;
    let lf = ln_factorials(nseq);
    let m = sub.total();
    let ln_draw = ln_binom(&lf, nseq as u32, m);
    let cells = complete_cells(surface.ploidy());

    // (log weight of the labeled completion, its class row)
    let mut terms: Vec<(f64, &[f64])> = Vec::new();
    for full in extensions(sub, nseq, surface.ploidy())? {
        let Some(row) = surface.row(&full) else {
            continue;
        };
        let ln_hyper: f64 = cells
            .iter()
            .map(|&k| ln_binom(&lf, full.0[k], sub.0[k]))
            .sum::<f64>()
            - ln_draw;
        terms.push((ln_hyper - (full.orbit_size() as f64).ln(), row));
    }
    if terms.is_empty() {
        return Err(unsupported(config, "no completion is present in the likelihood surface"));
    }

    let ln_orbit = (sub.orbit_size() as f64).ln();
    let mut scratch = vec![0.0; terms.len()];
    let row: Vec<f64> = (0..points)
        .map(|r| {
            for (slot, (w, row)) in scratch.iter_mut().zip(&terms) {
                *slot = w + row[r];
            }
            log_sum_exp(&scratch) + ln_orbit
        })
        .collect();
    finite_row(config, row)
}

/// Whether both sites carry both alleles in a complete table.
pub fn segregating(config: &PairConfig, ploidy: Ploidy) -> bool {
    let mut dose = [[0u32; 2]; 2];
    for a in 0..3 {
        for b in 0..3 {
            let c = config.cell(a, b);
            for (site, state) in [(0, a), (1, b)] {
                match state {
                    0 => dose[site][0] += c,
                    1 => dose[site][1] += c,
                    HET if ploidy == Ploidy::Diploid => {
                        dose[site][0] += c;
                        dose[site][1] += c;
                    }
                    _ => {}
                }
            }
        }
    }
    dose.iter().all(|d| d[0] > 0 && d[1] > 0)
}

/// Canonical complete tables a surface must cover to score every type of
/// `registry`, in first-needed order.
pub fn required_configs(registry: &SiteTypeRegistry) -> Vec<PairConfig> {
    let nseq = registry.nseq();
    let ploidy = registry.ploidy();
    let mut seen = FnvHashSet::default();
    let mut out = Vec::new();
    let mut push = |c: PairConfig| {
        if segregating(&c, ploidy) && seen.insert(c) {
            out.push(c);
        }
    };

    for site in registry.iter() {
        let config = &site.config;
        if !config.has_missing() {
            push(config.canonical());
            continue;
        }
        let sub = config.complete_part();
        if sub.total() == 0 {
            continue;
        }
        match extensions(&sub, nseq, ploidy) {
            Ok(fulls) => fulls.into_iter().for_each(|f| push(f.canonical())),
            Err(e) => debug!("{}", e),
        }
    }
    debug_assert!(out.iter().all(|c| c.cell(MISS, MISS) == 0));
    out
}
