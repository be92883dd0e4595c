use super::{LikelihoodSurface, RateGrid};
use crate::config::SurfaceParams;
use crate::error::{RhoError, RhoResult};
use crate::matrix::Ploidy;
use crate::spectrum::config::HET;
use crate::spectrum::PairConfig;
use fnv::{FnvHashMap, FnvHashSet};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Largest number of haplotypes a simulated genealogy can carry.
pub const MAX_HAPLOTYPES: usize = 128;

#[derive(Debug, Clone, Copy)]
pub struct SimulationOptions {
    pub draws: usize,
    pub seed: Option<u64>,
    pub strict: bool,
}

impl SimulationOptions {
    pub fn from_params(params: &SurfaceParams, seed: Option<u64>) -> Self {
        Self {
            draws: params.draws,
            seed,
            strict: params.strict_types,
        }
    }
}

/// Descendant sets of one ancestral lineage at the two loci. An empty set
/// means the lineage is not ancestral to that locus.
#[derive(Debug, Clone, Copy)]
struct Lineage {
    a: u128,
    b: u128,
}

/// Branch lengths of the two marginal trees, keyed by the haplotypes below
/// each branch.
#[derive(Debug, Default)]
pub struct Genealogy {
    pub branches_a: Vec<(u128, f64)>,
    pub branches_b: Vec<(u128, f64)>,
}

impl Genealogy {
    pub fn total_a(&self) -> f64 {
        self.branches_a.iter().map(|(_, l)| l).sum()
    }

    pub fn total_b(&self) -> f64 {
        self.branches_b.iter().map(|(_, l)| l).sum()
    }
}

fn full_set(n: usize) -> u128 {
    if n >= 128 {
        u128::MAX
    } else {
        (1u128 << n) - 1
    }
}

/// Runs the two-locus coalescent with recombination back to both marginal
/// roots. Time is in units of `2N` generations and `rho` is the scaled
/// rate between the loci.
pub fn simulate_genealogy(n: usize, rho: f64, rng: &mut fastrand::Rng) -> Genealogy {
    let full = full_set(n);
    let mut lineages: Vec<Lineage> = (0..n)
        .map(|i| Lineage {
            a: 1 << i,
            b: 1 << i,
        })
        .collect();
    let mut len_a: FnvHashMap<u128, f64> = FnvHashMap::default();
    let mut len_b: FnvHashMap<u128, f64> = FnvHashMap::default();
    let mut done_a = n < 2;
    let mut done_b = n < 2;

    while !(done_a && done_b) {
        let k = lineages.len();
        let linked = lineages.iter().filter(|l| l.a != 0 && l.b != 0).count();
        let coal_rate = (k * (k - 1)) as f64 / 2.0;
        let rec_rate = rho / 2.0 * linked as f64;
        let total = coal_rate + rec_rate;
        let t = -(1.0 - rng.f64()).ln() / total;

        for l in &lineages {
            if !done_a && l.a != 0 {
                *len_a.entry(l.a).or_default() += t;
            }
            if !done_b && l.b != 0 {
                *len_b.entry(l.b).or_default() += t;
            }
        }

        if rng.f64() * total < coal_rate {
            let i = rng.usize(..k);
            let mut j = rng.usize(..k - 1);
            if j >= i {
                j += 1;
            }
            let (lo, hi) = (i.min(j), i.max(j));
            let other = lineages.swap_remove(hi);
            let kept = &mut lineages[lo];
            kept.a |= other.a;
            kept.b |= other.b;
        } else {
            let pick = rng.usize(..linked);
            if let Some(idx) = lineages
                .iter()
                .enumerate()
                .filter(|(_, l)| l.a != 0 && l.b != 0)
                .nth(pick)
                .map(|(i, _)| i)
            {
                let b = lineages[idx].b;
                lineages[idx].b = 0;
                lineages.push(Lineage { a: 0, b });
            }
        }

        done_a = done_a || lineages.iter().any(|l| l.a == full);
        done_b = done_b || lineages.iter().any(|l| l.b == full);
    }

    Genealogy {
        branches_a: len_a.into_iter().collect(),
        branches_b: len_b.into_iter().collect(),
    }
}

/// Table produced when the mutation at locus A sits above `x` and the one
/// at locus B above `y`. Carriers of a mutation take state 1.
pub fn branch_config(x: u128, y: u128, n: usize, ploidy: Ploidy) -> PairConfig {
    let mut config = PairConfig::zero();
    match ploidy {
        Ploidy::Haploid => {
            let both = (x & y).count_ones();
            let only_a = (x & !y).count_ones();
            let only_b = (y & !x).count_ones();
            config.0[5] = both;
            config.0[4] = only_a;
            config.0[1] = only_b;
            config.0[0] = n as u32 - both - only_a - only_b;
        }
        Ploidy::Diploid => {
            let genotype = |set: u128, ind: usize| match (set >> (2 * ind)) & 0b11 {
                0 => 0,
                0b11 => 1,
                _ => HET,
            };
            for ind in 0..n / 2 {
                config.add(genotype(x, ind), genotype(y, ind));
            }
        }
    }
    config
}

/// Adds every branch pair of one genealogy, weighted by the chance that
/// the single mutation at each locus falls on it.
fn accumulate(
    genealogy: &Genealogy,
    n: usize,
    ploidy: Ploidy,
    wanted: &FnvHashSet<PairConfig>,
    into: &mut FnvHashMap<PairConfig, f64>,
) {
    let (tot_a, tot_b) = (genealogy.total_a(), genealogy.total_b());
    if tot_a <= 0.0 || tot_b <= 0.0 {
        return;
    }
    for &(x, la) in &genealogy.branches_a {
        for &(y, lb) in &genealogy.branches_b {
            let canonical = branch_config(x, y, n, ploidy).canonical();
            if wanted.contains(&canonical) {
                *into.entry(canonical).or_default() += (la / tot_a) * (lb / tot_b);
            }
        }
    }
}

fn simulate_point(
    rho: f64,
    n: usize,
    ploidy: Ploidy,
    wanted: &FnvHashSet<PairConfig>,
    draws: usize,
    seed: u64,
) -> FnvHashMap<PairConfig, f64> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut sums = FnvHashMap::default();
    for _ in 0..draws {
        let genealogy = simulate_genealogy(n, rho, &mut rng);
        accumulate(&genealogy, n, ploidy, wanted, &mut sums);
    }
    sums
}

/// Estimates `ln P(type | rho)` for each requested complete table at every
/// grid point by Monte Carlo over two-locus genealogies.
pub fn generate(
    nseq: usize,
    ploidy: Ploidy,
    grid: RateGrid,
    configs: &[PairConfig],
    options: &SimulationOptions,
) -> RhoResult<LikelihoodSurface> {
    let n = nseq * ploidy.copies();
    if !(2..=MAX_HAPLOTYPES).contains(&n) {
        return Err(RhoError::Config(format!(
            "Simulated surfaces support 2 to {} haplotypes, data has {}; supply a likelihood table",
            MAX_HAPLOTYPES, n
        )));
    }
    if options.draws == 0 {
        return Err(RhoError::Config("Draw count must be positive".to_string()));
    }

    let wanted: FnvHashSet<PairConfig> = configs.iter().map(|c| c.canonical()).collect();
    let base_seed = options.seed.unwrap_or_else(|| fastrand::u64(..));
    info!(
        "Simulating {} genealogies at each of {} rates for {} pair types",
        options.draws,
        grid.points,
        wanted.len()
    );
    let start = Instant::now();

    let points: Vec<FnvHashMap<PairConfig, f64>> = (0..grid.points)
        .into_par_iter()
        .map(|i| {
            simulate_point(
                grid.value(i),
                n,
                ploidy,
                &wanted,
                options.draws,
                base_seed.wrapping_add(i as u64),
            )
        })
        .collect();

    let draws = options.draws as f64;
    let floor = (0.1 / draws).ln();
    let mut surface = LikelihoodSurface::new(nseq, ploidy, grid);
    let mut seen = FnvHashSet::default();
    let mut never = 0;

    for config in configs.iter().map(|c| c.canonical()) {
        if !seen.insert(config) {
            continue;
        }
        let row: Vec<f64> = points
            .iter()
            .map(|sums| match sums.get(&config) {
                Some(&w) if w > 0.0 => (w / draws).ln(),
                _ => floor,
            })
            .collect();
        if points.iter().all(|sums| !sums.contains_key(&config)) {
            if options.strict {
                return Err(RhoError::UnsupportedConfiguration {
                    config: config.to_string(),
                    reason: format!("never produced in {} draws at any rate", options.draws),
                });
            }
            debug!("Type {} never simulated; leaving it out", config);
            never += 1;
            continue;
        }
        surface.insert(&config, row)?;
    }

    if never > 0 {
        warn!("{} requested pair types were never simulated", never);
    }
    info!(
        "Surface with {} rows generated in {:.2?}",
        surface.len(),
        start.elapsed()
    );
    Ok(surface)
}
