use crate::config::Config;
use crate::error::{RhoError, RhoResult};
use crate::io;
use crate::likelihood::composite::{distance_curve, window_estimates, WindowEstimate};
use crate::likelihood::lookup::required_configs;
use crate::likelihood::simulate::{generate, SimulationOptions};
use crate::likelihood::{bind, log_likelihood_curve, maximize, BoundSurface, Estimate};
use crate::likelihood::{LikelihoodSurface, RateGrid};
use crate::locs::Locs;
use crate::matrix::AlleleMatrix;
use crate::search::{ProgressCallback, Sampler, SearchData, SearchOptions, SearchResult};
use crate::spectrum::{self, PairSpectrum, SpectrumStats};
use crate::stats::{self, LdDistanceTest, LdStatistic, Rmin};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::info;

/// Aligned sample with SNP positions.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub names: Vec<String>,
    pub matrix: AlleleMatrix,
    pub locs: Locs,
}

impl Dataset {
    pub fn new(names: Vec<String>, matrix: AlleleMatrix, locs: Locs) -> RhoResult<Self> {
        if locs.len() != matrix.nsites() {
            return Err(RhoError::Validation(format!(
                "Locations list {} sites, sequences have {}",
                locs.len(),
                matrix.nsites()
            )));
        }
        Ok(Self {
            names,
            matrix,
            locs,
        })
    }
}

/// Service: load a sites file and, when given, its locations file.
/// Without locations the sites are taken as contiguous.
pub fn load_dataset(sites_path: &Path, locs_path: Option<&Path>) -> RhoResult<Dataset> {
    let sites = io::read_sites(sites_path)?;
    let locs = match locs_path {
        Some(path) => io::read_locs(path)?,
        None => Locs::contiguous(sites.matrix.nsites()),
    };
    info!(
        "Loaded {} sequences x {} sites (ploidy {})",
        sites.matrix.nseq(),
        sites.matrix.nsites(),
        sites.matrix.ploidy()
    );
    Dataset::new(sites.names, sites.matrix, locs)
}

/// Service: read a likelihood table, or simulate the rows this spectrum
/// needs.
pub fn prepare_surface(
    spectrum: &PairSpectrum,
    table: Option<&Path>,
    cfg: &Config,
    seed: Option<u64>,
) -> RhoResult<LikelihoodSurface> {
    let registry = &spectrum.registry;
    match table {
        Some(path) => {
            let surface = io::read_table(File::open(path)?, registry.ploidy())?;
            if surface.nseq() != registry.nseq() {
                return Err(RhoError::Validation(format!(
                    "Likelihood table is for {} sequences, data has {}",
                    surface.nseq(),
                    registry.nseq()
                )));
            }
            info!("Read {} likelihood rows from {}", surface.len(), path.display());
            Ok(surface)
        }
        None => {
            let grid = RateGrid::new(cfg.surface.rho_max, cfg.surface.rho_points)?;
            let configs = required_configs(registry);
            let options = SimulationOptions::from_params(&cfg.surface, seed);
            generate(registry.nseq(), registry.ploidy(), grid, &configs, &options)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PairwiseOptions<'a> {
    pub table: Option<&'a Path>,
    pub seed: Option<u64>,
    /// Sliding window `(width, step)` in SNPs.
    pub windows: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseReport {
    pub estimate: Estimate,
    /// `(rate, composite log-likelihood)` per grid point.
    pub curve: Vec<(f64, f64)>,
    /// Region-wide estimate with each pair scaled by its separation.
    pub distance_estimate: Option<Estimate>,
    pub spectrum: SpectrumStats,
    pub types: usize,
    pub unsupported_types: usize,
    pub degenerate_types: usize,
    pub rmin: Rmin,
    pub ld_tests: Vec<LdDistanceTest>,
    pub windows: Vec<WindowEstimate>,
}

pub struct PairwiseAnalysis {
    pub spectrum: PairSpectrum,
    pub surface: LikelihoodSurface,
    pub bound: BoundSurface,
    pub report: PairwiseReport,
}

/// Service: classify pairs, score them against the surface and summarize.
pub fn run_pairwise(
    dataset: &Dataset,
    cfg: &Config,
    options: &PairwiseOptions,
) -> RhoResult<PairwiseAnalysis> {
    let mut spectrum = spectrum::build(&dataset.matrix, &cfg.spectrum)?;
    let surface = prepare_surface(&spectrum, options.table, cfg, options.seed)?;
    let bound = bind(&mut spectrum.registry, &surface, cfg.surface.strict_types)?;
    let grid = *bound.grid();

    let curve = log_likelihood_curve(&spectrum.registry, &bound)?;
    let estimate = maximize(&curve, &grid)?;
    info!(
        "Composite estimate rho = {} (lnL = {:.3})",
        estimate.rate, estimate.loglik
    );

    let distance_estimate = match distance_curve(&spectrum, &bound, &dataset.locs, cfg.surface.tract_length) {
        Ok(c) => maximize(&c, &grid).ok(),
        Err(e) => {
            info!("No distance-scaled estimate: {}", e);
            None
        }
    };

    let windows = match options.windows {
        Some((width, step)) => window_estimates(&spectrum, &bound, &dataset.locs, width, step)?,
        None => Vec::new(),
    };

    let ld_tests = LdStatistic::iter()
        .map(|s| {
            stats::ld_distance_test(&spectrum, &dataset.locs, s, cfg.stats.shuffles, options.seed)
        })
        .collect::<RhoResult<Vec<_>>>()?;

    let report = PairwiseReport {
        estimate,
        curve: grid.values().into_iter().zip(curve.iter().copied()).collect(),
        distance_estimate,
        spectrum: spectrum.stats,
        types: spectrum.registry.len(),
        unsupported_types: bound.unsupported().len(),
        degenerate_types: bound.degenerate().len(),
        rmin: stats::min_recombination_events(&spectrum),
        ld_tests,
        windows,
    };

    Ok(PairwiseAnalysis {
        spectrum,
        surface,
        bound,
        report,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalReport {
    pub pairwise: Estimate,
    /// Starting rate per unit length.
    pub initial_rate: f64,
    pub prior_mean: f64,
    pub search: SearchResult,
}

/// Service: fit a block map of rates along the region.
pub fn run_interval<CB: ProgressCallback>(
    dataset: &Dataset,
    cfg: &Config,
    table: Option<&Path>,
    seed: Option<u64>,
    callback: CB,
) -> RhoResult<IntervalReport> {
    let mut spectrum = spectrum::build(&dataset.matrix, &cfg.spectrum)?;
    let surface = prepare_surface(&spectrum, table, cfg, seed)?;
    let bound = bind(&mut spectrum.registry, &surface, cfg.surface.strict_types)?;
    let grid = *bound.grid();

    let curve = distance_curve(&spectrum, &bound, &dataset.locs, cfg.surface.tract_length)?;
    let pairwise = maximize(&curve, &grid)?;
    let length = dataset.locs.length;
    if length <= 0.0 {
        return Err(RhoError::Validation("Sequence length must be positive".to_string()));
    }
    let initial_rate = pairwise.rate.max(grid.step() / 2.0) / length;

    let data = Arc::new(SearchData::new(&spectrum, &bound, &dataset.locs)?);
    let options = SearchOptions::from_config(cfg, initial_rate);
    let prior_mean = options.settings.prior_mean;
    let search = Sampler::new(data, options).run(seed, callback)?;

    Ok(IntervalReport {
        pairwise,
        initial_rate,
        prior_mean,
        search,
    })
}
