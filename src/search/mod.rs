pub mod proposal;
pub mod runner;

pub use self::proposal::{Move, MoveKind};
pub use self::runner::{ProgressCallback, Quiet, Sampler, SearchOptions, SearchResult};

use self::proposal::{Change, ProposalParams};
use crate::blocks::{BlockMap, BlockTriple};
use crate::config::InitialLayout;
use crate::error::{RhoError, RhoResult};
use crate::likelihood::{BoundSurface, RateGrid};
use crate::locs::{Locs, Model};
use crate::spectrum::PairSpectrum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::IntoEnumIterator;

/// Read-only inputs shared by every chain.
#[derive(Debug)]
pub struct SearchData {
    grid: RateGrid,
    rows: Vec<Vec<f64>>,
    /// (left site, right site, row) sorted by left site
    pairs: Vec<(usize, usize, usize)>,
    /// `pairs[by_left[s]..by_left[s + 1]]` start at site `s`
    by_left: Vec<usize>,
    lengths: Vec<f64>,
    max_span: usize,
}

impl SearchData {
    pub fn new(spectrum: &PairSpectrum, bound: &BoundSurface, locs: &Locs) -> RhoResult<Self> {
        if locs.model != Model::CrossingOver {
            return Err(RhoError::Config(
                "Rate-variation search supports the crossing-over model only".to_string(),
            ));
        }
        if locs.len() < 2 {
            return Err(RhoError::Validation(
                "Rate-variation search needs at least two SNPs".to_string(),
            ));
        }
        if bound.len() != spectrum.registry.len() {
            return Err(RhoError::Validation(
                "Surface is not bound to this spectrum".to_string(),
            ));
        }

        let mut row_of = vec![None; bound.len()];
        let mut rows = Vec::new();
        let mut pairs = Vec::with_capacity(spectrum.pairs.len());
        for p in &spectrum.pairs {
            if p.right >= locs.len() {
                return Err(RhoError::Validation(format!(
                    "Pair ({}, {}) lies beyond the {} known SNP positions",
                    p.left,
                    p.right,
                    locs.len()
                )));
            }
            let Some(row) = bound.row(p.type_id) else {
                continue;
            };
            let slot = *row_of[p.type_id].get_or_insert_with(|| {
                rows.push(row.to_vec());
                rows.len() - 1
            });
            pairs.push((p.left, p.right, slot));
        }
        pairs.sort_by_key(|&(l, r, _)| (l, r));

        let nsites = locs.len();
        let mut by_left = vec![0; nsites + 1];
        for &(l, _, _) in &pairs {
            by_left[l + 1] += 1;
        }
        for s in 0..nsites {
            by_left[s + 1] += by_left[s];
        }
        let max_span = pairs.iter().map(|&(l, r, _)| r - l).max().unwrap_or(1);

        Ok(Self {
            grid: *bound.grid(),
            rows,
            pairs,
            by_left,
            lengths: locs.interval_lengths(),
            max_span,
        })
    }

    pub fn intervals(&self) -> usize {
        self.lengths.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Pair indices with an interval in `[lo, hi)` between their sites.
    fn pairs_touching(&self, lo: usize, hi: usize) -> std::ops::Range<usize> {
        let first_left = lo.saturating_sub(self.max_span - 1).min(self.by_left.len() - 1);
        let last_left = hi.min(self.by_left.len() - 1);
        self.by_left[first_left]..self.by_left[last_left]
    }

    fn pair_loglik(&self, pair: usize, rho: f64) -> f64 {
        let (_, _, row) = self.pairs[pair];
        self.grid.interpolate(&self.rows[row], rho)
    }
}

/// Proposal and acceptance tallies, indexed by [`MoveKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStats {
    pub proposed: [u64; 4],
    pub accepted: [u64; 4],
}

impl MoveStats {
    pub fn absorb(&mut self, other: &MoveStats) {
        for i in 0..4 {
            self.proposed[i] += other.proposed[i];
            self.accepted[i] += other.accepted[i];
        }
    }

    pub fn acceptance(&self, kind: MoveKind) -> f64 {
        let i = kind.index();
        if self.proposed[i] == 0 {
            0.0
        } else {
            self.accepted[i] as f64 / self.proposed[i] as f64
        }
    }

    pub fn rows(&self) -> Vec<(MoveKind, u64, u64)> {
        MoveKind::iter()
            .map(|k| (k, self.proposed[k.index()], self.accepted[k.index()]))
            .collect()
    }
}

/// State of the chain recorded after burn-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub chain: usize,
    pub iteration: usize,
    pub loglik: f64,
    pub log_prior: f64,
    pub blocks: Vec<BlockTriple>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChainSettings {
    pub block_penalty: f64,
    pub prior_mean: f64,
    pub rate_step: f64,
    pub max_shift: usize,
    pub burn_in: usize,
    pub sample_every: usize,
}

/// One reversible-jump chain over block maps.
pub struct Chain {
    pub data: Arc<SearchData>,
    pub id: usize,
    pub map: BlockMap,
    pub rates: Vec<f64>,
    pub pair_ll: Vec<f64>,
    pub loglik: f64,
    pub iteration: usize,
    pub stats: MoveStats,
    pub samples: Vec<Sample>,
    pub rate_sums: Vec<f64>,
    pub settings: ChainSettings,
    pub rng: fastrand::Rng,
}

impl Chain {
    pub fn new(
        data: Arc<SearchData>,
        id: usize,
        layout: InitialLayout,
        initial_rate: f64,
        settings: ChainSettings,
        seed: Option<u64>,
    ) -> RhoResult<Self> {
        if !(settings.prior_mean.is_finite() && settings.prior_mean > 0.0) {
            return Err(RhoError::Config(format!(
                "Rate prior mean must be positive, got {}",
                settings.prior_mean
            )));
        }
        if !(initial_rate.is_finite() && initial_rate > 0.0) {
            return Err(RhoError::Config(format!(
                "Initial rate must be positive, got {}",
                initial_rate
            )));
        }
        if settings.sample_every == 0 {
            return Err(RhoError::Config("Sampling interval must be positive".to_string()));
        }
        let rng = match seed {
            Some(s) => fastrand::Rng::with_seed(s),
            None => fastrand::Rng::new(),
        };
        let intervals = data.intervals();
        let map = match layout {
            InitialLayout::Single => BlockMap::single(intervals, initial_rate)?,
            InitialLayout::PerInterval => BlockMap::per_interval(&vec![initial_rate; intervals])?,
        };
        let rates = map.interval_rates();
        let mut chain = Self {
            pair_ll: vec![0.0; data.pair_count()],
            rate_sums: vec![0.0; intervals],
            data,
            id,
            map,
            rates,
            loglik: 0.0,
            iteration: 0,
            stats: MoveStats::default(),
            samples: Vec::new(),
            settings,
            rng,
        };
        chain.loglik = chain.full_loglik();
        Ok(chain)
    }

    /// Rescores every pair from the current rates.
    pub fn full_loglik(&mut self) -> f64 {
        let data = Arc::clone(&self.data);
        let mut prefix = Vec::with_capacity(self.rates.len() + 1);
        prefix.push(0.0);
        for (r, d) in self.rates.iter().zip(&data.lengths) {
            prefix.push(prefix[prefix.len() - 1] + r * d);
        }
        for (i, &(l, r, _)) in data.pairs.iter().enumerate() {
            self.pair_ll[i] = data.pair_loglik(i, prefix[r] - prefix[l]);
        }
        self.pair_ll.iter().sum()
    }

    /// Log prior: block penalty plus exponential rate densities.
    pub fn log_prior(&self) -> f64 {
        let mean = self.settings.prior_mean;
        self.map
            .iter()
            .map(|(_, b)| -self.settings.block_penalty - mean.ln() - b.rate / mean)
            .sum()
    }

    /// New log-likelihoods of the pairs touched by `change`.
    fn rescore(&self, change: &Change) -> (std::ops::Range<usize>, Vec<f64>) {
        let data = &self.data;
        let range = data.pairs_touching(change.lo, change.hi);
        if range.is_empty() {
            return (range, Vec::new());
        }
        let lo = data.pairs[range.start].0;
        let hi = data.pairs[range.clone()]
            .iter()
            .map(|&(_, r, _)| r)
            .max()
            .unwrap_or(lo);

        // prefix over [lo, hi) under the proposed rates
        let mut prefix = Vec::with_capacity(hi - lo + 1);
        prefix.push(0.0);
        for k in lo..hi {
            let rate = if (change.lo..change.hi).contains(&k) {
                change.rate
            } else {
                self.rates[k]
            };
            prefix.push(prefix[prefix.len() - 1] + rate * data.lengths[k]);
        }

        let scores = range
            .clone()
            .map(|i| {
                let (l, r, _) = data.pairs[i];
                if r <= change.lo || l >= change.hi {
                    self.pair_ll[i]
                } else {
                    data.pair_loglik(i, prefix[r - lo] - prefix[l - lo])
                }
            })
            .collect();
        (range, scores)
    }

    /// One proposal with Metropolis-Hastings acceptance.
    pub fn step(&mut self) -> RhoResult<bool> {
        let params = ProposalParams {
            prior_mean: self.settings.prior_mean,
            rate_step: self.settings.rate_step,
            max_shift: self.settings.max_shift,
        };
        let mv = Move::propose(&self.map, &mut self.rng, &params)?;
        let kind = mv.kind().index();
        self.stats.proposed[kind] += 1;

        let Some(change) = mv.change(&self.map)? else {
            return Ok(false);
        };
        let (range, scores) = self.rescore(&change);
        let old: f64 = self.pair_ll[range.clone()].iter().sum();
        let new: f64 = scores.iter().sum();
        let log_accept = (new - old)
            + mv.log_ratio(
                &self.map,
                self.settings.block_penalty,
                self.settings.prior_mean,
            )?;

        if log_accept.is_nan() || (log_accept < 0.0 && self.rng.f64() >= log_accept.exp()) {
            return Ok(false);
        }

        mv.apply(&mut self.map)?;
        self.rates[change.lo..change.hi].fill(change.rate);
        self.pair_ll[range].copy_from_slice(&scores);
        self.loglik += new - old;
        self.stats.accepted[kind] += 1;
        Ok(true)
    }

    fn record_sample(&mut self) {
        let iteration = self.iteration;
        let past_burn_in = iteration > self.settings.burn_in;
        if !past_burn_in || (iteration - self.settings.burn_in) % self.settings.sample_every != 0 {
            return;
        }
        for (sum, r) in self.rate_sums.iter_mut().zip(&self.rates) {
            *sum += r;
        }
        self.samples.push(Sample {
            chain: self.id,
            iteration,
            loglik: self.loglik,
            log_prior: self.log_prior(),
            blocks: self.map.triples(),
        });
    }

    /// Runs `steps` iterations; returns how many proposals were accepted.
    pub fn evolve(&mut self, steps: usize) -> RhoResult<usize> {
        let mut accepted = 0;
        for _ in 0..steps {
            if self.step()? {
                accepted += 1;
            }
            self.iteration += 1;
            self.record_sample();
        }
        Ok(accepted)
    }
}
