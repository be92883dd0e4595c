use super::{Chain, ChainSettings, MoveStats, Sample, SearchData};
use crate::blocks::BlockTriple;
use crate::config::{Config, InitialLayout};
use crate::error::{RhoError, RhoResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct SearchOptions {
    pub chains: usize,
    pub iterations: usize,
    pub epoch_steps: usize,
    pub layout: InitialLayout,
    pub initial_rate: f64,
    pub settings: ChainSettings,
    pub max_time: Option<Duration>,
}

impl SearchOptions {
    /// Options from the run config. `default_rate` (per unit length) seeds
    /// the chains and stands in for an unset prior mean.
    pub fn from_config(cfg: &Config, default_rate: f64) -> Self {
        let s = &cfg.search;
        Self {
            chains: s.chains.max(1),
            iterations: s.iterations,
            epoch_steps: s.epoch_steps.max(1),
            layout: s.initial,
            initial_rate: default_rate,
            settings: ChainSettings {
                block_penalty: s.block_penalty,
                prior_mean: s.prior_mean.unwrap_or(default_rate),
                rate_step: s.rate_step,
                max_shift: s.max_shift,
                burn_in: s.burn_in,
                sample_every: s.sample_every,
            },
            max_time: None,
        }
    }
}

/// Receives updates between epochs.
/// Returning false stops the run after the current epoch.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, iteration: usize, loglik: f64, blocks: f64, ips: f32) -> bool;
}

/// Callback that never stops the run.
pub struct Quiet;

impl ProgressCallback for Quiet {
    fn on_progress(&self, _iteration: usize, _loglik: f64, _blocks: f64, _ips: f32) -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub samples: Vec<Sample>,
    /// Per-interval rate averaged over all samples (or final states when
    /// nothing was sampled).
    pub mean_rates: Vec<f64>,
    /// Sample count per number of blocks.
    pub block_counts: BTreeMap<usize, usize>,
    pub final_maps: Vec<Vec<BlockTriple>>,
    pub stats: MoveStats,
    pub iterations: usize,
    pub cancelled: bool,
}

pub struct Sampler {
    data: Arc<SearchData>,
    options: SearchOptions,
}

impl Sampler {
    pub fn new(data: Arc<SearchData>, options: SearchOptions) -> Self {
        Self { data, options }
    }

    pub fn run<CB: ProgressCallback>(&self, seed: Option<u64>, callback: CB) -> RhoResult<SearchResult> {
        let opts = &self.options;
        if opts.iterations == 0 {
            return Err(RhoError::Config("Iteration count must be positive".to_string()));
        }

        let mut chains: Vec<Chain> = (0..opts.chains)
            .map(|i| {
                Chain::new(
                    self.data.clone(),
                    i,
                    opts.layout,
                    opts.initial_rate,
                    opts.settings,
                    seed.map(|s| s.wrapping_add(i as u64)),
                )
            })
            .collect::<RhoResult<_>>()?;

        info!(
            "Running {} chains for {} iterations over {} intervals ({} pairs)",
            opts.chains,
            opts.iterations,
            self.data.intervals(),
            self.data.pair_count()
        );

        let start_time = Instant::now();
        let mut done = 0;
        let mut cancelled = false;

        while done < opts.iterations {
            if let Some(limit) = opts.max_time {
                if start_time.elapsed() >= limit {
                    cancelled = true;
                    break;
                }
            }

            let steps = opts.epoch_steps.min(opts.iterations - done);
            let epoch_start = Instant::now();
            let accepted: Vec<usize> = chains
                .par_iter_mut()
                .map(|c| c.evolve(steps))
                .collect::<RhoResult<_>>()?;
            done += steps;

            let best = chains
                .iter()
                .map(|c| c.loglik)
                .fold(f64::NEG_INFINITY, f64::max);
            let blocks =
                chains.iter().map(|c| c.map.len()).sum::<usize>() as f64 / chains.len() as f64;
            let secs = epoch_start.elapsed().as_secs_f32().max(f32::EPSILON);
            let ips = (steps * chains.len()) as f32 / secs;
            debug!(
                "Iteration {}: accepted {:?}, best loglik {:.3}",
                done, accepted, best
            );

            if !callback.on_progress(done, best, blocks, ips) {
                cancelled = true;
                break;
            }
        }

        let mut stats = MoveStats::default();
        let mut samples = Vec::new();
        let mut rate_sums = vec![0.0; self.data.intervals()];
        let mut final_maps = Vec::with_capacity(chains.len());
        for chain in &chains {
            stats.absorb(&chain.stats);
            samples.extend(chain.samples.iter().cloned());
            for (sum, r) in rate_sums.iter_mut().zip(&chain.rate_sums) {
                *sum += r;
            }
            final_maps.push(chain.map.triples());
        }

        let mean_rates = if samples.is_empty() {
            let n = chains.len() as f64;
            let mut acc = vec![0.0; self.data.intervals()];
            for chain in &chains {
                for (a, r) in acc.iter_mut().zip(&chain.rates) {
                    *a += r / n;
                }
            }
            acc
        } else {
            let n = samples.len() as f64;
            rate_sums.iter().map(|s| s / n).collect()
        };

        let mut block_counts = BTreeMap::new();
        for s in &samples {
            *block_counts.entry(s.blocks.len()).or_insert(0) += 1;
        }

        info!(
            "Search finished after {} iterations with {} samples in {:.2?}",
            done,
            samples.len(),
            start_time.elapsed()
        );

        Ok(SearchResult {
            samples,
            mean_rates,
            block_counts,
            final_maps,
            stats,
            iterations: done,
            cancelled,
        })
    }
}
