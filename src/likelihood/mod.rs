pub mod composite;
pub mod lookup;
pub mod simulate;

pub use self::composite::{log_likelihood_curve, maximize, Estimate};
pub use self::lookup::{bind, BoundSurface};

use crate::error::{RhoError, RhoResult};
use crate::matrix::Ploidy;
use crate::spectrum::PairConfig;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

/// Evenly spaced candidate rates `0, max/(points-1), ..., max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateGrid {
    pub max: f64,
    pub points: usize,
}

impl RateGrid {
    pub fn new(max: f64, points: usize) -> RhoResult<Self> {
        if points < 2 {
            return Err(RhoError::Config(format!(
                "Rate grid needs at least 2 points, got {}",
                points
            )));
        }
        if !(max.is_finite() && max > 0.0) {
            return Err(RhoError::Config(format!(
                "Rate grid maximum must be positive, got {}",
                max
            )));
        }
        Ok(Self { max, points })
    }

    #[inline(always)]
    pub fn step(&self) -> f64 {
        self.max / (self.points - 1) as f64
    }

    #[inline(always)]
    pub fn value(&self, index: usize) -> f64 {
        index as f64 * self.step()
    }

    pub fn values(&self) -> Vec<f64> {
        (0..self.points).map(|i| self.value(i)).collect()
    }

    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    /// Linear interpolation of `row` at `rate`, clamped to the grid ends.
    pub fn interpolate(&self, row: &[f64], rate: f64) -> f64 {
        let last = self.points - 1;
        if rate <= 0.0 {
            return row[0];
        }
        let pos = rate / self.step();
        let lo = pos.floor() as usize;
        if lo >= last {
            return row[last];
        }
        let frac = pos - lo as f64;
        if frac == 0.0 {
            return row[lo];
        }
        (1.0 - frac) * row[lo] + frac * row[lo + 1]
    }
}

/// Log-likelihood rows over a rate grid, keyed by canonical complete
/// configuration. Rows hold `ln P(type | rate)` for the whole symmetry
/// class of the configuration.
#[derive(Debug, Clone)]
pub struct LikelihoodSurface {
    nseq: usize,
    ploidy: Ploidy,
    grid: RateGrid,
    configs: Vec<PairConfig>,
    values: Vec<f64>,
    index: FnvHashMap<PairConfig, usize>,
}

impl LikelihoodSurface {
    pub fn new(nseq: usize, ploidy: Ploidy, grid: RateGrid) -> Self {
        Self {
            nseq,
            ploidy,
            grid,
            configs: Vec::new(),
            values: Vec::new(),
            index: FnvHashMap::default(),
        }
    }

    pub fn nseq(&self) -> usize {
        self.nseq
    }

    pub fn ploidy(&self) -> Ploidy {
        self.ploidy
    }

    pub fn grid(&self) -> &RateGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Adds or replaces the row of `config`'s class.
    pub fn insert(&mut self, config: &PairConfig, row: Vec<f64>) -> RhoResult<()> {
        if row.len() != self.grid.points {
            return Err(RhoError::Validation(format!(
                "Row for {} has {} values, grid has {} points",
                config,
                row.len(),
                self.grid.points
            )));
        }
        if config.has_missing() {
            return Err(RhoError::InvalidConfiguration(format!(
                "{} has missing calls; surface rows must be complete",
                config
            )));
        }
        config.validate(self.nseq, self.ploidy)?;

        let canonical = config.canonical();
        let width = self.grid.points;
        match self.index.get(&canonical) {
            Some(&i) => self.values[i * width..(i + 1) * width].copy_from_slice(&row),
            None => {
                self.index.insert(canonical, self.configs.len());
                self.configs.push(canonical);
                self.values.extend_from_slice(&row);
            }
        }
        Ok(())
    }

    pub fn row(&self, config: &PairConfig) -> Option<&[f64]> {
        self.index
            .get(&config.canonical())
            .map(|&i| self.row_at(i))
    }

    pub fn row_at(&self, i: usize) -> &[f64] {
        let width = self.grid.points;
        &self.values[i * width..(i + 1) * width]
    }

    /// Rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&PairConfig, &[f64])> {
        self.configs
            .iter()
            .enumerate()
            .map(move |(i, c)| (c, self.row_at(i)))
    }
}
