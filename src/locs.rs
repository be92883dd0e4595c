use crate::error::{RhoError, RhoResult};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Recombination model named in the locations header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Model {
    #[strum(serialize = "L")]
    CrossingOver,
    #[strum(serialize = "C")]
    GeneConversion,
}

/// Physical positions of the segregating sites (usually in kb).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locs {
    pub positions: Vec<f64>,
    pub length: f64,
    pub model: Model,
}

impl Locs {
    pub fn new(positions: Vec<f64>, length: f64, model: Model) -> RhoResult<Self> {
        if !length.is_finite() || positions.iter().any(|p| !p.is_finite()) {
            return Err(RhoError::Validation(
                "SNP positions and sequence length must be finite numbers".to_string(),
            ));
        }
        if positions.windows(2).any(|w| w[1] < w[0]) {
            return Err(RhoError::Validation(
                "SNP positions are not monotonically increasing".to_string(),
            ));
        }
        if let Some(&last) = positions.last() {
            if last > length {
                return Err(RhoError::Validation(format!(
                    "Last SNP position {} exceeds sequence length {}",
                    last, length
                )));
            }
        }
        Ok(Self {
            positions,
            length,
            model,
        })
    }

    /// Unit spacing `1..=n`, used when no locations file is given.
    pub fn contiguous(n: usize) -> Self {
        Self {
            positions: (1..=n).map(|p| p as f64).collect(),
            length: n as f64,
            model: Model::CrossingOver,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Lengths of the intervals between consecutive SNPs.
    pub fn interval_lengths(&self) -> Vec<f64> {
        self.positions.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn distance(&self, left: usize, right: usize) -> f64 {
        (self.positions[right] - self.positions[left]).abs()
    }

    /// Effective separation of two sites under the model: the physical
    /// distance for crossing over, the chance-weighted tract overlap for
    /// gene conversion with mean tract length `tract`.
    pub fn separation(&self, left: usize, right: usize, tract: f64) -> f64 {
        let d = self.distance(left, right);
        match self.model {
            Model::CrossingOver => d,
            Model::GeneConversion => {
                if tract <= 0.0 {
                    0.0
                } else {
                    2.0 * tract * (1.0 - (-d / tract).exp())
                }
            }
        }
    }

    /// Separation used to scale the whole-region rate down to one pair.
    pub fn region_separation(&self, tract: f64) -> f64 {
        match self.model {
            Model::CrossingOver => self.length,
            Model::GeneConversion => {
                if tract <= 0.0 {
                    0.0
                } else {
                    2.0 * tract * (1.0 - (-self.length / tract).exp())
                }
            }
        }
    }
}
