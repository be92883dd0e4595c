use crate::blocks::{BlockId, BlockMap};
use crate::error::RhoResult;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum MoveKind {
    Rate,
    Split,
    Merge,
    Shift,
}

impl MoveKind {
    pub fn index(self) -> usize {
        self as usize
    }

    fn is_available(self, blocks: usize, intervals: usize) -> bool {
        match self {
            MoveKind::Rate => true,
            MoveKind::Split => blocks < intervals,
            MoveKind::Merge | MoveKind::Shift => blocks > 1,
        }
    }

    fn available_count(blocks: usize, intervals: usize) -> usize {
        1 + usize::from(blocks < intervals) + 2 * usize::from(blocks > 1)
    }

    /// Chance of choosing this kind with `blocks` blocks over `intervals`.
    pub fn probability(self, blocks: usize, intervals: usize) -> f64 {
        if self.is_available(blocks, intervals) {
            1.0 / Self::available_count(blocks, intervals) as f64
        } else {
            0.0
        }
    }

    fn pick(rng: &mut fastrand::Rng, blocks: usize, intervals: usize) -> MoveKind {
        let mut nth = rng.usize(..Self::available_count(blocks, intervals));
        for kind in [MoveKind::Rate, MoveKind::Split, MoveKind::Merge, MoveKind::Shift] {
            if kind.is_available(blocks, intervals) {
                if nth == 0 {
                    return kind;
                }
                nth -= 1;
            }
        }
        MoveKind::Rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Move {
    Rate { block: BlockId, rate: f64 },
    Split { block: BlockId, offset: usize, rate: f64 },
    Merge { left: BlockId, right: BlockId },
    Shift { left: BlockId, right: BlockId, delta: isize },
}

/// Intervals `[lo, hi)` that take `rate` if a move is accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Change {
    pub lo: usize,
    pub hi: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ProposalParams {
    pub prior_mean: f64,
    pub rate_step: f64,
    pub max_shift: usize,
}

impl Move {
    pub fn kind(&self) -> MoveKind {
        match self {
            Move::Rate { .. } => MoveKind::Rate,
            Move::Split { .. } => MoveKind::Split,
            Move::Merge { .. } => MoveKind::Merge,
            Move::Shift { .. } => MoveKind::Shift,
        }
    }

    /// Draws a move for the current map.
    pub fn propose(
        map: &BlockMap,
        rng: &mut fastrand::Rng,
        params: &ProposalParams,
    ) -> RhoResult<Move> {
        let blocks = map.len();
        let intervals = map.intervals();
        let ids = map.ids();

        Ok(match MoveKind::pick(rng, blocks, intervals) {
            MoveKind::Rate => {
                let block = ids[rng.usize(..blocks)];
                let current = map.get(block)?.rate;
                let rate = current * (params.rate_step * (2.0 * rng.f64() - 1.0)).exp();
                Move::Rate { block, rate }
            }
            MoveKind::Split => {
                // boundaries sit before intervals 1..intervals; draw until a free one
                let (block, offset) = loop {
                    let boundary = 1 + rng.usize(..intervals - 1);
                    let Some(block) = map.locate(boundary) else {
                        continue;
                    };
                    let offset = boundary - map.get(block)?.pos;
                    if offset > 0 {
                        break (block, offset);
                    }
                };
                Move::Split {
                    block,
                    offset,
                    rate: draw_exponential(rng, params.prior_mean),
                }
            }
            MoveKind::Merge => {
                let i = rng.usize(..blocks - 1);
                Move::Merge {
                    left: ids[i],
                    right: ids[i + 1],
                }
            }
            MoveKind::Shift => {
                let i = rng.usize(..blocks - 1);
                // Shifts past the region length always fail
                let magnitude = 1 + rng.usize(..params.max_shift.clamp(1, intervals)) as isize;
                let delta = if rng.bool() { magnitude } else { -magnitude };
                Move::Shift {
                    left: ids[i],
                    right: ids[i + 1],
                    delta,
                }
            }
        })
    }

    /// Interval range whose rate the move rewrites. `None` for a shift that
    /// would empty a block.
    pub fn change(&self, map: &BlockMap) -> RhoResult<Option<Change>> {
        Ok(match *self {
            Move::Rate { block, rate } => {
                let b = map.get(block)?;
                Some(Change {
                    lo: b.pos,
                    hi: b.end(),
                    rate,
                })
            }
            Move::Split {
                block,
                offset,
                rate,
            } => {
                let b = map.get(block)?;
                Some(Change {
                    lo: b.pos + offset,
                    hi: b.end(),
                    rate,
                })
            }
            Move::Merge { left, right } => {
                let (a, b) = (map.get(left)?, map.get(right)?);
                Some(Change {
                    lo: b.pos,
                    hi: b.end(),
                    rate: a.rate,
                })
            }
            Move::Shift { left, right, delta } => {
                let (a, b) = (map.get(left)?, map.get(right)?);
                if delta > 0 {
                    let d = delta as usize;
                    (d < b.size).then_some(Change {
                        lo: b.pos,
                        hi: b.pos + d,
                        rate: a.rate,
                    })
                } else {
                    let d = delta.unsigned_abs();
                    (d < a.size).then_some(Change {
                        lo: a.end() - d,
                        hi: a.end(),
                        rate: b.rate,
                    })
                }
            }
        })
    }

    /// Log of prior ratio times proposal ratio (everything but the
    /// likelihood) for moving from `map` to the proposed state.
    pub fn log_ratio(&self, map: &BlockMap, block_penalty: f64, prior_mean: f64) -> RhoResult<f64> {
        let k = map.len();
        let n = map.intervals();
        Ok(match *self {
            Move::Rate { block, rate } => {
                let old = map.get(block)?.rate;
                -(rate - old) / prior_mean + (rate / old).ln()
            }
            Move::Split { .. } => {
                let forward = MoveKind::Split.probability(k, n) / (n - k) as f64;
                let reverse = MoveKind::Merge.probability(k + 1, n) / k as f64;
                -block_penalty + (reverse / forward).ln()
            }
            Move::Merge { .. } => {
                let forward = MoveKind::Merge.probability(k, n) / (k - 1) as f64;
                let reverse = MoveKind::Split.probability(k - 1, n) / (n - k + 1) as f64;
                block_penalty + (reverse / forward).ln()
            }
            Move::Shift { .. } => 0.0,
        })
    }

    /// Applies the move to `map`.
    pub fn apply(&self, map: &mut BlockMap) -> RhoResult<()> {
        use crate::blocks::MergeRate;
        match *self {
            Move::Rate { block, rate } => map.set_rate(block, rate),
            Move::Split {
                block,
                offset,
                rate,
            } => map.split(block, offset, rate).map(|_| ()),
            Move::Merge { left, right } => map.merge(left, right, MergeRate::Left).map(|_| ()),
            Move::Shift { left, right, delta } => map.shift_boundary(left, right, delta),
        }
    }
}

/// Exponential draw with the given mean.
pub fn draw_exponential(rng: &mut fastrand::Rng, mean: f64) -> f64 {
    -mean * (1.0 - rng.f64()).ln()
}
