use crate::error::{RhoError, RhoResult};
use serde::{Deserialize, Serialize};

pub type BlockId = usize;

/// One run of intervals sharing a rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub pos: usize,
    pub size: usize,
    pub rate: f64,
    pub left: Option<BlockId>,
    pub right: Option<BlockId>,
}

impl Block {
    /// One past the last interval covered.
    pub fn end(&self) -> usize {
        self.pos + self.size
    }
}

/// Rate given to the block left by a merge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MergeRate {
    LengthWeighted,
    Left,
    Right,
    Fixed(f64),
}

/// `(pos, size, rate)` of one block, in map order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockTriple {
    pub pos: usize,
    pub size: usize,
    pub rate: f64,
}

/// Ordered partition of `[0, intervals)` into constant-rate blocks.
///
/// Blocks live in an arena and link to their neighbours by index. Ids of
/// removed blocks go on a free list and are reused by later splits, so an
/// id stays valid only while its block is alive.
#[derive(Debug, Clone)]
pub struct BlockMap {
    slots: Vec<Option<Block>>,
    free: Vec<BlockId>,
    head: BlockId,
    intervals: usize,
    len: usize,
}

impl BlockMap {
    /// A single block over `intervals` intervals.
    pub fn single(intervals: usize, rate: f64) -> RhoResult<Self> {
        if intervals == 0 {
            return Err(RhoError::Validation(
                "Block map needs at least one interval".to_string(),
            ));
        }
        Ok(Self {
            slots: vec![Some(Block {
                pos: 0,
                size: intervals,
                rate,
                left: None,
                right: None,
            })],
            free: Vec::new(),
            head: 0,
            intervals,
            len: 1,
        })
    }

    /// One block per interval, with the given rates.
    pub fn per_interval(rates: &[f64]) -> RhoResult<Self> {
        let n = rates.len();
        if n == 0 {
            return Err(RhoError::Validation(
                "Block map needs at least one interval".to_string(),
            ));
        }
        let slots = rates
            .iter()
            .enumerate()
            .map(|(i, &rate)| {
                Some(Block {
                    pos: i,
                    size: 1,
                    rate,
                    left: i.checked_sub(1),
                    right: (i + 1 < n).then_some(i + 1),
                })
            })
            .collect();
        Ok(Self {
            slots,
            free: Vec::new(),
            head: 0,
            intervals: n,
            len: n,
        })
    }

    /// Blocks built from consecutive `(size, rate)` runs.
    pub fn from_runs(runs: &[(usize, f64)]) -> RhoResult<Self> {
        let Some((&(first_size, first_rate), rest)) = runs.split_first() else {
            return Err(RhoError::Validation(
                "Block map needs at least one block".to_string(),
            ));
        };
        if runs.iter().any(|&(size, _)| size == 0) {
            return Err(RhoError::Validation("Block sizes must be positive".to_string()));
        }
        let total: usize = runs.iter().map(|(s, _)| s).sum();
        let mut map = Self::single(total, first_rate)?;
        let mut current = map.head;
        let mut offset = first_size;
        for &(size, rate) in rest {
            current = map.split(current, offset, rate)?;
            offset = size;
        }
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn intervals(&self) -> usize {
        self.intervals
    }

    pub fn head(&self) -> BlockId {
        self.head
    }

    pub fn get(&self, id: BlockId) -> RhoResult<&Block> {
        self.slots
            .get(id)
            .and_then(|s| s.as_ref())
            .ok_or(RhoError::UnknownBlock(id))
    }

    fn get_mut(&mut self, id: BlockId) -> RhoResult<&mut Block> {
        self.slots
            .get_mut(id)
            .and_then(|s| s.as_mut())
            .ok_or(RhoError::UnknownBlock(id))
    }

    /// Live blocks from left to right.
    pub fn iter(&self) -> BlockIter<'_> {
        BlockIter {
            map: self,
            next: Some(self.head),
        }
    }

    pub fn ids(&self) -> Vec<BlockId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Block covering `interval`.
    pub fn locate(&self, interval: usize) -> Option<BlockId> {
        if interval >= self.intervals {
            return None;
        }
        self.iter()
            .find(|(_, b)| interval < b.end())
            .map(|(id, _)| id)
    }

    pub fn interval_rates(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.intervals);
        for (_, b) in self.iter() {
            out.extend(std::iter::repeat(b.rate).take(b.size));
        }
        out
    }

    pub fn triples(&self) -> Vec<BlockTriple> {
        self.iter()
            .map(|(_, b)| BlockTriple {
                pos: b.pos,
                size: b.size,
                rate: b.rate,
            })
            .collect()
    }

    /// Cuts `block` after `offset` intervals. The left part keeps the id and
    /// rate; the returned right part gets `right_rate`.
    pub fn split(&mut self, block: BlockId, offset: usize, right_rate: f64) -> RhoResult<BlockId> {
        let b = *self.get(block)?;
        if offset == 0 || offset >= b.size {
            return Err(RhoError::InvalidOffset {
                offset,
                size: b.size,
            });
        }
        let new = Block {
            pos: b.pos + offset,
            size: b.size - offset,
            rate: right_rate,
            left: Some(block),
            right: b.right,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(new);
                id
            }
            None => {
                self.slots.push(Some(new));
                self.slots.len() - 1
            }
        };
        if let Some(r) = b.right {
            self.get_mut(r)?.left = Some(id);
        }
        let left = self.get_mut(block)?;
        left.size = offset;
        left.right = Some(id);
        self.len += 1;
        Ok(id)
    }

    fn check_adjacent(&self, a: BlockId, b: BlockId) -> RhoResult<(Block, Block)> {
        let ba = *self.get(a)?;
        let bb = *self.get(b)?;
        if ba.right != Some(b) || bb.left != Some(a) {
            return Err(RhoError::NotAdjacent { left: a, right: b });
        }
        Ok((ba, bb))
    }

    /// Joins `a` with its right neighbour `b`. `a` survives and `b`'s id is
    /// released.
    pub fn merge(&mut self, a: BlockId, b: BlockId, policy: MergeRate) -> RhoResult<BlockId> {
        let (ba, bb) = self.check_adjacent(a, b)?;
        let rate = match policy {
            MergeRate::LengthWeighted => {
                (ba.rate * ba.size as f64 + bb.rate * bb.size as f64)
                    / (ba.size + bb.size) as f64
            }
            MergeRate::Left => ba.rate,
            MergeRate::Right => bb.rate,
            MergeRate::Fixed(r) => r,
        };
        if let Some(r) = bb.right {
            self.get_mut(r)?.left = Some(a);
        }
        let merged = self.get_mut(a)?;
        merged.size += bb.size;
        merged.rate = rate;
        merged.right = bb.right;
        self.slots[b] = None;
        self.free.push(b);
        self.len -= 1;
        Ok(a)
    }

    /// Moves the boundary between adjacent `a` and `b` right by `delta`
    /// intervals (left when negative).
    pub fn shift_boundary(&mut self, a: BlockId, b: BlockId, delta: isize) -> RhoResult<()> {
        let (ba, bb) = self.check_adjacent(a, b)?;
        let sizes = (ba.size as isize)
            .checked_add(delta)
            .zip((bb.size as isize).checked_sub(delta));
        let (left_size, right_size) = match sizes {
            Some((l, r)) if l >= 1 && r >= 1 => (l, r),
            _ => {
                return Err(RhoError::BoundaryOverflow {
                    delta,
                    left_size: (ba.size as isize).saturating_add(delta),
                    right_size: (bb.size as isize).saturating_sub(delta),
                })
            }
        };
        self.get_mut(a)?.size = left_size as usize;
        let right = self.get_mut(b)?;
        right.size = right_size as usize;
        right.pos = ba.pos + left_size as usize;
        Ok(())
    }

    pub fn set_rate(&mut self, block: BlockId, rate: f64) -> RhoResult<()> {
        self.get_mut(block)?.rate = rate;
        Ok(())
    }

    /// Checks coverage, ordering and link consistency.
    pub fn validate(&self) -> RhoResult<()> {
        let mut expected_pos = 0;
        let mut prev: Option<BlockId> = None;
        let mut seen = 0;
        for (id, b) in self.iter() {
            if b.left != prev {
                return Err(RhoError::Validation(format!(
                    "Block {} links left to {:?}, expected {:?}",
                    id, b.left, prev
                )));
            }
            if b.pos != expected_pos || b.size == 0 {
                return Err(RhoError::Validation(format!(
                    "Block {} covers [{}, {}), expected to start at {}",
                    id,
                    b.pos,
                    b.end(),
                    expected_pos
                )));
            }
            expected_pos = b.end();
            prev = Some(id);
            seen += 1;
            if seen > self.slots.len() {
                return Err(RhoError::Validation("Block links form a cycle".to_string()));
            }
        }
        if expected_pos != self.intervals {
            return Err(RhoError::Validation(format!(
                "Blocks cover {} of {} intervals",
                expected_pos, self.intervals
            )));
        }
        if seen != self.len {
            return Err(RhoError::Validation(format!(
                "{} blocks reachable, {} recorded",
                seen, self.len
            )));
        }
        Ok(())
    }
}

pub struct BlockIter<'a> {
    map: &'a BlockMap,
    next: Option<BlockId>,
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = (BlockId, &'a Block);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let block = self.map.slots.get(id)?.as_ref()?;
        self.next = block.right;
        Some((id, block))
    }
}
