pub mod config;
pub mod registry;

pub use self::config::PairConfig;
pub use self::registry::{SiteType, SiteTypeRegistry, TypeId};

use crate::config::SpectrumParams;
use crate::error::{RhoError, RhoResult};
use crate::matrix::{AlleleMatrix, MISSING};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Position metadata for one classified pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRecord {
    pub left: usize,
    pub right: usize,
    pub type_id: TypeId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectrumStats {
    pub pairs_in_window: u64,
    pub classified: u64,
    pub skipped_sites: u64,
    pub skipped_invalid: u64,
    /// Classified pairs without a single complete row.
    pub degenerate: u64,
    pub cancelled: bool,
}

impl SpectrumStats {
    fn absorb(&mut self, other: &SpectrumStats) {
        self.pairs_in_window += other.pairs_in_window;
        self.classified += other.classified;
        self.skipped_sites += other.skipped_sites;
        self.skipped_invalid += other.skipped_invalid;
        self.degenerate += other.degenerate;
        self.cancelled |= other.cancelled;
    }
}

/// Site types with counts plus the scan-ordered pair index.
#[derive(Debug, Clone)]
pub struct PairSpectrum {
    pub registry: SiteTypeRegistry,
    pub pairs: Vec<PairRecord>,
    pub stats: SpectrumStats,
    pub window: usize,
}

impl PairSpectrum {
    /// Combines two spectra over the same sample. Pair records of `other`
    /// are remapped onto the merged type ids.
    pub fn union(&self, other: &PairSpectrum) -> RhoResult<PairSpectrum> {
        if self.registry.nseq() != other.registry.nseq()
            || self.registry.ploidy() != other.registry.ploidy()
        {
            return Err(RhoError::Validation(
                "Cannot combine spectra from different samples".to_string(),
            ));
        }
        let mut registry = self.registry.clone();
        let remap = registry.merge(&other.registry);
        let mut pairs = self.pairs.clone();
        pairs.extend(other.pairs.iter().map(|p| PairRecord {
            type_id: remap[p.type_id],
            ..*p
        }));
        let mut stats = self.stats;
        stats.absorb(&other.stats);
        Ok(PairSpectrum {
            registry,
            pairs,
            stats,
            window: self.window.max(other.window),
        })
    }
}

/// Contingency table of two columns after mapping codes to pair states.
pub fn pair_config(matrix: &AlleleMatrix, map_a: &[u8; 4], map_b: &[u8; 4], a: usize, b: usize) -> PairConfig {
    let mut config = PairConfig::zero();
    for seq in 0..matrix.nseq() {
        let ca = matrix.get(seq, a);
        let cb = matrix.get(seq, b);
        let sa = if ca == MISSING { 3 } else { map_a[ca as usize] };
        let sb = if cb == MISSING { 3 } else { map_b[cb as usize] };
        config.add(sa as usize, sb as usize);
    }
    config
}

struct Chunk {
    registry: SiteTypeRegistry,
    pairs: Vec<PairRecord>,
    stats: SpectrumStats,
}

fn scan_chunk(
    matrix: &AlleleMatrix,
    maps: &[Option<[u8; 4]>],
    lefts: std::ops::Range<usize>,
    params: &SpectrumParams,
    cancel: &AtomicBool,
) -> RhoResult<Chunk> {
    let nsites = matrix.nsites();
    let mut chunk = Chunk {
        registry: SiteTypeRegistry::new(matrix.nseq(), matrix.ploidy()),
        pairs: Vec::new(),
        stats: SpectrumStats::default(),
    };

    for left in lefts {
        if cancel.load(Ordering::Relaxed) {
            chunk.stats.cancelled = true;
            break;
        }
        let end = (left + params.window).min(nsites - 1);
        for right in (left + 1)..=end {
            chunk.stats.pairs_in_window += 1;
            let (Some(map_a), Some(map_b)) = (&maps[left], &maps[right]) else {
                chunk.stats.skipped_sites += 1;
                continue;
            };
            let config = pair_config(matrix, map_a, map_b, left, right);
            match chunk.registry.classify(&config) {
                Ok(type_id) => {
                    chunk.stats.classified += 1;
                    if config.complete_part().total() == 0 {
                        chunk.stats.degenerate += 1;
                    }
                    chunk.pairs.push(PairRecord {
                        left,
                        right,
                        type_id,
                    });
                }
                Err(e) if params.strict_pairs => {
                    cancel.store(true, Ordering::Relaxed);
                    return Err(e);
                }
                Err(e) => {
                    debug!("Skipping pair ({}, {}): {}", left, right, e);
                    chunk.stats.skipped_invalid += 1;
                }
            }
        }
    }
    Ok(chunk)
}

/// Classifies every pair of biallelic sites at most `window` columns apart.
pub fn build(matrix: &AlleleMatrix, params: &SpectrumParams) -> RhoResult<PairSpectrum> {
    build_cancellable(matrix, params, &AtomicBool::new(false))
}

/// As [`build`], stopping early once `cancel` is raised. Pairs classified
/// before the stop are kept.
pub fn build_cancellable(
    matrix: &AlleleMatrix,
    params: &SpectrumParams,
    cancel: &AtomicBool,
) -> RhoResult<PairSpectrum> {
    if params.window == 0 {
        return Err(RhoError::Config("Window width must be at least 1".to_string()));
    }
    let nsites = matrix.nsites();
    let maps: Vec<Option<[u8; 4]>> = (0..nsites).map(|s| matrix.state_map(s)).collect();
    let usable = maps.iter().filter(|m| m.is_some()).count();
    info!(
        "Scanning {} sites ({} biallelic) with window {}",
        nsites, usable, params.window
    );

    let lefts = nsites.saturating_sub(1);
    let chunk_size = (lefts / (rayon::current_num_threads() * 4)).max(1);
    let ranges: Vec<std::ops::Range<usize>> = (0..lefts)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(lefts))
        .collect();

    let chunks: Vec<RhoResult<Chunk>> = ranges
        .into_par_iter()
        .map(|range| scan_chunk(matrix, &maps, range, params, cancel))
        .collect();

    let mut registry = SiteTypeRegistry::new(matrix.nseq(), matrix.ploidy());
    let mut pairs = Vec::new();
    let mut stats = SpectrumStats::default();
    for chunk in chunks {
        let chunk = chunk?;
        let remap = registry.merge(&chunk.registry);
        pairs.extend(chunk.pairs.into_iter().map(|p| PairRecord {
            type_id: remap[p.type_id],
            ..p
        }));
        stats.absorb(&chunk.stats);
    }

    if stats.skipped_invalid > 0 {
        warn!("{} pairs could not be classified", stats.skipped_invalid);
    }
    if stats.cancelled {
        warn!("Pair scan cancelled after {} pairs", stats.classified);
    }
    info!(
        "Classified {} pairs into {} types ({} degenerate)",
        stats.classified,
        registry.len(),
        stats.degenerate
    );

    Ok(PairSpectrum {
        registry,
        pairs,
        stats,
        window: params.window,
    })
}
