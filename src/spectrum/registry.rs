use super::config::PairConfig;
use crate::error::RhoResult;
use crate::matrix::Ploidy;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

pub type TypeId = usize;

/// One canonical pairwise configuration and what has been learned about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteType {
    pub config: PairConfig,
    pub count: u64,
    pub ld_stats: [f64; 3],
    pub missing: bool,
    pub max_loglik: Option<f64>,
    pub rate_at_max: Option<f64>,
    pub min_recombinations: u8,
}

impl SiteType {
    fn new(config: PairConfig, ploidy: Ploidy, count: u64) -> Self {
        Self {
            missing: config.has_missing(),
            ld_stats: config.ld_stats(ploidy),
            min_recombinations: config.min_recombinations(ploidy),
            config,
            count,
            max_loglik: None,
            rate_at_max: None,
        }
    }
}

/// Deduplicating store of site types, iterated in insertion order.
#[derive(Debug, Clone)]
pub struct SiteTypeRegistry {
    nseq: usize,
    ploidy: Ploidy,
    types: Vec<SiteType>,
    index: FnvHashMap<PairConfig, TypeId>,
}

impl SiteTypeRegistry {
    pub fn new(nseq: usize, ploidy: Ploidy) -> Self {
        Self {
            nseq,
            ploidy,
            types: Vec::new(),
            index: FnvHashMap::default(),
        }
    }

    pub fn with_capacity(nseq: usize, ploidy: Ploidy, capacity: usize) -> Self {
        let mut registry = Self::new(nseq, ploidy);
        registry.types.reserve(capacity);
        registry.index.reserve(capacity);
        registry
    }

    pub fn nseq(&self) -> usize {
        self.nseq
    }

    pub fn ploidy(&self) -> Ploidy {
        self.ploidy
    }

    /// Canonicalizes `config` and records one more observation of its type.
    /// A malformed table is rejected before anything is touched.
    pub fn classify(&mut self, config: &PairConfig) -> RhoResult<TypeId> {
        self.record(config, 1)
    }

    /// Registers a type without counting an observation.
    pub fn seed(&mut self, config: &PairConfig) -> RhoResult<TypeId> {
        self.record(config, 0)
    }

    fn record(&mut self, config: &PairConfig, count: u64) -> RhoResult<TypeId> {
        config.validate(self.nseq, self.ploidy)?;
        let canonical = config.canonical();
        Ok(self.insert_canonical(canonical, count))
    }

    fn insert_canonical(&mut self, canonical: PairConfig, count: u64) -> TypeId {
        if let Some(&id) = self.index.get(&canonical) {
            let entry = &mut self.types[id];
            entry.count += count;
            entry.missing |= canonical.has_missing();
            return id;
        }
        let id = self.types.len();
        self.types.push(SiteType::new(canonical, self.ploidy, count));
        self.index.insert(canonical, id);
        id
    }

    /// Folds `other` into this registry, visiting its types in insertion
    /// order. Returns the id each of `other`'s types received here.
    pub fn merge(&mut self, other: &SiteTypeRegistry) -> Vec<TypeId> {
        other
            .types
            .iter()
            .map(|t| self.insert_canonical(t.config, t.count))
            .collect()
    }

    pub fn lookup(&self, config: &PairConfig) -> Option<TypeId> {
        self.index.get(&config.canonical()).copied()
    }

    pub fn get(&self, id: TypeId) -> Option<&SiteType> {
        self.types.get(id)
    }

    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut SiteType> {
        self.types.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteType> {
        self.types.iter()
    }

    pub fn types(&self) -> &[SiteType] {
        &self.types
    }

    /// Number of observed pairs across all types.
    pub fn total_pairs(&self) -> u64 {
        self.types.iter().map(|t| t.count).sum()
    }

    /// Types that have no observations (seeded only).
    pub fn zero_count(&self) -> usize {
        self.types.iter().filter(|t| t.count == 0).count()
    }
}
