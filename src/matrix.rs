use crate::error::{RhoError, RhoResult};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Reserved code for a missing call.
pub const MISSING: u8 = u8::MAX;

/// Largest number of sequences kept for analysis.
pub const SEQ_MAX: usize = 1000;

/// Number of chromosome sets carried by each row of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Ploidy {
    #[strum(serialize = "1")]
    Haploid,
    #[strum(serialize = "2")]
    Diploid,
}

impl Ploidy {
    /// Number of haplotypes per row.
    pub fn copies(self) -> usize {
        match self {
            Ploidy::Haploid => 1,
            Ploidy::Diploid => 2,
        }
    }

    /// Largest valid (non-missing) code for this ploidy.
    pub fn max_code(self) -> u8 {
        match self {
            // T/C/A/G style allele indices
            Ploidy::Haploid => 3,
            // hom first, hom second, het
            Ploidy::Diploid => 2,
        }
    }
}

/// Per-site tallies of the codes found in one column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCounts {
    pub codes: [u32; 4],
    pub missing: u32,
}

impl SiteCounts {
    pub fn distinct(&self) -> usize {
        self.codes.iter().filter(|&&c| c > 0).count()
    }

    pub fn observed(&self) -> u32 {
        self.codes.iter().sum()
    }
}

/// Integer-coded sequence-by-site grid. Rows are sequences (or individuals
/// for diploid data), columns are segregating sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlleleMatrix {
    nseq: usize,
    nsites: usize,
    ploidy: Ploidy,
    data: Vec<u8>,
}

impl AlleleMatrix {
    pub fn new(nseq: usize, nsites: usize, ploidy: Ploidy, data: Vec<u8>) -> RhoResult<Self> {
        if data.len() != nseq * nsites {
            return Err(RhoError::Validation(format!(
                "Matrix holds {} calls, expected {} x {}",
                data.len(),
                nseq,
                nsites
            )));
        }
        let max = ploidy.max_code();
        if let Some(pos) = data.iter().position(|&c| c != MISSING && c > max) {
            return Err(RhoError::Validation(format!(
                "Code {} at sequence {}, site {} is not valid for ploidy {}",
                data[pos],
                pos / nsites.max(1),
                pos % nsites.max(1),
                ploidy
            )));
        }
        Ok(Self {
            nseq,
            nsites,
            ploidy,
            data,
        })
    }

    /// Builds a matrix from per-sequence rows.
    pub fn from_rows(rows: &[Vec<u8>], ploidy: Ploidy) -> RhoResult<Self> {
        let nseq = rows.len();
        let nsites = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != nsites) {
            return Err(RhoError::Validation(format!(
                "Sequence {} has {} sites, expected {}",
                bad,
                rows[bad].len(),
                nsites
            )));
        }
        let data = rows.iter().flatten().copied().collect();
        Self::new(nseq, nsites, ploidy, data)
    }

    pub fn nseq(&self) -> usize {
        self.nseq
    }

    pub fn nsites(&self) -> usize {
        self.nsites
    }

    pub fn ploidy(&self) -> Ploidy {
        self.ploidy
    }

    /// Number of haplotypes represented by the rows.
    pub fn haplotypes(&self) -> usize {
        self.nseq * self.ploidy.copies()
    }

    #[inline(always)]
    pub fn get(&self, seq: usize, site: usize) -> u8 {
        self.data[seq * self.nsites + site]
    }

    pub fn row(&self, seq: usize) -> &[u8] {
        &self.data[seq * self.nsites..(seq + 1) * self.nsites]
    }

    pub fn column(&self, site: usize) -> impl Iterator<Item = u8> + '_ {
        (0..self.nseq).map(move |s| self.get(s, site))
    }

    pub fn site_counts(&self, site: usize) -> SiteCounts {
        let mut counts = SiteCounts::default();
        for code in self.column(site) {
            if code == MISSING {
                counts.missing += 1;
            } else {
                counts.codes[code as usize] += 1;
            }
        }
        counts
    }

    /// Maps every code of a biallelic segregating site to a pair state
    /// (0 or 1 for the two alleles, 2 for heterozygotes, 3 for missing).
    /// Returns `None` when the site is monomorphic or multi-allelic among
    /// observed calls.
    pub fn state_map(&self, site: usize) -> Option<[u8; 4]> {
        let counts = self.site_counts(site);
        match self.ploidy {
            Ploidy::Haploid => {
                if counts.distinct() != 2 {
                    return None;
                }
                let mut map = [3u8; 4];
                let mut next = 0u8;
                for (code, &n) in counts.codes.iter().enumerate() {
                    if n > 0 {
                        map[code] = next;
                        next += 1;
                    }
                }
                Some(map)
            }
            Ploidy::Diploid => {
                let [hom_a, hom_b, het, _] = counts.codes;
                let segregating = het > 0 || (hom_a > 0 && hom_b > 0);
                segregating.then_some([0, 1, 2, 3])
            }
        }
    }

    /// Keeps the first `max` rows.
    pub fn truncate_sequences(&mut self, max: usize) {
        if max < self.nseq {
            self.nseq = max;
            self.data.truncate(max * self.nsites);
        }
    }
}
