use crate::error::{RhoError, RhoResult};
use crate::matrix::Ploidy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pair state of the heterozygote (diploid data only).
pub const HET: usize = 2;
/// Pair state of a missing call.
pub const MISS: usize = 3;

const KEEP: [usize; 4] = [0, 1, 2, 3];
const SWAP: [usize; 4] = [1, 0, 2, 3];

/// Flattened 4x4 contingency table of pair states, indexed
/// `state_a * 4 + state_b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairConfig(pub [u32; 16]);

impl PairConfig {
    pub fn zero() -> Self {
        Self([0; 16])
    }

    #[inline(always)]
    pub fn cell(&self, a: usize, b: usize) -> u32 {
        self.0[a * 4 + b]
    }

    #[inline(always)]
    pub fn add(&mut self, a: usize, b: usize) {
        self.0[a * 4 + b] += 1;
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Rows with a missing call at either site.
    pub fn missing_rows(&self) -> u32 {
        (0..4)
            .map(|k| self.cell(MISS, k) + self.cell(k, MISS))
            .sum::<u32>()
            - self.cell(MISS, MISS)
    }

    pub fn has_missing(&self) -> bool {
        self.missing_rows() > 0
    }

    /// Copy with every row that has a missing call dropped.
    pub fn complete_part(&self) -> PairConfig {
        let mut out = *self;
        for k in 0..4 {
            out.0[MISS * 4 + k] = 0;
            out.0[k * 4 + MISS] = 0;
        }
        out
    }

    /// Checks the table against the declared sample size and ploidy.
    pub fn validate(&self, nseq: usize, ploidy: Ploidy) -> RhoResult<()> {
        let total = self.total() as usize;
        if total != nseq {
            return Err(RhoError::InvalidConfiguration(format!(
                "{} sums to {}, expected {} sequences",
                self, total, nseq
            )));
        }
        if ploidy == Ploidy::Haploid {
            let het_cells: u32 = (0..4).map(|k| self.cell(HET, k) + self.cell(k, HET)).sum();
            if het_cells > 0 {
                return Err(RhoError::InvalidConfiguration(format!(
                    "{} has heterozygote cells in haploid data",
                    self
                )));
            }
        }
        Ok(())
    }

    fn transformed(&self, perm_a: &[usize; 4], perm_b: &[usize; 4], transpose: bool) -> [u32; 16] {
        let mut out = [0u32; 16];
        for a in 0..4 {
            for b in 0..4 {
                let (na, nb) = (perm_a[a], perm_b[b]);
                let idx = if transpose { nb * 4 + na } else { na * 4 + nb };
                out[idx] = self.0[a * 4 + b];
            }
        }
        out
    }

    /// Every image of the table under allele relabeling at either site and
    /// exchange of the two sites.
    pub fn orbit(&self) -> [[u32; 16]; 8] {
        let mut out = [[0u32; 16]; 8];
        let mut i = 0;
        for perm_a in [&KEEP, &SWAP] {
            for perm_b in [&KEEP, &SWAP] {
                for transpose in [false, true] {
                    out[i] = self.transformed(perm_a, perm_b, transpose);
                    i += 1;
                }
            }
        }
        out
    }

    /// Number of distinct tables equivalent to this one.
    pub fn orbit_size(&self) -> usize {
        let mut images = self.orbit().to_vec();
        images.sort_unstable();
        images.dedup();
        images.len()
    }

    /// Lexicographically smallest equivalent table.
    pub fn canonical(&self) -> PairConfig {
        let best = self
            .orbit()
            .into_iter()
            .min()
            .unwrap_or(self.0);
        PairConfig(best)
    }

    pub fn is_canonical(&self) -> bool {
        self.canonical() == *self
    }

    /// Minimum number of recombination events (0 or 1) from the
    /// four-gamete test over rows without missing calls.
    pub fn min_recombinations(&self, ploidy: Ploidy) -> u8 {
        let mut seen = [[false; 2]; 2];
        match ploidy {
            Ploidy::Haploid => {
                for (a, row) in seen.iter_mut().enumerate() {
                    for (b, cell) in row.iter_mut().enumerate() {
                        *cell = self.cell(a, b) > 0;
                    }
                }
            }
            Ploidy::Diploid => {
                for a in 0..3 {
                    for b in 0..3 {
                        if self.cell(a, b) == 0 {
                            continue;
                        }
                        match (a == HET, b == HET) {
                            (false, false) => seen[a][b] = true,
                            (false, true) => {
                                seen[a][0] = true;
                                seen[a][1] = true;
                            }
                            (true, false) => {
                                seen[0][b] = true;
                                seen[1][b] = true;
                            }
                            (true, true) => {}
                        }
                    }
                }
            }
        }
        u8::from(seen.iter().flatten().all(|&s| s))
    }

    /// Linkage disequilibrium `[r2, D, D']` from the complete rows.
    /// Undefined statistics are `NaN`.
    pub fn ld_stats(&self, ploidy: Ploidy) -> [f64; 3] {
        match ploidy {
            Ploidy::Haploid => self.haplotype_ld(),
            Ploidy::Diploid => self.genotype_ld(),
        }
    }

    fn haplotype_ld(&self) -> [f64; 3] {
        let n: f64 = (0..2)
            .flat_map(|a| (0..2).map(move |b| (a, b)))
            .map(|(a, b)| self.cell(a, b) as f64)
            .sum();
        if n == 0.0 {
            return [f64::NAN; 3];
        }
        let p11 = self.cell(1, 1) as f64 / n;
        let pa = (self.cell(1, 0) + self.cell(1, 1)) as f64 / n;
        let pb = (self.cell(0, 1) + self.cell(1, 1)) as f64 / n;
        ld_from_frequencies(p11 - pa * pb, pa, pb)
    }

    fn genotype_ld(&self) -> [f64; 3] {
        // allele dosage of the second allele per genotype state
        const DOSE: [f64; 3] = [0.0, 2.0, 1.0];
        let mut n = 0.0;
        let (mut sx, mut sy, mut sxy) = (0.0, 0.0, 0.0);
        for a in 0..3 {
            for b in 0..3 {
                let c = self.cell(a, b) as f64;
                n += c;
                sx += c * DOSE[a];
                sy += c * DOSE[b];
                sxy += c * DOSE[a] * DOSE[b];
            }
        }
        if n == 0.0 {
            return [f64::NAN; 3];
        }
        let cov = sxy / n - (sx / n) * (sy / n);
        ld_from_frequencies(cov / 2.0, sx / (2.0 * n), sy / (2.0 * n))
    }
}

fn ld_from_frequencies(d: f64, pa: f64, pb: f64) -> [f64; 3] {
    let denom = pa * (1.0 - pa) * pb * (1.0 - pb);
    if denom <= 0.0 {
        return [f64::NAN, d, f64::NAN];
    }
    let r2 = d * d / denom;
    let dmax = if d < 0.0 {
        (pa * pb).min((1.0 - pa) * (1.0 - pb))
    } else {
        (pa * (1.0 - pb)).min((1.0 - pa) * pb)
    };
    let dprime = if dmax > 0.0 { d / dmax } else { f64::NAN };
    [r2, d, dprime]
}

impl fmt::Display for PairConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", cells.join(" "))
    }
}
