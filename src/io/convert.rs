use super::sites::{allele_counts, SitesFile};
use crate::error::{RhoError, RhoResult};
use crate::locs::Locs;
use crate::matrix::AlleleMatrix;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Site and sample filters applied when preparing an alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Keep only sites with exactly two alleles.
    pub only_biallelic: bool,
    /// Minor allele frequency a kept site must exceed.
    pub freqcut: f64,
    /// Largest missing-call frequency a kept site may have.
    pub missfreqcut: f64,
    /// Half-open column range to consider.
    pub sites: Option<(usize, usize)>,
    /// Sequences to keep, drawn at random.
    pub nout: Option<usize>,
    pub seed: Option<u64>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            only_biallelic: false,
            freqcut: 0.0,
            missfreqcut: 1.0,
            sites: None,
            nout: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub names: Vec<String>,
    pub matrix: AlleleMatrix,
    pub locs: Locs,
    /// Input columns that were kept, in order.
    pub kept_sites: Vec<usize>,
}

fn keep_site(counts: &[u32; 5], total: f64, options: &ConvertOptions) -> bool {
    let alleles: Vec<u32> = counts[1..].iter().copied().filter(|&c| c > 0).collect();
    let distinct = alleles.len();
    let minor = alleles.iter().copied().min().unwrap_or(0) as f64;
    let missing_ok = counts[0] as f64 <= total * options.missfreqcut;

    let allele_ok = if options.only_biallelic || options.freqcut > 0.0 {
        distinct == 2 && minor > total * options.freqcut
    } else {
        distinct > 1
    };
    allele_ok && missing_ok
}

/// Selects the segregating sites that pass the filters and a random subset
/// of sequences.
pub fn convert(input: &SitesFile, locs: &Locs, options: &ConvertOptions) -> RhoResult<Converted> {
    let matrix = &input.matrix;
    let nsites = matrix.nsites();
    if locs.len() != nsites {
        return Err(RhoError::Validation(format!(
            "Locations list {} sites, alignment has {}",
            locs.len(),
            nsites
        )));
    }
    let (lower, upper) = options.sites.unwrap_or((0, nsites));
    let upper = upper.min(nsites);
    let total = matrix.haplotypes() as f64;

    let kept_sites: Vec<usize> = (lower..upper)
        .filter(|&s| keep_site(&allele_counts(matrix, s), total, options))
        .collect();
    if kept_sites.is_empty() {
        return Err(RhoError::Validation("No sites pass the filters".to_string()));
    }

    let nseq = matrix.nseq();
    let nout = options.nout.unwrap_or(nseq).min(nseq);
    let mut rng = match options.seed {
        Some(s) => fastrand::Rng::with_seed(s),
        None => fastrand::Rng::new(),
    };
    let mut chosen: Vec<usize> = (0..nseq).collect();
    rng.shuffle(&mut chosen);
    chosen.truncate(nout);
    chosen.sort_unstable();

    let rows: Vec<Vec<u8>> = chosen
        .iter()
        .map(|&seq| kept_sites.iter().map(|&s| matrix.get(seq, s)).collect())
        .collect();
    let names = chosen.iter().map(|&seq| input.names[seq].clone()).collect();
    let out_matrix = AlleleMatrix::from_rows(&rows, matrix.ploidy())?;

    let positions: Vec<f64> = kept_sites.iter().map(|&s| locs.positions[s]).collect();
    let length = locs.positions.last().copied().unwrap_or(locs.length);
    let out_locs = Locs::new(positions, length, locs.model)?;

    info!(
        "Kept {} of {} sites and {} of {} sequences",
        kept_sites.len(),
        nsites,
        nout,
        nseq
    );

    Ok(Converted {
        names,
        matrix: out_matrix,
        locs: out_locs,
        kept_sites,
    })
}
