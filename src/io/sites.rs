use crate::error::{RhoError, RhoResult};
use crate::matrix::{AlleleMatrix, Ploidy, MISSING, SEQ_MAX};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::warn;

/// Characters written per sequence line.
const LINE_WIDTH: usize = 50;

/// Named sequences of a sites file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitesFile {
    pub names: Vec<String>,
    pub matrix: AlleleMatrix,
}

fn haploid_code(c: u8) -> u8 {
    match c {
        b'0' | b'T' | b't' => 0,
        b'1' | b'C' | b'c' => 1,
        b'2' | b'A' | b'a' => 2,
        b'3' | b'G' | b'g' => 3,
        _ => MISSING,
    }
}

fn diploid_code(c: u8) -> u8 {
    match c {
        b'0' => 0,
        b'1' => 1,
        b'2' => 2,
        _ => MISSING,
    }
}

fn parse_header(line: &str) -> RhoResult<(usize, usize, Ploidy)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(RhoError::Parse {
            line: 1,
            message: format!("Expected 'nseq nsites ploidy', found '{}'", line.trim()),
        });
    }
    let number = |s: &str, what: &str| {
        s.parse::<usize>().map_err(|_| RhoError::Parse {
            line: 1,
            message: format!("Invalid {} '{}'", what, s),
        })
    };
    let ploidy = fields[2].parse::<Ploidy>().map_err(|_| RhoError::Parse {
        line: 1,
        message: format!("Ploidy must be 1 or 2, found '{}'", fields[2]),
    })?;
    Ok((number(fields[0], "sequence count")?, number(fields[1], "site count")?, ploidy))
}

/// Reads the `nseq nsites ploidy` header and FASTA-style records. Calls
/// other than the allele codes (`?`, `N`, `-`, ...) are missing. Samples
/// beyond the sequence cap are dropped with a warning.
pub fn parse_sites(reader: impl BufRead) -> RhoResult<SitesFile> {
    let mut lines = reader.lines().enumerate();
    let (nseq, nsites, ploidy) = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break parse_header(&line)?;
                }
            }
            None => {
                return Err(RhoError::Parse {
                    line: 1,
                    message: "Empty sites file".to_string(),
                })
            }
        }
    };
    let code: fn(u8) -> u8 = match ploidy {
        Ploidy::Haploid => haploid_code,
        Ploidy::Diploid => diploid_code,
    };

    let mut names: Vec<String> = Vec::with_capacity(nseq);
    let mut rows: Vec<Vec<u8>> = Vec::with_capacity(nseq);
    for (idx, line) in lines {
        let line = line?;
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix('>') {
            names.push(name.trim().to_string());
            rows.push(Vec::with_capacity(nsites));
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        let Some(row) = rows.last_mut() else {
            return Err(RhoError::Parse {
                line: idx + 1,
                message: "Sequence data before the first '>' record".to_string(),
            });
        };
        row.extend(trimmed.bytes().filter(|b| !b.is_ascii_whitespace()).map(code));
    }

    if rows.len() != nseq {
        return Err(RhoError::Validation(format!(
            "Header declares {} sequences, file holds {}",
            nseq,
            rows.len()
        )));
    }
    if let Some(bad) = rows.iter().position(|r| r.len() != nsites) {
        return Err(RhoError::Validation(format!(
            "Sequence '{}' has {} sites, header declares {}",
            names[bad],
            rows[bad].len(),
            nsites
        )));
    }

    let mut matrix = AlleleMatrix::from_rows(&rows, ploidy)?;
    if nseq > SEQ_MAX {
        warn!(
            "More than {} sequences: using the first {} for analysis",
            SEQ_MAX, SEQ_MAX
        );
        matrix.truncate_sequences(SEQ_MAX);
        names.truncate(SEQ_MAX);
    }
    Ok(SitesFile { names, matrix })
}

pub fn read_sites<P: AsRef<Path>>(path: P) -> RhoResult<SitesFile> {
    let file = File::open(path)?;
    parse_sites(BufReader::new(file))
}

/// Writes the matrix as digits, `?` for missing, wrapped at 50 sites.
pub fn write_sites(mut out: impl Write, names: &[String], matrix: &AlleleMatrix) -> RhoResult<()> {
    writeln!(out, "{} {} {}", matrix.nseq(), matrix.nsites(), matrix.ploidy())?;
    for (seq, name) in names.iter().enumerate().take(matrix.nseq()) {
        writeln!(out, ">{}", name)?;
        for chunk in matrix.row(seq).chunks(LINE_WIDTH) {
            let line: String = chunk
                .iter()
                .map(|&c| if c == MISSING { '?' } else { (b'0' + c) as char })
                .collect();
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

/// Allele tallies per site as `[missing, T/0, C/1, A/2, G/3]`. Diploid
/// genotypes count two alleles each.
pub fn allele_counts(matrix: &AlleleMatrix, site: usize) -> [u32; 5] {
    let mut out = [0u32; 5];
    for code in matrix.column(site) {
        match (matrix.ploidy(), code) {
            (_, MISSING) => out[0] += matrix.ploidy().copies() as u32,
            (Ploidy::Haploid, c) => out[1 + c as usize] += 1,
            (Ploidy::Diploid, 2) => {
                out[1] += 1;
                out[2] += 1;
            }
            (Ploidy::Diploid, c) => out[1 + c as usize] += 2,
        }
    }
    out
}

/// Allele frequency listing in the traditional `freqs.txt` layout.
pub fn write_freqs(mut out: impl Write, matrix: &AlleleMatrix) -> RhoResult<()> {
    writeln!(out, "\nAllele frequencies\n\n Site   -   T/0  C/1  A/2  G/3\n")?;
    for site in 0..matrix.nsites() {
        let c = allele_counts(matrix, site);
        writeln!(
            out,
            "{:5} {:4} {:4} {:4} {:4} {:4}",
            site + 1,
            c[0],
            c[1],
            c[2],
            c[3],
            c[4]
        )?;
    }
    Ok(())
}
