use crate::error::{RhoError, RhoResult};
use crate::locs::{Locs, Model};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Parses `nsites length L|C` followed by whitespace-separated positions.
pub fn parse_locs(content: &str) -> RhoResult<Locs> {
    let mut tokens = content.split_whitespace();
    let mut next = |what: &str| {
        tokens.next().ok_or_else(|| RhoError::Parse {
            line: 1,
            message: format!("Missing {} in locations header", what),
        })
    };

    let count_str = next("site count")?;
    let count: usize = count_str.parse().map_err(|_| RhoError::Parse {
        line: 1,
        message: format!("Invalid site count '{}'", count_str),
    })?;
    let length_str = next("sequence length")?;
    let length: f64 = length_str.parse().map_err(|_| RhoError::Parse {
        line: 1,
        message: format!("Invalid sequence length '{}'", length_str),
    })?;
    let model_str = next("model flag")?;
    let model: Model = model_str.parse().map_err(|_| RhoError::Parse {
        line: 1,
        message: format!("Model must be L or C, found '{}'", model_str),
    })?;

    let positions = tokens
        .map(|t| {
            t.parse::<f64>().map_err(|_| RhoError::Parse {
                line: 2,
                message: format!("Invalid SNP position '{}'", t),
            })
        })
        .collect::<RhoResult<Vec<f64>>>()?;
    if positions.len() != count {
        return Err(RhoError::Validation(format!(
            "Header declares {} positions, file holds {}",
            count,
            positions.len()
        )));
    }
    Locs::new(positions, length, model)
}

pub fn read_locs<P: AsRef<Path>>(path: P) -> RhoResult<Locs> {
    parse_locs(&fs::read_to_string(path)?)
}

pub fn write_locs(mut out: impl Write, locs: &Locs) -> RhoResult<()> {
    write!(out, "{} {} {}", locs.len(), locs.length, locs.model)?;
    for p in &locs.positions {
        write!(out, "\n{:.3}", p)?;
    }
    writeln!(out)?;
    Ok(())
}
