use crate::error::{RhoError, RhoResult};
use crate::likelihood::{LikelihoodSurface, RateGrid};
use crate::matrix::Ploidy;
use crate::spectrum::PairConfig;
use std::io::{Read, Write};

const RATE_PREFIX: &str = "rho=";

fn header(grid: &RateGrid) -> Vec<String> {
    (0..16)
        .map(|k| format!("n{}{}", k / 4, k % 4))
        .chain(grid.values().into_iter().map(|r| format!("{}{}", RATE_PREFIX, r)))
        .collect()
}

/// Writes one row per surface entry: 16 table cells, then the
/// log-likelihood at each grid rate. Floats use shortest round-trip text.
pub fn write_table(out: impl Write, surface: &LikelihoodSurface) -> RhoResult<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(header(surface.grid()))?;
    for (config, row) in surface.iter() {
        let record = config
            .0
            .iter()
            .map(|c| c.to_string())
            .chain(row.iter().map(|v| v.to_string()));
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn grid_from_header(fields: &csv::StringRecord) -> RhoResult<RateGrid> {
    if fields.len() < 18 {
        return Err(RhoError::Parse {
            line: 1,
            message: format!("Expected 16 cells and at least 2 rates, found {} columns", fields.len()),
        });
    }
    let rates = fields
        .iter()
        .skip(16)
        .map(|f| {
            let f = f.trim();
            f.strip_prefix(RATE_PREFIX)
                .unwrap_or(f)
                .parse::<f64>()
                .map_err(|_| RhoError::Parse {
                    line: 1,
                    message: format!("Invalid rate column '{}'", f),
                })
        })
        .collect::<RhoResult<Vec<f64>>>()?;

    let grid = RateGrid::new(rates[rates.len() - 1], rates.len())?;
    let tolerance = 1e-9 * grid.max.max(1.0);
    if let Some((i, r)) = rates
        .iter()
        .enumerate()
        .find(|(i, r)| (grid.value(*i) - **r).abs() > tolerance)
    {
        return Err(RhoError::Validation(format!(
            "Rate column {} is {}, expected evenly spaced value {}",
            i,
            r,
            grid.value(i)
        )));
    }
    Ok(grid)
}

/// Reads a table written by [`write_table`]. The sample size is taken from
/// the first row.
pub fn read_table(input: impl Read, ploidy: Ploidy) -> RhoResult<LikelihoodSurface> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let grid = grid_from_header(rdr.headers()?)?;

    let mut surface: Option<LikelihoodSurface> = None;
    for (idx, result) in rdr.records().enumerate() {
        let rec = result?;
        let line = idx + 2;
        if rec.len() != 16 + grid.points {
            return Err(RhoError::Parse {
                line,
                message: format!("Expected {} columns, found {}", 16 + grid.points, rec.len()),
            });
        }
        let mut config = PairConfig::zero();
        for (k, field) in rec.iter().take(16).enumerate() {
            config.0[k] = field.parse().map_err(|_| RhoError::Parse {
                line,
                message: format!("Invalid cell count '{}'", field),
            })?;
        }
        let row = rec
            .iter()
            .skip(16)
            .map(|f| {
                f.parse::<f64>().map_err(|_| RhoError::Parse {
                    line,
                    message: format!("Invalid log-likelihood '{}'", f),
                })
            })
            .collect::<RhoResult<Vec<f64>>>()?;

        let target = surface.get_or_insert_with(|| {
            LikelihoodSurface::new(config.total() as usize, ploidy, grid)
        });
        target.insert(&config, row)?;
    }

    surface.ok_or_else(|| RhoError::Validation("Likelihood table has no rows".to_string()))
}
