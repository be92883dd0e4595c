use crate::error::RhoResult;
use clap::{parser::ValueSource, ArgMatches, Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strum_macros::Display;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub spectrum: SpectrumParams,
    #[command(flatten)]
    pub surface: SurfaceParams,
    #[command(flatten)]
    pub search: SearchParams,
    #[command(flatten)]
    pub stats: StatsParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumParams {
    /// Largest column distance between the two sites of a pair
    #[arg(short = 'w', long, default_value_t = 50)]
    pub window: usize,
    /// Abort on the first pair that cannot be classified
    #[arg(long, default_value_t = false)]
    pub strict_pairs: bool,
}

impl Default for SpectrumParams {
    fn default() -> Self {
        Self {
            window: 50,
            strict_pairs: false,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceParams {
    /// Largest two-locus rho on the grid
    #[arg(long, default_value_t = 100.0)]
    pub rho_max: f64,
    /// Number of grid points, including zero
    #[arg(long, default_value_t = 101)]
    pub rho_points: usize,
    /// Simulated genealogies per grid point
    #[arg(long, default_value_t = 10_000)]
    pub draws: usize,
    /// Mean conversion tract length, same units as the locations
    #[arg(long, default_value_t = 1.0)]
    pub tract_length: f64,
    /// Fail instead of skipping types with no usable likelihood
    #[arg(long, default_value_t = false)]
    pub strict_types: bool,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            rho_max: 100.0,
            rho_points: 101,
            draws: 10_000,
            tract_length: 1.0,
            strict_types: false,
        }
    }
}

/// How the block map is laid out before the first proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Display)]
pub enum InitialLayout {
    /// One block over every interval
    Single,
    /// One block per interval
    PerInterval,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    #[arg(long, default_value_t = 1_000_000)]
    pub iterations: usize,
    #[arg(long, default_value_t = 3_500)]
    pub sample_every: usize,
    #[arg(long, default_value_t = 100_000)]
    pub burn_in: usize,
    /// Log-prior cost of every block
    #[arg(long, default_value_t = 5.0)]
    pub block_penalty: f64,
    /// Mean of the exponential rate prior; taken from the pairwise estimate when absent
    #[arg(long)]
    pub prior_mean: Option<f64>,
    #[arg(long, default_value_t = 10)]
    pub max_shift: usize,
    /// Width of the log-scale rate random walk
    #[arg(long, default_value_t = 1.0)]
    pub rate_step: f64,
    #[arg(long, default_value_t = 1)]
    pub chains: usize,
    #[arg(long, value_enum, default_value_t = InitialLayout::Single)]
    pub initial: InitialLayout,
    /// Iterations between progress reports
    #[arg(long, default_value_t = 10_000)]
    pub epoch_steps: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            iterations: 1_000_000,
            sample_every: 3_500,
            burn_in: 100_000,
            block_penalty: 5.0,
            prior_mean: None,
            max_shift: 10,
            rate_step: 1.0,
            chains: 1,
            initial: InitialLayout::Single,
            epoch_steps: 10_000,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsParams {
    /// Permutations in the LD-distance tests
    #[arg(long, default_value_t = 1000)]
    pub shuffles: usize,
}

impl Default for StatsParams {
    fn default() -> Self {
        Self { shuffles: 1000 }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> RhoResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> RhoResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Overwrites fields with values the user typed on the command line,
    /// leaving file-provided values in place for everything else.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($group:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$group.$field = cli.$group.$field.clone();
                }
            };
        }

        update_if_present!(spectrum.window);
        update_if_present!(spectrum.strict_pairs);

        update_if_present!(surface.rho_max);
        update_if_present!(surface.rho_points);
        update_if_present!(surface.draws);
        update_if_present!(surface.tract_length);
        update_if_present!(surface.strict_types);

        update_if_present!(search.iterations);
        update_if_present!(search.sample_every);
        update_if_present!(search.burn_in);
        update_if_present!(search.block_penalty);
        update_if_present!(search.prior_mean);
        update_if_present!(search.max_shift);
        update_if_present!(search.rate_step);
        update_if_present!(search.chains);
        update_if_present!(search.initial);
        update_if_present!(search.epoch_steps);

        update_if_present!(stats.shuffles);
    }
}
