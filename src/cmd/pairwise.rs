use crate::reports;
use clap::Args;
use rhoforge::api::{self, PairwiseOptions};
use rhoforge::config::Config;
use rhoforge::error::RhoResult;
use rhoforge::io;
use std::fs::{self, File};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct PairwiseArgs {
    #[command(flatten)]
    pub config: Config,

    /// Sites file (`nseq nsites ploidy` header, FASTA-style records)
    #[arg(long, value_name = "FILE")]
    pub sites: PathBuf,

    /// SNP locations; sites are taken as contiguous when absent
    #[arg(short = 'l', long, value_name = "FILE")]
    pub locs: Option<PathBuf>,

    /// Precomputed likelihood table (CSV); simulated when absent
    #[arg(long, value_name = "FILE")]
    pub table: Option<PathBuf>,

    /// Write the likelihood table used for this run
    #[arg(long, value_name = "FILE")]
    pub save_table: Option<PathBuf>,

    /// Sliding-window estimates over WIDTH SNPs every STEP SNPs
    #[arg(long, num_args = 2, value_names = ["WIDTH", "STEP"])]
    pub slide: Vec<usize>,

    /// Rows of the pair type table to print (0 for none)
    #[arg(long, default_value_t = 20)]
    pub show_types: usize,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,

    /// Write the full report as JSON
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,
}

pub fn run(args: PairwiseArgs, config: Config) -> RhoResult<()> {
    println!("\n🚀 Pairwise composite likelihood");
    let dataset = api::load_dataset(&args.sites, args.locs.as_deref())?;

    let options = PairwiseOptions {
        table: args.table.as_deref(),
        seed: args.seed,
        windows: match args.slide.as_slice() {
            [width, step] => Some((*width, *step)),
            _ => None,
        },
    };
    let analysis = api::run_pairwise(&dataset, &config, &options)?;

    if let Some(path) = &args.save_table {
        io::write_table(File::create(path)?, &analysis.surface)?;
        println!("💾 Likelihood table written to {}", path.display());
    }

    if args.show_types > 0 {
        reports::print_type_table(&analysis.spectrum, &analysis.bound, args.show_types);
    }
    reports::print_pairwise_summary(&analysis.report);
    reports::print_curve(&analysis.report.curve, analysis.report.estimate.index);
    if !analysis.report.windows.is_empty() {
        reports::print_windows(&analysis.report.windows);
    }

    if let Some(path) = &args.json {
        fs::write(path, serde_json::to_string_pretty(&analysis.report)?)?;
        println!("💾 Report written to {}", path.display());
    }
    Ok(())
}
