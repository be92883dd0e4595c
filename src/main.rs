use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use rhoforge::config::Config;
use rhoforge::error::RhoResult;
use std::process;
use tracing::{debug, error, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "Pairwise composite-likelihood recombination rate estimation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON parameter file; flags given on the command line take precedence
    #[arg(global = true, long, value_name = "FILE")]
    params: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate a single rate from the composite likelihood of SNP pairs
    Pairwise(cmd::pairwise::PairwiseArgs),
    /// Fit variable rates along the region with a block model
    Interval(cmd::interval::IntervalArgs),
    /// Prepare sites and locations files from an alignment
    Convert(cmd::convert::ConvertArgs),
}

/// Starts from the parameter file (if any) and layers explicit flags on top.
fn resolve_config(cli_config: &Config, params: Option<&str>, sub_matches: &ArgMatches) -> RhoResult<Config> {
    match params {
        Some(path) => {
            println!("📂 Loading parameters from: {}", path);
            let mut config = Config::load_from_file(path)?;
            config.merge_from_cli(cli_config, sub_matches);
            Ok(config)
        }
        None => Ok(cli_config.clone()),
    }
}

fn main() {
    // Raw matches tell user-typed flags apart from defaults
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let sub_matches = matches
        .subcommand()
        .map(|(_, m)| m)
        .unwrap_or(&matches);

    let result = match cli.command {
        Commands::Pairwise(args) => resolve_config(&args.config, cli.params.as_deref(), sub_matches)
            .and_then(|config| {
                debug!("Resolved parameters: {:?}", config);
                cmd::pairwise::run(args, config)
            }),
        Commands::Interval(args) => resolve_config(&args.config, cli.params.as_deref(), sub_matches)
            .and_then(|config| {
                debug!("Resolved parameters: {:?}", config);
                cmd::interval::run(args, config)
            }),
        Commands::Convert(args) => cmd::convert::run(args),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("\n❌ FATAL ERROR: {}", e);
        process::exit(1);
    }
}
