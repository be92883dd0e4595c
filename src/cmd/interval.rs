use crate::reports;
use clap::Args;
use rhoforge::api;
use rhoforge::config::Config;
use rhoforge::error::RhoResult;
use rhoforge::search::ProgressCallback;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Args, Debug, Clone)]
pub struct IntervalArgs {
    #[command(flatten)]
    pub config: Config,

    #[arg(long, value_name = "FILE")]
    pub sites: PathBuf,

    #[arg(short = 'l', long, value_name = "FILE")]
    pub locs: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub table: Option<PathBuf>,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,

    /// Stop after this many seconds
    #[arg(short = 'T', long)]
    pub time: Option<u64>,

    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,
}

struct ConsoleProgress {
    start: Instant,
    limit: Option<Duration>,
    last_print_ms: AtomicU64,
}

impl ProgressCallback for ConsoleProgress {
    fn on_progress(&self, iteration: usize, loglik: f64, blocks: f64, ips: f32) -> bool {
        let elapsed = self.start.elapsed();
        let ms = elapsed.as_millis() as u64;
        if ms.saturating_sub(self.last_print_ms.load(Ordering::Relaxed)) >= 1000 {
            println!(
                "   Iteration {:>10} | lnL {:>12.3} | blocks {:>6.1} | {:.0} it/s",
                iteration, loglik, blocks, ips
            );
            self.last_print_ms.store(ms, Ordering::Relaxed);
        }
        self.limit.map_or(true, |l| elapsed < l)
    }
}

pub fn run(args: IntervalArgs, config: Config) -> RhoResult<()> {
    println!("\n🚀 Variable-rate block search");
    let dataset = api::load_dataset(&args.sites, args.locs.as_deref())?;

    println!(
        "🔥 {} chain(s), {} iterations, burn-in {}, sampling every {}",
        config.search.chains.max(1),
        config.search.iterations,
        config.search.burn_in,
        config.search.sample_every
    );
    let progress = ConsoleProgress {
        start: Instant::now(),
        limit: args.time.map(Duration::from_secs),
        last_print_ms: AtomicU64::new(0),
    };
    let report = api::run_interval(
        &dataset,
        &config,
        args.table.as_deref(),
        args.seed,
        progress,
    )?;

    reports::print_interval_summary(&report);
    reports::print_rate_map(&dataset.locs, &report.search.mean_rates);

    if let Some(path) = &args.json {
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("💾 Report written to {}", path.display());
    }
    Ok(())
}
