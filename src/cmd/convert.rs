use clap::Args;
use rhoforge::error::{RhoError, RhoResult};
use rhoforge::io::{self, ConvertOptions};
use rhoforge::locs::Locs;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Input alignment in sites-file layout
    #[arg(value_name = "FILE")]
    pub seq: PathBuf,

    /// SNP positions of the alignment columns; contiguous if absent
    #[arg(short, long, value_name = "FILE")]
    pub loc: Option<PathBuf>,

    /// Only output sites with exactly two alleles
    #[arg(long, visible_alias = "2only", default_value_t = false)]
    pub only2: bool,

    /// Minor allele frequency a site must exceed (0 to 1)
    #[arg(long, default_value_t = 0.0, value_name = "FLOAT")]
    pub freqcut: f64,

    /// Largest missing-data frequency a site may have (0 to 1)
    #[arg(long, default_value_t = 1.0, value_name = "FLOAT")]
    pub missfreqcut: f64,

    /// Only consider columns from FIRST up to (not including) LAST
    #[arg(long, num_args = 2, value_names = ["FIRST", "LAST"])]
    pub sites: Vec<usize>,

    /// Number of sequences to output (default: all)
    #[arg(long, value_name = "INT")]
    pub nout: Option<usize>,

    /// Prefix of the output files
    #[arg(long, default_value = "")]
    pub prefix: String,

    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: ConvertArgs) -> RhoResult<()> {
    for (name, value) in [("freqcut", args.freqcut), ("missfreqcut", args.missfreqcut)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(RhoError::Config(format!(
                "{} must lie between 0 and 1, got {}",
                name, value
            )));
        }
    }

    let input = io::read_sites(&args.seq)?;
    let locs = match &args.loc {
        Some(path) => io::read_locs(path)?,
        None => Locs::contiguous(input.matrix.nsites()),
    };
    println!(
        "📂 Read {} sequences of {} sites",
        input.matrix.nseq(),
        input.matrix.nsites()
    );

    let options = ConvertOptions {
        only_biallelic: args.only2,
        freqcut: args.freqcut,
        missfreqcut: args.missfreqcut,
        sites: match args.sites.as_slice() {
            [first, last] => Some((*first, *last)),
            _ => None,
        },
        nout: args.nout,
        seed: args.seed,
    };

    let freqs_path = format!("{}freqs.txt", args.prefix);
    io::write_freqs(BufWriter::new(File::create(&freqs_path)?), &input.matrix)?;

    let converted = io::convert(&input, &locs, &options)?;

    let sites_path = format!("{}sites.txt", args.prefix);
    let locs_path = format!("{}locs.txt", args.prefix);
    io::write_sites(
        BufWriter::new(File::create(&sites_path)?),
        &converted.names,
        &converted.matrix,
    )?;
    io::write_locs(BufWriter::new(File::create(&locs_path)?), &converted.locs)?;

    println!("💾 Segregating sites written to file      : {}", sites_path);
    println!("💾 Locations of segregating sites written : {}", locs_path);
    println!("💾 Allele frequencies written to file     : {}", freqs_path);
    Ok(())
}
