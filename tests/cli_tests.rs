use regex::Regex;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct TestContext {
    dir: TempDir,
    sites_path: PathBuf,
    locs_path: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let sites_path = dir.path().join("sites.txt");
        let locs_path = dir.path().join("locs.txt");

        let mut sites = File::create(&sites_path).unwrap();
        writeln!(sites, "6 8 1").unwrap();
        for (i, row) in [
            "00110101", "01100111", "10011000", "11001110", "01110011", "11010100",
        ]
        .iter()
        .enumerate()
        {
            writeln!(sites, ">seq{}", i + 1).unwrap();
            writeln!(sites, "{}", row).unwrap();
        }

        let mut locs = File::create(&locs_path).unwrap();
        writeln!(locs, "8 16 L").unwrap();
        writeln!(locs, "1 2.5 4 7 8 12 13.5 15").unwrap();

        Self {
            dir,
            sites_path,
            locs_path,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn rhoforge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rhoforge"))
        .args(args)
        .output()
        .expect("Failed to execute binary")
}

const SMALL_SURFACE: [&str; 8] = [
    "--window", "4", "--rho-max", "10", "--rho-points", "6", "--draws", "300",
];

#[test]
fn test_cli_pairwise_prints_estimate_and_saves_table() {
    let ctx = TestContext::new();
    let table = ctx.path("lk.csv");
    let json = ctx.path("report.json");
    let mut args = vec![
        "pairwise",
        "--sites",
        ctx.sites_path.to_str().unwrap(),
        "--locs",
        ctx.locs_path.to_str().unwrap(),
        "--seed",
        "3",
        "--shuffles",
        "20",
        "--save-table",
        table.to_str().unwrap(),
        "--json",
        json.to_str().unwrap(),
    ];
    args.extend_from_slice(&SMALL_SURFACE);
    let output = rhoforge(&args);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let composite = Regex::new(r"\|\s*Composite\s*\|\s*([0-9.]+)\s*\|").unwrap();
    let caps = composite.captures(&stdout).expect("no composite estimate row");
    let rho: f64 = caps[1].parse().unwrap();
    assert!((0.0..=10.0).contains(&rho));
    assert!(stdout.contains("Pair types"));

    let header = fs::read_to_string(&table).unwrap();
    assert!(header.starts_with("n00,n01"));

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report["curve"].as_array().unwrap().len(), 6);
    assert_eq!(report["spectrum"]["pairs_in_window"], 22);
}

#[test]
fn test_cli_pairwise_reuses_saved_table() {
    let ctx = TestContext::new();
    let table = ctx.path("lk.csv");
    let base = [
        "pairwise",
        "--sites",
        ctx.sites_path.to_str().unwrap(),
        "--seed",
        "9",
        "--shuffles",
        "0",
    ];

    let mut first = base.to_vec();
    first.extend_from_slice(&["--save-table", table.to_str().unwrap()]);
    first.extend_from_slice(&SMALL_SURFACE);
    assert!(rhoforge(&first).status.success());

    let mut second = base.to_vec();
    second.extend_from_slice(&["--window", "4", "--table", table.to_str().unwrap()]);
    let a = String::from_utf8_lossy(&rhoforge(&first).stdout).to_string();
    let b = String::from_utf8_lossy(&rhoforge(&second).stdout).to_string();

    let composite = Regex::new(r"\|\s*Composite\s*\|\s*([0-9.]+)\s*\|\s*(-?[0-9.]+)").unwrap();
    let ca = composite.captures(&a).unwrap();
    let cb = composite.captures(&b).unwrap();
    assert_eq!(&ca[1], &cb[1]);
    assert_eq!(&ca[2], &cb[2]);
}

#[test]
fn test_cli_interval_runs_short_search() {
    let ctx = TestContext::new();
    let json = ctx.path("interval.json");
    let mut args = vec![
        "interval",
        "--sites",
        ctx.sites_path.to_str().unwrap(),
        "--locs",
        ctx.locs_path.to_str().unwrap(),
        "--seed",
        "11",
        "--iterations",
        "2000",
        "--burn-in",
        "500",
        "--sample-every",
        "100",
        "--epoch-steps",
        "500",
        "--json",
        json.to_str().unwrap(),
    ];
    args.extend_from_slice(&SMALL_SURFACE);
    let output = rhoforge(&args);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Block search finished"));
    assert!(stdout.contains("Rate map"));

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report["search"]["mean_rates"].as_array().unwrap().len(), 7);
    assert_eq!(report["search"]["samples"].as_array().unwrap().len(), 15);
}

#[test]
fn test_cli_convert_writes_three_files() {
    let ctx = TestContext::new();
    let seq = ctx.path("aln.txt");
    fs::write(&seq, "4 5 1\n>a\nTTCAT\n>b\nTCCAT\n>c\nTCGCT\n>d\nCCGAT\n").unwrap();
    let prefix = format!("{}/out_", ctx.dir.path().display());

    let output = rhoforge(&["convert", seq.to_str().unwrap(), "--prefix", &prefix]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let sites = fs::read_to_string(format!("{}sites.txt", prefix)).unwrap();
    assert!(sites.starts_with("4 4 1\n>a\n"));
    let locs = fs::read_to_string(format!("{}locs.txt", prefix)).unwrap();
    assert!(Regex::new(r"^4 \d+(\.\d+)? L").unwrap().is_match(&locs));
    assert!(fs::metadata(format!("{}freqs.txt", prefix)).is_ok());
}

#[test]
fn test_cli_convert_rejects_bad_cut() {
    let ctx = TestContext::new();
    let output = rhoforge(&[
        "convert",
        ctx.sites_path.to_str().unwrap(),
        "--freqcut",
        "1.5",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("FATAL ERROR"));
}

#[test]
fn test_cli_missing_sites_file_fails() {
    let ctx = TestContext::new();
    let output = rhoforge(&["pairwise", "--sites", ctx.path("nope.txt").to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_params_file_is_overridden_by_flags() {
    let ctx = TestContext::new();
    let params = ctx.path("params.json");
    fs::write(
        &params,
        r#"{"spectrum": {"window": 2}, "surface": {"rho_max": 10.0, "rho_points": 6, "draws": 300}}"#,
    )
    .unwrap();
    let json = ctx.path("report.json");
    let output = rhoforge(&[
        "pairwise",
        "--params",
        params.to_str().unwrap(),
        "--sites",
        ctx.sites_path.to_str().unwrap(),
        "--window",
        "4",
        "--shuffles",
        "0",
        "--seed",
        "1",
        "--json",
        json.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Loading parameters"));

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    // Window from the flag, grid from the file
    assert_eq!(report["spectrum"]["pairs_in_window"], 22);
    assert_eq!(report["curve"].as_array().unwrap().len(), 6);
}
