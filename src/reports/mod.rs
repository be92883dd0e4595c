use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use rhoforge::api::{IntervalReport, PairwiseReport};
use rhoforge::likelihood::composite::WindowEstimate;
use rhoforge::likelihood::BoundSurface;
use rhoforge::locs::Locs;
use rhoforge::spectrum::PairSpectrum;

fn right_align(table: &mut Table, from: usize, to: usize) {
    for i in from..to {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

fn fmt_opt(v: Option<f64>, digits: usize) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{:.*}", digits, x),
        _ => "-".to_string(),
    }
}

/// Most frequent pair types with their LD summaries and best rates.
pub fn print_type_table(spectrum: &PairSpectrum, bound: &BoundSurface, limit: usize) {
    let registry = &spectrum.registry;
    let mut ids: Vec<usize> = (0..registry.len()).collect();
    ids.sort_by(|&a, &b| {
        let ca = registry.get(a).map_or(0, |t| t.count);
        let cb = registry.get(b).map_or(0, |t| t.count);
        cb.cmp(&ca).then(a.cmp(&b))
    });

    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![
        Cell::new("Type").add_attribute(Attribute::Bold),
        Cell::new("Configuration"),
        Cell::new("Count").fg(Color::Cyan),
        Cell::new("r2"),
        Cell::new("D"),
        Cell::new("D'"),
        Cell::new("Rm").fg(Color::Red),
        Cell::new("Miss"),
        Cell::new("Best rho").fg(Color::Green),
        Cell::new("lnL max"),
    ]);
    right_align(&mut table, 2, 10);

    let unsupported = bound.unsupported();
    for &id in ids.iter().take(limit) {
        let Some(t) = registry.get(id) else { continue };
        let flag = if unsupported.contains(&id) { " !" } else { "" };
        table.add_row(vec![
            Cell::new(format!("{}{}", id, flag)).add_attribute(Attribute::Bold),
            Cell::new(t.config.to_string()),
            Cell::new(t.count).fg(Color::Cyan),
            Cell::new(format!("{:.3}", t.ld_stats[0])),
            Cell::new(format!("{:.3}", t.ld_stats[1])),
            Cell::new(format!("{:.3}", t.ld_stats[2])),
            Cell::new(t.min_recombinations),
            Cell::new(if t.missing { "yes" } else { "" }),
            Cell::new(fmt_opt(t.rate_at_max, 2)).fg(Color::Green),
            Cell::new(fmt_opt(t.max_loglik, 3)),
        ]);
    }

    println!(
        "\n📊 Pair types ({} of {} shown)",
        limit.min(registry.len()),
        registry.len()
    );
    println!("{}", table);
}

pub fn print_pairwise_summary(report: &PairwiseReport) {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);

    let s = &report.spectrum;
    let rows: Vec<(&str, String)> = vec![
        ("Pairs in window", s.pairs_in_window.to_string()),
        ("Pairs classified", s.classified.to_string()),
        ("Skipped (site)", s.skipped_sites.to_string()),
        ("Skipped (invalid)", s.skipped_invalid.to_string()),
        ("Pair types", report.types.to_string()),
        ("Unsupported types", report.unsupported_types.to_string()),
        ("Types without data", report.degenerate_types.to_string()),
        ("Rmin", report.rmin.events.to_string()),
        ("Incompatible pairs", report.rmin.incompatible_pairs.to_string()),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    right_align(&mut table, 1, 2);

    println!("\n📊 Pair spectrum");
    println!("{}", table);

    let mut est = Table::new();
    est.load_preset(ASCII_FULL);
    est.add_row(vec![
        Cell::new("Estimate").add_attribute(Attribute::Bold),
        Cell::new("rho").fg(Color::Green),
        Cell::new("lnL"),
    ]);
    est.add_row(vec![
        Cell::new("Composite"),
        Cell::new(format!("{:.3}", report.estimate.rate)).fg(Color::Green),
        Cell::new(format!("{:.3}", report.estimate.loglik)),
    ]);
    if let Some(d) = &report.distance_estimate {
        est.add_row(vec![
            Cell::new("Distance-scaled"),
            Cell::new(format!("{:.3}", d.rate)).fg(Color::Green),
            Cell::new(format!("{:.3}", d.loglik)),
        ]);
    }
    right_align(&mut est, 1, 3);
    println!("{}", est);

    if !report.ld_tests.is_empty() {
        let mut ld = Table::new();
        ld.load_preset(ASCII_FULL);
        ld.add_row(vec![
            Cell::new("Statistic").add_attribute(Attribute::Bold),
            Cell::new("Pairs"),
            Cell::new("Corr. with distance"),
            Cell::new("P (shuffled)"),
        ]);
        for t in &report.ld_tests {
            ld.add_row(vec![
                Cell::new(t.statistic.to_string()),
                Cell::new(t.pairs),
                Cell::new(format!("{:.4}", t.correlation)),
                Cell::new(fmt_opt(t.p_value, 4)),
            ]);
        }
        right_align(&mut ld, 1, 4);
        println!("{}", ld);
    }
}

/// Composite log-likelihood along the grid, best point marked.
pub fn print_curve(curve: &[(f64, f64)], best: usize) {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);
    table.add_row(vec![
        Cell::new("rho").add_attribute(Attribute::Bold),
        Cell::new("lnL"),
    ]);

    // Long grids are thinned to about twenty rows plus the maximum
    let stride = if curve.len() > 25 { curve.len().div_ceil(20) } else { 1 };
    for (i, (rate, loglik)) in curve.iter().enumerate() {
        if i % stride != 0 && i != best && i + 1 != curve.len() {
            continue;
        }
        let mut rate_cell = Cell::new(format!("{:.3}", rate));
        let mut lnl_cell = Cell::new(format!("{:.3}", loglik));
        if i == best {
            rate_cell = rate_cell.fg(Color::Green).add_attribute(Attribute::Bold);
            lnl_cell = lnl_cell.fg(Color::Green);
        }
        table.add_row(vec![rate_cell, lnl_cell]);
    }
    right_align(&mut table, 0, 2);

    println!("\n📈 Composite likelihood curve");
    println!("{}", table);
}

pub fn print_windows(windows: &[WindowEstimate]) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![
        Cell::new("SNPs").add_attribute(Attribute::Bold),
        Cell::new("Start"),
        Cell::new("End"),
        Cell::new("Pairs"),
        Cell::new("rho").fg(Color::Green),
        Cell::new("rho / unit"),
        Cell::new("lnL"),
    ]);
    right_align(&mut table, 1, 7);

    for w in windows {
        let span = w.end - w.start;
        let (rate, per_unit, loglik) = match &w.estimate {
            Some(e) => (
                format!("{:.3}", e.rate),
                if span > 0.0 {
                    format!("{:.5}", e.rate / span)
                } else {
                    "-".to_string()
                },
                format!("{:.3}", e.loglik),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            Cell::new(format!("{}-{}", w.first_site, w.last_site)),
            Cell::new(format!("{:.1}", w.start)),
            Cell::new(format!("{:.1}", w.end)),
            Cell::new(w.pairs),
            Cell::new(rate).fg(Color::Green),
            Cell::new(per_unit),
            Cell::new(loglik),
        ]);
    }

    println!("\n🪟 Sliding windows");
    println!("{}", table);
}

pub fn print_interval_summary(report: &IntervalReport) {
    let search = &report.search;
    println!("\n🏁 Block search finished");
    println!(
        "   Pairwise rho {:.3} | start rate {:.6}/unit | prior mean {:.6} | {} iterations{}",
        report.pairwise.rate,
        report.initial_rate,
        report.prior_mean,
        search.iterations,
        if search.cancelled { " (stopped early)" } else { "" }
    );

    let mut moves = Table::new();
    moves.load_preset(ASCII_FULL);
    moves.add_row(vec![
        Cell::new("Move").add_attribute(Attribute::Bold),
        Cell::new("Proposed"),
        Cell::new("Accepted"),
        Cell::new("Rate").fg(Color::Cyan),
    ]);
    for (kind, proposed, accepted) in search.stats.rows() {
        moves.add_row(vec![
            Cell::new(kind.to_string()),
            Cell::new(proposed),
            Cell::new(accepted),
            Cell::new(format!("{:.1}%", 100.0 * search.stats.acceptance(kind))).fg(Color::Cyan),
        ]);
    }
    right_align(&mut moves, 1, 4);
    println!("{}", moves);

    if !search.block_counts.is_empty() {
        let total: usize = search.block_counts.values().sum();
        let mut hist = Table::new();
        hist.load_preset(ASCII_FULL);
        hist.add_row(vec![
            Cell::new("Blocks").add_attribute(Attribute::Bold),
            Cell::new("Samples"),
            Cell::new("Share"),
        ]);
        for (blocks, n) in &search.block_counts {
            hist.add_row(vec![
                Cell::new(blocks),
                Cell::new(n),
                Cell::new(format!("{:.1}%", 100.0 * *n as f64 / total.max(1) as f64)),
            ]);
        }
        right_align(&mut hist, 0, 3);
        println!("\n📊 Posterior number of blocks ({} samples)", total);
        println!("{}", hist);
    }
}

/// Mean rate per SNP interval, with the cumulative map length.
pub fn print_rate_map(locs: &Locs, mean_rates: &[f64]) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![
        Cell::new("Interval").add_attribute(Attribute::Bold),
        Cell::new("From"),
        Cell::new("To"),
        Cell::new("Mean rate").fg(Color::Green),
        Cell::new("Cumulative"),
    ]);
    right_align(&mut table, 1, 5);

    let mut cumulative = 0.0;
    for (i, (span, rate)) in locs.positions.windows(2).zip(mean_rates).enumerate() {
        let (from, to) = (span[0], span[1]);
        cumulative += rate * (to - from);
        table.add_row(vec![
            Cell::new(i),
            Cell::new(format!("{:.1}", from)),
            Cell::new(format!("{:.1}", to)),
            Cell::new(format!("{:.6}", rate)).fg(Color::Green),
            Cell::new(format!("{:.3}", cumulative)),
        ]);
    }

    println!("\n🗺️  Rate map");
    println!("{}", table);
}
