use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, Table};
use owo_colors::OwoColorize;

use crate::engine::SyncReport;

/// Render a sync report to the terminal with colors
pub fn render(report: &SyncReport) {
    println!();
    println!(
        "{}  nessync v{} — {} finished in {:.2}s",
        "🔄".bold(),
        report.version,
        report.mode,
        report.duration_ms as f64 / 1000.0
    );
    if let Some(ref watermark) = report.watermark {
        println!("   Watermark {}", watermark.dimmed());
    }
    if let Some(since) = report.since {
        println!("   Requested plugins modified since {}", since.to_string().dimmed());
    }
    println!();

    println!("{}", summary_table(report));
    println!();

    if report.result.new == 0 && report.result.updated == 0 {
        println!("  {}  Catalog already up to date", "✅".bold());
    } else {
        println!(
            "  {} {} new, {} updated (of {} received)",
            "⮕".green(),
            report.result.new.to_string().green().bold(),
            report.result.updated.to_string().yellow().bold(),
            report.result.total()
        );
    }
    println!(
        "  Saved {} plugins to {}",
        report.total_entries.to_string().bold(),
        report.destination
    );
    println!();
}

fn summary_table(report: &SyncReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["", "plugins"]);

    let rows = [
        ("loaded", report.loaded),
        ("fetched", report.fetched),
        ("new", report.result.new),
        ("updated", report.result.updated),
        ("duplicate", report.result.duplicate),
        ("total", report.total_entries),
    ];
    for (label, count) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
