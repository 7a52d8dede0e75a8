//! `sextant stats`, `sextant query` and `sextant reset`.

use colored::Colorize;
use sextant::Sextant;

use super::Context;
use super::display::{format_bytes, terminal_width};

/// Run the stats command.
pub fn run(ctx: &Context) -> sextant::Result<()> {
    let sextant = ctx.open()?;
    let stats = sextant.stats()?;

    println!("{}", "Sextant Index Statistics".cyan().bold());
    println!();

    let snapshot = if stats.snapshot_bytes == 0 {
        "not written".to_string()
    } else {
        format_bytes(stats.snapshot_bytes)
    };
    println!(
        "  {}: {} ({snapshot})",
        "Index".white().bold(),
        sextant.index_dir().display()
    );
    if let Some(last) = stats.last_indexed {
        println!(
            "  {}: {}",
            "Last indexed".white().bold(),
            last.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!();

    println!("  {}: {}", "Files".white().bold(), stats.files.to_string().green());
    println!(
        "  {}: {}",
        "Definitions".white().bold(),
        stats.definitions.to_string().green()
    );
    for (kind, count) in &stats.definitions_by_kind {
        println!("    {} {kind}: {count}", "•".dimmed());
    }
    println!("  {}: {}", "References".white().bold(), stats.references);
    println!("  {}: {}", "Imports".white().bold(), stats.imports);
    println!("  {}: {}", "Decorators".white().bold(), stats.decorators);
    println!("  {}: {}", "Class bases".white().bold(), stats.class_bases);
    println!("  {}: {}", "Calls".white().bold(), stats.calls);
    println!();

    let term_index = if stats.term_index_available {
        "available".green()
    } else {
        "unavailable (substring search)".yellow()
    };
    println!("  {}: {term_index}", "Term index".white().bold());

    if stats.files == 0 {
        println!(
            "\n{}: The index is empty. Run '{}' to index your project.",
            "hint".dimmed(),
            "sextant index".cyan()
        );
    }
    Ok(())
}

/// Run a read-only SQL statement and print the rows as a table.
pub fn query(ctx: &Context, sql: &str) -> sextant::Result<()> {
    let sextant = ctx.open()?;
    let result = sextant.query(sql)?;

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect();

    let max_cell = terminal_width() / result.columns.len().max(1);
    let mut widths: Vec<usize> = result.columns.iter().map(String::len).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count()).min(max_cell.max(8));
        }
    }

    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{c:<w$}"))
        .collect();
    println!("{}", header.join("  ").white().bold());
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", truncate(cell, *w)))
            .collect();
        println!("{}", line.join("  "));
    }
    println!("\n{}", format!("({} rows)", cells.len()).dimmed());
    Ok(())
}

/// Delete the snapshot. Works even when the snapshot cannot be opened.
pub fn reset(ctx: &Context) -> sextant::Result<()> {
    let removed = Sextant::reset_dir(&ctx.index_dir())?;
    println!("{} {removed} snapshot files", "Removed".green().bold());
    Ok(())
}

fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.replace('\n', " "),
        other => other.to_string(),
    }
}

fn truncate(cell: &str, width: usize) -> String {
    if cell.chars().count() <= width {
        return cell.to_string();
    }
    let mut out: String = cell.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
