//! `sextant index`, `sextant update` and `sextant status`.

use std::path::PathBuf;

use colored::Colorize;
use sextant::IndexStats;

use super::Context;
use super::display::{format_bytes, print_errors, print_paths};

/// Run the index command.
pub fn run(
    ctx: &Context,
    paths: &[PathBuf],
    force: bool,
    include: &[String],
    exclude: &[String],
) -> sextant::Result<()> {
    println!("{} {}...", "Indexing".cyan().bold(), ctx.root().display());

    let sextant = ctx.open()?.with_patterns(include, exclude)?;
    let stats = sextant.index(paths, force)?;

    print_stats(&stats);
    Ok(())
}

/// Apply changed paths, as a file watcher would.
pub fn update(ctx: &Context, paths: &[PathBuf]) -> sextant::Result<()> {
    let sextant = ctx.open()?;
    let stats = sextant.apply_changes(paths)?;

    print_stats(&stats);
    Ok(())
}

/// Report staleness without indexing.
pub fn status(ctx: &Context) -> sextant::Result<()> {
    let sextant = ctx.open()?;
    let report = sextant.check_staleness(&[])?;

    if !report.is_stale() {
        println!("{}", "Index is up to date".green());
        return Ok(());
    }

    println!("{}", "Index is stale".yellow().bold());
    print_paths(&"Changed".yellow().to_string(), &report.changed);
    print_paths(&"Added".green().to_string(), &report.added);
    print_paths(&"Removed".red().to_string(), &report.removed);
    println!(
        "\n{}: run '{}' to bring it up to date.",
        "hint".dimmed(),
        "sextant index".cyan()
    );
    Ok(())
}

fn print_stats(stats: &IndexStats) {
    println!();
    if stats.index_skipped {
        println!(
            "{} {} files unchanged",
            "Up to date:".green().bold(),
            stats.files_skipped
        );
    } else {
        println!(
            "{} {} files: {} definitions, {} references, {} imports",
            "Indexed".green().bold(),
            stats.files_indexed,
            stats.definitions_added,
            stats.references_added,
            stats.imports_added
        );
        if stats.files_removed > 0 {
            println!("{} {} files", "Removed".yellow(), stats.files_removed);
        }
        if let Some(derived) = &stats.derived {
            println!(
                "{}: {} calls, {} linked references, {} linked bases",
                "Derived".dimmed(),
                derived.calls_built,
                derived.references_linked,
                derived.bases_linked
            );
            if !derived.term_index_ready {
                println!(
                    "{}: term index unavailable, search will use substring matching",
                    "warning".yellow()
                );
            }
        }
        if let Some(bytes) = stats.snapshot_bytes {
            println!("{}: {}", "Snapshot".dimmed(), format_bytes(bytes));
        }
    }
    println!("{}: {:.2?}", "Duration".dimmed(), stats.duration);

    if !stats.directories_skipped.is_empty() {
        println!(
            "{}: {} unreadable paths",
            "Skipped".yellow(),
            stats.directories_skipped.len()
        );
    }

    print_errors(&stats.errors);
}
