//! Common display utilities for CLI commands.

use colored::Colorize;
use sextant::{Definition, IndexError};

const MAX_DISPLAY_ITEMS: usize = 10;
const DEFAULT_TERMINAL_WIDTH: usize = 80;

/// Current terminal width, or 80 when it cannot be detected.
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map_or(DEFAULT_TERMINAL_WIDTH, |(w, _)| usize::from(w.0))
}

/// Print text wrapped to the terminal, each line indented.
pub fn print_wrapped(text: &str, indent: usize) {
    let width = terminal_width().saturating_sub(indent).max(20);
    let pad = " ".repeat(indent);
    for line in text.lines() {
        if line.trim().is_empty() {
            println!();
            continue;
        }
        for wrapped in textwrap::wrap(line, width) {
            println!("{pad}{wrapped}");
        }
    }
}

/// `name (kind) - path:line` with the signature underneath.
pub fn print_definition_line(definition: &Definition, path: &str) {
    println!(
        "  {} {} {}",
        definition.full_name.white().bold(),
        format!("({})", definition.kind).dimmed(),
        format!("- {path}:{}", definition.line).dimmed()
    );
    if let Some(signature) = &definition.signature {
        println!("    {}", signature.dimmed());
    }
}

/// Print per-file errors, truncated.
pub fn print_errors(errors: &[IndexError]) {
    if errors.is_empty() {
        return;
    }
    println!();
    println!("{} ({}):", "Errors".red().bold(), errors.len());
    for err in errors.iter().take(MAX_DISPLAY_ITEMS) {
        println!("  {} {}: {}", "•".red(), err.path.display(), err.message);
    }
    if errors.len() > MAX_DISPLAY_ITEMS {
        println!("  ... and {} more", errors.len() - MAX_DISPLAY_ITEMS);
    }
}

/// Print a list of paths under a heading, truncated.
pub fn print_paths(heading: &str, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    println!("{} ({}):", heading, paths.len());
    for path in paths.iter().take(MAX_DISPLAY_ITEMS) {
        println!("    {} {path}", "•".dimmed());
    }
    if paths.len() > MAX_DISPLAY_ITEMS {
        println!(
            "    {} ... and {} more",
            "•".dimmed(),
            paths.len() - MAX_DISPLAY_ITEMS
        );
    }
}

/// Human-readable byte count.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
