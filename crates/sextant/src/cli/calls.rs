//! `sextant calls` and `sextant inheritance`.

use colored::Colorize;
use sextant::CallNode;

use super::Context;

/// Show the call tree below a function and its callers.
pub fn run(ctx: &Context, name: &str, depth: usize, top_level: bool) -> sextant::Result<()> {
    let sextant = ctx.open()?;

    let full_name = match sextant.get_definition(name)? {
        Some((definition, _)) => definition.full_name,
        None => name.to_string(),
    };

    let tree = sextant.calls_from(&full_name, depth.max(1), top_level)?;
    println!("{} {}", "Calls from".cyan().bold(), full_name.white().bold());
    if tree.is_empty() {
        println!("    {}", "(none)".dimmed());
    }
    for node in &tree {
        print_node(node, 1);
    }

    let callers = sextant.callers_of(&full_name)?;
    println!();
    println!("{} {}", "Called by".cyan().bold(), full_name.white().bold());
    if callers.is_empty() {
        println!("    {}", "(none)".dimmed());
    }
    for call in &callers {
        println!(
            "    {} {} {}",
            "•".dimmed(),
            call.caller_full_name,
            format!("(line {})", call.line).dimmed()
        );
    }
    Ok(())
}

fn print_node(node: &CallNode, level: usize) {
    let call = &node.call;
    let target = call.callee_full_name.as_deref().unwrap_or(&call.callee_name);
    let resolved = if call.callee_id.is_some() {
        String::new()
    } else {
        " (external)".dimmed().to_string()
    };
    println!(
        "{}{} {target}{resolved} {}",
        "    ".repeat(level),
        "→".dimmed(),
        format!("line {}", call.line).dimmed()
    );
    for child in &node.children {
        print_node(child, level + 1);
    }
}

/// Show a class's bases and subclasses.
pub fn inheritance(ctx: &Context, class: &str) -> sextant::Result<()> {
    let sextant = ctx.open()?;

    let bases = sextant.bases_of(class)?;
    println!("{} {}", "Bases of".cyan().bold(), class.white().bold());
    if bases.is_empty() {
        println!("    {}", "(none)".dimmed());
    }
    for base in &bases {
        let resolved = base
            .base_full_name
            .as_deref()
            .filter(|full| *full != base.base_name)
            .map(|full| format!(" ({full})").dimmed().to_string())
            .unwrap_or_default();
        println!("    {}. {}{resolved}", base.position, base.base_name);
    }

    let subclasses = sextant.subclasses_of(class)?;
    println!();
    println!("{} {}", "Subclasses of".cyan().bold(), class.white().bold());
    if subclasses.is_empty() {
        println!("    {}", "(none)".dimmed());
    }
    for (full_name, path) in &subclasses {
        println!("    {} {full_name} {}", "•".dimmed(), format!("- {path}").dimmed());
    }
    Ok(())
}
