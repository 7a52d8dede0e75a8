//! `sextant search`, `sextant show` and `sextant refs`.

use colored::Colorize;
use sextant::{DefinitionKind, SearchOptions};

use super::Context;
use super::display::{print_definition_line, print_wrapped};

/// Run the search command.
pub fn run(
    ctx: &Context,
    query: &str,
    kind: Option<&str>,
    include_private: bool,
    limit: usize,
) -> sextant::Result<()> {
    let kind = kind.map(parse_kind).transpose()?;
    let sextant = ctx.open()?;

    let results = sextant.search(
        query,
        &SearchOptions {
            kind,
            include_private,
            limit,
        },
    )?;

    if results.is_empty() {
        println!("No definitions found matching \"{query}\"");

        if sextant.stats()?.definitions == 0 {
            println!(
                "\n{}: The index is empty. Run '{}' to index your project.",
                "hint".dimmed(),
                "sextant index".cyan()
            );
        } else if kind.is_some() {
            println!(
                "\n{}: Try searching without the --kind filter.",
                "hint".dimmed()
            );
        }
        return Ok(());
    }

    println!(
        "Found {} definitions matching \"{}\":",
        results.len().to_string().green().bold(),
        query.cyan()
    );
    println!();

    for hit in &results {
        print_definition_line(&hit.definition, &hit.file_path);
    }
    Ok(())
}

/// Show one definition with its docstring and decorators.
pub fn show(ctx: &Context, name: &str) -> sextant::Result<()> {
    let sextant = ctx.open()?;

    let Some((definition, path)) = sextant.get_definition(name)? else {
        println!("No definition named \"{name}\"");
        return Ok(());
    };

    println!(
        "{} {}",
        definition.full_name.white().bold(),
        format!("({})", definition.kind).dimmed()
    );
    let end = definition
        .end_line
        .map(|end| format!("-{end}"))
        .unwrap_or_default();
    println!("  {}: {path}:{}{end}", "Location".dimmed(), definition.line);

    for decorator in sextant.decorators_of(definition.id)? {
        let arguments = decorator
            .arguments
            .map(|a| format!("({a})"))
            .unwrap_or_default();
        println!("  {}: @{}{arguments}", "Decorator".dimmed(), decorator.name);
    }
    if let Some(signature) = &definition.signature {
        println!("  {}: {signature}", "Signature".dimmed());
    }
    if let Some(parent) = &definition.parent_full_name {
        println!("  {}: {parent}", "Parent".dimmed());
    }
    if let Some(docstring) = &definition.docstring {
        println!();
        print_wrapped(docstring, 2);
    }
    Ok(())
}

/// List references to a name.
pub fn refs(ctx: &Context, name: &str, limit: usize) -> sextant::Result<()> {
    let sextant = ctx.open()?;
    let references = sextant.references(name, limit)?;

    if references.is_empty() {
        println!("No references to \"{name}\"");
        return Ok(());
    }

    println!(
        "{} references to \"{}\":",
        references.len().to_string().green().bold(),
        name.cyan()
    );
    for (reference, path) in &references {
        let marker = if reference.is_call { "call" } else { "ref" };
        println!(
            "  {} {}",
            format!("{path}:{}:{}", reference.line, reference.col).white(),
            format!("[{marker}]").dimmed()
        );
        println!("    {}", reference.context.dimmed());
    }
    Ok(())
}

fn parse_kind(s: &str) -> sextant::Result<DefinitionKind> {
    s.to_lowercase().parse().map_err(|_| {
        let valid: Vec<&str> = DefinitionKind::ALL.iter().map(DefinitionKind::as_str).collect();
        sextant::Error::Config(format!(
            "unknown definition kind '{s}'. Valid kinds: {}",
            valid.join(", ")
        ))
    })
}
