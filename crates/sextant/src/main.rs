//! Sextant CLI - index a Python project and query its code facts.
//!
//! The index lives in `<root>/.sextant` unless `--index-dir` says otherwise.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// Sextant: code-fact index for Python projects.
#[derive(Parser)]
#[command(name = "sextant")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Source root (defaults to current directory)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Index directory (defaults to <root>/.sextant)
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the project (no-op when nothing changed)
    Index {
        /// Only these files or directories
        paths: Vec<PathBuf>,

        /// Re-index even when nothing is stale
        #[arg(short, long)]
        force: bool,

        /// Extra include pattern (repeatable)
        #[arg(long = "include", value_name = "PATTERN")]
        include: Vec<String>,

        /// Extra exclude pattern (repeatable)
        #[arg(long = "exclude", value_name = "PATTERN")]
        exclude: Vec<String>,
    },

    /// Re-index specific changed or deleted paths
    Update {
        /// Changed paths
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show which files changed since the last index
    Status,

    /// Search definitions (`*` for wildcards)
    Search {
        /// Search query
        query: String,

        /// Filter by kind (module, class, function, param, variable, property)
        #[arg(short, long)]
        kind: Option<String>,

        /// Include names starting with `_`
        #[arg(short, long)]
        private: bool,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a definition in detail
    Show {
        /// Name or qualified name
        name: String,
    },

    /// List references to a name
    Refs {
        /// Name or qualified name
        name: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Show what a function calls, and who calls it
    Calls {
        /// Qualified name of the function
        name: String,

        /// Levels of callees to expand
        #[arg(short, long, default_value = "1")]
        depth: usize,

        /// Leave out calls nested in other calls' arguments
        #[arg(short, long)]
        top_level: bool,
    },

    /// Show bases and subclasses of a class
    Inheritance {
        /// Class name or qualified name
        class: String,
    },

    /// Show index statistics
    Stats,

    /// Run a read-only SQL query against the index
    Query {
        /// SQL statement
        sql: String,
    },

    /// Delete the index snapshot
    Reset,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = match cli.root {
        Some(r) => r,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!(
                    "{}: failed to get current directory: {e}",
                    "error".red().bold()
                );
                return ExitCode::FAILURE;
            }
        },
    };
    let ctx = cli::Context::new(root, cli.index_dir);

    let result = match cli.command {
        Commands::Index {
            paths,
            force,
            include,
            exclude,
        } => cli::index::run(&ctx, &paths, force, &include, &exclude),
        Commands::Update { paths } => cli::index::update(&ctx, &paths),
        Commands::Status => cli::index::status(&ctx),
        Commands::Search {
            query,
            kind,
            private,
            limit,
        } => cli::search::run(&ctx, &query, kind.as_deref(), private, limit),
        Commands::Show { name } => cli::search::show(&ctx, &name),
        Commands::Refs { name, limit } => cli::search::refs(&ctx, &name, limit),
        Commands::Calls {
            name,
            depth,
            top_level,
        } => cli::calls::run(&ctx, &name, depth, top_level),
        Commands::Inheritance { class } => cli::calls::inheritance(&ctx, &class),
        Commands::Stats => cli::stats::run(&ctx),
        Commands::Query { sql } => cli::stats::query(&ctx, &sql),
        Commands::Reset => cli::stats::reset(&ctx),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = std::error::Error::source(cause);
            }
            if e.is_schema_mismatch() {
                eprintln!(
                    "\n{}: the index was written by an incompatible version. Run '{}' and index again.",
                    "hint".dimmed(),
                    "sextant reset".cyan()
                );
            }
            ExitCode::FAILURE
        }
    }
}
