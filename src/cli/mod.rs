//! CLI layer: argument parsing, command dispatch, and subcommand implementations.

pub mod args;

pub use args::*;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rootcallers::config::ProjectConfig;
use rootcallers::error::FinderError;
use rootcallers::export;
use rootcallers::finder::{JobStatus, SearchJob};
use rootcallers::java::SourceIndex;

/// Exit status after a search cancelled with Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

// ─── CLI ─────────────────────────────────────────────────────────────

/// Find the root callers of a Java method and the arguments passed at each direct call site
#[derive(Parser, Debug)]
#[command(name = "rootcallers", version, about, after_help = "\
Run 'rootcallers <COMMAND> --help' for detailed options and examples.\n\
Common options: -d <DIR> (project directory), --lib <DIR> (library sources), -f json|csv|text")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Find every root caller of a method, with the direct call sites that reach it
    Callers(CallersArgs),

    /// List declared methods whose name contains a substring
    Methods(MethodsArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Callers(args) => cmd_callers(args),
        Commands::Methods(args) => cmd_methods(args).map(|_| 0),
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

// ─── Shared setup ───────────────────────────────────────────────────

/// Resolve configuration, start logging and build the source index.
fn load_index(opts: &IndexOpts) -> Result<SourceIndex, FinderError> {
    let project_dir = PathBuf::from(&opts.dir);
    let (mut config, config_path) = ProjectConfig::discover(opts.config.as_deref(), &project_dir)?;
    config.merge(opts.overrides());
    init_logging(config.log_level.as_deref());

    if let Some(path) = &config_path {
        info!(path = %path.display(), "Loaded configuration");
    }
    let index_config = config.to_index_config(&project_dir)?;
    SourceIndex::build(&index_config)
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("warn")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, FinderError> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    })
}

// ─── cmd_callers ────────────────────────────────────────────────────

fn cmd_callers(args: CallersArgs) -> Result<i32, FinderError> {
    let index = Arc::new(load_index(&args.index)?);
    let target = index.resolve_target(&args.target)?;
    eprintln!("[callers] Searching root callers of {}", target);

    let start = Instant::now();
    let job = SearchJob::spawn(Arc::clone(&index), target.clone())?;
    let token = job.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!(error = %e, "Could not install the Ctrl-C handler");
    }

    let status = job.wait();
    eprintln!("[callers] {} in {:.1}ms", status.message(), start.elapsed().as_secs_f64() * 1000.0);
    let report = match status {
        JobStatus::Completed(report) => report,
        JobStatus::Cancelled => return Ok(EXIT_CANCELLED),
        JobStatus::Failed(e) => return Err(e),
    };

    match (args.format, args.output.as_deref()) {
        (OutputFormat::Csv, Some(path)) => {
            export::export_csv(path, &report.results)?;
            eprintln!("[callers] Wrote {} row(s) to {}", report.results.len(), path.display());
        }
        (format, path) => {
            let mut out = open_output(path)?;
            match format {
                OutputFormat::Csv => export::write_csv(&mut out, &report.results)?,
                OutputFormat::Json => export::write_json(&mut out, &target, &report)?,
                OutputFormat::Text => {
                    if report.results.is_empty() {
                        eprintln!("[callers] No callers found for {}", target.display_name());
                    }
                    export::write_text(&mut out, &report.results)?
                }
            }
            out.flush()?;
        }
    }
    Ok(0)
}

// ─── cmd_methods ────────────────────────────────────────────────────

fn cmd_methods(args: MethodsArgs) -> Result<(), FinderError> {
    let index = load_index(&args.index)?;
    let found = index.find_methods(&args.name);
    let limit = if args.max_results == 0 { found.len() } else { args.max_results.min(found.len()) };

    let mut out = open_output(None)?;
    for def in &found[..limit] {
        let file = index.file_of(def);
        let marker = if file.external { " [lib]" } else { "" };
        writeln!(out, "{}  {}:{}{}", def.method, file.path, def.line_start, marker)?;
    }
    out.flush()?;

    if limit < found.len() {
        eprintln!("[methods] Showing {} of {} matches (use --max-results 0 for all)", limit, found.len());
    } else {
        eprintln!("[methods] {} match(es)", found.len());
    }
    Ok(())
}
