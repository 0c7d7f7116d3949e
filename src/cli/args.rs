//! CLI argument structs for all subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

use rootcallers::config::ProjectConfig;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One aligned line per result
    Text,
    /// Results plus summary as JSON
    Json,
    /// CSV with BOM (origin, direct_caller, line, arguments)
    Csv,
}

/// Options shared by every command that builds a source index.
#[derive(Args, Debug, Clone)]
pub struct IndexOpts {
    /// Project directory (source root unless the config lists others)
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// Library source directory; its methods are never expanded (repeatable)
    #[arg(long = "lib", value_name = "DIR")]
    pub lib: Vec<String>,

    /// Regex on file paths marking sources as library code (repeatable)
    #[arg(long = "lib-pattern", value_name = "REGEX")]
    pub lib_pattern: Vec<String>,

    /// Config file (default: <dir>/.rootcallers.json, then the user config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of parallel threads (0 = auto)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Include hidden files
    #[arg(long)]
    pub hidden: bool,

    /// Also index .gitignore'd files
    #[arg(long)]
    pub no_ignore: bool,

    /// Log level for stderr output (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl IndexOpts {
    /// Command-line values as a config layer to merge over the file config.
    pub fn overrides(&self) -> ProjectConfig {
        ProjectConfig {
            source_roots: Vec::new(),
            library_roots: self.lib.clone(),
            library_patterns: self.lib_pattern.clone(),
            hidden: self.hidden,
            no_ignore: self.no_ignore,
            threads: self.threads,
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Parser, Debug)]
pub struct CallersArgs {
    /// Target method: pkg.Type#method, Type#method or Type#method(int,String)
    pub target: String,

    #[command(flatten)]
    pub index: IndexOpts,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write results to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct MethodsArgs {
    /// Substring of the method name (case-insensitive)
    pub name: String,

    #[command(flatten)]
    pub index: IndexOpts,

    /// Maximum number of methods to list (0 = unlimited)
    #[arg(long, default_value = "50")]
    pub max_results: usize,
}
