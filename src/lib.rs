//! # rootcallers: Reverse Call-Graph Analysis
//!
//! Given one method, walks "who calls this?" edges backwards until it reaches
//! methods nobody in the editable sources calls, and reports, for every direct
//! call site of the original method, which root callers reach it and which
//! arguments were passed there.
//!
//! ## Library usage
//!
//! The traversal core ([`finder`]) only depends on two collaborator traits,
//! [`finder::ReferenceProvider`] and [`finder::CallSiteResolver`]. The [`java`]
//! module implements both over a tree-sitter index of Java sources:
//!
//! ```no_run
//! use rootcallers::finder::{CancellationToken, RootCallerFinder};
//! use rootcallers::java::{IndexConfig, SourceIndex};
//!
//! let index = SourceIndex::build(&IndexConfig::new("src/main/java"))?;
//! let target = index.resolve_target("com.acme.Billing#charge")?;
//! let outcome = RootCallerFinder::with_backend(&index).find_root_callers(&target, &CancellationToken::new())?;
//! for row in outcome.into_results() {
//!     println!("{} <- {}", row.original_caller.display_name(), row.direct_caller.display_name());
//! }
//! # Ok::<(), rootcallers::error::FinderError>(())
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod finder;
pub mod java;

pub use error::FinderError;

// ─── Path and file helpers ───────────────────────────────────────────

/// Strip the `\\?\` extended-length path prefix that Windows canonicalize adds.
#[must_use]
pub fn clean_path(p: &str) -> String {
    p.strip_prefix(r"\\?\").unwrap_or(p).to_string()
}

/// Read a file as a String, using lossy UTF-8 conversion for non-UTF8 files.
/// Returns `(content, was_lossy)`; legacy Java sources often carry
/// Windows-1252 characters in comments and string literals.
pub fn read_file_lossy(path: &std::path::Path) -> std::io::Result<(String, bool)> {
    let raw = std::fs::read(path)?;
    match String::from_utf8(raw) {
        Ok(s) => Ok((s, false)),
        Err(e) => Ok((String::from_utf8_lossy(e.as_bytes()).into_owned(), true)),
    }
}
