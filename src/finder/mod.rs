//! Root-caller search: reverse call-graph construction and root resolution.
//!
//! A search runs in three phases over one disposable traversal:
//! 1. [`builder`]: breadth-first "who calls this" expansion from the target,
//!    recording every direct call site onto the target with its arguments;
//! 2. [`roots`]: depth-first walk from each direct caller back to root callers;
//! 3. [`assemble`]: one [`CallInfo`] row per (root, direct call) pair.
//!
//! The codebase is reached only through [`ReferenceProvider`] and [`CallSiteResolver`].

mod assemble;
mod builder;
mod cancel;
mod job;
mod provider;
mod roots;
mod types;

pub use assemble::assemble;
pub use builder::{BuiltGraph, CallGraphBuilder};
pub use cancel::CancellationToken;
pub use job::{JobStatus, SearchJob};
pub use provider::{CallSiteResolver, ReferenceProvider};
pub use roots::find_all_root_callers;
pub use types::*;

use std::time::{Duration, Instant};

use tracing::info;

use crate::error::FinderError;

// ─── Search outcome ──────────────────────────────────────────────────

/// Results of a completed search plus traversal statistics.
#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub results: Vec<CallInfo>,
    pub direct_calls: usize,
    pub methods_searched: usize,
    pub edges: usize,
    pub elapsed: Duration,
}

/// How a search ended when it did not fail.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Completed(SearchReport),
    /// Cancellation was observed; partial results were discarded
    Cancelled,
}

impl SearchOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The result rows; empty when the search was cancelled.
    pub fn into_results(self) -> Vec<CallInfo> {
        match self {
            Self::Completed(report) => report.results,
            Self::Cancelled => Vec::new(),
        }
    }
}

// ─── Finder ──────────────────────────────────────────────────────────

/// Entry point of the core: finds the root callers of one target method.
///
/// Holds no traversal state; every call to [`find_root_callers`](Self::find_root_callers)
/// builds and discards its own, so one finder may serve concurrent searches.
pub struct RootCallerFinder<'a> {
    provider: &'a dyn ReferenceProvider,
    resolver: &'a dyn CallSiteResolver,
}

impl<'a> RootCallerFinder<'a> {
    pub fn new(provider: &'a dyn ReferenceProvider, resolver: &'a dyn CallSiteResolver) -> Self {
        Self { provider, resolver }
    }

    /// Use one backend implementing both collaborator traits.
    pub fn with_backend<B>(backend: &'a B) -> Self
    where
        B: ReferenceProvider + CallSiteResolver,
    {
        Self::new(backend, backend)
    }

    pub fn find_root_callers(&self, target: &MethodRef, cancel: &CancellationToken) -> Result<SearchOutcome, FinderError> {
        if !self.resolver.method_exists(target) {
            return Err(FinderError::InvalidTarget {
                target: target.to_string(),
                reason: "method does not exist".to_string(),
            });
        }

        let start = Instant::now();
        info!(target = %target, "Building reverse call graph");

        match self.run(target, cancel) {
            Ok(mut report) => {
                report.elapsed = start.elapsed();
                info!(
                    target = %target.display_name(),
                    methods = report.methods_searched,
                    direct_calls = report.direct_calls,
                    rows = report.results.len(),
                    elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
                    "Root caller search finished"
                );
                Ok(SearchOutcome::Completed(report))
            }
            Err(FinderError::Cancelled) => {
                info!(target = %target.display_name(), "Root caller search cancelled");
                Ok(SearchOutcome::Cancelled)
            }
            Err(e) => Err(e),
        }
    }

    fn run(&self, target: &MethodRef, cancel: &CancellationToken) -> Result<SearchReport, FinderError> {
        let built = CallGraphBuilder::new(self.provider, self.resolver).build(target, cancel)?;
        cancel.check()?;
        let results = assemble(&built.direct_calls, &built.graph, cancel)?;
        Ok(SearchReport {
            results,
            direct_calls: built.direct_calls.len(),
            methods_searched: built.methods_searched,
            edges: built.graph.edge_count(),
            elapsed: Duration::ZERO,
        })
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
#[path = "finder_tests.rs"]
mod tests;
