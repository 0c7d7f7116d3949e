use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::test_utils::{m, FakeCodebase};
use super::*;
use crate::error::{FinderError, ProviderError};

fn search(fake: &FakeCodebase, target: &str) -> SearchReport {
    let finder = RootCallerFinder::with_backend(fake);
    match finder.find_root_callers(&m(target), &CancellationToken::new()).unwrap() {
        SearchOutcome::Completed(report) => report,
        SearchOutcome::Cancelled => panic!("search unexpectedly cancelled"),
    }
}

fn origins(report: &SearchReport) -> BTreeSet<String> {
    report.results.iter().map(|r| r.original_caller.name().to_string()).collect()
}

// ─── Graph shape ─────────────────────────────────────────────────────

#[test]
fn test_linear_chain_reports_single_root() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "service");
    let site = fake.call("service", "target");

    let report = search(&fake, "target");
    assert_eq!(report.results.len(), 1);
    let row = &report.results[0];
    assert_eq!(row.original_caller, m("main"));
    assert_eq!(row.direct_caller, m("service"));
    assert_eq!(row.line, Some((site / 100) as u32));
    assert_eq!(row.arguments, vec![format!("\"site-{}\"", site)]);
    assert_eq!(report.direct_calls, 1);
}

#[test]
fn test_target_without_callers_yields_no_rows() {
    let mut fake = FakeCodebase::new();
    fake.method("target");
    let report = search(&fake, "target");
    assert!(report.results.is_empty());
    assert_eq!(report.methods_searched, 1);
}

#[test]
fn test_diamond_reports_each_root_per_direct_call() {
    //   r1   r2
    //    \  /  \
    //     a     b
    //      \   /
    //     target
    let mut fake = FakeCodebase::new();
    fake.call("r1", "a");
    fake.call("r2", "a");
    fake.call("r2", "b");
    fake.call("a", "target");
    fake.call("b", "target");

    let report = search(&fake, "target");
    assert_eq!(report.direct_calls, 2);
    assert_eq!(report.results.len(), 3);
    assert_eq!(origins(&report), BTreeSet::from(["r1".to_string(), "r2".to_string()]));

    let via_a: Vec<_> = report.results.iter().filter(|r| r.direct_caller == m("a")).collect();
    assert_eq!(via_a.len(), 2);
}

#[test]
fn test_two_sites_in_same_caller_stay_distinct() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "worker");
    fake.call("worker", "target");
    fake.call("worker", "target");

    let report = search(&fake, "target");
    assert_eq!(report.direct_calls, 2);
    assert_eq!(report.results.len(), 2);
    assert_ne!(report.results[0].line, report.results[1].line);
}

#[test]
fn test_duplicate_match_recorded_once() {
    let mut fake = FakeCodebase::new();
    fake.call_at("worker", "target", 700, Accuracy::Exact);
    fake.call_at("worker", "target", 700, Accuracy::Exact);

    let report = search(&fake, "target");
    assert_eq!(report.direct_calls, 1);
    assert_eq!(report.results.len(), 1);
}

#[test]
fn test_each_method_searched_once() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "a");
    fake.call("main", "b");
    fake.call("a", "shared");
    fake.call("b", "shared");
    fake.call("shared", "target");

    let _ = search(&fake, "target");
    let searched = fake.searched();
    let unique: BTreeSet<_> = searched.iter().cloned().collect();
    assert_eq!(searched.len(), unique.len());
    assert_eq!(unique.len(), 5);
}

#[test]
fn test_search_is_repeatable() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "a");
    fake.call("a", "target");
    fake.call("b", "target");

    let first = search(&fake, "target");
    let second = search(&fake, "target");
    assert_eq!(first.results, second.results);
}

// ─── Cycles ──────────────────────────────────────────────────────────

#[test]
fn test_pure_cycle_falls_back_to_direct_caller() {
    let mut fake = FakeCodebase::new();
    fake.call("ping", "pong");
    fake.call("pong", "ping");
    fake.call("ping", "target");

    let report = search(&fake, "target");
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].is_self_origin());
    assert_eq!(report.results[0].direct_caller, m("ping"));
}

#[test]
fn test_cycle_with_exit_reports_exit() {
    let mut fake = FakeCodebase::new();
    fake.call("ping", "pong");
    fake.call("pong", "ping");
    fake.call("main", "pong");
    fake.call("ping", "target");

    let report = search(&fake, "target");
    assert_eq!(origins(&report), BTreeSet::from(["main".to_string()]));
}

#[test]
fn test_recursive_target() {
    let mut fake = FakeCodebase::new();
    fake.call("target", "target");
    fake.call("main", "target");

    let report = search(&fake, "target");
    assert_eq!(report.direct_calls, 2);
    assert!(report.results.iter().all(|r| r.original_caller == m("main")));
}

// ─── Externals ───────────────────────────────────────────────────────

#[test]
fn test_external_caller_is_a_boundary() {
    let mut fake = FakeCodebase::new();
    fake.external("frameworkDispatch");
    fake.call("frameworkDispatch", "handler");
    fake.call("libMain", "frameworkDispatch");
    fake.external("libMain");
    fake.call("handler", "target");

    let report = search(&fake, "target");
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].is_self_origin());
    assert_eq!(report.results[0].original_caller, m("handler"));
    // The external caller itself is never expanded.
    assert!(!fake.searched().contains(&m("frameworkDispatch")));
}

#[test]
fn test_external_sibling_does_not_hide_source_root() {
    let mut fake = FakeCodebase::new();
    fake.external("callback");
    fake.call("callback", "handler");
    fake.call("main", "handler");
    fake.call("handler", "target");

    let report = search(&fake, "target");
    assert_eq!(origins(&report), BTreeSet::from(["main".to_string()]));
}

// ─── Degraded input ──────────────────────────────────────────────────

#[test]
fn test_potential_matches_are_ignored() {
    let mut fake = FakeCodebase::new();
    fake.call_at("maybe", "target", 300, Accuracy::Potential);
    fake.call("sure", "target");

    let report = search(&fake, "target");
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].direct_caller, m("sure"));
}

#[test]
fn test_unresolvable_reference_is_dropped() {
    let mut fake = FakeCodebase::new();
    fake.orphan_reference("target");
    fake.call("main", "target");

    let report = search(&fake, "target");
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].direct_caller, m("main"));
}

#[test]
fn test_argument_failure_uses_placeholder() {
    let mut fake = FakeCodebase::new();
    let site = fake.call("main", "target");
    fake.fail_arguments(site, ExtractionFailure::ParseError);

    let report = search(&fake, "target");
    assert_eq!(report.results[0].arguments, vec!["parse-error".to_string()]);
    assert_eq!(report.results[0].extraction_failure(), Some(ExtractionFailure::ParseError));
}

#[test]
fn test_search_failure_is_not_fatal() {
    let mut fake = FakeCodebase::new();
    fake.call("a", "mid");
    fake.call("mid", "target");
    fake.fail_search("mid", ProviderError::Query("index corrupt".to_string()));

    let report = search(&fake, "target");
    // `mid` could not be expanded, so it is the deepest known origin.
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].original_caller, m("mid"));
}

#[test]
fn test_stale_method_is_skipped() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "gone");
    fake.call("gone", "target");
    fake.remove("gone");

    let report = search(&fake, "target");
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].original_caller, m("gone"));
    assert!(!fake.searched().contains(&m("gone")));
}

#[test]
fn test_provider_unavailable_is_fatal() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "target");
    fake.fail_search("target", ProviderError::Unavailable("index not loaded".to_string()));

    let finder = RootCallerFinder::with_backend(&fake);
    let err = finder.find_root_callers(&m("target"), &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, FinderError::ProviderUnavailable(_)));
}

#[test]
fn test_unknown_target_is_rejected() {
    let fake = FakeCodebase::new();
    let finder = RootCallerFinder::with_backend(&fake);
    let err = finder.find_root_callers(&m("missing"), &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, FinderError::InvalidTarget { .. }));
    assert!(fake.searched().is_empty());
}

// ─── Cancellation ────────────────────────────────────────────────────

#[test]
fn test_cancel_before_start_returns_cancelled() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "target");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = RootCallerFinder::with_backend(&fake).find_root_callers(&m("target"), &cancel).unwrap();
    assert!(outcome.is_cancelled());
    assert!(outcome.into_results().is_empty());
    assert!(fake.searched().is_empty());
}

#[test]
fn test_cancel_mid_traversal_discards_partial_results() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "mid");
    fake.call("mid", "target");
    fake.call("other", "target");
    let cancel = CancellationToken::new();
    fake.cancel_when_searching("mid", &cancel);

    let outcome = RootCallerFinder::with_backend(&fake).find_root_callers(&m("target"), &cancel).unwrap();
    assert!(outcome.is_cancelled());
    assert!(!fake.searched().contains(&m("main")));
}

// ─── Background jobs ─────────────────────────────────────────────────

/// Blocks every search until the query is cancelled.
struct BlockingBackend(FakeCodebase);

impl ReferenceProvider for BlockingBackend {
    fn search(&self, method: &MethodRef, cancel: &CancellationToken) -> Result<Vec<ReferenceMatch>, ProviderError> {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.0.search(method, cancel)
    }
}

impl CallSiteResolver for BlockingBackend {
    fn method_exists(&self, method: &MethodRef) -> bool {
        self.0.method_exists(method)
    }
    fn is_external(&self, method: &MethodRef) -> bool {
        self.0.is_external(method)
    }
    fn enclosing_method(&self, reference: &ReferenceMatch) -> Option<MethodRef> {
        self.0.enclosing_method(reference)
    }
    fn extract_arguments(&self, caller: &MethodRef, target: &MethodRef, offset: usize, length: usize) -> Result<Vec<String>, ExtractionFailure> {
        self.0.extract_arguments(caller, target, offset, length)
    }
    fn line_number(&self, caller: &MethodRef, offset: usize) -> Option<u32> {
        self.0.line_number(caller, offset)
    }
}

/// Panics on the first query.
struct PanickingBackend;

impl ReferenceProvider for PanickingBackend {
    fn search(&self, _method: &MethodRef, _cancel: &CancellationToken) -> Result<Vec<ReferenceMatch>, ProviderError> {
        panic!("provider exploded")
    }
}

impl CallSiteResolver for PanickingBackend {
    fn method_exists(&self, _method: &MethodRef) -> bool {
        true
    }
    fn is_external(&self, _method: &MethodRef) -> bool {
        false
    }
    fn enclosing_method(&self, _reference: &ReferenceMatch) -> Option<MethodRef> {
        None
    }
    fn extract_arguments(&self, _: &MethodRef, _: &MethodRef, _: usize, _: usize) -> Result<Vec<String>, ExtractionFailure> {
        Err(ExtractionFailure::NoSource)
    }
    fn line_number(&self, _caller: &MethodRef, _offset: usize) -> Option<u32> {
        None
    }
}

#[test]
fn test_job_completes() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "target");
    let job = SearchJob::spawn(Arc::new(fake), m("target")).unwrap();
    assert_eq!(job.target(), &m("target"));
    match job.wait() {
        JobStatus::Completed(report) => assert_eq!(report.results.len(), 1),
        other => panic!("unexpected status: {:?}", other),
    }
}

#[test]
fn test_job_cancel_unblocks_worker() {
    let mut fake = FakeCodebase::new();
    fake.call("main", "target");
    let job = SearchJob::spawn(Arc::new(BlockingBackend(fake)), m("target")).unwrap();
    job.cancel();
    let status = job.wait();
    assert!(matches!(status, JobStatus::Cancelled));
    assert_eq!(status.message(), "search cancelled");
}

#[test]
fn test_job_reports_invalid_target_as_failure() {
    let job = SearchJob::spawn(Arc::new(FakeCodebase::new()), m("nowhere")).unwrap();
    assert!(matches!(job.wait(), JobStatus::Failed(FinderError::InvalidTarget { .. })));
}

#[test]
fn test_job_panic_becomes_unexpected_error() {
    let job = SearchJob::spawn(Arc::new(PanickingBackend), m("target")).unwrap();
    match job.wait() {
        JobStatus::Failed(FinderError::Unexpected(message)) => assert!(message.contains("provider exploded")),
        other => panic!("unexpected status: {:?}", other),
    }
}

// ─── Properties ──────────────────────────────────────────────────────

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn name(i: u8) -> String {
        format!("n{}", i)
    }

    proptest! {
        /// Arbitrary graphs (cycles included) always terminate with one or more
        /// rows per direct call, and every reported root is a real source root.
        #[test]
        fn roots_are_true_roots(
            edges in prop::collection::vec((0u8..8, 0u8..8), 0..24),
            externals in prop::collection::btree_set(1u8..8, 0..3),
        ) {
            let mut fake = FakeCodebase::new();
            fake.method(&name(0));
            for e in &externals {
                fake.external(&name(*e));
            }
            for (caller, callee) in &edges {
                fake.call(&name(*caller), &name(*callee));
            }

            let report = search(&fake, &name(0));
            prop_assert!(report.results.len() >= report.direct_calls);
            let direct_sites = edges.iter().filter(|(_, callee)| *callee == 0).count();
            prop_assert_eq!(report.direct_calls, direct_sites);

            for row in report.results.iter().filter(|r| !r.is_self_origin()) {
                let origin: u8 = row.original_caller.name()[1..].parse().unwrap();
                prop_assert!(!externals.contains(&origin));
                let has_source_caller = edges.iter()
                    .any(|(caller, callee)| *callee == origin && !externals.contains(caller));
                prop_assert!(!has_source_caller);
            }
        }
    }
}
