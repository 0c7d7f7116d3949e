//! Phase 3: cross-product direct calls with their root callers into result rows.

use tracing::warn;

use crate::error::FinderError;

use super::cancel::CancellationToken;
use super::roots::find_all_root_callers;
use super::types::{CallGraph, CallInfo, DirectCall};

/// One row per (root, direct call) pair, in direct-call discovery order.
///
/// A direct call with no resolvable root (pure cycle, or an external direct
/// caller) is reported once with the direct caller as its own origin. Rows are
/// never merged across different direct calls.
pub fn assemble(
    direct_calls: &[DirectCall],
    graph: &CallGraph,
    cancel: &CancellationToken,
) -> Result<Vec<CallInfo>, FinderError> {
    let mut results = Vec::with_capacity(direct_calls.len());

    for call in direct_calls {
        cancel.check()?;
        let roots = find_all_root_callers(&call.direct_caller, graph);
        if roots.is_empty() {
            warn!(
                direct_caller = %call.direct_caller.display_name(),
                line = ?call.line,
                "No root caller found, reporting the direct caller as its own origin"
            );
            results.push(CallInfo::new(call.direct_caller.clone(), call));
        } else {
            results.extend(roots.into_iter().map(|root| CallInfo::new(root, call)));
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::types::MethodRef;

    fn m(name: &str) -> MethodRef {
        MethodRef::new("app.Svc", name, Vec::<String>::new())
    }

    fn call(caller: &str, offset: usize) -> DirectCall {
        DirectCall {
            direct_caller: m(caller),
            line: Some(offset as u32),
            arguments: vec![format!("{}", offset)],
            offset,
            length: 5,
        }
    }

    #[test]
    fn test_one_row_per_root() {
        let mut g = CallGraph::new();
        g.add_edge(&m("target"), &m("mid"));
        g.add_edge(&m("mid"), &m("r1"));
        g.add_edge(&m("mid"), &m("r2"));
        let rows = assemble(&[call("mid", 10)], &g, &CancellationToken::new()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.direct_caller == m("mid") && r.line == Some(10)));
        let origins: Vec<_> = rows.iter().map(|r| r.original_caller.clone()).collect();
        assert!(origins.contains(&m("r1")) && origins.contains(&m("r2")));
    }

    #[test]
    fn test_distinct_call_sites_never_collapse() {
        let mut g = CallGraph::new();
        g.add_edge(&m("target"), &m("mid"));
        let rows = assemble(&[call("mid", 10), call("mid", 10)], &g, &CancellationToken::new()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_pure_cycle_falls_back_to_direct_caller() {
        let mut g = CallGraph::new();
        g.add_edge(&m("mid"), &m("loop"));
        g.add_edge(&m("loop"), &m("mid"));
        let rows = assemble(&[call("mid", 3)], &g, &CancellationToken::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_self_origin());
    }

    #[test]
    fn test_cancelled_before_resolution() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = assemble(&[call("mid", 1)], &CallGraph::new(), &cancel);
        assert!(matches!(result, Err(FinderError::Cancelled)));
    }
}
