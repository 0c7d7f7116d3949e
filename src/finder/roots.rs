//! Phase 2: walk the reverse call graph back to every root caller.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use super::types::{CallGraph, MethodRef};

/// All root callers reachable backwards from `start`.
///
/// A root is a non-external method with no further non-external caller. Cycle
/// detection is per path: a method already on the current branch abandons that
/// branch, but the same method may still be visited again from a sibling branch.
/// The result is empty only when `start` is external or every path from it ends
/// in a pure cycle.
pub fn find_all_root_callers(start: &MethodRef, graph: &CallGraph) -> BTreeSet<MethodRef> {
    let mut roots = BTreeSet::new();
    let mut path = HashSet::new();
    walk(start, graph, &mut path, &mut roots);
    roots
}

fn walk<'g>(
    method: &'g MethodRef,
    graph: &'g CallGraph,
    path: &mut HashSet<&'g MethodRef>,
    roots: &mut BTreeSet<MethodRef>,
) {
    if !path.insert(method) {
        debug!(method = %method.display_name(), "Call cycle detected, abandoning branch");
        return;
    }

    let external = graph.is_external(method);
    let mut has_source_caller = false;
    if let Some(callers) = graph.callers_of(method) {
        for caller in callers {
            if graph.is_external(caller) {
                continue;
            }
            has_source_caller = true;
            walk(caller, graph, path, roots);
        }
    }

    // No caller in editable source: this is the last reportable origin on the chain.
    if !has_source_caller && !external {
        roots.insert(method.clone());
    }

    path.remove(method);
}
