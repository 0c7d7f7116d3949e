//! Phase 1: breadth-first expansion of "who calls this method" into a reverse call graph.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace, warn};

use crate::error::{FinderError, ProviderError};

use super::cancel::CancellationToken;
use super::provider::{CallSiteResolver, ReferenceProvider};
use super::types::{Accuracy, CallGraph, DirectCall, MethodRef, ReferenceMatch};

/// Everything phase 1 produces for the root resolver and the assembler.
#[derive(Debug, Default)]
pub struct BuiltGraph {
    pub graph: CallGraph,
    /// Call sites onto the initial target, in discovery order
    pub direct_calls: Vec<DirectCall>,
    /// Number of methods whose references were queried
    pub methods_searched: usize,
}

/// Per-query traversal state. Owned by one `build` call and dropped with it.
struct Traversal {
    visited: HashSet<MethodRef>,
    queue: VecDeque<MethodRef>,
    /// Everything ever enqueued, so a method is never queued twice
    queued: HashSet<MethodRef>,
    /// External classification, asked once per discovered method
    external: HashMap<MethodRef, bool>,
    /// (direct caller, offset) pairs already recorded as direct calls
    recorded_sites: HashSet<(MethodRef, usize)>,
    built: BuiltGraph,
}

impl Traversal {
    fn seeded(target: &MethodRef) -> Self {
        let mut state = Traversal {
            visited: HashSet::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            external: HashMap::new(),
            recorded_sites: HashSet::new(),
            built: BuiltGraph::default(),
        };
        state.enqueue(target.clone());
        state
    }

    fn enqueue(&mut self, method: MethodRef) {
        if !self.visited.contains(&method) && self.queued.insert(method.clone()) {
            self.queue.push_back(method);
        }
    }

    fn classify(&mut self, resolver: &dyn CallSiteResolver, method: &MethodRef) -> bool {
        if let Some(&external) = self.external.get(method) {
            return external;
        }
        let external = resolver.is_external(method);
        if external {
            self.built.graph.mark_external(method);
        }
        self.external.insert(method.clone(), external);
        external
    }
}

/// Builds the reverse call graph reachable from one initial target.
pub struct CallGraphBuilder<'a> {
    provider: &'a dyn ReferenceProvider,
    resolver: &'a dyn CallSiteResolver,
}

impl<'a> CallGraphBuilder<'a> {
    pub fn new(provider: &'a dyn ReferenceProvider, resolver: &'a dyn CallSiteResolver) -> Self {
        Self { provider, resolver }
    }

    /// Run the traversal. Each distinct method is queried at most once.
    ///
    /// Returns `FinderError::Cancelled` as soon as cancellation is observed and
    /// `FinderError::ProviderUnavailable` when the provider cannot serve queries;
    /// per-method search failures are logged and skipped.
    pub fn build(&self, target: &MethodRef, cancel: &CancellationToken) -> Result<BuiltGraph, FinderError> {
        let mut state = Traversal::seeded(target);
        state.classify(self.resolver, target);

        loop {
            cancel.check()?;
            let Some(method) = state.queue.pop_front() else { break };
            if !state.visited.insert(method.clone()) {
                continue;
            }

            if !self.resolver.method_exists(&method) {
                warn!(method = %method, "Queued method no longer exists, skipping");
                continue;
            }

            debug!(method = %method.display_name(), pending = state.queue.len(), "Searching callers");

            let matches = match self.provider.search(&method, cancel) {
                Ok(matches) => matches,
                Err(ProviderError::Unavailable(message)) => {
                    return Err(FinderError::ProviderUnavailable(message));
                }
                Err(ProviderError::Query(message)) => {
                    let err = FinderError::SearchFailure { method: method.to_string(), message };
                    warn!(error = %err, "Skipping method, traversal continues");
                    continue;
                }
            };

            for reference in &matches {
                cancel.check()?;
                self.accept_match(&mut state, target, &method, reference, cancel)?;
            }
        }

        state.built.methods_searched = state.visited.len();
        Ok(state.built)
    }

    fn accept_match(
        &self,
        state: &mut Traversal,
        target: &MethodRef,
        searched: &MethodRef,
        reference: &ReferenceMatch,
        cancel: &CancellationToken,
    ) -> Result<(), FinderError> {
        if reference.accuracy != Accuracy::Exact {
            trace!(file = %reference.location.file, offset = reference.location.offset, "Ignoring potential match");
            return Ok(());
        }

        let offset = reference.location.offset;
        let Some(caller) = self.resolver.enclosing_method(reference) else {
            let err = FinderError::ResolutionFailure { file: reference.location.file.to_string(), offset };
            debug!(error = %err, "Dropping reference");
            return Ok(());
        };

        let caller_external = state.classify(self.resolver, &caller);
        state.built.graph.add_edge(searched, &caller);

        if searched == target && state.recorded_sites.insert((caller.clone(), offset)) {
            let length = reference.location.length;
            let arguments = match self.resolver.extract_arguments(&caller, target, offset, length) {
                Ok(arguments) => arguments,
                Err(failure) => {
                    let err = FinderError::ArgumentExtraction {
                        caller: caller.to_string(),
                        reason: failure.to_string(),
                    };
                    debug!(error = %err, "Substituting placeholder arguments");
                    vec![failure.placeholder().to_string()]
                }
            };
            cancel.check()?;
            let line = self.resolver.line_number(&caller, offset);
            state.built.direct_calls.push(DirectCall {
                direct_caller: caller.clone(),
                line,
                arguments,
                offset,
                length,
            });
        }

        if !caller_external {
            state.enqueue(caller);
        }
        Ok(())
    }
}
