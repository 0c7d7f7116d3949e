//! In-memory codebase used by the finder tests: a scripted reference provider
//! and call-site resolver.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::ProviderError;

use super::*;

/// Method `app.Code#<name>()`.
pub(crate) fn m(name: &str) -> MethodRef {
    MethodRef::new("app.Code", name, Vec::<String>::new())
}

#[derive(Default)]
pub(crate) struct FakeCodebase {
    methods: HashSet<MethodRef>,
    external: HashSet<MethodRef>,
    references: HashMap<MethodRef, Vec<ReferenceMatch>>,
    enclosing: HashMap<(Arc<str>, usize), MethodRef>,
    failures: HashMap<MethodRef, ProviderError>,
    argument_failures: HashMap<usize, ExtractionFailure>,
    cancel_on: HashMap<MethodRef, CancellationToken>,
    next_offset: usize,
    searched: Mutex<Vec<MethodRef>>,
}

impl FakeCodebase {
    pub(crate) fn new() -> Self {
        Self { next_offset: 100, ..Self::default() }
    }

    pub(crate) fn method(&mut self, name: &str) -> MethodRef {
        let method = m(name);
        self.methods.insert(method.clone());
        method
    }

    pub(crate) fn external(&mut self, name: &str) -> MethodRef {
        let method = self.method(name);
        self.external.insert(method.clone());
        method
    }

    /// `caller` calls `callee` at a fresh offset; returns the offset.
    pub(crate) fn call(&mut self, caller: &str, callee: &str) -> usize {
        let offset = self.next_offset;
        self.next_offset += 100;
        self.call_at(caller, callee, offset, Accuracy::Exact);
        offset
    }

    /// Report a reference at an explicit offset (repeat it to simulate duplicates).
    pub(crate) fn call_at(&mut self, caller: &str, callee: &str, offset: usize, accuracy: Accuracy) {
        let caller_ref = self.method(caller);
        let callee_ref = self.method(callee);
        let file: Arc<str> = Arc::from(format!("{}.java", caller));
        self.enclosing.insert((file.clone(), offset), caller_ref);
        self.references.entry(callee_ref).or_default().push(ReferenceMatch {
            location: SourceLocation { file, offset, length: 12 },
            accuracy,
            element: None,
        });
    }

    /// A reference to `callee` whose enclosing method cannot be resolved.
    pub(crate) fn orphan_reference(&mut self, callee: &str) {
        let callee_ref = self.method(callee);
        let offset = self.next_offset;
        self.next_offset += 100;
        self.references.entry(callee_ref).or_default().push(ReferenceMatch {
            location: SourceLocation { file: Arc::from("Static.java"), offset, length: 4 },
            accuracy: Accuracy::Exact,
            element: None,
        });
    }

    pub(crate) fn fail_search(&mut self, name: &str, error: ProviderError) {
        let method = self.method(name);
        self.failures.insert(method, error);
    }

    pub(crate) fn fail_arguments(&mut self, offset: usize, failure: ExtractionFailure) {
        self.argument_failures.insert(offset, failure);
    }

    /// The method disappears from the codebase but stays referenced.
    pub(crate) fn remove(&mut self, name: &str) {
        self.methods.remove(&m(name));
    }

    /// Cancel `token` when the references of `name` are queried.
    pub(crate) fn cancel_when_searching(&mut self, name: &str, token: &CancellationToken) {
        self.cancel_on.insert(m(name), token.clone());
    }

    pub(crate) fn searched(&self) -> Vec<MethodRef> {
        self.searched.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ReferenceProvider for FakeCodebase {
    fn search(&self, method: &MethodRef, _cancel: &CancellationToken) -> Result<Vec<ReferenceMatch>, ProviderError> {
        self.searched.lock().unwrap_or_else(|e| e.into_inner()).push(method.clone());
        if let Some(token) = self.cancel_on.get(method) {
            token.cancel();
        }
        if let Some(err) = self.failures.get(method) {
            return Err(err.clone());
        }
        Ok(self.references.get(method).cloned().unwrap_or_default())
    }
}

impl CallSiteResolver for FakeCodebase {
    fn method_exists(&self, method: &MethodRef) -> bool {
        self.methods.contains(method)
    }

    fn is_external(&self, method: &MethodRef) -> bool {
        self.external.contains(method)
    }

    fn enclosing_method(&self, reference: &ReferenceMatch) -> Option<MethodRef> {
        let key = (reference.location.file.clone(), reference.location.offset);
        self.enclosing.get(&key).cloned()
    }

    fn extract_arguments(
        &self,
        _caller: &MethodRef,
        _target: &MethodRef,
        offset: usize,
        _length: usize,
    ) -> Result<Vec<String>, ExtractionFailure> {
        match self.argument_failures.get(&offset) {
            Some(failure) => Err(*failure),
            None => Ok(vec![format!("\"site-{}\"", offset)]),
        }
    }

    fn line_number(&self, _caller: &MethodRef, offset: usize) -> Option<u32> {
        (offset >= 100).then(|| (offset / 100) as u32)
    }
}
