//! Collaborator seams: reference search and call-site resolution.
//!
//! The finder only talks to the codebase through these two traits. The
//! `java` module implements both over a tree-sitter source index; tests use
//! an in-memory fake.

use crate::error::ProviderError;

use super::cancel::CancellationToken;
use super::types::{ExtractionFailure, MethodRef, ReferenceMatch};

/// Symbol reference search: "where is this method referenced?"
pub trait ReferenceProvider: Send + Sync {
    /// All references to `method`, in a deterministic order.
    ///
    /// Implementations should honour `cancel` between expensive steps and may
    /// return early (with any result) once it is set; the caller re-checks it.
    fn search(&self, method: &MethodRef, cancel: &CancellationToken) -> Result<Vec<ReferenceMatch>, ProviderError>;
}

/// Source-level facts about methods and call sites.
pub trait CallSiteResolver: Send + Sync {
    /// Whether `method` still exists in the codebase.
    fn method_exists(&self, method: &MethodRef) -> bool;

    /// Whether `method` is declared in library (non-editable) code.
    fn is_external(&self, method: &MethodRef) -> bool;

    /// The method enclosing a reference; `None` when it cannot be determined.
    fn enclosing_method(&self, reference: &ReferenceMatch) -> Option<MethodRef>;

    /// Render the arguments of the call onto `target` that covers
    /// `offset..offset + length` in `caller`'s source.
    fn extract_arguments(
        &self,
        caller: &MethodRef,
        target: &MethodRef,
        offset: usize,
        length: usize,
    ) -> Result<Vec<String>, ExtractionFailure>;

    /// 1-based line of `offset` in `caller`'s source file.
    fn line_number(&self, caller: &MethodRef, offset: usize) -> Option<u32>;
}
