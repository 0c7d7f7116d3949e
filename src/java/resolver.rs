//! Call-site resolution and target lookup over the index.

use tracing::{debug, warn};
use tree_sitter::Node;

use crate::error::FinderError;
use crate::finder::{CallSiteResolver, ExtractionFailure, MethodRef, ReferenceMatch};

use super::SourceIndex;
use super::parser_java::{compact, erase_type, new_java_parser};
use super::render::render_arguments;
use super::types::{MethodDef, TypeKind};

const CALL_KINDS: &[&str] = &[
    "method_invocation",
    "object_creation_expression",
    "explicit_constructor_invocation",
    "method_reference",
];

/// Climbing stops at these; a call is never found outside the caller's body.
const BOUNDARY_KINDS: &[&str] = &[
    "method_declaration",
    "constructor_declaration",
    "compact_constructor_declaration",
    "class_body",
    "program",
];

impl CallSiteResolver for SourceIndex {
    fn method_exists(&self, method: &MethodRef) -> bool {
        self.lookups.method_by_ref.contains_key(method)
    }

    fn is_external(&self, method: &MethodRef) -> bool {
        self.method(method).is_some_and(|def| self.file_of(def).external)
    }

    fn enclosing_method(&self, reference: &ReferenceMatch) -> Option<MethodRef> {
        if let Some(element) = &reference.element {
            return Some(element.clone());
        }
        let file_id = *self.file_by_path.get(reference.location.file.as_ref())?;
        self.innermost_method(file_id, reference.location.offset)
            .map(|def| def.method.clone())
    }

    fn extract_arguments(
        &self,
        caller: &MethodRef,
        target: &MethodRef,
        offset: usize,
        length: usize,
    ) -> Result<Vec<String>, ExtractionFailure> {
        let def = self.method(caller).ok_or(ExtractionFailure::NoSource)?;
        let content = &self.file_of(def).content;
        if offset + length > content.len() {
            return Err(ExtractionFailure::CallSiteNotFound);
        }
        let mut parser = new_java_parser().map_err(|_| ExtractionFailure::ParseError)?;
        let tree = parser.parse(content, None).ok_or(ExtractionFailure::ParseError)?;
        let source = content.as_bytes();

        let start = tree.root_node()
            .descendant_for_byte_range(offset, offset + length)
            .ok_or(ExtractionFailure::CallSiteNotFound)?;
        let call = covering_call(start).ok_or(ExtractionFailure::CallSiteNotFound)?;
        if !calls_target(call, target, source) {
            debug!(caller = %caller, target = %target, offset, "Covering call does not invoke the target");
            return Err(ExtractionFailure::CallSiteNotFound);
        }
        if call.has_error() {
            return Err(ExtractionFailure::ParseError);
        }
        let arguments = call.child_by_field_name("arguments").ok_or(ExtractionFailure::ArgumentsUnavailable)?;
        Ok(render_arguments(arguments, source))
    }

    fn line_number(&self, caller: &MethodRef, offset: usize) -> Option<u32> {
        self.method(caller).and_then(|def| self.file_of(def).line_of(offset))
    }
}

/// Smallest call expression containing `node`, within the same method body.
fn covering_call(node: Node) -> Option<Node> {
    let mut current = Some(node);
    while let Some(n) = current {
        if CALL_KINDS.contains(&n.kind()) {
            return Some(n);
        }
        if BOUNDARY_KINDS.contains(&n.kind()) {
            return None;
        }
        current = n.parent();
    }
    None
}

fn calls_target(call: Node, target: &MethodRef, source: &[u8]) -> bool {
    let text = |n: Node| n.utf8_text(source).unwrap_or("");
    match call.kind() {
        "method_invocation" => call.child_by_field_name("name").is_some_and(|n| text(n) == target.name()),
        "object_creation_expression" => target.is_constructor()
            && call.child_by_field_name("type").is_some_and(|t| {
                let ty = erase_type(text(t));
                ty.rsplit('.').next() == Some(target.simple_type_name())
            }),
        "explicit_constructor_invocation" => target.is_constructor(),
        "method_reference" => {
            let last = call.child(call.child_count().saturating_sub(1));
            match last {
                Some(n) if n.kind() == "new" => target.is_constructor(),
                Some(n) => text(n) == target.name(),
                None => false,
            }
        }
        _ => false,
    }
}

// ─── Target lookup ──────────────────────────────────────────────────

impl SourceIndex {
    /// Innermost declared method whose byte range contains `offset`.
    pub(crate) fn innermost_method(&self, file_id: u32, offset: usize) -> Option<&MethodDef> {
        self.lookups.methods_by_file.get(file_id as usize)?
            .iter()
            .map(|&id| &self.methods[id as usize])
            .filter(|def| def.contains(offset))
            .min_by_key(|def| def.span())
    }

    /// Resolve a user-supplied target: `pkg.Type#name`, `Type#name` or
    /// `Type#name(int,String)`.
    ///
    /// Without a parameter list the first declared overload is used. A name
    /// equal to the simple type name selects a constructor.
    pub fn resolve_target(&self, target: &str) -> Result<MethodRef, FinderError> {
        let invalid = |reason: &str| FinderError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        };
        let (ty, member) = target.trim().split_once('#')
            .ok_or_else(|| invalid("expected Type#method"))?;
        let (name, params) = match member.split_once('(') {
            Some((name, rest)) => {
                let inner = rest.strip_suffix(')').ok_or_else(|| invalid("unterminated parameter list"))?;
                let params: Vec<String> = if inner.trim().is_empty() {
                    Vec::new()
                } else {
                    inner.split(',').map(|p| erase_type(&compact(p))).collect()
                };
                (name.trim(), Some(params))
            }
            None => (member.trim(), None),
        };
        if ty.is_empty() || name.is_empty() {
            return Err(invalid("empty type or method name"));
        }

        let dotted = format!(".{}", ty);
        let type_ids: Vec<u32> = self.types.iter()
            .enumerate()
            .filter(|(_, def)| def.name == ty || (def.kind != TypeKind::Anonymous && def.name.ends_with(&dotted)))
            .map(|(id, _)| id as u32)
            .collect();
        if type_ids.is_empty() {
            return Err(invalid("type not found"));
        }

        let mut found: Vec<&MethodDef> = Vec::new();
        for &type_id in &type_ids {
            let Some(ids) = self.lookups.members.get(&(type_id, name.to_string())) else { continue };
            let overloads: Vec<&MethodDef> = ids.iter().map(|&id| &self.methods[id as usize]).collect();
            match &params {
                Some(params) => found.extend(overloads.into_iter().filter(|def| def.method.params() == *params)),
                None => {
                    if overloads.len() > 1 {
                        warn!(target = %target, overloads = overloads.len(), "Several overloads match, using the first declared");
                    }
                    found.extend(overloads.first());
                }
            }
        }

        match found.as_slice() {
            [] => Err(invalid(match params {
                Some(_) => "no method with that signature",
                None => "no method with that name",
            })),
            [first, rest @ ..] => {
                if !rest.is_empty() {
                    warn!(target = %target, candidates = found.len(), chosen = %first.method, "Ambiguous target");
                }
                Ok(first.method.clone())
            }
        }
    }

    /// Declared methods whose name contains `needle`, case-insensitively, sorted by identifier.
    pub fn find_methods(&self, needle: &str) -> Vec<&MethodDef> {
        let needle = needle.to_lowercase();
        let mut found: Vec<&MethodDef> = self.methods.iter()
            .filter(|def| def.method.name().to_lowercase().contains(&needle))
            .collect();
        found.sort_by(|a, b| a.method.cmp(&b.method));
        found
    }
}
