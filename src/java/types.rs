//! Data model of the Java source index.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::finder::MethodRef;

// ─── Types ───────────────────────────────────────────────────────────

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Anonymous,
}

/// A declared (or anonymous) type.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Qualified name: `pkg.Outer.Inner`, or `pkg.Outer$1$Base` for anonymous classes
    pub name: String,
    pub simple_name: String,
    pub kind: TypeKind,
    pub file_id: u32,
    pub line: u32,
    /// Lexically enclosing type (index into `SourceIndex::types`)
    pub outer: Option<u32>,
    /// Superclass first (when present), then interfaces; as written, generics erased
    pub supertypes: Vec<String>,
    /// Supertypes resolved against the index; filled when the index is assembled
    pub resolved_supertypes: Vec<u32>,
}

// ─── Methods ─────────────────────────────────────────────────────────

/// A declared method or constructor with the call sites of its body.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub method: MethodRef,
    pub type_id: u32,
    pub file_id: u32,
    pub start_byte: usize,
    pub end_byte: usize,
    pub line_start: u32,
    pub line_end: u32,
    pub calls: Vec<CallSiteEntry>,
}

impl MethodDef {
    pub fn contains(&self, offset: usize) -> bool {
        self.start_byte <= offset && offset < self.end_byte
    }

    pub fn span(&self) -> usize {
        self.end_byte - self.start_byte
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `m(..)`, `recv.m(..)`, `super.m(..)`
    Method,
    /// `new T(..)`, with or without an anonymous body
    New,
    /// `super(..)`
    SuperConstructor,
    /// `this(..)`
    ThisConstructor,
    /// `T::m`, `expr::m`, `super::m`, `T::new`
    MethodReference,
}

/// Static type of a call receiver, as far as the parser could tell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Receiver {
    /// No receiver or `this`: the enclosing type, then its outer types
    Implicit,
    /// `super.m()` / `super::m`
    Super,
    /// A type name as written, generics erased
    Type(String),
    /// Receiver present but its type could not be determined
    Unknown,
}

/// One call expression inside a method body.
#[derive(Debug, Clone)]
pub struct CallSiteEntry {
    pub kind: CallKind,
    /// Method name; for `New` the simple name of the instantiated type; `new` for `T::new`
    pub name: String,
    pub receiver: Receiver,
    /// `None` for method references
    pub arg_count: Option<usize>,
    pub offset: usize,
    pub length: usize,
    pub line: u32,
}

// ─── Files ───────────────────────────────────────────────────────────

/// One parsed source file with its retained text.
#[derive(Debug)]
pub struct SourceFile {
    pub path: Arc<str>,
    pub content: String,
    /// Library code: never expanded, never reported as a root
    pub external: bool,
    pub package: String,
    /// Single-type imports, e.g. `java.util.List`
    pub imports: Vec<String>,
    /// On-demand imports (`a.b.*`), stored without the `.*`
    pub wildcard_imports: Vec<String>,
    /// Static single imports as (type, member)
    pub static_imports: Vec<(String, String)>,
    /// Byte offset of every line start
    pub line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(path: &str, content: String, external: bool) -> Self {
        let line_starts = compute_line_starts(&content);
        SourceFile {
            path: Arc::from(path),
            content,
            external,
            package: String::new(),
            imports: Vec::new(),
            wildcard_imports: Vec::new(),
            static_imports: Vec::new(),
            line_starts,
        }
    }

    /// 1-based line containing `offset`; `None` past the end of the file.
    pub fn line_of(&self, offset: usize) -> Option<u32> {
        if offset > self.content.len() {
            return None;
        }
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        Some(line as u32)
    }
}

pub(crate) fn compute_line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(content.bytes().enumerate().filter(|(_, b)| *b == b'\n').map(|(i, _)| i + 1))
        .collect()
}

// ─── Parser output ───────────────────────────────────────────────────

/// Per-file parser output. Type ids are local to the file until merged.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub package: String,
    pub imports: Vec<String>,
    pub wildcard_imports: Vec<String>,
    pub static_imports: Vec<(String, String)>,
    pub types: Vec<TypeDef>,
    pub methods: Vec<MethodDef>,
    pub has_errors: bool,
}

// ─── Statistics ──────────────────────────────────────────────────────

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub files: usize,
    pub external_files: usize,
    pub read_errors: usize,
    pub lossy_files: usize,
    pub files_with_syntax_errors: usize,
    pub types: usize,
    pub methods: usize,
    pub call_sites: usize,
    pub duplicate_methods: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Lookup tables built once when the index is assembled.
#[derive(Debug, Default)]
pub(crate) struct Lookups {
    pub type_by_name: HashMap<String, u32>,
    pub method_by_ref: HashMap<MethodRef, u32>,
    /// Methods per (type id, method name)
    pub members: HashMap<(u32, String), Vec<u32>>,
    pub methods_by_name: HashMap<String, Vec<u32>>,
    /// Call sites per callee name, as (method id, call index), in file then source order
    pub calls_by_name: HashMap<String, Vec<(u32, u32)>>,
    pub methods_by_file: Vec<Vec<u32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_of() {
        let file = SourceFile::new("A.java", "class A {\n  void f() {}\n}\n".to_string(), false);
        assert_eq!(file.line_of(0), Some(1));
        assert_eq!(file.line_of(9), Some(1));
        assert_eq!(file.line_of(10), Some(2));
        assert_eq!(file.line_of(12), Some(2));
        assert_eq!(file.line_of(file.content.len()), Some(4));
        assert_eq!(file.line_of(file.content.len() + 1), None);
    }

    #[test]
    fn test_line_starts_without_trailing_newline() {
        assert_eq!(compute_line_starts("a\nb"), vec![0, 2]);
        assert_eq!(compute_line_starts(""), vec![0]);
    }
}
