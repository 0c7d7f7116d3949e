//! Core data types shared by the call graph builder, root resolver and assembler.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Serialize, Serializer};

// ─── Method identity ─────────────────────────────────────────────────

/// Identifier of one declared method: `declaring.Type#name(ParamType,ParamType)`.
///
/// Cheap to clone (shared `Arc<str>`), immutable, ordered and hashable. Overloads
/// are distinct because the parameter list is part of the identity. Constructors
/// use the simple type name as their method name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef(Arc<str>);

impl MethodRef {
    pub fn new<I, S>(declaring_type: &str, name: &str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let params: Vec<String> = params.into_iter().map(|p| p.as_ref().trim().to_string()).collect();
        MethodRef(Arc::from(format!("{}#{}({})", declaring_type, name, params.join(","))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified declaring type, e.g. `com.acme.Billing.Ledger`.
    pub fn declaring_type(&self) -> &str {
        self.0.split_once('#').map(|(t, _)| t).unwrap_or(&self.0)
    }

    /// Last segment of the declaring type, e.g. `Ledger`. Anonymous types
    /// (`Outer$1$Base`) report their base type name.
    pub fn simple_type_name(&self) -> &str {
        let ty = self.declaring_type();
        ty.rsplit(['.', '$']).next().unwrap_or(ty)
    }

    pub fn name(&self) -> &str {
        let member = self.0.split_once('#').map(|(_, m)| m).unwrap_or("");
        member.split('(').next().unwrap_or(member)
    }

    /// Parameter types as written in the identifier (generics erased).
    pub fn params(&self) -> Vec<&str> {
        let inner = self.0
            .find('(')
            .and_then(|start| self.0.rfind(')').map(|end| &self.0[start + 1..end]))
            .unwrap_or("");
        if inner.is_empty() {
            Vec::new()
        } else {
            inner.split(',').collect()
        }
    }

    pub fn param_count(&self) -> usize {
        self.params().len()
    }

    pub fn is_varargs(&self) -> bool {
        self.params().last().is_some_and(|p| p.ends_with("..."))
    }

    /// Whether a call passing `arg_count` arguments can bind to this method.
    pub fn accepts_arity(&self, arg_count: usize) -> bool {
        let n = self.param_count();
        if self.is_varargs() {
            arg_count + 1 >= n
        } else {
            arg_count == n
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.name() == self.simple_type_name()
    }

    /// Short report form: `SimpleType#name`.
    pub fn display_name(&self) -> String {
        format!("{}#{}", self.simple_type_name(), self.name())
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodRef({})", self.0)
    }
}

impl FromStr for MethodRef {
    type Err = String;

    /// Parses the canonical form only; `Type#name` without a parameter list is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (ty, member) = s.split_once('#')
            .ok_or_else(|| format!("Missing '#' in method identifier: '{}'", s))?;
        let open = member.find('(')
            .ok_or_else(|| format!("Missing parameter list in method identifier: '{}'", s))?;
        if !member.ends_with(')') {
            return Err(format!("Unterminated parameter list in method identifier: '{}'", s));
        }
        let name = &member[..open];
        if ty.is_empty() || name.is_empty() {
            return Err(format!("Empty type or method name in method identifier: '{}'", s));
        }
        let params = &member[open + 1..member.len() - 1];
        let params: Vec<&str> = if params.trim().is_empty() { Vec::new() } else { params.split(',').collect() };
        Ok(MethodRef::new(ty, name, params))
    }
}

impl Serialize for MethodRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// ─── References ──────────────────────────────────────────────────────

/// Confidence reported by the reference provider for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accuracy {
    /// The reference is known to bind to the searched method
    Exact,
    /// Best-effort match (e.g. unknown receiver type); never used for graph edges
    Potential,
}

/// A byte span inside one source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub offset: usize,
    pub length: usize,
}

/// One reference to a searched method, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMatch {
    pub location: SourceLocation,
    pub accuracy: Accuracy,
    /// Enclosing element already known to the provider, if any
    pub element: Option<MethodRef>,
}

// ─── Argument extraction ─────────────────────────────────────────────

/// Why the arguments of a direct call site could not be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionFailure {
    /// The caller has no source available
    NoSource,
    /// The caller's source could not be parsed
    ParseError,
    /// No invocation of the target covers the reported span
    CallSiteNotFound,
    /// The call site was located but carries no argument list
    ArgumentsUnavailable,
}

impl ExtractionFailure {
    pub const ALL: [ExtractionFailure; 4] = [
        Self::NoSource, Self::ParseError, Self::CallSiteNotFound, Self::ArgumentsUnavailable,
    ];

    /// Single-value argument list substituted for the real arguments.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::NoSource => "no-source",
            Self::ParseError => "parse-error",
            Self::CallSiteNotFound => "call-site-not-found",
            Self::ArgumentsUnavailable => "arguments-unavailable",
        }
    }

    pub fn from_placeholder(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.placeholder() == s)
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoSource => "no source available",
            Self::ParseError => "source could not be parsed",
            Self::CallSiteNotFound => "call site not found",
            Self::ArgumentsUnavailable => "arguments unavailable",
        };
        f.write_str(text)
    }
}

// ─── Direct calls and results ────────────────────────────────────────

/// One concrete call site onto the initial target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectCall {
    pub direct_caller: MethodRef,
    /// 1-based line of the call site, `None` when unknown
    pub line: Option<u32>,
    pub arguments: Vec<String>,
    pub offset: usize,
    pub length: usize,
}

/// One result row: a root caller reaching the target through a direct call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInfo {
    pub original_caller: MethodRef,
    pub direct_caller: MethodRef,
    pub line: Option<u32>,
    pub arguments: Vec<String>,
}

impl CallInfo {
    pub fn new(original_caller: MethodRef, call: &DirectCall) -> Self {
        Self {
            original_caller,
            direct_caller: call.direct_caller.clone(),
            line: call.line,
            arguments: call.arguments.clone(),
        }
    }

    /// Arguments joined with `", "` (empty for a call without arguments).
    pub fn arguments_display(&self) -> String {
        self.arguments.join(", ")
    }

    /// The row reports the direct caller as its own origin (no root was found).
    pub fn is_self_origin(&self) -> bool {
        self.original_caller == self.direct_caller
    }

    /// The extraction failure encoded in `arguments`, if any.
    pub fn extraction_failure(&self) -> Option<ExtractionFailure> {
        match self.arguments.as_slice() {
            [only] => ExtractionFailure::from_placeholder(only),
            _ => None,
        }
    }
}

// ─── Call graph ──────────────────────────────────────────────────────

/// Reverse adjacency map (callee -> callers) built by one traversal.
///
/// Append-only; caller sets are ordered so iteration is deterministic. The graph
/// also remembers which discovered methods are external (library code).
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    callers: HashMap<MethodRef, BTreeSet<MethodRef>>,
    external: HashSet<MethodRef>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `callee <- caller`. Returns false when the edge already existed.
    pub fn add_edge(&mut self, callee: &MethodRef, caller: &MethodRef) -> bool {
        self.callers.entry(callee.clone()).or_default().insert(caller.clone())
    }

    pub fn callers_of(&self, callee: &MethodRef) -> Option<&BTreeSet<MethodRef>> {
        self.callers.get(callee)
    }

    pub fn mark_external(&mut self, method: &MethodRef) {
        self.external.insert(method.clone());
    }

    pub fn is_external(&self, method: &MethodRef) -> bool {
        self.external.contains(method)
    }

    pub fn edge_count(&self) -> usize {
        self.callers.values().map(|c| c.len()).sum()
    }
}
