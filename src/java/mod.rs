//! Java source index: the reference provider and call-site resolver used by the CLI.
//!
//! The index is an immutable in-memory snapshot of every `.java` file under the
//! configured roots, parsed with tree-sitter. Receiver types are resolved from
//! declarations visible in the source (locals, parameters, fields, type names);
//! anything beyond that is reported as a potential match.

mod parser_java;
mod references;
mod render;
mod resolver;
mod types;

pub use render::{Expr, LambdaBody};
pub use types::*;

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use ignore::WalkBuilder;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::FinderError;
use crate::finder::MethodRef;
use crate::{clean_path, read_file_lossy};

use parser_java::{new_java_parser, parse_java_file};

// ─── Configuration ───────────────────────────────────────────────────

/// Which files to index and which of them are library code.
#[derive(Debug, Clone, Default)]
pub struct IndexConfig {
    pub source_roots: Vec<PathBuf>,
    /// Everything under these roots is external
    pub library_roots: Vec<PathBuf>,
    /// Source files whose path matches one of these are external too
    pub library_patterns: Vec<Regex>,
    pub hidden: bool,
    pub no_ignore: bool,
    /// Worker threads for walking and parsing; 0 means one per core
    pub threads: usize,
}

impl IndexConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        IndexConfig { source_roots: vec![root.into()], ..Self::default() }
    }

    /// Compile and add library path patterns.
    pub fn with_library_patterns<I, S>(mut self, patterns: I) -> Result<Self, FinderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(pattern).map_err(|source| FinderError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            self.library_patterns.push(regex);
        }
        Ok(self)
    }

    pub fn is_library_path(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        self.library_patterns.iter().any(|p| p.is_match(&normalized))
    }
}

// ─── Index ───────────────────────────────────────────────────────────

/// Parsed Java sources with the lookup tables used for reference search.
#[derive(Debug)]
pub struct SourceIndex {
    pub(crate) files: Vec<SourceFile>,
    pub(crate) types: Vec<TypeDef>,
    pub(crate) methods: Vec<MethodDef>,
    pub(crate) lookups: Lookups,
    pub(crate) file_by_path: HashMap<String, u32>,
    stats: IndexStats,
}

/// One file read from disk, before merging.
struct LoadedFile {
    file: SourceFile,
    parsed: Option<ParsedFile>,
    lossy: bool,
}

impl SourceIndex {
    /// Walk the configured roots and parse every `.java` file in parallel.
    pub fn build(config: &IndexConfig) -> Result<SourceIndex, FinderError> {
        let start = Instant::now();
        // Fail before walking anything if the grammar cannot be loaded.
        new_java_parser().map_err(|e| FinderError::Unexpected(format!("Failed to load Java grammar: {}", e)))?;

        let mut seen = HashSet::new();
        let mut files: Vec<(String, bool)> = Vec::new();
        // Library roots first, so a library nested inside a source root stays external.
        let roots = config.library_roots.iter().map(|r| (r, true))
            .chain(config.source_roots.iter().map(|r| (r, false)));
        for (root, external) in roots {
            if !root.exists() {
                return Err(FinderError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Source root not found: {}", root.display()),
                )));
            }
            for path in collect_java_files(root, config) {
                if seen.insert(path.clone()) {
                    let external = external || config.is_library_path(&path);
                    files.push((path, external));
                }
            }
        }
        files.sort();

        let total_files = files.len();
        let external_files = files.iter().filter(|(_, ext)| *ext).count();
        eprintln!("[index] Found {} Java files ({} external)", total_files, external_files);

        // ─── Parallel parsing ─────────────────────────────────────
        let num_threads = if config.threads > 0 {
            config.threads
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        };
        let chunk_size = total_files.div_ceil(num_threads).max(1);
        let chunks: Vec<&[(String, bool)]> = files.chunks(chunk_size).collect();
        eprintln!("[index] Parsing with {} threads ({} files/chunk)", chunks.len(), chunk_size);

        let thread_results: Vec<(Vec<LoadedFile>, usize)> = std::thread::scope(|s| {
            let handles: Vec<_> = chunks.into_iter().map(|chunk| {
                s.spawn(move || {
                    let mut loaded = Vec::with_capacity(chunk.len());
                    let mut read_errors = 0usize;
                    let mut parser = new_java_parser().ok();
                    for (path, external) in chunk {
                        let (content, lossy) = match read_file_lossy(Path::new(path)) {
                            Ok(r) => r,
                            Err(e) => {
                                debug!(path = %path, error = %e, "Skipping unreadable file");
                                read_errors += 1;
                                continue;
                            }
                        };
                        let parsed = parser.as_mut().and_then(|p| parse_java_file(p, &content));
                        loaded.push(LoadedFile { file: SourceFile::new(path, content, *external), parsed, lossy });
                    }
                    (loaded, read_errors)
                })
            }).collect();

            handles.into_iter().map(|h| h.join().unwrap_or_else(|_| {
                eprintln!("[WARN] Worker thread panicked while parsing Java sources");
                (Vec::new(), 0)
            })).collect()
        });

        let mut loaded = Vec::with_capacity(total_files);
        let mut stats = IndexStats::default();
        for (chunk, read_errors) in thread_results {
            stats.read_errors += read_errors;
            loaded.extend(chunk);
        }
        for f in loaded.iter().filter(|f| f.lossy) {
            eprintln!("[index] WARNING: file contains non-UTF8 bytes (lossy conversion applied): {}", f.file.path);
        }
        stats.lossy_files = loaded.iter().filter(|f| f.lossy).count();

        let mut index = Self::assemble(loaded, stats);
        index.stats.elapsed = start.elapsed();
        let s = &index.stats;
        eprintln!(
            "[index] Parsed {} files in {:.1}s: {} external, {} read errors, {} with syntax errors, {} lossy-utf8, {} threads",
            s.files, s.elapsed.as_secs_f64(), s.external_files, s.read_errors, s.files_with_syntax_errors, s.lossy_files, num_threads
        );
        eprintln!("[index] Extracted {} types, {} methods, {} call sites", s.types, s.methods, s.call_sites);
        Ok(index)
    }

    /// Build an index from in-memory `(path, content, external)` sources.
    pub fn from_sources<P, C>(sources: impl IntoIterator<Item = (P, C, bool)>) -> Result<SourceIndex, FinderError>
    where
        P: AsRef<str>,
        C: Into<String>,
    {
        let start = Instant::now();
        let mut parser = new_java_parser()
            .map_err(|e| FinderError::Unexpected(format!("Failed to load Java grammar: {}", e)))?;
        let loaded = sources.into_iter().map(|(path, content, external)| {
            let content = content.into();
            let parsed = parse_java_file(&mut parser, &content);
            LoadedFile { file: SourceFile::new(path.as_ref(), content, external), parsed, lossy: false }
        }).collect();
        let mut index = Self::assemble(loaded, IndexStats::default());
        index.stats.elapsed = start.elapsed();
        Ok(index)
    }

    /// Merge per-file parser output: rebase ids, build lookups, resolve supertypes.
    fn assemble(loaded: Vec<LoadedFile>, mut stats: IndexStats) -> SourceIndex {
        let mut files = Vec::with_capacity(loaded.len());
        let mut types: Vec<TypeDef> = Vec::new();
        let mut methods: Vec<MethodDef> = Vec::new();
        let mut seen_methods: HashSet<MethodRef> = HashSet::new();

        for LoadedFile { mut file, parsed, .. } in loaded {
            let file_id = files.len() as u32;
            if let Some(parsed) = parsed {
                if parsed.has_errors {
                    stats.files_with_syntax_errors += 1;
                }
                file.package = parsed.package;
                file.imports = parsed.imports;
                file.wildcard_imports = parsed.wildcard_imports;
                file.static_imports = parsed.static_imports;

                let type_base = types.len() as u32;
                for mut def in parsed.types {
                    def.file_id = file_id;
                    def.outer = def.outer.map(|o| o + type_base);
                    types.push(def);
                }
                for mut def in parsed.methods {
                    if !seen_methods.insert(def.method.clone()) {
                        warn!(method = %def.method, file = %file.path, "Duplicate method declaration, keeping the first");
                        stats.duplicate_methods += 1;
                        continue;
                    }
                    def.file_id = file_id;
                    def.type_id += type_base;
                    methods.push(def);
                }
            } else {
                stats.files_with_syntax_errors += 1;
            }
            if file.external {
                stats.external_files += 1;
            }
            files.push(file);
        }

        stats.files = files.len();
        stats.types = types.len();
        stats.methods = methods.len();
        stats.call_sites = methods.iter().map(|m| m.calls.len()).sum();

        let file_by_path = files.iter().enumerate().map(|(i, f)| (f.path.to_string(), i as u32)).collect();
        let mut index = SourceIndex { files, types, methods, lookups: Lookups::default(), file_by_path, stats };
        index.build_lookups();
        index.resolve_supertypes();
        index
    }

    fn build_lookups(&mut self) {
        let lookups = &mut self.lookups;
        for (id, def) in self.types.iter().enumerate() {
            let id = id as u32;
            lookups.type_by_name.entry(def.name.clone()).or_insert(id);
        }

        lookups.methods_by_file = vec![Vec::new(); self.files.len()];
        for (id, def) in self.methods.iter().enumerate() {
            let id = id as u32;
            lookups.method_by_ref.insert(def.method.clone(), id);
            lookups.members.entry((def.type_id, def.method.name().to_string())).or_default().push(id);
            lookups.methods_by_name.entry(def.method.name().to_string()).or_default().push(id);
            lookups.methods_by_file[def.file_id as usize].push(id);
            for (call_idx, call) in def.calls.iter().enumerate() {
                lookups.calls_by_name.entry(call.name.clone()).or_default().push((id, call_idx as u32));
            }
        }
    }

    fn resolve_supertypes(&mut self) {
        let resolved: Vec<Vec<u32>> = self.types.iter()
            .map(|def| {
                def.supertypes.iter()
                    .filter_map(|name| self.resolve_type(name, def.file_id, def.outer))
                    .collect()
            })
            .collect();
        for (def, supers) in self.types.iter_mut().zip(resolved) {
            def.resolved_supertypes = supers;
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    pub fn method(&self, method: &MethodRef) -> Option<&MethodDef> {
        self.lookups.method_by_ref.get(method).map(|&id| &self.methods[id as usize])
    }

    pub fn file_of(&self, method: &MethodDef) -> &SourceFile {
        &self.files[method.file_id as usize]
    }

    // ─── Type resolution ────────────────────────────────────────────

    /// Resolve a type name as written in `file_id`, seen from inside `scope`.
    ///
    /// Order: exact qualified name, lexically enclosing types and their members
    /// (declared or inherited), single-type imports, same package, then on-demand
    /// imports. A single-type import hides every other type with that simple
    /// name. Library types outside the index give `None`.
    pub(crate) fn resolve_type(&self, name: &str, file_id: u32, scope: Option<u32>) -> Option<u32> {
        if name.contains('.')
            && let Some(&id) = self.lookups.type_by_name.get(name)
        {
            return Some(id);
        }
        let (head, rest) = match name.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (name, None),
        };
        let head_id = self.resolve_simple_type(head, file_id, scope)?;
        match rest {
            None => Some(head_id),
            Some(rest) => {
                let qualified = format!("{}.{}", self.types[head_id as usize].name, rest);
                self.lookups.type_by_name.get(&qualified).copied()
            }
        }
    }

    fn resolve_simple_type(&self, simple: &str, file_id: u32, scope: Option<u32>) -> Option<u32> {
        let by_name = |qualified: &str| self.lookups.type_by_name.get(qualified).copied();

        let mut current = scope;
        while let Some(id) = current {
            let def = &self.types[id as usize];
            if def.kind != TypeKind::Anonymous && def.simple_name == simple {
                return Some(id);
            }
            if let Some(found) = by_name(&format!("{}.{}", def.name, simple)) {
                return Some(found);
            }
            if let Some(found) = self.inherited_member_type(id, simple) {
                return Some(found);
            }
            current = def.outer;
        }

        let file = &self.files[file_id as usize];
        let suffix = format!(".{}", simple);
        if let Some(import) = file.imports.iter().find(|i| i.ends_with(&suffix)) {
            return by_name(import);
        }
        let in_package = if file.package.is_empty() { simple.to_string() } else { format!("{}.{}", file.package, simple) };
        if let Some(found) = by_name(&in_package) {
            return Some(found);
        }
        file.wildcard_imports.iter().find_map(|w| by_name(&format!("{}.{}", w, simple)))
    }

    /// Member type `simple` declared by a supertype of `type_id`.
    fn inherited_member_type(&self, type_id: u32, simple: &str) -> Option<u32> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<u32> = self.types[type_id as usize].resolved_supertypes.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let def = &self.types[id as usize];
            if let Some(&found) = self.lookups.type_by_name.get(&format!("{}.{}", def.name, simple)) {
                return Some(found);
            }
            queue.extend(def.resolved_supertypes.iter().copied());
        }
        None
    }

    /// The indexed superclass of a class. `None` for interfaces, for classes
    /// without an `extends` clause and for library superclasses.
    pub(crate) fn superclass(&self, type_id: u32) -> Option<u32> {
        let def = &self.types[type_id as usize];
        if def.kind == TypeKind::Interface {
            return None;
        }
        let first = def.supertypes.first()?;
        let id = self.resolve_type(first, def.file_id, def.outer)?;
        (self.types[id as usize].kind != TypeKind::Interface).then_some(id)
    }

    /// Methods named `name` accepting `arity` arguments in the first type along
    /// the supertype chain of `start` that declares any. `None` arity matches
    /// every overload (method references).
    pub(crate) fn lookup_in_hierarchy(&self, start: &[u32], name: &str, arity: Option<usize>) -> Vec<u32> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<u32> = start.iter().copied().collect();
        while let Some(type_id) = queue.pop_front() {
            if !visited.insert(type_id) {
                continue;
            }
            let candidates = self.declared_methods(type_id, name, arity);
            if !candidates.is_empty() {
                return candidates;
            }
            queue.extend(self.types[type_id as usize].resolved_supertypes.iter().copied());
        }
        Vec::new()
    }

    pub(crate) fn declared_methods(&self, type_id: u32, name: &str, arity: Option<usize>) -> Vec<u32> {
        self.lookups.members
            .get(&(type_id, name.to_string()))
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|&id| arity.is_none_or(|n| self.methods[id as usize].method.accepts_arity(n)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// All `.java` files under `root`, honouring the walk settings of `config`.
fn collect_java_files(root: &Path, config: &IndexConfig) -> Vec<String> {
    let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let mut walker = WalkBuilder::new(&root);
    walker.hidden(!config.hidden)
        .git_ignore(!config.no_ignore)
        .git_exclude(!config.no_ignore)
        .ignore(!config.no_ignore)
        .parents(!config.no_ignore);
    if config.threads > 0 {
        walker.threads(config.threads);
    }

    let found: Mutex<Vec<String>> = Mutex::new(Vec::new());
    walker.build_parallel().run(|| {
        let found = &found;
        Box::new(move |entry| {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => return ignore::WalkState::Continue,
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                return ignore::WalkState::Continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("java")) {
                let clean = clean_path(&path.to_string_lossy());
                found.lock().unwrap_or_else(|e| e.into_inner()).push(clean);
            }
            ignore::WalkState::Continue
        })
    });
    found.into_inner().unwrap_or_else(|e| e.into_inner())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "java_tests.rs"]
mod tests;
