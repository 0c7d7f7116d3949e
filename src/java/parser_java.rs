//! Java AST parser using tree-sitter: extracts types, methods and call sites.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::finder::MethodRef;

use super::types::*;

// ─── Main entry point ───────────────────────────────────────────────

pub(crate) fn new_java_parser() -> Result<tree_sitter::Parser, tree_sitter::LanguageError> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_java::LANGUAGE.into())?;
    Ok(parser)
}

/// Parse one compilation unit. `None` only when tree-sitter gives up entirely.
///
/// Type ids are local to the file and file ids are left at 0; both are
/// rebased when the file is merged into the index.
pub(crate) fn parse_java_file(parser: &mut tree_sitter::Parser, source: &str) -> Option<ParsedFile> {
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();

    let mut walker = Walker {
        source: source.as_bytes(),
        out: ParsedFile { has_errors: root.has_error(), ..ParsedFile::default() },
        anonymous_counters: HashMap::new(),
    };
    let mut scopes = Vec::new();
    for child in children(root) {
        match child.kind() {
            "package_declaration" => walker.read_package(child),
            "import_declaration" => walker.read_import(child),
            _ => walker.walk_declaration(child, &mut scopes),
        }
    }
    Some(walker.out)
}

// ─── Walker state ───────────────────────────────────────────────────

/// Lexical type scope used to resolve receiver variables to field types.
struct TypeScope {
    id: u32,
    fields: HashMap<String, String>,
    type_params: Vec<String>,
}

/// Per-method state while its body is walked.
#[derive(Default)]
struct MethodCtx {
    calls: Vec<CallSiteEntry>,
    /// Parameters and local variables, innermost block last. An empty type
    /// marks a variable whose type is not written out (`var`, untyped lambda
    /// parameters, multi-catch).
    locals: Vec<HashMap<String, String>>,
    type_params: Vec<String>,
}

impl MethodCtx {
    fn declare(&mut self, name: String, ty: String) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name, ty);
        }
    }

    fn local(&self, name: &str) -> Option<&String> {
        self.locals.iter().rev().find_map(|scope| scope.get(name))
    }
}

/// Nodes that open a block scope for local variables.
fn opens_scope(kind: &str) -> bool {
    matches!(
        kind,
        "block" | "for_statement" | "enhanced_for_statement" | "catch_clause" | "lambda_expression"
            | "try_with_resources_statement" | "switch_block_statement_group" | "switch_rule"
    )
}

struct Walker<'s> {
    source: &'s [u8],
    out: ParsedFile,
    /// Anonymous classes created so far per enclosing type
    anonymous_counters: HashMap<u32, u32>,
}

impl<'s> Walker<'s> {
    fn text(&self, node: Node) -> &'s str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn read_package(&mut self, node: Node) {
        if let Some(name) = children(node).into_iter().find(|c| c.kind() != "annotation" && c.kind() != "marker_annotation") {
            self.out.package = compact(self.text(name));
        }
    }

    fn read_import(&mut self, node: Node) {
        let text = self.text(node);
        let body = text.trim().trim_start_matches("import").trim_end_matches(';').trim();
        let (is_static, body) = match body.strip_prefix("static") {
            Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest),
            _ => (false, body),
        };
        let path = compact(body);
        if let Some(package) = path.strip_suffix(".*") {
            if !is_static {
                self.out.wildcard_imports.push(package.to_string());
            }
        } else if is_static {
            if let Some((ty, member)) = path.rsplit_once('.') {
                self.out.static_imports.push((ty.to_string(), member.to_string()));
            }
        } else {
            self.out.imports.push(path);
        }
    }

    // ─── Declarations ───────────────────────────────────────────────

    /// Type declarations at any level, including local classes in method bodies.
    fn walk_declaration(&mut self, node: Node, scopes: &mut Vec<TypeScope>) {
        let kind = match node.kind() {
            "class_declaration" => TypeKind::Class,
            "interface_declaration" => TypeKind::Interface,
            "enum_declaration" => TypeKind::Enum,
            "record_declaration" => TypeKind::Record,
            _ => return,
        };
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let simple_name = self.text(name_node).to_string();
        let name = match scopes.last() {
            Some(scope) => format!("{}.{}", self.out.types[scope.id as usize].name, simple_name),
            None if self.out.package.is_empty() => simple_name.clone(),
            None => format!("{}.{}", self.out.package, simple_name),
        };

        let mut supertypes = Vec::new();
        if let Some(superclass) = node.child_by_field_name("superclass")
            && let Some(ty) = children(superclass).into_iter().find(|c| is_type_node(c.kind()))
        {
            supertypes.push(erase_type(self.text(ty)));
        }
        let interfaces = node.child_by_field_name("interfaces")
            .or_else(|| find_child_by_kind(node, "extends_interfaces"));
        if let Some(list) = interfaces.and_then(|i| find_child_by_kind(i, "type_list")) {
            supertypes.extend(children(list).into_iter().filter(|c| is_type_node(c.kind())).map(|c| erase_type(self.text(c))));
        }

        let id = self.push_type(TypeDef {
            name,
            simple_name,
            kind,
            file_id: 0,
            line: node.start_position().row as u32 + 1,
            outer: scopes.last().map(|s| s.id),
            supertypes,
            resolved_supertypes: Vec::new(),
        });

        let mut fields = HashMap::new();
        let mut record_components = Vec::new();
        if kind == TypeKind::Record
            && let Some(params) = node.child_by_field_name("parameters")
        {
            for (ty, name) in self.formal_parameters(params) {
                fields.insert(name.clone(), ty.clone());
                record_components.push(ty);
            }
        }
        let type_params = node.child_by_field_name("type_parameters")
            .map(|p| self.type_parameters(p))
            .unwrap_or_default();

        let Some(body) = node.child_by_field_name("body") else { return };
        self.collect_fields(body, &mut fields);
        scopes.push(TypeScope { id, fields, type_params });
        self.walk_members(body, scopes, &record_components);
        scopes.pop();
    }

    fn push_type(&mut self, def: TypeDef) -> u32 {
        self.out.types.push(def);
        (self.out.types.len() - 1) as u32
    }

    fn collect_fields(&self, body: Node, fields: &mut HashMap<String, String>) {
        for member in children(body) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    let Some(ty) = member.child_by_field_name("type") else { continue };
                    let ty = erase_type(self.text(ty));
                    let mut cursor = member.walk();
                    for declarator in member.children_by_field_name("declarator", &mut cursor) {
                        if let Some(name) = declarator.child_by_field_name("name") {
                            fields.entry(self.text(name).to_string()).or_insert_with(|| ty.clone());
                        }
                    }
                }
                "enum_body_declarations" => self.collect_fields(member, fields),
                _ => {}
            }
        }
    }

    fn walk_members(&mut self, body: Node, scopes: &mut Vec<TypeScope>, record_components: &[String]) {
        for member in children(body) {
            match member.kind() {
                "method_declaration" | "constructor_declaration" => self.walk_method(member, scopes, None),
                "compact_constructor_declaration" => self.walk_method(member, scopes, Some(record_components)),
                "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration" => {
                    self.walk_declaration(member, scopes)
                }
                "enum_body_declarations" => self.walk_members(member, scopes, record_components),
                "enum_constant" => {
                    // Constant arguments run outside any method; only a constant body declares anything.
                    if let Some(class_body) = member.child_by_field_name("body")
                        && let Some(scope) = scopes.last()
                    {
                        let base = self.out.types[scope.id as usize].simple_name.clone();
                        self.walk_anonymous(&base, class_body, member, scopes);
                    }
                }
                // Field initializers and initializer blocks: no enclosing method,
                // but anonymous and local classes inside them still declare methods.
                _ => self.walk_body(member, scopes, None),
            }
        }
    }

    /// `record_components` is set for compact record constructors, whose
    /// parameters are the record components.
    fn walk_method(&mut self, node: Node, scopes: &mut Vec<TypeScope>, record_components: Option<&[String]>) {
        let Some(scope) = scopes.last() else { return };
        let type_id = scope.id;
        let is_constructor = node.kind() != "method_declaration";
        let name = if is_constructor {
            self.out.types[type_id as usize].simple_name.clone()
        } else {
            match node.child_by_field_name("name") {
                Some(n) => self.text(n).to_string(),
                None => return,
            }
        };

        let mut ctx = MethodCtx { locals: vec![HashMap::new()], ..MethodCtx::default() };
        let param_types: Vec<String> = match record_components {
            Some(components) => components.to_vec(),
            None => {
                let params = node.child_by_field_name("parameters")
                    .map(|p| self.formal_parameters(p))
                    .unwrap_or_default();
                let types = params.iter().map(|(ty, _)| ty.clone()).collect();
                for (ty, name) in params {
                    ctx.declare(name, ty.replace("...", "[]"));
                }
                types
            }
        };
        if let Some(tp) = node.child_by_field_name("type_parameters") {
            ctx.type_params = self.type_parameters(tp);
        }

        let type_name = self.out.types[type_id as usize].name.clone();
        let method_idx = self.out.methods.len();
        self.out.methods.push(MethodDef {
            method: MethodRef::new(&type_name, &name, &param_types),
            type_id,
            file_id: 0,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            line_start: node.start_position().row as u32 + 1,
            line_end: node.end_position().row as u32 + 1,
            calls: Vec::new(),
        });

        if let Some(body) = node.child_by_field_name("body") {
            self.walk_body(body, scopes, Some(&mut ctx));
        }
        self.out.methods[method_idx].calls = ctx.calls;
    }

    fn walk_anonymous(&mut self, base: &str, class_body: Node, creation: Node, scopes: &mut Vec<TypeScope>) {
        let Some(scope) = scopes.last() else { return };
        let outer = scope.id;
        let ordinal = {
            let counter = self.anonymous_counters.entry(outer).or_insert(0);
            *counter += 1;
            *counter
        };
        let simple_name = base.rsplit('.').next().unwrap_or(base).to_string();
        let id = self.push_type(TypeDef {
            name: format!("{}${}${}", self.out.types[outer as usize].name, ordinal, simple_name),
            simple_name,
            kind: TypeKind::Anonymous,
            file_id: 0,
            line: creation.start_position().row as u32 + 1,
            outer: Some(outer),
            supertypes: vec![base.to_string()],
            resolved_supertypes: Vec::new(),
        });

        let mut fields = HashMap::new();
        self.collect_fields(class_body, &mut fields);
        scopes.push(TypeScope { id, fields, type_params: Vec::new() });
        self.walk_members(class_body, scopes, &[]);
        scopes.pop();
    }

    // ─── Method bodies ──────────────────────────────────────────────

    /// Walk statements and expressions. Call sites are recorded only when `ctx`
    /// is present; nested class bodies always get their own scope.
    fn walk_body(&mut self, node: Node, scopes: &mut Vec<TypeScope>, mut ctx: Option<&mut MethodCtx>) {
        let scoped = opens_scope(node.kind());
        if scoped && let Some(ctx) = ctx.as_deref_mut() {
            ctx.locals.push(HashMap::new());
        }
        match node.kind() {
            "method_invocation" | "explicit_constructor_invocation" | "method_reference" => {
                if let Some(ctx) = ctx.as_deref_mut()
                    && let Some(call) = self.call_site(node, scopes, ctx)
                {
                    ctx.calls.push(call);
                }
            }
            "object_creation_expression" => {
                if let Some(ctx) = ctx.as_deref_mut()
                    && let Some(call) = self.call_site(node, scopes, ctx)
                {
                    ctx.calls.push(call);
                }
                for child in children(node) {
                    if child.kind() == "class_body" {
                        let base = node.child_by_field_name("type")
                            .map(|t| erase_type(self.text(t)))
                            .unwrap_or_default();
                        self.walk_anonymous(&base, child, node, scopes);
                    } else {
                        self.walk_body(child, scopes, ctx.as_deref_mut());
                    }
                }
                return;
            }
            "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration" => {
                self.walk_declaration(node, scopes);
                return;
            }
            "local_variable_declaration" | "field_declaration" => {
                if let Some(ctx) = ctx.as_deref_mut() {
                    self.declare_locals(node, ctx);
                }
            }
            "enhanced_for_statement" | "resource" | "catch_formal_parameter" | "instanceof_expression" => {
                if let Some(ctx) = ctx.as_deref_mut() {
                    self.declare_typed_name(node, ctx);
                }
            }
            "lambda_expression" => {
                if let Some(ctx) = ctx.as_deref_mut()
                    && let Some(params) = node.child_by_field_name("parameters")
                {
                    match params.kind() {
                        "formal_parameters" => {
                            for (ty, name) in self.formal_parameters(params) {
                                ctx.declare(name, ty);
                            }
                        }
                        "identifier" => ctx.declare(self.text(params).to_string(), String::new()),
                        _ => {
                            for param in children(params).into_iter().filter(|p| p.kind() == "identifier") {
                                ctx.declare(self.text(param).to_string(), String::new());
                            }
                        }
                    }
                }
            }
            _ => {}
        }

        for child in children(node) {
            self.walk_body(child, scopes, ctx.as_deref_mut());
        }
        if scoped && let Some(ctx) = ctx {
            ctx.locals.pop();
        }
    }

    fn declare_locals(&self, node: Node, ctx: &mut MethodCtx) {
        let Some(ty_node) = node.child_by_field_name("type") else { return };
        let declared = erase_type(self.text(ty_node));
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let Some(name) = declarator.child_by_field_name("name") else { continue };
            let ty = if declared == "var" {
                // Only `var x = new T(..)` has a type the parser can see.
                match declarator.child_by_field_name("value") {
                    Some(value) if value.kind() == "object_creation_expression" => value
                        .child_by_field_name("type")
                        .map(|t| erase_type(self.text(t)))
                        .unwrap_or_default(),
                    _ => String::new(),
                }
            } else {
                declared.clone()
            };
            ctx.declare(self.text(name).to_string(), ty);
        }
    }

    /// Declarations of the form `Type name` spread over one node: enhanced for,
    /// try-with-resources, catch parameters, `instanceof` patterns.
    fn declare_typed_name(&self, node: Node, ctx: &mut MethodCtx) {
        let ty = match node.kind() {
            "catch_formal_parameter" => find_child_by_kind(node, "catch_type")
                .and_then(|c| {
                    let types: Vec<_> = children(c).into_iter().filter(|t| is_type_node(t.kind())).collect();
                    // A multi-catch has no single static type
                    (types.len() == 1).then(|| types[0])
                }),
            "instanceof_expression" => node.child_by_field_name("right"),
            _ => node.child_by_field_name("type"),
        };
        if let Some(name) = node.child_by_field_name("name") {
            let ty = ty.map(|t| erase_type(self.text(t))).filter(|t| t != "var").unwrap_or_default();
            ctx.declare(self.text(name).to_string(), ty);
        }
    }

    // ─── Call sites ─────────────────────────────────────────────────

    fn call_site(&self, node: Node, scopes: &[TypeScope], ctx: &MethodCtx) -> Option<CallSiteEntry> {
        let arg_count = node.child_by_field_name("arguments").map(|a| children(a).len());
        let line = |n: Node| n.start_position().row as u32 + 1;

        match node.kind() {
            "method_invocation" => {
                let name = node.child_by_field_name("name")?;
                let receiver = match node.child_by_field_name("object") {
                    None => Receiver::Implicit,
                    Some(object) => self.receiver_of(object, scopes, ctx),
                };
                // Offset at the method name, like a reference match on the identifier.
                Some(CallSiteEntry {
                    kind: CallKind::Method,
                    name: self.text(name).to_string(),
                    receiver,
                    arg_count: Some(arg_count.unwrap_or(0)),
                    offset: name.start_byte(),
                    length: node.end_byte() - name.start_byte(),
                    line: line(name),
                })
            }
            "object_creation_expression" => {
                let ty = erase_type(self.text(node.child_by_field_name("type")?));
                let simple = ty.rsplit('.').next().unwrap_or(&ty).to_string();
                Some(CallSiteEntry {
                    kind: CallKind::New,
                    name: simple,
                    receiver: Receiver::Type(ty),
                    arg_count: Some(arg_count.unwrap_or(0)),
                    offset: node.start_byte(),
                    length: node.end_byte() - node.start_byte(),
                    line: line(node),
                })
            }
            "explicit_constructor_invocation" => {
                let constructor = node.child_by_field_name("constructor")?;
                let (kind, name) = match constructor.kind() {
                    "super" => (CallKind::SuperConstructor, "super"),
                    _ => (CallKind::ThisConstructor, "this"),
                };
                let receiver = if kind == CallKind::SuperConstructor { Receiver::Super } else { Receiver::Implicit };
                Some(CallSiteEntry {
                    kind,
                    name: name.to_string(),
                    receiver,
                    arg_count: Some(arg_count.unwrap_or(0)),
                    offset: node.start_byte(),
                    length: node.end_byte() - node.start_byte(),
                    line: line(node),
                })
            }
            "method_reference" => {
                let parts = children(node);
                let qualifier = *parts.first()?;
                let name = match node.child(node.child_count().checked_sub(1)?) {
                    Some(last) if last.kind() == "new" => "new".to_string(),
                    Some(last) if last.kind() == "identifier" => self.text(last).to_string(),
                    _ => return None,
                };
                let receiver = match qualifier.kind() {
                    k if is_type_node(k) => self.declared_receiver(&erase_type(self.text(qualifier)), scopes, ctx),
                    _ => self.receiver_of(qualifier, scopes, ctx),
                };
                Some(CallSiteEntry {
                    kind: CallKind::MethodReference,
                    name,
                    receiver,
                    arg_count: None,
                    offset: node.start_byte(),
                    length: node.end_byte() - node.start_byte(),
                    line: line(node),
                })
            }
            _ => None,
        }
    }

    /// Static type of a receiver expression, when it is visible syntactically.
    fn receiver_of(&self, node: Node, scopes: &[TypeScope], ctx: &MethodCtx) -> Receiver {
        match node.kind() {
            "this" => Receiver::Implicit,
            "super" => Receiver::Super,
            "identifier" => {
                let name = self.text(node);
                if let Some(ty) = ctx.local(name) {
                    return self.declared_receiver(ty, scopes, ctx);
                }
                if let Some(ty) = scopes.iter().rev().find_map(|s| s.fields.get(name)) {
                    return self.declared_receiver(ty, scopes, ctx);
                }
                if starts_uppercase(name) {
                    Receiver::Type(name.to_string())
                } else {
                    Receiver::Unknown
                }
            }
            "field_access" => {
                let (Some(object), Some(field)) = (node.child_by_field_name("object"), node.child_by_field_name("field")) else {
                    return Receiver::Unknown;
                };
                if field.kind() == "this" {
                    // `Outer.this`
                    return Receiver::Type(compact(self.text(object)));
                }
                let field_name = self.text(field);
                if object.kind() == "this" {
                    return match scopes.iter().rev().find_map(|s| s.fields.get(field_name)) {
                        Some(ty) => self.declared_receiver(ty, scopes, ctx),
                        None => Receiver::Unknown,
                    };
                }
                // `pkg.Type` or `Outer.Inner` used as a static qualifier
                let text = compact(self.text(node));
                let all_names = text.split('.').all(|s| s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'));
                if all_names && starts_uppercase(field_name) {
                    Receiver::Type(text)
                } else {
                    Receiver::Unknown
                }
            }
            "object_creation_expression" => match node.child_by_field_name("type") {
                Some(ty) => Receiver::Type(erase_type(self.text(ty))),
                None => Receiver::Unknown,
            },
            "cast_expression" => match node.child_by_field_name("type") {
                Some(ty) => self.declared_receiver(&erase_type(self.text(ty)), scopes, ctx),
                None => Receiver::Unknown,
            },
            "parenthesized_expression" => match children(node).first() {
                Some(inner) => self.receiver_of(*inner, scopes, ctx),
                None => Receiver::Unknown,
            },
            "string_literal" | "text_block" => Receiver::Type("String".to_string()),
            _ => Receiver::Unknown,
        }
    }

    /// A declared variable type as a receiver: type variables and arrays have no
    /// declaring type the index can bind against.
    fn declared_receiver(&self, ty: &str, scopes: &[TypeScope], ctx: &MethodCtx) -> Receiver {
        let is_type_param = ctx.type_params.iter().chain(scopes.iter().flat_map(|s| s.type_params.iter())).any(|p| p == ty);
        if is_type_param || ty.contains('[') || ty.is_empty() {
            Receiver::Unknown
        } else {
            Receiver::Type(ty.to_string())
        }
    }

    // ─── Parameters ─────────────────────────────────────────────────

    /// (type, name) for each parameter; varargs types end with `...`.
    fn formal_parameters(&self, node: Node) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for param in children(node) {
            match param.kind() {
                "formal_parameter" => {
                    let (Some(ty), Some(name)) = (param.child_by_field_name("type"), param.child_by_field_name("name")) else {
                        continue;
                    };
                    let mut ty = erase_type(self.text(ty));
                    if let Some(dims) = param.child_by_field_name("dimensions") {
                        ty.push_str(&compact(self.text(dims)));
                    }
                    params.push((ty, self.text(name).to_string()));
                }
                "spread_parameter" => {
                    let parts = children(param);
                    let ty = parts.iter().find(|c| is_type_node(c.kind()));
                    let name = parts.iter()
                        .find(|c| c.kind() == "variable_declarator")
                        .and_then(|d| d.child_by_field_name("name"));
                    if let (Some(ty), Some(name)) = (ty, name) {
                        params.push((format!("{}...", erase_type(self.text(*ty))), self.text(name).to_string()));
                    }
                }
                _ => {}
            }
        }
        params
    }

    fn type_parameters(&self, node: Node) -> Vec<String> {
        children(node)
            .into_iter()
            .filter(|p| p.kind() == "type_parameter")
            .filter_map(|p| children(p).into_iter().find(|c| c.kind() == "type_identifier" || c.kind() == "identifier"))
            .map(|n| self.text(n).to_string())
            .collect()
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Named children without comments.
pub(crate) fn children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| !c.kind().ends_with("comment"))
        .collect()
}

pub(crate) fn find_child_by_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    children(node).into_iter().find(|c| c.kind() == kind)
}

pub(crate) fn is_type_node(kind: &str) -> bool {
    matches!(
        kind,
        "type_identifier" | "scoped_type_identifier" | "generic_type" | "array_type"
            | "integral_type" | "floating_point_type" | "boolean_type" | "void_type"
    )
}

/// Remove all whitespace.
pub(crate) fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Type text with generic arguments and annotations erased: `Map<K, V>[]` -> `Map[]`.
pub(crate) fn erase_type(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut in_annotation = false;
    for c in text.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            '@' if depth == 0 => in_annotation = true,
            c if c.is_whitespace() => in_annotation = false,
            c if depth == 0 && !in_annotation => out.push(c),
            _ => {}
        }
    }
    out
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}
