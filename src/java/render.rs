//! Display rendering of call arguments.
//!
//! Each argument is lifted into a closed [`Expr`] tree and printed back in a
//! compact source-like form. The output is a display aid, not re-parseable Java:
//! array initializers are truncated after three elements and multi-statement
//! lambda bodies are elided.

use std::fmt;

use tree_sitter::Node;

use super::parser_java::{children, is_type_node};

/// Array initializer elements shown before the `...` marker.
const MAX_INITIALIZER_ELEMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String, text block, number, char, boolean and null literals, verbatim
    Literal(String),
    /// Identifier, `this`, `super`
    Name(String),
    ClassLiteral(String),
    Invocation { receiver: Option<Box<Expr>>, name: String, args: Vec<Expr> },
    New { ty: String, args: Vec<Expr>, anonymous_body: bool },
    NewArray { element: String, dimensions: Vec<Option<Expr>>, initializer: Option<Vec<Expr>> },
    ArrayInit(Vec<Expr>),
    FieldAccess { object: Box<Expr>, field: String },
    ArrayAccess { array: Box<Expr>, index: Box<Expr> },
    Cast { ty: String, value: Box<Expr> },
    Paren(Box<Expr>),
    Lambda { params: String, body: LambdaBody },
    MethodReference { qualifier: String, type_args: String, name: String },
    InstanceOf { value: Box<Expr>, ty: String },
    Conditional { condition: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    Assignment { target: Box<Expr>, op: String, value: Box<Expr> },
    Prefix { op: String, operand: Box<Expr> },
    Postfix { operand: Box<Expr>, op: String },
    Binary { left: Box<Expr>, op: String, right: Box<Expr> },
    /// Anything else: the source text with whitespace collapsed
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    /// A block with at most one statement, whitespace collapsed
    Block(String),
    /// A block with several statements, shown as `{ ... }`
    Elided,
}

/// Render every argument of an `argument_list` node.
pub(crate) fn render_arguments(arguments: Node, source: &[u8]) -> Vec<String> {
    children(arguments)
        .into_iter()
        .map(|arg| Expr::from_node(arg, source).to_string())
        .collect()
}

impl Expr {
    pub fn from_node(node: Node, source: &[u8]) -> Expr {
        let text = |n: Node| n.utf8_text(source).unwrap_or("").to_string();
        let field = |name: &str| node.child_by_field_name(name);
        let sub = |n: Option<Node>| -> Box<Expr> {
            Box::new(match n {
                Some(n) => Expr::from_node(n, source),
                None => Expr::Other(String::new()),
            })
        };
        let args_of = |n: Node| -> Vec<Expr> {
            n.child_by_field_name("arguments")
                .map(|a| children(a).into_iter().map(|c| Expr::from_node(c, source)).collect())
                .unwrap_or_default()
        };
        let operator = || field("operator").map(|o| text(o)).unwrap_or_default();

        match node.kind() {
            "string_literal" | "text_block" | "character_literal" | "null_literal" | "true" | "false"
            | "decimal_integer_literal" | "hex_integer_literal" | "octal_integer_literal"
            | "binary_integer_literal" | "decimal_floating_point_literal" | "hex_floating_point_literal" => {
                Expr::Literal(text(node))
            }
            "identifier" | "this" | "super" => Expr::Name(text(node)),
            "class_literal" => Expr::ClassLiteral(collapse(&text(node))),
            "method_invocation" => Expr::Invocation {
                receiver: field("object").map(|o| Box::new(Expr::from_node(o, source))),
                name: field("name").map(|n| text(n)).unwrap_or_default(),
                args: args_of(node),
            },
            "object_creation_expression" => Expr::New {
                ty: field("type").map(|t| collapse(&text(t))).unwrap_or_default(),
                args: args_of(node),
                anonymous_body: children(node).iter().any(|c| c.kind() == "class_body"),
            },
            "array_creation_expression" => {
                let mut dimensions = Vec::new();
                let mut cursor = node.walk();
                for dim in node.children_by_field_name("dimensions", &mut cursor) {
                    match dim.kind() {
                        "dimensions_expr" => {
                            dimensions.push(children(dim).first().map(|e| Expr::from_node(*e, source)))
                        }
                        // `[][]` counts one empty dimension per bracket pair
                        _ => dimensions.extend(text(dim).matches('[').map(|_| None)),
                    }
                }
                let initializer = field("value")
                    .map(|init| children(init).into_iter().map(|c| Expr::from_node(c, source)).collect());
                Expr::NewArray {
                    element: field("type").map(|t| collapse(&text(t))).unwrap_or_default(),
                    dimensions,
                    initializer,
                }
            }
            "array_initializer" => {
                Expr::ArrayInit(children(node).into_iter().map(|c| Expr::from_node(c, source)).collect())
            }
            "field_access" => Expr::FieldAccess {
                object: sub(field("object")),
                field: field("field").map(|f| text(f)).unwrap_or_default(),
            },
            "array_access" => Expr::ArrayAccess { array: sub(field("array")), index: sub(field("index")) },
            "cast_expression" => Expr::Cast {
                ty: field("type").map(|t| collapse(&text(t))).unwrap_or_default(),
                value: sub(field("value")),
            },
            "parenthesized_expression" => Expr::Paren(sub(children(node).first().copied())),
            "lambda_expression" => lambda(node, source),
            "method_reference" => method_reference(node, source),
            "instanceof_expression" => {
                let mut ty = field("right").or_else(|| field("pattern")).map(|t| collapse(&text(t))).unwrap_or_default();
                if let Some(name) = field("name") {
                    ty = format!("{} {}", ty, text(name));
                }
                Expr::InstanceOf { value: sub(field("left")), ty }
            }
            "ternary_expression" => Expr::Conditional {
                condition: sub(field("condition")),
                then: sub(field("consequence")),
                otherwise: sub(field("alternative")),
            },
            "assignment_expression" => Expr::Assignment {
                target: sub(field("left")),
                op: operator(),
                value: sub(field("right")),
            },
            "unary_expression" => Expr::Prefix { op: operator(), operand: sub(field("operand")) },
            "update_expression" => {
                let operand = children(node).first().copied();
                let first = node.child(0).map(|c| c.kind());
                let last = node.child(node.child_count().saturating_sub(1)).map(|c| text(c));
                match first {
                    Some(op @ ("++" | "--")) => Expr::Prefix { op: op.to_string(), operand: sub(operand) },
                    _ => Expr::Postfix { operand: sub(operand), op: last.unwrap_or_default() },
                }
            }
            "binary_expression" => Expr::Binary {
                left: sub(field("left")),
                op: operator(),
                right: sub(field("right")),
            },
            _ => Expr::Other(collapse(&text(node))),
        }
    }
}

fn lambda(node: Node, source: &[u8]) -> Expr {
    let text = |n: Node| n.utf8_text(source).unwrap_or("").to_string();
    let params = match node.child_by_field_name("parameters") {
        Some(p) if p.kind() == "identifier" => text(p),
        Some(p) => {
            let names: Vec<String> = children(p).into_iter().map(|c| collapse(&text(c))).collect();
            format!("({})", names.join(", "))
        }
        None => "()".to_string(),
    };
    let body = match node.child_by_field_name("body") {
        Some(b) if b.kind() == "block" => {
            if children(b).len() > 1 {
                LambdaBody::Elided
            } else {
                LambdaBody::Block(collapse(&text(b)))
            }
        }
        Some(b) => LambdaBody::Expr(Box::new(Expr::from_node(b, source))),
        None => LambdaBody::Elided,
    };
    Expr::Lambda { params, body }
}

fn method_reference(node: Node, source: &[u8]) -> Expr {
    let text = |n: Node| n.utf8_text(source).unwrap_or("").to_string();
    let parts = children(node);
    let qualifier = match parts.first() {
        Some(q) if is_type_node(q.kind()) => collapse(&text(*q)),
        Some(q) => Expr::from_node(*q, source).to_string(),
        None => String::new(),
    };
    let type_args = parts.iter()
        .find(|p| p.kind() == "type_arguments")
        .map(|t| collapse(&text(*t)))
        .unwrap_or_default();
    let name = node.child(node.child_count().saturating_sub(1))
        .map(|n| text(n))
        .unwrap_or_default();
    Expr::MethodReference { qualifier, type_args, name }
}

/// Collapse every whitespace run into one space.
fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Joined<'a>(&'a [Expr]);

impl fmt::Display for Joined<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

fn write_initializer(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    let shown = &items[..items.len().min(MAX_INITIALIZER_ELEMENTS)];
    write!(f, "{{{}", Joined(shown))?;
    if items.len() > MAX_INITIALIZER_ELEMENTS {
        f.write_str(", ...")?;
    }
    f.write_str("}")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(s) | Expr::Name(s) | Expr::ClassLiteral(s) | Expr::Other(s) => f.write_str(s),
            Expr::Invocation { receiver, name, args } => {
                if let Some(receiver) = receiver {
                    write!(f, "{}.", receiver)?;
                }
                write!(f, "{}({})", name, Joined(args))
            }
            Expr::New { ty, args, anonymous_body } => {
                write!(f, "new {}({})", ty, Joined(args))?;
                if *anonymous_body {
                    f.write_str(" { ... }")?;
                }
                Ok(())
            }
            Expr::NewArray { element, dimensions, initializer } => {
                write!(f, "new {}", element)?;
                for dim in dimensions {
                    match dim {
                        Some(size) => write!(f, "[{}]", size)?,
                        None => f.write_str("[]")?,
                    }
                }
                if let Some(items) = initializer {
                    f.write_str(" ")?;
                    write_initializer(f, items)?;
                }
                Ok(())
            }
            Expr::ArrayInit(items) => write_initializer(f, items),
            Expr::FieldAccess { object, field } => write!(f, "{}.{}", object, field),
            Expr::ArrayAccess { array, index } => write!(f, "{}[{}]", array, index),
            Expr::Cast { ty, value } => write!(f, "({}) {}", ty, value),
            Expr::Paren(inner) => write!(f, "({})", inner),
            Expr::Lambda { params, body } => {
                write!(f, "{} -> ", params)?;
                match body {
                    LambdaBody::Expr(e) => write!(f, "{}", e),
                    LambdaBody::Block(b) => f.write_str(b),
                    LambdaBody::Elided => f.write_str("{ ... }"),
                }
            }
            Expr::MethodReference { qualifier, type_args, name } => write!(f, "{}::{}{}", qualifier, type_args, name),
            Expr::InstanceOf { value, ty } => write!(f, "{} instanceof {}", value, ty),
            Expr::Conditional { condition, then, otherwise } => write!(f, "{} ? {} : {}", condition, then, otherwise),
            Expr::Assignment { target, op, value } => write!(f, "{} {} {}", target, op, value),
            Expr::Prefix { op, operand } => write!(f, "{}{}", op, operand),
            Expr::Postfix { operand, op } => write!(f, "{}{}", operand, op),
            Expr::Binary { left, op, right } => write!(f, "{} {} {}", left, op, right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::java::parser_java::new_java_parser;

    /// Render the arguments of the first `target(...)` call in `args`.
    fn render(args: &str) -> Vec<String> {
        let source = format!("class T {{ void f() {{ target({}); }} }}", args);
        let mut parser = new_java_parser().unwrap();
        let tree = parser.parse(&source, None).unwrap();
        let call = find_call(tree.root_node(), source.as_bytes()).expect("target call");
        render_arguments(call.child_by_field_name("arguments").unwrap(), source.as_bytes())
    }

    fn find_call<'t>(node: Node<'t>, source: &[u8]) -> Option<Node<'t>> {
        if node.kind() == "method_invocation"
            && node.child_by_field_name("name").and_then(|n| n.utf8_text(source).ok()) == Some("target")
        {
            return Some(node);
        }
        children(node).into_iter().find_map(|c| find_call(c, source))
    }

    #[test]
    fn test_literals_verbatim() {
        assert_eq!(
            render(r#""he said \"hi\"", 42, 3.5f, 0xFF, 'c', true, null"#),
            vec![r#""he said \"hi\"""#, "42", "3.5f", "0xFF", "'c'", "true", "null"]
        );
    }

    #[test]
    fn test_no_arguments() {
        assert!(render("").is_empty());
    }

    #[test]
    fn test_invocations_and_instantiations() {
        assert_eq!(
            render("repo.find(id, Mode.FAST), new ArrayList<>(10), new Runnable() { public void run() {} }"),
            vec!["repo.find(id, Mode.FAST)", "new ArrayList<>(10)", "new Runnable() { ... }"]
        );
    }

    #[test]
    fn test_arrays() {
        assert_eq!(
            render("new int[] {1, 2, 3, 4, 5}, new String[3], new int[]{7}, values[i + 1]"),
            vec!["new int[] {1, 2, 3, ...}", "new String[3]", "new int[] {7}", "values[i + 1]"]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            render("(long) count, (a + b) * 2, flag ? \"y\" : \"n\", !done, i++, --j, x = 5, o instanceof String"),
            vec!["(long) count", "(a + b) * 2", "flag ? \"y\" : \"n\"", "!done", "i++", "--j", "x = 5", "o instanceof String"]
        );
    }

    #[test]
    fn test_lambdas() {
        assert_eq!(
            render("x -> x * 2, (a, b) -> a.compareTo(b), () -> { run(); }, (int n) -> { log(n); stop(); }"),
            vec!["x -> x * 2", "(a, b) -> a.compareTo(b)", "() -> { run(); }", "(int n) -> { ... }"]
        );
    }

    #[test]
    fn test_method_references_and_class_literals() {
        assert_eq!(
            render("String::valueOf, this::handle, ArrayList::new, Foo.class"),
            vec!["String::valueOf", "this::handle", "ArrayList::new", "Foo.class"]
        );
    }

    #[test]
    fn test_fallback_collapses_whitespace() {
        let rendered = render("switch (k) {\n case 1 -> \"one\";\n default -> \"many\";\n }");
        assert_eq!(rendered, vec!["switch (k) { case 1 -> \"one\"; default -> \"many\"; }"]);
    }
}
