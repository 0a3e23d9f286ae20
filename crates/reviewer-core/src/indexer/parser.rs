//! Python parsing wrapper used by extraction passes.
//!
//! Source is parsed with the native tree-sitter grammar. Callee expressions
//! are lifted out of the concrete tree into [`Expr`], a small tagged union
//! that the call resolver matches on exhaustively.

use tree_sitter::{Node, Parser, Tree};

use crate::errors::{ReviewerError, ReviewerResult};

/// Parsed source unit: the source text together with its syntax tree.
pub struct ParsedUnit {
    pub path: String,
    pub source: String,
    pub tree: Tree,
}

impl ParsedUnit {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }
}

/// Parse Python source. A tree containing error or missing nodes is rejected
/// so that only files the interpreter would accept are indexed.
pub fn parse_python(path: &str, source: String) -> ReviewerResult<ParsedUnit> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ReviewerError::Parse {
            file: path.to_string(),
            message: format!("Failed to set language: {e}"),
        })?;

    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| ReviewerError::Parse {
            file: path.to_string(),
            message: "parser produced no tree".to_string(),
        })?;

    if tree.root_node().has_error() {
        let line = first_error_line(tree.root_node()).unwrap_or(1);
        return Err(ReviewerError::Parse {
            file: path.to_string(),
            message: format!("syntax error near line {line}"),
        });
    }

    Ok(ParsedUnit {
        path: path.to_string(),
        source,
        tree,
    })
}

fn first_error_line(root: Node<'_>) -> Option<u32> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(start_line(node));
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    None
}

/// 1-based first line of a node.
pub fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based last line of a node. A node ending at column 0 ended on the
/// previous line's newline.
pub fn end_line(node: Node<'_>) -> u32 {
    let end = node.end_position();
    let start = node.start_position();
    if end.column == 0 && end.row > start.row {
        end.row as u32
    } else {
        end.row as u32 + 1
    }
}

pub fn node_text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Expression nodes
// ---------------------------------------------------------------------------

/// The expression shapes call resolution cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Name(String),
    Attribute { value: Box<Expr>, attr: String },
    Call { func: Box<Expr> },
    /// Subscripts, literals, lambdas and everything else.
    Other(String),
}

/// Raised when an expression nests deeper than the configured bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthExceeded;

impl Expr {
    /// Lift a tree-sitter expression node, descending at most `max_depth`
    /// levels through attribute and call chains.
    pub fn from_node(
        node: Node<'_>,
        source: &[u8],
        max_depth: usize,
    ) -> Result<Expr, DepthExceeded> {
        Self::lift(node, source, 0, max_depth)
    }

    fn lift(
        node: Node<'_>,
        source: &[u8],
        depth: usize,
        max_depth: usize,
    ) -> Result<Expr, DepthExceeded> {
        if depth > max_depth {
            return Err(DepthExceeded);
        }
        match node.kind() {
            "identifier" => Ok(Expr::Name(node_text(node, source).to_string())),
            "attribute" => {
                let object = node.child_by_field_name("object");
                let attr = node.child_by_field_name("attribute");
                match (object, attr) {
                    (Some(object), Some(attr)) => Ok(Expr::Attribute {
                        value: Box::new(Self::lift(object, source, depth + 1, max_depth)?),
                        attr: node_text(attr, source).to_string(),
                    }),
                    _ => Ok(Expr::Other(node.kind().to_string())),
                }
            }
            "call" => match node.child_by_field_name("function") {
                Some(func) => Ok(Expr::Call {
                    func: Box::new(Self::lift(func, source, depth + 1, max_depth)?),
                }),
                None => Ok(Expr::Other(node.kind().to_string())),
            },
            // `(a).b()` is `a.b()` to the interpreter.
            "parenthesized_expression" => {
                let mut cursor = node.walk();
                let inner: Vec<Node<'_>> = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() != "comment")
                    .collect();
                if inner.len() == 1 {
                    Self::lift(inner[0], source, depth + 1, max_depth)
                } else {
                    Ok(Expr::Other(node.kind().to_string()))
                }
            }
            kind => Ok(Expr::Other(kind.to_string())),
        }
    }

    /// Root name of an attribute chain: `a` for `a.b.c`, `None` when the chain
    /// bottoms out in a call or any other non-name expression.
    pub fn chain_root(&self) -> Option<&str> {
        let mut current = self;
        loop {
            match current {
                Expr::Name(name) => return Some(name.as_str()),
                Expr::Attribute { value, .. } => current = value,
                Expr::Call { .. } | Expr::Other(_) => return None,
            }
        }
    }
}
