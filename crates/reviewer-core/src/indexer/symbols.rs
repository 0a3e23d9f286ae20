//! Definition, call-site and import extraction for one Python file.
//!
//! Extraction runs in two passes over the tree: imports are collected first
//! so that a call may use an alias bound anywhere in the file, then
//! definitions and calls are gathered in a single scoped walk.

use tracing::debug;
use tree_sitter::Node;

use crate::errors::{ReviewerError, ReviewerResult};
use crate::guards::MAX_AST_DEPTH;
use crate::indexer::imports::{record_import, record_import_from};
use crate::indexer::parser::{end_line, node_text, parse_python, start_line, Expr, ParsedUnit};
use crate::models::{basename, import_name, CallSite, Definition, DefinitionKind, ImportMapping};

/// Everything extracted from one file.
#[derive(Clone, Debug, Default)]
pub struct FileIndex {
    pub file: String,
    pub definitions: Vec<Definition>,
    pub call_sites: Vec<CallSite>,
    pub imports: ImportMapping,
    /// Call sites dropped because their attribute chain was too deep.
    pub skipped_calls: usize,
}

impl FileIndex {
    pub fn functions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions
            .iter()
            .filter(|d| d.kind == DefinitionKind::Function)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Definition> {
        self.definitions
            .iter()
            .filter(|d| d.kind == DefinitionKind::Class)
    }
}

/// Parse and extract one file. `path` is the repo-relative identity the
/// records are stored under; the file's import name derives from its basename.
pub fn index_source(
    path: &str,
    source: String,
    max_chain_depth: usize,
) -> ReviewerResult<FileIndex> {
    let unit = parse_python(path, source)?;
    Ok(extract(&unit, max_chain_depth))
}

/// Extract records from an already parsed unit.
pub fn extract(unit: &ParsedUnit, max_chain_depth: usize) -> FileIndex {
    let imports = collect_imports(unit.root(), unit.bytes());
    let file_basename = basename(&unit.path).to_string();
    let module_name = import_name(&file_basename).to_string();

    let mut extractor = Extractor {
        source: unit.bytes(),
        file: &unit.path,
        basename: &file_basename,
        import_name: &module_name,
        imports: &imports,
        max_chain_depth,
        definitions: Vec::new(),
        call_sites: Vec::new(),
        skipped_calls: 0,
    };
    extractor.visit(unit.root(), None, 0);

    let Extractor {
        definitions,
        call_sites,
        skipped_calls,
        ..
    } = extractor;

    FileIndex {
        file: unit.path.clone(),
        definitions,
        call_sites,
        imports,
        skipped_calls,
    }
}

fn collect_imports(root: Node<'_>, source: &[u8]) -> ImportMapping {
    let mut mapping = ImportMapping::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => record_import(node, source, &mut mapping),
            "import_from_statement" => record_import_from(node, source, &mut mapping),
            _ => {
                let mut cursor = node.walk();
                let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
                // Reversed to walk in document order; later bindings win.
                stack.extend(children.into_iter().rev());
            }
        }
    }
    mapping
}

struct Extractor<'a> {
    source: &'a [u8],
    file: &'a str,
    basename: &'a str,
    import_name: &'a str,
    imports: &'a ImportMapping,
    max_chain_depth: usize,
    definitions: Vec<Definition>,
    call_sites: Vec<CallSite>,
    skipped_calls: usize,
}

impl Extractor<'_> {
    /// `self_name` is the receiver parameter of the innermost enclosing method.
    fn visit(&mut self, node: Node<'_>, self_name: Option<&str>, depth: usize) {
        if depth > MAX_AST_DEPTH {
            debug!(
                "Nesting deeper than {MAX_AST_DEPTH} in {} at line {}; not descending",
                self.file,
                start_line(node)
            );
            return;
        }

        let mut enters_method = false;
        let mut scoped_self: Option<String> = None;
        match node.kind() {
            "function_definition" => {
                self.push_definition(node, DefinitionKind::Function);
                if is_method(node) {
                    enters_method = true;
                    scoped_self = receiver_name(node, self.source);
                }
            }
            "class_definition" => self.push_definition(node, DefinitionKind::Class),
            "call" => self.push_call(node, self_name),
            _ => {}
        }
        let inner_self = if enters_method {
            scoped_self.as_deref()
        } else {
            self_name
        };

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child, inner_self, depth + 1);
        }
    }

    fn push_definition(&mut self, node: Node<'_>, kind: DefinitionKind) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        self.definitions.push(Definition {
            kind,
            file: self.file.to_string(),
            basename: self.basename.to_string(),
            name: node_text(name, self.source).to_string(),
            start_line: start_line(node),
            end_line: end_line(node),
        });
    }

    fn push_call(&mut self, node: Node<'_>, self_name: Option<&str>) {
        let Some(func) = node.child_by_field_name("function") else {
            return;
        };
        let expr = match Expr::from_node(func, self.source, self.max_chain_depth) {
            Ok(expr) => expr,
            Err(_) => {
                let err = ReviewerError::ResolutionDepthExceeded {
                    file: self.file.to_string(),
                    line: start_line(node),
                    max_depth: self.max_chain_depth,
                };
                debug!("Skipping call site: {err}");
                self.skipped_calls += 1;
                return;
            }
        };

        let (base, name) = match &expr {
            Expr::Name(name) => {
                let base = self.imports.resolve(name).unwrap_or(self.import_name);
                (base.to_string(), name.clone())
            }
            Expr::Attribute { value, attr } => {
                let base = match value.chain_root() {
                    Some(root) if Some(root) != self_name => {
                        self.imports.resolve(root).unwrap_or(root)
                    }
                    _ => self.import_name,
                };
                (base.to_string(), attr.clone())
            }
            // `f()()`, `handlers[0]()`, `(lambda: 1)()`: no callable name.
            Expr::Call { .. } | Expr::Other(_) => return,
        };

        self.call_sites.push(CallSite {
            file: self.file.to_string(),
            base,
            name,
            start_line: start_line(node),
            end_line: end_line(node),
        });
    }
}

/// Whether a function definition sits directly in a class body.
fn is_method(node: Node<'_>) -> bool {
    let mut parent = node.parent();
    if let Some(p) = parent {
        if p.kind() == "decorated_definition" {
            parent = p.parent();
        }
    }
    match parent {
        Some(block) if block.kind() == "block" => block
            .parent()
            .map(|owner| owner.kind() == "class_definition")
            .unwrap_or(false),
        _ => false,
    }
}

/// First positional parameter of a method, unless it is a `@staticmethod`.
fn receiver_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    if let Some(decorated) = node.parent().filter(|p| p.kind() == "decorated_definition") {
        let mut cursor = decorated.walk();
        let is_static = decorated
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "decorator")
            .any(|decorator| node_text(decorator, source).trim() == "@staticmethod");
        if is_static {
            return None;
        }
    }

    let params = node.child_by_field_name("parameters")?;
    let mut cursor = params.walk();
    let first = params
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;
    let ident = match first.kind() {
        "identifier" => Some(first),
        "default_parameter" | "typed_default_parameter" => first.child_by_field_name("name"),
        "typed_parameter" => {
            let mut inner = first.walk();
            let found = first
                .named_children(&mut inner)
                .find(|child| child.kind() == "identifier");
            found
        }
        _ => None,
    }?;
    Some(node_text(ident, source).to_string())
}
