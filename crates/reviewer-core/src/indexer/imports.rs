//! Import alias resolution.
//!
//! Every alias resolves to the final dotted segment of its module, so
//! `import pkg.sub as s` and `import other.sub` both resolve to `sub`. Calls
//! through either alias therefore look for a `sub.py` anywhere in the
//! repository. This is an accepted accuracy limit of the heuristic.

use tree_sitter::Node;

use crate::indexer::parser::node_text;
use crate::models::ImportMapping;

/// Final dotted segment of a module path, with relative-import dots removed.
pub fn last_segment(name: &str) -> &str {
    let trimmed = name.trim().trim_start_matches('.');
    trimmed.rsplit('.').next().unwrap_or(trimmed).trim()
}

/// Record the aliases bound by an `import` statement.
///
/// `import x.y as z` maps `z` to `y`; `import x.y` maps `y` to itself.
pub fn record_import(node: Node<'_>, source: &[u8], mapping: &mut ImportMapping) {
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        match name.kind() {
            "aliased_import" => {
                let target = name.child_by_field_name("name");
                let alias = name.child_by_field_name("alias");
                if let (Some(target), Some(alias)) = (target, alias) {
                    add(mapping, node_text(alias, source), node_text(target, source));
                }
            }
            "dotted_name" => {
                let text = node_text(name, source);
                add(mapping, text, text);
            }
            _ => {}
        }
    }
}

/// Record the aliases bound by a `from m import ...` statement.
///
/// Every imported name, aliased or not, maps to the last segment of `m`.
/// `from . import n` has no module segment and maps `n` to itself.
pub fn record_import_from(node: Node<'_>, source: &[u8], mapping: &mut ImportMapping) {
    let module = node
        .child_by_field_name("module_name")
        .map(|m| last_segment(node_text(m, source)).to_string())
        .unwrap_or_default();

    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let bound = match name.kind() {
            "aliased_import" => name
                .child_by_field_name("alias")
                .map(|alias| node_text(alias, source)),
            "dotted_name" => Some(node_text(name, source)),
            _ => None,
        };
        let Some(bound) = bound else { continue };
        if module.is_empty() {
            add(mapping, bound, bound);
        } else {
            add(mapping, bound, &module);
        }
    }
}

fn add(mapping: &mut ImportMapping, alias: &str, target: &str) {
    let alias = last_segment(alias);
    let target = last_segment(target);
    if alias.is_empty() || target.is_empty() {
        return;
    }
    mapping.insert(alias, target);
}
