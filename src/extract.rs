//! Symbol Extractor - parses one Python file into a symbol table
//!
//! A single pre-order pass over the tree-sitter parse tree records every
//! class and function definition together with its line range, docstring,
//! and a conservative dependency set. Dependency sets are structural
//! supersets, never sound call graphs: any identifier appearing in a body is
//! recorded, even a local shadowing an outer name. This trades precision for
//! a cheap signal that never under-reports.

use std::collections::BTreeSet;
use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::symbol::{ScopeContext, Symbol, SymbolKind};
use crate::{Error, Result};

/// Python symbol extractor backed by tree-sitter.
pub struct Extractor {
    parser: Parser,
}

impl Extractor {
    /// Create an extractor with the Python grammar loaded.
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| Error::Grammar(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Read and extract a file from disk.
    pub fn extract_file(&mut self, path: &Path) -> Result<ScopeContext> {
        if !path.exists() {
            return Err(Error::NotFound(format!("File not found: {}", path.display())));
        }
        let source = std::fs::read_to_string(path)?;
        self.extract(&path.display().to_string(), &source)
    }

    /// Extract the symbol table for one source text.
    ///
    /// Fails with `Error::Parse` when the text is not syntactically valid
    /// Python.
    pub fn extract(&mut self, file_path: &str, source: &str) -> Result<ScopeContext> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| Error::Parse {
                path: file_path.to_string(),
                line: 0,
                message: "parser returned no tree".to_string(),
            })?;

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(0);
            return Err(Error::Parse {
                path: file_path.to_string(),
                line,
                message: "invalid Python syntax".to_string(),
            });
        }

        let mut ctx = ScopeContext::new(file_path);
        ctx.docstring = body_docstring(root, source);
        walk(root, source, None, true, &mut ctx);
        Ok(ctx)
    }
}

/// Pre-order walk collecting definitions and imports.
///
/// `class_parent` is the innermost enclosing class name; functions do not
/// become parents, so a def nested in a method still qualifies against the
/// class. `module_level` stays true until we descend into a definition body,
/// which keeps import collection restricted to the top of the file.
fn walk(
    node: Node,
    source: &str,
    class_parent: Option<&str>,
    module_level: bool,
    ctx: &mut ScopeContext,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "class_definition" => record_class(child, source, class_parent, ctx),
            "function_definition" => record_function(child, source, class_parent, ctx),
            "decorated_definition" => {
                if let Some(def) = child.child_by_field_name("definition") {
                    match def.kind() {
                        "class_definition" => record_class(def, source, class_parent, ctx),
                        "function_definition" => record_function(def, source, class_parent, ctx),
                        _ => {}
                    }
                }
            }
            "import_statement" if module_level => record_import(child, source, ctx),
            "import_from_statement" if module_level => record_from_import(child, source, ctx),
            _ => walk(child, source, class_parent, module_level, ctx),
        }
    }
}

fn record_class(node: Node, source: &str, class_parent: Option<&str>, ctx: &mut ScopeContext) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };

    // Base classes: plain names directly, qualified bases by their attribute
    let mut deps = BTreeSet::new();
    if let Some(bases) = node.child_by_field_name("superclasses") {
        let mut cursor = bases.walk();
        for base in bases.named_children(&mut cursor) {
            match base.kind() {
                "identifier" => {
                    if let Some(text) = node_text(base, source) {
                        deps.insert(text);
                    }
                }
                "attribute" => {
                    if let Some(attr) = field_text(base, "attribute", source) {
                        deps.insert(attr);
                    }
                }
                _ => {}
            }
        }
    }

    let mut symbol = Symbol::new(
        name.clone(),
        SymbolKind::Class,
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
    .with_dependencies(deps);
    if let Some(parent) = class_parent {
        symbol = symbol.with_parent(parent);
    }
    if let Some(doc) = body_docstring(node, source) {
        symbol = symbol.with_docstring(doc);
    }
    ctx.symbols.insert(name.clone(), symbol);

    if let Some(body) = node.child_by_field_name("body") {
        walk(body, source, Some(name.as_str()), false, ctx);
    }
}

fn record_function(node: Node, source: &str, class_parent: Option<&str>, ctx: &mut ScopeContext) {
    let Some(name) = field_text(node, "name", source) else {
        return;
    };
    let full_name = match class_parent {
        Some(parent) => format!("{}.{}", parent, name),
        None => name,
    };

    let mut deps = BTreeSet::new();
    if let Some(body) = node.child_by_field_name("body") {
        collect_identifiers(body, source, &mut deps);
    }

    // Inherited-dependency propagation: a method's set absorbs whatever its
    // class's bases already require
    if let Some(parent) = class_parent {
        if let Some(class_symbol) = ctx.symbols.get(parent) {
            deps.extend(class_symbol.dependencies.iter().cloned());
        }
    }

    let mut symbol = Symbol::new(
        full_name.clone(),
        SymbolKind::Function,
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
    .with_dependencies(deps);
    if let Some(parent) = class_parent {
        symbol = symbol.with_parent(parent);
    }
    if let Some(doc) = body_docstring(node, source) {
        symbol = symbol.with_docstring(doc);
    }
    ctx.symbols.insert(full_name, symbol);

    if let Some(body) = node.child_by_field_name("body") {
        walk(body, source, class_parent, false, ctx);
    }
}

/// Collect every identifier under `node`.
///
/// Attribute access `x.y` contributes both `x` and `y` because both sides are
/// identifier nodes in the grammar.
fn collect_identifiers(node: Node, source: &str, out: &mut BTreeSet<String>) {
    if node.kind() == "identifier" {
        if let Some(text) = node_text(node, source) {
            out.insert(text);
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_identifiers(child, source, out);
    }
}

/// `import foo, bar as baz` - record the real module names
fn record_import(node: Node, source: &str, ctx: &mut ScopeContext) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                if let Some(text) = node_text(child, source) {
                    ctx.imports.push(text);
                }
            }
            "aliased_import" => {
                if let Some(text) = field_text(child, "name", source) {
                    ctx.imports.push(text);
                }
            }
            _ => {}
        }
    }
}

/// `from foo import bar, baz` - record `foo.bar`, `foo.baz`
fn record_from_import(node: Node, source: &str, ctx: &mut ScopeContext) {
    let module = field_text(node, "module_name", source).unwrap_or_default();

    let mut cursor = node.walk();
    let mut saw_name = false;
    for child in node.children_by_field_name("name", &mut cursor) {
        let imported = match child.kind() {
            "dotted_name" | "identifier" => node_text(child, source),
            "aliased_import" => field_text(child, "name", source),
            _ => None,
        };
        if let Some(imported) = imported {
            ctx.imports.push(format!("{}.{}", module, imported));
            saw_name = true;
        }
    }

    // `from foo import *`
    if !saw_name {
        let mut cursor = node.walk();
        if node
            .named_children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import")
        {
            ctx.imports.push(format!("{}.*", module));
        }
    }
}

/// First bare string expression of a definition body (or of the module root).
fn body_docstring(node: Node, source: &str) -> Option<String> {
    let body = if node.kind() == "module" {
        node
    } else {
        node.child_by_field_name("body")?
    };
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let raw = node_text(expr, source)?;
    Some(strip_string_literal(&raw))
}

/// Strip a string literal's prefix letters and exactly one delimiter pair,
/// so content that itself starts or ends with a quote survives intact.
fn strip_string_literal(raw: &str) -> String {
    let body = raw.trim_start_matches(['r', 'b', 'u', 'f', 'R', 'B', 'U', 'F']);
    let content = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|delim| {
            body.strip_prefix(delim)
                .and_then(|rest| rest.strip_suffix(delim))
        })
        .unwrap_or(body);
    content.trim().to_string()
}

fn field_text(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|n| node_text(n, source))
}

fn node_text(node: Node, source: &str) -> Option<String> {
    node.utf8_text(source.as_bytes()).ok().map(str::to_string)
}

/// Line of the first ERROR or missing node, for parse diagnostics.
fn first_error_line(node: Node) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row as u32 + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(line) = first_error_line(child) {
                return Some(line);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#""""Module docstring."""
import os
from pathlib import Path

class Base:
    """Base class docstring."""
    def base_method(self):
        return self.value

class Child(Base):
    """Child class docstring."""
    def method(self):
        value = self.base_method()
        return value

def standalone():
    """Standalone docstring."""
    child = Child()
    return child.method()
"#;

    fn extract(source: &str) -> ScopeContext {
        Extractor::new().unwrap().extract("sample.py", source).unwrap()
    }

    #[test]
    fn test_extracts_classes_and_functions() {
        let ctx = extract(SAMPLE);

        assert_eq!(ctx.docstring.as_deref(), Some("Module docstring."));
        assert!(ctx.symbols.contains_key("Base"));
        assert!(ctx.symbols.contains_key("Child"));
        assert!(ctx.symbols.contains_key("Child.method"));
        assert!(ctx.symbols.contains_key("standalone"));

        let base = &ctx.symbols["Base"];
        assert_eq!(base.kind, SymbolKind::Class);
        assert_eq!(base.docstring.as_deref(), Some("Base class docstring."));
        assert_eq!(base.start_line, 5);

        let method = &ctx.symbols["Child.method"];
        assert_eq!(method.kind, SymbolKind::Function);
        assert_eq!(method.parent.as_deref(), Some("Child"));
    }

    #[test]
    fn test_imports_in_source_order() {
        let ctx = extract(SAMPLE);
        assert_eq!(ctx.imports, vec!["os", "pathlib.Path"]);
    }

    #[test]
    fn test_inheritance_dependency_propagation() {
        let ctx = extract(SAMPLE);

        // Child depends on its base; Child.method inherits that dependency
        let child = &ctx.symbols["Child"];
        assert!(child.dependencies.contains("Base"));

        let method = &ctx.symbols["Child.method"];
        assert!(method.dependencies.contains("base_method"));
        assert!(method.dependencies.contains("self"));
        assert!(
            method.dependencies.is_superset(&child.dependencies),
            "method deps must be a superset of the class deps"
        );
    }

    #[test]
    fn test_attribute_access_records_both_sides() {
        let ctx = extract(SAMPLE);
        let standalone = &ctx.symbols["standalone"];
        assert!(standalone.dependencies.contains("child"));
        assert!(standalone.dependencies.contains("method"));
        assert!(standalone.dependencies.contains("Child"));
    }

    #[test]
    fn test_qualified_attribute_base() {
        let ctx = extract("class Handler(http.server.BaseHTTPRequestHandler):\n    pass\n");
        let handler = &ctx.symbols["Handler"];
        assert!(handler.dependencies.contains("BaseHTTPRequestHandler"));
    }

    #[test]
    fn test_docstring_edge_quotes_survive() {
        // Only the delimiter pair is stripped; quote characters belonging to
        // the content stay
        let ctx = extract("def greet():\n    \"\"\"it's'\"\"\"\n    return 1\n");
        assert_eq!(ctx.symbols["greet"].docstring.as_deref(), Some("it's'"));

        let ctx = extract("def ask():\n    '\"why\"'\n    return 1\n");
        assert_eq!(ctx.symbols["ask"].docstring.as_deref(), Some("\"why\""));
    }

    #[test]
    fn test_decorated_definitions_are_transparent() {
        let ctx = extract("@wraps\ndef wrapped():\n    return 1\n");
        assert!(ctx.symbols.contains_key("wrapped"));
    }

    #[test]
    fn test_aliased_and_wildcard_imports() {
        let ctx = extract("import numpy as np\nfrom os.path import *\n");
        assert_eq!(ctx.imports, vec!["numpy", "os.path.*"]);
    }

    #[test]
    fn test_function_body_imports_not_recorded() {
        let ctx = extract("def late():\n    import json\n    return json\n");
        assert!(ctx.imports.is_empty());
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = Extractor::new()
            .unwrap()
            .extract("broken.py", "def broken(:\n    pass\n")
            .unwrap_err();
        match err {
            Error::Parse { path, .. } => assert_eq!(path, "broken.py"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = Extractor::new()
            .unwrap()
            .extract_file(Path::new("/nonexistent/nope.py"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
