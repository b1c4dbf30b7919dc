//! Symbol types - the per-file symbol table
//!
//! A `Symbol` is a named, line-ranged definition (class or function) extracted
//! from source. A `ScopeContext` is the full per-file table: symbols keyed by
//! name, source-order imports, and the scope stack computed for a query line.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::Error;

/// The kind of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    /// A class definition
    Class,
    /// A function or method definition
    Function,
}

impl SymbolKind {
    /// Get the string representation of the symbol kind
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
        }
    }
}

impl FromStr for SymbolKind {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "class" => Ok(SymbolKind::Class),
            "function" | "method" | "def" | "fn" => Ok(SymbolKind::Function),
            _ => Err(Error::NotFound(format!("Unknown symbol kind: {}", s))),
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, line-ranged definition extracted from source.
///
/// Methods are named `ClassName.method`. The `parent` field is a plain name
/// key into the owning context's symbol map, never a structural pointer; the
/// resolver re-validates parent line ranges before trusting the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Symbol name (dotted `Class.method` for methods)
    pub name: String,
    /// The kind of symbol (class or function)
    pub kind: SymbolKind,
    /// Starting line number (1-indexed)
    pub start_line: u32,
    /// Ending line number (1-indexed, inclusive)
    pub end_line: u32,
    /// Docstring, if the definition body opens with one
    pub docstring: Option<String>,
    /// Name of the enclosing class, if any
    pub parent: Option<String>,
    /// Conservative superset of names this symbol references
    pub dependencies: BTreeSet<String>,
}

impl Symbol {
    /// Create a new symbol with minimal required fields
    pub fn new(name: impl Into<String>, kind: SymbolKind, start_line: u32, end_line: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            start_line,
            end_line,
            docstring: None,
            parent: None,
            dependencies: BTreeSet::new(),
        }
    }

    /// Set the docstring
    pub fn with_docstring(mut self, doc: impl Into<String>) -> Self {
        self.docstring = Some(doc.into());
        self
    }

    /// Set the enclosing parent name
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the dependency set
    pub fn with_dependencies(mut self, deps: BTreeSet<String>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Whether this symbol's line range contains `line`
    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// The symbol table and surrounding context for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeContext {
    /// All symbols keyed by (qualified) name
    pub symbols: BTreeMap<String, Symbol>,
    /// Top-level imports as dotted paths, in source order
    pub imports: Vec<String>,
    /// Chain of enclosing symbol names, outermost first
    pub scope_stack: Vec<String>,
    /// File-level docstring
    pub docstring: Option<String>,
    /// Path of the analyzed file
    pub file_path: String,
}

impl ScopeContext {
    /// Create an empty context for a file
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    /// Names of all classes defined at any level in this file
    pub fn class_names(&self) -> BTreeSet<String> {
        self.symbols
            .values()
            .filter(|s| s.kind == SymbolKind::Class)
            .map(|s| s.name.clone())
            .collect()
    }

    /// Names of all functions and methods defined in this file
    pub fn function_names(&self) -> BTreeSet<String> {
        self.symbols
            .values()
            .filter(|s| s.kind == SymbolKind::Function)
            .map(|s| s.name.clone())
            .collect()
    }
}
