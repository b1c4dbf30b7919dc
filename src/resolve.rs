//! Scope Resolver - computes the enclosing scope chain for a line
//!
//! Resolution algorithm:
//! 1. Find every symbol whose line range contains the query line
//! 2. Walk parent chains, re-validating each parent's range before trusting
//!    the declared link (parent is a weak name reference, not a guarantee)
//! 3. Pull one-hop dependency symbols into the result's symbol map
//! 4. Sort containing symbols outermost-first by start line

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::symbol::{ScopeContext, Symbol};

/// Compute the scope context visible at `line`.
///
/// The result's `scope_stack` is strictly the chain of symbols whose range
/// contains `line`, outermost first. Its `symbols` map holds the matched
/// symbols plus their declared dependencies, resolved one hop into the
/// original context. When no symbol contains `line`, the stack is empty and
/// `symbols` degrades to the full file-level table.
pub fn resolve_at(context: &ScopeContext, line: u32) -> ScopeContext {
    let mut containing: BTreeMap<String, Symbol> = BTreeMap::new();
    let mut relevant: BTreeMap<String, Symbol> = BTreeMap::new();

    for symbol in context.symbols.values() {
        if symbol.contains_line(line) {
            add_symbol_and_parents(symbol, line, context, &mut containing, &mut relevant);
        }
    }

    if containing.is_empty() {
        // No enclosing scope: fall back to the full file-level context
        return ScopeContext {
            symbols: context.symbols.clone(),
            imports: context.imports.clone(),
            scope_stack: Vec::new(),
            docstring: context.docstring.clone(),
            file_path: context.file_path.clone(),
        };
    }

    let mut ordered: Vec<&Symbol> = containing.values().collect();
    // Outermost scopes start earlier; on a shared start line the wider range
    // is treated as outer
    ordered.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then(b.end_line.cmp(&a.end_line))
    });

    ScopeContext {
        symbols: relevant,
        imports: context.imports.clone(),
        scope_stack: ordered.iter().map(|s| s.name.clone()).collect(),
        docstring: context.docstring.clone(),
        file_path: context.file_path.clone(),
    }
}

/// Add a containing symbol, its in-range parents, and one hop of its
/// declared dependencies.
fn add_symbol_and_parents(
    symbol: &Symbol,
    line: u32,
    context: &ScopeContext,
    containing: &mut BTreeMap<String, Symbol>,
    relevant: &mut BTreeMap<String, Symbol>,
) {
    if !symbol.contains_line(line) {
        return;
    }
    if containing
        .insert(symbol.name.clone(), symbol.clone())
        .is_some()
    {
        return; // already visited through another match
    }
    relevant.insert(symbol.name.clone(), symbol.clone());

    for dep in &symbol.dependencies {
        if let Some(dep_symbol) = context.symbols.get(dep) {
            relevant.insert(dep.clone(), dep_symbol.clone());
        }
    }

    if let Some(parent_name) = &symbol.parent {
        if let Some(parent) = context.symbols.get(parent_name) {
            // Only follow the chain if the parent's range also contains the
            // line; a stale table may declare a parent that does not
            if parent.contains_line(line) {
                add_symbol_and_parents(parent, line, context, containing, relevant);
            }
        }
    }
}

/// All names a symbol depends on, including its class's set for methods.
///
/// Returns an empty set for names not present in the context.
pub fn symbol_dependencies(context: &ScopeContext, symbol_name: &str) -> BTreeSet<String> {
    let Some(symbol) = context.symbols.get(symbol_name) else {
        return BTreeSet::new();
    };

    let mut dependencies = symbol.dependencies.clone();
    if let Some((class_name, _)) = symbol_name.split_once('.') {
        if let Some(class_symbol) = context.symbols.get(class_name) {
            dependencies.extend(class_symbol.dependencies.iter().cloned());
        }
    }
    dependencies
}

/// Find every line referencing `symbol_name` as a whole word.
///
/// A textual scan, not a semantic one: comments and strings count.
pub fn find_references(source: &str, symbol_name: &str) -> Vec<u32> {
    let pattern = format!(r"\b{}\b", regex::escape(symbol_name));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    source
        .lines()
        .enumerate()
        .filter(|(_, text)| re.is_match(text))
        .map(|(i, _)| i as u32 + 1)
        .collect()
}
