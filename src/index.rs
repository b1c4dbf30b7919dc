//! Dependency & Coverage Aggregator - full tree rescans into the index
//!
//! Each update cycle walks the whole project tree, extracts every Python
//! file, and folds the results into the three persisted maps (components,
//! dependencies, test coverage). Files that fail to parse are logged and
//! skipped, never fatal: a cycle always ends with a best-effort index plus
//! the list of files that failed. The load-modify-save cycle runs under the
//! store's lock and finishes with an atomic flush.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::extract::Extractor;
use crate::ignore::IgnoreFilter;
use crate::store::{ComponentRecord, Index, IndexStore, INDEX_VERSION};
use crate::Result;

/// Default name of the persisted index file, relative to the project root.
pub const DEFAULT_INDEX_FILE: &str = "codebase_index.json";

/// Files whose stem carries this marker are treated as test files.
const TEST_FILE_MARKER: &str = "test_";

/// Tuning knobs for an update cycle.
#[derive(Debug, Clone)]
pub struct IndexPolicy {
    /// Class-name prefix marking test classes (`TestCalculator` covers
    /// `Calculator`)
    pub test_class_prefix: String,
    /// Always record the project root's own directory name as a tested
    /// component for every test file.
    ///
    /// Legacy consumers rely on the root name showing up in every test
    /// file's coverage, so this stays a named switch rather than a silent
    /// side effect. Defaults to on.
    pub include_root_component: bool,
    /// Extra ignore patterns applied on top of the defaults
    pub extra_excludes: Vec<String>,
}

impl Default for IndexPolicy {
    fn default() -> Self {
        Self {
            test_class_prefix: "Test".to_string(),
            include_root_component: true,
            extra_excludes: Vec::new(),
        }
    }
}

/// Outcome of one update cycle.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Files successfully analyzed this cycle
    pub files_indexed: usize,
    /// Files skipped with their failure reason
    pub failed: Vec<(String, String)>,
    /// Update-counter value after this cycle
    pub update_counter: u64,
}

/// Walks a project tree and maintains the persisted index.
pub struct Indexer {
    root: PathBuf,
    store: IndexStore,
    policy: IndexPolicy,
    extractor: Extractor,
}

impl Indexer {
    /// Create an indexer for a project root, persisting to
    /// `<root>/codebase_index.json`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let store = IndexStore::new(root.join(DEFAULT_INDEX_FILE));
        Self::with_store(root, store)
    }

    /// Create an indexer with an explicit store location.
    pub fn with_store(root: impl Into<PathBuf>, store: IndexStore) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            store,
            policy: IndexPolicy::default(),
            extractor: Extractor::new()?,
        })
    }

    /// Replace the update policy.
    pub fn with_policy(mut self, policy: IndexPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Project root being indexed.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store holding the persisted index.
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Run one full update cycle: lock, load, rescan the whole tree, prune
    /// stale entries, flush atomically.
    pub fn update_index(&mut self) -> Result<ScanReport> {
        let _lock = self.store.lock()?;
        let mut index = self.store.load();

        index.metadata.update_counter += 1;
        let counter = index.metadata.update_counter;
        let mut report = ScanReport {
            update_counter: counter,
            ..ScanReport::default()
        };

        let filter = IgnoreFilter::new(&self.root, Some(&self.policy.extra_excludes));
        let mut seen: BTreeSet<String> = BTreeSet::new();

        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|e| {
            e.depth() == 0 || !filter.is_ignored(e.path(), e.file_type().is_dir())
        });

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_source_file(path) {
                continue;
            }

            let rel_path = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned();
            seen.insert(rel_path.clone());

            match self.analyze(path, &rel_path, counter, &mut index) {
                Ok(()) => report.files_indexed += 1,
                Err(e) => {
                    tracing::warn!("skipping {}: {}", rel_path, e);
                    report.failed.push((rel_path, e.to_string()));
                }
            }
        }

        prune_stale(&mut index, &seen);

        index.metadata.last_updated = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        index.metadata.version = INDEX_VERSION.to_string();

        self.store.save(&index)?;
        Ok(report)
    }

    /// Analyze one file and fold its results into the index maps.
    fn analyze(&mut self, path: &Path, rel_path: &str, counter: u64, index: &mut Index) -> Result<()> {
        let source = std::fs::read_to_string(path)?;
        let ctx = self.extractor.extract(rel_path, &source)?;

        let classes = ctx.class_names();
        let functions = ctx.function_names();

        // Dependency edge: import targets plus every symbol's dependency set
        // (base classes and body-level name/attribute tokens)
        let mut deps: BTreeSet<String> = ctx
            .imports
            .iter()
            .filter(|i| !i.starts_with("__"))
            .cloned()
            .collect();
        for symbol in ctx.symbols.values() {
            deps.extend(symbol.dependencies.iter().cloned());
        }

        index.components.insert(
            rel_path.to_string(),
            ComponentRecord {
                classes: classes.clone(),
                functions,
                last_update: counter,
            },
        );
        index.dependencies.insert(rel_path.to_string(), deps);

        if is_test_file(path) {
            self.record_coverage(rel_path, &classes, index);
        }

        Ok(())
    }

    /// Infer which components a test file exercises and append it to their
    /// coverage lists (duplicates suppressed within a cycle).
    fn record_coverage(&self, rel_path: &str, classes: &BTreeSet<String>, index: &mut Index) {
        let mut tested: BTreeSet<String> = classes
            .iter()
            .filter_map(|name| name.strip_prefix(&self.policy.test_class_prefix))
            .filter(|stripped| !stripped.is_empty())
            .map(str::to_string)
            .collect();

        if self.policy.include_root_component {
            if let Some(root_name) = self.root.file_name().map(|n| n.to_string_lossy()) {
                tested.insert(root_name.into_owned());
            }
        }

        for component in tested {
            let files = index.test_coverage.entry(component).or_default();
            if !files.iter().any(|f| f == rel_path) {
                files.push(rel_path.to_string());
            }
        }
    }
}

/// Analyzable source file: `.py`, excluding package-marker files.
fn is_source_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("py")
        && path.file_name().and_then(|n| n.to_str()) != Some("__init__.py")
}

fn is_test_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.contains(TEST_FILE_MARKER))
}

/// Drop entries for files no longer present in the tree. Coverage lists are
/// filtered to surviving files; a component keeps its key even when its
/// list empties.
fn prune_stale(index: &mut Index, seen: &BTreeSet<String>) {
    index.components.retain(|path, _| seen.contains(path));
    index.dependencies.retain(|path, _| seen.contains(path));
    for files in index.test_coverage.values_mut() {
        files.retain(|f| seen.contains(f));
    }
}

/// Run one update cycle against a project root with default policy.
///
/// The single entry point external hooks call.
pub fn update_index(root: impl Into<PathBuf>) -> Result<ScanReport> {
    Indexer::new(root)?.update_index()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn seed_project(root: &Path) {
        write_file(
            root,
            "src/component.py",
            r#""""Test component."""
import os
from pathlib import Path

class MyComponent:
    """A component."""
    def process(self):
        return self.value * 2
"#,
        );
        write_file(
            root,
            "tests/test_component.py",
            r#""""Tests for the component."""
import unittest

class TestMyComponent(unittest.TestCase):
    def test_process(self):
        comp = MyComponent()
        self.assertEqual(comp.process(), 0)
"#,
        );
        write_file(root, "src/__init__.py", "");
    }

    fn indexer_for(dir: &TempDir) -> Indexer {
        Indexer::new(dir.path()).unwrap()
    }

    #[test]
    fn test_update_records_components_and_dependencies() {
        let dir = TempDir::new().unwrap();
        seed_project(dir.path());

        let mut indexer = indexer_for(&dir);
        let report = indexer.update_index().unwrap();
        assert_eq!(report.files_indexed, 2);
        assert!(report.failed.is_empty());

        let index = indexer.store().load();
        let record = &index.components["src/component.py"];
        assert!(record.classes.contains("MyComponent"));
        assert!(record.functions.contains("MyComponent.process"));
        assert_eq!(record.last_update, 1);

        let deps = &index.dependencies["src/component.py"];
        assert!(deps.contains("os"));
        assert!(deps.contains("pathlib.Path"));
        assert!(deps.contains("self"));

        // __init__.py carries no analyzable symbols of its own
        assert!(!index.components.contains_key("src/__init__.py"));
    }

    #[test]
    fn test_coverage_strips_test_prefix() {
        let dir = TempDir::new().unwrap();
        seed_project(dir.path());

        let mut indexer = indexer_for(&dir);
        indexer.update_index().unwrap();

        let index = indexer.store().load();
        let files = &index.test_coverage["MyComponent"];
        assert_eq!(files, &vec!["tests/test_component.py".to_string()]);

        // Root-name component recorded by default policy
        let root_name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(index.test_coverage.contains_key(&root_name));
    }

    #[test]
    fn test_root_component_policy_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        seed_project(dir.path());

        let mut indexer = indexer_for(&dir).with_policy(IndexPolicy {
            include_root_component: false,
            ..IndexPolicy::default()
        });
        indexer.update_index().unwrap();

        let index = indexer.store().load();
        let root_name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(!index.test_coverage.contains_key(&root_name));
        assert!(index.test_coverage.contains_key("MyComponent"));
    }

    #[test]
    fn test_rescan_is_idempotent_on_content_not_metadata() {
        let dir = TempDir::new().unwrap();
        seed_project(dir.path());

        let mut indexer = indexer_for(&dir);
        indexer.update_index().unwrap();
        let first = indexer.store().load();

        indexer.update_index().unwrap();
        let second = indexer.store().load();

        assert_eq!(second.metadata.update_counter, first.metadata.update_counter + 1);
        assert_eq!(second.dependencies, first.dependencies);
        assert_eq!(second.test_coverage, first.test_coverage);

        // Component content identical apart from last_update, which advances
        for (path, record) in &second.components {
            let prev = &first.components[path];
            assert_eq!(record.classes, prev.classes);
            assert_eq!(record.functions, prev.functions);
            assert_eq!(record.last_update, prev.last_update + 1);
        }
    }

    #[test]
    fn test_deleted_files_are_pruned() {
        let dir = TempDir::new().unwrap();
        seed_project(dir.path());

        let mut indexer = indexer_for(&dir);
        indexer.update_index().unwrap();

        fs::remove_file(dir.path().join("tests/test_component.py")).unwrap();
        indexer.update_index().unwrap();

        let index = indexer.store().load();
        assert!(!index.components.contains_key("tests/test_component.py"));
        assert!(!index.dependencies.contains_key("tests/test_component.py"));
        for files in index.test_coverage.values() {
            assert!(!files.iter().any(|f| f == "tests/test_component.py"));
        }
    }

    #[test]
    fn test_parse_failure_skips_file_not_scan() {
        let dir = TempDir::new().unwrap();
        seed_project(dir.path());
        write_file(dir.path(), "src/broken.py", "def broken(:\n    pass\n");

        let mut indexer = indexer_for(&dir);
        let report = indexer.update_index().unwrap();

        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "src/broken.py");

        let index = indexer.store().load();
        assert!(index.components.contains_key("src/component.py"));
        assert!(!index.components.contains_key("src/broken.py"));
    }

    #[test]
    fn test_calculator_coverage_scenario() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "calculator.py",
            "class Calculator:\n    def add(self, a, b):\n        return a + b\n",
        );
        write_file(
            dir.path(),
            "test_calculator.py",
            "class TestCalculator:\n    def test_add(self):\n        assert Calculator().add(1, 2) == 3\n",
        );

        let mut indexer = indexer_for(&dir);
        indexer.update_index().unwrap();

        let index = indexer.store().load();
        assert_eq!(
            index.test_coverage["Calculator"],
            vec!["test_calculator.py".to_string()]
        );
    }

    #[test]
    fn test_noise_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        seed_project(dir.path());
        write_file(dir.path(), "__pycache__/cached.py", "x = 1\n");

        let mut indexer = indexer_for(&dir);
        indexer.update_index().unwrap();

        let index = indexer.store().load();
        assert!(!index.components.keys().any(|k| k.contains("__pycache__")));
    }
}
