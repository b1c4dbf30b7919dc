//! Post-run refresh hooks
//!
//! Callers register callbacks to run after a test or workflow step; the
//! built-in refresh hook re-indexes the project. Registration is explicit,
//! never inferred from method-name prefixes. An index that cannot be
//! refreshed is reported as a warning, never propagated into the caller's
//! primary workflow.

use std::path::{Path, PathBuf};

use crate::index;

/// A callback invoked after a run completes. Receives whether the run
/// succeeded.
pub type Hook = Box<dyn Fn(bool) + Send>;

/// Ordered list of post-run callbacks.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback to run after each completed run.
    pub fn register(&mut self, hook: impl Fn(bool) + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Register the standard hook: refresh the index at `root` after a
    /// passing run.
    pub fn register_index_refresh(&mut self, root: impl Into<PathBuf>) {
        let root = root.into();
        self.register(move |passed| {
            if passed {
                refresh_after_run(&root);
            }
        });
    }

    /// Invoke every registered hook in registration order.
    pub fn run_all(&self, passed: bool) {
        for hook in &self.hooks {
            hook(passed);
        }
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Refresh the index for `root`, downgrading every failure to a warning.
pub fn refresh_after_run(root: &Path) {
    match index::update_index(root) {
        Ok(report) => {
            tracing::info!(
                "updated index for {} ({} files, cycle {})",
                root.display(),
                report.files_indexed,
                report.update_counter
            );
        }
        Err(e) => {
            tracing::warn!("failed to update index for {}: {}", root.display(), e);
        }
    }
}
