use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, extra_excludes: Option<&[String]>) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        // 1. Load from .gitignore and .ignore
        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        // 2. Add defaults (global)
        let defaults = [
            // Noise directories
            "__pycache__/",
            "venv/",
            ".venv/",
            "env/",
            ".tox/",
            ".mypy_cache/",
            ".pytest_cache/",
            "egg-info/",
            "build/",
            "dist/",
            ".git/",
            ".idea/",
            ".vscode/",
            // Byte-code and editor noise
            "*.pyc",
            "*.pyo",
            "*.pyd",
            "*.swp",
            // Index artifacts
            "*.lock",
            "codebase_index.json",
        ];

        for pattern in defaults {
            // These are static valid patterns
            builder.add_line(None, pattern).ok();
        }

        // 3. Add user config excludes
        if let Some(excludes) = extra_excludes {
            for pattern in excludes {
                builder.add_line(None, pattern).ok();
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched(path, is_dir).is_ignore()
    }
}
