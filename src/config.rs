use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::index::IndexPolicy;

/// Project configuration loaded from `symdex.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SymdexConfig {
    /// Index file path, relative to the project root
    pub index_file: Option<String>,
    /// Class-name prefix marking test classes
    pub test_class_prefix: Option<String>,
    /// Record the root directory name as a tested component (legacy behavior)
    pub include_root_component: Option<bool>,
    /// Extra ignore patterns for the tree walk
    pub exclude: Option<Vec<String>>,
}

impl SymdexConfig {
    /// Fold the configured knobs into an index policy.
    pub fn policy(&self) -> IndexPolicy {
        let mut policy = IndexPolicy::default();
        if let Some(prefix) = &self.test_class_prefix {
            policy.test_class_prefix = prefix.clone();
        }
        if let Some(include) = self.include_root_component {
            policy.include_root_component = include;
        }
        if let Some(excludes) = &self.exclude {
            policy.extra_excludes = excludes.clone();
        }
        policy
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("symdex.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SymdexConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SymdexConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

/// Load the project config, preferring `symdex.toml` in the working
/// directory and falling back to `<root>/symdex.toml`, so indexing a root
/// from elsewhere still picks up that project's config.
pub fn load_project_config(root: &Path) -> anyhow::Result<SymdexConfig> {
    if let Some(config) = load_config(None)? {
        return Ok(config);
    }
    Ok(load_config(Some(&root.join("symdex.toml")))?.unwrap_or_default())
}

pub fn write_config(path: &Path, config: &SymdexConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symdex.toml");

        let config = SymdexConfig {
            index_file: Some(".symdex/index.json".to_string()),
            test_class_prefix: Some("Check".to_string()),
            include_root_component: Some(false),
            exclude: Some(vec!["generated/".to_string()]),
        };
        write_config(&path, &config, false).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.index_file.as_deref(), Some(".symdex/index.json"));

        let policy = loaded.policy();
        assert_eq!(policy.test_class_prefix, "Check");
        assert!(!policy.include_root_component);
        assert_eq!(policy.extra_excludes, vec!["generated/".to_string()]);
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symdex.toml");
        write_config(&path, &SymdexConfig::default(), false).unwrap();
        assert!(write_config(&path, &SymdexConfig::default(), false).is_err());
        assert!(write_config(&path, &SymdexConfig::default(), true).is_ok());
    }

    #[test]
    fn test_project_config_falls_back_to_root() {
        let dir = TempDir::new().unwrap();
        let config = SymdexConfig {
            test_class_prefix: Some("Check".to_string()),
            ..SymdexConfig::default()
        };
        write_config(&dir.path().join("symdex.toml"), &config, false).unwrap();

        // No symdex.toml in the working directory: the root's config applies
        let loaded = load_project_config(dir.path()).unwrap();
        assert_eq!(loaded.test_class_prefix.as_deref(), Some("Check"));

        // A root without a config yields defaults
        let empty = TempDir::new().unwrap();
        let loaded = load_project_config(empty.path()).unwrap();
        assert!(loaded.test_class_prefix.is_none());
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(loaded.is_none());
    }
}
