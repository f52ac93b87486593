use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ARTIFACT_NAME: &str = "schema.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct YangcConfig {
    /// Files or directories holding the unit's sources
    pub sources: Vec<PathBuf>,
    /// Artifacts of previously compiled units
    pub dependencies: Vec<PathBuf>,
    /// Gitignore-style patterns skipped during directory expansion
    pub exclude: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_name: Option<String>,
}

impl YangcConfig {
    /// Starter configuration written by `yangc init`
    pub fn starter() -> Self {
        Self {
            sources: vec![PathBuf::from("yang")],
            dependencies: Vec::new(),
            exclude: Vec::new(),
            output_dir: Some(PathBuf::from("target/yangc")),
            metadata_dir: Some(PathBuf::from("target/yangc/meta")),
            artifact_name: Some(DEFAULT_ARTIFACT_NAME.to_string()),
        }
    }

    /// Fill unset fields from `other`
    pub fn merged_over(self, other: &YangcConfig) -> Self {
        Self {
            sources: if self.sources.is_empty() { other.sources.clone() } else { self.sources },
            dependencies: if self.dependencies.is_empty() {
                other.dependencies.clone()
            } else {
                self.dependencies
            },
            exclude: self.exclude.into_iter().chain(other.exclude.iter().cloned()).collect(),
            output_dir: self.output_dir.or_else(|| other.output_dir.clone()),
            metadata_dir: self.metadata_dir.or_else(|| other.metadata_dir.clone()),
            artifact_name: self.artifact_name.or_else(|| other.artifact_name.clone()),
        }
    }

    /// Where a publish writes; both directories are required
    pub fn output_settings(&self) -> Result<OutputSettings, ToolError> {
        let output_dir = self
            .output_dir
            .clone()
            .ok_or_else(|| ToolError::MissingConfiguration("output_dir".to_string()))?;
        let metadata_dir = self
            .metadata_dir
            .clone()
            .ok_or_else(|| ToolError::MissingConfiguration("metadata_dir".to_string()))?;
        Ok(OutputSettings {
            output_dir,
            metadata_dir,
            artifact_name: self
                .artifact_name
                .clone()
                .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string()),
        })
    }
}

/// Resolved publish destinations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub output_dir: PathBuf,
    pub metadata_dir: PathBuf,
    pub artifact_name: String,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("yangc.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<YangcConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: YangcConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &YangcConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("yangc.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yangc.toml");
        write_config(&path, &YangcConfig::starter(), false).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, YangcConfig::starter());

        let err = write_config(&path, &YangcConfig::default(), false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        write_config(&path, &YangcConfig::default(), true).unwrap();
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: YangcConfig = toml::from_str("sources = [\"a.yevents\"]\n").unwrap();
        assert_eq!(config.sources, vec![PathBuf::from("a.yevents")]);
        assert!(config.output_dir.is_none());
    }

    #[test]
    fn test_output_settings_require_directories() {
        let config = YangcConfig {
            output_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let err = config.output_settings().unwrap_err();
        assert!(matches!(err, ToolError::MissingConfiguration(ref field) if field == "metadata_dir"));

        let settings = YangcConfig::starter().output_settings().unwrap();
        assert_eq!(settings.artifact_name, DEFAULT_ARTIFACT_NAME);
    }

    #[test]
    fn test_flags_take_precedence() {
        let flags = YangcConfig {
            output_dir: Some(PathBuf::from("flag-out")),
            ..Default::default()
        };
        let merged = flags.merged_over(&YangcConfig::starter());
        assert_eq!(merged.output_dir, Some(PathBuf::from("flag-out")));
        assert_eq!(merged.sources, vec![PathBuf::from("yang")]);
        assert_eq!(merged.artifact_name.as_deref(), Some(DEFAULT_ARTIFACT_NAME));
    }
}
