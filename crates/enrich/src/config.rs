use crate::error::{EnrichError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONCURRENCY_ENV: &str = "ENTITY_ENRICH_CONCURRENCY";
pub const RETRIES_ENV: &str = "ENTITY_ENRICH_RETRIES";

const MAX_CONCURRENCY: usize = 32;
const MAX_RETRIES: usize = 10;

/// Where a first-time annotation goes relative to its declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    #[default]
    Before,
    After,
}

/// Configuration of an enrichment run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Labeler calls allowed in flight at once
    pub concurrency: usize,

    /// Extra attempts per entity after the first failure
    pub max_retries: usize,

    /// Fixed pause between attempts
    pub retry_delay_ms: u64,

    /// Deadline for a single labeler call
    pub labeler_timeout_ms: u64,

    /// Base entity snapshot, relative paths resolve against the project root
    pub input_path: PathBuf,

    /// Enriched snapshot, also read back as the prior run's results
    pub output_path: PathBuf,

    /// Write generated annotations back into source files
    pub write_annotations: bool,

    pub insert_position: InsertPosition,

    /// Import that marks an entity as `isDDD`
    pub di_package: String,

    /// External labeler program and arguments; empty uses static labels
    pub labeler_command: Vec<String>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_retries: 3,
            retry_delay_ms: 1000,
            labeler_timeout_ms: 120_000,
            input_path: PathBuf::from("entities.json"),
            output_path: PathBuf::from("entities.enriched.json"),
            write_annotations: true,
            insert_position: InsertPosition::Before,
            di_package: entity_extractor::DEFAULT_DI_PACKAGE.to_string(),
            labeler_command: Vec::new(),
        }
    }
}

impl EnrichConfig {
    /// Apply `ENTITY_ENRICH_CONCURRENCY` / `ENTITY_ENRICH_RETRIES` when set
    pub fn with_env_overrides(mut self) -> Self {
        let concurrency = std::env::var(CONCURRENCY_ENV).ok();
        let retries = std::env::var(RETRIES_ENV).ok();
        self.concurrency = parse_limit(concurrency.as_deref(), self.concurrency, 1, MAX_CONCURRENCY);
        self.max_retries = parse_limit(retries.as_deref(), self.max_retries, 0, MAX_RETRIES);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(EnrichError::config("concurrency must be > 0"));
        }
        if self.labeler_timeout_ms == 0 {
            return Err(EnrichError::config("labeler_timeout_ms must be > 0"));
        }
        if self.input_path.as_os_str().is_empty() || self.output_path.as_os_str().is_empty() {
            return Err(EnrichError::config("input and output paths must not be empty"));
        }
        Ok(())
    }

    pub fn input_path(&self, root: &Path) -> PathBuf {
        resolve_against(root, &self.input_path)
    }

    pub fn output_path(&self, root: &Path) -> PathBuf {
        resolve_against(root, &self.output_path)
    }
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn parse_limit(raw: Option<&str>, default_value: usize, min: usize, max: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_limit_defaults_and_clamps() {
        assert_eq!(parse_limit(None, 5, 1, MAX_CONCURRENCY), 5);
        assert_eq!(parse_limit(Some("  "), 5, 1, MAX_CONCURRENCY), 5);
        assert_eq!(parse_limit(Some("abc"), 5, 1, MAX_CONCURRENCY), 5);
        assert_eq!(parse_limit(Some(" 2 "), 5, 1, MAX_CONCURRENCY), 2);
        assert_eq!(parse_limit(Some("0"), 5, 1, MAX_CONCURRENCY), 1);
        assert_eq!(parse_limit(Some("999"), 5, 1, MAX_CONCURRENCY), MAX_CONCURRENCY);
        assert_eq!(parse_limit(Some("0"), 3, 0, MAX_RETRIES), 0);
    }

    #[test]
    fn validation_and_paths() {
        let config = EnrichConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.input_path(Path::new("/repo")), PathBuf::from("/repo/entities.json"));

        let absolute = EnrichConfig {
            output_path: PathBuf::from("/tmp/out.json"),
            ..Default::default()
        };
        assert_eq!(absolute.output_path(Path::new("/repo")), PathBuf::from("/tmp/out.json"));

        let broken = EnrichConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(broken.validate(), Err(EnrichError::InvalidConfig(_))));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EnrichConfig =
            serde_json::from_str(r#"{ "concurrency": 2, "insert_position": "after" }"#).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.insert_position, InsertPosition::After);
        assert_eq!(config.max_retries, 3);
        assert!(config.write_annotations);
    }
}
