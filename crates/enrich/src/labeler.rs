//! Labeler contract and the built-in adapters.

use crate::error::{EnrichError, Result};
use crate::types::null_as_default;
use async_trait::async_trait;
use entity_extractor::BaseEntity;
use entity_graph::StaticAnalysis;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const PROJECT_DESC_MAX_CHARS: usize = 200;

/// One commit touching an entity, passed through to the labeler as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    #[serde(rename = "commit_summary", default)]
    pub summary: String,
    #[serde(rename = "commit_at", default)]
    pub committed_at: String,
}

/// Everything a labeler sees about one entity
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRequest {
    pub entity: BaseEntity,
    pub analysis: StaticAnalysis,
    /// Project-level description text (the root README)
    pub project_context: Arc<str>,
    /// Keep the current annotation instead of generating one
    pub skip_annotation: bool,
    pub commit_history: Vec<CommitRecord>,
}

/// Labels produced for one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Labels {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub project_desc: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub publish_tag: String,
}

/// Produces summary, tags, project description, annotation and publish tag for an entity
#[async_trait]
pub trait Labeler: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_labels(&self, request: &LabelRequest) -> Result<Labels>;
}

/// Labels derived from static facts only; the annotation is left as found
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLabeler;

#[async_trait]
impl Labeler for StaticLabeler {
    fn name(&self) -> &str {
        "static"
    }

    async fn generate_labels(&self, request: &LabelRequest) -> Result<Labels> {
        let entity = &request.entity;
        let analysis = &request.analysis;

        let summary = match analysis.annotation.lines().map(str::trim).find(|line| !line.is_empty()) {
            Some(line) => line.to_string(),
            None => format!("{} `{}` defined in {}", entity.kind, entity.id_name(), entity.file),
        };

        let mut tags = vec![entity.kind.as_str().to_string()];
        if entity.is_ddd {
            tags.push("ddd".to_string());
        }
        if entity.is_workspace {
            tags.push("workspace".to_string());
        }
        if !analysis.emits.is_empty() {
            tags.push("emits-events".to_string());
        }
        if !analysis.template_components.is_empty() {
            tags.push("renders-components".to_string());
        }

        Ok(Labels {
            summary,
            tags,
            project_desc: project_description(&request.project_context),
            annotation: analysis.original_annotation.clone(),
            publish_tag: String::new(),
        })
    }
}

/// First prose paragraph line of a README, truncated
fn project_description(readme: &str) -> String {
    let line = readme
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("[!") && !line.starts_with("```"))
        .unwrap_or_default();
    line.chars().take(PROJECT_DESC_MAX_CHARS).collect()
}

/// Runs an external program per entity: request JSON on stdin, labels JSON on stdout
#[derive(Debug, Clone)]
pub struct CommandLabeler {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLabeler {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Labeler from `[program, args...]`, `None` when empty
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program, args.to_vec()))
    }
}

#[async_trait]
impl Labeler for CommandLabeler {
    fn name(&self) -> &str {
        "command"
    }

    async fn generate_labels(&self, request: &LabelRequest) -> Result<Labels> {
        let input = serde_json::to_vec(request).map_err(|e| EnrichError::labeler(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EnrichError::labeler(format!("cannot start {}: {e}", self.program.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichError::labeler(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| EnrichError::labeler(format!("invalid labeler output for {}: {e}", request.entity.id)))
    }
}
