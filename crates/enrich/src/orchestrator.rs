//! Enrichment runs.
//!
//! ```text
//! base snapshot ──> StaticAnalyzer ──> compare with previous results
//!                                        ├─ unchanged ───────────> previous row
//!                                        ├─ annotation changed ──> previous labels, new annotation
//!                                        └─ code changed / new ──> Limiter ─> Labeler (timeout, retries)
//!                                                                     └─> AnnotationWriter ─> FileChanged
//! FileChanged ──> targeted re-extraction ──> loc refresh ──> base snapshot
//! results (input order) ──> enriched snapshot
//! ```

use crate::config::EnrichConfig;
use crate::error::{EnrichError, Result};
use crate::labeler::{CommitRecord, LabelRequest, Labeler};
use crate::limiter::Limiter;
use crate::loader::{load_base_entities, load_prior_results, load_project_context};
use crate::persistence::{write_base, write_enriched};
use crate::types::EnrichedEntity;
use crate::writer::{format_annotation, AnnotationWriter};
use entity_extractor::comments::normalize_comment;
use entity_extractor::{annotation_hash, BaseEntity, Loc};
use entity_graph::{ReferenceGraph, StaticAnalysis, StaticAnalyzer};
use entity_indexer::EntityIndexer;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// A source file whose bytes an annotation write changed
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileChanged {
    pub path: PathBuf,
}

/// Counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total: usize,
    pub unchanged: usize,
    pub annotation_updated: usize,
    pub relabeled: usize,
    pub failed: usize,
    pub files_rewritten: usize,
    pub time_ms: u64,
}

/// Results of the enrichment stage, before reconciliation and persistence
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    /// One row per base entity, in input order
    pub entities: Vec<EnrichedEntity>,
    pub changed: Vec<FileChanged>,
    pub stats: RunStats,
}

#[derive(Debug, Clone)]
pub struct EnrichReport {
    pub entities: Vec<EnrichedEntity>,
    pub stats: RunStats,
    pub output_path: PathBuf,
}

enum Decision<'p> {
    Unchanged(&'p EnrichedEntity),
    AnnotationUpdated(&'p EnrichedEntity),
    Relabel,
}

fn decide<'p>(entity: &BaseEntity, analysis: &StaticAnalysis, prior: Option<&'p EnrichedEntity>) -> Decision<'p> {
    match prior {
        Some(prior) if prior.base.code_md5 == entity.code_md5 && !prior.is_failed() => {
            if prior.annotation_md5 == annotation_hash(&analysis.original_annotation) {
                Decision::Unchanged(prior)
            } else {
                Decision::AnnotationUpdated(prior)
            }
        }
        _ => Decision::Relabel,
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: usize,
    delay: Duration,
    timeout: Duration,
    write_annotations: bool,
}

/// One entity waiting for labels
struct LabelJob {
    request: LabelRequest,
    labeler: Arc<dyn Labeler>,
    writer: Arc<AnnotationWriter>,
    limiter: Limiter,
    policy: RetryPolicy,
}

struct Relabeled {
    entity: EnrichedEntity,
    changed: Option<FileChanged>,
    failed: bool,
}

impl LabelJob {
    async fn run(self) -> Relabeled {
        let id = self.request.entity.id.clone();
        let attempts = self.policy.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.attempt().await {
                Ok((entity, changed)) => {
                    return Relabeled {
                        entity,
                        changed,
                        failed: false,
                    }
                }
                Err(e) => {
                    log::warn!("Labeling {id} failed (attempt {attempt}/{attempts}): {e}");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        Relabeled {
            entity: EnrichedEntity::fallback(self.request.entity, &last_error),
            changed: None,
            failed: true,
        }
    }

    async fn attempt(&self) -> Result<(EnrichedEntity, Option<FileChanged>)> {
        let labels = {
            let _permit = self.limiter.acquire().await;
            tokio::time::timeout(self.policy.timeout, self.labeler.generate_labels(&self.request))
                .await
                .map_err(|_| EnrichError::Timeout(millis(self.policy.timeout)))??
        };

        let entity = &self.request.entity;
        let analysis = &self.request.analysis;
        let mut enriched = EnrichedEntity::from_analysis(entity.clone(), analysis);
        enriched.summary = labels.summary;
        enriched.tags = labels.tags;
        enriched.project_desc = labels.project_desc;
        enriched.publish_tag = labels.publish_tag;

        let generated = labels.annotation.trim();
        let unchanged = collapse(&normalize_comment(generated)) == collapse(&analysis.annotation);
        if !self.policy.write_annotations || generated.is_empty() || unchanged {
            return Ok((enriched, None));
        }

        let old = Some(analysis.annotation.as_str()).filter(|old| !old.is_empty());
        let changed = match self.writer.write(entity, generated, old).await? {
            Some(written) => {
                enriched.set_annotation(written);
                Some(FileChanged {
                    path: self.writer.root().join(&entity.file),
                })
            }
            None => {
                enriched.set_annotation(format_annotation(generated));
                None
            }
        };
        Ok((enriched, changed))
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Runs enrichment and static refreshes for one project
pub struct Enricher {
    config: EnrichConfig,
    indexer: EntityIndexer,
    labeler: Arc<dyn Labeler>,
    writer: Arc<AnnotationWriter>,
    limiter: Limiter,
    commit_history: HashMap<String, Vec<CommitRecord>>,
}

impl Enricher {
    pub fn new(project_dir: impl AsRef<Path>, config: EnrichConfig, labeler: Arc<dyn Labeler>) -> Result<Self> {
        config.validate()?;
        let indexer = EntityIndexer::new(project_dir)?.with_di_package(&config.di_package);
        let writer = Arc::new(AnnotationWriter::new(indexer.project_dir(), config.insert_position));
        let limiter = Limiter::new(config.concurrency);
        log::debug!(
            "Enricher for {} (labeler: {}, concurrency: {})",
            indexer.project_dir().display(),
            labeler.name(),
            config.concurrency
        );
        Ok(Self {
            config,
            indexer,
            labeler,
            writer,
            limiter,
            commit_history: HashMap::new(),
        })
    }

    /// Commit history passed to the labeler, keyed by entity id
    pub fn with_commit_history(mut self, history: HashMap<String, Vec<CommitRecord>>) -> Self {
        self.commit_history = history;
        self
    }

    pub fn root(&self) -> &Path {
        self.indexer.project_dir()
    }

    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    pub fn input_path(&self) -> PathBuf {
        self.config.input_path(self.root())
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.output_path(self.root())
    }

    fn analyzer(&self, entities: &[BaseEntity]) -> StaticAnalyzer {
        let mut analyzer =
            StaticAnalyzer::for_workspace(self.indexer.workspace().clone(), self.indexer.extractor().clone());
        analyzer.set_entities(entities);
        analyzer
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.max_retries,
            delay: Duration::from_millis(self.config.retry_delay_ms),
            timeout: Duration::from_millis(self.config.labeler_timeout_ms),
            write_annotations: self.config.write_annotations,
        }
    }

    /// Load, enrich, reconcile rewritten files and persist both snapshots
    pub async fn run(&self) -> Result<EnrichReport> {
        let start = Instant::now();
        let input = self.input_path();
        let output = self.output_path();

        let mut base = load_base_entities(&input).await?;
        let prior = load_prior_results(&output).await;
        let project_context: Arc<str> = load_project_context(self.root()).await.into();

        let Enrichment {
            mut entities,
            changed,
            mut stats,
        } = self.enrich_entities(&base, &prior, project_context).await;

        if !changed.is_empty() {
            self.reconcile(&changed, &mut base, &mut entities).await;
            write_base(&input, &base).await?;
        }
        write_enriched(&output, &entities).await?;

        stats.time_ms = millis(start.elapsed());
        log::info!(
            "Enriched {} entities in {} ms: {} unchanged, {} annotation-only, {} relabeled, {} failed, {} files rewritten",
            stats.total,
            stats.time_ms,
            stats.unchanged,
            stats.annotation_updated,
            stats.relabeled,
            stats.failed,
            stats.files_rewritten
        );
        Ok(EnrichReport {
            entities,
            stats,
            output_path: output,
        })
    }

    /// Analyze every entity and label the ones whose code changed.
    ///
    /// Annotation writes are reported as [`FileChanged`]; locations are not refreshed here.
    pub async fn enrich_entities(
        &self,
        base: &[BaseEntity],
        prior: &HashMap<String, EnrichedEntity>,
        project_context: Arc<str>,
    ) -> Enrichment {
        let analyzer = self.analyzer(base);
        let policy = self.policy();
        let mut stats = RunStats {
            total: base.len(),
            ..Default::default()
        };
        let mut slots: Vec<Option<EnrichedEntity>> = vec![None; base.len()];
        let mut tasks = JoinSet::new();

        for (index, entity) in base.iter().enumerate() {
            let analysis = match analyzer.analyze_entity(entity) {
                Ok(analysis) => analysis,
                Err(e) => {
                    log::warn!("Static analysis of {} failed: {e}", entity.id);
                    slots[index] = Some(EnrichedEntity::fallback(entity.clone(), &e.to_string()));
                    stats.failed += 1;
                    continue;
                }
            };

            match decide(entity, &analysis, prior.get(&entity.id)) {
                Decision::Unchanged(previous) => {
                    log::debug!("{} unchanged", entity.id);
                    let mut kept = previous.clone();
                    kept.set_loc(entity.loc);
                    slots[index] = Some(kept);
                    stats.unchanged += 1;
                }
                Decision::AnnotationUpdated(previous) => {
                    log::debug!("{} annotation changed, keeping labels", entity.id);
                    let mut updated = previous.clone();
                    updated.set_loc(entity.loc);
                    updated.set_annotation(analysis.original_annotation.clone());
                    slots[index] = Some(updated);
                    stats.annotation_updated += 1;
                }
                Decision::Relabel => {
                    let job = LabelJob {
                        request: LabelRequest {
                            entity: entity.clone(),
                            analysis,
                            project_context: project_context.clone(),
                            skip_annotation: !policy.write_annotations,
                            commit_history: self.commit_history.get(&entity.id).cloned().unwrap_or_default(),
                        },
                        labeler: self.labeler.clone(),
                        writer: self.writer.clone(),
                        limiter: self.limiter.clone(),
                        policy,
                    };
                    tasks.spawn(async move { (index, job.run().await) });
                }
            }
        }

        let mut changed = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, relabeled)) => {
                    if relabeled.failed {
                        stats.failed += 1;
                    } else {
                        stats.relabeled += 1;
                    }
                    changed.extend(relabeled.changed);
                    slots[index] = Some(relabeled.entity);
                }
                Err(e) => log::warn!("Labeling task aborted: {e}"),
            }
        }

        let entities = slots
            .into_iter()
            .zip(base)
            .map(|(slot, entity)| {
                slot.unwrap_or_else(|| {
                    stats.failed += 1;
                    EnrichedEntity::fallback(entity.clone(), "labeling task aborted")
                })
            })
            .collect();
        stats.files_rewritten = changed.len();

        Enrichment {
            entities,
            changed: changed.into_iter().collect(),
            stats,
        }
    }

    /// Re-extract rewritten files and move `loc` of their entities to the new lines
    pub async fn reconcile(&self, changed: &[FileChanged], base: &mut [BaseEntity], results: &mut [EnrichedEntity]) {
        let paths: Vec<PathBuf> = changed.iter().map(|c| c.path.clone()).collect();
        let extraction = self.indexer.extract_files(&paths).await;

        let by_id: HashMap<(&str, &str), Loc> = extraction
            .entities
            .iter()
            .map(|e| ((e.file.as_str(), e.id.as_str()), e.loc))
            .collect();
        let by_name: HashMap<(&str, &str), Loc> = extraction
            .entities
            .iter()
            .map(|e| ((e.file.as_str(), e.raw_name.as_str()), e.loc))
            .collect();
        let fresh_loc = |entity: &BaseEntity| {
            by_id
                .get(&(entity.file.as_str(), entity.id.as_str()))
                .or_else(|| by_name.get(&(entity.file.as_str(), entity.raw_name.as_str())))
                .copied()
        };

        let mut moved = 0;
        for entity in base.iter_mut() {
            if let Some(loc) = fresh_loc(entity) {
                if entity.loc != loc {
                    moved += 1;
                }
                entity.loc = loc;
            }
        }
        for result in results.iter_mut() {
            if let Some(loc) = fresh_loc(&result.base) {
                result.set_loc(loc);
            }
        }
        log::info!(
            "Re-extracted {} rewritten files, {} entities moved",
            changed.len(),
            moved
        );
    }

    /// Re-run static analysis for every entity without calling the labeler.
    ///
    /// Labels of the previous run are kept. A failed analysis keeps the previous
    /// references, or marks the row as failed when there is none.
    pub async fn refresh_static(&self) -> Result<EnrichReport> {
        let start = Instant::now();
        let input = self.input_path();
        let output = self.output_path();

        let base = load_base_entities(&input).await?;
        let prior = load_prior_results(&output).await;
        let analyzer = self.analyzer(&base);

        let mut stats = RunStats {
            total: base.len(),
            ..Default::default()
        };
        let entities: Vec<EnrichedEntity> = base
            .iter()
            .map(|entity| {
                let previous = prior.get(&entity.id);
                match analyzer.analyze_entity(entity) {
                    Ok(analysis) => {
                        let mut refreshed = EnrichedEntity::from_analysis(entity.clone(), &analysis);
                        if let Some(previous) = previous {
                            refreshed.copy_labels(previous);
                        }
                        stats.unchanged += 1;
                        refreshed
                    }
                    Err(e) => {
                        log::warn!("Static analysis of {} failed: {e}", entity.id);
                        stats.failed += 1;
                        match previous {
                            Some(previous) => {
                                let mut kept = previous.clone();
                                kept.base = entity.clone();
                                kept
                            }
                            None => EnrichedEntity::analysis_failure(entity.clone(), &e.to_string()),
                        }
                    }
                }
            })
            .collect();

        write_enriched(&output, &entities).await?;
        stats.time_ms = millis(start.elapsed());
        log::info!(
            "Refreshed static facts of {} entities in {} ms ({} failed)",
            stats.total,
            stats.time_ms,
            stats.failed
        );
        Ok(EnrichReport {
            entities,
            stats,
            output_path: output,
        })
    }
}

/// Reference graph over enriched rows
pub fn reference_graph(entities: &[EnrichedEntity]) -> ReferenceGraph {
    let references: Vec<StaticAnalysis> = entities.iter().map(EnrichedEntity::references).collect();
    ReferenceGraph::from_analyses(entities.iter().map(|e| &e.base).zip(references.iter()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_extractor::EntityKind;

    fn entity(code_md5: &str) -> BaseEntity {
        BaseEntity {
            id: "Function:a".into(),
            kind: EntityKind::Function,
            file: "src/a.ts".into(),
            loc: Loc::new(1, 1),
            raw_name: "a".into(),
            is_ddd: false,
            is_workspace: false,
            code_md5: code_md5.into(),
        }
    }

    #[test]
    fn decision_follows_hashes() {
        let analysis = StaticAnalysis {
            annotation: "Adds".into(),
            original_annotation: "/** Adds */".into(),
            ..Default::default()
        };
        let prior = EnrichedEntity::from_analysis(entity("h1"), &analysis);

        assert!(matches!(decide(&entity("h1"), &analysis, Some(&prior)), Decision::Unchanged(_)));
        assert!(matches!(decide(&entity("h2"), &analysis, Some(&prior)), Decision::Relabel));
        assert!(matches!(decide(&entity("h1"), &analysis, None), Decision::Relabel));

        let edited = StaticAnalysis {
            original_annotation: "/** Adds two numbers */".into(),
            ..analysis
        };
        assert!(matches!(
            decide(&entity("h1"), &edited, Some(&prior)),
            Decision::AnnotationUpdated(_)
        ));
    }

    #[test]
    fn failed_rows_are_relabeled_with_unchanged_code() {
        let analysis = StaticAnalysis::default();
        let failed = EnrichedEntity::fallback(entity("h1"), "Labeler timed out after 20 ms");
        assert!(matches!(decide(&entity("h1"), &analysis, Some(&failed)), Decision::Relabel));
    }

    #[test]
    fn graph_from_enriched_rows() {
        let mut page = EnrichedEntity::from_analysis(entity("h"), &StaticAnalysis::default());
        page.base.id = "Component:Page".into();
        page.calls = vec!["Function:a".into()];
        let helper = EnrichedEntity::from_analysis(entity("h"), &StaticAnalysis::default());

        let graph = reference_graph(&[page, helper]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.dependents("Function:a").unwrap().len(), 1);
    }
}
