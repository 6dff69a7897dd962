//! # Entity Enrich
//!
//! Labels extracted entities and keeps their annotations in sync with the
//! source files.
//!
//! ## Run
//!
//! ```text
//! entities.json ──> Enricher::run
//!                     ├─ StaticAnalyzer: IMPORTS / CALLS / EMITS / TEMPLATE_COMPONENTS / annotation
//!                     ├─ previous entities.enriched.json: skip unchanged code
//!                     ├─ Labeler behind a Limiter, with timeout and retries
//!                     ├─ AnnotationWriter ──> FileChanged ──> re-extraction, loc refresh
//!                     └─> entities.enriched.json (input order)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use entity_enrich::{EnrichConfig, Enricher, StaticLabeler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> entity_enrich::Result<()> {
//!     let enricher = Enricher::new("/path/to/project", EnrichConfig::default(), Arc::new(StaticLabeler))?;
//!     let report = enricher.run().await?;
//!     println!("{} relabeled, {} unchanged", report.stats.relabeled, report.stats.unchanged);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod labeler;
mod limiter;
mod loader;
mod orchestrator;
mod persistence;
mod types;
mod writer;

pub use config::{EnrichConfig, InsertPosition, CONCURRENCY_ENV, RETRIES_ENV};
pub use error::{EnrichError, Result};
pub use labeler::{CommandLabeler, CommitRecord, LabelRequest, Labeler, Labels, StaticLabeler};
pub use limiter::{Limiter, LimiterPermit, LimiterSnapshot};
pub use loader::{load_base_entities, load_commit_history, load_prior_results, load_project_context};
pub use orchestrator::{reference_graph, EnrichReport, Enricher, Enrichment, FileChanged, RunStats};
pub use persistence::{write_base, write_enriched};
pub use types::{EnrichedEntity, PROCESSING_FAILED, STATIC_ANALYSIS_FAILED};
pub use writer::{format_annotation, format_markup_annotation, rewrite_source, AnnotationWriter, Rewrite};
