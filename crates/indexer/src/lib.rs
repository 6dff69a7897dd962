//! # Entity Indexer
//!
//! The extraction pass over a front-end project.
//!
//! ## Pipeline
//!
//! ```text
//! Project dir
//!     │
//!     ├──> WorkspaceResolver
//!     │      └─> linked packages + project source dirs
//!     │
//!     ├──> FileDiscovery (bounded parallel walks and reads, content cache)
//!     │      └─> SourceFile { path, content, mtime }
//!     │
//!     ├──> EntityExtractor (shared AnalysisContext)
//!     │      └─> BaseEntity per exported declaration
//!     │
//!     └──> ensure_unique_ids ──> base snapshot (JSON)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use entity_indexer::{write_base_snapshot, EntityIndexer};
//!
//! #[tokio::main]
//! async fn main() -> entity_indexer::Result<()> {
//!     let indexer = EntityIndexer::new("/path/to/project")?;
//!     let extraction = indexer.extract_all().await;
//!     write_base_snapshot("entities.json", &extraction.entities).await?;
//!
//!     println!("{} entities from {} files", extraction.stats.entities, extraction.stats.files);
//!     Ok(())
//! }
//! ```

mod content_cache;
mod discovery;
mod error;
mod ids;
mod indexer;
mod snapshot;
mod stats;

pub use content_cache::{ContentCache, CONTENT_CACHE_LIMIT_BYTES};
pub use discovery::{is_source_file, FileDiscovery, SourceFile, BATCH_SIZE, MAX_PARALLEL_DIRS, MAX_PARALLEL_FILES};
pub use error::{IndexerError, Result};
pub use ids::ensure_unique_ids;
pub use indexer::{EntityIndexer, Extraction};
pub use snapshot::{read_base_snapshot, write_base_snapshot, BaseSnapshot};
pub use stats::ExtractionStats;
