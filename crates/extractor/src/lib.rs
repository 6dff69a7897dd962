//! # Entity Extractor
//!
//! Turns TypeScript, JavaScript, TSX/JSX and Vue single-file components into
//! flat entity records: components, functions, classes and variables that a
//! module exports.
//!
//! ## Pipeline
//!
//! ```text
//! file ──> SourceKind ──> AnalysisContext::parse (cached tree)
//!                            │
//!            .vue ──> sfc::parse_sfc ──> script / script setup / template
//!                            │
//!                            └──> ScriptWalk over export statements
//!                                   └─> classifier::RULES ──> EntityKind
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use entity_extractor::{AnalysisContext, EntityExtractor};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let extractor = EntityExtractor::new("/repo", Arc::new(AnalysisContext::new()));
//! let entities = extractor.extract_file(Path::new("/repo/src/Button.tsx")).unwrap();
//! for entity in entities.iter() {
//!     println!("{} {}:{}", entity.id, entity.file, entity.loc.start);
//! }
//! ```

pub mod classifier;
pub mod comments;
mod context;
mod error;
mod extract;
mod hashing;
mod language;
mod paths;
mod script;
pub mod sfc;
pub mod syntax;
mod types;
mod vue;

pub use context::{
    fingerprint, parse_source, AnalysisContext, CacheStats, ExtractorKind, DEFAULT_BUDGET_BYTES,
    ENTITY_COST_BYTES, TREE_COST_BYTES,
};
pub use error::{ExtractorError, Result};
pub use extract::{EntityExtractor, DEFAULT_DI_PACKAGE};
pub use hashing::{annotation_hash, code_hash};
pub use language::{SourceKind, SOURCE_EXTENSIONS};
pub use paths::{relative_path, to_slash};
pub use script::local_declaration;
pub use types::{file_stem, BaseEntity, EntityKind, Loc};
