//! # Entity Graph
//!
//! Cross-file reference resolution for extracted entities.
//!
//! ## Architecture
//!
//! ```text
//! BaseEntity[]
//!     │
//!     ├──> StaticAnalyzer (per entity, per file cached)
//!     │      ├─ import statements ──> ModuleResolver
//!     │      │      ├─ relative paths (extensions, index files, manifest main)
//!     │      │      ├─ AliasTable (tsconfig paths, bundler configs)
//!     │      │      └─ workspace packages (WorkspaceResolver)
//!     │      ├─ export sets of targets (AnalysisContext cache)
//!     │      ├─ calls, emitted events, template components
//!     │      └─ annotation text (normalized + original)
//!     │
//!     └──> ReferenceGraph (petgraph)
//!            ├─ Nodes: entities and events
//!            └─ Edges: imports, calls, emits
//! ```
//!
//! Third-party modules never become nodes; unresolved references are
//! dropped rather than reported.

mod aliases;
mod analyzer;
mod error;
mod exports;
mod graph;
mod lookup;
mod modules;

pub use aliases::AliasTable;
pub use analyzer::{StaticAnalysis, StaticAnalyzer};
pub use error::{GraphError, Result};
pub use exports::{module_exports, DEFAULT_EXPORT};
pub use graph::{EdgeRow, GraphEdge, GraphNode, GraphSummary, ReferenceGraph, ReferenceKind};
pub use lookup::{find_target, synthesize_id, EntityIndex, ExportRef};
pub use modules::{
    clean_path, entry_file, resolve_file, ModuleOrigin, ModuleResolver, ResolvedModule, ALIAS_EXTENSIONS,
    RELATIVE_EXTENSIONS,
};
