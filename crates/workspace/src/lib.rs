//! # Entity Workspace
//!
//! Monorepo discovery for JavaScript/TypeScript front-end projects.
//!
//! ## Resolution
//!
//! ```text
//! start dir
//!     │
//!     ├──> walk upward: pnpm-workspace.yaml | package.json{workspaces}
//!     │         └─> none found → single-package workspace at start dir
//!     │
//!     ├──> member patterns (literal, `*`, `**`) → candidate directories
//!     │         └─> keep dirs with a named manifest and real sources
//!     │
//!     └──> linked dependencies (`workspace:` / `injected`)
//!               ├─> member map
//!               ├─> node_modules symlink target
//!               ├─> pnpm store `file+packages+…`
//!               └─> bounded manifest search
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use entity_workspace::WorkspaceResolver;
//!
//! let workspace = WorkspaceResolver::discover("./apps/web").unwrap();
//! for (name, dir) in workspace.packages() {
//!     println!("{name} -> {}", dir.display());
//! }
//! ```

mod error;
mod manifest;
mod patterns;
mod resolver;

pub use error::{Result, WorkspaceError};
pub use manifest::{parse_pnpm_patterns, DependencyMeta, PackageManifest};
pub use patterns::{expand_pattern, is_skipped_dir_name, DEFAULT_MEMBER_PATTERNS, SKIPPED_DIRS};
pub use resolver::{
    find_workspace_root, is_workspace_file, member_patterns, valid_package_name, WorkspaceInfo,
    WorkspaceResolver, SOURCE_DIRS,
};
