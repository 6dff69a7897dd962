use crate::error::{Result, WorkspaceError};
use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory names never treated as workspace members (dot-directories are skipped too)
pub const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".vscode",
    ".idea",
    "dist",
    "build",
    "coverage",
    "tmp",
    "temp",
    "logs",
    ".next",
    ".nuxt",
    "out",
    "target",
    "bin",
    "obj",
    "cache",
    "public",
    "static",
    "assets",
];

/// Member patterns assumed when a workspace declares none
pub const DEFAULT_MEMBER_PATTERNS: &[&str] =
    &["packages/*", "packages/*/*", "apps/*", "libs/*", "modules/*"];

/// Upper bound on directories matched by a single `*` segment
pub const MAX_MATCHES_PER_LEVEL: usize = 100;

/// Depth limit for a `**` segment
pub const MAX_RECURSIVE_DEPTH: usize = 3;

pub fn is_skipped_dir_name(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

fn dir_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// One `/`-separated segment of a member pattern
#[derive(Debug)]
enum Segment {
    Literal(String),
    Wildcard(GlobMatcher),
    Recursive,
}

impl Segment {
    fn parse(raw: &str) -> Result<Self> {
        if raw == "**" {
            return Ok(Self::Recursive);
        }
        if raw.contains(['*', '?', '[', '{']) {
            let glob = Glob::new(raw).map_err(|e| WorkspaceError::pattern(format!("{raw}: {e}")))?;
            return Ok(Self::Wildcard(glob.compile_matcher()));
        }
        Ok(Self::Literal(raw.to_string()))
    }
}

/// Expand a workspace member pattern (`packages/*`, `apps/**`, `tools/cli`) into
/// existing directories under `root`.
///
/// Negated patterns (`!…`) expand to nothing; callers apply them as exclusions.
pub fn expand_pattern(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = pattern.trim().trim_start_matches("./").trim_end_matches('/');
    if pattern.is_empty() || pattern.starts_with('!') {
        return Ok(Vec::new());
    }

    let segments = pattern
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .map(Segment::parse)
        .collect::<Result<Vec<_>>>()?;

    let mut current = vec![root.to_path_buf()];
    for segment in &segments {
        let mut next = Vec::new();
        for base in &current {
            match segment {
                Segment::Literal(part) => {
                    let candidate = base.join(part);
                    if candidate.is_dir() {
                        next.push(candidate);
                    }
                }
                Segment::Wildcard(matcher) => {
                    next.extend(list_child_dirs(base, Some(matcher)));
                }
                Segment::Recursive => {
                    next.extend(recursive_dirs(base));
                }
            }
        }
        next.sort();
        next.dedup();
        current = next;
        if current.is_empty() {
            break;
        }
    }

    Ok(current)
}

/// Immediate, non-skipped child directories of `base`, capped per level
fn list_child_dirs(base: &Path, matcher: Option<&GlobMatcher>) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(base) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| {
            dir_name(path).is_some_and(|name| {
                !is_skipped_dir_name(name) && matcher.map_or(true, |m| m.is_match(name))
            })
        })
        .collect();
    dirs.sort();
    dirs.truncate(MAX_MATCHES_PER_LEVEL);
    dirs
}

/// `base` and all non-skipped directories below it up to the recursive depth limit
fn recursive_dirs(base: &Path) -> Vec<PathBuf> {
    WalkDir::new(base)
        .min_depth(0)
        .max_depth(MAX_RECURSIVE_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| !is_skipped_dir_name(name))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

/// Compile negated member patterns (`!**/test/**`) into an exclusion set
pub fn exclusion_set(patterns: &[String]) -> globset::GlobSet {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        if let Some(negated) = pattern.trim().strip_prefix('!') {
            match Glob::new(negated.trim_start_matches("./")) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => log::warn!("Ignoring invalid exclusion pattern {pattern}: {e}"),
            }
        }
    }
    builder.build().unwrap_or_else(|_| globset::GlobSet::empty())
}
