//! Content hashes used for change detection.
//!
//! Both digests are hex SHA-256. The code hash ignores comments and all
//! whitespace; the annotation hash keeps comment markers and only collapses
//! whitespace runs.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)//.*$").expect("Invalid regex"));
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("Invalid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex"));

fn hex_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash of a declaration's text with comments and whitespace removed.
/// Empty input hashes to an empty string.
pub fn code_hash(code: &str) -> String {
    if code.is_empty() {
        return String::new();
    }
    let without_lines = LINE_COMMENT.replace_all(code, "");
    let without_blocks = BLOCK_COMMENT.replace_all(&without_lines, "");
    let compact = WHITESPACE.replace_all(&without_blocks, "");
    hex_digest(&compact)
}

/// Hash of annotation text with whitespace runs collapsed.
/// Empty input hashes to an empty string.
pub fn annotation_hash(annotation: &str) -> String {
    if annotation.is_empty() {
        return String::new();
    }
    let collapsed = WHITESPACE.replace_all(annotation, " ");
    hex_digest(collapsed.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn code_hash_ignores_comments_and_layout() {
        let a = "function add(a, b) {\n  // sum\n  return a + b;\n}";
        let b = "function add(a,b){ /* sum */ return a+b; }";
        assert_eq!(code_hash(a), code_hash(b));
        assert_ne!(code_hash(a), code_hash("function add(a, b) { return a - b; }"));
    }

    #[test]
    fn annotation_hash_keeps_markers() {
        let a = "/**\n * Adds numbers\n */";
        let b = "/**   \n   * Adds numbers\n */";
        assert_eq!(annotation_hash(a), annotation_hash(b));
        assert_ne!(annotation_hash(a), annotation_hash("// Adds numbers"));
    }

    #[test]
    fn empty_input_has_empty_hash() {
        assert_eq!(code_hash(""), "");
        assert_eq!(annotation_hash(""), "");
        assert_eq!(code_hash("x").len(), 64);
    }
}
