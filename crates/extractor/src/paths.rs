use std::path::{Component, Path, PathBuf};

/// `/`-separated path of `path` relative to `root`, using `..` when `path`
/// lies outside `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    if let Ok(rel) = path.strip_prefix(root) {
        return to_slash(rel);
    }

    let root_parts: Vec<Component<'_>> = root.components().collect();
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let common = root_parts
        .iter()
        .zip(path_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..root_parts.len() {
        rel.push("..");
    }
    for part in &path_parts[common..] {
        rel.push(part.as_os_str());
    }
    to_slash(&rel)
}

pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn inside_and_outside_root() {
        let root = Path::new("/repo/apps/web");
        assert_eq!(relative_path(root, Path::new("/repo/apps/web/src/a.ts")), "src/a.ts");
        assert_eq!(
            relative_path(root, Path::new("/repo/packages/ui/index.ts")),
            "../../packages/ui/index.ts"
        );
    }
}
