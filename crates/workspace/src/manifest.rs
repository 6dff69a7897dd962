use crate::error::{Result, WorkspaceError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const PACKAGE_MANIFEST: &str = "package.json";
pub const PNPM_WORKSPACE_FILE: &str = "pnpm-workspace.yaml";

/// Subset of `package.json` the resolver cares about
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub workspaces: Option<Value>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Value>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, Value>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, Value>,
    #[serde(default)]
    pub dependencies_meta: BTreeMap<String, DependencyMeta>,
}

/// `dependenciesMeta.<name>` entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependencyMeta {
    #[serde(default)]
    pub injected: bool,
}

impl PackageManifest {
    /// Read `<dir>/package.json`
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(PACKAGE_MANIFEST);
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| WorkspaceError::manifest(path, e))
    }

    /// Read the manifest, logging and swallowing failures
    pub fn read_opt(dir: &Path) -> Option<Self> {
        if !dir.join(PACKAGE_MANIFEST).is_file() {
            return None;
        }
        match Self::read(dir) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                log::debug!("Skipping unreadable manifest in {}: {e}", dir.display());
                None
            }
        }
    }

    /// Package name, only when it is a string
    pub fn package_name(&self) -> Option<&str> {
        self.name.as_ref().and_then(Value::as_str)
    }

    pub fn declares_workspaces(&self) -> bool {
        self.workspaces.is_some()
    }

    /// Member patterns from the `workspaces` field (array or `{ packages: [...] }`)
    pub fn workspace_patterns(&self) -> Vec<String> {
        let list = match &self.workspaces {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Object(map)) => match map.get("packages") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => &[],
            },
            _ => &[],
        };
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }

    /// Dependencies that point into the workspace: the `workspace:` protocol in any
    /// dependency table, or an `injected` flag in `dependenciesMeta`.
    pub fn workspace_dependencies(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            &self.dependencies,
            &self.dev_dependencies,
            &self.peer_dependencies,
        ]
        .into_iter()
        .flat_map(|table| table.iter())
        .filter(|(_, spec)| {
            spec.as_str()
                .is_some_and(|spec| spec.starts_with("workspace:"))
        })
        .map(|(name, _)| name.clone())
        .collect();

        names.extend(self.injected_dependencies());
        names.sort();
        names.dedup();
        names
    }

    pub fn injected_dependencies(&self) -> impl Iterator<Item = String> + '_ {
        self.dependencies_meta
            .iter()
            .filter(|(_, meta)| meta.injected)
            .map(|(name, _)| name.clone())
    }
}

/// Read the `packages:` list of a `pnpm-workspace.yaml`.
///
/// Only the block-list form is understood; that is the only shape pnpm documents.
pub fn read_pnpm_patterns(root: &Path) -> Option<Vec<String>> {
    let raw = std::fs::read_to_string(root.join(PNPM_WORKSPACE_FILE)).ok()?;
    Some(parse_pnpm_patterns(&raw))
}

pub fn parse_pnpm_patterns(raw: &str) -> Vec<String> {
    let mut patterns = Vec::new();
    let mut in_packages = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indented = line.starts_with(' ') || line.starts_with('\t');
        if !indented {
            in_packages = trimmed.trim_end_matches(':').trim() == "packages"
                && trimmed.ends_with(':');
            continue;
        }
        if !in_packages {
            continue;
        }
        if let Some(item) = trimmed.strip_prefix('-') {
            let item = item
                .split(" #")
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches(|c| c == '\'' || c == '"');
            if !item.is_empty() {
                patterns.push(item.to_string());
            }
        }
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pnpm_block_list() {
        let raw = "packages:\n  - 'packages/*'\n  - \"apps/**\" # apps\n  - '!**/test/**'\ncatalog:\n  - nope\n";
        assert_eq!(
            parse_pnpm_patterns(raw),
            vec!["packages/*", "apps/**", "!**/test/**"]
        );
    }

    #[test]
    fn workspaces_field_shapes() {
        let array: PackageManifest =
            serde_json::from_str(r#"{"name":"root","workspaces":["packages/*"]}"#).unwrap();
        assert_eq!(array.workspace_patterns(), vec!["packages/*"]);

        let object: PackageManifest =
            serde_json::from_str(r#"{"workspaces":{"packages":["libs/*"]}}"#).unwrap();
        assert_eq!(object.workspace_patterns(), vec!["libs/*"]);
        assert!(object.package_name().is_none());
    }

    #[test]
    fn workspace_dependencies_merge_protocol_and_injected() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{
                "dependencies": {"@app/core": "workspace:*", "react": "^18"},
                "devDependencies": {"@app/test": "workspace:^"},
                "dependenciesMeta": {"@app/ui": {"injected": true}, "react": {"injected": false}}
            }"#,
        )
        .unwrap();
        assert_eq!(
            manifest.workspace_dependencies(),
            vec!["@app/core", "@app/test", "@app/ui"]
        );
    }
}
