//! Import alias table loaded from compiler and bundler configuration.

use crate::modules::clean_path;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const TSCONFIG: &str = "tsconfig.json";
const MAX_EXTENDS_DEPTH: usize = 8;

static VUE_CONFIG_ALIAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"alias\s*:\s*\{([^}]+)\}").expect("Invalid regex"));
static BUNDLER_ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"resolve\s*:\s*\{[^}]*alias\s*:\s*\{([^}]+)\}").expect("Invalid regex")
});
static ALIAS_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"['"]([^'"]+)['"]\s*:\s*(?:(?:require\(['"`]path['"`]\)|path)\.resolve\(__dirname,\s*)?['"]([^'"]+)['"]\)?"#,
    )
    .expect("Invalid regex")
});

/// Alias prefix to directory, matched longest alias first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<(String, PathBuf)>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aliases declared for the project at `root`.
    ///
    /// `tsconfig.json` (searched upward) is read first; `vue.config.js`,
    /// the first vite/vitest config and `webpack.config.js` override it.
    pub fn load(root: &Path) -> Self {
        let mut table = Self::new();

        if let Some(tsconfig) = find_upward(root, TSCONFIG) {
            for (alias, target) in tsconfig_paths(&tsconfig) {
                table.insert(alias, target);
            }
        }

        if let Ok(raw) = std::fs::read_to_string(root.join("vue.config.js")) {
            table.extend_from_script(root, &raw, &VUE_CONFIG_ALIAS);
        }

        let bundler = ["vite.config.ts", "vite.config.js", "vitest.config.ts", "vitest.config.js"]
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file());
        for path in bundler.into_iter().chain([root.join("webpack.config.js")]) {
            if let Ok(raw) = std::fs::read_to_string(&path) {
                table.extend_from_script(root, &raw, &BUNDLER_ALIAS);
            }
        }

        if !table.is_empty() {
            log::debug!("Loaded {} import aliases for {}", table.len(), root.display());
        }
        table
    }

    /// Add or replace an alias
    pub fn insert(&mut self, alias: impl Into<String>, target: impl Into<PathBuf>) {
        let alias = alias.into();
        let target = clean_path(&target.into());
        if alias.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|(existing, _)| *existing == alias) {
            Some(entry) => entry.1 = target,
            None => self.entries.push((alias, target)),
        }
        self.entries
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
    }

    fn extend_from_script(&mut self, root: &Path, raw: &str, block: &Regex) {
        let Some(body) = block.captures(raw).and_then(|caps| caps.get(1)) else {
            return;
        };
        for caps in ALIAS_ENTRY.captures_iter(body.as_str()) {
            self.insert(&caps[1], root.join(&caps[2]));
        }
    }

    /// Longest alias matching `specifier` exactly or as `alias/` prefix,
    /// with the remaining sub-path
    pub fn matches<'s>(&self, specifier: &'s str) -> Option<(&str, &Path, &'s str)> {
        self.entries.iter().find_map(|(alias, target)| {
            let rest = if specifier == alias {
                ""
            } else {
                let alias_dir = alias.trim_end_matches('/');
                specifier.strip_prefix(alias_dir)?.strip_prefix('/')?
            };
            Some((alias.as_str(), target.as_path(), rest))
        })
    }

    pub fn is_alias(&self, specifier: &str) -> bool {
        self.matches(specifier).is_some()
    }

    /// Path an aliased specifier points at, before extension probing
    pub fn resolve(&self, specifier: &str) -> Option<PathBuf> {
        self.matches(specifier).map(|(_, target, rest)| {
            if rest.is_empty() {
                target.to_path_buf()
            } else {
                clean_path(&target.join(rest))
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(alias, target)| (alias.as_str(), target.as_path()))
    }
}

fn find_upward(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[derive(Default)]
struct CompilerPaths {
    base_url: Option<PathBuf>,
    /// `paths` object with the directory of the config declaring it
    paths: Option<(PathBuf, Map<String, Value>)>,
}

/// Alias entries from `compilerOptions.paths`, following `extends`
fn tsconfig_paths(path: &Path) -> Vec<(String, PathBuf)> {
    let options = read_compiler_paths(path, 0);
    let Some((declared_in, paths)) = options.paths else {
        return Vec::new();
    };
    let base = options.base_url.unwrap_or(declared_in);

    paths
        .iter()
        .filter_map(|(key, targets)| {
            let target = targets.as_array()?.first()?.as_str()?;
            let alias = key.trim_end_matches("/*").trim_end_matches('*');
            let target = target.trim_end_matches("/*").trim_end_matches('*');
            Some((alias.to_string(), clean_path(&base.join(target))))
        })
        .collect()
}

fn read_compiler_paths(path: &Path, depth: usize) -> CompilerPaths {
    let Some(config) = read_lenient_json(path) else {
        return CompilerPaths::default();
    };
    let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();

    let mut merged = match config.get("extends").and_then(Value::as_str) {
        Some(parent) if depth < MAX_EXTENDS_DEPTH => resolve_extends(&dir, parent)
            .map(|parent| read_compiler_paths(&parent, depth + 1))
            .unwrap_or_default(),
        _ => CompilerPaths::default(),
    };

    if let Some(options) = config.get("compilerOptions") {
        if let Some(base_url) = options.get("baseUrl").and_then(Value::as_str) {
            merged.base_url = Some(clean_path(&dir.join(base_url)));
        }
        if let Some(paths) = options.get("paths").and_then(Value::as_object) {
            merged.paths = Some((dir, paths.clone()));
        }
    }
    merged
}

fn resolve_extends(dir: &Path, parent: &str) -> Option<PathBuf> {
    let with_json = |p: PathBuf| {
        if p.extension().is_some_and(|ext| ext == "json") {
            p
        } else {
            let mut os = p.into_os_string();
            os.push(".json");
            PathBuf::from(os)
        }
    };
    let candidate = if parent.starts_with('.') || Path::new(parent).is_absolute() {
        with_json(dir.join(parent))
    } else {
        let package = dir.ancestors().map(|d| d.join("node_modules").join(parent)).find(|p| p.exists())?;
        if package.is_dir() {
            package.join(TSCONFIG)
        } else {
            package
        }
    };
    candidate.is_file().then_some(candidate)
}

fn read_lenient_json(path: &Path) -> Option<Value> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&strip_json_extensions(&raw)) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring unparsable {}: {e}", path.display());
            None
        }
    }
}

/// Remove comments and trailing commas so JSON-with-comments parses as JSON
pub(crate) fn strip_json_extensions(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    let mut in_string = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match (c, chars.get(i + 1)) {
            ('"', _) => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            (',', _) => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}
