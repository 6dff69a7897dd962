//! Entity IDs for resolved import targets.

use entity_extractor::classifier::kind_from_name;
use entity_extractor::{file_stem, BaseEntity};
use std::collections::HashMap;

/// Which export of a module a binding refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportRef<'a> {
    Default,
    Named(&'a str),
}

impl<'a> ExportRef<'a> {
    pub fn from_name(name: &'a str) -> Self {
        if name == "default" {
            Self::Default
        } else {
            Self::Named(name)
        }
    }
}

/// Entities of the current run grouped by their project-relative file
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    by_file: HashMap<String, Vec<BaseEntity>>,
}

impl EntityIndex {
    pub fn new(entities: &[BaseEntity]) -> Self {
        let mut by_file: HashMap<String, Vec<BaseEntity>> = HashMap::new();
        for entity in entities {
            by_file.entry(entity.file.clone()).or_default().push(entity.clone());
        }
        Self { by_file }
    }

    pub fn entities_in(&self, file: &str) -> Option<&[BaseEntity]> {
        self.by_file.get(file).map(Vec::as_slice)
    }

    pub fn file_count(&self) -> usize {
        self.by_file.len()
    }
}

/// Entity in `file` that `export` names.
///
/// A single-file component resolves to its first entity. A default export
/// matches `rawName == "default"`, then the file's base name, then an id
/// ending in `:<base name>`.
pub fn find_target<'e>(entities: &'e [BaseEntity], file: &str, export: ExportRef<'_>) -> Option<&'e BaseEntity> {
    if file.ends_with(".vue") {
        return entities.first();
    }
    match export {
        ExportRef::Default => {
            let stem = file_stem(file);
            let suffix = format!(":{stem}");
            entities
                .iter()
                .find(|e| e.raw_name == "default")
                .or_else(|| entities.iter().find(|e| e.raw_name == stem))
                .or_else(|| entities.iter().find(|e| e.id.ends_with(&suffix)))
        }
        ExportRef::Named(name) => entities.iter().find(|e| e.raw_name == name),
    }
}

/// Id guessed from naming conventions when the target was never extracted
pub fn synthesize_id(file: &str, export: ExportRef<'_>) -> String {
    let name = match export {
        ExportRef::Default => file_stem(file),
        ExportRef::Named(name) => name,
    };
    let markup = file.ends_with(".tsx") || file.ends_with(".jsx");
    kind_from_name(name, markup, file.ends_with(".vue")).entity_id(name)
}
