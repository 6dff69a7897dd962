use entity_extractor::{annotation_hash, BaseEntity, Loc};
use entity_graph::StaticAnalysis;
use serde::{Deserialize, Deserializer, Serialize};

pub const PROCESSING_FAILED: &str = "processing failed";
pub const STATIC_ANALYSIS_FAILED: &str = "static analysis failed";

/// A base entity with its references, labels and annotation.
///
/// Every field is always serialized; absent or `null` values in a prior
/// snapshot read back as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedEntity {
    #[serde(flatten)]
    pub base: BaseEntity,

    #[serde(rename = "annotationMd5", default, deserialize_with = "null_as_default")]
    pub annotation_md5: String,

    #[serde(rename = "IMPORTS", default, deserialize_with = "null_as_default")]
    pub imports: Vec<String>,

    #[serde(rename = "CALLS", default, deserialize_with = "null_as_default")]
    pub calls: Vec<String>,

    #[serde(rename = "EMITS", default, deserialize_with = "null_as_default")]
    pub emits: Vec<String>,

    #[serde(rename = "TEMPLATE_COMPONENTS", default, deserialize_with = "null_as_default")]
    pub template_components: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    #[serde(rename = "projectDesc", default, deserialize_with = "null_as_default")]
    pub project_desc: String,

    #[serde(rename = "publishTag", default, deserialize_with = "null_as_default")]
    pub publish_tag: String,

    /// Annotation as written in the source file
    #[serde(rename = "ANNOTATION", default, deserialize_with = "null_as_default")]
    pub annotation: String,
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl EnrichedEntity {
    /// Entity carrying `analysis` references and its original annotation, unlabeled
    pub fn from_analysis(base: BaseEntity, analysis: &StaticAnalysis) -> Self {
        let mut entity = Self::unlabeled(base);
        entity.set_references(analysis);
        entity.set_annotation(analysis.original_annotation.clone());
        entity
    }

    fn unlabeled(base: BaseEntity) -> Self {
        Self {
            base,
            annotation_md5: String::new(),
            imports: Vec::new(),
            calls: Vec::new(),
            emits: Vec::new(),
            template_components: Vec::new(),
            summary: String::new(),
            tags: Vec::new(),
            project_desc: String::new(),
            publish_tag: String::new(),
            annotation: String::new(),
        }
    }

    /// Entity whose processing failed after every retry
    pub fn fallback(base: BaseEntity, message: &str) -> Self {
        let mut entity = Self::unlabeled(base);
        entity.summary = format!("{PROCESSING_FAILED}: {message}");
        entity.tags = vec![PROCESSING_FAILED.to_string()];
        entity.set_annotation(format!("/**\n * @description {PROCESSING_FAILED}: {message}\n */"));
        entity
    }

    /// Entity whose static analysis failed during a refresh
    pub fn analysis_failure(base: BaseEntity, message: &str) -> Self {
        let mut entity = Self::unlabeled(base);
        entity.summary = format!("{STATIC_ANALYSIS_FAILED}: {message}");
        entity.tags = vec![STATIC_ANALYSIS_FAILED.to_string()];
        entity
    }

    /// Whether this row is a fallback carrying a failure marker instead of labels
    pub fn is_failed(&self) -> bool {
        self.tags
            .iter()
            .any(|tag| tag == PROCESSING_FAILED || tag == STATIC_ANALYSIS_FAILED)
    }

    pub fn set_references(&mut self, analysis: &StaticAnalysis) {
        self.imports = analysis.imports.clone();
        self.calls = analysis.calls.clone();
        self.emits = analysis.emits.clone();
        self.template_components = analysis.template_components.clone();
    }

    /// Replace the annotation and its hash
    pub fn set_annotation(&mut self, annotation: String) {
        self.annotation_md5 = annotation_hash(&annotation);
        self.annotation = annotation;
    }

    /// Copy summary, tags, project description and publish tag from `other`
    pub fn copy_labels(&mut self, other: &EnrichedEntity) {
        self.summary = other.summary.clone();
        self.tags = other.tags.clone();
        self.project_desc = other.project_desc.clone();
        self.publish_tag = other.publish_tag.clone();
    }

    pub fn set_loc(&mut self, loc: Loc) {
        self.base.loc = loc;
    }

    /// References in the shape the reference graph consumes
    pub fn references(&self) -> StaticAnalysis {
        StaticAnalysis {
            imports: self.imports.clone(),
            calls: self.calls.clone(),
            emits: self.emits.clone(),
            template_components: self.template_components.clone(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.base.id
    }
}
