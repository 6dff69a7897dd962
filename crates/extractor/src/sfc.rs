//! Block splitter for single-file components (`.vue`).

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<script\b([^>]*)>(.*?)</script\s*>").expect("Invalid regex"));
static TEMPLATE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<template\b[^>]*>").expect("Invalid regex"));
static LANG_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\blang\s*=\s*["']([^"']+)["']"#).expect("Invalid regex"));
static SETUP_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)setup(?:\s|=|$)").expect("Invalid regex"));

/// One block's inner content and where it sits in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfcBlock<'a> {
    pub content: &'a str,
    /// Byte offset of `content` in the file
    pub offset: usize,
    /// 0-based line on which `content` starts
    pub line_offset: usize,
    pub lang: Option<String>,
}

impl<'a> SfcBlock<'a> {
    fn new(source: &'a str, start: usize, end: usize, lang: Option<String>) -> Self {
        Self {
            content: &source[start..end],
            offset: start,
            line_offset: source[..start].matches('\n').count(),
            lang,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.content.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfcDescriptor<'a> {
    pub script: Option<SfcBlock<'a>>,
    pub script_setup: Option<SfcBlock<'a>>,
    pub template: Option<SfcBlock<'a>>,
}

impl<'a> SfcDescriptor<'a> {
    /// Script blocks joined for reference scanning (`script` then `script setup`)
    pub fn combined_script(&self) -> String {
        [&self.script, &self.script_setup]
            .into_iter()
            .flatten()
            .map(|block| block.content)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Script block whose first statement carries the component annotation
    pub fn primary_script(&self) -> Option<&SfcBlock<'a>> {
        self.script_setup.as_ref().or(self.script.as_ref())
    }
}

/// Split a single-file component into its script and template blocks
pub fn parse_sfc(source: &str) -> SfcDescriptor<'_> {
    let mut descriptor = SfcDescriptor::default();

    for caps in SCRIPT_BLOCK.captures_iter(source) {
        let (Some(attrs), Some(body)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let lang = LANG_ATTR
            .captures(attrs.as_str())
            .map(|c| c[1].to_string());
        let block = SfcBlock::new(source, body.start(), body.end(), lang);
        if SETUP_ATTR.is_match(attrs.as_str()) {
            descriptor.script_setup.get_or_insert(block);
        } else {
            descriptor.script.get_or_insert(block);
        }
    }

    if let Some(open) = TEMPLATE_OPEN.find(source) {
        if let Some(close) = source.rfind("</template>") {
            if close >= open.end() {
                descriptor.template = Some(SfcBlock::new(source, open.end(), close, None));
            }
        }
    }

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CARD: &str = r#"<template>
  <div>
    <template v-if="x"><UserAvatar /></template>
  </div>
</template>

<script lang="ts">
export default { name: 'Card' }
</script>

<script setup lang="ts">
const emit = defineEmits(['close'])
</script>
"#;

    #[test]
    fn splits_blocks_with_offsets() {
        let sfc = parse_sfc(CARD);

        let script = sfc.script.as_ref().unwrap();
        assert_eq!(script.lang.as_deref(), Some("ts"));
        assert_eq!(script.content.trim(), "export default { name: 'Card' }");
        assert_eq!(script.line_offset, 6);
        assert_eq!(&CARD[script.offset..script.end()], script.content);

        let setup = sfc.script_setup.as_ref().unwrap();
        assert!(setup.content.contains("defineEmits"));

        let template = sfc.template.as_ref().unwrap();
        assert!(template.content.contains("<UserAvatar />"));
        assert!(template.content.trim_end().ends_with("</div>"));
        assert_eq!(sfc.primary_script().unwrap().content, setup.content);
    }

    #[test]
    fn template_only_component() {
        let sfc = parse_sfc("<template><p>hi</p></template>\n");
        assert!(sfc.script.is_none());
        assert!(sfc.script_setup.is_none());
        assert_eq!(sfc.template.unwrap().content, "<p>hi</p>");
    }
}
