use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::docx::xml::XmlElement;

/// Denylists driving the doc2json pruning. Every list can be overridden from TOML; lists left
/// out of the file keep their defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Doc2JsonRules {
    pub version: u32,
    pub ignored_elements: Vec<String>,
    pub ignored_attributes: Vec<String>,
    pub ignored_attribute_prefixes: Vec<String>,
    pub font_attributes: Vec<String>,
    pub common_fonts: Vec<String>,
    pub ignored_metadata: Vec<String>,
    pub run_properties_element: String,
    pub keep_run_properties_suffix: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Doc2JsonRules {
    fn default() -> Self {
        Self {
            version: 1,
            ignored_elements: strings(&[
                "proofErr",
                "bookmarkStart",
                "bookmarkEnd",
                "lastRenderedPageBreak",
                "webHidden",
                "numPr",
                "pBdr",
                "ind",
                "spacing",
                "jc",
                "tabs",
                "sectPr",
                "pgMar",
            ]),
            ignored_attributes: strings(&[
                "rsidR",
                "rsidRPr",
                "rsidRDefault",
                "rsidP",
                "paraId",
                "textId",
                "rsidDel",
                "rsidTr",
            ]),
            ignored_attribute_prefixes: strings(&["rsid"]),
            font_attributes: strings(&["ascii", "hAnsi", "cs", "eastAsia"]),
            common_fonts: strings(&["Times New Roman", "Arial", "Calibri"]),
            ignored_metadata: strings(&[
                "application",
                "docSecurity",
                "scaleCrop",
                "linksUpToDate",
                "charactersWithSpaces",
                "hiddenSlides",
                "mmClips",
                "notes",
                "words",
                "characters",
                "pages",
                "lines",
                "paragraphs",
                "company",
                "template",
            ]),
            run_properties_element: "rPr".to_string(),
            keep_run_properties_suffix: "highlight".to_string(),
        }
    }
}

impl Doc2JsonRules {
    pub fn from_toml_path(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read doc2json rules: {}", path.display()))?;
        let s = String::from_utf8(bytes).context("doc2json rules must be utf-8")?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let rules: Doc2JsonRules = toml::from_str(s).context("parse doc2json rules (toml)")?;
        if rules.version != 1 {
            return Err(anyhow!(
                "unsupported doc2json rules version: {} (expected 1)",
                rules.version
            ));
        }
        Ok(rules)
    }

    pub fn matcher(&self) -> RuleSet<'_> {
        RuleSet {
            rules: self,
            elements: self.ignored_elements.iter().map(|s| s.as_str()).collect(),
            attributes: self.ignored_attributes.iter().map(|s| s.as_str()).collect(),
            font_attributes: self.font_attributes.iter().map(|s| s.as_str()).collect(),
            common_fonts: self.common_fonts.iter().map(|s| s.as_str()).collect(),
            metadata: self.ignored_metadata.iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// Borrowed, hash-backed view of [`Doc2JsonRules`] used during one conversion.
pub struct RuleSet<'a> {
    rules: &'a Doc2JsonRules,
    elements: HashSet<&'a str>,
    attributes: HashSet<&'a str>,
    font_attributes: HashSet<&'a str>,
    common_fonts: HashSet<&'a str>,
    metadata: HashSet<&'a str>,
}

impl RuleSet<'_> {
    pub fn is_noise_element(&self, name: &str) -> bool {
        self.elements.contains(name)
    }

    pub fn is_noise_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
            || self
                .rules
                .ignored_attribute_prefixes
                .iter()
                .any(|p| name.starts_with(p.as_str()))
    }

    pub fn is_font_attribute(&self, name: &str) -> bool {
        self.font_attributes.contains(name)
    }

    pub fn is_common_font(&self, value: &str) -> bool {
        self.common_fonts.contains(value)
    }

    pub fn is_noise_metadata(&self, name: &str) -> bool {
        self.metadata.contains(name)
    }

    /// Run properties survive only when they carry a highlight child.
    fn drops_run_properties(&self, el: &XmlElement) -> bool {
        el.name == self.rules.run_properties_element
            && !el
                .children
                .iter()
                .any(|c| c.name.ends_with(self.rules.keep_run_properties_suffix.as_str()))
    }
}

/// Elimination pass: returns a new tree without noise elements, highlight-less run properties and
/// noise attributes. The root itself is never dropped.
pub fn prune_tree(root: &XmlElement, rules: &RuleSet<'_>) -> XmlElement {
    prune_element(root, rules)
}

fn prune_element(el: &XmlElement, rules: &RuleSet<'_>) -> XmlElement {
    XmlElement {
        name: el.name.clone(),
        attrs: el
            .attrs
            .iter()
            .filter(|(k, _)| !rules.is_noise_attribute(k))
            .cloned()
            .collect(),
        children: el
            .children
            .iter()
            .filter(|c| !rules.is_noise_element(&c.name) && !rules.drops_run_properties(c))
            .map(|c| prune_element(c, rules))
            .collect(),
        text: el.text.clone(),
    }
}

/// Text normalization pass: trims every text node; whitespace-only text becomes absent.
pub fn normalize_text(el: &mut XmlElement) {
    el.text = el
        .text
        .take()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    for child in &mut el.children {
        normalize_text(child);
    }
}

pub const DEFAULT_DOC2JSON_RULES_TOML: &str = r#"# doc2json pruning rules. Lists omitted here keep their built-in defaults.
version = 1

# Elements dropped together with their subtree.
ignored_elements = [
  "proofErr", "bookmarkStart", "bookmarkEnd", "lastRenderedPageBreak", "webHidden",
  "numPr", "pBdr", "ind", "spacing", "jc", "tabs", "sectPr", "pgMar",
]

# Attributes stripped everywhere (plus any attribute starting with a listed prefix).
ignored_attributes = ["rsidR", "rsidRPr", "rsidRDefault", "rsidP", "paraId", "textId", "rsidDel", "rsidTr"]
ignored_attribute_prefixes = ["rsid"]

# Font attributes are kept only when they name an uncommon font.
font_attributes = ["ascii", "hAnsi", "cs", "eastAsia"]
common_fonts = ["Times New Roman", "Arial", "Calibri"]

# docProps/core.xml fields left out of "metadata".
ignored_metadata = [
  "application", "docSecurity", "scaleCrop", "linksUpToDate", "charactersWithSpaces",
  "hiddenSlides", "mmClips", "notes", "words", "characters", "pages", "lines",
  "paragraphs", "company", "template",
]

# Run properties are dropped unless a direct child name ends with this suffix.
run_properties_element = "rPr"
keep_run_properties_suffix = "highlight"
"#;
