use crate::docx::filter::RuleSet;
use crate::docx::record::{Record, Value};
use crate::docx::xml::XmlElement;

/// Core-properties fields (`docProps/core.xml` root children) minus the metadata denylist.
/// Fields without text map to an empty string.
pub fn extract_metadata(core_root: &XmlElement, rules: &RuleSet<'_>) -> Record {
    let mut metadata = Record::new();
    for child in &core_root.children {
        if rules.is_noise_metadata(&child.name) {
            continue;
        }
        let text = child.text.clone().unwrap_or_default();
        metadata.insert(child.name.as_str(), Value::Scalar(text));
    }
    metadata
}
