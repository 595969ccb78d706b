//! Output shape of doc2json.
//!
//! Every element converts to one of three shapes, depending on what survived filtering:
//!
//! - [`Value::Scalar`]: the element only had text, so it collapses to that string.
//! - [`Value::Single`]: a record of attributes, child tags and an optional `#text` entry.
//! - [`Value::Multiple`]: the tag occurred more than once under the same parent; the items
//!   (scalars or records) are kept in document order.
//!
//! Consumers should match on the shape instead of assuming one: the same tag can be a string in
//! one paragraph and a list in the next.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::docx::filter::RuleSet;
use crate::docx::xml::XmlElement;

pub const TEXT_KEY: &str = "#text";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    Single(Record),
    Multiple(Vec<Value>),
}

/// Insertion-ordered string-keyed map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value in place when the key exists, appends otherwise.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Single(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::Multiple(items) => Some(items),
            _ => None,
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => serializer.serialize_str(s),
            Value::Single(r) => r.serialize(serializer),
            Value::Multiple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Converts a pruned, text-normalized element. `None` means the element carries nothing worth
/// keeping and must be dropped from its parent.
pub fn element_to_value(el: &XmlElement, rules: &RuleSet<'_>) -> Option<Value> {
    if rules.is_noise_element(&el.name) {
        return None;
    }

    let mut record = Record::new();

    let mut groups: Vec<(&str, Vec<Value>)> = Vec::new();
    for child in &el.children {
        let Some(v) = element_to_value(child, rules) else {
            continue;
        };
        match groups.iter_mut().find(|(name, _)| *name == child.name) {
            Some((_, values)) => values.push(v),
            None => groups.push((child.name.as_str(), vec![v])),
        }
    }
    let has_children = !groups.is_empty();
    for (name, mut values) in groups {
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Multiple(values)
        };
        record.insert(name, value);
    }

    let mut has_attrs = false;
    for (k, v) in &el.attrs {
        let keep = if rules.is_font_attribute(k) {
            !rules.is_common_font(v)
        } else {
            !rules.is_noise_attribute(k)
        };
        if keep {
            record.insert(k.as_str(), Value::Scalar(v.clone()));
            has_attrs = true;
        }
    }

    let text = el.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    match text {
        Some(t) if has_attrs || has_children => {
            record.insert(TEXT_KEY, Value::Scalar(t.to_string()));
        }
        Some(t) => return Some(Value::Scalar(t.to_string())),
        None => {}
    }

    if record.is_empty() {
        return None;
    }
    Some(Value::Single(record))
}
