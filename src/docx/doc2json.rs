use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::docx::filter::{normalize_text, prune_tree, Doc2JsonRules};
use crate::docx::metadata::extract_metadata;
use crate::docx::package::{DocxPackage, CORE_PROPERTIES_PART, DOCUMENT_PART};
use crate::docx::record::{element_to_value, Record, Value};
use crate::docx::xml::parse_xml_part;
use crate::error::Result;
use crate::progress::ConsoleLog;

pub const METADATA_KEY: &str = "metadata";

/// Converts `.docx` bytes into the pruned record: `{<root tag>: ..., "metadata": {...}}`.
/// Both the main document and the core properties part are mandatory.
pub fn docx_to_record(bytes: &[u8], rules: &Doc2JsonRules) -> Result<Record> {
    let matcher = rules.matcher();
    let mut pkg = DocxPackage::from_bytes(bytes)?;

    let document_xml = pkg.require_part(DOCUMENT_PART)?;
    let document = parse_xml_part(DOCUMENT_PART, &document_xml)?;

    let core_xml = pkg.require_part(CORE_PROPERTIES_PART)?;
    let core = parse_xml_part(CORE_PROPERTIES_PART, &core_xml)?;
    let metadata = extract_metadata(&core, &matcher);

    let mut tree = prune_tree(&document, &matcher);
    normalize_text(&mut tree);

    let mut out = Record::new();
    if let Some(v) = element_to_value(&tree, &matcher) {
        out.insert(tree.name.as_str(), v);
    }
    out.insert(METADATA_KEY, Value::Single(metadata));
    Ok(out)
}

pub fn docx_to_json_with_rules(bytes: &[u8], rules: &Doc2JsonRules) -> Result<String> {
    let record = docx_to_record(bytes, rules)?;
    Ok(serde_json::to_string_pretty(&record)?)
}

/// `convert(documentBytes) -> jsonString` with the built-in rules.
pub fn docx_to_json(bytes: &[u8]) -> Result<String> {
    docx_to_json_with_rules(bytes, &Doc2JsonRules::default())
}

pub fn extract_docx_json(
    input_docx: &Path,
    output_json: &Path,
    rules: &Doc2JsonRules,
    log: &ConsoleLog,
) -> anyhow::Result<()> {
    let bytes =
        fs::read(input_docx).with_context(|| format!("read docx: {}", input_docx.display()))?;
    log.info(format!("doc2json: {} ({} bytes)", input_docx.display(), bytes.len()));
    let json = docx_to_json_with_rules(&bytes, rules)
        .with_context(|| format!("convert docx: {}", input_docx.display()))?;
    fs::write(output_json, json.as_bytes())
        .with_context(|| format!("write json: {}", output_json.display()))?;
    log.info(format!("wrote {}", output_json.display()));
    Ok(())
}

pub fn default_json_output_for(input_docx: &Path) -> PathBuf {
    let stem = input_docx
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    input_docx.with_file_name(format!("{stem}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::package::testing::{build_docx, docx_with_body, wrap_body, CORE_XML};
    use crate::error::Error;

    #[test]
    fn plain_paragraph_yields_text_and_metadata_only() {
        let bytes = docx_with_body(
            r#"<w:p w:rsidR="00A1" w:rsidRDefault="00B2" w:rsidP="00C3"><w:r w:rsidRPr="0042"><w:t>Hello world</w:t></w:r></w:p><w:sectPr w:rsidR="00A1"><w:pgMar w:top="1440"/></w:sectPr>"#,
        );
        let json = docx_to_json(&bytes).expect("convert");
        let expected = r#"{
  "document": {
    "body": {
      "p": {
        "r": {
          "t": "Hello world"
        }
      }
    }
  },
  "metadata": {
    "title": "Quarterly Report",
    "creator": "Jane Doe",
    "lastModifiedBy": "Jane Doe",
    "created": "2024-01-02T03:04:05Z"
  }
}"#;
        assert_eq!(json, expected);
        assert!(!json.contains("rsid"));
    }

    #[test]
    fn non_ascii_is_kept_literal() {
        let bytes = docx_with_body(r#"<w:p><w:r><w:t>Grüße 你好</w:t></w:r></w:p>"#);
        let json = docx_to_json(&bytes).expect("convert");
        assert!(json.contains("Grüße 你好"));
    }

    #[test]
    fn output_parses_back_to_the_same_shape() {
        let bytes = docx_with_body(
            r#"<w:p><w:r><w:t>a</w:t></w:r><w:r><w:rPr><w:highlight w:val="cyan"/></w:rPr><w:t>b</w:t></w:r></w:p>"#,
        );
        let json = docx_to_json(&bytes).expect("convert");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        let runs = &parsed["document"]["body"]["p"]["r"];
        assert_eq!(runs[0]["t"], "a");
        assert_eq!(runs[1]["rPr"]["highlight"]["val"], "cyan");
        assert_eq!(runs[1]["t"], "b");
        let again = serde_json::to_string_pretty(&parsed).expect("reserialize");
        let reparsed: serde_json::Value = serde_json::from_str(&again).expect("valid json");
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn invalid_zip_is_invalid_package() {
        let err = docx_to_json(b"PK\x03\x04 broken").expect_err("bad zip");
        assert!(matches!(err, Error::InvalidPackage(_)));
    }

    #[test]
    fn missing_document_part_is_invalid_package() {
        let bytes = build_docx(&[("docProps/core.xml", CORE_XML.as_bytes())]);
        let err = docx_to_json(&bytes).expect_err("no document");
        assert!(matches!(err, Error::InvalidPackage(_)));
    }

    #[test]
    fn unbalanced_document_is_malformed_xml() {
        let bytes = build_docx(&[
            ("word/document.xml", b"<w:document xmlns:w=\"urn:w\"><w:body><w:p></w:body></w:document>".as_slice()),
            ("docProps/core.xml", CORE_XML.as_bytes()),
        ]);
        match docx_to_json(&bytes).expect_err("malformed") {
            Error::MalformedXml { part, .. } => assert_eq!(part, "word/document.xml"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_core_properties_fail() {
        let document = wrap_body("<w:p/>");
        let bytes = build_docx(&[
            ("word/document.xml", document.as_bytes()),
            ("docProps/core.xml", b"<cp:coreProperties><dc:title>x</cp:coreProperties>".as_slice()),
        ]);
        match docx_to_json(&bytes).expect_err("malformed") {
            Error::MalformedXml { part, .. } => assert_eq!(part, "docProps/core.xml"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_core_properties_is_invalid_package() {
        let document = wrap_body(r#"<w:p><w:r><w:t>x</w:t></w:r></w:p>"#);
        let bytes = build_docx(&[("word/document.xml", document.as_bytes())]);
        match docx_to_record(&bytes, &Doc2JsonRules::default()).expect_err("no core.xml") {
            Error::InvalidPackage(reason) => {
                assert!(reason.contains(CORE_PROPERTIES_PART), "{reason}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_core_properties_give_empty_metadata() {
        let document = wrap_body(r#"<w:p><w:r><w:t>x</w:t></w:r></w:p>"#);
        let bytes = build_docx(&[
            ("word/document.xml", document.as_bytes()),
            ("docProps/core.xml", b"<cp:coreProperties xmlns:cp=\"urn:cp\"/>".as_slice()),
        ]);
        let record = docx_to_record(&bytes, &Doc2JsonRules::default()).expect("convert");
        assert_eq!(record.get(METADATA_KEY), Some(&Value::Single(Record::new())));
    }

    #[test]
    fn default_output_sits_next_to_input() {
        let out = default_json_output_for(Path::new("/tmp/report.docx"));
        assert_eq!(out, PathBuf::from("/tmp/report.json"));
    }
}
