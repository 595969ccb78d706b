use std::io::{Cursor, Read};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Error, Result};

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// Read-only view of a `.docx` zip container; lives for one conversion.
pub struct DocxPackage<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> DocxPackage<'a> {
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        let zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::InvalidPackage(format!("read zip: {e}")))?;
        Ok(Self { zip })
    }

    pub fn part_names(&self) -> Vec<String> {
        self.zip.file_names().map(|s| s.to_string()).collect()
    }

    /// Returns `Ok(None)` when the part is absent from the container.
    pub fn read_part(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut file = match self.zip.by_name(name) {
            Ok(f) => f,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(Error::InvalidPackage(format!("open {name}: {e}"))),
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::InvalidPackage(format!("read {name}: {e}")))?;
        Ok(Some(data))
    }

    pub fn require_part(&mut self, name: &str) -> Result<Vec<u8>> {
        self.read_part(name)?
            .ok_or_else(|| Error::InvalidPackage(format!("missing part: {name}")))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::build_docx;
    use super::*;

    #[test]
    fn rejects_non_zip_bytes() {
        let err = DocxPackage::from_bytes(b"definitely not a zip").err().expect("error");
        assert!(matches!(err, Error::InvalidPackage(_)));
    }

    #[test]
    fn missing_part_is_none_and_required_part_fails() {
        let bytes = build_docx(&[("word/styles.xml", b"<w:styles/>".as_slice())]);
        let mut pkg = DocxPackage::from_bytes(&bytes).expect("open");
        assert_eq!(pkg.part_names(), vec!["word/styles.xml".to_string()]);
        assert!(pkg.read_part(CORE_PROPERTIES_PART).expect("read").is_none());
        let styles = pkg.read_part("word/styles.xml").expect("read");
        assert_eq!(styles.as_deref(), Some(b"<w:styles/>".as_slice()));
        let err = pkg.require_part(DOCUMENT_PART).expect_err("missing");
        assert!(matches!(err, Error::InvalidPackage(_)));
    }
}
