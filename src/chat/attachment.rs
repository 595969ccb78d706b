use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use encoding_rs::UTF_8;

use crate::chat::message::{ContentPart, ImageFormat};
use crate::docx::doc2json::docx_to_json;
use crate::error::{Error, Result};

/// Byte-read collaborator for attachment paths. Implementations read the whole file and release
/// it before returning.
pub trait AttachmentReader {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FsAttachmentReader;

impl AttachmentReader for FsAttachmentReader {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

impl<R: AttachmentReader + ?Sized> AttachmentReader for &R {
    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        (**self).read(path)
    }
}

pub fn read_attachment<R: AttachmentReader + ?Sized>(reader: &R, path: &Path) -> Result<Vec<u8>> {
    reader
        .read(path)
        .map_err(|source| Error::AttachmentUnreadable {
            path: path.to_path_buf(),
            source,
        })
}

pub fn image_part<R: AttachmentReader + ?Sized>(reader: &R, path: &Path) -> Result<ContentPart> {
    let data = read_attachment(reader, path)?;
    let format = ImageFormat::sniff(&data).ok_or_else(|| Error::UnknownImageFormat {
        path: path.to_path_buf(),
    })?;
    Ok(ContentPart::Image {
        format,
        data: STANDARD.encode(&data),
    })
}

/// Fenced code block labeled with the file's base name. Word files are converted to doc2json
/// output first; anything else is decoded as UTF-8 with replacement characters, a leading BOM
/// kept as U+FEFF.
pub fn file_block<R: AttachmentReader + ?Sized>(reader: &R, path: &Path) -> Result<String> {
    let data = read_attachment(reader, path)?;
    let is_docx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
    let content = if is_docx {
        docx_to_json(&data)?
    } else {
        let (text, _) = UTF_8.decode_without_bom_handling(&data);
        text.into_owned()
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(fence(&name, &content))
}

pub fn fence(label: &str, content: &str) -> String {
    format!("```{label}\n{content}\n```")
}
