use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not a valid docx package: {0}")]
    InvalidPackage(String),

    #[error("malformed xml in {part}: {reason}")]
    MalformedXml { part: String, reason: String },

    #[error("unknown image format: {}", path.display())]
    UnknownImageFormat { path: PathBuf },

    #[error("cannot read attachment {}: {source}", path.display())]
    AttachmentUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("text-only provider cannot take image attachment {}", path.display())]
    ImageNotSupported { path: PathBuf },

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(part: &str, reason: impl ToString) -> Self {
        Self::MalformedXml {
            part: part.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
