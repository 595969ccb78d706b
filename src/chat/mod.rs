pub mod attachment;
pub mod download;
pub mod format;
pub mod history;
pub mod message;
pub mod provider;

pub use attachment::{AttachmentReader, FsAttachmentReader};
pub use format::{ChatHistoryFormatter, ContentMode};
pub use history::{Transcript, Turn, UserContent};
pub use message::{ContentPart, ImageFormat, Message, MessageContent, Role};
pub use provider::{ProviderAdapter, ProviderKind, RequestParams};
