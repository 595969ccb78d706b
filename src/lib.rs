pub mod chat;
pub mod config;
pub mod docx;
pub mod error;
pub mod ffi;
pub mod progress;

pub use docx::doc2json::{docx_to_json, docx_to_json_with_rules, docx_to_record};
pub use error::{Error, Result};
