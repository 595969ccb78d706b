use std::path::{Path, PathBuf};

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::chat::history::Turn;

static FENCED_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(\S*\.(\S+))?\n?([\s\S]*?)```").expect("fenced file regex"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadFile {
    pub file_name: String,
    pub content: String,
}

/// First fenced block of a reply, e.g. ```` ```report.csv\n...``` ````. Blocks without a dotted
/// label are named `download.txt`.
pub fn extract_fenced_file(reply: &str) -> Option<DownloadFile> {
    let caps = FENCED_FILE_RE.captures(reply)?;
    let content = caps.get(3).map(|m| m.as_str()).filter(|c| !c.is_empty())?;
    let ext = caps.get(2).map(|m| m.as_str()).unwrap_or("txt");
    let file_name = match caps.get(1) {
        Some(name) => name.as_str().to_string(),
        None => format!("download.{ext}"),
    };
    Some(DownloadFile {
        file_name,
        content: content.to_string(),
    })
}

/// Latest assistant reply of the transcript (the last turn's reply side).
pub fn last_reply(turns: &[Turn]) -> Option<&str> {
    turns.last().and_then(|t| t.assistant.as_deref())
}

pub fn write_download(dir: &Path, file: &DownloadFile) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create download dir: {}", dir.display()))?;
    let name = Path::new(&file.file_name)
        .file_name()
        .map(|n| sanitize_filename(&n.to_string_lossy()))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "download.txt".to_string());
    let path = dir.join(name);
    std::fs::write(&path, file.content.as_bytes())
        .with_context(|| format!("write download: {}", path.display()))?;
    Ok(path)
}

fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}
