use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Marker that flags an image reference inside a flattened string history.
pub const DEFAULT_IMAGE_PREFIX: &str = "🖼️🆙 ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserContent {
    Text(String),
    Image(PathBuf),
    File(PathBuf),
}

impl UserContent {
    /// Classifies a history string: `<prefix><path>` is an image reference, anything else text.
    pub fn from_marked(raw: &str, image_prefix: &str) -> Self {
        match raw.strip_prefix(image_prefix) {
            Some(path) if !image_prefix.is_empty() => Self::Image(PathBuf::from(path)),
            _ => Self::Text(raw.to_string()),
        }
    }

    pub fn is_empty_text(&self) -> bool {
        matches!(self, UserContent::Text(t) if t.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub user: Option<UserContent>,
    pub assistant: Option<String>,
}

impl Turn {
    pub fn new(user: Option<UserContent>, assistant: Option<String>) -> Self {
        Self { user, assistant }
    }

    pub fn exchange(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self::new(Some(UserContent::Text(user.into())), Some(assistant.into()))
    }

    pub fn pending(user: UserContent) -> Self {
        Self::new(Some(user), None)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawUserContent {
    Marked(String),
    Image { image: PathBuf },
    File { file: PathBuf },
}

impl RawUserContent {
    fn classify(self, image_prefix: &str) -> UserContent {
        match self {
            RawUserContent::Marked(s) => UserContent::from_marked(&s, image_prefix),
            RawUserContent::Image { image } => UserContent::Image(image),
            RawUserContent::File { file } => UserContent::File(file),
        }
    }
}

type RawTurn = (Option<RawUserContent>, Option<String>);

/// On-disk transcript layouts. `Bare` must stay first: the struct variant also accepts a sequence.
#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Bare(Vec<RawTurn>),
    Envelope {
        #[serde(default)]
        history: Vec<RawTurn>,
        #[serde(default)]
        system_prompt: Option<String>,
    },
}

/// Chat transcript file: either `{"history": [[user, assistant], ...], "system_prompt": "..."}`
/// or the bare `[[user, assistant], ...]` history export.
/// A user entry is a string (image marker allowed), `{"image": path}` or `{"file": path}`;
/// either side may be `null`.
#[derive(Clone, Debug)]
pub struct Transcript {
    history: Vec<RawTurn>,
    pub system_prompt: Option<String>,
}

impl Transcript {
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let file: TranscriptFile = serde_json::from_str(s).context("parse chat transcript json")?;
        Ok(match file {
            TranscriptFile::Bare(history) => Self {
                history,
                system_prompt: None,
            },
            TranscriptFile::Envelope {
                history,
                system_prompt,
            } => Self {
                history,
                system_prompt,
            },
        })
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read chat transcript: {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        Self::from_json_str(&text).with_context(|| format!("transcript: {}", path.display()))
    }

    pub fn turns(&self, image_prefix: &str) -> Vec<Turn> {
        self.history
            .iter()
            .cloned()
            .map(|(user, assistant)| Turn {
                user: user.map(|u| u.classify(image_prefix)),
                assistant,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_prefix_makes_image_reference() {
        let raw = format!("{DEFAULT_IMAGE_PREFIX}/tmp/cat.png");
        assert_eq!(
            UserContent::from_marked(&raw, DEFAULT_IMAGE_PREFIX),
            UserContent::Image(PathBuf::from("/tmp/cat.png"))
        );
        assert_eq!(
            UserContent::from_marked("plain words", DEFAULT_IMAGE_PREFIX),
            UserContent::Text("plain words".to_string())
        );
    }

    #[test]
    fn empty_prefix_never_matches() {
        assert_eq!(
            UserContent::from_marked("/tmp/cat.png", ""),
            UserContent::Text("/tmp/cat.png".to_string())
        );
    }

    #[test]
    fn transcript_classifies_entries() {
        let json = format!(
            r#"{{"history": [["hi", "hello"], ["{DEFAULT_IMAGE_PREFIX}/a.gif", null], [{{"file": "/b.txt"}}, "ok"], [null, "unprompted"]], "system_prompt": "Be kind."}}"#
        );
        let t = Transcript::from_json_str(&json).expect("parse");
        assert_eq!(t.system_prompt.as_deref(), Some("Be kind."));
        let turns = t.turns(DEFAULT_IMAGE_PREFIX);
        assert_eq!(turns[0], Turn::exchange("hi", "hello"));
        assert_eq!(turns[1], Turn::pending(UserContent::Image(PathBuf::from("/a.gif"))));
        assert_eq!(
            turns[2],
            Turn::new(Some(UserContent::File(PathBuf::from("/b.txt"))), Some("ok".to_string()))
        );
        assert_eq!(turns[3], Turn::new(None, Some("unprompted".to_string())));
    }

    #[test]
    fn bare_history_array_loads_without_system_prompt() {
        let t = Transcript::from_json_str(r#"[["hi", "hello"], ["again", null]]"#).expect("parse");
        assert!(t.system_prompt.is_none());
        assert_eq!(
            t.turns(DEFAULT_IMAGE_PREFIX),
            vec![
                Turn::exchange("hi", "hello"),
                Turn::pending(UserContent::Text("again".to_string())),
            ]
        );
    }

    #[test]
    fn malformed_transcript_is_rejected() {
        assert!(Transcript::from_json_str(r#"[["only one side"]]"#).is_err());
        assert!(Transcript::from_json_str(r#""not a transcript""#).is_err());
    }

    #[test]
    fn transcript_without_history_is_empty() {
        let t = Transcript::from_json_str("{}").expect("parse");
        assert!(t.turns(DEFAULT_IMAGE_PREFIX).is_empty());
        assert!(t.system_prompt.is_none());
    }
}
