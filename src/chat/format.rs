use std::path::Path;

use crate::chat::attachment::{file_block, image_part, AttachmentReader};
use crate::chat::history::{Turn, UserContent};
use crate::chat::message::{ContentPart, Message, MessageContent, Role};
use crate::error::{Error, Result};

/// How user content is accumulated for the target provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentMode {
    /// Typed part lists (text + images).
    Parts,
    /// One concatenated string; image references are rejected.
    TextOnly,
}

/// Pending user content waiting for the next assistant reply (or the end of the transcript).
struct UserBuffer {
    mode: ContentMode,
    parts: Vec<ContentPart>,
    text: String,
    pushes: usize,
}

impl UserBuffer {
    fn new(mode: ContentMode) -> Self {
        Self {
            mode,
            parts: Vec::new(),
            text: String::new(),
            pushes: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.pushes == 0
    }

    fn push_text(&mut self, text: &str) {
        match self.mode {
            ContentMode::Parts => self.parts.push(ContentPart::text(text)),
            ContentMode::TextOnly => self.text.push_str(text),
        }
        self.pushes += 1;
    }

    fn push_image(&mut self, part: ContentPart) {
        self.parts.push(part);
        self.pushes += 1;
    }

    fn take(&mut self) -> Option<Message> {
        if self.is_empty() {
            return None;
        }
        self.pushes = 0;
        let content = match self.mode {
            ContentMode::Parts => MessageContent::Parts(std::mem::take(&mut self.parts)),
            ContentMode::TextOnly => MessageContent::Text(std::mem::take(&mut self.text)),
        };
        Some(Message {
            role: Role::User,
            content,
        })
    }
}

/// Flattens a chat transcript into the role-tagged message list of a completion request.
pub struct ChatHistoryFormatter<R> {
    mode: ContentMode,
    reader: R,
}

impl<R: AttachmentReader> ChatHistoryFormatter<R> {
    pub fn new(mode: ContentMode, reader: R) -> Self {
        Self { mode, reader }
    }

    pub fn mode(&self) -> ContentMode {
        self.mode
    }

    /// Consecutive user content merges into one user message; each assistant reply flushes the
    /// pending user message right before it. `pending` is the not-yet-sent input (text and any
    /// number of attachments); empty text items are skipped.
    pub fn format(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        pending: &[UserContent],
    ) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(Message::text(Role::System, system_prompt));
        }

        let mut buffer = UserBuffer::new(self.mode);
        for turn in turns {
            if let Some(user) = &turn.user {
                self.append(&mut buffer, user)?;
            }
            if let Some(reply) = &turn.assistant {
                messages.extend(buffer.take());
                messages.push(Message::text(Role::Assistant, reply.as_str()));
            }
        }

        for item in pending.iter().filter(|c| !c.is_empty_text()) {
            self.append(&mut buffer, item)?;
        }
        messages.extend(buffer.take());
        Ok(messages)
    }

    fn append(&self, buffer: &mut UserBuffer, content: &UserContent) -> Result<()> {
        match content {
            UserContent::Text(text) => buffer.push_text(text),
            UserContent::Image(path) => {
                self.ensure_images_allowed(path)?;
                buffer.push_image(image_part(&self.reader, path)?);
            }
            UserContent::File(path) => buffer.push_text(&file_block(&self.reader, path)?),
        }
        Ok(())
    }

    fn ensure_images_allowed(&self, path: &Path) -> Result<()> {
        match self.mode {
            ContentMode::Parts => Ok(()),
            ContentMode::TextOnly => Err(Error::ImageNotSupported {
                path: path.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::chat::attachment::testing::MemoryReader;
    use crate::chat::message::ImageFormat;

    fn text(s: &str) -> UserContent {
        UserContent::Text(s.to_string())
    }

    #[test]
    fn text_only_pending_message_merges_with_open_turn() {
        let f = ChatHistoryFormatter::new(ContentMode::TextOnly, MemoryReader::default());
        let turns = vec![
            Turn::exchange("Hello", "Hi there"),
            Turn::pending(text("2+2?")),
        ];
        let got = f.format("You are terse.", &turns, &[text("=")]).expect("format");
        assert_eq!(
            got,
            vec![
                Message::text(Role::System, "You are terse."),
                Message::text(Role::User, "Hello"),
                Message::text(Role::Assistant, "Hi there"),
                Message::text(Role::User, "2+2?="),
            ]
        );
    }

    #[test]
    fn parts_mode_keeps_separate_parts_in_one_message() {
        let f = ChatHistoryFormatter::new(ContentMode::Parts, MemoryReader::default());
        let turns = vec![Turn::pending(text("2+2?"))];
        let got = f.format("", &turns, &[text("=")]).expect("format");
        assert_eq!(
            got,
            vec![Message {
                role: Role::User,
                content: MessageContent::Parts(vec![ContentPart::text("2+2?"), ContentPart::text("=")]),
            }]
        );
    }

    #[test]
    fn attachments_merge_into_the_user_turn_before_the_reply() {
        let reader = MemoryReader::default()
            .with("/img/shot.png", b"\x89PNG\r\n\x1a\n")
            .with("/src/main.rs", b"fn main() {}");
        let f = ChatHistoryFormatter::new(ContentMode::Parts, reader);
        let turns = vec![
            Turn::pending(UserContent::Image(PathBuf::from("/img/shot.png"))),
            Turn::pending(UserContent::File(PathBuf::from("/src/main.rs"))),
            Turn::new(Some(text("what is this?")), Some("A screenshot and code.".to_string())),
        ];
        let got = f.format("", &turns, &[]).expect("format");
        assert_eq!(got.len(), 2);
        let MessageContent::Parts(parts) = &got[0].content else {
            panic!("expected parts");
        };
        assert_eq!(got[0].role, Role::User);
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[0], ContentPart::Image { format: ImageFormat::Png, .. }));
        assert_eq!(parts[1], ContentPart::text("```main.rs\nfn main() {}\n```"));
        assert_eq!(parts[2], ContentPart::text("what is this?"));
        assert_eq!(got[1], Message::text(Role::Assistant, "A screenshot and code."));
    }

    #[test]
    fn pending_input_supports_several_attachments() {
        let reader = MemoryReader::default()
            .with("/a.txt", b"A")
            .with("/b.txt", b"B");
        let f = ChatHistoryFormatter::new(ContentMode::TextOnly, reader);
        let pending = vec![
            text("compare:"),
            UserContent::File(PathBuf::from("/a.txt")),
            UserContent::File(PathBuf::from("/b.txt")),
        ];
        let got = f.format("", &[], &pending).expect("format");
        assert_eq!(
            got,
            vec![Message::text(Role::User, "compare:```a.txt\nA\n``````b.txt\nB\n```")]
        );
    }

    #[test]
    fn assistant_without_user_emits_no_empty_user_message() {
        let f = ChatHistoryFormatter::new(ContentMode::TextOnly, MemoryReader::default());
        let turns = vec![Turn::new(None, Some("Welcome!".to_string()))];
        let got = f.format("", &turns, &[text("")]).expect("format");
        assert_eq!(got, vec![Message::text(Role::Assistant, "Welcome!")]);
    }

    #[test]
    fn text_only_mode_rejects_images() {
        let reader = MemoryReader::default().with("/x.png", b"\x89PNG");
        let f = ChatHistoryFormatter::new(ContentMode::TextOnly, reader);
        let err = f
            .format("", &[Turn::pending(UserContent::Image(PathBuf::from("/x.png")))], &[])
            .expect_err("images unsupported");
        assert!(matches!(err, Error::ImageNotSupported { .. }));
    }

    #[test]
    fn unreadable_attachment_aborts_formatting() {
        let f = ChatHistoryFormatter::new(ContentMode::Parts, MemoryReader::default());
        let err = f
            .format("sys", &[], &[UserContent::File(PathBuf::from("/missing.txt"))])
            .expect_err("unreadable");
        assert!(matches!(err, Error::AttachmentUnreadable { .. }));
    }

    #[test]
    fn unknown_image_aborts_formatting() {
        let reader = MemoryReader::default().with("/x.img", b"\x00\x01\x02\x03");
        let f = ChatHistoryFormatter::new(ContentMode::Parts, reader);
        let err = f
            .format("", &[Turn::pending(UserContent::Image(PathBuf::from("/x.img")))], &[])
            .expect_err("unknown");
        assert!(matches!(err, Error::UnknownImageFormat { .. }));
    }
}
