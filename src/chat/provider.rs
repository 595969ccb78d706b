//! Provider adapters: turn the abstract message list into a request body.
//!
//! - `openai`: OpenAI-compatible chat completions, multimodal (`image_url` parts).
//! - `local`: a local OpenAI-compatible inference server that only takes string content.
//! - `bedrock`: Anthropic messages body for Bedrock `InvokeModel`; system prompts move to the
//!   top-level `system` field and images travel as base64 sources.

use serde::{Deserialize, Serialize};

use crate::chat::format::ContentMode;
use crate::chat::message::{ContentPart, Message, MessageContent, Role};
use crate::error::{Error, Result};

pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
pub const DEFAULT_MAX_TOKENS: u32 = 800;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Bedrock,
    Local,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "oai" => Ok(Self::OpenAi),
            "bedrock" => Ok(Self::Bedrock),
            "local" => Ok(Self::Local),
            other => Err(Error::Config(format!(
                "unknown provider: {other} (expected openai, bedrock or local)"
            ))),
        }
    }

    pub fn adapter(self) -> Box<dyn ProviderAdapter> {
        match self {
            ProviderKind::OpenAi => Box::new(OpenAiAdapter),
            ProviderKind::Bedrock => Box::new(BedrockAdapter),
            ProviderKind::Local => Box::new(LocalServerAdapter),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestParams {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub seed: Option<i64>,
}

pub trait ProviderAdapter {
    fn name(&self) -> &'static str;

    fn content_mode(&self) -> ContentMode;

    fn request_body(
        &self,
        messages: &[Message],
        params: &RequestParams,
    ) -> Result<serde_json::Value>;
}

// ── OpenAI-compatible ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: OpenAiContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OpenAiContent<'a> {
    Text(&'a str),
    Owned(String),
    Parts(Vec<OpenAiPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

fn openai_body(
    messages: &[Message],
    params: &RequestParams,
    text_only: bool,
) -> Result<serde_json::Value> {
    let mut out = Vec::with_capacity(messages.len());
    for m in messages {
        let content = match &m.content {
            MessageContent::Text(t) => OpenAiContent::Text(t),
            MessageContent::Parts(parts) if text_only => OpenAiContent::Owned(flatten_text(parts)?),
            MessageContent::Parts(parts) => OpenAiContent::Parts(
                parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => OpenAiPart::Text { text },
                        ContentPart::Image { .. } => OpenAiPart::ImageUrl {
                            image_url: ImageUrl {
                                url: p.data_url().unwrap_or_default(),
                            },
                        },
                    })
                    .collect(),
            ),
        };
        out.push(OpenAiMessage {
            role: m.role.as_str(),
            content,
        });
    }
    let body = OpenAiRequest {
        model: &params.model,
        messages: out,
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        seed: params.seed,
    };
    Ok(serde_json::to_value(body)?)
}

fn flatten_text(parts: &[ContentPart]) -> Result<String> {
    let mut out = String::new();
    for p in parts {
        match p {
            ContentPart::Text { text } => out.push_str(text),
            ContentPart::Image { format, .. } => {
                return Err(Error::ImageNotSupported {
                    path: format!("<inline {} image>", format.subtype()).into(),
                })
            }
        }
    }
    Ok(out)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OpenAiAdapter;

impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn content_mode(&self) -> ContentMode {
        ContentMode::Parts
    }

    fn request_body(
        &self,
        messages: &[Message],
        params: &RequestParams,
    ) -> Result<serde_json::Value> {
        openai_body(messages, params, false)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LocalServerAdapter;

impl ProviderAdapter for LocalServerAdapter {
    fn name(&self) -> &'static str {
        "local"
    }

    fn content_mode(&self) -> ContentMode {
        ContentMode::TextOnly
    }

    fn request_body(
        &self,
        messages: &[Message],
        params: &RequestParams,
    ) -> Result<serde_json::Value> {
        openai_body(messages, params, true)
    }
}

// ── Bedrock (Anthropic messages) ─────────────────────────────────────────────

#[derive(Serialize)]
struct BedrockRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<BedrockMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct BedrockMessage<'a> {
    role: &'static str,
    content: Vec<BedrockBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BedrockBlock<'a> {
    Text { text: &'a str },
    Image { source: BedrockImageSource<'a> },
}

#[derive(Serialize)]
struct BedrockImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: &'a str,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BedrockAdapter;

impl ProviderAdapter for BedrockAdapter {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    fn content_mode(&self) -> ContentMode {
        ContentMode::Parts
    }

    fn request_body(
        &self,
        messages: &[Message],
        params: &RequestParams,
    ) -> Result<serde_json::Value> {
        let mut system: Vec<&str> = Vec::new();
        let mut out = Vec::with_capacity(messages.len());
        for m in messages {
            if m.role == Role::System {
                if let MessageContent::Text(t) = &m.content {
                    system.push(t);
                }
                continue;
            }
            let content = match &m.content {
                MessageContent::Text(t) => vec![BedrockBlock::Text { text: t }],
                MessageContent::Parts(parts) => parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => BedrockBlock::Text { text },
                        ContentPart::Image { format, data } => BedrockBlock::Image {
                            source: BedrockImageSource {
                                kind: "base64",
                                media_type: format.media_type(),
                                data,
                            },
                        },
                    })
                    .collect(),
            };
            out.push(BedrockMessage {
                role: m.role.as_str(),
                content,
            });
        }
        let body = BedrockRequest {
            anthropic_version: BEDROCK_ANTHROPIC_VERSION,
            max_tokens: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: out,
            temperature: params.temperature,
        };
        Ok(serde_json::to_value(body)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::chat::message::ImageFormat;

    fn sample() -> Vec<Message> {
        vec![
            Message::text(Role::System, "You are terse."),
            Message {
                role: Role::User,
                content: MessageContent::Parts(vec![
                    ContentPart::text("what is this?"),
                    ContentPart::Image {
                        format: ImageFormat::Png,
                        data: "iVBORw0KGgo=".to_string(),
                    },
                ]),
            },
            Message::text(Role::Assistant, "A pixel."),
        ]
    }

    fn params() -> RequestParams {
        RequestParams {
            model: "gpt-4-turbo-preview".to_string(),
            temperature: Some(0.5),
            max_tokens: Some(256),
            seed: None,
        }
    }

    #[test]
    fn openai_body_uses_image_url_parts() {
        let body = OpenAiAdapter.request_body(&sample(), &params()).expect("body");
        assert_eq!(
            body,
            json!({
                "model": "gpt-4-turbo-preview",
                "messages": [
                    {"role": "system", "content": "You are terse."},
                    {"role": "user", "content": [
                        {"type": "text", "text": "what is this?"},
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,iVBORw0KGgo="}}
                    ]},
                    {"role": "assistant", "content": "A pixel."}
                ],
                "temperature": 0.5,
                "max_tokens": 256
            })
        );
    }

    #[test]
    fn bedrock_body_lifts_system_and_uses_base64_sources() {
        let body = BedrockAdapter.request_body(&sample(), &params()).expect("body");
        assert_eq!(
            body,
            json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": 256,
                "system": "You are terse.",
                "messages": [
                    {"role": "user", "content": [
                        {"type": "text", "text": "what is this?"},
                        {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "iVBORw0KGgo="}}
                    ]},
                    {"role": "assistant", "content": [{"type": "text", "text": "A pixel."}]}
                ],
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn bedrock_defaults_max_tokens_and_omits_empty_system() {
        let msgs = vec![Message::text(Role::User, "hi")];
        let body = BedrockAdapter
            .request_body(&msgs, &RequestParams::default())
            .expect("body");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!(body.get("system").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn local_server_flattens_text_parts_and_rejects_images() {
        let msgs = vec![Message {
            role: Role::User,
            content: MessageContent::Parts(vec![ContentPart::text("a"), ContentPart::text("b")]),
        }];
        let body = LocalServerAdapter
            .request_body(&msgs, &RequestParams { seed: Some(7), ..params() })
            .expect("body");
        assert_eq!(body["messages"][0]["content"], "ab");
        assert_eq!(body["seed"], 7);

        let err = LocalServerAdapter
            .request_body(&sample(), &params())
            .expect_err("image");
        assert!(matches!(err, Error::ImageNotSupported { .. }));
    }

    #[test]
    fn parses_provider_names() {
        assert_eq!(ProviderKind::parse(" OpenAI ").expect("openai"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::parse("local").expect("local").adapter().name(), "local");
        assert_eq!(
            ProviderKind::Bedrock.adapter().content_mode(),
            ContentMode::Parts
        );
        assert!(matches!(ProviderKind::parse("gemini"), Err(Error::Config(_))));
    }
}
