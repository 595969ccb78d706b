use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::chat::history::DEFAULT_IMAGE_PREFIX;
use crate::chat::provider::{ProviderKind, RequestParams};
use crate::docx::filter::{Doc2JsonRules, DEFAULT_DOC2JSON_RULES_TOML};

pub const CONFIG_FILENAME: &str = "docchat.toml";
pub const CONFIG_ENV: &str = "DOCCHAT_CONFIG";
pub const RULES_FILENAME: &str = "doc2json-rules.toml";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub doc2json: Doc2JsonSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ChatSection {
    /// "openai", "bedrock" or "local".
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub seed: Option<i64>,
    /// Marker that flags image references in string histories.
    #[serde(default)]
    pub image_prefix: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Doc2JsonSection {
    /// Rules TOML; relative paths resolve against the config file's directory.
    #[serde(default)]
    pub rules: Option<PathBuf>,
}

/// Config plus the path it came from (`None` when running on defaults).
#[derive(Clone, Debug, Default)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub config: AppConfig,
}

impl LoadedConfig {
    /// Lookup: explicit path, `$DOCCHAT_CONFIG`, then `docchat.toml` upwards from the cwd, the
    /// work dir and the executable's dir. Nothing found means defaults.
    pub fn discover(explicit: Option<&Path>, workdir: &Path) -> anyhow::Result<Self> {
        let candidate = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(workdir, CONFIG_FILENAME));
        match candidate {
            Some(p) if p.exists() => Ok(Self {
                config: load_config(&p)?,
                path: Some(p),
            }),
            Some(p) if explicit.is_some() => {
                Err(anyhow::anyhow!("config not found: {}", p.display()))
            }
            _ => Ok(Self::default()),
        }
    }

    fn config_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn provider(&self, cli: Option<&str>) -> anyhow::Result<ProviderKind> {
        let name = cli
            .or(self.config.chat.provider.as_deref())
            .unwrap_or("openai");
        Ok(ProviderKind::parse(name)?)
    }

    pub fn image_prefix(&self) -> &str {
        self.config
            .chat
            .image_prefix
            .as_deref()
            .unwrap_or(DEFAULT_IMAGE_PREFIX)
    }

    pub fn request_params(&self, model: Option<String>) -> RequestParams {
        let chat = &self.config.chat;
        RequestParams {
            model: model
                .or_else(|| chat.model.clone())
                .unwrap_or_else(|| "gpt-4-turbo-preview".to_string()),
            temperature: chat.temperature,
            max_tokens: chat.max_tokens,
            seed: chat.seed,
        }
    }

    /// Rules from the CLI path, else the config's `[doc2json] rules`, else built-in defaults.
    pub fn doc2json_rules(&self, cli: Option<&Path>) -> anyhow::Result<Doc2JsonRules> {
        let path = match (cli, self.config.doc2json.rules.as_ref()) {
            (Some(p), _) => p.to_path_buf(),
            (None, Some(p)) if p.is_relative() => self.config_dir().join(p),
            (None, Some(p)) => p.clone(),
            (None, None) => return Ok(Doc2JsonRules::default()),
        };
        Doc2JsonRules::from_toml_path(&path)
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("config: {}", path.display()))
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(text).context("parse config toml")?;
    if let Some(p) = cfg.chat.provider.as_deref() {
        ProviderKind::parse(p)?;
    }
    Ok(cfg)
}

const DEFAULT_CONFIG_TOML: &str = r#"[chat]
# openai | bedrock | local
provider = "openai"
model = "gpt-4-turbo-preview"
system_prompt = "You are a helpful AI."
temperature = 1.0
max_tokens = 800
# seed = 42
# image_prefix = "🖼️🆙 "

[doc2json]
rules = "doc2json-rules.toml"
"#;

/// Writes `docchat.toml` and `doc2json-rules.toml` into `dir`; existing files are kept unless
/// `force` is set.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;

    let rules_path = dir.join(RULES_FILENAME);
    if !rules_path.exists() || force {
        std::fs::write(&rules_path, DEFAULT_DOC2JSON_RULES_TOML)
            .with_context(|| format!("write doc2json rules: {}", rules_path.display()))?;
    }

    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}
