use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};

use docchat::chat::download::{extract_fenced_file, last_reply, write_download};
use docchat::chat::{ChatHistoryFormatter, FsAttachmentReader, Transcript, UserContent};
use docchat::config::{init_default_config, LoadedConfig};
use docchat::docx::doc2json::{default_json_output_for, extract_docx_json};
use docchat::progress::ConsoleLog;

#[derive(Parser, Debug)]
#[command(name = "docchat")]
#[command(about = "DOCX to filtered JSON, and chat transcripts to LLM request bodies", long_about = None)]
struct Args {
    /// Generate default config + doc2json rules files, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/rules files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/rules files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .docx to convert
    #[arg(value_name = "DOCX")]
    input: Option<PathBuf>,

    /// Output JSON (default: <input_stem>.json next to the input)
    #[arg(short, long, value_name = "JSON")]
    output: Option<PathBuf>,

    /// doc2json rules TOML (default: [doc2json] rules from config, else built-in)
    #[arg(long, value_name = "TOML")]
    rules: Option<PathBuf>,

    /// Config file path (default: search for docchat.toml upwards, or DOCCHAT_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chat transcript JSON: {"history": [[user, assistant], ...], "system_prompt": "..."}
    /// or a bare [[user, assistant], ...] array
    #[arg(long, value_name = "JSON")]
    history: Option<PathBuf>,

    /// System prompt (overrides transcript and config)
    #[arg(long)]
    system_prompt: Option<String>,

    /// Pending user message appended after the transcript
    #[arg(long)]
    message: Option<String>,

    /// Text file attached to the pending message (repeatable)
    #[arg(long, value_name = "PATH")]
    attach: Vec<PathBuf>,

    /// Image attached to the pending message (repeatable)
    #[arg(long, value_name = "PATH")]
    attach_image: Vec<PathBuf>,

    /// Provider: openai, bedrock or local
    #[arg(long)]
    provider: Option<String>,

    /// Model name for the request body
    #[arg(long)]
    model: Option<String>,

    /// Write the provider request body here (default: stdout)
    #[arg(long, value_name = "JSON")]
    request_out: Option<PathBuf>,

    /// Save the fenced file of the transcript's last reply into DIR, then exit
    #[arg(long, value_name = "DIR")]
    extract_download: Option<PathBuf>,

    /// No progress output on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log = ConsoleLog::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        log.info(format!("wrote config: {}", cfg_path.display()));
        return Ok(());
    }

    let workdir = args
        .input
        .as_deref()
        .or(args.history.as_deref())
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let cfg = LoadedConfig::discover(args.config.as_deref(), &workdir).context("load config")?;
    if let Some(p) = cfg.path.as_ref() {
        log.info(format!("config: {}", p.display()));
    }

    if let Some(history) = args.history.as_ref() {
        let transcript = Transcript::from_path(history)?;
        let turns = transcript.turns(cfg.image_prefix());

        if let Some(dir) = args.extract_download.as_ref() {
            let reply = last_reply(&turns).context("transcript has no final assistant reply")?;
            let file = extract_fenced_file(reply)
                .context("last reply has no fenced file content")?;
            let path = write_download(dir, &file)?;
            log.info(format!("saved {}", path.display()));
            return Ok(());
        }

        return build_request(&args, &cfg, &transcript, &log);
    }

    if args.message.is_some() || !args.attach.is_empty() || !args.attach_image.is_empty() {
        log.warn("--message/--attach/--attach-image need --history; ignored");
    }

    let input = match args.input.clone() {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  docchat <input.docx> [-o out.json]\n  docchat --history chat.json [--message TEXT] [--attach FILE] [--provider openai|bedrock|local]\n"
            );
            return Ok(());
        }
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_json_output_for(&input));
    let rules = cfg.doc2json_rules(args.rules.as_deref())?;
    extract_docx_json(&input, &output, &rules, &log)
}

fn build_request(
    args: &Args,
    cfg: &LoadedConfig,
    transcript: &Transcript,
    log: &ConsoleLog,
) -> anyhow::Result<()> {
    let turns = transcript.turns(cfg.image_prefix());
    let provider = cfg.provider(args.provider.as_deref())?;
    let adapter = provider.adapter();

    let system_prompt = args
        .system_prompt
        .clone()
        .or_else(|| transcript.system_prompt.clone())
        .or_else(|| cfg.config.chat.system_prompt.clone())
        .unwrap_or_default();

    let mut pending: Vec<UserContent> = Vec::new();
    if let Some(m) = args.message.as_ref() {
        pending.push(UserContent::Text(m.clone()));
    }
    pending.extend(args.attach.iter().cloned().map(UserContent::File));
    pending.extend(args.attach_image.iter().cloned().map(UserContent::Image));

    let formatter = ChatHistoryFormatter::new(adapter.content_mode(), FsAttachmentReader);
    let messages = formatter
        .format(&system_prompt, &turns, &pending)
        .context("format chat history")?;
    log.info(format!("{} messages for {}", messages.len(), adapter.name()));

    let params = cfg.request_params(args.model.clone());
    let body = adapter
        .request_body(&messages, &params)
        .with_context(|| format!("build {} request body", adapter.name()))?;
    let text = serde_json::to_string_pretty(&body).context("serialize request body")?;

    match args.request_out.as_ref() {
        Some(p) => {
            std::fs::write(p, text.as_bytes())
                .with_context(|| format!("write request body: {}", p.display()))?;
            log.info(format!("wrote {} request: {}", adapter.name(), p.display()));
        }
        None => println!("{text}"),
    }
    Ok(())
}
