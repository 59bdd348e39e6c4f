//! CLI binary for edgequake-pdfchat.
//!
//! A terminal front end over [`ChatSession`]: it reads state, renders it, and
//! forwards user intents to the two session entry points.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfchat::{
    busy_changes, BusyStatus, ChatConfig, ChatSession, DocumentPhase, ImageAttachment,
    LlmModelClient, Message, PdfiumExtractor, Rejected, Role, SelectedFile, SessionError,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

type Session = ChatSession<PdfiumExtractor, LlmModelClient>;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const HELP: &str = r#"COMMANDS:
  /open <file.pdf>        Load a PDF (clears the conversation)
  /attach <image|data:…>  Attach an image to the next question
  /detach                 Drop the staged image
  /status                 Show document and session state
  /history                Print the conversation
  /export <file.json>     Write the transcript as JSON
  /help                   Show this help
  /quit                   Exit

Anything else is sent as a question about the loaded document."#;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive chat about a PDF
  pdfchat report.pdf

  # One-shot question, with an image attached
  pdfchat invoice.pdf --ask "What is the total?" --image receipt.png

  # Another provider
  pdfchat --provider openai --model gpt-4.1-mini paper.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_PROVIDER      Override provider (gemini, openai, anthropic, mistral, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
"#;

/// Ask questions about a PDF; answers come only from the document.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchat",
    version,
    about = "Chat with a PDF using a hosted LLM grounded in the document text",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF to load at startup.
    file: Option<PathBuf>,

    /// LLM provider: gemini, openai, anthropic, mistral, ollama.
    #[arg(long, env = "EDGEQUAKE_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = "gemini-2.5-flash")]
    model: String,

    /// Sampling temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "PDFCHAT_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max reply tokens. Provider default when unset.
    #[arg(long, env = "PDFCHAT_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Text file replacing the built-in grounding instruction.
    #[arg(long, env = "PDFCHAT_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFCHAT_PASSWORD")]
    password: Option<String>,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Ask this question and exit instead of starting the REPL. Repeatable.
    #[arg(long)]
    ask: Vec<String>,

    /// Image attached to the first --ask question.
    #[arg(long, requires = "ask")]
    image: Option<PathBuf>,

    /// Write the transcript as JSON to this file on exit.
    #[arg(long, env = "PDFCHAT_EXPORT")]
    export: Option<PathBuf>,

    /// Disable the busy spinner.
    #[arg(long, env = "PDFCHAT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCHAT_VERBOSE")]
    verbose: bool,

    /// Suppress everything except answers and errors.
    #[arg(short, long, env = "PDFCHAT_QUIET")]
    quiet: bool,
}

/// One line of REPL input.
#[derive(Debug, PartialEq)]
enum Command {
    Open(PathBuf),
    Attach(String),
    Detach,
    Status,
    History,
    Export(PathBuf),
    Help,
    Quit,
    Ask(String),
    Empty,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    if !line.starts_with('/') {
        return Ok(Command::Ask(line.to_string()));
    }

    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };
    let need_arg = |usage: &str| -> Result<&str, String> {
        if arg.is_empty() {
            Err(format!("usage: {usage}"))
        } else {
            Ok(arg)
        }
    };

    match cmd {
        "/open" => Ok(Command::Open(PathBuf::from(need_arg("/open <file.pdf>")?))),
        "/attach" => Ok(Command::Attach(need_arg("/attach <image>")?.to_string())),
        "/detach" => Ok(Command::Detach),
        "/status" => Ok(Command::Status),
        "/history" => Ok(Command::History),
        "/export" => Ok(Command::Export(PathBuf::from(need_arg("/export <file.json>")?))),
        "/help" | "/?" => Ok(Command::Help),
        "/quit" | "/exit" | "/q" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}' (try /help)")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Startup: a missing credential ends the process here ─────────────
    let config = build_config(&cli).await?;
    let client = LlmModelClient::from_config(&config).context("Cannot start pdfchat")?;

    let mut extractor = PdfiumExtractor::new().with_password(config.password.clone());
    if let Some(ref lib) = cli.pdfium_lib {
        extractor = extractor.with_library_path(lib);
    }

    let session: Arc<Session> = Arc::new(ChatSession::new(extractor, client));

    let busy = BusyIndicator::default();
    if !cli.quiet && !cli.no_progress {
        tokio::spawn(render_busy(Arc::clone(&session), busy.clone()));
    }

    if let Some(ref path) = cli.file {
        open_pdf(&session, &busy, path, cli.quiet).await;
    }

    // ── One-shot mode ────────────────────────────────────────────────────
    if !cli.ask.is_empty() {
        let mut image = match cli.image {
            Some(ref path) => Some(
                ImageAttachment::from_path(path)
                    .await
                    .with_context(|| format!("Failed to attach {}", path.display()))?,
            ),
            None => None,
        };
        let mut failed = false;
        for question in &cli.ask {
            failed |= !ask(&session, &busy, question, image.take()).await;
        }
        export_if_requested(&session, cli.export.as_deref()).await?;
        if failed {
            anyhow::bail!("one or more questions could not be answered");
        }
        return Ok(());
    }

    // ── REPL ─────────────────────────────────────────────────────────────
    if !cli.quiet {
        eprintln!(
            "{} {} {}",
            cyan("◆"),
            bold("pdfchat"),
            dim(&format!("{} · {} · /help for commands", config.provider_name, config.model))
        );
    }

    let mut staged: Option<ImageAttachment> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt_marker(staged.is_some());
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(c) => c,
            Err(msg) => {
                eprintln!("{}", red(&msg));
                continue;
            }
        };

        match command {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => eprintln!("{HELP}"),
            Command::Open(path) => open_pdf(&session, &busy, &path, cli.quiet).await,
            Command::Attach(source) => match load_attachment(&source).await {
                Ok(att) => {
                    eprintln!(
                        "{} attached {} ({})",
                        green("✓"),
                        att.mime_type,
                        human_bytes(att.decoded_len())
                    );
                    staged = Some(att);
                }
                Err(e) => eprintln!("{} {e:#}", red("✗")),
            },
            Command::Detach => {
                if staged.take().is_some() {
                    eprintln!("{}", dim("image dropped"));
                }
            }
            Command::Status => print_status(&session, staged.as_ref()),
            Command::History => print_history(&session.snapshot().messages),
            Command::Export(path) => match write_transcript(&session, &path).await {
                Ok(()) => eprintln!("{} wrote {}", green("✓"), path.display()),
                Err(e) => eprintln!("{} {e:#}", red("✗")),
            },
            Command::Ask(question) => {
                // Keep the image staged if the question was refused outright.
                let image = staged.take();
                if !session.state().can_send() {
                    staged = image.clone();
                }
                ask(&session, &busy, &question, image).await;
            }
        }
    }

    export_if_requested(&session, cli.export.as_deref()).await
}

/// Map CLI args to `ChatConfig`.
async fn build_config(cli: &Cli) -> Result<ChatConfig> {
    let mut builder = ChatConfig::builder()
        .provider_name(&cli.provider)
        .model(&cli.model);

    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref path) = cli.instruction {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.grounding_instruction(text);
    }

    builder.build().context("Invalid configuration")
}

async fn open_pdf(session: &Session, busy: &BusyIndicator, path: &Path, quiet: bool) {
    let result = session.select_file(SelectedFile::from_path(path)).await;
    busy.clear();
    match result {
        Ok(doc) => {
            if !quiet {
                eprintln!(
                    "{} {}  {}",
                    green("✓"),
                    bold(&doc.filename),
                    dim(&format!(
                        "{} pages · {} chars",
                        doc.page_count,
                        doc.content.chars().count()
                    ))
                );
            }
        }
        Err(e) => eprintln!("{} {e}", red("✗")),
    }
}

/// Send one question and print the outcome. Returns `false` on any failure.
async fn ask(
    session: &Session,
    busy: &BusyIndicator,
    question: &str,
    image: Option<ImageAttachment>,
) -> bool {
    let result = session.send_message(question, image).await;
    busy.clear();
    match result {
        Ok(reply) => {
            println!("{}", reply.text);
            true
        }
        // The wrapped error is already in the history; show it the same way.
        Err(SessionError::Query(_)) => {
            if let Some(last) = session.snapshot().messages.last() {
                println!("{}", red(&last.text));
            }
            false
        }
        Err(SessionError::Rejected(Rejected::NoDocument)) => {
            eprintln!("{} load a PDF first: /open <file.pdf>", red("✗"));
            false
        }
        Err(SessionError::Rejected(Rejected::EmptyPrompt)) => false,
        Err(e) => {
            eprintln!("{} {e}", red("✗"));
            false
        }
    }
}

async fn load_attachment(source: &str) -> Result<ImageAttachment> {
    if source.starts_with("data:") {
        return ImageAttachment::from_data_uri(source).context("Invalid data URI");
    }
    ImageAttachment::from_path(source)
        .await
        .with_context(|| format!("Cannot attach '{source}'"))
}

async fn write_transcript(session: &Session, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&session.transcript())
        .context("Failed to serialise transcript")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn export_if_requested(session: &Session, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        write_transcript(session, path).await?;
    }
    Ok(())
}

/// The spinner slot, shared by the render task and the printing code.
///
/// The render task only creates a bar while the session is still busy, checked
/// under the lock, and output is printed after [`BusyIndicator::clear`]. A
/// settled entry point has already published the idle state, so no frame can
/// land after its output.
#[derive(Clone, Default)]
struct BusyIndicator {
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl BusyIndicator {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Match the bar to the session's current busy flags.
    fn sync(&self, session: &Session) {
        let mut slot = self.slot();
        if let Some(b) = slot.take() {
            b.finish_and_clear();
        }
        let status = BusyStatus::of(&session.state());
        if !status.is_idle() {
            *slot = Some(spinner(busy_message(status)));
        }
    }

    fn clear(&self) {
        if let Some(b) = self.slot().take() {
            b.finish_and_clear();
        }
    }
}

/// Show a spinner while either busy flag is set.
async fn render_busy(session: Arc<Session>, busy: BusyIndicator) {
    let changes = busy_changes(session.updates());
    futures::pin_mut!(changes);

    while changes.next().await.is_some() {
        busy.sync(&session);
    }
}

fn busy_message(status: BusyStatus) -> &'static str {
    if status.processing_pdf {
        "Reading PDF…"
    } else {
        "Thinking…"
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn prompt_marker(image_staged: bool) {
    let marker = if image_staged { "📎 › " } else { "› " };
    eprint!("{}", cyan(marker));
    io::stderr().flush().ok();
}

fn print_status(session: &Session, staged: Option<&ImageAttachment>) {
    let state = session.snapshot();
    match state.document_phase() {
        DocumentPhase::Ready => {
            if let Some(ref doc) = state.document {
                println!("Document:  {} ({} pages)", doc.filename, doc.page_count);
            }
        }
        DocumentPhase::Processing => println!("Document:  processing…"),
        DocumentPhase::Failed => {
            if let Some(ref e) = state.pdf_error {
                println!("Document:  {}", red(&e.to_string()));
            }
        }
        DocumentPhase::NoDocument => println!("Document:  none (use /open)"),
    }
    println!("Messages:  {}", state.messages.len());
    if let Some(ref e) = state.model_error {
        println!("Last error: {}", red(&e.to_string()));
    }
    if let Some(att) = staged {
        println!("Attached:  {} ({})", att.mime_type, human_bytes(att.decoded_len()));
    }
}

fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("{}", dim("(no messages)"));
        return;
    }
    for m in messages {
        let who = match m.role {
            Role::User => cyan("you"),
            Role::Model => green("model"),
        };
        println!("{who} › {}", m.text);
        if let Some(ref img) = m.image {
            let label = format!("[image: {}, {}]", img.mime_type, human_bytes(img.decoded_len()));
            println!("      {}", dim(&label));
        }
    }
}

fn human_bytes(n: usize) -> String {
    if n < 1024 {
        format!("{n} B")
    } else if n < 1024 * 1024 {
        format!("{:.1} KB", n as f64 / 1024.0)
    } else {
        format!("{:.1} MB", n as f64 / (1024.0 * 1024.0))
    }
}
