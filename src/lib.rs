//! # edgequake-pdfchat
//!
//! Chat with a PDF. Text is extracted locally with pdfium; every question is
//! answered by a hosted language model that receives the *entire* document
//! text together with an instruction to answer only from it.
//!
//! ## Flow
//!
//! ```text
//! select_file(pdf)
//!  ├─ clear document + conversation, set `is_processing_pdf`
//!  ├─ extract text (page order, blank line after each page) + page count
//!  └─ Document ready  ─or─  pdf_error
//!
//! send_message(prompt, image?)
//!  ├─ append user message, set `is_model_loading`
//!  ├─ one request: grounding instruction + delimited document + prompt (+ image)
//!  └─ append model reply  ─or─  model_error + "Sorry, I encountered an error: …"
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfchat::{ChatConfig, ChatSession, LlmModelClient, PdfiumExtractor, SelectedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY; fails here if it is missing.
//!     let config = ChatConfig::default();
//!     let client = LlmModelClient::from_config(&config)?;
//!     let session = ChatSession::new(PdfiumExtractor::new(), client);
//!
//!     session.select_file(SelectedFile::from_path("invoice.pdf")).await?;
//!     let reply = session.send_message("What is the total?", None).await?;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchat` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod stream;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ChatConfig, ChatConfigBuilder};
pub use error::{ExtractionError, QueryError, Rejected, SessionError, StartupError};
pub use pipeline::encode::AttachmentError;
pub use pipeline::extract::{DocumentExtractor, PdfiumExtractor};
pub use pipeline::llm::{ContentPart, LlmModelClient, ModelClient, QueryRequest};
pub use session::{
    ChatSession, DocumentPhase, PendingExtraction, PendingQuery, QueryPhase, SessionState,
};
pub use stream::{busy_changes, BusyStatus};
pub use types::{
    Document, DocumentSummary, ExtractedText, FileSource, ImageAttachment, Message, Role,
    SelectedFile, Transcript,
};
