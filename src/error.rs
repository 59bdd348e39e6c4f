//! Error types for the edgequake-pdfchat library.
//!
//! Failures are split by channel, mirroring the two independent error slots
//! kept in [`crate::session::SessionState`]:
//!
//! * [`ExtractionError`] — the selected file could not be turned into a
//!   [`crate::types::Document`]. Stored in the `pdf_error` slot.
//!
//! * [`QueryError`] — the model call failed. Stored in the `model_error` slot
//!   *and* echoed into the chat history as a model-role message.
//!
//! * [`StartupError`] — the model client could not be constructed (missing
//!   credential, unknown provider). The only fatal condition in the crate.
//!
//! * [`Rejected`] — an entry point was called while its precondition did not
//!   hold (empty prompt, no document, operation already in flight). Nothing
//!   was mutated.
//!
//! [`SessionError`] unifies the above for callers of the async entry points.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while reading or parsing a selected PDF.
///
/// `Clone` so the session can keep a copy in its error slot while also
/// returning it to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The file could not be read from disk.
    #[error("Error reading the file '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    /// The bytes were read but do not start with the `%PDF` signature.
    #[error("'{name}' is not a PDF file (first bytes: {magic:?})")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF requires a password but none was configured.
    #[error("'{name}' is encrypted and requires a password")]
    PasswordRequired { name: String },

    /// A password was configured but the document rejected it.
    #[error("Wrong password for '{name}'")]
    WrongPassword { name: String },

    /// The text pass could not load or read the document.
    #[error("Failed to parse PDF '{name}': {detail}")]
    ParseFailed { name: String, detail: String },

    /// The page-count pass failed after text extraction succeeded.
    #[error("Failed to count pages of '{name}': {detail}")]
    PageCountFailed { name: String, detail: String },

    /// The document parsed but contains no pages.
    #[error("'{name}' contains no pages")]
    NoPages { name: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "PDF engine unavailable: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    EngineUnavailable(String),

    /// Unexpected internal error (e.g. the blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a single model query.
///
/// Local transport failures and errors reported by the remote service collapse
/// into [`QueryError::Api`]. The `Display` output keeps the `Error from API:`
/// prefix so the text placed in the chat history reads the same regardless of
/// which side failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The provider or the transport returned an error.
    #[error("Error from API: {message}")]
    Api { message: String },

    /// The failure carried no usable description.
    #[error("An unknown error occurred while contacting the API.")]
    Unknown,
}

impl QueryError {
    /// Build an [`QueryError::Api`], falling back to [`QueryError::Unknown`]
    /// when the provider gave an empty message.
    pub fn api(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            QueryError::Unknown
        } else {
            QueryError::Api { message }
        }
    }
}

/// Errors that prevent the model client from being constructed.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The provider's credential variable is unset or empty.
    #[error("{var} environment variable not set (required by provider '{provider}')")]
    MissingCredential { provider: String, var: String },

    /// The provider factory refused the provider/model pair.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// An entry point was called while its precondition did not hold.
///
/// No state was changed and no external call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("no document is loaded")]
    NoDocument,

    #[error("a model query is already in flight")]
    QueryInFlight,

    #[error("a document is already being processed")]
    ExtractionInFlight,
}

/// Everything the async session entry points can return as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] Rejected),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Query(#[from] QueryError),

    /// The reply arrived after a newer file selection and was dropped.
    #[error("reply discarded: the document changed while the query was in flight")]
    Superseded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_keeps_prefix() {
        let e = QueryError::api("quota exceeded");
        assert_eq!(e.to_string(), "Error from API: quota exceeded");
    }

    #[test]
    fn blank_api_message_is_unknown() {
        assert_eq!(QueryError::api("   "), QueryError::Unknown);
        assert_eq!(
            QueryError::Unknown.to_string(),
            "An unknown error occurred while contacting the API."
        );
    }

    #[test]
    fn missing_credential_names_variable() {
        let e = StartupError::MissingCredential {
            provider: "gemini".into(),
            var: "GEMINI_API_KEY".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("GEMINI_API_KEY"), "got: {msg}");
        assert!(msg.contains("gemini"), "got: {msg}");
    }

    #[test]
    fn not_a_pdf_display() {
        let e = ExtractionError::NotAPdf {
            name: "notes.txt".into(),
            magic: b"hell".to_vec(),
        };
        assert!(e.to_string().contains("notes.txt"));
    }

    #[test]
    fn session_error_is_transparent() {
        let e: SessionError = Rejected::NoDocument.into();
        assert_eq!(e.to_string(), "no document is loaded");

        let e: SessionError = QueryError::api("boom").into();
        assert_eq!(e.to_string(), "Error from API: boom");
    }
}
