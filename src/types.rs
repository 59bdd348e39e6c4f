//! Data types shared by the extractor, the model client and the session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A successfully extracted PDF.
///
/// Created only by a successful extraction and never mutated afterwards; a new
/// file selection replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Display name of the selected file.
    pub filename: String,
    /// Per-page text, each page followed by a blank line.
    pub content: String,
    /// Number of pages, always ≥ 1.
    pub page_count: usize,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One entry in the append-only conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Attached image, only ever present on user messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
}

impl Message {
    pub fn user(text: impl Into<String>, image: Option<ImageAttachment>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            image: None,
        }
    }
}

/// An inline image: MIME type plus base64 payload, held entirely in memory.
///
/// Rendered as a `data:` URI for display and sent as a second content part
/// of the model request. See [`crate::pipeline::encode`] for construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub mime_type: String,
    /// Base64 (standard alphabet, padded) encoded bytes.
    pub data: String,
}

/// A file picked by the user, not yet read.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// Display name; becomes [`Document::filename`] on success.
    pub name: String,
    pub source: FileSource,
}

/// Where the bytes of a [`SelectedFile`] come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Read lazily during extraction, so I/O failures surface as extraction errors.
    Path(PathBuf),
    /// Already in memory (drag-and-drop, tests, embedding hosts).
    Bytes(Arc<[u8]>),
}

impl SelectedFile {
    /// Select a file on disk; the display name is its final path component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            source: FileSource::Path(path),
        }
    }

    /// Select an in-memory file.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Bytes(bytes.into()),
        }
    }
}

/// Output of the document extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub content: String,
    pub page_count: usize,
}

/// Serialisable snapshot of a conversation, for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub document: Option<DocumentSummary>,
    pub messages: Vec<Message>,
}

/// The parts of a [`Document`] worth exporting (the text itself is omitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub page_count: usize,
    pub content_chars: usize,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            filename: doc.filename.clone(),
            page_count: doc.page_count,
            content_chars: doc.content.chars().count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_uses_file_name() {
        let f = SelectedFile::from_path("/tmp/reports/q3.pdf");
        assert_eq!(f.name, "q3.pdf");
        assert!(matches!(f.source, FileSource::Path(_)));
    }

    #[test]
    fn role_serialises_lowercase() {
        let json = serde_json::to_string(&Message::model("hi")).unwrap();
        assert_eq!(json, r#"{"role":"model","text":"hi"}"#);
    }

    #[test]
    fn summary_counts_chars_not_bytes() {
        let doc = Document {
            filename: "a.pdf".into(),
            content: "héllo".into(),
            page_count: 1,
        };
        assert_eq!(DocumentSummary::from(&doc).content_chars, 5);
    }
}
