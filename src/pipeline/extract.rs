//! Document extraction: selected PDF → page-ordered plain text + page count.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. Each pass runs on tokio's blocking pool so the event loop
//! (and whatever UI sits on it) keeps running while a large PDF is parsed.
//!
//! ## Two passes
//!
//! Text and page count are obtained by loading the document twice. Either
//! pass can fail on its own, which is why [`ExtractionError`] distinguishes
//! `ParseFailed` from `PageCountFailed`.

use crate::error::ExtractionError;
use crate::pipeline::input;
use crate::types::{ExtractedText, SelectedFile};
use pdfium_render::prelude::*;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Separator written after every page of extracted text.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Converts a selected file into text.
///
/// The session is generic over this trait so tests and embedding hosts can
/// swap pdfium for something else.
pub trait DocumentExtractor: Send + Sync {
    fn extract(
        &self,
        file: &SelectedFile,
    ) -> impl Future<Output = Result<ExtractedText, ExtractionError>> + Send;
}

/// Extractor backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// User password for encrypted documents.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Bind to an explicit pdfium library instead of searching for one.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }
}

impl DocumentExtractor for PdfiumExtractor {
    async fn extract(&self, file: &SelectedFile) -> Result<ExtractedText, ExtractionError> {
        let bytes = input::read_selected(file).await?;
        input::check_pdf_magic(&file.name, &bytes)?;

        let content = {
            let (bytes, name) = (Arc::clone(&bytes), file.name.clone());
            let (password, lib) = (self.password.clone(), self.library_path.clone());
            run_blocking(move || {
                extract_text_blocking(&bytes, &name, password.as_deref(), lib.as_deref())
            })
            .await?
        };

        let page_count = {
            let name = file.name.clone();
            let (password, lib) = (self.password.clone(), self.library_path.clone());
            run_blocking(move || {
                count_pages_blocking(&bytes, &name, password.as_deref(), lib.as_deref())
            })
            .await?
        };

        info!(
            "Extracted '{}': {} pages, {} chars",
            file.name,
            page_count,
            content.len()
        );

        Ok(ExtractedText {
            content,
            page_count,
        })
    }
}

/// Concatenate page texts in order, each followed by [`PAGE_SEPARATOR`].
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for page in pages {
        out.push_str(page.as_ref());
        out.push_str(PAGE_SEPARATOR);
    }
    out
}

async fn run_blocking<T, F>(f: F) -> Result<T, ExtractionError>
where
    F: FnOnce() -> Result<T, ExtractionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExtractionError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the working
/// directory, then the system library search path.
fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, ExtractionError> {
    let explicit = library_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractionError::EngineUnavailable(format!("{}: {}", path.display(), e))
        })?,
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| ExtractionError::EngineUnavailable(e.to_string()))?,
    };

    Ok(Pdfium::new(bindings))
}

fn load_error(name: &str, password: Option<&str>, err: PdfiumError) -> ExtractionError {
    let detail = format!("{:?}", err);
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            ExtractionError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            ExtractionError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        ExtractionError::ParseFailed {
            name: name.to_string(),
            detail,
        }
    }
}

/// A parse failure during the page-count pass is reported as such; password
/// and engine errors pass through unchanged.
fn count_error(err: ExtractionError) -> ExtractionError {
    match err {
        ExtractionError::ParseFailed { name, detail } => {
            ExtractionError::PageCountFailed { name, detail }
        }
        other => other,
    }
}

fn extract_text_blocking(
    bytes: &[u8],
    name: &str,
    password: Option<&str>,
    library_path: Option<&Path>,
) -> Result<String, ExtractionError> {
    let pdfium = bind_pdfium(library_path)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| load_error(name, password, e))?;

    let mut texts = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| ExtractionError::ParseFailed {
            name: name.to_string(),
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        let text = text.all();
        debug!("Page {}: {} chars", idx + 1, text.len());
        texts.push(text);
    }

    Ok(join_pages(texts))
}

fn count_pages_blocking(
    bytes: &[u8],
    name: &str,
    password: Option<&str>,
    library_path: Option<&Path>,
) -> Result<usize, ExtractionError> {
    let pdfium = bind_pdfium(library_path)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| count_error(load_error(name, password, e)))?;

    Ok(document.pages().len() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_pages_join_with_trailing_blank_lines() {
        assert_eq!(
            join_pages(["Hello", "World", "End"]),
            "Hello\n\nWorld\n\nEnd\n\n"
        );
    }

    #[test]
    fn empty_pages_still_separated() {
        assert_eq!(join_pages(["", "x"]), "\n\nx\n\n");
        assert_eq!(join_pages(Vec::<String>::new()), "");
    }

    #[test]
    fn count_pass_parse_failure_is_page_count_failure() {
        let err = count_error(ExtractionError::ParseFailed {
            name: "a.pdf".into(),
            detail: "FormatError".into(),
        });
        assert_eq!(
            err,
            ExtractionError::PageCountFailed {
                name: "a.pdf".into(),
                detail: "FormatError".into(),
            }
        );

        let locked = ExtractionError::PasswordRequired {
            name: "a.pdf".into(),
        };
        assert_eq!(count_error(locked.clone()), locked);
    }

    #[tokio::test]
    async fn non_pdf_rejected_before_engine() {
        // Fails on the magic check, so no pdfium library is needed.
        let file = SelectedFile::from_bytes("notes.txt", b"plain text".to_vec());
        let err = PdfiumExtractor::new().extract(&file).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NotAPdf { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unreadable_file_rejected_before_engine() {
        let file = SelectedFile::from_path("/no/such/dir/file.pdf");
        let err = PdfiumExtractor::new().extract(&file).await.unwrap_err();
        assert!(matches!(err, ExtractionError::ReadFailed { .. }), "got {err:?}");
    }
}
