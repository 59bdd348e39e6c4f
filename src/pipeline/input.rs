//! Input resolution: load the bytes of a selected file and validate them.
//!
//! The PDF header (`%PDF-`) is looked for before any parsing so callers get a
//! meaningful error rather than a pdfium failure on, say, a renamed `.docx`.
//! Like pdfium, the header may be preceded by junk within the first
//! [`HEADER_SEARCH_WINDOW`] bytes.

use crate::error::ExtractionError;
use crate::types::{FileSource, SelectedFile};
use std::sync::Arc;
use tracing::debug;

/// Read the selected file into memory.
///
/// Path sources are read with `tokio::fs` so the event loop stays free while
/// the disk is busy.
pub async fn read_selected(file: &SelectedFile) -> Result<Arc<[u8]>, ExtractionError> {
    let bytes: Arc<[u8]> = match &file.source {
        FileSource::Bytes(bytes) => Arc::clone(bytes),
        FileSource::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|e| ExtractionError::ReadFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?
            .into(),
    };

    debug!("Read '{}': {} bytes", file.name, bytes.len());
    Ok(bytes)
}

/// How far into the file the `%PDF-` header may start.
pub const HEADER_SEARCH_WINDOW: usize = 1024;

/// Verify that a PDF header appears near the start of `bytes`.
pub fn check_pdf_magic(name: &str, bytes: &[u8]) -> Result<(), ExtractionError> {
    let head = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if head.windows(5).any(|w| w == b"%PDF-") {
        return Ok(());
    }
    Err(ExtractionError::NotAPdf {
        name: name.to_string(),
        magic: bytes.iter().take(4).copied().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_path_source() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7 body").unwrap();

        let file = SelectedFile::from_path(tmp.path());
        let bytes = read_selected(&file).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn missing_path_is_read_failure() {
        let file = SelectedFile::from_path("/definitely/not/here.pdf");
        let err = read_selected(&file).await.unwrap_err();
        assert!(matches!(err, ExtractionError::ReadFailed { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn bytes_source_is_shared_not_copied() {
        let data: Arc<[u8]> = Arc::from(&b"%PDF-1.4"[..]);
        let file = SelectedFile::from_bytes("mem.pdf", Arc::clone(&data));
        let bytes = read_selected(&file).await.unwrap();
        assert!(Arc::ptr_eq(&bytes, &data));
    }

    #[test]
    fn magic_check() {
        assert!(check_pdf_magic("a.pdf", b"%PDF-1.5\n").is_ok());

        let err = check_pdf_magic("a.txt", b"hello").unwrap_err();
        assert_eq!(
            err,
            ExtractionError::NotAPdf {
                name: "a.txt".into(),
                magic: b"hell".to_vec(),
            }
        );

        // shorter than the signature
        assert!(check_pdf_magic("tiny", b"%P").is_err());
    }

    #[test]
    fn header_after_leading_bytes_is_accepted() {
        assert!(check_pdf_magic("crlf.pdf", b"\r\n%PDF-1.4\n").is_ok());
        assert!(check_pdf_magic("nl.pdf", b"\n%PDF-1.4\n").is_ok());

        let mut late = vec![b' '; HEADER_SEARCH_WINDOW];
        late.extend_from_slice(b"%PDF-1.4");
        assert!(check_pdf_magic("late.pdf", &late).is_err());
    }
}
