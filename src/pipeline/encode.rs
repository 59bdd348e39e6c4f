//! Image attachments: raw bytes → base64 [`ImageAttachment`] and back.
//!
//! Attachments never touch disk after being read: the payload is held as
//! base64 text, rendered as a `data:` URI for display, and forwarded to the
//! provider as an [`ImageData`] content part alongside the prompt text.

use crate::types::ImageAttachment;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Why an attachment could not be built.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Failed to read image '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unrecognised image format")]
    UnknownFormat,

    #[error("Not a base64 data URI")]
    InvalidDataUri,

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

static DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(?P<mime>[A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,(?P<data>[A-Za-z0-9+/=\s]*)$")
        .expect("valid regex")
});

impl ImageAttachment {
    /// Wrap raw image bytes, sniffing the MIME type from their magic bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AttachmentError> {
        let format = image::guess_format(bytes).map_err(|_| AttachmentError::UnknownFormat)?;
        let mime_type = format.to_mime_type().to_string();
        let data = STANDARD.encode(bytes);
        debug!("Encoded {} image → {} bytes base64", mime_type, data.len());
        Ok(Self { mime_type, data })
    }

    /// Read and wrap an image file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AttachmentError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_bytes(&bytes)
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self, AttachmentError> {
        let caps = DATA_URI
            .captures(uri.trim())
            .ok_or(AttachmentError::InvalidDataUri)?;
        let data: String = caps["data"].chars().filter(|c| !c.is_whitespace()).collect();
        // validate the payload up front rather than at request time
        STANDARD.decode(&data)?;
        Ok(Self {
            mime_type: caps["mime"].to_ascii_lowercase(),
            data,
        })
    }

    /// Render as a `data:` URI.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decoded payload size in bytes.
    pub fn decoded_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|&b| b == b'=').count();
        ((self.data.len() / 4) * 3).saturating_sub(padding.min(2))
    }

    /// Content part for the provider request.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 128, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[test]
    fn png_is_sniffed() {
        let png = tiny_png();
        let att = ImageAttachment::from_bytes(&png).expect("attachment");
        assert_eq!(att.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&att.data).unwrap(), png);
        assert_eq!(att.decoded_len(), png.len());
    }

    #[test]
    fn garbage_is_rejected() {
        let err = ImageAttachment::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AttachmentError::UnknownFormat));
    }

    #[test]
    fn data_uri_renders_and_parses() {
        let att = ImageAttachment::from_bytes(&tiny_png()).unwrap();
        let uri = att.data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(ImageAttachment::from_data_uri(&uri).unwrap(), att);
    }

    #[test]
    fn malformed_data_uris() {
        assert!(matches!(
            ImageAttachment::from_data_uri("http://example.com/a.png"),
            Err(AttachmentError::InvalidDataUri)
        ));
        assert!(matches!(
            ImageAttachment::from_data_uri("data:image/png;base64,@@@@"),
            Err(AttachmentError::InvalidDataUri)
        ));
        assert!(matches!(
            ImageAttachment::from_data_uri("data:image/png;base64,abc"),
            Err(AttachmentError::InvalidBase64(_))
        ));
    }

    #[test]
    fn image_data_carries_mime_and_payload() {
        let att = ImageAttachment {
            mime_type: "image/jpeg".into(),
            data: "AAAA".into(),
        };
        let data = att.to_image_data();
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(data.data, "AAAA");
    }
}
