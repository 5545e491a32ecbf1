// Payload intake: the file or text blob a user pushes through a phase.

use std::path::Path;

use thiserror::Error;

use crate::encoding;

/// Largest payload the service accepts.
pub const MAX_PAYLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Content types the service will inscribe. Text blobs are wrapped as
/// `text/plain` before entering the pipeline.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "application/pdf",
    "video/mp4",
    "text/plain",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
    #[error("payload of {size} bytes exceeds the {MAX_PAYLOAD_BYTES}-byte limit")]
    TooLarge { size: usize },
    #[error("failed to read payload: {0}")]
    Io(String),
}

/// One file or text blob, with its declared content type, ready to be
/// base64-encoded onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl Payload {
    /// Build a payload from raw bytes, validating content type and size.
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, PayloadError> {
        let content_type = content_type.into();
        if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(PayloadError::UnsupportedContentType(content_type));
        }
        if bytes.len() > MAX_PAYLOAD_BYTES {
            return Err(PayloadError::TooLarge { size: bytes.len() });
        }
        Ok(Self {
            name: name.into(),
            content_type,
            bytes,
        })
    }

    /// Wrap a text blob as a `text/plain` payload.
    pub fn from_text(text: impl Into<String>) -> Result<Self, PayloadError> {
        let text = text.into();
        Self::from_bytes("payload.txt", "text/plain", text.into_bytes())
    }

    /// Read a file from disk, inferring the content type from the extension.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PayloadError> {
        let path = path.as_ref();
        let content_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("pdf") => "application/pdf",
            Some("mp4") => "video/mp4",
            Some("txt") => "text/plain",
            other => {
                return Err(PayloadError::UnsupportedContentType(
                    other.unwrap_or("unknown").to_string(),
                ))
            }
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PayloadError::Io(e.to_string()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("payload")
            .to_string();
        Self::from_bytes(name, content_type, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The base64 wire encoding sent to the construct endpoints.
    pub fn to_base64(&self) -> String {
        encoding::to_base64(&self.bytes)
    }
}
