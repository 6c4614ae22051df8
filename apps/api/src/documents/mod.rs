//! Document text extraction: turns uploaded PDF / DOCX bytes into plain text.
//!
//! Best-effort only: no OCR, no layout or table reconstruction.

use bytes::Bytes;
use thiserror::Error;

pub mod docx;
pub mod pdf;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("PDF parsing failed: {0}")]
    Pdf(String),

    #[error("DOCX parsing failed: {0}")]
    Docx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Resolves the format from the declared filename's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, DocumentError> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Ok(DocumentFormat::Pdf)
        } else if lower.ends_with(".docx") {
            Ok(DocumentFormat::Docx)
        } else {
            Err(DocumentError::UnsupportedFormat(filename.to_string()))
        }
    }
}

/// A file received from the client, in submission order.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub fn format(&self) -> Result<DocumentFormat, DocumentError> {
        DocumentFormat::from_filename(&self.filename)
    }

    /// Extracts the document's text. CPU-bound; run it off the async executor.
    pub fn extract_text(&self) -> Result<String, DocumentError> {
        extract_text(&self.bytes, self.format()?)
    }
}

/// Extracts plain text from document bytes of a known format.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, DocumentError> {
    match format {
        DocumentFormat::Pdf => pdf::extract_text(bytes),
        DocumentFormat::Docx => docx::extract_text(bytes),
    }
}
