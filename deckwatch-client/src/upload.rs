//! Document uploads
//!
//! The payload for job creation, with the checks the service applies so that
//! obviously bad files are rejected before any bytes go over the wire.

use std::path::Path;

use crate::error::{ClientError, Result};

/// Largest document the service accepts (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// A document to submit for analysis
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    file_name: String,
    bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reads a document from disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ClientError::Validation(format!("{} has no usable file name", path.display()))
            })?
            .to_string();

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::Validation(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Ok(Self::new(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<u8>) {
        (self.file_name, self.bytes)
    }

    /// Applies the service's upload rules locally
    pub fn validate(&self, max_bytes: u64) -> Result<()> {
        if !self.file_name.to_lowercase().ends_with(".pdf") {
            return Err(ClientError::Validation(
                "Only PDF files are allowed".to_string(),
            ));
        }

        if self.is_empty() {
            return Err(ClientError::Validation("File is empty".to_string()));
        }

        if self.len() > max_bytes {
            return Err(ClientError::Validation(format!(
                "File size cannot exceed {}",
                format_limit(max_bytes)
            )));
        }

        Ok(())
    }
}

/// Whole mebibytes print as MB, anything else as bytes
fn format_limit(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}
