// src/error.rs
//
// Error taxonomy for the transfer path. Most of the crate propagates
// anyhow::Result; these variants exist so callers can match on the classes
// that matter operationally (HTTP status, missing upload id, resolution).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Non-2xx response on any storage request.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// S3 multipart initiate returned no `<UploadId>`.
    #[error("CreateMultipartUpload returned no upload id")]
    MissingUploadId,

    /// A profile or endpoint string could not be resolved.
    #[error("resolution failed: {0}")]
    Resolution(String),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransferError::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }
}
