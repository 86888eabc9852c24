use std::path::PathBuf;
use thiserror::Error;

use crate::models::Provider;

/// A provider template did not match the schema version its extractor
/// expects. The message is dropped, never defaulted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider} template {schema} rejected: {reason}")]
pub struct ExtractionRejected {
    /// Provider whose extractor refused the message.
    pub provider: Provider,
    /// Named schema version the extractor's offsets belong to.
    pub schema: &'static str,
    /// Human-readable description of the mismatch.
    pub reason: String,
}

impl ExtractionRejected {
    pub fn new(provider: Provider, schema: &'static str, reason: impl Into<String>) -> Self {
        Self {
            provider,
            schema,
            reason: reason.into(),
        }
    }
}

/// All errors produced by the ledger crates.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The message carries no body that could be decoded.
    #[error("Message {message_id} has no decodable body")]
    MissingBody { message_id: String },

    /// A payload leaf has a MIME type the decoder does not handle.
    #[error("Unsupported MIME type: {0}")]
    UnsupportedMimeType(String),

    /// A payload leaf is not valid base64url or not valid UTF-8.
    #[error("Failed to decode message body: {0}")]
    Decode(String),

    /// An amount string is not a non-negative decimal number.
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    /// The provider extractor refused the message.
    #[error(transparent)]
    Rejected(#[from] ExtractionRejected),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A worker task ended without producing an outcome.
    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the ledger crates.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = LedgerError::FileRead {
            path: PathBuf::from("/some/paylah/msg.json"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/paylah/msg.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_missing_body() {
        let err = LedgerError::MissingBody {
            message_id: "18a0f".to_string(),
        };
        assert_eq!(err.to_string(), "Message 18a0f has no decodable body");
    }

    #[test]
    fn test_error_display_unsupported_mime() {
        let err = LedgerError::UnsupportedMimeType("image/png".to_string());
        assert_eq!(err.to_string(), "Unsupported MIME type: image/png");
    }

    #[test]
    fn test_error_display_invalid_amount() {
        let err = LedgerError::InvalidAmount("-3.00".to_string());
        assert_eq!(err.to_string(), "Invalid amount: \"-3.00\"");
    }

    #[test]
    fn test_rejection_display_names_provider_and_schema() {
        let rejected = ExtractionRejected::new(Provider::PayLah, "paylah-v1", "expected 8 cells, got 7");
        let err: LedgerError = rejected.into();
        assert_eq!(
            err.to_string(),
            "PayLah template paylah-v1 rejected: expected 8 cells, got 7"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = LedgerError::Config("unknown timezone".to_string());
        assert_eq!(err.to_string(), "Configuration error: unknown timezone");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LedgerError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: LedgerError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
