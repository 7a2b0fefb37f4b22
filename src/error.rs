//! Error handling for nmapparse
//!
//! Only a handful of conditions ever reach the caller. Per-file parse failures
//! are absorbed by the ingester and reported through `ImportResult` instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ingestion, export and configuration
#[derive(Debug, Error)]
pub enum NmapParseError {
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("Malformed scan file {file}: {reason}")]
    MalformedScan { file: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl NmapParseError {
    pub fn malformed<F: Into<String>, R: Into<String>>(file: F, reason: R) -> Self {
        NmapParseError::MalformedScan { file: file.into(), reason: reason.into() }
    }

    /// Whether the error is isolated to a single scan file
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            NmapParseError::IoError(_) | NmapParseError::XmlError(_) | NmapParseError::MalformedScan { .. }
        )
    }
}

/// Result type alias for nmapparse operations
pub type Result<T> = std::result::Result<T, NmapParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_not_found_message() {
        let err = NmapParseError::PathNotFound(PathBuf::from("/nope/scan.xml"));
        assert_eq!(err.to_string(), "Path not found: /nope/scan.xml");
        assert!(!err.is_per_file());
    }

    #[test]
    fn test_malformed_is_per_file() {
        let err = NmapParseError::malformed("a.xml", "no root element");
        assert!(err.is_per_file());
        assert!(err.to_string().contains("a.xml"));
    }
}
