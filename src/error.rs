//! Error types for asset decoding and session control.
//!
//! Every load failure is local to a single attempt: the caller reports the
//! message and keeps whatever asset was installed before.

use thiserror::Error;

use crate::format::AssetFormat;

/// Failure to decode an asset from raw bytes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The filename hint did not map to a known decoder.
    #[error("unsupported file format '{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("{format}: invalid header: {reason}")]
    InvalidHeader { format: AssetFormat, reason: String },

    #[error("{format}: invalid vertex count: {reason}")]
    InvalidVertexCount { format: AssetFormat, reason: String },

    #[error("{format}: header is not terminated by 'end_header'")]
    MissingHeaderTerminator { format: AssetFormat },

    #[error("{format}: header declares {expected} vertices but only {found} data rows follow")]
    TruncatedData {
        format: AssetFormat,
        expected: usize,
        found: usize,
    },

    /// A data row could not be read as a point. `line` is 1-based in the source text.
    #[error("{format}: invalid vertex data on line {line}: {reason}")]
    InvalidVertexData {
        format: AssetFormat,
        line: usize,
        reason: String,
    },

    #[error("{format}: malformed vertex array: {reason}")]
    MalformedVertexArray { format: AssetFormat, reason: String },

    #[error("{format}: unexpected document shape: {reason}")]
    InvalidJsonShape { format: AssetFormat, reason: String },

    /// The scene decoder rejected the asset.
    #[error("{format}: failed to load asset: {cause}")]
    AssetLoadFailed { format: AssetFormat, cause: String },
}

impl ParseError {
    /// The decoder that produced this error, if dispatch got that far.
    pub fn format(&self) -> Option<AssetFormat> {
        match self {
            ParseError::UnsupportedFormat { .. } => None,
            ParseError::InvalidHeader { format, .. }
            | ParseError::InvalidVertexCount { format, .. }
            | ParseError::MissingHeaderTerminator { format }
            | ParseError::TruncatedData { format, .. }
            | ParseError::InvalidVertexData { format, .. }
            | ParseError::MalformedVertexArray { format, .. }
            | ParseError::InvalidJsonShape { format, .. }
            | ParseError::AssetLoadFailed { format, .. } => Some(*format),
        }
    }
}

/// Failure to drive the visualiser session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session has been torn down")]
    TornDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_format() {
        let err = ParseError::InvalidVertexData {
            format: AssetFormat::Ply,
            line: 7,
            reason: "expected 3 fields, found 2".to_string(),
        };
        let message = err.to_string();
        assert!(message.starts_with("PLY:"));
        assert!(message.contains("line 7"));
    }

    #[test]
    fn test_unsupported_format_has_no_decoder() {
        let err = ParseError::UnsupportedFormat {
            extension: "obj".to_string(),
        };
        assert_eq!(err.format(), None);
        assert_eq!(err.to_string(), "unsupported file format 'obj'");
    }
}
