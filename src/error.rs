//! Error types shared across the crate.
//!
//! The taxonomy is deliberately small and stable: every failure the
//! segmenter can surface maps onto one of six kinds, so callers can make
//! retry/abort decisions without string matching.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the segmenter and its subsystems.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad key size, unsupported scheme, malformed configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed bitstream or unparsable box data.
    #[error("parser failure: {0}")]
    ParserFailure(String),

    /// The underlying crypto primitive refused the operation.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    /// Open, write, or close failed on the output.
    #[error("file failure ({context}): {source}")]
    FileFailure {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Informational: the stream ended. Not a failure.
    #[error("end of stream")]
    EndOfStream,

    /// A broken internal invariant (assertion-class).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl Error {
    /// Wrap an I/O error with the file or operation it came from.
    pub fn file(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::FileFailure {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn parser(msg: impl Into<String>) -> Self {
        Error::ParserFailure(msg.into())
    }

    /// True for the informational kind that callers should not treat as
    /// fatal.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::invalid_argument("key must be 16, 24 or 32 bytes");
        assert_eq!(
            err.to_string(),
            "invalid argument: key must be 16, 24 or 32 bytes"
        );
    }

    #[test]
    fn file_failure_preserves_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::file("seg_00001.m4s", io);
        assert!(err.to_string().contains("seg_00001.m4s"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn end_of_stream_is_informational() {
        assert!(Error::EndOfStream.is_end_of_stream());
        assert!(!Error::invalid_argument("x").is_end_of_stream());
    }
}
