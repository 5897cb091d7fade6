//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::compression::CompressionMethod;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// the member count at the start of the archive is missing or disagrees with the buffer
    #[error("malformed archive header: {0}")]
    MalformedHeader(#[from] HeaderError),

    /// a length field of a member points past the end of the buffer
    #[error("member {index} is truncated: {field} needs {needed} bytes but only {remaining} remain")]
    TruncatedMember {
        /// Position of the member inside the archive
        index: usize,
        /// The field that could not be read
        field: &'static str,
        /// Number of bytes the field requires
        needed: usize,
        /// Number of bytes left in the buffer
        remaining: usize,
    },

    /// a member declared a zero length name
    #[error("member {index} has an empty name")]
    EmptyMemberName {
        /// Position of the member inside the archive
        index: usize,
    },

    /// no decompression strategy could decode a member payload
    #[error(transparent)]
    DecompressionFailed(#[from] DecompressionError),

    /// the writer was handed a member it cannot encode
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// unable to find requested member
    #[error("unable to find requested member")]
    FileNotFound(#[from] FileNotFoundError),
}

/// Further information on why the archive header could not be trusted
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum HeaderError {
    /// the buffer is too small to hold the member count
    #[error("buffer of {0} bytes cannot hold the member count")]
    Missing(usize),

    /// the buffer ended before every declared member was read
    #[error("{declared} members declared but the buffer ends after {found}")]
    CountMismatch {
        /// Member count stored in the header
        declared: u16,
        /// Members actually present
        found: usize,
    },
}

/// Error type to provide further information when a member has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested member")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Outcome of a single strategy while decoding a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The payload did not carry the magic bytes the strategy looks for
    NotDetected,
    /// The strategy was tried and the decoder rejected the payload
    Failed(String),
}

/// Record of one strategy the selector went through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    /// The strategy that was considered
    pub method: CompressionMethod,
    /// What happened when it was considered
    pub outcome: AttemptOutcome,
}

/// Raised when every decompression strategy rejected a payload
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("payload of {payload_len} bytes matched no decompression strategy (attempted {attempts:?})")]
pub struct DecompressionError {
    /// Size of the rejected payload
    pub payload_len: usize,
    /// Every strategy in the order it was considered
    pub attempts: Vec<StrategyAttempt>,
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
