// Library error types

use thiserror::Error;

/// Failure of the capture feed. Fatal to the capture session.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture feed I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture feed closed unexpectedly")]
    Closed,
}

/// Why a wire-format DNS question name could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QnameError {
    #[error("label at offset {offset} runs past end of name")]
    Truncated { offset: usize },

    #[error("compression pointer at offset {offset} in question name")]
    Compressed { offset: usize },

    #[error("name exceeds 255 octets")]
    TooLong,

    #[error("name has no terminating root label")]
    Unterminated,
}
