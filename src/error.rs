//! Error type for archive entry iteration.
//!
//! Every failure at this layer is an I/O failure: a malformed header, a truncated member, a broken
//! transport and a stream that was already closed all arrive from the raw entry source as
//! [`std::io::Error`] and are surfaced unchanged inside [`Error::Io`].

/// Result type alias for operations that may return an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while iterating archive entries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying stream failed to read, parse or close.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the [`std::io::ErrorKind`] of the underlying failure.
    pub fn kind(&self) -> std::io::ErrorKind {
        match self {
            Error::Io(err) => err.kind(),
        }
    }
}
