//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No per-user directories could be determined for this platform/user.
    #[display("unable to determine the user's home directory")]
    NoHomeDirectory,
    /// A configuration source could not be read or deserialized.
    #[display("unable to load configuration")]
    Load,
    /// The configuration file has an extension we don't know how to parse.
    #[display("unsupported configuration format: {}", _0.display())]
    Format(#[error(not(source))] PathBuf),
    /// The configuration loaded, but doesn't make sense.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
