//! Error types for Netwatch

use thiserror::Error;

/// Main error type for monitor operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker tried to start a probe while its previous one was still in
    /// flight.
    #[error("A probe is already active for this worker")]
    ProbeBusy,

    /// The probe was removed before an outcome could be delivered.
    #[error("The probe was cancelled")]
    Cancelled,

    #[error("Unsupported address family: only IPv4 targets can be probed")]
    UnsupportedFamily,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;
