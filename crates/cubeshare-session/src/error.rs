//! Error types for cubeshare-session

use thiserror::Error;

/// Session error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Membership changes require an established session
    #[error("session is not connected")]
    NotConnected,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
