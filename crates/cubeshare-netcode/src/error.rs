//! Error types for cubeshare-netcode

use cubeshare_core::PeerId;
use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// Payload is truncated, oversized or otherwise malformed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Payload was produced by an incompatible wire version
    #[error("Unsupported wire version {0}")]
    UnsupportedVersion(u8),

    /// Payload carries a message kind this build does not know
    #[error("Unknown message kind {0}")]
    UnknownMessage(u8),

    /// Update is not newer than the last accepted one for this peer
    #[error("Stale update from {peer}: sequence {sequence} is not newer than {last}")]
    Stale { peer: PeerId, sequence: u16, last: u16 },

    /// Update was addressed to a different peer's entry
    #[error("Update from {update} cannot be applied to the entry of {entry}")]
    EntryMismatch { entry: PeerId, update: PeerId },

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] cubeshare_core::Error),
}

impl Error {
    /// Whether this error comes from malformed inbound bytes
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Error::Decode(_) | Error::UnsupportedVersion(_) | Error::UnknownMessage(_)
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
