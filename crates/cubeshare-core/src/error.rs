//! Error types for cubeshare-core

use crate::PeerId;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A registry operation was given the local peer where a remote peer is required
    #[error("Invalid peer: {0} is the local peer")]
    InvalidPeer(PeerId),

    /// Inbound traffic named a peer that has left, or arrived outside a session
    #[error("Peer not admitted: {0} is not a session member")]
    NotAdmitted(PeerId),

    /// No registry entry exists for the peer
    #[error("Peer not found: {0}")]
    NotFound(PeerId),

    /// A rotation is too far from unit length to be accepted
    #[error("Rotation for {peer} is not normalized (|q| = {norm})")]
    Normalization { peer: PeerId, norm: f32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
