//! Session membership service interface
//!
//! The session layer (matchmaking, sharing service, lobby, ...) is external.
//! It announces connection and membership changes to subscribed handlers.

use cubeshare_core::PeerId;
use std::fmt;

/// Notification from the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The local peer joined the session
    Connected,
    /// The local peer lost the session
    Disconnected,
    /// A peer joined the session
    PeerJoined(PeerId),
    /// A peer left the session
    PeerLeft(PeerId),
}

impl SessionEvent {
    /// The kind handlers subscribe to
    pub fn kind(&self) -> SessionEventKind {
        match self {
            SessionEvent::Connected => SessionEventKind::Connected,
            SessionEvent::Disconnected => SessionEventKind::Disconnected,
            SessionEvent::PeerJoined(_) => SessionEventKind::PeerJoined,
            SessionEvent::PeerLeft(_) => SessionEventKind::PeerLeft,
        }
    }
}

/// Event kinds a handler can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    Connected,
    Disconnected,
    PeerJoined,
    PeerLeft,
}

/// Identifier of a registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler:{}", self.0)
    }
}

/// Callback invoked for each matching event
pub type SessionHandler = Box<dyn FnMut(&SessionEvent)>;

/// Membership service provided by the host
///
/// Events are delivered serially on the host's logical thread. Handlers may
/// subscribe or unsubscribe while an event is being delivered.
pub trait SessionService {
    /// Whether the local peer is currently in a session
    fn is_connected(&self) -> bool;

    /// Identity of the local peer, once assigned
    fn local_peer(&self) -> Option<PeerId>;

    /// Register `handler` for events of `kind`
    fn subscribe(&self, kind: SessionEventKind, handler: SessionHandler) -> HandlerId;

    /// Remove a handler. Returns false if it was not registered.
    fn unsubscribe(&self, id: HandlerId) -> bool;
}
