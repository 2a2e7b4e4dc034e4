//! Messaging transport interface
//!
//! The transport is supplied by the host (a sharing service, WebSocket relay,
//! UDP socket, ...). It moves opaque payloads between session members; the
//! message kind travels inside the payload header, so the transport needs no
//! knowledge of it.

/// Broadcast transport for a shared session
pub trait MessageTransport {
    /// Error type for this transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send a payload to every other session member
    ///
    /// Delivery may be unreliable and unordered.
    fn broadcast(&self, payload: &[u8]) -> Result<(), Self::Error>;

    /// Receive the next inbound payload (non-blocking)
    ///
    /// Returns `Ok(None)` if no data is available.
    fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;
}
