//! Wire format for replication messages
//!
//! Format (little-endian):
//! - u8 `WIRE_VERSION` (1)
//! - u8 message kind (1 = transform update, 2 = hello)
//! - body, bincode with fixed-width integers:
//!   - transform update: u64 peer, u16 sequence, 3 × f32 position,
//!     4 × f32 rotation (x, y, z, w)
//!   - hello: u64 peer
//!
//! Trailing bytes after the body are rejected.

use crate::{Error, Result};
use bincode::Options;
use cubeshare_core::{PeerId, Quat, ReplicatedTransform, Vec3};
use serde::{Deserialize, Serialize};

/// Current wire version
pub const WIRE_VERSION: u8 = 1;

/// Version byte plus kind byte
pub const HEADER_LEN: usize = 2;

/// Encoded size of a transform update
pub const TRANSFORM_MESSAGE_LEN: usize = HEADER_LEN + 8 + 2 + 12 + 16;

/// Encoded size of a hello
pub const HELLO_MESSAGE_LEN: usize = HEADER_LEN + 8;

/// Kind tag carried in the second header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Pose of the sending peer
    TransformUpdate = 1,
    /// Test message fired by local input
    Hello = 2,
}

impl MessageKind {
    /// Wire tag for this kind
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parse a wire tag
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(MessageKind::TransformUpdate),
            2 => Ok(MessageKind::Hello),
            other => Err(Error::UnknownMessage(other)),
        }
    }
}

/// A transform update as carried on the wire
///
/// The rotation is kept exactly as received so the replicator can validate
/// it; use [`TransformUpdate::transform`] for the normalized form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformUpdate {
    /// Peer whose pose this is
    pub peer: PeerId,
    /// Sender-side sequence number
    pub sequence: u16,
    /// Position in reference-frame local space
    pub position: Vec3,
    /// Rotation in reference-frame local space, as received
    pub rotation: Quat,
}

impl TransformUpdate {
    /// Build an outbound update from a replicated transform
    pub fn new(peer: PeerId, sequence: u16, transform: &ReplicatedTransform) -> Self {
        Self {
            peer,
            sequence,
            position: transform.position(),
            rotation: transform.rotation(),
        }
    }

    /// Normalized transform carried by this update
    pub fn transform(&self) -> ReplicatedTransform {
        ReplicatedTransform::new(self.position, self.rotation)
    }
}

/// Any decoded inbound message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InboundMessage {
    Transform(TransformUpdate),
    Hello(PeerId),
}

impl InboundMessage {
    /// Kind of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            InboundMessage::Transform(_) => MessageKind::TransformUpdate,
            InboundMessage::Hello(_) => MessageKind::Hello,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TransformBody {
    peer: u64,
    sequence: u16,
    position: [f32; 3],
    rotation: [f32; 4],
}

#[derive(Serialize, Deserialize)]
struct HelloBody {
    peer: u64,
}

fn body_options(limit: usize) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
        .with_limit(limit as u64)
}

fn write_message<B: Serialize>(kind: MessageKind, body: &B, capacity: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(capacity);
    out.push(WIRE_VERSION);
    out.push(kind.as_byte());
    out.extend_from_slice(&body_options(capacity).serialize(body)?);
    Ok(out)
}

/// Encode a transform update
pub fn encode_transform(update: &TransformUpdate) -> Result<Vec<u8>> {
    let body = TransformBody {
        peer: update.peer.raw(),
        sequence: update.sequence,
        position: update.position.to_array(),
        rotation: update.rotation.to_array(),
    };
    write_message(MessageKind::TransformUpdate, &body, TRANSFORM_MESSAGE_LEN)
}

/// Encode a hello from `peer`
pub fn encode_hello(peer: PeerId) -> Result<Vec<u8>> {
    write_message(MessageKind::Hello, &HelloBody { peer: peer.raw() }, HELLO_MESSAGE_LEN)
}

/// Decode any message, rejecting payloads longer than `max_len`
pub fn decode(bytes: &[u8], max_len: usize) -> Result<InboundMessage> {
    if bytes.len() > max_len {
        return Err(Error::Decode(format!(
            "message too large: {} > {}",
            bytes.len(),
            max_len
        )));
    }
    if bytes.len() < HEADER_LEN {
        return Err(Error::Decode("short message header".to_string()));
    }
    if bytes[0] != WIRE_VERSION {
        return Err(Error::UnsupportedVersion(bytes[0]));
    }
    let kind = MessageKind::from_byte(bytes[1])?;
    let body = &bytes[HEADER_LEN..];

    match kind {
        MessageKind::TransformUpdate => {
            let body: TransformBody = body_options(max_len).deserialize(body)?;
            let position = Vec3::from_array(body.position);
            let rotation = Quat::from_array(body.rotation);
            if !position.is_finite() || !rotation.is_finite() {
                return Err(Error::Decode(format!(
                    "non-finite transform from peer:{}",
                    body.peer
                )));
            }
            Ok(InboundMessage::Transform(TransformUpdate {
                peer: PeerId::new(body.peer),
                sequence: body.sequence,
                position,
                rotation,
            }))
        }
        MessageKind::Hello => {
            let body: HelloBody = body_options(max_len).deserialize(body)?;
            Ok(InboundMessage::Hello(PeerId::new(body.peer)))
        }
    }
}

/// Decode a message that must be a transform update
pub fn decode_transform(bytes: &[u8], max_len: usize) -> Result<TransformUpdate> {
    match decode(bytes, max_len)? {
        InboundMessage::Transform(update) => Ok(update),
        other => Err(Error::Decode(format!(
            "expected transform update, got {:?}",
            other.kind()
        ))),
    }
}
