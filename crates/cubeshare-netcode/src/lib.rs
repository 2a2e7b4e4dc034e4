//! Cubeshare Netcode - Moving replicated transforms between peers
//!
//! This crate turns the registry in `cubeshare-core` into a networked system:
//!
//! - **Codec**: versioned little-endian wire format for transform and hello messages
//! - **Sequencing**: wrapping u16 sequence numbers so stale updates are discarded
//! - **Replicator**: world → reference-frame conversion and validated application
//! - **Transport**: the interface a host's messaging layer implements
//! - **Endpoint**: per-tick send plus inbound dispatch
//!
//! # Architecture
//!
//! ```text
//!  local tick                                   inbound payload
//!      │                                              │
//!      ▼                                              ▼
//! ┌──────────────┐   ┌─────────┐   ┌───────────┐   ┌─────────┐   ┌──────────────┐
//! │capture_local │──▶│ encode  │──▶│ Transport │──▶│ decode  │──▶│ apply_remote │
//! └──────────────┘   └─────────┘   └───────────┘   └─────────┘   └──────────────┘
//!                                                                        │
//!                                                                        ▼
//!                                                                  PeerRegistry
//! ```
//!
//! # Example
//!
//! ```rust
//! use cubeshare_core::{HeadlessFactory, PeerId, PeerRegistry, Quat, ReferenceFrame, Vec3};
//! use cubeshare_netcode::{LoopbackNetwork, ReplicationEndpoint};
//!
//! let network = LoopbackNetwork::new();
//! let mut alice = ReplicationEndpoint::new(PeerId(1), network.attach(PeerId(1)));
//! let mut bob = ReplicationEndpoint::new(PeerId(2), network.attach(PeerId(2)));
//! let mut bob_registry = PeerRegistry::new(PeerId(2), HeadlessFactory::new());
//!
//! alice.tick(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY, &ReferenceFrame::identity()).unwrap();
//! bob.pump(&mut bob_registry).unwrap();
//!
//! assert!(bob_registry.contains(PeerId(1)));
//! ```

pub mod codec;
mod endpoint;
mod error;
mod loopback;
mod replicator;
pub mod sequence;
mod transport;

pub use codec::{InboundMessage, MessageKind, TransformUpdate};
pub use endpoint::{Delivery, EndpointStats, ReplicationEndpoint};
pub use error::{Error, Result};
pub use loopback::{LoopbackError, LoopbackNetwork, LoopbackTransport};
pub use replicator::{ReplicationStats, TransformReplicator};
pub use sequence::SequenceCounter;
pub use transport::MessageTransport;
