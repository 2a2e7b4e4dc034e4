//! Cubeshare Core - Per-peer transform replication state
//!
//! This crate provides the data model shared by the rest of the workspace:
//! - Peer identities (`PeerId`)
//! - Replicated transforms expressed in a shared reference frame
//! - The peer registry that owns one representational object per remote peer
//! - Replication configuration loaded from RON
//!
//! ## Ownership
//!
//! ```text
//! PeerRegistry (owns everything)
//!  │
//!  ├── RepresentationFactory  ← creates/destroys scene objects
//!  │
//!  └── PeerEntry[]            ← one per remote peer, insertion ordered
//!       ├── object            ← opaque representational handle
//!       └── transform         ← last known-good local-space transform
//! ```
//!
//! The local peer is never present in the registry. Nothing in this crate
//! performs I/O or thread synchronization; hosts drive it from a single
//! logical thread.

mod config;
mod error;
mod identity;
mod registry;
mod representation;
mod transform;

pub use config::{ReplicationConfig, MIN_MESSAGE_LEN};
pub use error::{Error, Result};
pub use identity::PeerId;
pub use registry::{PeerEntry, PeerRegistry, RegistryStats, SharedRegistry};
pub use representation::{
    HeadlessFactory, HeadlessObject, ObjectPose, Representation, RepresentationFactory,
};
pub use transform::{rotation_within_tolerance, ReferenceFrame, ReplicatedTransform};

// Re-export the math types used throughout the public API
pub use glam::{Quat, Vec3};
