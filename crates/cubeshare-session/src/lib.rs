//! Cubeshare Session - Membership notifications to registry lifecycle
//!
//! The session layer is external; this crate defines the interface it must
//! offer ([`SessionService`]) and the bridge that reacts to it:
//!
//! - [`SessionEventBridge`]: joins create registry entries, leaves remove them
//! - [`Subscription`]: scoped handler registration, released on drop
//! - [`LocalSession`]: in-process session for demos and tests
//!
//! Collaborators are passed in explicitly; nothing here reaches for a
//! process-wide instance.

mod bridge;
mod error;
mod local;
mod session;
mod subscription;

pub use bridge::{BridgeStats, SessionEventBridge};
pub use error::{Error, Result};
pub use local::LocalSession;
pub use session::{HandlerId, SessionEvent, SessionEventKind, SessionHandler, SessionService};
pub use subscription::Subscription;
