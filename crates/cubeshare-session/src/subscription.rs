//! Scoped event subscriptions
//!
//! A [`Subscription`] registers a handler on construction and unregisters it
//! when dropped. It holds only a weak reference to the session, so a session
//! that has already been torn down is simply skipped.

use crate::session::{HandlerId, SessionEventKind, SessionHandler, SessionService};
use std::rc::{Rc, Weak};

/// Handle that keeps a session handler registered
pub struct Subscription {
    id: HandlerId,
    kind: SessionEventKind,
    session: Weak<dyn SessionService>,
    active: bool,
}

impl Subscription {
    /// Register `handler` on `session` for events of `kind`
    pub fn new(
        session: &Rc<dyn SessionService>,
        kind: SessionEventKind,
        handler: SessionHandler,
    ) -> Self {
        let id = session.subscribe(kind, handler);
        log::debug!("subscribed {} to {:?}", id, kind);
        Self {
            id,
            kind,
            session: Rc::downgrade(session),
            active: true,
        }
    }

    /// Handler ID assigned by the session
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Event kind this subscription listens to
    pub fn kind(&self) -> SessionEventKind {
        self.kind
    }

    /// Whether the handler is still registered as far as this handle knows
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Unregister the handler
    ///
    /// Returns true if the session removed it. Safe to call repeatedly and
    /// after the session is gone.
    pub fn release(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        match self.session.upgrade() {
            Some(session) => session.unsubscribe(self.id),
            None => {
                log::debug!("session gone before {} was released", self.id);
                false
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("active", &self.active)
            .finish()
    }
}
