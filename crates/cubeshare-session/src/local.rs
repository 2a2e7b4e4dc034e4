//! In-process session service
//!
//! `LocalSession` plays the role of the external session layer for a single
//! process: demos, tools and tests drive it by hand. Like real sharing
//! services it passes duplicate notifications straight through.

use crate::session::{HandlerId, SessionEvent, SessionEventKind, SessionHandler, SessionService};
use crate::{Error, Result};
use cubeshare_core::PeerId;
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};

struct Registered {
    id: HandlerId,
    kind: SessionEventKind,
    handler: SessionHandler,
}

/// Single-threaded session service for one local peer
pub struct LocalSession {
    local_peer: PeerId,
    connected: Cell<bool>,
    members: RefCell<Vec<PeerId>>,
    next_handler: Cell<u64>,
    /// Registered handlers not currently being invoked
    handlers: RefCell<Vec<Registered>>,
    /// Handlers taken out for the event being delivered
    in_flight: RefCell<HashSet<HandlerId>>,
    /// In-flight handlers unsubscribed during delivery
    cancelled: RefCell<HashSet<HandlerId>>,
    /// Events raised while another event is being delivered
    pending: RefCell<VecDeque<SessionEvent>>,
    dispatching: Cell<bool>,
}

impl LocalSession {
    /// Create a disconnected session for `local_peer`
    pub fn new(local_peer: PeerId) -> Self {
        Self {
            local_peer,
            connected: Cell::new(false),
            members: RefCell::new(Vec::new()),
            next_handler: Cell::new(0),
            handlers: RefCell::new(Vec::new()),
            in_flight: RefCell::new(HashSet::new()),
            cancelled: RefCell::new(HashSet::new()),
            pending: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        }
    }

    /// Mark the session connected and announce it
    ///
    /// Announces again if already connected.
    pub fn connect(&self) {
        if !self.connected.replace(true) {
            log::info!("{} connected to local session", self.local_peer);
        }
        self.dispatch(SessionEvent::Connected);
    }

    /// Drop the session and announce it
    pub fn disconnect(&self) {
        if self.connected.replace(false) {
            log::info!("{} disconnected from local session", self.local_peer);
        }
        self.members.borrow_mut().clear();
        self.dispatch(SessionEvent::Disconnected);
    }

    /// Announce that `peer` joined
    pub fn join(&self, peer: PeerId) -> Result<()> {
        if !self.connected.get() {
            return Err(Error::NotConnected);
        }
        {
            let mut members = self.members.borrow_mut();
            if !members.contains(&peer) {
                members.push(peer);
            }
        }
        self.dispatch(SessionEvent::PeerJoined(peer));
        Ok(())
    }

    /// Announce that `peer` left
    ///
    /// Announces even if `peer` already left.
    pub fn leave(&self, peer: PeerId) -> Result<()> {
        if !self.connected.get() {
            return Err(Error::NotConnected);
        }
        self.members.borrow_mut().retain(|member| *member != peer);
        self.dispatch(SessionEvent::PeerLeft(peer));
        Ok(())
    }

    /// Peers currently in the session, in join order
    pub fn members(&self) -> Vec<PeerId> {
        self.members.borrow().clone()
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        let in_flight = self.in_flight.borrow().len() - self.cancelled.borrow().len();
        self.handlers.borrow().len() + in_flight
    }

    fn dispatch(&self, event: SessionEvent) {
        self.pending.borrow_mut().push_back(event);
        if self.dispatching.replace(true) {
            return;
        }

        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(event) => self.deliver(&event),
                None => break,
            }
        }
        self.dispatching.set(false);
    }

    fn deliver(&self, event: &SessionEvent) {
        let mut active = std::mem::take(&mut *self.handlers.borrow_mut());
        *self.in_flight.borrow_mut() = active.iter().map(|r| r.id).collect();

        for registered in active.iter_mut() {
            if registered.kind != event.kind() {
                continue;
            }
            let cancelled = self.cancelled.borrow().contains(&registered.id);
            if !cancelled {
                (registered.handler)(event);
            }
        }

        // Merge back, keeping handlers added during delivery
        let cancelled = std::mem::take(&mut *self.cancelled.borrow_mut());
        self.in_flight.borrow_mut().clear();
        let mut handlers = self.handlers.borrow_mut();
        active.retain(|r| !cancelled.contains(&r.id));
        active.append(&mut handlers);
        *handlers = active;
    }
}

impl SessionService for LocalSession {
    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn local_peer(&self) -> Option<PeerId> {
        Some(self.local_peer)
    }

    fn subscribe(&self, kind: SessionEventKind, handler: SessionHandler) -> HandlerId {
        let id = HandlerId(self.next_handler.get());
        self.next_handler.set(id.0 + 1);
        self.handlers.borrow_mut().push(Registered { id, kind, handler });
        id
    }

    fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        if let Some(pos) = handlers.iter().position(|r| r.id == id) {
            handlers.remove(pos);
            return true;
        }
        if self.in_flight.borrow().contains(&id) {
            return self.cancelled.borrow_mut().insert(id);
        }
        false
    }
}
