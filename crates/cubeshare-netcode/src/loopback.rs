//! In-process broadcast transport
//!
//! Every member of a [`LoopbackNetwork`] gets an inbox. A broadcast appends
//! the payload to every other member's inbox; nothing is lost or reordered
//! unless the caller injects it that way.

use crate::transport::MessageTransport;
use cubeshare_core::PeerId;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use thiserror::Error;

/// Loopback transport errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopbackError {
    /// The member has left the network
    #[error("{0} is not attached to the loopback network")]
    Detached(PeerId),
}

#[derive(Debug, Default)]
struct NetworkState {
    inboxes: IndexMap<PeerId, VecDeque<Vec<u8>>>,
}

/// Shared in-process message bus
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl LoopbackNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `peer` and return its transport
    pub fn attach(&self, peer: PeerId) -> LoopbackTransport {
        self.state.borrow_mut().inboxes.entry(peer).or_default();
        LoopbackTransport {
            peer,
            state: Rc::clone(&self.state),
        }
    }

    /// Detach `peer`, dropping anything still in its inbox
    pub fn detach(&self, peer: PeerId) -> bool {
        self.state.borrow_mut().inboxes.shift_remove(&peer).is_some()
    }

    /// Place a raw payload directly into `peer`'s inbox
    pub fn inject(&self, peer: PeerId, payload: Vec<u8>) -> Result<(), LoopbackError> {
        match self.state.borrow_mut().inboxes.get_mut(&peer) {
            Some(inbox) => {
                inbox.push_back(payload);
                Ok(())
            }
            None => Err(LoopbackError::Detached(peer)),
        }
    }

    /// Number of payloads waiting for `peer`
    pub fn pending(&self, peer: PeerId) -> usize {
        self.state
            .borrow()
            .inboxes
            .get(&peer)
            .map_or(0, VecDeque::len)
    }
}

/// One member's view of a [`LoopbackNetwork`]
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    peer: PeerId,
    state: Rc<RefCell<NetworkState>>,
}

impl LoopbackTransport {
    /// Member this transport belongs to
    pub fn peer(&self) -> PeerId {
        self.peer
    }
}

impl MessageTransport for LoopbackTransport {
    type Error = LoopbackError;

    fn broadcast(&self, payload: &[u8]) -> Result<(), LoopbackError> {
        let mut state = self.state.borrow_mut();
        if !state.inboxes.contains_key(&self.peer) {
            return Err(LoopbackError::Detached(self.peer));
        }
        for (peer, inbox) in state.inboxes.iter_mut() {
            if *peer != self.peer {
                inbox.push_back(payload.to_vec());
            }
        }
        Ok(())
    }

    fn recv(&self) -> Result<Option<Vec<u8>>, LoopbackError> {
        match self.state.borrow_mut().inboxes.get_mut(&self.peer) {
            Some(inbox) => Ok(inbox.pop_front()),
            None => Err(LoopbackError::Detached(self.peer)),
        }
    }
}
