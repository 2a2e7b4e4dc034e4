//! Session event bridge
//!
//! Turns membership notifications into registry lifecycle:
//!
//! ```text
//! Connected     → register PeerJoined/PeerLeft handlers (once), open registry
//! PeerJoined(p) → registry.get_or_create(p)   (p != local)
//! PeerLeft(p)   → registry.remove(p)          (p != local)
//! Disconnected  → release membership handlers, close registry
//! ```
//!
//! A closed registry refuses to create entries for inbound traffic, so
//! updates still in flight when the session ends are dropped.
//!
//! All handlers are held as [`Subscription`]s, so dropping the bridge
//! unregisters everything, and a session that is already gone is skipped.

use crate::session::{SessionEvent, SessionEventKind, SessionHandler, SessionService};
use crate::subscription::Subscription;
use cubeshare_core::{PeerId, RepresentationFactory, SharedRegistry};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Counters for bridge activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Transitions into the connected state
    pub connects: u64,
    /// Connected signals received while already connected
    pub duplicate_connects: u64,
    /// Transitions out of the connected state
    pub disconnects: u64,
    /// Remote joins forwarded to the registry
    pub joins: u64,
    /// Remote leaves forwarded to the registry
    pub leaves: u64,
    /// Join/leave notifications about the local peer
    pub ignored_local: u64,
}

struct BridgeState<F: RepresentationFactory> {
    this: Weak<RefCell<BridgeState<F>>>,
    local_peer: PeerId,
    session: Weak<dyn SessionService>,
    registry: SharedRegistry<F>,
    connected: bool,
    lifecycle: Vec<Subscription>,
    membership: Vec<Subscription>,
    stats: BridgeStats,
}

impl<F: RepresentationFactory + 'static> BridgeState<F> {
    fn handler(&self) -> SessionHandler {
        let state = self.this.clone();
        Box::new(move |event: &SessionEvent| {
            let Some(state) = state.upgrade() else {
                return;
            };
            match state.try_borrow_mut() {
                Ok(mut state) => state.handle(event),
                Err(_) => log::error!("bridge busy, dropping re-entrant {:?}", event),
            };
        })
    }

    fn handle(&mut self, event: &SessionEvent) {
        match *event {
            SessionEvent::Connected => self.connect(),
            SessionEvent::Disconnected => self.disconnect(),
            SessionEvent::PeerJoined(peer) => self.peer_joined(peer),
            SessionEvent::PeerLeft(peer) => self.peer_left(peer),
        }
    }

    fn subscribe(&self, kinds: &[SessionEventKind]) -> Vec<Subscription> {
        match self.session.upgrade() {
            Some(session) => kinds
                .iter()
                .map(|kind| Subscription::new(&session, *kind, self.handler()))
                .collect(),
            None => {
                log::warn!("session is gone, cannot subscribe to {:?}", kinds);
                Vec::new()
            }
        }
    }

    fn connect(&mut self) {
        if self.connected {
            self.stats.duplicate_connects += 1;
            log::debug!("ignoring duplicate connected signal");
            return;
        }
        self.membership =
            self.subscribe(&[SessionEventKind::PeerJoined, SessionEventKind::PeerLeft]);
        self.connected = true;
        self.stats.connects += 1;
        match self.registry.try_borrow_mut() {
            Ok(mut registry) => registry.open(),
            Err(_) => log::error!("registry busy, not opened on connect"),
        }
        log::info!("session connected, tracking peers for {}", self.local_peer);
    }

    fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.membership.clear();
        self.connected = false;
        self.stats.disconnects += 1;

        match self.registry.try_borrow_mut() {
            Ok(mut registry) => {
                let dropped = registry.len();
                registry.close();
                log::info!("session disconnected, dropped {} remote peers", dropped);
            }
            Err(_) => log::error!("registry busy, remote peers not cleared on disconnect"),
        }
    }

    fn peer_joined(&mut self, peer: PeerId) {
        if peer == self.local_peer {
            self.stats.ignored_local += 1;
            return;
        }
        let Ok(mut registry) = self.registry.try_borrow_mut() else {
            log::error!("registry busy, dropping join of {}", peer);
            return;
        };
        if registry.get_or_create(peer).is_ok() {
            self.stats.joins += 1;
            log::debug!("{} joined", peer);
        }
    }

    fn peer_left(&mut self, peer: PeerId) {
        if peer == self.local_peer {
            self.stats.ignored_local += 1;
            return;
        }
        let Ok(mut registry) = self.registry.try_borrow_mut() else {
            log::error!("registry busy, dropping leave of {}", peer);
            return;
        };
        self.stats.leaves += 1;
        // Duplicate leaves are expected; the registry logs and counts them
        let _ = registry.remove(peer);
    }

    fn release_all(&mut self) {
        self.membership.clear();
        self.lifecycle.clear();
        self.connected = false;
    }
}

/// Drives a [`cubeshare_core::PeerRegistry`] from session notifications
pub struct SessionEventBridge<F: RepresentationFactory + 'static> {
    state: Rc<RefCell<BridgeState<F>>>,
}

impl<F: RepresentationFactory + 'static> SessionEventBridge<F> {
    /// Attach to `session`, driving `registry`
    ///
    /// Lifecycle handlers (connected/disconnected) are registered right away.
    /// If the session is already connected, membership handlers are
    /// registered immediately as well; otherwise the registry is closed until
    /// the session connects.
    pub fn attach(session: Rc<dyn SessionService>, registry: SharedRegistry<F>) -> Self {
        let local_peer = registry.borrow().local_peer();
        if !session.is_connected() {
            registry.borrow_mut().close();
        }
        if let Some(reported) = session.local_peer() {
            if reported != local_peer {
                log::warn!(
                    "session reports local {} but registry excludes {}",
                    reported,
                    local_peer
                );
            }
        }

        let state = Rc::new_cyclic(|this| {
            RefCell::new(BridgeState {
                this: this.clone(),
                local_peer,
                session: Rc::downgrade(&session),
                registry,
                connected: false,
                lifecycle: Vec::new(),
                membership: Vec::new(),
                stats: BridgeStats::default(),
            })
        });

        {
            let mut state = state.borrow_mut();
            state.lifecycle =
                state.subscribe(&[SessionEventKind::Connected, SessionEventKind::Disconnected]);
        }

        let bridge = Self { state };
        if session.is_connected() {
            bridge.on_connected();
        }
        bridge
    }

    /// Handle the session becoming connected
    ///
    /// Registers the join/leave handlers exactly once; repeated calls while
    /// connected are counted and otherwise ignored.
    pub fn on_connected(&self) {
        self.state.borrow_mut().connect();
    }

    /// Handle the session being lost
    pub fn on_disconnected(&self) {
        self.state.borrow_mut().disconnect();
    }

    /// Handle a peer joining; the local peer is ignored
    pub fn on_peer_joined(&self, peer: PeerId) {
        self.state.borrow_mut().peer_joined(peer);
    }

    /// Handle a peer leaving; the local peer is ignored
    pub fn on_peer_left(&self, peer: PeerId) {
        self.state.borrow_mut().peer_left(peer);
    }

    /// Unregister every handler this bridge registered
    ///
    /// The registry is left as is. Safe to call more than once and after the
    /// session has been torn down.
    pub fn teardown(&mut self) {
        self.state.borrow_mut().release_all();
    }

    /// Whether membership handlers are registered
    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// Number of handlers currently registered through this bridge
    pub fn subscription_count(&self) -> usize {
        let state = self.state.borrow();
        state.lifecycle.len() + state.membership.len()
    }

    /// The registry this bridge drives
    pub fn registry(&self) -> SharedRegistry<F> {
        Rc::clone(&self.state.borrow().registry)
    }

    /// Activity counters
    pub fn stats(&self) -> BridgeStats {
        self.state.borrow().stats
    }
}

impl<F: RepresentationFactory + 'static> Drop for SessionEventBridge<F> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalSession;
    use cubeshare_core::{HeadlessFactory, PeerRegistry};

    const LOCAL: PeerId = PeerId(1);

    fn setup() -> (Rc<LocalSession>, SharedRegistry<HeadlessFactory>) {
        let session = Rc::new(LocalSession::new(LOCAL));
        let registry = PeerRegistry::new(LOCAL, HeadlessFactory::new()).into_shared();
        (session, registry)
    }

    #[test]
    fn test_attach_before_connect_waits_for_signal() {
        let (session, registry) = setup();
        let bridge = SessionEventBridge::attach(session.clone(), registry.clone());
        assert!(!bridge.is_connected());
        assert_eq!(session.handler_count(), 2);

        session.connect();
        assert!(bridge.is_connected());
        assert_eq!(session.handler_count(), 4);

        session.join(PeerId(42)).unwrap();
        assert!(registry.borrow().contains(PeerId(42)));
    }

    #[test]
    fn test_attach_when_already_connected() {
        let (session, registry) = setup();
        session.connect();

        let bridge = SessionEventBridge::attach(session.clone(), registry.clone());
        assert!(bridge.is_connected());
        assert_eq!(bridge.subscription_count(), 4);

        session.join(PeerId(7)).unwrap();
        assert_eq!(registry.borrow().len(), 1);
    }

    #[test]
    fn test_duplicate_connected_registers_once() {
        let (session, registry) = setup();
        let bridge = SessionEventBridge::attach(session.clone(), registry.clone());

        session.connect();
        session.connect();
        bridge.on_connected();
        assert_eq!(session.handler_count(), 4);
        assert_eq!(bridge.stats().connects, 1);
        assert_eq!(bridge.stats().duplicate_connects, 2);

        // One join creates one entry even with duplicate signals above
        session.join(PeerId(3)).unwrap();
        assert_eq!(bridge.stats().joins, 1);
        assert_eq!(registry.borrow().factory().created(), 1);
    }

    #[test]
    fn test_local_peer_events_are_noops() {
        let (session, registry) = setup();
        session.connect();
        let bridge = SessionEventBridge::attach(session.clone(), registry.clone());

        session.join(LOCAL).unwrap();
        bridge.on_peer_joined(LOCAL);
        session.leave(LOCAL).unwrap();
        bridge.on_peer_left(LOCAL);

        assert!(!registry.borrow().contains(LOCAL));
        assert!(registry.borrow().is_empty());
        assert_eq!(registry.borrow().stats().rejected_local, 0);
        assert_eq!(registry.borrow().stats().missing_removals, 0);
        assert_eq!(bridge.stats().ignored_local, 4);
    }

    #[test]
    fn test_duplicate_leave_is_harmless() {
        let (session, registry) = setup();
        session.connect();
        let bridge = SessionEventBridge::attach(session.clone(), registry.clone());

        session.join(PeerId(42)).unwrap();
        session.leave(PeerId(42)).unwrap();
        session.leave(PeerId(42)).unwrap();

        let registry = registry.borrow();
        assert!(registry.is_empty());
        assert_eq!(registry.factory().destroyed(), 1);
        assert_eq!(registry.stats().missing_removals, 1);
        assert_eq!(bridge.stats().leaves, 2);
    }

    #[test]
    fn test_disconnect_clears_and_reconnect_rearms() {
        let (session, registry) = setup();
        let bridge = SessionEventBridge::attach(session.clone(), registry.clone());
        session.connect();
        session.join(PeerId(2)).unwrap();
        session.join(PeerId(3)).unwrap();

        session.disconnect();
        assert!(!bridge.is_connected());
        assert!(registry.borrow().is_empty());
        assert_eq!(registry.borrow().factory().live_count(), 0);
        assert_eq!(session.handler_count(), 2);

        session.connect();
        session.join(PeerId(4)).unwrap();
        assert_eq!(registry.borrow().ids().collect::<Vec<_>>(), vec![PeerId(4)]);
        assert_eq!(bridge.stats().connects, 2);
        assert_eq!(bridge.stats().disconnects, 1);
    }

    #[test]
    fn test_registry_closed_outside_session() {
        let (session, registry) = setup();
        let _bridge = SessionEventBridge::attach(session.clone(), registry.clone());
        assert!(!registry.borrow().is_accepting());

        session.connect();
        assert!(registry.borrow().is_accepting());

        session.disconnect();
        assert!(!registry.borrow().is_accepting());
        assert!(registry.borrow_mut().admit_inbound(PeerId(2)).is_err());
        assert!(registry.borrow().is_empty());
    }

    #[test]
    fn test_leave_marks_peer_departed() {
        let (session, registry) = setup();
        session.connect();
        let _bridge = SessionEventBridge::attach(session.clone(), registry.clone());

        session.join(PeerId(2)).unwrap();
        session.leave(PeerId(2)).unwrap();
        assert!(registry.borrow().has_departed(PeerId(2)));

        session.join(PeerId(2)).unwrap();
        assert!(!registry.borrow().has_departed(PeerId(2)));
        assert!(registry.borrow().contains(PeerId(2)));
    }

    #[test]
    fn test_teardown_unregisters_everything() {
        let (session, registry) = setup();
        session.connect();
        let mut bridge = SessionEventBridge::attach(session.clone(), registry.clone());
        assert_eq!(session.handler_count(), 4);

        bridge.teardown();
        bridge.teardown();
        assert_eq!(session.handler_count(), 0);
        assert_eq!(bridge.subscription_count(), 0);

        session.join(PeerId(9)).unwrap();
        assert!(registry.borrow().is_empty());
    }

    #[test]
    fn test_drop_unregisters() {
        let (session, registry) = setup();
        session.connect();
        let bridge = SessionEventBridge::attach(session.clone(), registry.clone());
        drop(bridge);
        assert_eq!(session.handler_count(), 0);
    }

    #[test]
    fn test_teardown_after_session_gone() {
        let (session, registry) = setup();
        session.connect();
        let mut bridge = SessionEventBridge::attach(session.clone(), registry.clone());

        drop(session);
        bridge.teardown();
        assert_eq!(bridge.subscription_count(), 0);
    }
}
