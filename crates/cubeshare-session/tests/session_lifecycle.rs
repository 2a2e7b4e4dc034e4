//! Session membership and transform replication working together

use cubeshare_core::{
    HeadlessFactory, PeerId, PeerRegistry, Quat, ReferenceFrame, SharedRegistry, Vec3,
};
use cubeshare_netcode::{
    Delivery, LoopbackNetwork, LoopbackTransport, MessageTransport, ReplicationEndpoint,
};
use cubeshare_session::{LocalSession, SessionEventBridge};
use std::rc::Rc;

struct Peer {
    session: Rc<LocalSession>,
    registry: SharedRegistry<HeadlessFactory>,
    endpoint: ReplicationEndpoint<LoopbackTransport>,
    bridge: SessionEventBridge<HeadlessFactory>,
}

impl Peer {
    fn new(id: PeerId, network: &LoopbackNetwork) -> Self {
        let session = Rc::new(LocalSession::new(id));
        let registry = PeerRegistry::new(id, HeadlessFactory::new()).into_shared();
        let bridge = SessionEventBridge::attach(session.clone(), registry.clone());
        let endpoint = ReplicationEndpoint::new(id, network.attach(id));
        Self {
            session,
            registry,
            endpoint,
            bridge,
        }
    }

    fn pump(&mut self) -> usize {
        let mut registry = self.registry.borrow_mut();
        self.endpoint.pump(&mut *registry).unwrap()
    }
}

#[test]
fn test_join_replicate_leave() {
    let network = LoopbackNetwork::new();
    let mut alice = Peer::new(PeerId(1), &network);
    let mut bob = Peer::new(PeerId(2), &network);

    alice.session.connect();
    alice.session.join(PeerId(2)).unwrap();
    assert!(alice.registry.borrow().contains(PeerId(2)));

    let frame = ReferenceFrame::from_translation(Vec3::new(10.0, 0.0, 0.0));
    bob.endpoint
        .tick(Vec3::new(11.0, 2.0, 3.0), Quat::IDENTITY, &frame)
        .unwrap();
    assert_eq!(alice.pump(), 1);

    {
        let registry = alice.registry.borrow();
        let entry = registry.get(PeerId(2)).unwrap();
        let transform = entry.transform().unwrap();
        assert!((transform.position() - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        assert_eq!(entry.last_sequence(), Some(0));

        let pose = registry.factory().pose(PeerId(2)).unwrap();
        assert!((pose.position - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        assert!((pose.scale - 0.05).abs() < 1e-6);
    }

    alice.session.leave(PeerId(2)).unwrap();
    assert!(alice.registry.borrow().is_empty());
    assert_eq!(alice.registry.borrow().factory().live_count(), 0);
}

#[test]
fn test_update_before_join_creates_entry_once() {
    let network = LoopbackNetwork::new();
    let mut alice = Peer::new(PeerId(1), &network);
    let mut carol = Peer::new(PeerId(3), &network);
    alice.session.connect();

    carol
        .endpoint
        .tick(Vec3::ZERO, Quat::IDENTITY, &ReferenceFrame::identity())
        .unwrap();
    alice.pump();
    alice.session.join(PeerId(3)).unwrap();

    let registry = alice.registry.borrow();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.factory().created(), 1);
    assert_eq!(registry.get(PeerId(3)).unwrap().update_count(), 1);
}

#[test]
fn test_own_traffic_never_creates_local_entry() {
    let network = LoopbackNetwork::new();
    let mut alice = Peer::new(PeerId(1), &network);
    alice.session.connect();
    alice.session.join(PeerId(1)).unwrap();

    // A payload carrying alice's own id, as a misbehaving relay might echo back
    let mut mirror = ReplicationEndpoint::new(PeerId(1), network.attach(PeerId(99)));
    mirror
        .tick(Vec3::ONE, Quat::IDENTITY, &ReferenceFrame::identity())
        .unwrap();

    let payload = alice.endpoint.transport().recv().unwrap().unwrap();
    let delivery = {
        let mut registry = alice.registry.borrow_mut();
        alice.endpoint.handle_inbound(&mut *registry, &payload)
    };
    assert_eq!(delivery, Delivery::Echo);
    assert!(!alice.registry.borrow().contains(PeerId(1)));
    assert!(alice.registry.borrow().is_empty());
}

#[test]
fn test_disconnect_drops_remote_peers_and_stops_tracking() {
    let network = LoopbackNetwork::new();
    let alice = Peer::new(PeerId(1), &network);
    alice.session.connect();
    alice.session.join(PeerId(2)).unwrap();
    alice.session.join(PeerId(3)).unwrap();
    assert_eq!(alice.registry.borrow().len(), 2);

    alice.session.disconnect();
    assert!(alice.registry.borrow().is_empty());
    assert!(!alice.bridge.is_connected());
    assert_eq!(alice.session.join(PeerId(4)), Err(cubeshare_session::Error::NotConnected));
    assert!(alice.registry.borrow().is_empty());
}

#[test]
fn test_stale_and_malformed_traffic_is_dropped() {
    let network = LoopbackNetwork::new();
    let mut alice = Peer::new(PeerId(1), &network);
    let mut bob = Peer::new(PeerId(2), &network);
    alice.session.connect();
    alice.session.join(PeerId(2)).unwrap();

    let frame = ReferenceFrame::identity();
    bob.endpoint.tick(Vec3::X, Quat::IDENTITY, &frame).unwrap();
    bob.endpoint.tick(Vec3::Y, Quat::IDENTITY, &frame).unwrap();
    network.inject(PeerId(1), vec![1, 1, 0, 0]).unwrap();
    alice.pump();

    let registry = alice.registry.borrow();
    let entry = registry.get(PeerId(2)).unwrap();
    assert_eq!(entry.last_sequence(), Some(1));
    assert!((entry.transform().unwrap().position() - Vec3::Y).length() < 1e-6);
    assert_eq!(alice.endpoint.stats().dropped_malformed, 1);
}

#[test]
fn test_dropping_bridge_detaches_from_session() {
    let network = LoopbackNetwork::new();
    let alice = Peer::new(PeerId(1), &network);
    alice.session.connect();
    assert_eq!(alice.session.handler_count(), 4);

    let Peer {
        session,
        registry,
        bridge,
        ..
    } = alice;
    drop(bridge);
    assert_eq!(session.handler_count(), 0);

    session.join(PeerId(5)).unwrap();
    assert!(registry.borrow().is_empty());
}

#[test]
fn test_update_in_flight_at_leave_does_not_resurrect_peer() {
    let network = LoopbackNetwork::new();
    let mut alice = Peer::new(PeerId(1), &network);
    let mut bob = Peer::new(PeerId(2), &network);
    alice.session.connect();
    alice.session.join(PeerId(2)).unwrap();

    bob.endpoint
        .tick(Vec3::X, Quat::IDENTITY, &ReferenceFrame::identity())
        .unwrap();
    alice.session.leave(PeerId(2)).unwrap();
    assert_eq!(alice.pump(), 1);

    assert!(alice.session.members().is_empty());
    assert!(!alice.registry.borrow().contains(PeerId(2)));
    assert_eq!(alice.registry.borrow().factory().live_count(), 0);
    assert_eq!(alice.endpoint.stats().refused, 1);

    // Joining again lets the peer's traffic through
    alice.session.join(PeerId(2)).unwrap();
    bob.endpoint
        .tick(Vec3::Y, Quat::IDENTITY, &ReferenceFrame::identity())
        .unwrap();
    alice.pump();
    let registry = alice.registry.borrow();
    assert_eq!(registry.get(PeerId(2)).unwrap().update_count(), 1);
}

#[test]
fn test_update_in_flight_at_disconnect_is_dropped() {
    let network = LoopbackNetwork::new();
    let mut alice = Peer::new(PeerId(1), &network);
    let mut bob = Peer::new(PeerId(2), &network);
    let mut carol = Peer::new(PeerId(3), &network);
    alice.session.connect();
    alice.session.join(PeerId(2)).unwrap();

    bob.endpoint
        .tick(Vec3::X, Quat::IDENTITY, &ReferenceFrame::identity())
        .unwrap();
    carol
        .endpoint
        .tick(Vec3::Z, Quat::IDENTITY, &ReferenceFrame::identity())
        .unwrap();
    alice.session.disconnect();
    assert_eq!(alice.pump(), 2);

    assert!(alice.registry.borrow().is_empty());
    assert_eq!(alice.registry.borrow().factory().live_count(), 0);
    assert_eq!(alice.endpoint.stats().refused, 2);
}

#[test]
fn test_traffic_before_connect_is_dropped() {
    let network = LoopbackNetwork::new();
    let mut alice = Peer::new(PeerId(1), &network);
    let mut bob = Peer::new(PeerId(2), &network);

    bob.endpoint
        .tick(Vec3::X, Quat::IDENTITY, &ReferenceFrame::identity())
        .unwrap();
    alice.pump();
    assert!(alice.registry.borrow().is_empty());

    alice.session.connect();
    bob.endpoint
        .tick(Vec3::Y, Quat::IDENTITY, &ReferenceFrame::identity())
        .unwrap();
    alice.pump();
    assert!(alice.registry.borrow().contains(PeerId(2)));
}
