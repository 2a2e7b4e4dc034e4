//! Shared Cubes Example
//!
//! Three peers share one session. Each tick every peer broadcasts where its
//! cube sits relative to a shared anchor, and everyone else mirrors it.
//!
//! Run with `RUST_LOG=debug` to see registry and replication logging.
//! An optional argument names a RON file with a `ReplicationConfig`.

use cubeshare_core::{
    HeadlessFactory, PeerId, PeerRegistry, Quat, ReferenceFrame, ReplicationConfig, SharedRegistry,
    Vec3,
};
use cubeshare_netcode::{LoopbackNetwork, LoopbackTransport, ReplicationEndpoint};
use cubeshare_session::{LocalSession, SessionEventBridge};
use std::rc::Rc;

struct Peer {
    name: &'static str,
    id: PeerId,
    session: Rc<LocalSession>,
    registry: SharedRegistry<HeadlessFactory>,
    endpoint: ReplicationEndpoint<LoopbackTransport>,
    _bridge: SessionEventBridge<HeadlessFactory>,
}

impl Peer {
    fn new(
        name: &'static str,
        id: PeerId,
        network: &LoopbackNetwork,
        config: &ReplicationConfig,
    ) -> Self {
        let session = Rc::new(LocalSession::new(id));
        let registry = PeerRegistry::with_config(id, HeadlessFactory::new(), config).into_shared();
        let bridge = SessionEventBridge::attach(session.clone(), registry.clone());
        let endpoint = ReplicationEndpoint::with_config(id, network.attach(id), config);
        Self {
            name,
            id,
            session,
            registry,
            endpoint,
            _bridge: bridge,
        }
    }

    fn pump(&mut self) {
        let mut registry = self.registry.borrow_mut();
        if let Err(e) = self.endpoint.pump(&mut *registry) {
            log::error!("{} failed to receive: {}", self.name, e);
        }
    }

    fn print_view(&self) {
        let registry = self.registry.borrow();
        println!("  {} ({}) sees {} remote cube(s):", self.name, self.id, registry.len());
        registry.for_each_entry(|entry| match entry.transform() {
            Some(t) => println!(
                "    {} at ({:.2}, {:.2}, {:.2}) seq {:?}",
                entry.id(),
                t.position().x,
                t.position().y,
                t.position().z,
                entry.last_sequence()
            ),
            None => println!("    {} (no pose yet)", entry.id()),
        });
    }
}

fn load_config() -> ReplicationConfig {
    let Some(path) = std::env::args().nth(1) else {
        return ReplicationConfig::default();
    };
    match ReplicationConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("could not load {}: {}, using defaults", path, e);
            ReplicationConfig::default()
        }
    }
}

fn main() {
    env_logger::init();
    println!("=== Cubeshare Shared Cubes Example ===\n");

    let config = load_config();
    let network = LoopbackNetwork::new();
    let mut peers = vec![
        Peer::new("Alice", PeerId(1), &network, &config),
        Peer::new("Bob", PeerId(2), &network, &config),
        Peer::new("Carol", PeerId(3), &network, &config),
    ];

    // Everyone connects, then hears about everyone else (including themselves)
    let ids: Vec<PeerId> = peers.iter().map(|p| p.id).collect();
    for peer in &peers {
        peer.session.connect();
        for id in &ids {
            if let Err(e) = peer.session.join(*id) {
                log::error!("{} could not announce {}: {}", peer.name, id, e);
            }
        }
    }

    println!("After joining:");
    for peer in &peers {
        peer.print_view();
    }

    // Shared anchor a few meters in front of the world origin, turned 90 degrees
    let anchor = ReferenceFrame::new(
        Vec3::new(0.0, 0.0, 2.0),
        Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
    );

    for tick in 0..3 {
        for (i, peer) in peers.iter_mut().enumerate() {
            let offset = i as f32 + tick as f32 * 0.1;
            let world_position = Vec3::new(offset, 1.5, 2.0);
            let world_rotation = Quat::from_rotation_y(offset);
            if let Err(e) = peer.endpoint.tick(world_position, world_rotation, &anchor) {
                log::error!("{} failed to send: {}", peer.name, e);
            }
        }
        for peer in peers.iter_mut() {
            peer.pump();
        }
    }

    println!("\nAfter 3 ticks:");
    for peer in &peers {
        peer.print_view();
    }

    // Garbage and hello traffic
    if let Err(e) = network.inject(PeerId(1), vec![1, 1, 0xff]) {
        log::error!("inject failed: {}", e);
    }
    if let Err(e) = peers[2].endpoint.send_hello() {
        log::error!("Carol failed to say hello: {}", e);
    }
    for peer in peers.iter_mut() {
        peer.pump();
    }

    // Bob leaves; the notification arrives twice at Alice
    for peer in &peers {
        if peer.id != PeerId(2) {
            let _ = peer.session.leave(PeerId(2));
        }
    }
    let _ = peers[0].session.leave(PeerId(2));

    println!("\nAfter Bob left:");
    for peer in &peers {
        peer.print_view();
    }

    println!("\nStatistics:");
    for peer in &peers {
        let endpoint = peer.endpoint.stats();
        let replication = peer.endpoint.replicator().stats();
        let registry = peer.registry.borrow().stats();
        println!(
            "  {}: sent {} received {} applied {} stale {} malformed {} refused {} hellos {}",
            peer.name,
            endpoint.sent,
            endpoint.received,
            replication.applied,
            replication.rejected_stale,
            endpoint.dropped_malformed,
            endpoint.refused,
            endpoint.hellos_received,
        );
        println!(
            "  {}  entries created {} removed {} missing removals {}",
            " ".repeat(peer.name.len()),
            registry.created,
            registry.removed,
            registry.missing_removals,
        );
    }

    // Alice loses the session
    peers[0].session.disconnect();
    println!("\nAfter Alice disconnected:");
    peers[0].print_view();

    println!("\n=== Example Complete ===");
}
