//! Per-peer replication endpoint
//!
//! Glues the replicator to a transport: once per simulation tick the local
//! pose is captured and broadcast, and every inbound payload is decoded and
//! dispatched by message kind. Malformed or rejected messages are logged,
//! counted and dropped; the next message is processed normally.

use crate::codec::{self, InboundMessage};
use crate::replicator::TransformReplicator;
use crate::sequence::SequenceCounter;
use crate::transport::MessageTransport;
use crate::{Error, Result};
use cubeshare_core::{
    PeerId, PeerRegistry, Quat, ReferenceFrame, ReplicatedTransform, ReplicationConfig,
    RepresentationFactory, Vec3,
};

/// What happened to one inbound payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Transform update written into the peer's entry
    Applied(PeerId),
    /// Transform update dropped by validation or ordering
    Rejected(PeerId),
    /// Transform update from a peer that left, or received outside a session
    Refused(PeerId),
    /// Hello received from a peer
    Hello(PeerId),
    /// Our own message reflected back by the transport
    Echo,
    /// Payload could not be decoded
    Malformed,
}

/// Counters for endpoint traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointStats {
    /// Transform updates broadcast
    pub sent: u64,
    /// Inbound payloads handled
    pub received: u64,
    /// Inbound payloads that failed to decode
    pub dropped_malformed: u64,
    /// Inbound messages sent by the local peer
    pub ignored_echo: u64,
    /// Transform updates from peers the registry no longer admits
    pub refused: u64,
    /// Hellos broadcast
    pub hellos_sent: u64,
    /// Hellos received
    pub hellos_received: u64,
}

/// Sends the local transform and applies remote ones
pub struct ReplicationEndpoint<T: MessageTransport> {
    local_peer: PeerId,
    transport: T,
    replicator: TransformReplicator,
    sequence: SequenceCounter,
    stats: EndpointStats,
}

impl<T: MessageTransport> ReplicationEndpoint<T> {
    /// Create an endpoint for `local_peer` with default configuration
    pub fn new(local_peer: PeerId, transport: T) -> Self {
        Self::with_config(local_peer, transport, &ReplicationConfig::default())
    }

    /// Create an endpoint for `local_peer` using `config`
    pub fn with_config(local_peer: PeerId, transport: T, config: &ReplicationConfig) -> Self {
        Self {
            local_peer,
            transport,
            replicator: TransformReplicator::from_config(config),
            sequence: SequenceCounter::new(),
            stats: EndpointStats::default(),
        }
    }

    /// Capture the local pose relative to `frame` and broadcast it
    ///
    /// Call once per simulation tick. Returns the transform that was sent.
    pub fn tick(
        &mut self,
        world_position: Vec3,
        world_rotation: Quat,
        frame: &ReferenceFrame,
    ) -> Result<ReplicatedTransform> {
        let transform = TransformReplicator::capture_local(world_position, world_rotation, frame);
        let sequence = self.sequence.next_sequence();
        let payload = self.replicator.encode(self.local_peer, sequence, &transform)?;
        self.transport
            .broadcast(&payload)
            .map_err(|e| Error::Transport(e.to_string()))?;
        self.stats.sent += 1;
        Ok(transform)
    }

    /// Broadcast a hello test message
    pub fn send_hello(&mut self) -> Result<()> {
        let payload = codec::encode_hello(self.local_peer)?;
        self.transport
            .broadcast(&payload)
            .map_err(|e| Error::Transport(e.to_string()))?;
        self.stats.hellos_sent += 1;
        log::debug!("{} sent hello", self.local_peer);
        Ok(())
    }

    /// Decode one inbound payload and dispatch it
    ///
    /// A valid transform update creates the sender's entry on first sight,
    /// unless the registry no longer admits that peer. Updates that fail
    /// validation never create anything.
    pub fn handle_inbound<F: RepresentationFactory>(
        &mut self,
        registry: &mut PeerRegistry<F>,
        payload: &[u8],
    ) -> Delivery {
        self.stats.received += 1;

        let message = match codec::decode(payload, self.replicator.max_message_len()) {
            Ok(message) => message,
            Err(e) => {
                self.stats.dropped_malformed += 1;
                log::warn!(
                    "{} dropped malformed message ({} bytes): {}",
                    self.local_peer,
                    payload.len(),
                    e
                );
                return Delivery::Malformed;
            }
        };

        match message {
            InboundMessage::Transform(update) if update.peer == self.local_peer => {
                self.stats.ignored_echo += 1;
                Delivery::Echo
            }
            InboundMessage::Transform(update) => {
                if self.replicator.validate(&update).is_err() {
                    return Delivery::Rejected(update.peer);
                }
                let entry = match registry.admit_inbound(update.peer) {
                    Ok(entry) => entry,
                    Err(_) => {
                        self.stats.refused += 1;
                        return Delivery::Refused(update.peer);
                    }
                };
                match self.replicator.apply_remote(entry, &update) {
                    Ok(()) => Delivery::Applied(update.peer),
                    Err(_) => Delivery::Rejected(update.peer),
                }
            }
            InboundMessage::Hello(peer) if peer == self.local_peer => {
                self.stats.ignored_echo += 1;
                Delivery::Echo
            }
            InboundMessage::Hello(peer) => {
                self.stats.hellos_received += 1;
                log::info!("{} received hello from {}", self.local_peer, peer);
                Delivery::Hello(peer)
            }
        }
    }

    /// Handle every payload waiting on the transport
    ///
    /// Returns the number of payloads handled. Only transport failures are
    /// returned as errors; bad payloads are dropped individually.
    pub fn pump<F: RepresentationFactory>(
        &mut self,
        registry: &mut PeerRegistry<F>,
    ) -> Result<usize> {
        let mut handled = 0;
        while let Some(payload) = self
            .transport
            .recv()
            .map_err(|e| Error::Transport(e.to_string()))?
        {
            self.handle_inbound(registry, &payload);
            handled += 1;
        }
        Ok(handled)
    }

    /// The local peer
    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The replicator and its counters
    pub fn replicator(&self) -> &TransformReplicator {
        &self.replicator
    }

    /// Traffic counters
    pub fn stats(&self) -> EndpointStats {
        self.stats
    }
}
