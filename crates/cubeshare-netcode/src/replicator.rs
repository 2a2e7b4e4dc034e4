//! Transform capture and application
//!
//! Outbound, the local pose is converted from world space into the shared
//! reference frame. Inbound, decoded updates are validated, ordered and
//! written into the matching registry entry. The replicator owns no peer
//! state; everything per-peer lives in the registry.

use crate::codec::{self, TransformUpdate};
use crate::sequence::sequence_greater_than;
use crate::{Error, Result};
use cubeshare_core::{
    rotation_within_tolerance, PeerEntry, PeerId, Quat, ReferenceFrame, ReplicatedTransform,
    ReplicationConfig, Representation, Vec3,
};

/// Counters for applied and rejected updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationStats {
    /// Updates written into an entry
    pub applied: u64,
    /// Updates dropped because the rotation was not unit length
    pub rejected_normalization: u64,
    /// Updates dropped because a newer one was already applied
    pub rejected_stale: u64,
}

/// Converts, validates and applies replicated transforms
#[derive(Debug, Clone)]
pub struct TransformReplicator {
    normalization_tolerance: f32,
    enforce_ordering: bool,
    max_message_len: usize,
    stats: ReplicationStats,
}

impl TransformReplicator {
    /// Create a replicator with default configuration
    pub fn new() -> Self {
        Self::from_config(&ReplicationConfig::default())
    }

    /// Create a replicator from configuration
    pub fn from_config(config: &ReplicationConfig) -> Self {
        Self {
            normalization_tolerance: config.normalization_tolerance,
            enforce_ordering: config.enforce_ordering,
            max_message_len: config.max_message_len,
            stats: ReplicationStats::default(),
        }
    }

    /// Express a world-space pose in the reference frame's local space
    pub fn capture_local(
        world_position: Vec3,
        world_rotation: Quat,
        frame: &ReferenceFrame,
    ) -> ReplicatedTransform {
        ReplicatedTransform::new(
            frame.inverse_transform_point(world_position),
            frame.inverse_transform_rotation(world_rotation),
        )
    }

    /// Check that an update's rotation is close enough to unit length
    ///
    /// Runs before anything is created for the sender, so a malformed
    /// update from an unknown peer leaves no trace in the registry.
    pub fn validate(&mut self, update: &TransformUpdate) -> Result<()> {
        if rotation_within_tolerance(update.rotation, self.normalization_tolerance) {
            return Ok(());
        }
        let norm = update.rotation.length();
        self.stats.rejected_normalization += 1;
        log::warn!(
            "dropping update {} from {}: rotation norm {} outside tolerance",
            update.sequence,
            update.peer,
            norm
        );
        Err(cubeshare_core::Error::Normalization {
            peer: update.peer,
            norm,
        }
        .into())
    }

    /// Validate `update` and write it into `entry`
    ///
    /// Rejected updates leave the entry at its last known-good transform:
    /// - `Error::EntryMismatch` when the update belongs to another peer
    /// - `Error::Core(Normalization)` when `| |q| - 1 |` exceeds the tolerance
    /// - `Error::Stale` when ordering is enforced and the sequence is not newer
    pub fn apply_remote<H: Representation>(
        &mut self,
        entry: &mut PeerEntry<H>,
        update: &TransformUpdate,
    ) -> Result<()> {
        if update.peer != entry.id() {
            log::error!("update from {} handed to the entry of {}", update.peer, entry.id());
            return Err(Error::EntryMismatch {
                entry: entry.id(),
                update: update.peer,
            });
        }

        self.validate(update)?;

        if self.enforce_ordering {
            if let Some(last) = entry.last_sequence() {
                if !sequence_greater_than(update.sequence, last) {
                    self.stats.rejected_stale += 1;
                    log::debug!(
                        "dropping stale update {} for {} (last applied {})",
                        update.sequence,
                        entry.id(),
                        last
                    );
                    return Err(Error::Stale {
                        peer: entry.id(),
                        sequence: update.sequence,
                        last,
                    });
                }
            }
        }

        entry.record_update(update.transform(), Some(update.sequence));
        self.stats.applied += 1;
        Ok(())
    }

    /// Encode the local peer's transform for broadcast
    pub fn encode(
        &self,
        local_peer: PeerId,
        sequence: u16,
        transform: &ReplicatedTransform,
    ) -> Result<Vec<u8>> {
        codec::encode_transform(&TransformUpdate::new(local_peer, sequence, transform))
    }

    /// Decode an inbound transform update
    pub fn decode(&self, bytes: &[u8]) -> Result<TransformUpdate> {
        codec::decode_transform(bytes, self.max_message_len)
    }

    /// Largest inbound payload accepted
    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }

    /// Applied and rejected update counters
    pub fn stats(&self) -> ReplicationStats {
        self.stats
    }
}

impl Default for TransformReplicator {
    fn default() -> Self {
        Self::new()
    }
}
