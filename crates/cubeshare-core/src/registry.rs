//! Registry of remote peers and their representational objects

use crate::{
    Error, PeerId, ReplicatedTransform, ReplicationConfig, Representation, RepresentationFactory,
    Result,
};
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::rc::Rc;

/// A registry shared between the session bridge and the host loop
///
/// Hosts run single-threaded, so shared ownership is `Rc<RefCell<_>>`.
pub type SharedRegistry<F> = Rc<RefCell<PeerRegistry<F>>>;

/// State kept for one remote peer
#[derive(Debug)]
pub struct PeerEntry<H> {
    id: PeerId,
    object: H,
    /// Last known-good transform (None until the first update lands)
    transform: Option<ReplicatedTransform>,
    /// Sequence of the last accepted update
    last_sequence: Option<u16>,
    /// Number of accepted updates
    updates: u64,
}

impl<H> PeerEntry<H> {
    fn new(id: PeerId, object: H) -> Self {
        Self {
            id,
            object,
            transform: None,
            last_sequence: None,
            updates: 0,
        }
    }

    /// Peer this entry belongs to
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Representational object owned by this entry
    pub fn object(&self) -> &H {
        &self.object
    }

    /// Last known-good transform
    pub fn transform(&self) -> Option<&ReplicatedTransform> {
        self.transform.as_ref()
    }

    /// Sequence of the last accepted update
    pub fn last_sequence(&self) -> Option<u16> {
        self.last_sequence
    }

    /// Number of accepted updates
    pub fn update_count(&self) -> u64 {
        self.updates
    }
}

impl<H: Representation> PeerEntry<H> {
    /// Store an accepted transform and forward it to the object
    ///
    /// Validation and ordering are the replicator's job; this only records
    /// the result.
    pub fn record_update(&mut self, transform: ReplicatedTransform, sequence: Option<u16>) {
        self.object.set_local_position(transform.position());
        self.object.set_local_rotation(transform.rotation());
        self.transform = Some(transform);
        if sequence.is_some() {
            self.last_sequence = sequence;
        }
        self.updates += 1;
    }
}

/// Counters for registry anomalies and lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Entries created
    pub created: u64,
    /// Entries removed
    pub removed: u64,
    /// Removals for peers with no entry
    pub missing_removals: u64,
    /// Attempts to register the local peer
    pub rejected_local: u64,
    /// Inbound updates refused for departed peers or a closed registry
    pub refused_inbound: u64,
}

/// Owns one [`PeerEntry`] per remote peer
///
/// Iteration follows insertion order. The local peer is never stored.
///
/// Entries come into being two ways: an explicit join ([`get_or_create`])
/// or the first inbound update from a peer ([`admit_inbound`]). Inbound
/// admission is refused for peers that already left and while the registry
/// is closed (no session), so late traffic cannot resurrect an entry.
///
/// [`get_or_create`]: PeerRegistry::get_or_create
/// [`admit_inbound`]: PeerRegistry::admit_inbound
pub struct PeerRegistry<F: RepresentationFactory> {
    local_peer: PeerId,
    factory: F,
    entries: IndexMap<PeerId, PeerEntry<F::Handle>>,
    /// Peers whose leave has been processed in the current session
    departed: IndexSet<PeerId>,
    /// Whether inbound traffic may create entries
    accepting: bool,
    representation_scale: f32,
    stats: RegistryStats,
}

impl<F: RepresentationFactory> PeerRegistry<F> {
    /// Create an empty registry with default configuration
    pub fn new(local_peer: PeerId, factory: F) -> Self {
        Self::with_config(local_peer, factory, &ReplicationConfig::default())
    }

    /// Create an empty registry using `config`
    pub fn with_config(local_peer: PeerId, factory: F, config: &ReplicationConfig) -> Self {
        Self {
            local_peer,
            factory,
            entries: IndexMap::new(),
            departed: IndexSet::new(),
            accepting: true,
            representation_scale: config.representation_scale,
            stats: RegistryStats::default(),
        }
    }

    /// Wrap into a [`SharedRegistry`]
    pub fn into_shared(self) -> SharedRegistry<F> {
        Rc::new(RefCell::new(self))
    }

    /// Get the entry for `id`, creating it (and its object) if absent
    ///
    /// This is the explicit join path: a peer that left earlier is admitted
    /// again. Returns `Error::InvalidPeer` for the local peer.
    pub fn get_or_create(&mut self, id: PeerId) -> Result<&mut PeerEntry<F::Handle>> {
        if id == self.local_peer {
            self.stats.rejected_local += 1;
            log::error!("refusing to register local {} as a remote peer", id);
            return Err(Error::InvalidPeer(id));
        }
        self.departed.shift_remove(&id);
        self.create_entry(id)
    }

    /// Get the entry for the sender of an inbound update
    ///
    /// Creates the entry on first sight unless `id` has already left or the
    /// registry is closed, in which case `Error::NotAdmitted` is returned and
    /// nothing is created. Returns `Error::InvalidPeer` for the local peer.
    pub fn admit_inbound(&mut self, id: PeerId) -> Result<&mut PeerEntry<F::Handle>> {
        if id == self.local_peer {
            self.stats.rejected_local += 1;
            log::error!("refusing to register local {} as a remote peer", id);
            return Err(Error::InvalidPeer(id));
        }
        if !self.entries.contains_key(&id) && (!self.accepting || self.departed.contains(&id)) {
            self.stats.refused_inbound += 1;
            log::debug!("refusing inbound update from {} (not a session member)", id);
            return Err(Error::NotAdmitted(id));
        }
        self.create_entry(id)
    }

    fn create_entry(&mut self, id: PeerId) -> Result<&mut PeerEntry<F::Handle>> {
        if !self.entries.contains_key(&id) {
            let object = self.factory.create(id, self.representation_scale);
            self.entries.insert(id, PeerEntry::new(id, object));
            self.stats.created += 1;
            log::debug!("created entry for {} ({} remote peers)", id, self.entries.len());
        }

        self.entries.get_mut(&id).ok_or(Error::NotFound(id))
    }

    /// Remove the entry for `id`, destroying its object
    ///
    /// A missing entry is reported as `Error::NotFound` and counted; the
    /// registry is left untouched, so repeated removals are harmless.
    /// Either way `id` counts as departed until it joins again.
    pub fn remove(&mut self, id: PeerId) -> Result<()> {
        if id != self.local_peer {
            self.departed.insert(id);
        }
        match self.entries.shift_remove(&id) {
            Some(entry) => {
                self.factory.destroy(id, entry.object);
                self.stats.removed += 1;
                log::debug!("removed entry for {} ({} remote peers)", id, self.entries.len());
                Ok(())
            }
            None => {
                self.stats.missing_removals += 1;
                log::warn!("remove: no entry for {}", id);
                Err(Error::NotFound(id))
            }
        }
    }

    /// Remove every entry, destroying all objects
    pub fn clear(&mut self) {
        for (id, entry) in self.entries.drain(..) {
            self.factory.destroy(id, entry.object);
            self.stats.removed += 1;
        }
    }

    /// Start a session: inbound updates may create entries again
    pub fn open(&mut self) {
        self.accepting = true;
    }

    /// End a session: destroy every entry and refuse inbound creation
    ///
    /// Departure records are dropped too; the next session starts fresh.
    pub fn close(&mut self) {
        self.clear();
        self.departed.clear();
        self.accepting = false;
    }

    /// Whether inbound updates may create entries
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Whether `id` left and has not joined again
    pub fn has_departed(&self, id: PeerId) -> bool {
        self.departed.contains(&id)
    }

    /// Visit every entry in insertion order
    pub fn for_each_entry(&self, mut visit: impl FnMut(&PeerEntry<F::Handle>)) {
        for entry in self.entries.values() {
            visit(entry);
        }
    }

    /// Get an entry
    pub fn get(&self, id: PeerId) -> Option<&PeerEntry<F::Handle>> {
        self.entries.get(&id)
    }

    /// Get a mutable entry
    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut PeerEntry<F::Handle>> {
        self.entries.get_mut(&id)
    }

    /// Check whether `id` has an entry
    pub fn contains(&self, id: PeerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &PeerEntry<F::Handle>> {
        self.entries.values()
    }

    /// Remote peer IDs in insertion order
    pub fn ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.entries.keys().copied()
    }

    /// Number of remote peers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The local peer this registry excludes
    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    /// The factory that owns the representational objects
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Lifecycle and anomaly counters
    pub fn stats(&self) -> RegistryStats {
        self.stats
    }
}

impl<F: RepresentationFactory> Drop for PeerRegistry<F> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessFactory;
    use glam::{Quat, Vec3};

    const LOCAL: PeerId = PeerId(1);

    fn registry() -> PeerRegistry<HeadlessFactory> {
        PeerRegistry::new(LOCAL, HeadlessFactory::new())
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut registry = registry();

        registry.get_or_create(PeerId(42)).unwrap();
        registry.get_or_create(PeerId(42)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.factory().created(), 1);
        assert_eq!(registry.stats().created, 1);
    }

    #[test]
    fn test_join_then_leave_lifecycle() {
        let mut registry = registry();

        let entry = registry.get_or_create(PeerId(42)).unwrap();
        assert_eq!(entry.id(), PeerId(42));
        assert!(entry.transform().is_none());
        assert_eq!(registry.factory().live_count(), 1);

        registry.remove(PeerId(42)).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.factory().live_count(), 0);
        assert_eq!(registry.factory().destroyed(), 1);

        let err = registry.remove(PeerId(42)).unwrap_err();
        assert!(matches!(err, Error::NotFound(PeerId(42))));
        assert_eq!(registry.stats().missing_removals, 1);
    }

    #[test]
    fn test_double_remove_leaves_same_state() {
        let mut registry = registry();
        registry.get_or_create(PeerId(2)).unwrap();
        registry.get_or_create(PeerId(3)).unwrap();

        assert!(registry.remove(PeerId(2)).is_ok());
        let after_first: Vec<_> = registry.ids().collect();

        assert!(registry.remove(PeerId(2)).is_err());
        let after_second: Vec<_> = registry.ids().collect();

        assert_eq!(after_first, after_second);
        assert_eq!(registry.factory().destroyed(), 1);
    }

    #[test]
    fn test_local_peer_rejected() {
        let mut registry = registry();

        let err = registry.get_or_create(LOCAL).unwrap_err();
        assert!(matches!(err, Error::InvalidPeer(id) if id == LOCAL));
        assert!(!registry.contains(LOCAL));
        assert_eq!(registry.factory().created(), 0);
        assert_eq!(registry.stats().rejected_local, 1);

        assert!(matches!(registry.remove(LOCAL), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_for_each_entry_insertion_order() {
        let mut registry = registry();
        for id in [9, 3, 7, 5] {
            registry.get_or_create(PeerId(id)).unwrap();
        }
        registry.remove(PeerId(7)).unwrap();

        let mut visited = Vec::new();
        registry.for_each_entry(|entry| visited.push(entry.id().raw()));
        assert_eq!(visited, vec![9, 3, 5]);
    }

    #[test]
    fn test_record_update_forwards_to_object() {
        let mut registry = registry();
        let transform =
            ReplicatedTransform::new(Vec3::new(0.5, 1.0, -2.0), Quat::from_rotation_z(1.0));

        let entry = registry.get_or_create(PeerId(4)).unwrap();
        entry.record_update(transform, Some(10));
        assert_eq!(entry.transform(), Some(&transform));
        assert_eq!(entry.last_sequence(), Some(10));
        assert_eq!(entry.update_count(), 1);

        let pose = registry.factory().pose(PeerId(4)).unwrap();
        assert_eq!(pose.position, transform.position());
        assert_eq!(pose.rotation, transform.rotation());
    }

    #[test]
    fn test_scale_from_config() {
        let config = ReplicationConfig {
            representation_scale: 0.25,
            ..ReplicationConfig::default()
        };
        let mut registry = PeerRegistry::with_config(LOCAL, HeadlessFactory::new(), &config);
        registry.get_or_create(PeerId(2)).unwrap();
        assert_eq!(registry.factory().pose(PeerId(2)).map(|p| p.scale), Some(0.25));
    }

    #[test]
    fn test_departed_peer_not_recreated_by_inbound() {
        let mut registry = registry();
        registry.get_or_create(PeerId(2)).unwrap();
        registry.remove(PeerId(2)).unwrap();
        assert!(registry.has_departed(PeerId(2)));

        let err = registry.admit_inbound(PeerId(2)).unwrap_err();
        assert!(matches!(err, Error::NotAdmitted(PeerId(2))));
        assert!(registry.is_empty());
        assert_eq!(registry.factory().live_count(), 0);
        assert_eq!(registry.stats().refused_inbound, 1);

        // Another peer is still admitted lazily
        assert!(registry.admit_inbound(PeerId(3)).is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_leave_without_entry_still_blocks_inbound() {
        let mut registry = registry();
        assert!(registry.remove(PeerId(5)).is_err());
        assert!(registry.admit_inbound(PeerId(5)).is_err());
        assert!(registry.remove(LOCAL).is_err());
        assert!(!registry.has_departed(LOCAL));
    }

    #[test]
    fn test_rejoin_clears_departure() {
        let mut registry = registry();
        registry.get_or_create(PeerId(2)).unwrap();
        registry.remove(PeerId(2)).unwrap();

        registry.get_or_create(PeerId(2)).unwrap();
        assert!(!registry.has_departed(PeerId(2)));
        registry.remove(PeerId(2)).unwrap();
        registry.get_or_create(PeerId(2)).unwrap();
        assert!(registry.admit_inbound(PeerId(2)).is_ok());
        assert_eq!(registry.factory().created(), 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_closed_registry_refuses_inbound() {
        let mut registry = registry();
        registry.get_or_create(PeerId(2)).unwrap();
        registry.remove(PeerId(2)).unwrap();
        registry.get_or_create(PeerId(3)).unwrap();

        registry.close();
        assert!(!registry.is_accepting());
        assert!(registry.is_empty());
        assert!(!registry.has_departed(PeerId(2)));
        assert!(registry.admit_inbound(PeerId(3)).is_err());
        assert_eq!(registry.factory().live_count(), 0);

        registry.open();
        assert!(registry.admit_inbound(PeerId(2)).is_ok());
        assert!(registry.admit_inbound(PeerId(3)).is_ok());
    }

    #[test]
    fn test_clear_destroys_everything() {
        let mut registry = registry();
        registry.get_or_create(PeerId(2)).unwrap();
        registry.get_or_create(PeerId(3)).unwrap();

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.factory().live_count(), 0);
        assert_eq!(registry.stats().removed, 2);
    }
}
