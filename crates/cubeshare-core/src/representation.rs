//! Representational objects for remote peers
//!
//! The scene layer (renderer, engine node tree, ...) stays outside this
//! workspace. The registry only sees it through [`RepresentationFactory`]
//! and the opaque handles it hands out.

use crate::PeerId;
use glam::{Quat, Vec3};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// An object that visualizes one remote peer
pub trait Representation {
    /// Move the object within the reference frame
    fn set_local_position(&mut self, position: Vec3);

    /// Rotate the object within the reference frame
    fn set_local_rotation(&mut self, rotation: Quat);
}

/// Creates and destroys representational objects
///
/// Implemented by the host's scene layer.
pub trait RepresentationFactory {
    /// Handle type for created objects
    type Handle: Representation;

    /// Create the object for `peer`, parented to the reference frame with a uniform `scale`
    fn create(&mut self, peer: PeerId, scale: f32) -> Self::Handle;

    /// Release the object previously created for `peer`
    fn destroy(&mut self, peer: PeerId, handle: Self::Handle);
}

/// Last pose written to a headless object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

/// Handle produced by [`HeadlessFactory`]
#[derive(Debug)]
pub struct HeadlessObject {
    peer: PeerId,
    pose: Rc<RefCell<ObjectPose>>,
}

impl HeadlessObject {
    /// Peer this object represents
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Current pose of the object
    pub fn pose(&self) -> ObjectPose {
        *self.pose.borrow()
    }
}

impl Representation for HeadlessObject {
    fn set_local_position(&mut self, position: Vec3) {
        self.pose.borrow_mut().position = position;
    }

    fn set_local_rotation(&mut self, rotation: Quat) {
        self.pose.borrow_mut().rotation = rotation;
    }
}

/// Factory for hosts without a scene layer
///
/// Keeps a record of live objects and their last pose, which is what
/// dedicated servers, tools and tests need.
#[derive(Debug, Default)]
pub struct HeadlessFactory {
    live: IndexMap<PeerId, Rc<RefCell<ObjectPose>>>,
    created: u64,
    destroyed: u64,
}

impl HeadlessFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently alive
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Check whether an object for `peer` is alive
    pub fn is_live(&self, peer: PeerId) -> bool {
        self.live.contains_key(&peer)
    }

    /// Pose of the live object for `peer`
    pub fn pose(&self, peer: PeerId) -> Option<ObjectPose> {
        self.live.get(&peer).map(|pose| *pose.borrow())
    }

    /// Total objects ever created
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Total objects ever destroyed
    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }
}

impl RepresentationFactory for HeadlessFactory {
    type Handle = HeadlessObject;

    fn create(&mut self, peer: PeerId, scale: f32) -> HeadlessObject {
        let pose = Rc::new(RefCell::new(ObjectPose {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale,
        }));
        self.live.insert(peer, Rc::clone(&pose));
        self.created += 1;
        HeadlessObject { peer, pose }
    }

    fn destroy(&mut self, peer: PeerId, handle: HeadlessObject) {
        debug_assert_eq!(peer, handle.peer);
        if self.live.shift_remove(&peer).is_some() {
            self.destroyed += 1;
        }
    }
}
