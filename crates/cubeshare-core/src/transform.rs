//! Replicated transforms and the shared reference frame
//!
//! Every replicated pose is expressed in the local space of a shared
//! reference frame, never in world space. Two peers that place the frame at
//! different world poses still agree on where each peer is relative to it.

use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Check whether a quaternion is within `tolerance` of unit length
///
/// Non-finite quaternions are never within tolerance.
pub fn rotation_within_tolerance(rotation: Quat, tolerance: f32) -> bool {
    let norm = rotation.length();
    norm.is_finite() && (norm - 1.0).abs() <= tolerance
}

/// Normalize a quaternion, falling back to identity when it has no direction
fn normalize_or_identity(rotation: Quat) -> Quat {
    let norm = rotation.length();
    if norm.is_finite() && norm > f32::EPSILON {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    }
}

/// A position and orientation in reference-frame local space
///
/// The rotation is normalized on construction, so a stored or transmitted
/// `ReplicatedTransform` always carries a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformFields")]
pub struct ReplicatedTransform {
    position: Vec3,
    rotation: Quat,
}

/// Deserialized form, normalized on conversion
#[derive(Deserialize)]
struct TransformFields {
    position: Vec3,
    rotation: Quat,
}

impl From<TransformFields> for ReplicatedTransform {
    fn from(fields: TransformFields) -> Self {
        Self::new(fields.position, fields.rotation)
    }
}

impl ReplicatedTransform {
    /// Create a transform, normalizing the rotation
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation: normalize_or_identity(rotation),
        }
    }

    /// The transform at the frame origin with no rotation
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    /// Create a transform with only a translation
    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Local-space position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Local-space rotation (unit length)
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Compare two transforms within an absolute tolerance
    ///
    /// `q` and `-q` describe the same orientation and compare equal.
    pub fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        self.position.abs_diff_eq(other.position, tolerance)
            && (self.rotation.abs_diff_eq(other.rotation, tolerance)
                || self.rotation.abs_diff_eq(-other.rotation, tolerance))
    }
}

impl Default for ReplicatedTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// The transform all replicated poses are relative to
///
/// Scale components must be non-zero for the frame to be invertible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "FrameFields")]
pub struct ReferenceFrame {
    /// World-space position of the frame origin
    pub position: Vec3,
    /// World-space orientation of the frame
    pub rotation: Quat,
    /// Scale of the frame
    pub scale: Vec3,
}

#[derive(Deserialize)]
struct FrameFields {
    position: Vec3,
    rotation: Quat,
    #[serde(default = "unit_scale")]
    scale: Vec3,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl From<FrameFields> for ReferenceFrame {
    fn from(fields: FrameFields) -> Self {
        Self::new(fields.position, fields.rotation).with_scale(fields.scale)
    }
}

impl ReferenceFrame {
    /// Create a frame with unit scale
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation: normalize_or_identity(rotation),
            scale: Vec3::ONE,
        }
    }

    /// The frame that coincides with world space
    pub fn identity() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }

    /// A frame translated from world origin, with no rotation
    pub fn from_translation(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Set the frame's scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    fn to_affine(self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Convert a world-space point into frame-local space
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.to_affine().inverse().transform_point3(world)
    }

    /// Convert a frame-local point into world space
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.to_affine().transform_point3(local)
    }

    /// Convert a world-space rotation into frame-local space
    pub fn inverse_transform_rotation(&self, world: Quat) -> Quat {
        self.rotation.inverse() * world
    }
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self::identity()
    }
}
