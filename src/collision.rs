//! Raycast hit data and ground reference frames.

use bevy::prelude::*;

/// Information about a raycast collision.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionData {
    /// Distance from the ray origin to the hit point.
    pub distance: f32,
    /// Normal of the surface at hit point.
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if any).
    pub entity: Option<Entity>,
}

impl CollisionData {
    /// Create a collision result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }
}

/// World placement of an object a character stands on or holds onto.
///
/// Reach targets anchored to a frame stay attached to the object when it
/// moves between ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundFrame {
    /// The object this frame belongs to.
    pub entity: Entity,
    /// World translation of the object.
    pub translation: Vec3,
    /// World rotation of the object.
    pub rotation: Quat,
}

impl GroundFrame {
    /// Create a frame from an object's placement.
    pub fn new(entity: Entity, translation: Vec3, rotation: Quat) -> Self {
        Self {
            entity,
            translation,
            rotation,
        }
    }

    /// Create a frame from a global transform.
    pub fn from_global(entity: Entity, transform: &GlobalTransform) -> Self {
        let (_, rotation, translation) = transform.to_scale_rotation_translation();
        Self::new(entity, translation, rotation)
    }

    /// Convert a world point into this frame's local space.
    #[inline]
    pub fn to_local_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.translation)
    }

    /// Convert a local point into world space.
    #[inline]
    pub fn to_world_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * point
    }

    /// Convert a local direction into world space.
    #[inline]
    pub fn to_world_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_data_new() {
        let entity = Entity::from_raw(42);
        let hit = CollisionData::new(3.0, Vec3::Y, Vec3::new(1.0, 0.0, 2.0), Some(entity));

        assert_eq!(hit.distance, 3.0);
        assert_eq!(hit.normal, Vec3::Y);
        assert_eq!(hit.point, Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(hit.entity, Some(entity));
    }

    #[test]
    fn ground_frame_round_trips_points() {
        let frame = GroundFrame::new(
            Entity::from_raw(1),
            Vec3::new(5.0, 1.0, 0.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let world = Vec3::new(6.0, 2.0, -3.0);
        let back = frame.to_world_point(frame.to_local_point(world));
        assert!((back - world).length() < 1e-5);
    }

    #[test]
    fn ground_frame_rotates_vectors() {
        let frame = GroundFrame::new(
            Entity::from_raw(1),
            Vec3::ZERO,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        // +X turned a quarter around +Y points along -Z.
        let v = frame.to_world_vector(Vec3::X);
        assert!((v - Vec3::NEG_Z).length() < 1e-5);
    }
}
