//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement to
//! drive the motion controller: raycasts for the ground probe and edge
//! detection, impulses, kinematic moves and the body toggles motion units
//! flip while traversing. Two backends ship with the crate:
//!
//! - [`HeadlessBackend`]: box geometry in a resource and Transform-based
//!   bodies. No physics engine required; used by tests and servers.
//! - `Rapier3dBackend` (feature `rapier3d`): bevy_rapier3d bodies and colliders.

use std::marker::PhantomData;

use bevy::prelude::*;

use crate::collision::{CollisionData, GroundFrame};
use crate::config::{BodyConfig, CharacterBody};
use crate::detection::{GeometryProbe, StaticGeometry};
use crate::MotionControllerSet;

/// Trait for physics backend implementations.
///
/// All methods are static and take the ECS world, so the controller systems
/// can call them from exclusive systems while the controller's own
/// components are checked out.
pub trait MotionBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Cast a ray and return the closest hit.
    ///
    /// # Arguments
    /// * `world` - The ECS world for queries
    /// * `origin` - Ray origin in world space
    /// * `direction` - Cast direction (normalized)
    /// * `max_distance` - Maximum cast distance
    /// * `exclude_entity` - Entity to exclude from the cast (usually self)
    /// * `collision_groups` - Optional collision groups for filtering (memberships, filters)
    fn raycast(
        world: &World,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude_entity: Entity,
        collision_groups: Option<(u32, u32)>,
    ) -> Option<CollisionData>;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Apply an impulse (an instantaneous velocity change) to an entity.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3);

    /// Enable or disable gravity for an entity.
    ///
    /// Called every tick with the body's current flag. Re-enabling restores
    /// whatever gravity the entity had before it was disabled.
    fn set_gravity_enabled(world: &mut World, entity: Entity, enabled: bool);

    /// Enable or disable collision response for an entity.
    fn set_collision_enabled(world: &mut World, entity: Entity, enabled: bool);

    /// Displace and turn an entity kinematically.
    fn move_character(world: &mut World, entity: Entity, translation: Vec3, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation += translation;
            transform.rotation = (rotation * transform.rotation).normalize();
        }
    }

    /// Get the current position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }

    /// Get the current rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .or_else(|| {
                world
                    .get::<GlobalTransform>(entity)
                    .map(|t| t.to_scale_rotation_translation().1)
            })
            .unwrap_or(Quat::IDENTITY)
    }

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }

    /// Whether an entity still exists.
    fn is_alive(world: &World, entity: Entity) -> bool {
        world.get_entity(entity).is_ok()
    }

    /// Current placement of an entity, for anchoring to moving ground.
    fn frame(world: &World, entity: Entity) -> Option<GroundFrame> {
        world
            .get::<GlobalTransform>(entity)
            .map(|t| GroundFrame::from_global(entity, t))
    }

    /// Get the collision groups for an entity (memberships, filters).
    /// Returns None if the entity doesn't have collision groups.
    fn get_collision_groups(_world: &World, _entity: Entity) -> Option<(u32, u32)> {
        None
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}

/// [`GeometryProbe`] view of a backend for one character.
///
/// Built by the controller systems around each tick; casts exclude the
/// character itself and honour its collision groups.
pub struct BackendProbe<'w, B: MotionBackend> {
    world: &'w World,
    entity: Entity,
    collision_groups: Option<(u32, u32)>,
    _backend: PhantomData<fn() -> B>,
}

impl<'w, B: MotionBackend> BackendProbe<'w, B> {
    /// Create a probe casting on behalf of `entity`.
    pub fn new(world: &'w World, entity: Entity, collision_groups: Option<(u32, u32)>) -> Self {
        Self {
            world,
            entity,
            collision_groups,
            _backend: PhantomData,
        }
    }
}

impl<B: MotionBackend> GeometryProbe for BackendProbe<'_, B> {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData> {
        B::raycast(
            self.world,
            origin,
            direction,
            max_distance,
            self.entity,
            self.collision_groups,
        )
    }

    fn is_alive(&self, entity: Entity) -> bool {
        B::is_alive(self.world, entity)
    }

    fn frame(&self, entity: Entity) -> Option<GroundFrame> {
        B::frame(self.world, entity)
    }
}

// === Headless backend ===

/// Backend over [`StaticGeometry`] with Transform-driven bodies.
///
/// Velocity lives on [`CharacterBody::velocity`]. After the controller has
/// applied its output, the backend integrates gravity and velocity and,
/// while collision is enabled, keeps the feet out of the geometry.
pub struct HeadlessBackend;

impl MotionBackend for HeadlessBackend {
    fn plugin() -> impl Plugin {
        HeadlessBackendPlugin
    }

    fn raycast(
        world: &World,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude_entity: Entity,
        _collision_groups: Option<(u32, u32)>,
    ) -> Option<CollisionData> {
        world
            .get_resource::<StaticGeometry>()?
            .cast(origin, direction, max_distance, Some(exclude_entity))
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<CharacterBody>(entity)
            .map(|b| b.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut body) = world.get_mut::<CharacterBody>(entity) {
            body.velocity += impulse;
        }
    }

    fn set_gravity_enabled(world: &mut World, entity: Entity, enabled: bool) {
        if let Some(mut body) = world.get_mut::<CharacterBody>(entity) {
            body.gravity_enabled = enabled;
        }
    }

    fn set_collision_enabled(world: &mut World, entity: Entity, enabled: bool) {
        if let Some(mut body) = world.get_mut::<CharacterBody>(entity) {
            body.collision_enabled = enabled;
        }
    }

    fn is_alive(world: &World, entity: Entity) -> bool {
        world.get_entity(entity).is_ok()
            || world
                .get_resource::<StaticGeometry>()
                .is_some_and(|g| g.is_alive(entity))
    }

    fn frame(world: &World, entity: Entity) -> Option<GroundFrame> {
        world
            .get::<GlobalTransform>(entity)
            .map(|t| GroundFrame::from_global(entity, t))
            .or_else(|| world.get_resource::<StaticGeometry>()?.frame(entity))
    }
}

/// Plugin that sets up the headless backend.
pub struct HeadlessBackendPlugin;

impl Plugin for HeadlessBackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StaticGeometry>();
        app.register_type::<StaticGeometry>();
        app.add_systems(
            FixedUpdate,
            integrate_headless_bodies.after(MotionControllerSet::Application),
        );
    }
}

/// Integrate gravity and velocity for headless bodies and resolve ground penetration.
pub fn integrate_headless_bodies(
    time: Res<Time<Fixed>>,
    geometry: Res<StaticGeometry>,
    mut q_bodies: Query<(Entity, &mut Transform, &mut CharacterBody, &BodyConfig)>,
) {
    let dt = Some(time.delta_secs()).filter(|&d| d > 0.0).unwrap_or(1.0 / 60.0);

    for (entity, mut transform, mut body, config) in &mut q_bodies {
        if body.gravity_enabled && !body.grounded {
            let gravity = body.gravity;
            body.velocity += gravity * dt;
        }
        // Supported bodies do not sink into the floor.
        if body.gravity_enabled && body.grounded && body.vertical_speed() < 0.0 {
            let up = body.up;
            let vertical = body.vertical_speed();
            body.velocity -= up * vertical;
        }

        transform.translation += body.velocity * dt;

        if !body.collision_enabled || !body.fix_ground_penetration {
            continue;
        }
        let up = body.up;
        let origin = transform.translation + up * config.ground_probe_offset;
        let Some(hit) = geometry.cast(origin, -up, config.ground_probe_offset, Some(entity)) else {
            continue;
        };
        // Feet below the surface: lift them out and stop the descent.
        let depth = config.ground_probe_offset - hit.distance;
        if depth > 0.0 {
            transform.translation += up * depth;
            if body.vertical_speed() < 0.0 {
                let vertical = body.vertical_speed();
                body.velocity -= up * vertical;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::StaticBox;

    fn world_with_floor() -> World {
        let mut world = World::new();
        world.insert_resource(
            StaticGeometry::new()
                .with_box(StaticBox::new(Vec3::new(0.0, -0.5, 0.0), Vec3::new(20.0, 0.5, 20.0))),
        );
        world
    }

    #[test]
    fn headless_raycast_excludes_the_caster() {
        let mut world = world_with_floor();
        let entity = world.spawn(Transform::default()).id();
        let hit = HeadlessBackend::raycast(&world, Vec3::Y, Vec3::NEG_Y, 5.0, entity, None).unwrap();
        assert!((hit.distance - 1.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::Y);
    }

    #[test]
    fn headless_velocity_lives_on_the_body() {
        let mut world = world_with_floor();
        let entity = world.spawn(CharacterBody::default()).id();
        HeadlessBackend::apply_impulse(&mut world, entity, Vec3::Y * 3.0);
        assert_eq!(HeadlessBackend::get_velocity(&world, entity), Vec3::Y * 3.0);

        HeadlessBackend::set_gravity_enabled(&mut world, entity, false);
        assert!(!world.get::<CharacterBody>(entity).unwrap().gravity_enabled);
    }

    #[test]
    fn default_move_turns_and_translates_the_transform() {
        let mut world = World::new();
        let entity = world.spawn(Transform::default()).id();
        HeadlessBackend::move_character(&mut world, entity, Vec3::X, Quat::from_rotation_y(0.5));
        let transform = world.get::<Transform>(entity).unwrap();
        assert_eq!(transform.translation, Vec3::X);
        assert!(transform.rotation.angle_between(Quat::from_rotation_y(0.5)) < 1e-5);
    }

    #[test]
    fn probe_view_forwards_to_the_backend() {
        let mut world = world_with_floor();
        let entity = world.spawn(Transform::default()).id();
        let probe = BackendProbe::<HeadlessBackend>::new(&world, entity, None);
        assert!(probe.raycast(Vec3::Y, Vec3::NEG_Y, 5.0).is_some());
        assert!(probe.is_alive(entity));
        assert!(!probe.is_alive(Entity::from_raw(4040)));
    }
}
