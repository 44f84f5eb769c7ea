//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use std::sync::Mutex;

use bevy::ecs::system::SystemState;
use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;

use crate::backend::MotionBackend;
use crate::collision::CollisionData;

/// Rapier3D physics backend for the motion controller.
///
/// Characters are dynamic rigid bodies with locked rotation: units turn
/// them through the transform, root motion moves them kinematically and
/// jumps go through [`ExternalImpulse`]. Gravity is toggled with
/// [`GravityScale`], collision with [`ColliderDisabled`].
pub struct Rapier3dBackend;

impl MotionBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn raycast(
        world: &World,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude_entity: Entity,
        collision_groups: Option<(u32, u32)>,
    ) -> Option<CollisionData> {
        let query_state = world.get_resource::<RapierQueryState>()?;
        let mut state = query_state.0.lock().ok()?;
        let rapier_context = state.get(world);
        let Ok(context) = rapier_context.single() else {
            return None;
        };

        // Create filter to exclude the casting entity
        let mut filter = QueryFilter::default()
            .exclude_rigid_body(exclude_entity)
            .exclude_sensors();

        // Apply collision groups if provided
        if let Some((memberships, filters)) = collision_groups {
            filter = filter.groups(CollisionGroups::new(
                Group::from_bits_truncate(memberships),
                Group::from_bits_truncate(filters),
            ));
        }

        context
            .cast_ray_and_get_normal(origin, direction, max_distance, true, filter)
            .map(|(hit_entity, hit)| {
                CollisionData::new(hit.time_of_impact, hit.normal, hit.point, Some(hit_entity))
            })
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
        } else if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            // Fallback: apply as velocity change if no ExternalImpulse component
            vel.linvel += impulse;
        }
    }

    fn set_gravity_enabled(world: &mut World, entity: Entity, enabled: bool) {
        let suspended = world.get::<SuspendedGravity>(entity).map(|s| s.0);
        match (enabled, suspended) {
            (true, Some(scale)) => {
                let mut entity_mut = world.entity_mut(entity);
                entity_mut.remove::<SuspendedGravity>();
                entity_mut.insert(GravityScale(scale));
            }
            (false, None) => {
                let scale = world.get::<GravityScale>(entity).map_or(1.0, |g| g.0);
                world
                    .entity_mut(entity)
                    .insert((SuspendedGravity(scale), GravityScale(0.0)));

                // Traversal without gravity is kinematic: drop any fall in progress.
                if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
                    vel.linvel = Vec3::ZERO;
                }
            }
            // Already in the requested state; the body's own scale stays untouched.
            _ => {}
        }
    }

    fn set_collision_enabled(world: &mut World, entity: Entity, enabled: bool) {
        let disabled = world.get::<ColliderDisabled>(entity).is_some();
        if enabled && disabled {
            world.entity_mut(entity).remove::<ColliderDisabled>();
        } else if !enabled && !disabled {
            world.entity_mut(entity).insert(ColliderDisabled);
        }
    }

    fn get_collision_groups(world: &World, entity: Entity) -> Option<(u32, u32)> {
        world
            .get::<CollisionGroups>(entity)
            .map(|cg| (cg.memberships.bits(), cg.filters.bits()))
    }
}

/// Gravity scale in force before a unit suspended gravity.
///
/// Present only while gravity is off; re-enabling restores this scale.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct SuspendedGravity(pub f32);

/// Cached query state for reading the default Rapier context from `&World`.
#[derive(Resource)]
pub struct RapierQueryState(Mutex<SystemState<ReadRapierContext<'static, 'static>>>);

impl FromWorld for RapierQueryState {
    fn from_world(world: &mut World) -> Self {
        Self(Mutex::new(SystemState::new(world)))
    }
}

/// Plugin that sets up Rapier3D-specific state for the motion controller.
///
/// Add `RapierPhysicsPlugin` yourself; this plugin only prepares queries.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RapierQueryState>();
    }
}

/// Bundle for creating a character with Rapier3D physics.
///
/// Provides the Rapier components the backend drives. Add a collider and
/// the [`MotionController`](crate::controller::MotionController) next to it.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_motion_controller::prelude::*;
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 1.0, 0.0),
///         standard_controller().unwrap(),
///         BodyConfig::player(),
///         Rapier3dCharacterBundle::new(),
///         Collider::capsule_y(0.5, 0.3),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `locked_axes`: [`LockedAxes::ROTATION_LOCKED`], the units own the yaw
/// - `damping`: Linear 0.5, Angular 1.0
/// - `gravity_scale`: 1.0, toggled by traversal units
#[derive(Bundle)]
pub struct Rapier3dCharacterBundle {
    /// The rigid body type. Should typically be [`RigidBody::Dynamic`] for characters.
    pub rigid_body: RigidBody,
    /// Current linear and angular velocity. Updated by Rapier each physics step.
    pub velocity: Velocity,
    /// Accumulated impulses applied this frame. Used for jumps.
    pub external_impulse: ExternalImpulse,
    /// Which axes are locked.
    pub locked_axes: LockedAxes,
    /// Damping coefficients for velocity reduction.
    pub damping: Damping,
    /// Gravity multiplier, zero while a unit suspends gravity.
    pub gravity_scale: GravityScale,
}

impl Default for Rapier3dCharacterBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Rapier3dCharacterBundle {
    /// Create a character bundle with rotation locked.
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_impulse: ExternalImpulse::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping {
                linear_damping: 0.5,
                angular_damping: 1.0,
            },
            gravity_scale: GravityScale(1.0),
        }
    }

    /// Set the rigid body type for the character.
    ///
    /// [`RigidBody::KinematicPositionBased`] suits characters driven purely by
    /// root motion; gravity and impulses then have no effect.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set the damping coefficients for velocity reduction.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = Damping {
            linear_damping: linear,
            angular_damping: angular,
        };
        self
    }

    /// Set which axes should be locked for the rigid body.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
        app.add_plugins(Rapier3dBackendPlugin);
        app.insert_resource(Time::<Fixed>::from_hz(60.0));
        app
    }

    #[test]
    fn rapier_backend_get_position() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((Transform::from_xyz(1.0, 2.0, 3.0), RigidBody::Fixed))
            .id();

        app.update();

        let pos = Rapier3dBackend::get_position(app.world(), entity);
        assert!((pos - Vec3::new(1.0, 2.0, 3.0)).length() < 0.01);
    }

    #[test]
    fn rapier_backend_impulse_falls_back_to_velocity() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((Transform::default(), RigidBody::Dynamic, Velocity::zero()))
            .id();

        Rapier3dBackend::apply_impulse(app.world_mut(), entity, Vec3::Y * 5.0);

        let vel = Rapier3dBackend::get_velocity(app.world(), entity);
        assert!((vel.y - 5.0).abs() < 0.01);
    }

    #[test]
    fn rapier_backend_toggles_gravity_and_collision() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((
                Transform::default(),
                Rapier3dCharacterBundle::new(),
                Collider::capsule_y(0.5, 0.3),
            ))
            .id();
        app.world_mut().get_mut::<Velocity>(entity).unwrap().linvel = Vec3::NEG_Y * 2.0;

        Rapier3dBackend::set_gravity_enabled(app.world_mut(), entity, false);
        Rapier3dBackend::set_collision_enabled(app.world_mut(), entity, false);
        assert_eq!(app.world().get::<GravityScale>(entity).unwrap().0, 0.0);
        assert_eq!(Rapier3dBackend::get_velocity(app.world(), entity), Vec3::ZERO);
        assert!(app.world().get::<ColliderDisabled>(entity).is_some());

        Rapier3dBackend::set_gravity_enabled(app.world_mut(), entity, true);
        Rapier3dBackend::set_collision_enabled(app.world_mut(), entity, true);
        assert_eq!(app.world().get::<GravityScale>(entity).unwrap().0, 1.0);
        assert!(app.world().get::<SuspendedGravity>(entity).is_none());
        assert!(app.world().get::<ColliderDisabled>(entity).is_none());
    }

    #[test]
    fn rapier_backend_restores_a_custom_gravity_scale() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((Transform::default(), RigidBody::Dynamic, Velocity::zero(), GravityScale(2.5)))
            .id();

        // Re-asserting an enabled body every tick leaves its scale alone.
        Rapier3dBackend::set_gravity_enabled(app.world_mut(), entity, true);
        assert_eq!(app.world().get::<GravityScale>(entity).unwrap().0, 2.5);

        Rapier3dBackend::set_gravity_enabled(app.world_mut(), entity, false);
        Rapier3dBackend::set_gravity_enabled(app.world_mut(), entity, false);
        assert_eq!(app.world().get::<GravityScale>(entity).unwrap().0, 0.0);
        assert_eq!(app.world().get::<SuspendedGravity>(entity), Some(&SuspendedGravity(2.5)));

        Rapier3dBackend::set_gravity_enabled(app.world_mut(), entity, true);
        assert_eq!(app.world().get::<GravityScale>(entity).unwrap().0, 2.5);
        assert!(app.world().get::<SuspendedGravity>(entity).is_none());
    }

    #[test]
    fn rapier_backend_raycast_hits_the_floor() {
        let mut app = create_test_app();

        let floor = app
            .world_mut()
            .spawn((Transform::from_xyz(0.0, -0.5, 0.0), Collider::cuboid(10.0, 0.5, 10.0)))
            .id();
        let character = app
            .world_mut()
            .spawn((
                Transform::from_xyz(0.0, 1.0, 0.0),
                Rapier3dCharacterBundle::new(),
                Collider::capsule_y(0.5, 0.3),
            ))
            .id();

        app.update();
        app.update();

        let hit = Rapier3dBackend::raycast(app.world(), Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Y, 5.0, character, None)
            .expect("floor below the character");
        assert_eq!(hit.entity, Some(floor));
        assert!(hit.normal.dot(Vec3::Y) > 0.99);
    }
}
