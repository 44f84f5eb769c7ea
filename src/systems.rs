//! Core controller systems.
//!
//! These systems feed the motion units with sensor data, run arbitration
//! and apply the result through the physics backend. They are generic over
//! the backend so different physics engines can be used.
//!
//! Arbitration runs in exclusive systems: a unit may raycast the world
//! while it mutates the character's own components, so those components are
//! checked out of the entity for the duration of the call and written back
//! afterwards.

use bevy::prelude::*;

use crate::animator::{AnimatorRegistry, MotionAnimator};
use crate::backend::{BackendProbe, MotionBackend};
use crate::camera::{CameraFrame, MotionCamera};
use crate::config::{BodyConfig, CharacterBody};
use crate::controller::{MotionConfigError, MotionController, RootMotion};
use crate::intent::MotionInput;
use crate::motion::MotionContext;
use crate::state::{ActiveMotions, Airborne, Grounded};

/// Index of the fixed sub-step within the current rendered frame.
///
/// Reset in `First`, advanced at the start of every fixed tick, so the first
/// authoritative sub-step of a frame has index 1. Units use it to apply
/// one-shot effects once per frame.
#[derive(Resource, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Resource)]
pub struct MotionTick {
    index: u32,
}

impl MotionTick {
    /// Current sub-step index. Zero before the first fixed tick of a frame.
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Start a new rendered frame.
pub fn begin_motion_frame(mut tick: ResMut<MotionTick>) {
    tick.index = 0;
}

/// Count one fixed sub-step.
pub fn advance_motion_tick(mut tick: ResMut<MotionTick>) {
    tick.index = tick.index.saturating_add(1);
}

/// Latch press and release edges of every controlled character's actions.
pub fn update_motion_input(mut q_inputs: Query<&mut MotionInput, With<MotionController>>) {
    for mut input in &mut q_inputs {
        input.update_edges();
    }
}

/// Refresh the body snapshot and cast the ground probe.
///
/// The ray starts `ground_probe_offset` above the feet so a body sunk
/// slightly into the floor still finds it; the reported distance is
/// measured from the feet and may be negative.
pub fn update_character_body<B: MotionBackend>(world: &mut World) {
    let entities: Vec<(Entity, BodyConfig, Vec3, Option<Entity>)> = world
        .query_filtered::<(Entity, &BodyConfig, &CharacterBody), With<MotionController>>()
        .iter(world)
        .map(|(e, config, body)| (e, *config, body.up, body.ground_override))
        .collect();

    let dt = B::get_fixed_timestep(world);

    for (entity, config, up, ground_override) in entities {
        let position = B::get_position(world, entity);
        let rotation = B::get_rotation(world, entity);
        let velocity = B::get_velocity(world, entity);
        let groups = config
            .collision_groups
            .or_else(|| B::get_collision_groups(world, entity));

        let origin = position + up * config.ground_probe_offset;
        let hit = B::raycast(world, origin, -up, config.probe_length(), entity, groups).map(|mut hit| {
            hit.distance -= config.ground_probe_offset;
            hit
        });
        let ground_frame = ground_override
            .or_else(|| hit.and_then(|h| h.entity))
            .and_then(|ground| B::frame(world, ground));

        let Some(mut body) = world.get_mut::<CharacterBody>(entity) else {
            continue;
        };
        body.position = position;
        body.rotation = rotation;
        body.velocity = velocity;
        body.update_ground(hit, &config, dt);
        body.ground_frame = ground_frame;
    }
}

/// Run `f` with a [`MotionContext`] assembled from the entity's components.
///
/// Returns `None` when the entity lacks one of the controller components.
fn with_motion_context<B: MotionBackend, R>(
    world: &mut World,
    entity: Entity,
    f: impl FnOnce(&mut MotionController, &mut MotionContext<'_>) -> R,
) -> Option<R> {
    let groups = world
        .get::<BodyConfig>(entity)
        .and_then(|c| c.collision_groups)
        .or_else(|| B::get_collision_groups(world, entity));

    let (mut controller, mut body, mut animator, mut camera, input) = {
        let mut query = world.query::<(
            &mut MotionController,
            &mut CharacterBody,
            &mut MotionAnimator,
            &mut MotionCamera,
            &MotionInput,
        )>();
        let (mut controller, mut body, mut animator, mut camera, input) = query.get_mut(world, entity).ok()?;
        (
            std::mem::take(&mut *controller),
            std::mem::take(&mut *body),
            std::mem::take(&mut *animator),
            std::mem::take(&mut *camera),
            input.clone(),
        )
    };

    let result = {
        let probe = BackendProbe::<B>::new(world, entity, groups);
        let mut ctx = MotionContext::new(&mut body, &mut animator, &input, &probe, &mut camera);
        f(&mut controller, &mut ctx)
    };

    if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
        entity_mut.insert((controller, body, animator, camera));
    }
    Some(result)
}

/// Load animator data on first run, then arbitrate every layer.
///
/// A controller without an [`AnimatorRegistry`] gets one that declares
/// paths on first use, with one animator layer per motion layer. A load
/// failure parks the controller behind a [`MotionConfigError`].
pub fn run_motion_controllers<B: MotionBackend>(world: &mut World) {
    let unloaded: Vec<Entity> = world
        .query_filtered::<(Entity, &MotionController), Without<MotionConfigError>>()
        .iter(world)
        .filter(|(_, controller)| !controller.is_loaded())
        .map(|(e, _)| e)
        .collect();

    for entity in unloaded {
        load_controller(world, entity);
    }

    let tick = world.get_resource::<MotionTick>().map(MotionTick::index).unwrap_or(1);
    let dt = B::get_fixed_timestep(world);

    let entities: Vec<Entity> = world
        .query_filtered::<(Entity, &MotionController), Without<MotionConfigError>>()
        .iter(world)
        .filter(|(_, controller)| controller.is_loaded())
        .map(|(e, _)| e)
        .collect();

    for entity in entities {
        with_motion_context::<B, _>(world, entity, |controller, ctx| controller.tick(ctx, dt, tick));
    }
}

fn load_controller(world: &mut World, entity: Entity) {
    if world.get::<AnimatorRegistry>(entity).is_none() {
        let Some(controller) = world.get::<MotionController>(entity) else {
            return;
        };
        let mut registry = AnimatorRegistry::auto_declare();
        for layer in controller.layers() {
            registry.add_layer(layer.name());
        }
        debug!("no animator registry on {entity}, declaring animator states on first use");
        world.entity_mut(entity).insert(registry);
    }

    let result = {
        let mut query = world.query::<(&mut MotionController, &mut AnimatorRegistry)>();
        let Ok((mut controller, mut registry)) = query.get_mut(world, entity) else {
            return;
        };
        controller.load_animator_data(&mut registry)
    };

    if let Err(err) = result {
        error!("motion controller on {entity} failed to load animator data: {err}");
        world.entity_mut(entity).insert(MotionConfigError(err));
    }
}

/// Adjust root motion, add unit outputs and move the character.
///
/// The world-space displacement of a tick is the adjusted root motion
/// rotated into world space, plus unit movement, plus unit velocity times
/// the timestep. Impulses and the body toggles are flushed afterwards.
pub fn apply_motion_output<B: MotionBackend>(world: &mut World) {
    let entities: Vec<Entity> = world
        .query_filtered::<(Entity, &MotionController), Without<MotionConfigError>>()
        .iter(world)
        .filter(|(_, controller)| controller.is_loaded())
        .map(|(e, _)| e)
        .collect();

    let tick = world.get_resource::<MotionTick>().map(MotionTick::index).unwrap_or(1);
    let dt = B::get_fixed_timestep(world);

    for entity in entities {
        let (root_movement, root_rotation) = world
            .get_mut::<RootMotion>(entity)
            .map(|mut root| root.take())
            .unwrap_or((Vec3::ZERO, Quat::IDENTITY));

        let Some((movement, rotation, output)) = with_motion_context::<B, _>(world, entity, |controller, ctx| {
            let mut movement = root_movement;
            let mut rotation = root_rotation;
            controller.adjust_root_motion(ctx, dt, tick, &mut movement, &mut rotation);
            (movement, rotation, controller.output())
        }) else {
            continue;
        };

        let Some(body) = world.get::<CharacterBody>(entity) else {
            continue;
        };
        let translation = body.rotation * movement + output.movement + output.velocity * dt;
        let turn = output.rotation * rotation * Quat::from_scaled_axis(output.angular_velocity * dt);
        let gravity_enabled = body.gravity_enabled;
        let collision_enabled = body.collision_enabled;

        if translation != Vec3::ZERO || turn != Quat::IDENTITY {
            B::move_character(world, entity, translation, turn);
        }

        let position = B::get_position(world, entity);
        let rotation = B::get_rotation(world, entity);
        let impulse = match world.get_mut::<CharacterBody>(entity) {
            Some(mut body) => {
                body.position = position;
                body.rotation = rotation;
                body.take_impulse()
            }
            None => Vec3::ZERO,
        };
        if impulse != Vec3::ZERO {
            B::apply_impulse(world, entity, impulse);
        }

        B::set_gravity_enabled(world, entity, gravity_enabled);
        B::set_collision_enabled(world, entity, collision_enabled);
    }
}

/// Synchronize state marker components with the controller state.
///
/// Adds/removes [`Grounded`] and [`Airborne`] and refreshes
/// [`ActiveMotions`].
pub fn sync_state_markers(
    mut commands: Commands,
    mut q_controllers: Query<(
        Entity,
        &MotionController,
        &CharacterBody,
        &mut ActiveMotions,
        Has<Grounded>,
        Has<Airborne>,
    )>,
) {
    for (entity, controller, body, mut active, has_grounded, has_airborne) in &mut q_controllers {
        // Sync Grounded/Airborne
        if body.grounded && !has_grounded {
            commands.entity(entity).insert(Grounded);
            commands.entity(entity).remove::<Airborne>();
        } else if !body.grounded && has_grounded {
            commands.entity(entity).remove::<Grounded>();
            commands.entity(entity).insert(Airborne);
        } else if !body.grounded && !has_airborne && !has_grounded {
            commands.entity(entity).insert(Airborne);
        }

        let names = controller.active_names();
        if active.names != names {
            active.names = names;
        }
    }
}

/// Deliver the camera post-update to subscribed units.
///
/// Runs once per rendered frame after the camera rig moved and before
/// transforms propagate, so yaw corrections show in the same frame.
pub fn dispatch_camera_hooks<B: MotionBackend>(world: &mut World) {
    let frames: Vec<(Entity, CameraFrame)> = world
        .query_filtered::<(Entity, &MotionController, &MotionCamera, &CharacterBody), Without<MotionConfigError>>()
        .iter(world)
        .filter(|(_, controller, camera, _)| controller.is_loaded() && !camera.listeners().is_empty())
        .map(|(e, _, camera, body)| {
            (
                e,
                CameraFrame {
                    forward: camera.forward,
                    up: body.up,
                },
            )
        })
        .collect();

    let dt = world.get_resource::<Time>().map(|t| t.delta_secs()).unwrap_or(0.0);

    for (entity, frame) in frames {
        let rotation = B::get_rotation(world, entity);
        if let Some(mut body) = world.get_mut::<CharacterBody>(entity) {
            body.rotation = rotation;
        }

        let Some(turn) = with_motion_context::<B, _>(world, entity, |controller, ctx| {
            controller.camera_updated(ctx, &frame, dt)
        }) else {
            continue;
        };
        if turn != Quat::IDENTITY {
            B::move_character(world, entity, Vec3::ZERO, turn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    use crate::backend::HeadlessBackend;
    use crate::detection::{StaticBox, StaticGeometry};
    use crate::test_support::Scripted;

    fn floor() -> StaticGeometry {
        StaticGeometry::new().with_box(StaticBox::new(Vec3::new(0.0, -0.5, 0.0), Vec3::new(20.0, 0.5, 20.0)))
    }

    fn scripted_controller(motion: Scripted) -> MotionController {
        let mut controller = MotionController::new();
        let base = controller.add_layer("Base Layer");
        controller.add_motion(base, Box::new(motion)).unwrap();
        controller
    }

    #[test]
    fn ground_probe_measures_from_the_feet() {
        let mut world = World::new();
        world.insert_resource(floor());
        let entity = world
            .spawn((MotionController::new(), Transform::from_xyz(0.0, 0.05, 0.0)))
            .id();

        update_character_body::<HeadlessBackend>(&mut world);

        let body = world.get::<CharacterBody>(entity).unwrap();
        assert!((body.ground_distance() - 0.05).abs() < 1e-5);
        assert!(body.grounded);
        assert_eq!(body.position, Vec3::new(0.0, 0.05, 0.0));
    }

    #[test]
    fn missing_registry_is_declared_on_first_use() {
        let mut world = World::new();
        world.insert_resource(floor());
        let script = Scripted::new("wave", 3).activates(true);
        let probe = script.probe();
        let entity = world.spawn(scripted_controller(script)).id();

        run_motion_controllers::<HeadlessBackend>(&mut world);

        assert!(world.get::<AnimatorRegistry>(entity).is_some());
        assert!(world.get::<MotionController>(entity).unwrap().is_loaded());
        assert_eq!(probe.get().activations, 1);
    }

    #[test]
    fn strict_registry_failure_parks_the_controller() {
        let mut world = World::new();
        world.insert_resource(floor());
        let mut controller = MotionController::new();
        let base = controller.add_layer("Base Layer");
        controller
            .add_motion(base, Box::new(crate::motions::Idle::default()))
            .unwrap();
        let entity = world.spawn((controller, AnimatorRegistry::new())).id();

        run_motion_controllers::<HeadlessBackend>(&mut world);

        assert!(world.get::<MotionConfigError>(entity).is_some());
        assert!(!world.get::<MotionController>(entity).unwrap().is_loaded());
    }

    #[test]
    fn root_motion_is_rotated_into_world_space() {
        let mut world = World::new();
        world.insert_resource(floor());
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let entity = world
            .spawn((
                scripted_controller(Scripted::new("wave", 3)),
                Transform::from_rotation(rotation),
            ))
            .id();
        run_motion_controllers::<HeadlessBackend>(&mut world);
        update_character_body::<HeadlessBackend>(&mut world);

        world.get_mut::<RootMotion>(entity).unwrap().add(Vec3::NEG_Z, Quat::IDENTITY);
        apply_motion_output::<HeadlessBackend>(&mut world);

        // Facing -X after a quarter turn to the left.
        let translation = world.get::<Transform>(entity).unwrap().translation;
        assert!((translation - Vec3::NEG_X).length() < 1e-5, "{translation}");
        assert_eq!(*world.get::<RootMotion>(entity).unwrap(), RootMotion::default());
    }

    #[test]
    fn tick_index_resets_each_frame() {
        let mut world = World::new();
        world.init_resource::<MotionTick>();
        world.run_system_once(advance_motion_tick).unwrap();
        world.run_system_once(advance_motion_tick).unwrap();
        assert_eq!(world.resource::<MotionTick>().index(), 2);
        world.run_system_once(begin_motion_frame).unwrap();
        assert_eq!(world.resource::<MotionTick>().index(), 0);
    }
}
