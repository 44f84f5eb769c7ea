//! The motion arbitration core.
//!
//! [`MotionController`] drives every [`MotionLayer`] of one character and
//! holds what the layers share: stance, the input snapshot handed across
//! a transition within one tick, and the one-time animator load.

use bevy::prelude::*;

use crate::animator::{AnimatorRegistry, MotionAnimator};
use crate::camera::{CameraFrame, MotionCamera};
use crate::config::{BodyConfig, CharacterBody};
use crate::error::MotionError;
use crate::intent::MotionInput;
use crate::layer::MotionLayer;
use crate::motion::{Motion, MotionContext, MotionHandle, MotionOutput, Stance};
use crate::state::ActiveMotions;

/// Raw animation root motion for the current frame, in character-local space.
///
/// The host animation system adds the skeletal root delta here; the
/// application system consumes it once, after the active units adjusted it.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct RootMotion {
    /// Local-space displacement.
    pub movement: Vec3,
    /// Rotation delta.
    pub rotation: Quat,
}

impl Default for RootMotion {
    fn default() -> Self {
        Self {
            movement: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl RootMotion {
    /// Accumulate another root delta.
    pub fn add(&mut self, movement: Vec3, rotation: Quat) {
        self.movement += movement;
        self.rotation = rotation * self.rotation;
    }

    /// Take the accumulated delta, leaving none.
    pub fn take(&mut self) -> (Vec3, Quat) {
        let taken = (self.movement, self.rotation);
        *self = Self::default();
        taken
    }
}

/// Configuration problem found while loading a controller.
///
/// Inserted next to a [`MotionController`] whose animator data failed to
/// load. The controller stays idle until the component is removed and the
/// load retried.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct MotionConfigError(pub MotionError);

/// Motion arbitration core of one character.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_motion_controller::prelude::*;
///
/// let mut controller = MotionController::new();
/// let base = controller.add_layer("Base Layer");
/// controller.add_motion(base, Box::new(Idle::default())).unwrap();
/// controller.add_motion(base, Box::new(WalkRun::default())).unwrap();
///
/// assert!(controller.motion("walk_run").is_some());
/// assert!(controller.add_motion(base, Box::new(Idle::default())).is_err());
/// ```
#[derive(Component, Default)]
#[require(Transform, CharacterBody, BodyConfig, MotionAnimator, MotionInput, MotionCamera, RootMotion, ActiveMotions)]
pub struct MotionController {
    layers: Vec<MotionLayer>,
    stance: Stance,
    loaded: bool,
}

impl MotionController {
    /// Create a controller without layers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a motion layer, returning its index.
    pub fn add_layer(&mut self, name: impl Into<String>) -> usize {
        let index = self.layers.len();
        self.layers.push(MotionLayer::new(name, index));
        index
    }

    /// Motion layers in index order.
    pub fn layers(&self) -> &[MotionLayer] {
        &self.layers
    }

    /// A motion layer.
    pub fn layer(&self, index: usize) -> Option<&MotionLayer> {
        self.layers.get(index)
    }

    /// Register a unit on a layer.
    ///
    /// Names are unique across the whole controller.
    pub fn add_motion(&mut self, layer: usize, motion: Box<dyn Motion>) -> Result<MotionHandle, MotionError> {
        let name = motion.base().name();
        if self.find(name).is_some() {
            return Err(MotionError::DuplicateMotion(name.to_owned()));
        }
        let target = self
            .layers
            .get_mut(layer)
            .ok_or(MotionError::UnknownMotionLayer(layer))?;
        self.loaded = false;
        Ok(target.push(motion))
    }

    /// Find a unit by name.
    pub fn find(&self, name: &str) -> Option<MotionHandle> {
        self.layers.iter().find_map(|layer| {
            layer
                .index_of(name)
                .map(|index| MotionHandle::new(layer.index(), index))
        })
    }

    /// A unit by name.
    pub fn motion(&self, name: &str) -> Option<&dyn Motion> {
        let handle = self.find(name)?;
        self.layers[handle.layer].get(handle.index)
    }

    /// A mutable unit by name.
    pub fn motion_mut(&mut self, name: &str) -> Option<&mut (dyn Motion + 'static)> {
        let handle = self.find(name)?;
        self.layers[handle.layer].get_mut(handle.index)
    }

    /// The running unit of a layer.
    pub fn active_motion(&self, layer: usize) -> Option<&dyn Motion> {
        self.layers.get(layer)?.active()
    }

    /// Names of the running units, one entry per layer.
    pub fn active_names(&self) -> Vec<Option<String>> {
        self.layers
            .iter()
            .map(|layer| layer.active().map(|m| m.base().name().to_owned()))
            .collect()
    }

    /// Enable or disable a unit for polling. Running units are not stopped.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), MotionError> {
        let motion = self
            .motion_mut(name)
            .ok_or_else(|| MotionError::UnknownMotion(name.to_owned()))?;
        motion.base_mut().is_startable = enabled;
        Ok(())
    }

    /// Current stance.
    pub fn stance(&self) -> Stance {
        self.stance
    }

    /// Force a stance.
    pub fn set_stance(&mut self, stance: Stance) {
        self.stance = stance;
    }

    /// Whether animator data has been resolved since the last change.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Declare every unit's animator paths on a registry.
    ///
    /// Hosts that build their animator from the units use this to populate
    /// a strict registry before loading.
    pub fn declare_animator_states(&self, registry: &mut AnimatorRegistry) -> Result<(), MotionError> {
        for layer in &self.layers {
            for motion in layer.motions() {
                let animator_layer = motion.base().animator_layer;
                for path in motion.animator_states() {
                    registry.declare(animator_layer, path)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve every unit's animator paths to ids. Runs before the first tick.
    pub fn load_animator_data(&mut self, registry: &mut AnimatorRegistry) -> Result<(), MotionError> {
        for layer in &mut self.layers {
            for motion in layer.motions_mut() {
                motion.load_animator_data(registry)?;
            }
        }
        self.loaded = true;
        info!(
            "motion controller loaded {} motions on {} layers",
            self.layers.iter().map(MotionLayer::len).sum::<usize>(),
            self.layers.len()
        );
        Ok(())
    }

    /// Run one arbitration pass on every layer.
    pub fn tick(&mut self, ctx: &mut MotionContext, dt: f32, tick: u32) {
        ctx.stance = self.stance;
        ctx.snapshot = None;

        for layer in &mut self.layers {
            layer.tick(ctx, dt, tick);
        }

        self.stance = ctx.stance;
        // A snapshot nobody took this tick is stale by the next one.
        ctx.snapshot = None;
    }

    /// Let the running units rewrite the root motion, base layer first.
    pub fn adjust_root_motion(
        &mut self,
        ctx: &mut MotionContext,
        dt: f32,
        tick: u32,
        movement: &mut Vec3,
        rotation: &mut Quat,
    ) {
        ctx.stance = self.stance;
        for layer in &mut self.layers {
            layer.adjust_root_motion(ctx, dt, tick, movement, rotation);
        }
    }

    /// Combined outputs of every running unit this tick.
    pub fn output(&self) -> MotionOutput {
        let mut output = MotionOutput::default();
        for layer in &self.layers {
            if let Some(motion) = layer.active() {
                output.combine(&motion.base().output);
            }
        }
        output
    }

    /// Deliver the camera post-update to subscribed units. Returns the combined yaw.
    pub fn camera_updated(&mut self, ctx: &mut MotionContext, frame: &CameraFrame, dt: f32) -> Quat {
        ctx.stance = self.stance;
        let listeners = ctx.camera.listeners().to_vec();
        let mut rotation = Quat::IDENTITY;
        for handle in listeners {
            if let Some(layer) = self.layers.get_mut(handle.layer) {
                rotation = layer.camera_updated(handle.index, ctx, frame, dt) * rotation;
            }
        }
        rotation
    }

    /// Stop every running unit, running their teardown.
    pub fn deactivate_all(&mut self, ctx: &mut MotionContext) {
        ctx.stance = self.stance;
        for layer in &mut self.layers {
            layer.deactivate_active(ctx);
        }
        self.stance = ctx.stance;
    }
}
