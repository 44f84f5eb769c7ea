//! Walk/run with smoothed input, pivots and stops.

use bevy::prelude::*;

use super::{camera_relative, rotate_towards};
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext, Stance};
use crate::smoothing::{SmoothedInput, SmoothedSignal};

/// Phase pushed when moving starts or resumes.
pub const PHASE_START: i32 = 2000;
/// Phase pushed when the input drops and the stop plays.
pub const PHASE_STOP: i32 = 2001;

const STATES: &[&str] = &[
    "WalkRunPivot-SM.Move Tree",
    "WalkRunPivot-SM.Pivot",
    "WalkRunPivot-SM.Stop",
];
const STATE_PIVOT: usize = 1;
const STATE_STOP: usize = 2;

/// Walk/run tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct WalkRunConfig {
    /// Input magnitude that starts movement.
    pub min_magnitude: f32,
    /// Samples averaged by the input smoothing.
    pub smoothing_samples: usize,
    /// Turn speed toward the input direction, degrees per second.
    pub rotation_speed: f32,
    /// Replace root motion by this speed (m/s at full input) when set.
    pub fixed_speed: Option<f32>,
    /// Drop sideways root motion.
    pub remove_lateral_movement: bool,
    /// Drop backward root motion.
    pub remove_backward_movement: bool,
    /// Seconds the stop may last when the stop state never plays.
    pub stop_timeout: f32,
}

impl Default for WalkRunConfig {
    fn default() -> Self {
        Self {
            min_magnitude: 0.1,
            smoothing_samples: SmoothedSignal::DEFAULT_CAPACITY,
            rotation_speed: 540.0,
            fixed_speed: None,
            remove_lateral_movement: true,
            remove_backward_movement: true,
            stop_timeout: 0.25,
        }
    }
}

impl WalkRunConfig {
    /// Preset for bodies without animation root motion.
    pub fn fixed(speed: f32) -> Self {
        Self {
            fixed_speed: Some(speed),
            ..default()
        }
    }

    /// Builder: replace root motion by a fixed speed.
    pub fn with_fixed_speed(mut self, speed: f32) -> Self {
        self.fixed_speed = Some(speed);
        self
    }

    /// Builder: smoothing window size.
    pub fn with_smoothing_samples(mut self, samples: usize) -> Self {
        self.smoothing_samples = samples;
        self
    }

    /// Builder: turn speed in degrees per second.
    pub fn with_rotation_speed(mut self, degrees_per_second: f32) -> Self {
        self.rotation_speed = degrees_per_second;
        self
    }
}

/// Moves the character along the camera-relative input.
pub struct WalkRun {
    base: MotionBase,
    /// Tunables.
    pub config: WalkRunConfig,
    input: SmoothedInput,
    stopping: bool,
    stop_time: f32,
}

impl Default for WalkRun {
    fn default() -> Self {
        Self::new(WalkRunConfig::default())
    }
}

impl WalkRun {
    /// Create a walk/run unit named `walk_run` with priority 5.
    pub fn new(config: WalkRunConfig) -> Self {
        Self {
            base: MotionBase::new("walk_run", 5, MotionCategory::Walk),
            input: SmoothedInput::new(config.smoothing_samples),
            config,
            stopping: false,
            stop_time: 0.0,
        }
    }

    /// Smoothed input channels.
    pub fn smoothed_input(&self) -> &SmoothedInput {
        &self.input
    }

    /// Whether the stop is playing.
    pub fn is_stopping(&self) -> bool {
        self.stopping
    }
}

impl Motion for WalkRun {
    fn base(&self) -> &MotionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MotionBase {
        &mut self.base
    }

    fn animator_states(&self) -> &'static [&'static str] {
        STATES
    }

    fn can_activate(&mut self, ctx: &MotionContext) -> bool {
        ctx.body.grounded
            && ctx.stance == Stance::Normal
            && ctx.input.magnitude() >= self.config.min_magnitude
    }

    fn can_interrupt(&mut self, _candidate: &MotionBase, ctx: &mut MotionContext) -> bool {
        ctx.store_snapshot(self.input.snapshot());
        true
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        if self.input.x.capacity() != self.config.smoothing_samples {
            self.input.resize(self.config.smoothing_samples);
        } else {
            self.input.clear();
        }
        if let Some(snapshot) = ctx.take_snapshot() {
            self.input.seed(snapshot);
        }
        self.stopping = false;
        self.stop_time = 0.0;
        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        true
    }

    fn should_continue(&mut self, ctx: &MotionContext) -> bool {
        if !ctx.body.grounded || ctx.stance != Stance::Normal {
            return false;
        }
        if !self.stopping {
            return true;
        }
        let layer = self.base.animator_layer;
        let stop = self.base.state(STATE_STOP);
        if stop.is_some() && ctx.state_id(layer) == stop && ctx.normalized_time(layer) >= 1.0 {
            return false;
        }
        self.stop_time < self.config.stop_timeout
    }

    fn update(&mut self, ctx: &mut MotionContext, dt: f32, _tick: u32) {
        let raw = ctx.input.movement;
        self.input.add(raw);
        ctx.animator.set_blend_parameters(self.input.blend_parameters());

        let layer = self.base.animator_layer;
        let moving = raw.length() >= self.config.min_magnitude;
        if moving && self.stopping {
            self.stopping = false;
            self.stop_time = 0.0;
            ctx.animator.set_motion_phase(layer, PHASE_START, 0, true);
        } else if !moving && !self.stopping {
            self.stopping = true;
            ctx.animator.set_motion_phase(layer, PHASE_STOP, 0, true);
        }
        if self.stopping {
            self.stop_time += dt;
            return;
        }

        let direction = camera_relative(raw, ctx);
        let max_step = self.config.rotation_speed.to_radians() * dt;
        self.base.output.rotation = rotate_towards(ctx.body.forward(), direction, ctx.body.up, max_step);
    }

    fn adjust_root_motion(
        &mut self,
        ctx: &MotionContext,
        dt: f32,
        _tick: u32,
        movement: &mut Vec3,
        rotation: &mut Quat,
    ) {
        if let Some(speed) = self.config.fixed_speed {
            let magnitude = if self.stopping {
                0.0
            } else {
                self.input.magnitude.average()
            };
            *movement = Vec3::NEG_Z * speed * magnitude * dt;
        } else {
            if self.config.remove_lateral_movement {
                movement.x = 0.0;
            }
            if self.config.remove_backward_movement && movement.z > 0.0 {
                movement.z = 0.0;
            }
        }

        // Root rotation only drives the pivot; elsewhere the unit steers.
        let pivot = self.base.state(STATE_PIVOT);
        if !(pivot.is_some() && ctx.state_id(self.base.animator_layer) == pivot) {
            *rotation = Quat::IDENTITY;
        }
    }
}
