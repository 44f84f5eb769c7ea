//! Sneak: a toggled stance with velocity-driven movement.

use bevy::prelude::*;

use super::{camera_relative, rotate_towards};
use crate::intent::actions;
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext, Stance};

/// Phase pushed when sneaking starts.
pub const PHASE_START: i32 = 2500;
/// Phase pushed when sneaking ends.
pub const PHASE_END: i32 = 2501;

const STATES: &[&str] = &["Sneak-SM.Sneak Idle", "Sneak-SM.Sneak Move"];

/// Sneak tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct SneakConfig {
    /// Speed at full input, meters per second.
    pub speed: f32,
    /// Turn speed toward the input direction, degrees per second.
    pub rotation_speed: f32,
    /// Input magnitude below which the character stands still.
    pub min_magnitude: f32,
}

impl Default for SneakConfig {
    fn default() -> Self {
        Self {
            speed: 1.2,
            rotation_speed: 360.0,
            min_magnitude: 0.1,
        }
    }
}

impl SneakConfig {
    /// Builder: sneak speed.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}

/// Crouched movement toggled by the change-stance action.
pub struct Sneak {
    base: MotionBase,
    /// Tunables.
    pub config: SneakConfig,
}

impl Default for Sneak {
    fn default() -> Self {
        Self::new(SneakConfig::default())
    }
}

impl Sneak {
    /// Create a sneak unit named `sneak` with priority 7.
    pub fn new(config: SneakConfig) -> Self {
        Self {
            base: MotionBase::new("sneak", 7, MotionCategory::Sneak),
            config,
        }
    }
}

impl Motion for Sneak {
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
        if !ctx.body.grounded {
            return false;
        }
        match ctx.stance {
            Stance::Sneaking => true,
            Stance::Normal => ctx.input.is_just_pressed(actions::CHANGE_STANCE),
        }
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        ctx.stance = Stance::Sneaking;
        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        true
    }

    fn should_continue(&mut self, ctx: &MotionContext) -> bool {
        ctx.body.grounded && !ctx.input.is_just_pressed(actions::CHANGE_STANCE)
    }

    fn update(&mut self, ctx: &mut MotionContext, dt: f32, _tick: u32) {
        let raw = ctx.input.movement;
        ctx.animator.set_blend_parameters(crate::animator::BlendParameters {
            input_x: raw.x,
            input_y: raw.y,
            magnitude: raw.length(),
        });
        if raw.length() < self.config.min_magnitude {
            return;
        }

        let direction = camera_relative(raw, ctx);
        self.base.output.velocity = direction * self.config.speed;
        let max_step = self.config.rotation_speed.to_radians() * dt;
        self.base.output.rotation = rotate_towards(ctx.body.forward(), direction, ctx.body.up, max_step);
    }

    fn adjust_root_motion(
        &mut self,
        _ctx: &MotionContext,
        _dt: f32,
        _tick: u32,
        movement: &mut Vec3,
        rotation: &mut Quat,
    ) {
        *movement = Vec3::ZERO;
        *rotation = Quat::IDENTITY;
    }

    fn deactivate(&mut self, ctx: &mut MotionContext) {
        ctx.stance = Stance::Normal;
        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_END, 0, false);
    }
}
