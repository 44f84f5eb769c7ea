//! Slide: involuntary descent of steep slopes.

use bevy::prelude::*;

use super::{horizontal, rotate_towards};
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext};

/// Phase pushed when the slide starts.
pub const PHASE_START: i32 = 1800;

const STATES: &[&str] = &["Slide-SM.Slide"];

/// Slide tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct SlideConfig {
    /// Slope angle (degrees) at which sliding starts.
    pub min_angle: f32,
    /// Slope angle (degrees) below which sliding ends.
    pub exit_angle: f32,
    /// Speed along the slope, meters per second.
    pub speed: f32,
    /// Turn speed toward the fall line, degrees per second.
    pub rotation_speed: f32,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            min_angle: 35.0,
            exit_angle: 25.0,
            speed: 4.0,
            rotation_speed: 180.0,
        }
    }
}

impl SlideConfig {
    /// Builder: entry and exit angles in degrees.
    pub fn with_angles(mut self, min_angle: f32, exit_angle: f32) -> Self {
        self.min_angle = min_angle;
        self.exit_angle = exit_angle;
        self
    }
}

/// Slides down slopes too steep to stand on.
pub struct Slide {
    base: MotionBase,
    /// Tunables.
    pub config: SlideConfig,
}

impl Default for Slide {
    fn default() -> Self {
        Self::new(SlideConfig::default())
    }
}

impl Slide {
    /// Create a slide unit named `slide` with priority 12.
    pub fn new(config: SlideConfig) -> Self {
        Self {
            base: MotionBase::new("slide", 12, MotionCategory::Slide),
            config,
        }
    }
}

/// Unit vector pointing down the slope, zero on flat ground.
fn downhill(normal: Vec3, up: Vec3) -> Vec3 {
    let down = -up;
    (down - normal * down.dot(normal)).normalize_or_zero()
}

impl Motion for Slide {
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
        ctx.body.grounded && ctx.body.slope_angle >= self.config.min_angle.to_radians()
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        true
    }

    fn should_continue(&mut self, ctx: &MotionContext) -> bool {
        ctx.body.grounded && ctx.body.slope_angle >= self.config.exit_angle.to_radians()
    }

    fn update(&mut self, ctx: &mut MotionContext, dt: f32, _tick: u32) {
        let up = ctx.body.up;
        let direction = downhill(ctx.body.ground_normal(), up);
        self.base.output.velocity = direction * self.config.speed;

        let max_step = self.config.rotation_speed.to_radians() * dt;
        self.base.output.rotation = rotate_towards(ctx.body.forward(), horizontal(direction, up), up, max_step);
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
}
