//! Idle: the fallback unit that holds a layer nobody else wants.

use bevy::prelude::*;

use crate::camera::CameraFrame;
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext};

/// Phase pushed when idle starts.
pub const PHASE_START: i32 = 3000;

const STATES: &[&str] = &["Idle-SM.Idle Pose", "Idle-SM.Idle Turn"];

/// Idle tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct IdleConfig {
    /// Seconds a grounded layer must be empty before idle takes it.
    pub grounded_fallback: f32,
    /// Seconds an airborne layer must be empty before idle takes it.
    pub airborne_fallback: f32,
    /// Turn with the horizontal view input while idle.
    pub rotate_with_view: bool,
    /// Turn speed from view input, degrees per second at full deflection.
    pub view_speed: f32,
    /// Turn toward the camera after it moved, while viewing is activated.
    pub rotate_to_camera: bool,
    /// Turn speed toward the camera, degrees per second.
    pub camera_speed: f32,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            grounded_fallback: 0.05,
            airborne_fallback: 1.0,
            rotate_with_view: false,
            view_speed: 120.0,
            rotate_to_camera: false,
            camera_speed: 360.0,
        }
    }
}

impl IdleConfig {
    /// Player preset: turns to face where the camera looks.
    pub fn player() -> Self {
        Self {
            rotate_to_camera: true,
            ..default()
        }
    }

    /// Builder: turn with the view input.
    pub fn with_rotate_with_view(mut self, enabled: bool) -> Self {
        self.rotate_with_view = enabled;
        self
    }

    /// Builder: turn toward the camera.
    pub fn with_rotate_to_camera(mut self, enabled: bool) -> Self {
        self.rotate_to_camera = enabled;
        self
    }
}

/// Lowest-priority unit that takes a layer left empty long enough.
pub struct Idle {
    base: MotionBase,
    /// Tunables.
    pub config: IdleConfig,
}

impl Default for Idle {
    fn default() -> Self {
        Self::new(IdleConfig::default())
    }
}

impl Idle {
    /// Create an idle unit named `idle` with priority 0.
    pub fn new(config: IdleConfig) -> Self {
        Self {
            base: MotionBase::new("idle", 0, MotionCategory::Idle),
            config,
        }
    }
}

impl Motion for Idle {
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
        let layer = ctx.layer();
        if layer.active.is_some() {
            return false;
        }
        let fallback = if ctx.body.grounded {
            self.config.grounded_fallback
        } else {
            self.config.airborne_fallback
        };
        layer.empty_time >= fallback
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        if self.config.rotate_to_camera {
            ctx.camera.subscribe(self.base.handle());
        }
        true
    }

    fn update(&mut self, ctx: &mut MotionContext, dt: f32, _tick: u32) {
        if self.config.rotate_with_view && ctx.input.view_x() != 0.0 {
            // Positive view x looks right, which is a negative yaw around up.
            let yaw = -ctx.input.view_x() * self.config.view_speed.to_radians() * dt;
            self.base.output.rotation = Quat::from_axis_angle(ctx.body.up, yaw);
        }
    }

    fn adjust_root_motion(
        &mut self,
        _ctx: &MotionContext,
        _dt: f32,
        _tick: u32,
        movement: &mut Vec3,
        _rotation: &mut Quat,
    ) {
        *movement = Vec3::ZERO;
    }

    fn deactivate(&mut self, ctx: &mut MotionContext) {
        ctx.camera.unsubscribe(self.base.handle());
    }

    fn on_camera_updated(&mut self, ctx: &mut MotionContext, frame: &CameraFrame, dt: f32) -> Quat {
        if !self.config.rotate_to_camera || !ctx.input.viewing_activated {
            return Quat::IDENTITY;
        }
        let max_step = self.config.camera_speed.to_radians() * dt;
        let yaw = frame.yaw_from(ctx.body.forward()).clamp(-max_step, max_step);
        Quat::from_axis_angle(frame.up, yaw)
    }
}
