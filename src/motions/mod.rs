//! Built-in motion units.
//!
//! Each unit lives in its own module with a `*Config` struct of tunables
//! (presets and `with_*` builders, like [`BodyConfig`](crate::config::BodyConfig)),
//! the animator paths it expects and the phase ids it pushes.
//!
//! [`standard_controller`] assembles the full catalogue on a base and an
//! upper-body layer.

pub mod climb;
pub mod fall;
pub mod idle;
pub mod jump;
pub mod punch;
pub mod running_jump;
pub mod slide;
pub mod sneak;
pub mod vault;
pub mod walk_run;

pub use climb::{Climb, ClimbConfig};
pub use fall::{Fall, FallConfig};
pub use idle::{Idle, IdleConfig};
pub use jump::{Jump, JumpConfig};
pub use punch::{Punch, PunchConfig};
pub use running_jump::{LaunchMomentum, RunningJump, RunningJumpConfig};
pub use slide::{Slide, SlideConfig};
pub use sneak::{Sneak, SneakConfig};
pub use vault::{Vault, VaultConfig};
pub use walk_run::{WalkRun, WalkRunConfig};

use bevy::prelude::*;

use crate::animator::AnimatorStateId;
use crate::camera::signed_yaw;
use crate::collision::GroundFrame;
use crate::config::CharacterBody;
use crate::controller::MotionController;
use crate::detection::EdgeHit;
use crate::error::MotionError;
use crate::motion::{MotionBase, MotionContext};
use crate::reach::{ReachRequest, ReachWindow};

/// Index of the base motion layer in [`standard_controller`].
pub const BASE_LAYER: usize = 0;
/// Index of the upper-body motion layer in [`standard_controller`].
pub const UPPER_LAYER: usize = 1;

/// Controller with every built-in unit at its default tuning.
///
/// Base layer: idle, fall, walk_run, sneak, slide, jump, running_jump,
/// climb, vault. Upper layer: punch.
pub fn standard_controller() -> Result<MotionController, MotionError> {
    let mut controller = MotionController::new();
    let base = controller.add_layer("Base Layer");
    let upper = controller.add_layer("Upper Layer");

    controller.add_motion(base, Box::new(Idle::default()))?;
    controller.add_motion(base, Box::new(Fall::default()))?;
    controller.add_motion(base, Box::new(WalkRun::default()))?;
    controller.add_motion(base, Box::new(Sneak::default()))?;
    controller.add_motion(base, Box::new(Slide::default()))?;
    controller.add_motion(base, Box::new(Jump::default()))?;
    controller.add_motion(base, Box::new(RunningJump::default()))?;
    controller.add_motion(base, Box::new(Climb::default()))?;
    controller.add_motion(base, Box::new(Vault::default()))?;
    controller.add_motion(upper, Box::new(Punch::default()))?;

    Ok(controller)
}

// === Shared helpers ===

/// `v` with its component along `up` removed.
#[inline]
pub(crate) fn horizontal(v: Vec3, up: Vec3) -> Vec3 {
    v - up * v.dot(up)
}

/// World direction of a stick input relative to the camera.
///
/// `input.y` pushes along the camera's planar forward, `input.x` to its
/// right. The result keeps the input's magnitude.
pub(crate) fn camera_relative(input: Vec2, ctx: &MotionContext) -> Vec3 {
    let up = ctx.body.up;
    let forward = ctx.camera.planar_forward(up);
    let right = forward.cross(up);
    right * input.x + forward * input.y
}

/// Yaw rotation that turns `facing` toward `target`, at most `max_step` radians.
pub(crate) fn rotate_towards(facing: Vec3, target: Vec3, up: Vec3, max_step: f32) -> Quat {
    if horizontal(target, up).length_squared() < 1e-8 {
        return Quat::IDENTITY;
    }
    let yaw = signed_yaw(facing, target, up);
    Quat::from_axis_angle(up, yaw.clamp(-max_step, max_step))
}

/// Whether an edge lies within the given distance and height bounds.
pub(crate) fn edge_in_range(edge: &EdgeHit, distance: (f32, f32), height: (f32, f32)) -> bool {
    edge.distance >= distance.0
        && edge.distance <= distance.1
        && edge.height >= height.0
        && edge.height <= height.1
}

/// Queue reach requests toward `steps` for the unit's `state`, anchored to
/// the edge's object when it has a frame.
pub(crate) fn queue_reach(
    base: &mut MotionBase,
    state: AnimatorStateId,
    frame: Option<GroundFrame>,
    steps: &[(Vec3, ReachWindow, u32)],
) {
    for &(target, window, power) in steps {
        let request = ReachRequest::new(state, window, target).with_power(power);
        base.reach.push(match frame {
            Some(frame) => request.anchored_to(frame),
            None => request,
        });
    }
}

/// Body toggles captured on activation and restored on deactivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BodyToggles {
    gravity: bool,
    collision: bool,
    fix_ground_penetration: bool,
}

impl BodyToggles {
    pub fn capture(body: &CharacterBody) -> Self {
        Self {
            gravity: body.gravity_enabled,
            collision: body.collision_enabled,
            fix_ground_penetration: body.fix_ground_penetration,
        }
    }

    /// Capture the toggles and switch the body to kinematic traversal.
    pub fn suspend(body: &mut CharacterBody) -> Self {
        let saved = Self::capture(body);
        body.gravity_enabled = false;
        body.collision_enabled = false;
        body.fix_ground_penetration = false;
        saved
    }

    pub fn restore(self, body: &mut CharacterBody) {
        body.gravity_enabled = self.gravity;
        body.collision_enabled = self.collision;
        body.fix_ground_penetration = self.fix_ground_penetration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[test]
    fn standard_controller_registers_every_unit() {
        let controller = standard_controller().unwrap();
        let names = [
            "idle",
            "fall",
            "walk_run",
            "sneak",
            "slide",
            "jump",
            "running_jump",
            "climb",
            "vault",
        ];
        for name in names {
            assert_eq!(controller.find(name).unwrap().layer, BASE_LAYER, "{name}");
        }
        assert_eq!(controller.find("punch").unwrap().layer, UPPER_LAYER);
        assert_eq!(controller.motion("punch").unwrap().base().animator_layer, 1);
    }

    #[test]
    fn standard_controller_loads_against_an_open_registry() {
        let mut controller = standard_controller().unwrap();
        let mut fixture = Fixture::new();
        controller.load_animator_data(&mut fixture.registry).unwrap();
        assert!(controller.is_loaded());
    }

    #[test]
    fn camera_relative_follows_camera_yaw() {
        let mut fixture = Fixture::new();
        fixture.camera.forward = Vec3::X;
        let ctx = fixture.ctx();
        let dir = camera_relative(Vec2::new(0.0, 1.0), &ctx);
        assert!((dir - Vec3::X).length() < 1e-5);
        let dir = camera_relative(Vec2::new(1.0, 0.0), &ctx);
        assert!((dir - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn rotate_towards_is_clamped() {
        let q = rotate_towards(Vec3::NEG_Z, Vec3::X, Vec3::Y, 0.1);
        assert!((q.to_axis_angle().1 - 0.1).abs() < 1e-5);
        assert_eq!(rotate_towards(Vec3::NEG_Z, Vec3::Y, Vec3::Y, 0.1), Quat::IDENTITY);
    }

    #[test]
    fn toggles_round_trip() {
        let mut body = CharacterBody::new();
        body.collision_enabled = false;
        let saved = BodyToggles::suspend(&mut body);
        assert!(!body.gravity_enabled);
        saved.restore(&mut body);
        assert!(body.gravity_enabled);
        assert!(!body.collision_enabled);
        assert!(body.fix_ground_penetration);
    }
}
