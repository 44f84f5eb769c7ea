//! Jump: standing jump with landing and fall hand-off.

use bevy::prelude::*;

use crate::intent::actions;
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext};

/// Phase pushed on launch.
pub const PHASE_START: i32 = 1100;
/// Phase pushed on touchdown.
pub const PHASE_LAND: i32 = 1101;

const STATES: &[&str] = &["Jump-SM.Launch", "Jump-SM.Rise", "Jump-SM.Land"];
const STATE_LAND: usize = 2;

/// Jump tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct JumpConfig {
    /// Upward velocity added on launch, meters per second.
    pub impulse: f32,
    /// Floor distance past which a descending jump becomes a fall.
    pub fall_height: f32,
    /// Normalized time of the land state after which the unit ends.
    pub land_exit_time: f32,
    /// Seconds after touchdown the unit ends when the land state never plays.
    pub land_timeout: f32,
    /// Seconds to wait for lift-off before giving up.
    pub launch_timeout: f32,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            impulse: 5.0,
            fall_height: 1.0,
            land_exit_time: 0.5,
            land_timeout: 0.3,
            launch_timeout: 0.5,
        }
    }
}

impl JumpConfig {
    /// Builder: launch impulse.
    pub fn with_impulse(mut self, impulse: f32) -> Self {
        self.impulse = impulse;
        self
    }
}

/// Progress through a jump, shared by the jump units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Airtime {
    pub launched: bool,
    pub left_ground: bool,
    pub landed: bool,
    pub land_time: f32,
}

impl Airtime {
    /// Track lift-off and touchdown. Returns true on the touchdown tick.
    pub fn track(&mut self, grounded: bool, dt: f32) -> bool {
        if self.landed {
            self.land_time += dt;
            return false;
        }
        if !grounded {
            self.left_ground = true;
            return false;
        }
        if self.left_ground {
            self.landed = true;
            return true;
        }
        false
    }

    /// Descending past `height` above the floor.
    pub fn is_falling(&self, ctx: &MotionContext, height: f32) -> bool {
        self.left_ground
            && !self.landed
            && ctx.body.vertical_speed() < 0.0
            && ctx.body.ground_distance() > height
    }
}

/// Jumps in place on the jump action.
pub struct Jump {
    base: MotionBase,
    /// Tunables.
    pub config: JumpConfig,
    air: Airtime,
}

impl Default for Jump {
    fn default() -> Self {
        Self::new(JumpConfig::default())
    }
}

impl Jump {
    /// Create a jump unit named `jump` with priority 15.
    pub fn new(config: JumpConfig) -> Self {
        Self {
            base: MotionBase::new("jump", 15, MotionCategory::Jump),
            config,
            air: Airtime::default(),
        }
    }

    /// Whether the launch impulse has been queued.
    pub fn has_launched(&self) -> bool {
        self.air.launched
    }

    /// Whether the jump has touched down.
    pub fn has_landed(&self) -> bool {
        self.air.landed
    }
}

impl Motion for Jump {
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
        ctx.body.grounded && ctx.input.is_just_pressed(actions::JUMP)
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        self.air = Airtime::default();
        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        true
    }

    fn should_continue(&mut self, ctx: &MotionContext) -> bool {
        if !self.air.left_ground {
            return self.base.active_time() < self.config.launch_timeout;
        }
        if !self.air.landed {
            return true;
        }
        if ctx.input.magnitude() >= 0.1 {
            return false;
        }
        let layer = self.base.animator_layer;
        let land = self.base.state(STATE_LAND);
        if land.is_some()
            && ctx.state_id(layer) == land
            && ctx.normalized_time(layer) >= self.config.land_exit_time
        {
            return false;
        }
        self.air.land_time < self.config.land_timeout
    }

    fn update(&mut self, ctx: &mut MotionContext, dt: f32, tick: u32) {
        // The impulse goes out once per rendered frame, on its first sub-step.
        if !self.air.launched && tick == 1 {
            ctx.body.add_impulse(ctx.body.up * self.config.impulse);
            self.air.launched = true;
        }

        if self.air.track(ctx.body.grounded, dt) {
            ctx.animator
                .set_motion_phase(self.base.animator_layer, PHASE_LAND, 0, true);
        }

        if self.air.is_falling(ctx, self.config.fall_height) {
            ctx.request_handoff("fall");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::MotionLayer;
    use crate::motions::Fall;
    use crate::test_support::Fixture;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn starts_on_press_while_grounded() {
        let mut jump = Jump::default();
        let mut fixture = Fixture::new();
        assert!(!jump.can_activate(&fixture.ctx()));
        fixture.press(actions::JUMP);
        assert!(jump.can_activate(&fixture.ctx()));

        let mut fixture = Fixture::airborne(1.0);
        fixture.press(actions::JUMP);
        assert!(!jump.can_activate(&fixture.ctx()));
    }

    #[test]
    fn impulse_waits_for_the_first_sub_step() {
        let mut jump = Jump::default();
        let mut fixture = Fixture::new();
        jump.activate(None, &mut fixture.ctx());

        jump.update(&mut fixture.ctx(), DT, 2);
        assert_eq!(fixture.body.pending_impulse(), Vec3::ZERO);

        jump.update(&mut fixture.ctx(), DT, 1);
        assert_eq!(fixture.body.pending_impulse(), Vec3::Y * 5.0);

        jump.update(&mut fixture.ctx(), DT, 1);
        assert_eq!(fixture.body.pending_impulse(), Vec3::Y * 5.0);
    }

    #[test]
    fn lands_after_lift_off() {
        let mut jump = Jump::default();
        let mut fixture = Fixture::new();
        jump.activate(None, &mut fixture.ctx());
        jump.update(&mut fixture.ctx(), DT, 1);
        assert!(!jump.has_landed());

        fixture.body.grounded = false;
        jump.update(&mut fixture.ctx(), DT, 1);
        fixture.body.grounded = true;
        jump.update(&mut fixture.ctx(), DT, 1);
        assert!(jump.has_landed());
        assert_eq!(fixture.animator.pending_phase(0).unwrap().phase, PHASE_LAND);
    }

    #[test]
    fn hands_off_to_fall_when_dropping_far() {
        let mut fixture = Fixture::new();
        let mut layer = MotionLayer::new("Base Layer", 0);
        layer.push(Box::new(Fall::default()));
        layer.push(Box::new(Jump::default()));

        fixture.press(actions::JUMP);
        layer.tick(&mut fixture.ctx(), DT, 1);
        assert_eq!(layer.active().unwrap().base().name(), "jump");

        fixture.input.update_edges();
        fixture.body.grounded = false;
        fixture.body.velocity = Vec3::Y * 2.0;
        fixture.body.floor = None;
        layer.tick(&mut fixture.ctx(), DT, 1);
        assert_eq!(layer.active().unwrap().base().name(), "jump");

        fixture.body.velocity = Vec3::NEG_Y * 2.0;
        layer.tick(&mut fixture.ctx(), DT, 1);
        assert_eq!(layer.active().unwrap().base().name(), "fall");
    }

    #[test]
    fn gives_up_when_it_never_leaves_the_ground() {
        let mut jump = Jump::default();
        let mut fixture = Fixture::new();
        jump.activate(None, &mut fixture.ctx());
        jump.base_mut().active_time = 0.6;
        assert!(!jump.should_continue(&fixture.ctx()));
    }
}
