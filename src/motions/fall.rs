//! Fall: airborne without a jump, then land.

use bevy::prelude::*;

use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext};

/// Phase pushed when the fall starts.
pub const PHASE_START: i32 = 1200;
/// Phase pushed on touchdown.
pub const PHASE_LAND: i32 = 1201;

const STATES: &[&str] = &["Fall-SM.Fall Pose", "Fall-SM.Land"];
const STATE_LAND: usize = 1;

/// Fall tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct FallConfig {
    /// Minimum floor distance before a fall starts.
    pub min_fall_height: f32,
    /// Normalized time of the land state after which the unit ends.
    pub land_exit_time: f32,
    /// Seconds after touchdown the unit ends when the land state never plays.
    pub land_timeout: f32,
    /// Input magnitude that cuts the landing short.
    pub land_cancel_magnitude: f32,
}

impl Default for FallConfig {
    fn default() -> Self {
        Self {
            min_fall_height: 0.3,
            land_exit_time: 0.7,
            land_timeout: 0.5,
            land_cancel_magnitude: 0.1,
        }
    }
}

impl FallConfig {
    /// Builder: minimum floor distance.
    pub fn with_min_fall_height(mut self, height: f32) -> Self {
        self.min_fall_height = height;
        self
    }
}

/// Falls while the floor is far away and lands on touchdown.
pub struct Fall {
    base: MotionBase,
    /// Tunables.
    pub config: FallConfig,
    landed: bool,
    land_time: f32,
}

impl Default for Fall {
    fn default() -> Self {
        Self::new(FallConfig::default())
    }
}

impl Fall {
    /// Create a fall unit named `fall` with priority 10.
    pub fn new(config: FallConfig) -> Self {
        Self {
            base: MotionBase::new("fall", 10, MotionCategory::Fall),
            config,
            landed: false,
            land_time: 0.0,
        }
    }

    /// Whether touchdown has happened.
    pub fn has_landed(&self) -> bool {
        self.landed
    }
}

impl Motion for Fall {
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
        !ctx.body.grounded
            && ctx.body.ground_distance() >= self.config.min_fall_height
            && ctx.body.vertical_speed() <= 0.0
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        self.landed = false;
        self.land_time = 0.0;
        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        true
    }

    fn should_continue(&mut self, ctx: &MotionContext) -> bool {
        if !self.landed {
            return true;
        }
        if ctx.input.magnitude() >= self.config.land_cancel_magnitude {
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
        self.land_time < self.config.land_timeout
    }

    fn update(&mut self, ctx: &mut MotionContext, dt: f32, _tick: u32) {
        if self.landed {
            self.land_time += dt;
        } else if ctx.body.grounded {
            self.landed = true;
            ctx.animator
                .set_motion_phase(self.base.animator_layer, PHASE_LAND, 0, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn starts_only_when_far_and_not_rising() {
        let mut fall = Fall::default();

        let mut fixture = Fixture::airborne(2.0);
        assert!(fall.can_activate(&fixture.ctx()));

        fixture.body.velocity = Vec3::Y * 3.0;
        assert!(!fall.can_activate(&fixture.ctx()));

        let mut fixture = Fixture::airborne(0.1);
        assert!(!fall.can_activate(&fixture.ctx()));

        let mut fixture = Fixture::new();
        assert!(!fall.can_activate(&fixture.ctx()));
    }

    #[test]
    fn lands_on_touchdown_and_ends_after_the_timeout() {
        let mut fixture = Fixture::airborne(2.0);
        let mut fall = Fall::default();
        assert!(fall.activate(None, &mut fixture.ctx()));

        fall.update(&mut fixture.ctx(), DT, 1);
        assert!(!fall.has_landed());

        fixture.body.grounded = true;
        fall.update(&mut fixture.ctx(), DT, 1);
        assert!(fall.has_landed());
        assert_eq!(fixture.animator.pending_phase(0).unwrap().phase, PHASE_LAND);
        assert!(fall.should_continue(&fixture.ctx()));

        for _ in 0..40 {
            fall.update(&mut fixture.ctx(), DT, 1);
        }
        assert!(!fall.should_continue(&fixture.ctx()));
    }

    #[test]
    fn movement_input_cuts_the_landing_short() {
        let mut fixture = Fixture::airborne(2.0);
        let mut fall = Fall::default();
        fall.activate(None, &mut fixture.ctx());
        fixture.body.grounded = true;
        fall.update(&mut fixture.ctx(), DT, 1);

        fixture.input.set_movement(Vec2::new(0.0, 1.0));
        assert!(!fall.should_continue(&fixture.ctx()));
    }

    #[test]
    fn land_state_time_ends_the_unit() {
        let mut fixture = Fixture::airborne(2.0);
        let mut fall = Fall::default();
        fixture.load(&mut fall);
        fall.activate(None, &mut fixture.ctx());
        fixture.body.grounded = true;
        fall.update(&mut fixture.ctx(), DT, 1);

        let land = fixture.state_of(&fall, "Fall-SM.Land");
        fixture.animator.enter_state(0, land);
        fixture.animator.set_normalized_time(0, 0.5);
        assert!(fall.should_continue(&fixture.ctx()));
        fixture.animator.set_normalized_time(0, 0.75);
        assert!(!fall.should_continue(&fixture.ctx()));
    }
}
