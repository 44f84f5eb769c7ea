//! Punch: an upper-body attack layered over locomotion.

use bevy::prelude::*;

use crate::intent::actions;
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext};

/// Phase pushed when the punch starts.
pub const PHASE_START: i32 = 3400;

const STATES: &[&str] = &["Punch-SM.Punch"];
const STATE_PUNCH: usize = 0;

/// Punch tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct PunchConfig {
    /// Normalized time of the punch state after which the unit ends.
    pub exit_time: f32,
    /// Seconds the punch may last when the punch state never plays.
    pub timeout: f32,
    /// Animator layer holding the punch state.
    pub animator_layer: usize,
}

impl Default for PunchConfig {
    fn default() -> Self {
        Self {
            exit_time: 0.9,
            timeout: 1.0,
            animator_layer: 1,
        }
    }
}

/// Throws a punch on the attack action.
pub struct Punch {
    base: MotionBase,
    /// Tunables.
    pub config: PunchConfig,
}

impl Default for Punch {
    fn default() -> Self {
        Self::new(PunchConfig::default())
    }
}

impl Punch {
    /// Create a punch unit named `punch` with priority 1.
    pub fn new(config: PunchConfig) -> Self {
        Self {
            base: MotionBase::new("punch", 1, MotionCategory::Attack).with_animator_layer(config.animator_layer),
            config,
        }
    }
}

impl Motion for Punch {
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
        ctx.input.is_just_pressed(actions::ATTACK)
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        true
    }

    fn should_continue(&mut self, ctx: &MotionContext) -> bool {
        let layer = self.base.animator_layer;
        let punch = self.base.state(STATE_PUNCH);
        if punch.is_some()
            && ctx.state_id(layer) == punch
            && ctx.normalized_time(layer) >= self.config.exit_time
        {
            return false;
        }
        self.base.active_time() < self.config.timeout
    }

    fn update(&mut self, _ctx: &mut MotionContext, _dt: f32, _tick: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::MotionLayer;
    use crate::test_support::Fixture;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn punches_on_the_upper_layer() {
        let mut fixture = Fixture::new();
        let mut layer = MotionLayer::new("Upper Layer", 1);
        layer.push(Box::new(Punch::default()));

        fixture.press(actions::ATTACK);
        layer.tick(&mut fixture.ctx(), DT, 1);
        assert_eq!(layer.active().unwrap().base().name(), "punch");
        assert_eq!(fixture.animator.pending_phase(1).unwrap().phase, PHASE_START);
        assert!(fixture.animator.pending_phase(0).is_none());
    }

    #[test]
    fn ends_near_the_end_of_the_swing() {
        let mut fixture = Fixture::new();
        let mut punch = Punch::default();
        fixture.load(&mut punch);
        let state = fixture.state_of(&punch, "Punch-SM.Punch");
        fixture.animator.enter_state(1, state);

        fixture.animator.set_normalized_time(1, 0.5);
        assert!(punch.should_continue(&fixture.ctx()));
        fixture.animator.set_normalized_time(1, 0.9);
        assert!(!punch.should_continue(&fixture.ctx()));
    }
}
