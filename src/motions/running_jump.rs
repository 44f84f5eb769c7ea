//! Running jump: launch out of a run, then decide between running on and stopping.

use bevy::prelude::*;

use super::jump::Airtime;
use crate::intent::actions;
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext, Stance};
use crate::smoothing::{SmoothedInput, SmoothedSignal};

/// Phase pushed on launch.
pub const PHASE_START: i32 = 1150;
/// Phase pushed on touchdown.
pub const PHASE_LAND: i32 = 1151;
/// Phase pushed when the landing exit is chosen. Parameter 1 runs on, 0 stops.
pub const PHASE_LAND_EXIT: i32 = 1152;

const STATES: &[&str] = &["RunningJump-SM.Launch", "RunningJump-SM.Land"];
const STATE_LAND: usize = 1;

/// What happens to the run's horizontal velocity at launch.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMomentum {
    /// Cancel horizontal velocity; the jump animation carries the character.
    Discard,
    /// Keep the run's horizontal velocity through the air.
    #[default]
    PreserveLateral,
}

/// Running jump tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct RunningJumpConfig {
    /// Input magnitude needed to launch.
    pub min_magnitude: f32,
    /// Upward velocity added on launch, meters per second.
    pub impulse: f32,
    /// Horizontal velocity policy at launch.
    pub momentum: LaunchMomentum,
    /// Normalized time of the land state at which run-or-stop is decided.
    pub exit_decision_time: f32,
    /// Seconds after touchdown the decision is forced when the land state never plays.
    pub exit_decision_timeout: f32,
    /// Smoothed magnitude at or above which the landing runs on.
    pub run_threshold: f32,
    /// Floor distance past which a descending jump becomes a fall.
    pub fall_height: f32,
    /// Seconds a stopping landing lasts when the land state never plays.
    pub land_timeout: f32,
    /// Seconds to wait for lift-off before giving up.
    pub launch_timeout: f32,
}

impl Default for RunningJumpConfig {
    fn default() -> Self {
        Self {
            min_magnitude: 0.5,
            impulse: 5.0,
            momentum: LaunchMomentum::default(),
            exit_decision_time: 0.3,
            exit_decision_timeout: 0.1,
            run_threshold: 0.5,
            fall_height: 1.0,
            land_timeout: 0.3,
            launch_timeout: 0.5,
        }
    }
}

impl RunningJumpConfig {
    /// Builder: horizontal velocity policy.
    pub fn with_momentum(mut self, momentum: LaunchMomentum) -> Self {
        self.momentum = momentum;
        self
    }

    /// Builder: launch impulse.
    pub fn with_impulse(mut self, impulse: f32) -> Self {
        self.impulse = impulse;
        self
    }
}

/// Jump launched while running.
pub struct RunningJump {
    base: MotionBase,
    /// Tunables.
    pub config: RunningJumpConfig,
    input: SmoothedInput,
    air: Airtime,
    exit: Option<bool>,
}

impl Default for RunningJump {
    fn default() -> Self {
        Self::new(RunningJumpConfig::default())
    }
}

impl RunningJump {
    /// Create a running jump unit named `running_jump` with priority 16.
    pub fn new(config: RunningJumpConfig) -> Self {
        Self {
            base: MotionBase::new("running_jump", 16, MotionCategory::Jump),
            config,
            input: SmoothedInput::new(SmoothedSignal::DEFAULT_CAPACITY),
            air: Airtime::default(),
            exit: None,
        }
    }

    /// Landing exit once decided: `Some(true)` runs on, `Some(false)` stops.
    pub fn landing_exit(&self) -> Option<bool> {
        self.exit
    }

    fn decision_due(&self, ctx: &MotionContext) -> bool {
        let layer = self.base.animator_layer;
        let land = self.base.state(STATE_LAND);
        if land.is_some() && ctx.state_id(layer) == land {
            return ctx.normalized_time(layer) >= self.config.exit_decision_time;
        }
        self.air.land_time >= self.config.exit_decision_timeout
    }
}

impl Motion for RunningJump {
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
            && ctx.input.is_just_pressed(actions::JUMP)
            && ctx.input.magnitude() >= self.config.min_magnitude
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        self.input.clear();
        if let Some(snapshot) = ctx.take_snapshot() {
            self.input.seed(snapshot);
        }
        self.air = Airtime::default();
        self.exit = None;
        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        true
    }

    fn should_continue(&mut self, ctx: &MotionContext) -> bool {
        if !self.air.left_ground {
            return self.base.active_time() < self.config.launch_timeout;
        }
        if self.exit != Some(false) {
            return true;
        }
        let layer = self.base.animator_layer;
        let land = self.base.state(STATE_LAND);
        if land.is_some() && ctx.state_id(layer) == land && ctx.normalized_time(layer) >= 1.0 {
            return false;
        }
        self.air.land_time < self.config.land_timeout
    }

    fn can_interrupt(&mut self, _candidate: &MotionBase, ctx: &mut MotionContext) -> bool {
        ctx.store_snapshot(self.input.snapshot());
        true
    }

    fn update(&mut self, ctx: &mut MotionContext, dt: f32, tick: u32) {
        self.input.add(ctx.input.movement);
        ctx.animator.set_blend_parameters(self.input.blend_parameters());
        let layer = self.base.animator_layer;

        if !self.air.launched && tick == 1 {
            let mut impulse = ctx.body.up * self.config.impulse;
            if self.config.momentum == LaunchMomentum::Discard {
                impulse -= ctx.body.horizontal_velocity();
            }
            ctx.body.add_impulse(impulse);
            self.air.launched = true;
        }

        if self.air.track(ctx.body.grounded, dt) {
            ctx.animator.set_motion_phase(layer, PHASE_LAND, 0, true);
        }

        if self.air.is_falling(ctx, self.config.fall_height) {
            ctx.request_handoff("fall");
            return;
        }

        if self.air.landed && self.exit.is_none() && self.decision_due(ctx) {
            let run = self.input.magnitude.average() >= self.config.run_threshold;
            self.exit = Some(run);
            ctx.animator
                .set_motion_phase(layer, PHASE_LAND_EXIT, i32::from(run), false);
            if run {
                ctx.store_snapshot(self.input.snapshot());
                ctx.request_handoff("walk_run");
            }
        }
    }
}
