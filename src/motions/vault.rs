//! Vault: hop over a low, thin obstacle while moving.

use bevy::prelude::*;

use super::{BodyToggles, edge_in_range, horizontal, queue_reach, rotate_towards};
use crate::detection::{EdgeHit, EdgeProbe};
use crate::intent::actions;
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext, Stance};
use crate::reach::ReachWindow;

/// Phase pushed when the vault starts.
pub const PHASE_START: i32 = 1700;

const STATES: &[&str] = &["Vault-SM.Vault Over"];
const STATE_VAULT: usize = 0;

/// Vault tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct VaultConfig {
    /// Geometric search bounds. `depth_scan` must cover `max_depth`.
    pub edge: EdgeProbe,
    /// Accepted distance from the feet to the obstacle.
    pub min_distance: f32,
    /// Accepted distance from the feet to the obstacle.
    pub max_distance: f32,
    /// Accepted obstacle height.
    pub min_height: f32,
    /// Accepted obstacle height.
    pub max_height: f32,
    /// Accepted obstacle depth.
    pub min_depth: f32,
    /// Accepted obstacle depth.
    pub max_depth: f32,
    /// Input magnitude needed to vault.
    pub min_magnitude: f32,
    /// Distance past the far face where the feet land.
    pub landing_distance: f32,
    /// Vault-state window that lifts the character onto the obstacle.
    pub over_window: ReachWindow,
    /// Vault-state window that carries the character down the far side.
    pub landing_window: ReachWindow,
    /// Normalized time of the vault state after which the unit ends.
    pub exit_time: f32,
    /// Seconds the vault may last when the vault state never plays.
    pub timeout: f32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            edge: EdgeProbe::default().with_max_height(1.5).with_depth_scan(2.0),
            min_distance: 0.0,
            max_distance: 1.0,
            min_height: 0.4,
            max_height: 1.2,
            min_depth: 0.1,
            max_depth: 1.0,
            min_magnitude: 0.5,
            landing_distance: 0.5,
            over_window: ReachWindow::from_valid(0.0, 0.4),
            landing_window: ReachWindow::from_valid(0.45, 0.9),
            exit_time: 0.95,
            timeout: 2.0,
        }
    }
}

impl VaultConfig {
    /// Builder: accepted obstacle depths.
    pub fn with_depth_range(mut self, min: f32, max: f32) -> Self {
        self.min_depth = min;
        self.max_depth = max;
        self.edge.depth_scan = self.edge.depth_scan.max(max + self.edge.max_distance);
        self
    }

    /// Builder: accepted obstacle heights.
    pub fn with_height_range(mut self, min: f32, max: f32) -> Self {
        self.min_height = min;
        self.max_height = max;
        self.edge.max_height = self.edge.max_height.max(max);
        self
    }
}

/// Vaults over thin obstacles on the interact action while moving.
pub struct Vault {
    base: MotionBase,
    /// Tunables.
    pub config: VaultConfig,
    edge: Option<EdgeHit>,
    toggles: Option<BodyToggles>,
}

impl Default for Vault {
    fn default() -> Self {
        Self::new(VaultConfig::default())
    }
}

impl Vault {
    /// Create a vault unit named `vault` with priority 26.
    pub fn new(config: VaultConfig) -> Self {
        Self {
            base: MotionBase::new("vault", 26, MotionCategory::Vault),
            config,
            edge: None,
            toggles: None,
        }
    }

    /// Obstacle being vaulted, or the one cached by the last successful check.
    pub fn edge(&self) -> Option<&EdgeHit> {
        self.edge.as_ref()
    }
}

impl Motion for Vault {
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
        self.edge = None;
        if !ctx.body.grounded
            || ctx.stance != Stance::Normal
            || ctx.input.magnitude() < self.config.min_magnitude
            || !ctx.input.is_just_pressed(actions::INTERACT)
        {
            return false;
        }

        let body = &ctx.body;
        let Some(edge) = ctx
            .probe
            .forward_edge(body.position, body.forward(), body.up, &self.config.edge)
        else {
            return false;
        };
        let config = &self.config;
        let depth_ok = edge
            .depth
            .is_some_and(|depth| depth >= config.min_depth && depth <= config.max_depth);
        if !depth_ok
            || !edge_in_range(
                &edge,
                (config.min_distance, config.max_distance),
                (config.min_height, config.max_height),
            )
        {
            return false;
        }

        self.edge = Some(edge);
        true
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        let Some(edge) = self.edge else {
            return false;
        };
        let Some(depth) = edge.depth else {
            return false;
        };
        if edge.entity.is_some_and(|entity| !ctx.probe.is_alive(entity)) {
            self.edge = None;
            return false;
        }

        self.toggles = Some(BodyToggles::suspend(ctx.body));
        ctx.body.set_ground(edge.entity);

        let up = ctx.body.up;
        let inward = -horizontal(edge.wall_normal, up).normalize_or_zero();
        let over = edge.edge_point + inward * (depth * 0.5);
        let landing = edge.edge_point + inward * (depth + self.config.landing_distance) - up * edge.height;
        let frame = edge.entity.and_then(|entity| ctx.probe.frame(entity));
        let state = self.base.state(STATE_VAULT);
        queue_reach(
            &mut self.base,
            state,
            frame,
            &[
                (over, self.config.over_window, 1),
                (landing, self.config.landing_window, 2),
            ],
        );

        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        true
    }

    fn should_continue(&mut self, ctx: &MotionContext) -> bool {
        let layer = self.base.animator_layer;
        let vault = self.base.state(STATE_VAULT);
        if vault.is_some()
            && ctx.state_id(layer) == vault
            && ctx.normalized_time(layer) >= self.config.exit_time
        {
            return false;
        }
        self.base.active_time() < self.config.timeout
    }

    fn update(&mut self, ctx: &mut MotionContext, dt: f32, _tick: u32) {
        self.base.output.movement = ctx.reach_movement(&mut self.base);

        if let Some(edge) = self.edge {
            let up = ctx.body.up;
            let facing = -horizontal(edge.wall_normal, up);
            self.base.output.rotation = rotate_towards(ctx.body.forward(), facing, up, std::f32::consts::PI * dt);
        }
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
        if let Some(toggles) = self.toggles.take() {
            toggles.restore(ctx.body);
        }
        ctx.body.set_ground(None);
        self.edge = None;
    }
}
