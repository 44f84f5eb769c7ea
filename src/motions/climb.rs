//! Climb: pull up onto a ledge found in front of the character.

use bevy::prelude::*;

use super::{BodyToggles, edge_in_range, horizontal, queue_reach, rotate_towards};
use crate::detection::{EdgeHit, EdgeProbe};
use crate::intent::actions;
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext, Stance};
use crate::reach::ReachWindow;

/// Phase pushed when the climb starts.
pub const PHASE_START: i32 = 1600;

const STATES: &[&str] = &["ClimbCrouch-SM.Climb Up", "ClimbCrouch-SM.Crouch Exit"];
const STATE_CLIMB: usize = 0;

/// Climb tuning.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct ClimbConfig {
    /// Geometric search bounds.
    pub edge: EdgeProbe,
    /// Accepted distance from the feet to the wall.
    pub min_distance: f32,
    /// Accepted distance from the feet to the wall.
    pub max_distance: f32,
    /// Accepted ledge height above the feet.
    pub min_height: f32,
    /// Accepted ledge height above the feet.
    pub max_height: f32,
    /// Distance kept from the wall while pulling up.
    pub wall_offset: f32,
    /// How far past the edge the feet end up.
    pub top_inset: f32,
    /// Climb-state window that lines the character up with the wall.
    pub align_window: ReachWindow,
    /// Climb-state window that lifts the character onto the top.
    pub top_window: ReachWindow,
    /// Normalized time of the climb state after which the unit ends.
    pub exit_time: f32,
    /// Seconds the climb may last when the climb state never plays.
    pub timeout: f32,
}

impl Default for ClimbConfig {
    fn default() -> Self {
        Self {
            edge: EdgeProbe::default(),
            min_distance: 0.0,
            max_distance: 1.0,
            min_height: 0.5,
            max_height: 2.2,
            wall_offset: 0.3,
            top_inset: 0.3,
            align_window: ReachWindow::from_valid(0.0, 0.2),
            top_window: ReachWindow::from_valid(0.3, 0.9),
            exit_time: 0.95,
            timeout: 3.0,
        }
    }
}

impl ClimbConfig {
    /// Builder: accepted ledge heights.
    pub fn with_height_range(mut self, min: f32, max: f32) -> Self {
        self.min_height = min;
        self.max_height = max;
        self.edge.max_height = self.edge.max_height.max(max);
        self
    }

    /// Builder: accepted wall distances.
    pub fn with_distance_range(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self.edge.max_distance = self.edge.max_distance.max(max);
        self
    }

    /// Builder: reach windows.
    pub fn with_windows(mut self, align: ReachWindow, top: ReachWindow) -> Self {
        self.align_window = align;
        self.top_window = top;
        self
    }
}

/// Climbs onto ledges on the interact action.
pub struct Climb {
    base: MotionBase,
    /// Tunables.
    pub config: ClimbConfig,
    edge: Option<EdgeHit>,
    toggles: Option<BodyToggles>,
}

impl Default for Climb {
    fn default() -> Self {
        Self::new(ClimbConfig::default())
    }
}

impl Climb {
    /// Create a climb unit named `climb` with priority 25.
    pub fn new(config: ClimbConfig) -> Self {
        Self {
            base: MotionBase::new("climb", 25, MotionCategory::Climb),
            config,
            edge: None,
            toggles: None,
        }
    }

    /// Edge being climbed, or the one cached by the last successful check.
    pub fn edge(&self) -> Option<&EdgeHit> {
        self.edge.as_ref()
    }
}

impl Motion for Climb {
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
        if !edge_in_range(
            &edge,
            (config.min_distance, config.max_distance),
            (config.min_height, config.max_height),
        ) {
            debug!(
                "climb rejected edge at distance {:.2}, height {:.2}",
                edge.distance, edge.height
            );
            return false;
        }

        self.edge = Some(edge);
        true
    }

    fn activate(&mut self, _previous: Option<&MotionBase>, ctx: &mut MotionContext) -> bool {
        let Some(edge) = self.edge else {
            return false;
        };
        if edge.entity.is_some_and(|entity| !ctx.probe.is_alive(entity)) {
            self.edge = None;
            return false;
        }

        self.toggles = Some(BodyToggles::suspend(ctx.body));
        ctx.body.set_ground(edge.entity);

        let up = ctx.body.up;
        let hang = edge.edge_point + edge.wall_normal * self.config.wall_offset - up * edge.height;
        let top = edge.edge_point - edge.wall_normal * self.config.top_inset;
        let frame = edge.entity.and_then(|entity| ctx.probe.frame(entity));
        let state = self.base.state(STATE_CLIMB);
        queue_reach(
            &mut self.base,
            state,
            frame,
            &[
                (hang, self.config.align_window, 1),
                (top, self.config.top_window, 2),
            ],
        );

        ctx.animator
            .set_motion_phase(self.base.animator_layer, PHASE_START, 0, true);
        true
    }

    fn should_continue(&mut self, ctx: &MotionContext) -> bool {
        if self
            .edge
            .and_then(|edge| edge.entity)
            .is_some_and(|entity| !ctx.probe.is_alive(entity))
        {
            return false;
        }
        let layer = self.base.animator_layer;
        let climb = self.base.state(STATE_CLIMB);
        if climb.is_some()
            && ctx.state_id(layer) == climb
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
        // Reach requests place the body; root motion would skew their origins.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::MotionLayer;
    use crate::test_support::{Fixture, Scripted};

    const DT: f32 = 1.0 / 60.0;

    fn ledge(distance: f32, height: f32) -> EdgeHit {
        EdgeHit {
            distance,
            height,
            depth: None,
            edge_point: Vec3::new(0.0, height, -distance),
            wall_normal: Vec3::Z,
            top_normal: Vec3::Y,
            entity: Some(Entity::from_raw(9)),
        }
    }

    #[test]
    fn rejects_ledges_outside_the_height_range() {
        let mut climb = Climb::default();
        let mut fixture = Fixture::new();
        fixture.press(actions::INTERACT);

        fixture.probe.edge = Some(ledge(0.5, 0.4));
        assert!(!climb.can_activate(&fixture.ctx()));
        assert!(climb.edge().is_none());

        fixture.probe.edge = Some(ledge(0.5, 2.5));
        assert!(!climb.can_activate(&fixture.ctx()));

        fixture.probe.edge = Some(ledge(0.5, 1.2));
        assert!(climb.can_activate(&fixture.ctx()));
        assert_eq!(climb.edge().unwrap().height, 1.2);
    }

    #[test]
    fn needs_the_interact_press() {
        let mut climb = Climb::default();
        let mut fixture = Fixture::new();
        fixture.probe.edge = Some(ledge(0.5, 1.2));
        assert!(!climb.can_activate(&fixture.ctx()));
    }

    #[test]
    fn suspends_the_body_and_restores_it_on_interruption() {
        let mut fixture = Fixture::new();
        fixture.probe.edge = Some(ledge(0.5, 1.2));
        let boss = Scripted::new("knockdown", 30);
        let knockdown = boss.probe();

        let mut layer = MotionLayer::new("Base Layer", 0);
        layer.push(Box::new(Climb::default()));
        layer.push(Box::new(boss));

        fixture.press(actions::INTERACT);
        layer.tick(&mut fixture.ctx(), DT, 1);
        assert_eq!(layer.active().unwrap().base().name(), "climb");
        assert!(!fixture.body.gravity_enabled);
        assert!(!fixture.body.collision_enabled);
        assert_eq!(fixture.body.ground(), Some(Entity::from_raw(9)));
        assert_eq!(layer.active().unwrap().base().reach.len(), 2);

        knockdown.set_activates(true);
        fixture.input.update_edges();
        layer.tick(&mut fixture.ctx(), DT, 2);
        assert_eq!(layer.active().unwrap().base().name(), "knockdown");
        assert!(fixture.body.gravity_enabled);
        assert!(fixture.body.collision_enabled);
        assert_eq!(fixture.body.ground(), None);
        assert!(layer.get(0).unwrap().base().reach.is_empty());
    }

    #[test]
    fn despawned_ledge_fails_activation() {
        let mut fixture = Fixture::new();
        fixture.probe.edge = Some(ledge(0.5, 1.2));
        fixture.probe.dead.push(Entity::from_raw(9));
        let mut layer = MotionLayer::new("Base Layer", 0);
        layer.push(Box::new(Climb::default()));

        fixture.press(actions::INTERACT);
        layer.tick(&mut fixture.ctx(), DT, 1);
        assert!(layer.active().is_none());
        assert!(fixture.body.gravity_enabled);
    }

    #[test]
    fn reach_lands_the_feet_on_top() {
        let mut fixture = Fixture::new();
        fixture.probe.edge = Some(ledge(0.5, 1.2));
        let mut climb = Climb::default();
        fixture.load(&mut climb);
        fixture.press(actions::INTERACT);
        assert!(climb.can_activate(&fixture.ctx()));
        assert!(climb.activate(None, &mut fixture.ctx()));

        let state = fixture.state_of(&climb, "ClimbCrouch-SM.Climb Up");
        fixture.animator.enter_state(0, state);
        for time in [0.0, 0.1, 0.2, 0.25, 0.3, 0.45, 0.6, 0.75, 0.9, 0.92] {
            fixture.animator.set_normalized_time(0, time);
            climb.update(&mut fixture.ctx(), DT, 1);
            fixture.body.position += climb.base().output.movement;
        }

        let top = Vec3::new(0.0, 1.2, -0.5) - Vec3::Z * 0.3;
        assert!((fixture.body.position - top).length() < 1e-4, "{}", fixture.body.position);
        assert!(climb.base().reach.iter().all(|r| r.is_complete()));

        fixture.animator.set_normalized_time(0, 0.96);
        assert!(!climb.should_continue(&fixture.ctx()));
        climb.deactivate(&mut fixture.ctx());
        assert!(fixture.body.gravity_enabled);
    }
}
