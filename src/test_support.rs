//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use bevy::prelude::*;

use crate::animator::{AnimatorRegistry, AnimatorStateId, MotionAnimator};
use crate::camera::MotionCamera;
use crate::collision::{CollisionData, GroundFrame};
use crate::config::CharacterBody;
use crate::detection::{EdgeHit, EdgeProbe, GeometryProbe, StaticGeometry, detect_forward_edge};
use crate::intent::MotionInput;
use crate::motion::{Motion, MotionBase, MotionCategory, MotionContext, Stance};

/// Geometry for tests: a box world, optionally with a scripted edge.
#[derive(Debug, Clone, Default)]
pub(crate) struct FixtureProbe {
    pub geometry: StaticGeometry,
    pub edge: Option<EdgeHit>,
    pub dead: Vec<Entity>,
}

impl GeometryProbe for FixtureProbe {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData> {
        self.geometry.raycast(origin, direction, max_distance)
    }

    fn is_alive(&self, entity: Entity) -> bool {
        !self.dead.contains(&entity)
    }

    fn frame(&self, entity: Entity) -> Option<GroundFrame> {
        self.geometry.frame(entity)
    }

    fn forward_edge(&self, feet: Vec3, forward: Vec3, up: Vec3, probe: &EdgeProbe) -> Option<EdgeHit> {
        self.edge
            .or_else(|| detect_forward_edge(&self.geometry, feet, forward, up, probe))
    }
}

/// Everything a [`MotionContext`] borrows, owned in one place.
pub(crate) struct Fixture {
    pub body: CharacterBody,
    pub animator: MotionAnimator,
    pub input: MotionInput,
    pub camera: MotionCamera,
    pub probe: FixtureProbe,
    pub registry: AnimatorRegistry,
    pub stance: Stance,
}

impl Fixture {
    /// A grounded character at the origin facing -Z.
    pub fn new() -> Self {
        Self {
            body: CharacterBody::grounded_at(Vec3::ZERO),
            animator: MotionAnimator::with_layers(2),
            input: MotionInput::default(),
            camera: MotionCamera::default(),
            probe: FixtureProbe::default(),
            registry: AnimatorRegistry::auto_declare()
                .with_layer("Base Layer")
                .with_layer("Upper Layer"),
            stance: Stance::Normal,
        }
    }

    /// An airborne character `height` above the floor.
    pub fn airborne(height: f32) -> Self {
        let mut fixture = Self::new();
        fixture.body.grounded = false;
        fixture.body.floor = Some(CollisionData::new(height, Vec3::Y, Vec3::ZERO, None));
        fixture
    }

    pub fn ctx(&mut self) -> MotionContext<'_> {
        let mut ctx = MotionContext::new(
            &mut self.body,
            &mut self.animator,
            &self.input,
            &self.probe,
            &mut self.camera,
        );
        ctx.stance = self.stance;
        ctx
    }

    pub fn declare(&mut self, layer: usize, path: &str) -> AnimatorStateId {
        self.registry.declare(layer, path).unwrap()
    }

    /// Load a unit's animator data against the fixture registry.
    pub fn load(&mut self, motion: &mut dyn Motion) {
        motion.load_animator_data(&mut self.registry).unwrap();
    }

    /// Press an action for one tick.
    pub fn press(&mut self, action: &str) {
        self.input.set_action(action, true);
        self.input.update_edges();
    }

    /// Release an action and latch the edge.
    pub fn release(&mut self, action: &str) {
        self.input.set_action(action, false);
        self.input.update_edges();
    }

    /// Id of one of a unit's declared states.
    pub fn state_of(&self, motion: &dyn Motion, path: &str) -> AnimatorStateId {
        let index = motion
            .animator_states()
            .iter()
            .position(|p| *p == path)
            .unwrap();
        motion.base().state(index)
    }
}

/// Recorded calls and switches of a [`Scripted`] unit.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptState {
    pub activates: bool,
    pub continues: bool,
    pub interruptible: bool,
    pub activation_succeeds: bool,
    pub handoff: Option<String>,
    pub can_activate_calls: usize,
    pub activations: usize,
    pub deactivations: usize,
    pub updates: usize,
    pub previous: Option<String>,
}

/// Shared view into a [`Scripted`] unit after it moved into a layer.
#[derive(Debug, Clone)]
pub(crate) struct Script(Arc<Mutex<ScriptState>>);

impl Script {
    pub fn get(&self) -> ScriptState {
        self.0.lock().unwrap().clone()
    }

    pub fn set_activates(&self, value: bool) {
        self.0.lock().unwrap().activates = value;
    }

    pub fn set_continues(&self, value: bool) {
        self.0.lock().unwrap().continues = value;
    }
}

/// A unit whose decisions are switched from the test.
pub(crate) struct Scripted {
    base: MotionBase,
    script: Script,
}

impl Scripted {
    pub fn new(name: &str, priority: i32) -> Self {
        let state = ScriptState {
            continues: true,
            interruptible: true,
            activation_succeeds: true,
            ..default()
        };
        Self {
            base: MotionBase::new(name, priority, MotionCategory::Custom),
            script: Script(Arc::new(Mutex::new(state))),
        }
    }

    pub fn activates(self, value: bool) -> Self {
        self.script.set_activates(value);
        self
    }

    pub fn interruptible(self, value: bool) -> Self {
        self.script.0.lock().unwrap().interruptible = value;
        self
    }

    pub fn activation_succeeds(self, value: bool) -> Self {
        self.script.0.lock().unwrap().activation_succeeds = value;
        self
    }

    pub fn hands_off_to(self, name: &str) -> Self {
        self.script.0.lock().unwrap().handoff = Some(name.to_owned());
        self
    }

    pub fn probe(&self) -> Script {
        self.script.clone()
    }
}

impl Motion for Scripted {
    fn base(&self) -> &MotionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MotionBase {
        &mut self.base
    }

    fn can_activate(&mut self, _ctx: &MotionContext) -> bool {
        let mut state = self.script.0.lock().unwrap();
        state.can_activate_calls += 1;
        state.activates
    }

    fn can_interrupt(&mut self, _candidate: &MotionBase, _ctx: &mut MotionContext) -> bool {
        self.script.0.lock().unwrap().interruptible
    }

    fn activate(&mut self, previous: Option<&MotionBase>, _ctx: &mut MotionContext) -> bool {
        let mut state = self.script.0.lock().unwrap();
        if !state.activation_succeeds {
            return false;
        }
        state.activations += 1;
        state.previous = previous.map(|p| p.name().to_owned());
        true
    }

    fn should_continue(&mut self, _ctx: &MotionContext) -> bool {
        self.script.0.lock().unwrap().continues
    }

    fn update(&mut self, ctx: &mut MotionContext, _dt: f32, _tick: u32) {
        let handoff = {
            let mut state = self.script.0.lock().unwrap();
            state.updates += 1;
            state.handoff.clone()
        };
        if let Some(target) = handoff {
            ctx.request_handoff(target);
        }
    }

    fn deactivate(&mut self, _ctx: &mut MotionContext) {
        self.script.0.lock().unwrap().deactivations += 1;
    }
}
