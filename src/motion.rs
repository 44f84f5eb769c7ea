//! Motion unit contract.
//!
//! A motion unit is one self-contained behavior (idle, walk, climb, ...).
//! Each unit embeds a [`MotionBase`] with the identity, flags and per-tick
//! outputs the arbitration core manages, and implements [`Motion`] for the
//! behavior itself. Everything a unit may touch is handed to it through a
//! [`MotionContext`]; units never reach for globals.
//!
//! Lifecycle of one unit, driven by its [`MotionLayer`](crate::layer::MotionLayer):
//!
//! ```text
//! Inactive ──can_activate──▶ Activating ──activate ok──▶ Active
//!    ▲                           │                          │
//!    │                       activate failed       should_continue == false
//!    │                           ▼                 or interrupted, handed off
//!    └──────────────────── Inactive ◀── Deactivating ◀──────┘
//! ```

use bevy::prelude::*;

use crate::animator::{AnimatorBridge, AnimatorRegistry, AnimatorStateId};
use crate::camera::{CameraFrame, MotionCamera};
use crate::config::CharacterBody;
use crate::detection::GeometryProbe;
use crate::error::MotionError;
use crate::intent::MotionInput;
use crate::reach::{self, ReachRequest};
use crate::smoothing::InputSnapshot;

/// Broad kind of a unit, for queries and interruption rules.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MotionCategory {
    /// Standing still.
    #[default]
    Idle,
    /// Walking or running.
    Walk,
    /// Jumping.
    Jump,
    /// Falling.
    Fall,
    /// Climbing onto an edge.
    Climb,
    /// Vaulting over an obstacle.
    Vault,
    /// Sliding down a slope.
    Slide,
    /// Sneaking.
    Sneak,
    /// Attacking.
    Attack,
    /// Anything else.
    Custom,
}

/// Where a unit is in its lifecycle.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MotionPhase {
    /// Not running.
    #[default]
    Inactive,
    /// Inside its `activate` call.
    Activating,
    /// Running.
    Active,
    /// Inside its `deactivate` call.
    Deactivating,
}

/// Stable address of a unit inside its controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MotionHandle {
    /// Motion layer index.
    pub layer: usize,
    /// Registration index within the layer.
    pub index: usize,
}

impl MotionHandle {
    /// Create a handle.
    pub const fn new(layer: usize, index: usize) -> Self {
        Self { layer, index }
    }
}

/// Movement a unit produces for one tick. Recomputed from scratch every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionOutput {
    /// World-space displacement for this tick.
    pub movement: Vec3,
    /// Rotation to apply this tick.
    pub rotation: Quat,
    /// Angular velocity (radians per second) around each world axis.
    pub angular_velocity: Vec3,
    /// Velocity to integrate this tick, on top of `movement`.
    pub velocity: Vec3,
}

impl Default for MotionOutput {
    fn default() -> Self {
        Self {
            movement: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            angular_velocity: Vec3::ZERO,
            velocity: Vec3::ZERO,
        }
    }
}

impl MotionOutput {
    /// Zero every channel.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Combine with the output of another layer.
    pub fn combine(&mut self, other: &MotionOutput) {
        self.movement += other.movement;
        self.rotation = other.rotation * self.rotation;
        self.angular_velocity += other.angular_velocity;
        self.velocity += other.velocity;
    }
}

/// State every unit carries, managed by the arbitration core.
#[derive(Debug, Clone)]
pub struct MotionBase {
    name: String,
    /// Higher wins. Ties go to the unit registered first.
    pub priority: i32,
    /// Broad kind of the unit.
    pub category: MotionCategory,
    /// Whether the unit is considered for activation.
    pub is_startable: bool,
    /// Animator layer the unit's states live on.
    pub animator_layer: usize,
    /// Outputs of the current tick.
    pub output: MotionOutput,
    /// Queued reach corrections, cleared on deactivation.
    pub reach: Vec<ReachRequest>,
    pub(crate) phase: MotionPhase,
    pub(crate) is_activated_frame: bool,
    pub(crate) is_animator_active: bool,
    pub(crate) handle: MotionHandle,
    pub(crate) active_time: f32,
    states: Vec<AnimatorStateId>,
}

impl MotionBase {
    /// Create the base of an inactive, startable unit.
    pub fn new(name: impl Into<String>, priority: i32, category: MotionCategory) -> Self {
        Self {
            name: name.into(),
            priority,
            category,
            is_startable: true,
            animator_layer: 0,
            output: MotionOutput::default(),
            reach: Vec::new(),
            phase: MotionPhase::Inactive,
            is_activated_frame: false,
            is_animator_active: false,
            handle: MotionHandle::default(),
            active_time: 0.0,
            states: Vec::new(),
        }
    }

    /// Builder: place the unit's states on another animator layer.
    pub fn with_animator_layer(mut self, layer: usize) -> Self {
        self.animator_layer = layer;
        self
    }

    /// Stable key of the unit.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Whether the unit is running.
    pub fn is_active(&self) -> bool {
        self.phase == MotionPhase::Active
    }

    /// True only during the tick the unit became active.
    pub fn is_activated_frame(&self) -> bool {
        self.is_activated_frame
    }

    /// Whether the animator has entered one of the unit's states since activation.
    pub fn is_animator_active(&self) -> bool {
        self.is_animator_active
    }

    /// Address of the unit in its controller.
    pub fn handle(&self) -> MotionHandle {
        self.handle
    }

    /// Seconds the unit has been running.
    pub fn active_time(&self) -> f32 {
        self.active_time
    }

    /// Resolved id of the unit's `i`-th declared animator state.
    ///
    /// `NONE` until animator data has been loaded.
    pub fn state(&self, i: usize) -> AnimatorStateId {
        self.states.get(i).copied().unwrap_or_default()
    }

    /// Whether `id` is one of the unit's states.
    pub fn owns_state(&self, id: AnimatorStateId) -> bool {
        id.is_some() && self.states.contains(&id)
    }

    /// Whether the unit has any resolved states.
    pub fn has_states(&self) -> bool {
        !self.states.is_empty()
    }

    /// Install resolved animator state ids, in declaration order.
    pub fn set_animator_states(&mut self, states: Vec<AnimatorStateId>) {
        self.states = states;
    }

    pub(crate) fn reset_runtime(&mut self) {
        self.is_activated_frame = false;
        self.is_animator_active = false;
        self.active_time = 0.0;
        self.reach.clear();
        self.output.reset();
    }
}

/// Character stance shared by every unit of a controller.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stance {
    /// Upright.
    #[default]
    Normal,
    /// Crouched and quiet.
    Sneaking,
}

/// The unit currently holding a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveMotionInfo {
    /// Priority of the active unit.
    pub priority: i32,
    /// Category of the active unit.
    pub category: MotionCategory,
    /// Address of the active unit.
    pub handle: MotionHandle,
}

/// What a unit can see about the layer it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayerStatus {
    /// Layer index.
    pub index: usize,
    /// The unit holding the layer, if any.
    pub active: Option<ActiveMotionInfo>,
    /// Seconds the layer has been without an active unit.
    pub empty_time: f32,
    /// Seconds the active unit has held the layer.
    pub active_time: f32,
}

/// Everything a unit may read or change during one call.
pub struct MotionContext<'a> {
    /// Character body: ground state, velocity, shared toggles.
    pub body: &'a mut CharacterBody,
    /// Animator bridge.
    pub animator: &'a mut dyn AnimatorBridge,
    /// Input of this tick.
    pub input: &'a MotionInput,
    /// Raycasts and edge detection.
    pub probe: &'a dyn GeometryProbe,
    /// Camera direction and post-update listeners.
    pub camera: &'a mut MotionCamera,
    /// Stance shared by every unit of the controller.
    pub stance: Stance,
    pub(crate) layer: LayerStatus,
    pub(crate) handoff: Option<String>,
    pub(crate) snapshot: Option<InputSnapshot>,
}

impl<'a> MotionContext<'a> {
    /// Assemble a context from its collaborators.
    pub fn new(
        body: &'a mut CharacterBody,
        animator: &'a mut dyn AnimatorBridge,
        input: &'a MotionInput,
        probe: &'a dyn GeometryProbe,
        camera: &'a mut MotionCamera,
    ) -> Self {
        Self {
            body,
            animator,
            input,
            probe,
            camera,
            stance: Stance::Normal,
            layer: LayerStatus::default(),
            handoff: None,
            snapshot: None,
        }
    }

    /// Status of the layer the called unit belongs to.
    pub fn layer(&self) -> &LayerStatus {
        &self.layer
    }

    /// Ask the layer to switch to the unit named `name` after this update.
    ///
    /// The target activates without polling and runs its first update in
    /// the same tick.
    pub fn request_handoff(&mut self, name: impl Into<String>) {
        self.handoff = Some(name.into());
    }

    /// Leave blended input values for the unit that activates next this tick.
    pub fn store_snapshot(&mut self, snapshot: InputSnapshot) {
        self.snapshot = Some(snapshot);
    }

    /// Take blended input values left by the previous unit.
    pub fn take_snapshot(&mut self) -> Option<InputSnapshot> {
        self.snapshot.take()
    }

    /// Current animator state on a layer.
    pub fn state_id(&self, layer: usize) -> AnimatorStateId {
        self.animator.state_id(layer)
    }

    /// Normalized time of the current animator state on a layer.
    pub fn normalized_time(&self, layer: usize) -> f32 {
        self.animator.normalized_time(layer)
    }

    /// Reach movement for this tick from a unit's queued requests.
    pub fn reach_movement(&self, base: &mut MotionBase) -> Vec3 {
        let layer = base.animator_layer;
        reach::compute_movement(
            &mut base.reach,
            self.animator.state_id(layer),
            self.animator.normalized_time(layer),
            self.body.position,
            |entity| self.probe.frame(entity),
        )
    }
}

/// Behavior of one motion unit.
///
/// Operations are called by the owning layer, once per tick at most, in
/// this order: `should_continue` (when active), `can_activate` and
/// `can_interrupt` (when polled), `activate`, `update`,
/// `adjust_root_motion`. `deactivate` runs exactly once per successful
/// activation.
pub trait Motion: Send + Sync + 'static {
    /// Shared state managed by the core.
    fn base(&self) -> &MotionBase;

    /// Mutable shared state.
    fn base_mut(&mut self) -> &mut MotionBase;

    /// Human-readable animator paths the unit uses, resolved once at load.
    fn animator_states(&self) -> &'static [&'static str] {
        &[]
    }

    /// Resolve the unit's animator paths to ids.
    fn load_animator_data(&mut self, registry: &mut AnimatorRegistry) -> Result<(), MotionError> {
        let layer = self.base().animator_layer;
        let ids = self
            .animator_states()
            .iter()
            .map(|path| registry.resolve(layer, path))
            .collect::<Result<Vec<_>, _>>()?;
        self.base_mut().set_animator_states(ids);
        Ok(())
    }

    /// Whether the unit wants to start. May cache probe results for `activate`.
    fn can_activate(&mut self, ctx: &MotionContext) -> bool;

    /// Whether the running unit yields to `candidate`.
    fn can_interrupt(&mut self, _candidate: &MotionBase, _ctx: &mut MotionContext) -> bool {
        true
    }

    /// Start the unit. Returning `false` leaves it inactive.
    fn activate(&mut self, _previous: Option<&MotionBase>, _ctx: &mut MotionContext) -> bool {
        true
    }

    /// Whether the running unit keeps the layer. Never asked on the tick the
    /// unit activated.
    fn should_continue(&mut self, _ctx: &MotionContext) -> bool {
        true
    }

    /// Compute this tick's outputs into `base_mut().output`.
    fn update(&mut self, ctx: &mut MotionContext, dt: f32, tick: u32);

    /// Rewrite the animation root motion before it is applied.
    ///
    /// `movement` is in the character's local space.
    fn adjust_root_motion(
        &mut self,
        _ctx: &MotionContext,
        _dt: f32,
        _tick: u32,
        _movement: &mut Vec3,
        _rotation: &mut Quat,
    ) {
    }

    /// Stop the unit and restore anything it changed.
    fn deactivate(&mut self, _ctx: &mut MotionContext) {}

    /// Camera post-update callback for subscribed units. Returns a yaw correction.
    fn on_camera_updated(&mut self, _ctx: &mut MotionContext, _frame: &CameraFrame, _dt: f32) -> Quat {
        Quat::IDENTITY
    }
}
