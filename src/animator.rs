//! Animator bridge.
//!
//! Motion units never compare animator states by name at runtime. Every
//! state path a unit cares about is resolved once, at load time, through the
//! [`AnimatorRegistry`] into an [`AnimatorStateId`]. Paths are qualified with
//! the animator layer name before lookup so identical paths on different
//! layers receive distinct ids.
//!
//! The host animation system owns the actual playback. Each frame it reports
//! the current state, transition and normalized time per layer into
//! [`MotionAnimator`], and consumes the phase requests units leave behind.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::error::MotionError;

/// Numeric handle for an animator state or transition.
///
/// `AnimatorStateId::NONE` (zero) means "no state" or "no transition".
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AnimatorStateId(u32);

impl AnimatorStateId {
    /// Sentinel for "no state".
    pub const NONE: Self = Self(0);

    /// Raw numeric value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Whether this id refers to an actual state.
    #[inline]
    pub fn is_some(self) -> bool {
        self.0 != 0
    }
}

/// Resolves human-readable animator paths to [`AnimatorStateId`]s.
///
/// In strict mode (the default) only declared paths resolve; anything else is
/// a configuration error. [`AnimatorRegistry::auto_declare`] builds a registry
/// that declares paths on first use, which suits hosts that derive ids from
/// the same strings the units use.
#[derive(Component, Debug, Clone, Default)]
pub struct AnimatorRegistry {
    layers: Vec<String>,
    ids: HashMap<String, AnimatorStateId>,
    paths: Vec<(usize, String)>,
    auto_declare: bool,
}

impl AnimatorRegistry {
    /// Create a strict registry with no layers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that declares unknown paths when they are resolved.
    pub fn auto_declare() -> Self {
        Self {
            auto_declare: true,
            ..default()
        }
    }

    /// Builder: add an animator layer.
    pub fn with_layer(mut self, name: impl Into<String>) -> Self {
        self.add_layer(name);
        self
    }

    /// Add an animator layer and return its index.
    pub fn add_layer(&mut self, name: impl Into<String>) -> usize {
        self.layers.push(name.into());
        self.layers.len() - 1
    }

    /// Name of an animator layer.
    pub fn layer_name(&self, layer: usize) -> Option<&str> {
        self.layers.get(layer).map(String::as_str)
    }

    /// Number of registered animator layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Declare a state path on a layer, returning its id.
    ///
    /// Declaring the same path twice returns the same id.
    pub fn declare(&mut self, layer: usize, path: &str) -> Result<AnimatorStateId, MotionError> {
        let key = self.qualify(layer, path)?;
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }

        let id = AnimatorStateId(self.paths.len() as u32 + 1);
        self.ids.insert(key, id);
        self.paths.push((layer, path.to_owned()));
        Ok(id)
    }

    /// Resolve a state path on a layer.
    ///
    /// Strict registries fail for undeclared paths; auto-declaring registries
    /// declare them.
    pub fn resolve(&mut self, layer: usize, path: &str) -> Result<AnimatorStateId, MotionError> {
        if self.auto_declare {
            return self.declare(layer, path);
        }

        let key = self.qualify(layer, path)?;
        self.ids
            .get(&key)
            .copied()
            .ok_or_else(|| MotionError::UnknownAnimatorState {
                layer,
                path: path.to_owned(),
            })
    }

    /// Look up an already declared id without declaring anything.
    pub fn id(&self, layer: usize, path: &str) -> Option<AnimatorStateId> {
        let key = self.qualify(layer, path).ok()?;
        self.ids.get(&key).copied()
    }

    /// The path an id was declared with, for diagnostics.
    pub fn path(&self, id: AnimatorStateId) -> Option<&str> {
        let index = (id.raw() as usize).checked_sub(1)?;
        self.paths.get(index).map(|(_, path)| path.as_str())
    }

    /// The animator layer an id belongs to.
    pub fn layer_of(&self, id: AnimatorStateId) -> Option<usize> {
        let index = (id.raw() as usize).checked_sub(1)?;
        self.paths.get(index).map(|(layer, _)| *layer)
    }

    fn qualify(&self, layer: usize, path: &str) -> Result<String, MotionError> {
        let name = self
            .layers
            .get(layer)
            .ok_or(MotionError::UnknownAnimatorLayer(layer))?;
        Ok(format!("{name}.{path}"))
    }
}

/// A discrete state-change request for the animator.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseRequest {
    /// Phase identifier understood by the animator graph.
    pub phase: i32,
    /// Extra integer parameter for the phase (exit style, side, ...).
    pub parameter: i32,
    /// Whether the request should fire as a trigger.
    pub triggered: bool,
}

/// Blend-tree parameters derived from smoothed input.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendParameters {
    /// Smoothed lateral input.
    pub input_x: f32,
    /// Smoothed forward input.
    pub input_y: f32,
    /// Smoothed input magnitude.
    pub magnitude: f32,
}

/// Playback state of one animator layer.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub struct AnimatorLayerState {
    /// Current state id.
    pub state: AnimatorStateId,
    /// Active transition id, `NONE` when not transitioning.
    pub transition: AnimatorStateId,
    /// Normalized playback time of the current state.
    pub normalized_time: f32,
    /// Phase request waiting for the animation system.
    pub pending_phase: Option<PhaseRequest>,
}

/// Contract the motion units use to talk to the animation system.
pub trait AnimatorBridge {
    /// Push a discrete state-change request onto a layer.
    fn set_motion_phase(&mut self, layer: usize, phase: i32, parameter: i32, triggered: bool);

    /// Current state id on a layer.
    fn state_id(&self, layer: usize) -> AnimatorStateId;

    /// Current transition id on a layer.
    fn transition_id(&self, layer: usize) -> AnimatorStateId;

    /// Normalized playback time of the current state on a layer.
    fn normalized_time(&self, layer: usize) -> f32;

    /// Publish smoothed blend parameters.
    fn set_blend_parameters(&mut self, _parameters: BlendParameters) {}

    /// Whether the layer is mid-transition.
    fn is_in_transition(&self, layer: usize) -> bool {
        self.transition_id(layer).is_some()
    }
}

/// Animator state shared between the host animation system and the motion units.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct MotionAnimator {
    layers: Vec<AnimatorLayerState>,
    /// Latest blend parameters published by the active units.
    pub blend: BlendParameters,
}

impl MotionAnimator {
    /// Create an animator bridge with the given number of layers.
    pub fn with_layers(count: usize) -> Self {
        Self {
            layers: vec![AnimatorLayerState::default(); count],
            blend: BlendParameters::default(),
        }
    }

    /// Playback state of a layer, if it exists.
    pub fn layer(&self, layer: usize) -> Option<&AnimatorLayerState> {
        self.layers.get(layer)
    }

    /// Report that a layer entered a state. Resets the normalized time.
    pub fn enter_state(&mut self, layer: usize, state: AnimatorStateId) {
        let entry = self.layer_entry(layer);
        entry.state = state;
        entry.transition = AnimatorStateId::NONE;
        entry.normalized_time = 0.0;
    }

    /// Report the current transition on a layer.
    pub fn set_transition(&mut self, layer: usize, transition: AnimatorStateId) {
        self.layer_entry(layer).transition = transition;
    }

    /// Report the normalized time on a layer.
    pub fn set_normalized_time(&mut self, layer: usize, normalized_time: f32) {
        self.layer_entry(layer).normalized_time = normalized_time;
    }

    /// Peek at the pending phase request of a layer.
    pub fn pending_phase(&self, layer: usize) -> Option<PhaseRequest> {
        self.layers.get(layer).and_then(|l| l.pending_phase)
    }

    /// Take the pending phase request of a layer.
    ///
    /// The host animation system calls this when it applies the request.
    pub fn take_phase(&mut self, layer: usize) -> Option<PhaseRequest> {
        self.layers.get_mut(layer).and_then(|l| l.pending_phase.take())
    }

    fn layer_entry(&mut self, layer: usize) -> &mut AnimatorLayerState {
        if self.layers.len() <= layer {
            self.layers.resize(layer + 1, AnimatorLayerState::default());
        }
        &mut self.layers[layer]
    }
}

impl AnimatorBridge for MotionAnimator {
    fn set_motion_phase(&mut self, layer: usize, phase: i32, parameter: i32, triggered: bool) {
        self.layer_entry(layer).pending_phase = Some(PhaseRequest {
            phase,
            parameter,
            triggered,
        });
    }

    fn state_id(&self, layer: usize) -> AnimatorStateId {
        self.layers.get(layer).map(|l| l.state).unwrap_or_default()
    }

    fn transition_id(&self, layer: usize) -> AnimatorStateId {
        self.layers.get(layer).map(|l| l.transition).unwrap_or_default()
    }

    fn normalized_time(&self, layer: usize) -> f32 {
        self.layers.get(layer).map(|l| l.normalized_time).unwrap_or(0.0)
    }

    fn set_blend_parameters(&mut self, parameters: BlendParameters) {
        self.blend = parameters;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AnimatorRegistry {
        AnimatorRegistry::new()
            .with_layer("Base Layer")
            .with_layer("Upper Layer")
    }

    #[test]
    fn declare_is_idempotent() {
        let mut registry = registry();
        let a = registry.declare(0, "Idle-SM.Idle").unwrap();
        let b = registry.declare(0, "Idle-SM.Idle").unwrap();
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn same_path_on_different_layers_gets_distinct_ids() {
        let mut registry = registry();
        let base = registry.declare(0, "Punch-SM.Punch").unwrap();
        let upper = registry.declare(1, "Punch-SM.Punch").unwrap();
        assert_ne!(base, upper);
        assert_eq!(registry.layer_of(base), Some(0));
        assert_eq!(registry.layer_of(upper), Some(1));
    }

    #[test]
    fn strict_registry_rejects_undeclared_paths() {
        let mut registry = registry();
        let err = registry.resolve(0, "Missing-SM.Nothing").unwrap_err();
        assert_eq!(
            err,
            MotionError::UnknownAnimatorState {
                layer: 0,
                path: "Missing-SM.Nothing".into()
            }
        );
    }

    #[test]
    fn unknown_layer_is_reported() {
        let mut registry = registry();
        assert_eq!(
            registry.declare(7, "Idle-SM.Idle"),
            Err(MotionError::UnknownAnimatorLayer(7))
        );
    }

    #[test]
    fn auto_declare_registry_resolves_anything() {
        let mut registry = AnimatorRegistry::auto_declare().with_layer("Base Layer");
        let id = registry.resolve(0, "Jump-SM.Rise").unwrap();
        assert_eq!(registry.id(0, "Jump-SM.Rise"), Some(id));
        assert_eq!(registry.path(id), Some("Jump-SM.Rise"));
    }

    #[test]
    fn animator_records_phase_requests_per_layer() {
        let mut animator = MotionAnimator::with_layers(2);
        animator.set_motion_phase(1, 3400, 2, true);

        assert_eq!(animator.pending_phase(0), None);
        let request = animator.take_phase(1).unwrap();
        assert_eq!(request.phase, 3400);
        assert_eq!(request.parameter, 2);
        assert!(animator.take_phase(1).is_none());
    }

    #[test]
    fn entering_a_state_resets_time_and_transition() {
        let mut animator = MotionAnimator::default();
        let id = AnimatorStateId(3);
        animator.set_normalized_time(0, 0.8);
        animator.set_transition(0, AnimatorStateId(9));
        animator.enter_state(0, id);

        assert_eq!(animator.state_id(0), id);
        assert_eq!(animator.normalized_time(0), 0.0);
        assert!(!animator.is_in_transition(0));
    }
}
