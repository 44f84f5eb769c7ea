//! Input source component.
//!
//! Your code handles devices; the controller only receives values. Write
//! the analog axes and the held state of each named action every frame and
//! the controller derives the just-pressed / released edges once per fixed
//! tick, so a press is seen by exactly one arbitration pass.

use std::collections::HashMap;

use bevy::prelude::*;

/// Well-known action names used by the bundled motions.
pub mod actions {
    /// Jump.
    pub const JUMP: &str = "Jump";
    /// Climb or vault onto the edge in front.
    pub const INTERACT: &str = "Interact";
    /// Toggle between normal and sneaking stance.
    pub const CHANGE_STANCE: &str = "ChangeStance";
    /// Upper-body attack.
    pub const ATTACK: &str = "Attack";
}

/// Held state and derived edges of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionState {
    /// Whether the action is held now.
    pub held: bool,
    held_prev: bool,
    just_pressed: bool,
    just_released: bool,
}

impl ActionState {
    /// Whether the action went down this tick.
    pub fn just_pressed(&self) -> bool {
        self.just_pressed
    }

    /// Whether the action went up this tick.
    pub fn just_released(&self) -> bool {
        self.just_released
    }

    fn latch(&mut self) {
        self.just_pressed = self.held && !self.held_prev;
        self.just_released = !self.held && self.held_prev;
        self.held_prev = self.held;
    }
}

/// Player or AI input feeding the motion units.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_motion_controller::prelude::*;
///
/// let mut input = MotionInput::default();
/// input.set_movement(Vec2::new(0.0, 2.0));
/// assert_eq!(input.magnitude(), 1.0);
///
/// input.set_action(actions::JUMP, true);
/// input.update_edges();
/// assert!(input.is_just_pressed(actions::JUMP));
/// input.update_edges();
/// assert!(!input.is_just_pressed(actions::JUMP));
/// assert!(input.is_pressed(actions::JUMP));
/// ```
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct MotionInput {
    /// Movement stick: x = strafe right, y = forward. Clamped to the unit disc.
    pub movement: Vec2,
    /// View stick or mouse delta: x = yaw, y = pitch.
    pub view: Vec2,
    /// Whether the player is actively steering the view (e.g. mouse button held).
    pub viewing_activated: bool,
    #[reflect(ignore)]
    actions: HashMap<String, ActionState>,
}

impl MotionInput {
    /// Create an idle input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the movement stick, clamped to the unit disc.
    pub fn set_movement(&mut self, movement: Vec2) {
        self.movement = movement.clamp_length_max(1.0);
    }

    /// Lateral movement input.
    #[inline]
    pub fn movement_x(&self) -> f32 {
        self.movement.x
    }

    /// Forward movement input.
    #[inline]
    pub fn movement_y(&self) -> f32 {
        self.movement.y
    }

    /// Horizontal view input.
    #[inline]
    pub fn view_x(&self) -> f32 {
        self.view.x
    }

    /// Length of the movement input in `[0, 1]`.
    #[inline]
    pub fn magnitude(&self) -> f32 {
        self.movement.length().min(1.0)
    }

    /// Record whether an action is held. Edges appear after the next [`update_edges`].
    ///
    /// [`update_edges`]: MotionInput::update_edges
    pub fn set_action(&mut self, action: &str, held: bool) {
        match self.actions.get_mut(action) {
            Some(state) => state.held = held,
            None => {
                self.actions.insert(
                    action.to_owned(),
                    ActionState {
                        held,
                        ..default()
                    },
                );
            }
        }
    }

    /// Release every action and centre the sticks.
    pub fn clear(&mut self) {
        self.movement = Vec2::ZERO;
        self.view = Vec2::ZERO;
        self.viewing_activated = false;
        for state in self.actions.values_mut() {
            state.held = false;
        }
    }

    /// Whether an action is held.
    pub fn is_pressed(&self, action: &str) -> bool {
        self.actions.get(action).is_some_and(|s| s.held)
    }

    /// Whether an action went down during the current tick.
    pub fn is_just_pressed(&self, action: &str) -> bool {
        self.actions.get(action).is_some_and(|s| s.just_pressed)
    }

    /// Whether an action went up during the current tick.
    pub fn is_released(&self, action: &str) -> bool {
        self.actions.get(action).is_some_and(|s| s.just_released)
    }

    /// Full state of an action.
    pub fn action(&self, action: &str) -> Option<ActionState> {
        self.actions.get(action).copied()
    }

    /// Derive press / release edges against the previous tick.
    ///
    /// Called once per fixed tick by the controller.
    pub fn update_edges(&mut self) {
        for state in self.actions.values_mut() {
            state.latch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_is_clamped_to_the_unit_disc() {
        let mut input = MotionInput::new();
        input.set_movement(Vec2::new(3.0, 4.0));
        assert!((input.movement.length() - 1.0).abs() < 1e-6);
        assert!((input.movement_x() - 0.6).abs() < 1e-6);

        input.set_movement(Vec2::new(0.3, 0.4));
        assert!((input.magnitude() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn press_edges_last_one_tick() {
        let mut input = MotionInput::new();
        input.set_action(actions::INTERACT, true);
        assert!(!input.is_just_pressed(actions::INTERACT));

        input.update_edges();
        assert!(input.is_just_pressed(actions::INTERACT));
        assert!(input.is_pressed(actions::INTERACT));

        input.update_edges();
        assert!(!input.is_just_pressed(actions::INTERACT));
        assert!(input.is_pressed(actions::INTERACT));
    }

    #[test]
    fn release_edges_last_one_tick() {
        let mut input = MotionInput::new();
        input.set_action(actions::JUMP, true);
        input.update_edges();
        input.set_action(actions::JUMP, false);
        input.update_edges();
        assert!(input.is_released(actions::JUMP));
        assert!(!input.is_pressed(actions::JUMP));

        input.update_edges();
        assert!(!input.is_released(actions::JUMP));
    }

    #[test]
    fn unknown_actions_are_idle() {
        let input = MotionInput::new();
        assert!(!input.is_pressed("Dance"));
        assert!(!input.is_just_pressed("Dance"));
        assert!(input.action("Dance").is_none());
    }

    #[test]
    fn clear_releases_held_actions() {
        let mut input = MotionInput::new();
        input.set_movement(Vec2::Y);
        input.set_action(actions::ATTACK, true);
        input.update_edges();
        input.clear();
        input.update_edges();
        assert_eq!(input.magnitude(), 0.0);
        assert!(input.is_released(actions::ATTACK));
    }
}
