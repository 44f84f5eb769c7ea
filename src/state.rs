//! State marker components.
//!
//! These components mirror the controller's state for other systems to
//! query. They are added, removed and refreshed by
//! [`sync_state_markers`](crate::systems::sync_state_markers) after the
//! motion output has been applied.

use bevy::prelude::*;

/// Marker component indicating the character is grounded.
///
/// Added when the ground probe finds walkable ground within tolerance.
/// Removed when the character becomes airborne.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_motion_controller::prelude::*;
///
/// // Grounded is a marker component - just use it in queries
/// fn check_grounded(grounded: Option<&Grounded>) -> bool {
///     grounded.is_some()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Name of the running unit on each motion layer, index by layer.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct ActiveMotions {
    /// Running unit per layer, `None` for an empty layer.
    pub names: Vec<Option<String>>,
}

impl ActiveMotions {
    /// Whether a unit with this name is running on any layer.
    pub fn is_active(&self, name: &str) -> bool {
        self.names.iter().flatten().any(|n| n == name)
    }

    /// Running unit on a layer.
    pub fn layer(&self, index: usize) -> Option<&str> {
        self.names.get(index).and_then(|n| n.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_motions_lookup() {
        let active = ActiveMotions {
            names: vec![Some("walk_run".into()), None],
        };
        assert!(active.is_active("walk_run"));
        assert!(!active.is_active("punch"));
        assert_eq!(active.layer(0), Some("walk_run"));
        assert_eq!(active.layer(1), None);
        assert_eq!(active.layer(7), None);
    }
}
