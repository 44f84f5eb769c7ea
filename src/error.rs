//! Configuration errors.
//!
//! Runtime arbitration never fails: a unit that cannot run simply declines.
//! These errors describe problems that are detectable once, when a
//! controller is assembled or its animator data is loaded.

use thiserror::Error;

/// Configuration problem reported while building or loading a motion controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    /// An animator state path was not declared on the given animator layer.
    #[error("animator state `{path}` is not declared on animator layer {layer}")]
    UnknownAnimatorState {
        /// Animator layer the lookup was qualified with.
        layer: usize,
        /// Human-readable state path.
        path: String,
    },

    /// The animator layer index has no registered name.
    #[error("animator layer {0} is not registered")]
    UnknownAnimatorLayer(usize),

    /// A reach window is empty, inverted, or outside normalized time.
    #[error("reach window [{start}, {end}] must satisfy 0 <= start < end <= 1")]
    InvalidReachWindow {
        /// Window start (normalized time).
        start: f32,
        /// Window end (normalized time).
        end: f32,
    },

    /// Two units with the same name were added to one controller.
    #[error("a motion named `{0}` is already registered")]
    DuplicateMotion(String),

    /// No unit with this name is registered.
    #[error("no motion named `{0}` is registered")]
    UnknownMotion(String),

    /// The motion layer index does not exist on the controller.
    #[error("motion layer {0} does not exist")]
    UnknownMotionLayer(usize),
}
