//! Camera rig hook.
//!
//! Units that rotate the character toward the camera apply their yaw after
//! the camera has finished moving for the frame, otherwise the character
//! visibly lags one frame behind. They subscribe while active and the
//! dispatch system calls back into them once per frame.

use bevy::prelude::*;

use crate::motion::MotionHandle;

/// Camera state shared with the motion units of one character.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct MotionCamera {
    /// World-space forward direction of the camera.
    pub forward: Vec3,
    #[reflect(ignore)]
    listeners: Vec<MotionHandle>,
}

impl Default for MotionCamera {
    fn default() -> Self {
        Self {
            forward: Vec3::NEG_Z,
            listeners: Vec::new(),
        }
    }
}

impl MotionCamera {
    /// Create a camera facing `forward`.
    pub fn new(forward: Vec3) -> Self {
        Self {
            forward,
            ..default()
        }
    }

    /// Camera forward flattened onto the plane perpendicular to `up`.
    pub fn planar_forward(&self, up: Vec3) -> Vec3 {
        let flat = self.forward - up * self.forward.dot(up);
        flat.try_normalize().unwrap_or(Vec3::NEG_Z)
    }

    /// Register a unit for post-update callbacks. Subscribing twice is a no-op.
    pub fn subscribe(&mut self, handle: MotionHandle) {
        if !self.listeners.contains(&handle) {
            self.listeners.push(handle);
        }
    }

    /// Remove a unit from the listener list.
    pub fn unsubscribe(&mut self, handle: MotionHandle) {
        self.listeners.retain(|h| *h != handle);
    }

    /// Whether a unit is currently subscribed.
    pub fn is_subscribed(&self, handle: MotionHandle) -> bool {
        self.listeners.contains(&handle)
    }

    /// Subscribed units in subscription order.
    pub fn listeners(&self) -> &[MotionHandle] {
        &self.listeners
    }
}

/// Camera placement handed to subscribed units after the rig moved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    /// World-space camera forward.
    pub forward: Vec3,
    /// Up direction of the character the frame is dispatched to.
    pub up: Vec3,
}

impl CameraFrame {
    /// Signed yaw (radians, around `up`) that turns `facing` toward the camera forward.
    pub fn yaw_from(&self, facing: Vec3) -> f32 {
        signed_yaw(facing, self.forward, self.up)
    }
}

/// Signed angle around `up` from `from` to `to`, both flattened onto the ground plane.
///
/// Returns zero when either direction is parallel to `up`.
pub fn signed_yaw(from: Vec3, to: Vec3, up: Vec3) -> f32 {
    let from = (from - up * from.dot(up)).normalize_or_zero();
    let to = (to - up * to.dot(up)).normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return 0.0;
    }
    let sin = from.cross(to).dot(up);
    let cos = from.dot(to);
    sin.atan2(cos)
}
