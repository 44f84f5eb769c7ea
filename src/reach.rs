//! Reach blending.
//!
//! Animations rarely put a hand exactly on a ledge. A [`ReachRequest`]
//! nudges the character toward a target point while one specific animator
//! state plays through a window of its normalized time. Progress is driven
//! by animation playback rather than wall-clock time, so the correction
//! follows the clip even when the frame rate or playback speed changes.
//!
//! Inside the window the cumulative correction is
//! `(target - origin) * progress^power`, where `origin` is the character's
//! position when the window opened and
//! `progress = (t - start) / (end - start)` clamped to `[0, 1]`. Each tick
//! returns only the increment since the previous tick. Outside the window a
//! request contributes nothing.

use bevy::prelude::*;

use crate::animator::AnimatorStateId;
use crate::collision::GroundFrame;
use crate::error::MotionError;

/// A validated span of normalized animation time.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct ReachWindow {
    start: f32,
    end: f32,
}

impl ReachWindow {
    /// Create a window. Requires `0 <= start < end <= 1`.
    pub fn new(start: f32, end: f32) -> Result<Self, MotionError> {
        let valid = start.is_finite()
            && end.is_finite()
            && start >= 0.0
            && end <= 1.0
            && start < end;
        if !valid {
            return Err(MotionError::InvalidReachWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window from bounds known to be valid. Used for built-in defaults.
    pub(crate) const fn from_valid(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Window start.
    #[inline]
    pub fn start(&self) -> f32 {
        self.start
    }

    /// Window end.
    #[inline]
    pub fn end(&self) -> f32 {
        self.end
    }

    /// Whether `normalized_time` lies inside the window (inclusive).
    #[inline]
    pub fn contains(&self, normalized_time: f32) -> bool {
        normalized_time >= self.start && normalized_time <= self.end
    }

    /// Fractional progress through the window, clamped to `[0, 1]`.
    #[inline]
    pub fn progress(&self, normalized_time: f32) -> f32 {
        ((normalized_time - self.start) / (self.end - self.start)).clamp(0.0, 1.0)
    }

    /// Progress shaped by an integer power. A power of zero is treated as one.
    #[inline]
    pub fn eased(&self, normalized_time: f32, power: u32) -> f32 {
        self.progress(normalized_time).powi(power.max(1) as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct ReachProgress {
    origin: Option<Vec3>,
    eased: f32,
    last_frame: Option<GroundFrame>,
    complete: bool,
}

/// A timed positional correction owned by one motion unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ReachRequest {
    /// Animator state the request is live in.
    pub state_id: AnimatorStateId,
    /// Normalized-time window of that state.
    pub window: ReachWindow,
    /// Exponent shaping the progress curve.
    pub power: u32,
    target: Vec3,
    ground: Option<Entity>,
    progress: ReachProgress,
}

impl ReachRequest {
    /// Create a linear request toward a world-space target.
    pub fn new(state_id: AnimatorStateId, window: ReachWindow, target: Vec3) -> Self {
        Self {
            state_id,
            window,
            power: 1,
            target,
            ground: None,
            progress: ReachProgress::default(),
        }
    }

    /// Builder: shape the progress curve with `progress^power`.
    pub fn with_power(mut self, power: u32) -> Self {
        self.power = power.max(1);
        self
    }

    /// Builder: anchor the target to a ground object.
    ///
    /// The target is stored in the object's local space so the correction
    /// stays attached to the object if it moves during the window.
    pub fn anchored_to(mut self, frame: GroundFrame) -> Self {
        self.target = frame.to_local_point(self.target);
        self.ground = Some(frame.entity);
        self.progress.last_frame = Some(frame);
        self
    }

    /// Ground object the request is anchored to.
    pub fn ground(&self) -> Option<Entity> {
        self.ground
    }

    /// Target in world space, given the anchor's current frame.
    pub fn world_target(&self, frame: Option<GroundFrame>) -> Vec3 {
        match self.resolve_frame(frame) {
            Some(frame) => frame.to_world_point(self.target),
            None => self.target,
        }
    }

    /// Whether the window has been passed.
    pub fn is_complete(&self) -> bool {
        self.progress.complete
    }

    /// Eased progress applied so far.
    pub fn applied(&self) -> f32 {
        self.progress.eased
    }

    fn resolve_frame(&self, frame: Option<GroundFrame>) -> Option<GroundFrame> {
        let ground = self.ground?;
        frame
            .filter(|f| f.entity == ground)
            .or(self.progress.last_frame)
    }

    fn step(&mut self, state_id: AnimatorStateId, normalized_time: f32, position: Vec3, frame: Option<GroundFrame>) -> Vec3 {
        if self.progress.complete || self.state_id != state_id {
            return Vec3::ZERO;
        }
        if normalized_time > self.window.end() {
            self.progress.complete = true;
            return Vec3::ZERO;
        }
        if !self.window.contains(normalized_time) {
            return Vec3::ZERO;
        }

        let frame = self.resolve_frame(frame);
        if frame.is_some() {
            self.progress.last_frame = frame;
        }

        // Work in the anchor's space so a moving ground carries the whole blend.
        let local_position = frame.map_or(position, |f| f.to_local_point(position));
        let origin = *self.progress.origin.get_or_insert(local_position);

        let eased = self.window.eased(normalized_time, self.power);
        let increment = eased - self.progress.eased;
        self.progress.eased = eased;
        if eased >= 1.0 {
            self.progress.complete = true;
        }

        let local_delta = (self.target - origin) * increment;
        frame.map_or(local_delta, |f| f.to_world_vector(local_delta))
    }
}

/// Positional increment for this tick from every live request.
///
/// `frames` resolves the current frame of a ground object; requests anchored
/// to an object it cannot resolve fall back to the last frame they saw.
pub fn compute_movement(
    requests: &mut [ReachRequest],
    state_id: AnimatorStateId,
    normalized_time: f32,
    position: Vec3,
    frames: impl Fn(Entity) -> Option<GroundFrame>,
) -> Vec3 {
    let mut delta = Vec3::ZERO;
    let mut position = position;
    for request in requests.iter_mut() {
        let frame = request.ground.and_then(&frames);
        let step = request.step(state_id, normalized_time, position, frame);
        position += step;
        delta += step;
    }
    delta
}

/// Yaw increment spreading `target_angle` (radians) across a window, shaped
/// by the same `progress^power` curve as [`compute_movement`].
///
/// `used_angle` records how much has been applied so far; each call applies
/// the difference between the eased share of the target and what was already
/// used, so non-uniform tick lengths never over- or under-shoot.
pub fn compute_rotation(
    window: &ReachWindow,
    target_angle: f32,
    used_angle: &mut f32,
    normalized_time: f32,
    power: u32,
) -> Quat {
    if !window.contains(normalized_time) {
        return Quat::IDENTITY;
    }

    let desired = target_angle * window.eased(normalized_time, power);
    let step = desired - *used_angle;
    *used_angle = desired;
    Quat::from_rotation_y(step)
}
