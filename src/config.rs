//! Character body components.
//!
//! [`CharacterBody`] is what the motion units know about the physical
//! character: ground contact, slope, velocity and the shared toggles units
//! may flip while active. [`BodyConfig`] tunes the ground probe that fills
//! it in.

use bevy::prelude::*;

use crate::collision::{CollisionData, GroundFrame};

/// Physical state of a character as seen by its motion units.
///
/// Sensor systems refresh the ground and transform fields every fixed tick
/// before arbitration runs. Units request changes through [`add_impulse`],
/// [`set_ground`] and the toggles; the application system flushes them to
/// the physics backend after arbitration.
///
/// [`add_impulse`]: CharacterBody::add_impulse
/// [`set_ground`]: CharacterBody::set_ground
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct CharacterBody {
    // === Ground ===
    /// Floor hit below the feet. `distance` is measured from the feet.
    #[reflect(ignore)]
    pub floor: Option<CollisionData>,
    /// Slope angle of the floor in radians (0 = flat). Valid when floor is Some.
    pub slope_angle: f32,
    /// Whether the feet are within ground tolerance of the floor.
    pub grounded: bool,
    /// Seconds since the body was last grounded.
    pub time_since_grounded: f32,
    /// Current placement of the object being stood on or held.
    #[reflect(ignore)]
    pub ground_frame: Option<GroundFrame>,

    // === Kinematics (snapshot of this tick) ===
    /// World position of the feet.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quat,
    /// Linear velocity.
    pub velocity: Vec3,
    /// Up direction.
    pub up: Vec3,
    /// Gravity acceleration used by backends that integrate it themselves.
    pub gravity: Vec3,

    // === Shared toggles ===
    /// Whether gravity acts on the body.
    pub gravity_enabled: bool,
    /// Whether the body collides with the world.
    pub collision_enabled: bool,
    /// Whether the body is pushed out of the ground when it sinks into it.
    pub fix_ground_penetration: bool,

    // === Pending requests ===
    /// Ground object forced by a unit, overriding the probed floor.
    pub(crate) ground_override: Option<Entity>,
    pub(crate) pending_impulse: Vec3,
}

impl Default for CharacterBody {
    fn default() -> Self {
        Self {
            floor: None,
            slope_angle: 0.0,
            grounded: false,
            time_since_grounded: 0.0,
            ground_frame: None,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            up: Vec3::Y,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            gravity_enabled: true,
            collision_enabled: true,
            fix_ground_penetration: true,
            ground_override: None,
            pending_impulse: Vec3::ZERO,
        }
    }
}

impl CharacterBody {
    /// Create a body with default gravity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a body standing on the ground at `position`.
    pub fn grounded_at(position: Vec3) -> Self {
        Self {
            floor: Some(CollisionData::new(0.0, Vec3::Y, position, None)),
            grounded: true,
            position,
            ..default()
        }
    }

    /// Queue a velocity change, applied after arbitration.
    pub fn add_impulse(&mut self, impulse: Vec3) {
        self.pending_impulse += impulse;
    }

    /// Take the queued impulse, leaving zero.
    pub fn take_impulse(&mut self) -> Vec3 {
        std::mem::take(&mut self.pending_impulse)
    }

    /// Impulse queued so far this tick.
    pub fn pending_impulse(&self) -> Vec3 {
        self.pending_impulse
    }

    /// Force the ground reference, e.g. to the object being climbed.
    ///
    /// `None` returns to the probed floor.
    pub fn set_ground(&mut self, ground: Option<Entity>) {
        self.ground_override = ground;
    }

    /// Ground reference: the forced object if any, else the floor entity.
    pub fn ground(&self) -> Option<Entity> {
        self.ground_override.or_else(|| self.floor.and_then(|f| f.entity))
    }

    /// Distance from the feet to the floor, infinite when none was found.
    #[inline]
    pub fn ground_distance(&self) -> f32 {
        self.floor.map(|f| f.distance).unwrap_or(f32::INFINITY)
    }

    /// Floor normal, or up when airborne.
    #[inline]
    pub fn ground_normal(&self) -> Vec3 {
        self.floor.map(|f| f.normal).unwrap_or(self.up)
    }

    /// Facing direction.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Right-hand direction.
    #[inline]
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Velocity along up.
    #[inline]
    pub fn vertical_speed(&self) -> f32 {
        self.velocity.dot(self.up)
    }

    /// Velocity with the vertical part removed.
    #[inline]
    pub fn horizontal_velocity(&self) -> Vec3 {
        self.velocity - self.up * self.vertical_speed()
    }

    /// Refresh ground state from a floor probe.
    ///
    /// `hit.distance` must already be measured from the feet.
    pub fn update_ground(&mut self, hit: Option<CollisionData>, config: &BodyConfig, dt: f32) {
        self.floor = hit;
        self.slope_angle = hit
            .map(|h| h.normal.dot(self.up).clamp(-1.0, 1.0).acos())
            .unwrap_or(0.0);

        // Moving away from the ground fast is never grounded, even when close.
        let rising = self.vertical_speed() > config.max_grounded_rise_speed;
        self.grounded = !rising
            && hit.is_some_and(|h| h.distance <= config.ground_tolerance)
            && self.slope_angle <= config.max_ground_angle;

        if self.grounded {
            self.time_since_grounded = 0.0;
        } else {
            self.time_since_grounded += dt;
        }
    }
}

/// Ground probe tuning.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct BodyConfig {
    /// Height above the feet the ground ray starts from.
    pub ground_probe_offset: f32,
    /// Length of the ground ray below the feet.
    pub ground_cast_length: f32,
    /// Feet-to-floor distance still counted as grounded.
    pub ground_tolerance: f32,
    /// Steepest slope (radians) that still counts as ground contact.
    pub max_ground_angle: f32,
    /// Steepest slope (radians) that can be walked on.
    pub max_slope_angle: f32,
    /// Upward speed above which the body is never grounded.
    pub max_grounded_rise_speed: f32,
    /// Collision groups used for probes (memberships, filters).
    pub collision_groups: Option<(u32, u32)>,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            ground_probe_offset: 0.5,
            ground_cast_length: 10.0,
            ground_tolerance: 0.075,
            max_ground_angle: 70f32.to_radians(),
            max_slope_angle: 45f32.to_radians(),
            max_grounded_rise_speed: 1.0,
            collision_groups: None,
        }
    }
}

impl BodyConfig {
    /// Config for player characters.
    pub fn player() -> Self {
        Self::default()
    }

    /// Config for AI characters: more forgiving ground contact.
    pub fn npc() -> Self {
        Self {
            ground_tolerance: 0.15,
            ..default()
        }
    }

    /// Builder: set the ground tolerance.
    pub fn with_ground_tolerance(mut self, tolerance: f32) -> Self {
        self.ground_tolerance = tolerance;
        self
    }

    /// Builder: set the ground ray length.
    pub fn with_ground_cast_length(mut self, length: f32) -> Self {
        self.ground_cast_length = length;
        self
    }

    /// Builder: set the walkable slope limit (radians).
    pub fn with_max_slope_angle(mut self, angle: f32) -> Self {
        self.max_slope_angle = angle;
        self
    }

    /// Builder: set probe collision groups.
    pub fn with_collision_groups(mut self, memberships: u32, filters: u32) -> Self {
        self.collision_groups = Some((memberships, filters));
        self
    }

    /// Total ray length from the probe origin.
    #[inline]
    pub fn probe_length(&self) -> f32 {
        self.ground_probe_offset + self.ground_cast_length
    }
}
