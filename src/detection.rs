//! Geometry probing.
//!
//! Units never talk to a physics engine directly. They see the world through
//! a [`GeometryProbe`]: plain raycasts plus a forward-edge classifier built
//! on top of them. Physics backends provide a probe over their own scene;
//! [`StaticGeometry`] provides one over a list of boxes for headless use.

use bevy::prelude::*;

use crate::collision::{CollisionData, GroundFrame};

/// Read-only view of the surrounding geometry.
pub trait GeometryProbe {
    /// Cast a ray. `direction` must be normalized.
    ///
    /// A ray starting inside a solid reports a hit at distance zero.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData>;

    /// Whether an entity seen in an earlier hit still exists.
    fn is_alive(&self, _entity: Entity) -> bool {
        true
    }

    /// Current world placement of an entity, used to anchor reach targets.
    fn frame(&self, _entity: Entity) -> Option<GroundFrame> {
        None
    }

    /// Classify a ledge or obstacle in front of `feet`.
    fn forward_edge(&self, feet: Vec3, forward: Vec3, up: Vec3, probe: &EdgeProbe) -> Option<EdgeHit> {
        detect_forward_edge(self, feet, forward, up, probe)
    }
}

/// Probe over empty space.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeometry;

impl GeometryProbe for NoGeometry {
    fn raycast(&self, _origin: Vec3, _direction: Vec3, _max_distance: f32) -> Option<CollisionData> {
        None
    }
}

/// Scan parameters for forward-edge detection.
///
/// These bound the geometric search only. Whether a found edge is usable
/// (height range, depth range) is decided by the unit asking.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct EdgeProbe {
    /// How far forward from the feet the wall scan reaches.
    pub max_distance: f32,
    /// Highest point above the feet the scan considers.
    pub max_height: f32,
    /// Vertical spacing between forward scan rays.
    pub height_step: f32,
    /// How far past the wall face the top surface is sampled.
    pub inset: f32,
    /// Free space required above the top surface.
    pub clearance: f32,
    /// Minimum `normal · up` for the top surface to count as standable.
    pub min_top_normal: f32,
    /// Maximum depth measured behind the edge. Zero skips depth measurement.
    pub depth_scan: f32,
}

impl Default for EdgeProbe {
    fn default() -> Self {
        Self {
            max_distance: 1.0,
            max_height: 2.5,
            height_step: 0.1,
            inset: 0.05,
            clearance: 0.5,
            min_top_normal: 0.7,
            depth_scan: 0.0,
        }
    }
}

impl EdgeProbe {
    /// Builder: set the forward reach.
    pub fn with_max_distance(mut self, distance: f32) -> Self {
        self.max_distance = distance;
        self
    }

    /// Builder: set the highest scanned point.
    pub fn with_max_height(mut self, height: f32) -> Self {
        self.max_height = height;
        self
    }

    /// Builder: measure obstacle depth up to `depth`.
    pub fn with_depth_scan(mut self, depth: f32) -> Self {
        self.depth_scan = depth;
        self
    }

    /// Builder: set the required clearance above the top surface.
    pub fn with_clearance(mut self, clearance: f32) -> Self {
        self.clearance = clearance;
        self
    }
}

/// A classified edge in front of the character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeHit {
    /// Horizontal distance from the feet to the wall face.
    pub distance: f32,
    /// Height of the top surface above the feet.
    pub height: f32,
    /// Thickness of the obstacle behind the edge, if measured and within range.
    pub depth: Option<f32>,
    /// Point where the wall face meets the top surface.
    pub edge_point: Vec3,
    /// Normal of the wall face.
    pub wall_normal: Vec3,
    /// Normal of the top surface.
    pub top_normal: Vec3,
    /// Object the edge belongs to.
    pub entity: Option<Entity>,
}

/// Find and classify the edge in front of `feet` using plain raycasts.
///
/// Ambiguous geometry yields `None` rather than a guess: no wall within
/// reach, a wall taller than the scan, a top surface that cannot be stood
/// on, or blocked clearance above it.
pub fn detect_forward_edge<P: GeometryProbe + ?Sized>(
    probe: &P,
    feet: Vec3,
    forward: Vec3,
    up: Vec3,
    settings: &EdgeProbe,
) -> Option<EdgeHit> {
    let forward = (forward - up * forward.dot(up)).try_normalize()?;
    let step = settings.height_step.max(0.01);
    let rows = (settings.max_height / step).floor() as u32;

    // Lowest wall hit along a column of forward rays.
    let mut row = 1;
    let wall = loop {
        if row > rows {
            return None;
        }
        let origin = feet + up * (step * row as f32);
        match probe.raycast(origin, forward, settings.max_distance) {
            Some(hit) if hit.distance > 0.0 => break hit,
            _ => row += 1,
        }
    };
    let wall_height = step * row as f32;

    // First row above it where the face ends.
    let reach = wall.distance + settings.inset;
    let free_height = loop {
        row += 1;
        if row > rows {
            return None;
        }
        let origin = feet + up * (step * row as f32);
        match probe.raycast(origin, forward, settings.max_distance) {
            Some(hit) if hit.distance <= reach => continue,
            _ => break step * row as f32,
        }
    };

    // Top surface, sampled just past the wall face.
    let above = feet + forward * reach + up * (free_height + step * 0.5);
    let top = probe.raycast(above, -up, free_height - wall_height + step * 1.5)?;
    if top.distance <= 0.0 || top.normal.dot(up) < settings.min_top_normal {
        return None;
    }
    let top_height = (top.point - feet).dot(up);

    if settings.clearance > 0.0
        && probe
            .raycast(top.point + up * 0.01, up, settings.clearance)
            .is_some()
    {
        return None;
    }

    let depth = if settings.depth_scan > 0.0 {
        measure_depth(probe, &top, forward, up, settings)
    } else {
        None
    };

    let edge_point = wall.point + up * (top_height - (wall.point - feet).dot(up));

    Some(EdgeHit {
        distance: wall.distance,
        height: top_height,
        depth,
        edge_point,
        wall_normal: wall.normal,
        top_normal: top.normal,
        entity: top.entity.or(wall.entity),
    })
}

fn measure_depth<P: GeometryProbe + ?Sized>(
    probe: &P,
    top: &CollisionData,
    forward: Vec3,
    up: Vec3,
    settings: &EdgeProbe,
) -> Option<f32> {
    // Cast back toward the character from beyond the obstacle, just under its top.
    let origin = top.point - forward * settings.inset + forward * settings.depth_scan - up * 0.05;
    let hit = probe.raycast(origin, -forward, settings.depth_scan)?;
    if hit.distance <= 0.0 {
        // Still inside the solid: deeper than the scan.
        return None;
    }
    Some(settings.depth_scan - hit.distance)
}

/// An axis-aligned solid box.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct StaticBox {
    /// Object this box represents.
    pub entity: Option<Entity>,
    /// Box center in world space.
    pub center: Vec3,
    /// Half extents along each axis.
    pub half_extents: Vec3,
}

impl StaticBox {
    /// Create an untagged box.
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            entity: None,
            center,
            half_extents: half_extents.abs(),
        }
    }

    /// Builder: tag the box with an entity.
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    fn contains(&self, point: Vec3) -> bool {
        let d = (point - self.center).abs();
        d.x <= self.half_extents.x && d.y <= self.half_extents.y && d.z <= self.half_extents.z
    }

    /// Slab test. Returns the entry distance and entry normal.
    fn intersect(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(f32, Vec3)> {
        if self.contains(origin) {
            return Some((0.0, -direction));
        }

        let min = self.center - self.half_extents;
        let max = self.center + self.half_extents;
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < 1e-8 {
                if o < min[axis] || o > max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (t0, t1) = {
                let a = (min[axis] - o) * inv;
                let b = (max[axis] - o) * inv;
                if a <= b { (a, b) } else { (b, a) }
            };
            if t0 > t_enter {
                t_enter = t0;
                normal = Vec3::ZERO;
                normal[axis] = -d.signum();
            }
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        (t_enter >= 0.0 && t_enter <= max_distance).then_some((t_enter, normal))
    }
}

/// Static box world.
///
/// Used as the scene of the headless backend and as a probe in tests.
#[derive(Resource, Reflect, Debug, Clone, Default)]
#[reflect(Resource)]
pub struct StaticGeometry {
    /// Solid boxes.
    pub boxes: Vec<StaticBox>,
}

impl StaticGeometry {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a box.
    pub fn with_box(mut self, solid: StaticBox) -> Self {
        self.boxes.push(solid);
        self
    }

    /// Add a box.
    pub fn add_box(&mut self, solid: StaticBox) {
        self.boxes.push(solid);
    }

    /// Remove every box tagged with `entity`.
    pub fn remove_entity(&mut self, entity: Entity) {
        self.boxes.retain(|b| b.entity != Some(entity));
    }

    /// Cast a ray, ignoring boxes tagged with `exclude`.
    pub fn cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: Option<Entity>,
    ) -> Option<CollisionData> {
        let direction = direction.try_normalize()?;
        self.boxes
            .iter()
            .filter(|b| exclude.is_none() || b.entity != exclude)
            .filter_map(|b| {
                b.intersect(origin, direction, max_distance)
                    .map(|(t, n)| CollisionData::new(t, n, origin + direction * t, b.entity))
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl GeometryProbe for StaticGeometry {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData> {
        self.cast(origin, direction, max_distance, None)
    }

    fn is_alive(&self, entity: Entity) -> bool {
        self.boxes.iter().any(|b| b.entity == Some(entity))
    }

    fn frame(&self, entity: Entity) -> Option<GroundFrame> {
        self.boxes
            .iter()
            .find(|b| b.entity == Some(entity))
            .map(|b| GroundFrame::new(entity, b.center, Quat::IDENTITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> StaticBox {
        StaticBox::new(Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0))
    }

    /// A block whose near face is at z = -1 and whose top is at `height`.
    fn ledge(height: f32, depth: f32) -> StaticBox {
        StaticBox::new(
            Vec3::new(0.0, height / 2.0, -1.0 - depth / 2.0),
            Vec3::new(2.0, height / 2.0, depth / 2.0),
        )
        .with_entity(Entity::from_raw(9))
    }

    #[test]
    fn raycast_hits_the_nearest_face() {
        let world = StaticGeometry::new().with_box(floor());
        let hit = world.raycast(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 5.0).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::Y);
    }

    #[test]
    fn raycast_respects_max_distance() {
        let world = StaticGeometry::new().with_box(floor());
        assert!(world.raycast(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 1.5).is_none());
    }

    #[test]
    fn ray_starting_inside_reports_zero() {
        let world = StaticGeometry::new().with_box(floor());
        let hit = world.raycast(Vec3::new(0.0, -0.2, 0.0), Vec3::X, 1.0).unwrap();
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn excluded_entities_are_ignored() {
        let world = StaticGeometry::new().with_box(ledge(1.0, 1.0));
        let origin = Vec3::new(0.0, 0.5, 0.0);
        assert!(world.cast(origin, Vec3::NEG_Z, 2.0, None).is_some());
        assert!(world.cast(origin, Vec3::NEG_Z, 2.0, Some(Entity::from_raw(9))).is_none());
    }

    #[test]
    fn forward_edge_classifies_a_ledge() {
        let world = StaticGeometry::new().with_box(floor()).with_box(ledge(1.2, 3.0));
        let edge = world
            .forward_edge(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, &EdgeProbe::default())
            .unwrap();

        assert!((edge.distance - 1.0).abs() < 1e-4);
        assert!((edge.height - 1.2).abs() < 1e-4);
        assert!((edge.edge_point - Vec3::new(0.0, 1.2, -1.0)).length() < 1e-4);
        assert_eq!(edge.wall_normal, Vec3::Z);
        assert_eq!(edge.top_normal, Vec3::Y);
        assert_eq!(edge.entity, Some(Entity::from_raw(9)));
        assert_eq!(edge.depth, None);
    }

    #[test]
    fn forward_edge_measures_depth() {
        let world = StaticGeometry::new().with_box(floor()).with_box(ledge(0.8, 0.4));
        let probe = EdgeProbe::default().with_depth_scan(2.0);
        let edge = world.forward_edge(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, &probe).unwrap();
        let depth = edge.depth.unwrap();
        assert!((depth - 0.4).abs() < 1e-3, "depth = {depth}");
    }

    #[test]
    fn too_deep_obstacles_report_no_depth() {
        let world = StaticGeometry::new().with_box(floor()).with_box(ledge(0.8, 5.0));
        let probe = EdgeProbe::default().with_depth_scan(2.0);
        let edge = world.forward_edge(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, &probe).unwrap();
        assert_eq!(edge.depth, None);
    }

    #[test]
    fn walls_taller_than_the_scan_are_rejected() {
        let world = StaticGeometry::new().with_box(floor()).with_box(ledge(6.0, 1.0));
        assert!(world
            .forward_edge(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, &EdgeProbe::default())
            .is_none());
    }

    #[test]
    fn blocked_clearance_is_rejected() {
        let ceiling = StaticBox::new(Vec3::new(0.0, 1.5, -2.0), Vec3::new(2.0, 0.1, 2.0));
        let world = StaticGeometry::new()
            .with_box(floor())
            .with_box(ledge(1.2, 3.0))
            .with_box(ceiling);
        assert!(world
            .forward_edge(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, &EdgeProbe::default())
            .is_none());
    }

    #[test]
    fn nothing_in_reach_yields_none() {
        let world = StaticGeometry::new().with_box(floor());
        assert!(world
            .forward_edge(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, &EdgeProbe::default())
            .is_none());
        assert!(NoGeometry
            .forward_edge(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, &EdgeProbe::default())
            .is_none());
    }

    #[test]
    fn frames_follow_tagged_boxes() {
        let mut world = StaticGeometry::new().with_box(ledge(1.0, 1.0));
        let entity = Entity::from_raw(9);
        assert!(world.is_alive(entity));
        assert_eq!(world.frame(entity).unwrap().translation, Vec3::new(0.0, 0.5, -1.5));

        world.remove_entity(entity);
        assert!(!world.is_alive(entity));
    }
}
