//! Geometry queries used by perception and steering
//!
//! The simulation only talks to [`GeometryQuery`]. The host engine normally
//! provides it; [`StaticScene`] is a small in-process implementation built
//! from boxes and spheres, used by the headless driver and the tests.

use std::ops::BitOr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::sdf::{sd_box, sd_sphere, sdf_gradient};

/// Scene entity handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Bit set of collision layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const GROUND: LayerMask = LayerMask(1 << 0);
    /// Arena walls
    pub const WALL: LayerMask = LayerMask(1 << 1);
    /// Arcade machines and other large furniture
    pub const MACHINE: LayerMask = LayerMask(1 << 2);
    /// Small clutter: low enough to graze, not worth a full detour
    pub const PROP: LayerMask = LayerMask(1 << 3);
    pub const PLAYER: LayerMask = LayerMask(1 << 4);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    /// Obstacles the adversary steers around
    pub const OBSTACLES: LayerMask = LayerMask(Self::WALL.0 | Self::MACHINE.0);

    /// True if any layer is shared
    #[inline]
    pub const fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn without(self, other: LayerMask) -> LayerMask {
        LayerMask(self.0 & !other.0)
    }
}

impl BitOr for LayerMask {
    type Output = LayerMask;

    fn bitor(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 | rhs.0)
    }
}

/// First surface hit by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub entity: EntityId,
    /// Distance from the ray origin
    pub distance: f32,
}

/// Ray and shape queries against world geometry
pub trait GeometryQuery {
    /// Closest hit along `direction` within `max_distance` on `mask` layers
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RayHit>;

    /// True if a sphere overlaps any geometry on `mask` layers
    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> bool;
}

/// Shape of a static obstacle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Axis-aligned box
    Box { min: Vec3, max: Vec3 },
    Sphere { center: Vec3, radius: f32 },
}

impl Shape {
    fn distance(&self, p: Vec3) -> f32 {
        match *self {
            Shape::Box { min, max } => sd_box(p, min, max),
            Shape::Sphere { center, radius } => sd_sphere(p, center, radius),
        }
    }

    /// Entry distance and normal of a ray (direction must be unit length)
    fn ray_entry(&self, origin: Vec3, dir: Vec3) -> Option<(f32, Vec3)> {
        match *self {
            Shape::Box { min, max } => {
                let mut t_enter = f32::NEG_INFINITY;
                let mut t_exit = f32::INFINITY;
                for axis in 0..3 {
                    let (o, d) = (origin[axis], dir[axis]);
                    if d.abs() < 1e-8 {
                        if o < min[axis] || o > max[axis] {
                            return None;
                        }
                        continue;
                    }
                    let t1 = (min[axis] - o) / d;
                    let t2 = (max[axis] - o) / d;
                    t_enter = t_enter.max(t1.min(t2));
                    t_exit = t_exit.min(t1.max(t2));
                }
                if t_exit < t_enter.max(0.0) {
                    return None;
                }
                if t_enter <= 0.0 {
                    // Started inside
                    return Some((0.0, -dir));
                }
                let point = origin + dir * t_enter;
                Some((t_enter, sdf_gradient(point, |p| sd_box(p, min, max))))
            }
            Shape::Sphere { center, radius } => {
                let oc = origin - center;
                let b = oc.dot(dir);
                let c = oc.length_squared() - radius * radius;
                if c <= 0.0 {
                    return Some((0.0, -dir));
                }
                let disc = b * b - c;
                if disc < 0.0 || b > 0.0 {
                    return None;
                }
                let t = -b - disc.sqrt();
                let normal = (origin + dir * t - center).normalize_or_zero();
                Some((t, normal))
            }
        }
    }
}

/// A static obstacle in a [`StaticScene`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub entity: EntityId,
    pub layer: LayerMask,
    pub shape: Shape,
}

/// Box/sphere scene answering [`GeometryQuery`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticScene {
    obstacles: Vec<Obstacle>,
    next_id: u32,
}

impl StaticScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_entity_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    /// Add an axis-aligned box (corners in any order)
    pub fn add_box(&mut self, a: Vec3, b: Vec3, layer: LayerMask) -> EntityId {
        let entity = self.next_entity_id();
        self.obstacles.push(Obstacle {
            entity,
            layer,
            shape: Shape::Box {
                min: a.min(b),
                max: a.max(b),
            },
        });
        entity
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32, layer: LayerMask) -> EntityId {
        let entity = self.next_entity_id();
        self.obstacles.push(Obstacle {
            entity,
            layer,
            shape: Shape::Sphere { center, radius },
        });
        entity
    }

    /// Move a sphere obstacle (the player collider follows the player)
    pub fn set_sphere_center(&mut self, entity: EntityId, new_center: Vec3) {
        if let Some(Obstacle {
            shape: Shape::Sphere { center, .. },
            ..
        }) = self.obstacles.iter_mut().find(|o| o.entity == entity)
        {
            *center = new_center;
        }
    }

    /// Four wall boxes enclosing a square arena centred on the origin
    pub fn add_arena_walls(&mut self, half_extent: f32, height: f32, thickness: f32) {
        let h = half_extent;
        let t = thickness;
        let y0 = -1.0;
        let y1 = height;
        self.add_box(Vec3::new(-h - t, y0, -h - t), Vec3::new(h + t, y1, -h), LayerMask::WALL);
        self.add_box(Vec3::new(-h - t, y0, h), Vec3::new(h + t, y1, h + t), LayerMask::WALL);
        self.add_box(Vec3::new(-h - t, y0, -h), Vec3::new(-h, y1, h), LayerMask::WALL);
        self.add_box(Vec3::new(h, y0, -h), Vec3::new(h + t, y1, h), LayerMask::WALL);
    }
}

impl GeometryQuery for StaticScene {
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<RayHit> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }

        self.obstacles
            .iter()
            .filter(|o| o.layer.intersects(mask))
            .filter_map(|o| {
                let (t, normal) = o.shape.ray_entry(origin, dir)?;
                (t <= max_distance).then_some(RayHit {
                    point: origin + dir * t,
                    normal,
                    entity: o.entity,
                    distance: t,
                })
            })
            .min_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> bool {
        self.obstacles
            .iter()
            .filter(|o| o.layer.intersects(mask))
            .any(|o| o.shape.distance(center) < radius)
    }
}
