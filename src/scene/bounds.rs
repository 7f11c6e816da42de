/// Bounding geometry shared by the registry, the tiler and the order predicates
use glam::{Affine3A, Vec3};

/// Axis-aligned bounding box in world space.
///
/// An unbounded box (infinite extents) stands in for surfaces that have no
/// bounding polyhedron; it overlaps everything and covers every tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const UNBOUNDED: Aabb = Aabb {
        min: Vec3::splat(f32::NEG_INFINITY),
        max: Vec3::splat(f32::INFINITY),
    };

    /// Empty box, the identity for `union`
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        points.iter().fold(Self::EMPTY, |acc, &p| Self {
            min: acc.min.min(p),
            max: acc.max.max(p),
        })
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        !(self.min.is_finite() && self.max.is_finite()) && !self.is_empty()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Overlap test with a small tolerance so touching boxes do not count
    pub fn overlaps(&self, other: &Aabb, eps: f32) -> bool {
        self.min.x < other.max.x - eps
            && self.max.x > other.min.x + eps
            && self.min.y < other.max.y - eps
            && self.max.y > other.min.y + eps
            && self.min.z < other.max.z - eps
            && self.max.z > other.min.z + eps
    }

    /// Distance from `p` to the nearest point of the box (0 inside)
    pub fn distance_to(&self, p: Vec3) -> f32 {
        let clamped = p.clamp(self.min, self.max);
        (p - clamped).length()
    }

    /// Distance from `p` to the farthest corner
    pub fn farthest_distance(&self, p: Vec3) -> f32 {
        let far = Vec3::new(
            if (p.x - self.min.x).abs() > (p.x - self.max.x).abs() { self.min.x } else { self.max.x },
            if (p.y - self.min.y).abs() > (p.y - self.max.y).abs() { self.min.y } else { self.max.y },
            if (p.z - self.min.z).abs() > (p.z - self.max.z).abs() { self.min.z } else { self.max.z },
        );
        (far - p).length()
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

/// Vertex + edge approximation of an object's extent.
///
/// Edges index into `verts`. An empty polyhedron means "unbounded".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundingPolyhedron {
    pub verts: Vec<Vec3>,
    pub edges: Vec<[usize; 2]>,
}

/// Edge list of the box returned by `BoundingPolyhedron::cuboid`
const CUBOID_EDGES: [[usize; 2]; 12] = [
    [0, 1], [2, 3], [4, 5], [6, 7], // along x
    [0, 2], [1, 3], [4, 6], [5, 7], // along y
    [0, 4], [1, 5], [2, 6], [3, 7], // along z
];

impl BoundingPolyhedron {
    /// Unbounded polyhedron (no vertices)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Box with 8 vertices and 12 edges, in `Aabb::corners` order
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        Self {
            verts: Aabb::new(min, max).corners().to_vec(),
            edges: CUBOID_EDGES.to_vec(),
        }
    }

    /// Flat quad in the plane spanned by `u` and `v` around `center`
    pub fn quad(center: Vec3, u: Vec3, v: Vec3) -> Self {
        Self {
            verts: vec![center - u - v, center + u - v, center + u + v, center - u + v],
            edges: vec![[0, 1], [1, 2], [2, 3], [3, 0]],
        }
    }

    pub fn point(p: Vec3) -> Self {
        Self {
            verts: vec![p],
            edges: Vec::new(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.verts.is_empty()
    }

    /// Transform all vertices into `out` (cleared first)
    pub fn transform_into(&self, transform: &Affine3A, out: &mut Vec<Vec3>) {
        out.clear();
        out.extend(self.verts.iter().map(|&v| transform.transform_point3(v)));
    }

    pub fn is_valid(&self) -> bool {
        self.edges
            .iter()
            .all(|e| e[0] < self.verts.len() && e[1] < self.verts.len())
    }
}
