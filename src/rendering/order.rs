/// Pairwise ordering and sidedness predicates
///
/// Both predicates are evaluated relative to a requester: the camera, a
/// surface collecting reflection/refraction candidates, or a light when
/// ordering shadow candidates. Implementations must be pure so that the
/// resolver's cached results stay valid for the duration of one list build.
use crate::scene::{Aabb, NodeId, Registry};
use glam::Vec3;

/// Relation of a list element to its successor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    /// `a` must precede `b`
    Before,
    /// `b` should precede `a`
    Swap,
    /// Either order is acceptable
    Neutral,
    /// No meaningful order exists; keep the pair as it is
    Unorderable,
}

impl Order {
    /// Strict results forbid reordering the pair
    #[inline]
    pub fn is_strict(self) -> bool {
        matches!(self, Order::Before | Order::Unorderable)
    }

    /// Result of comparing the same pair with arguments swapped
    #[inline]
    pub fn inverse(self) -> Order {
        match self {
            Order::Before => Order::Swap,
            Order::Swap => Order::Before,
            other => other,
        }
    }
}

/// Viewpoint a list is being built for
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    /// Requesting node, `None` for the camera
    pub node: Option<NodeId>,
    pub eye: Vec3,
}

impl Requester {
    pub fn camera(eye: Vec3) -> Self {
        Self { node: None, eye }
    }
}

pub trait OrderPredicate: Send + Sync {
    fn compare(&self, registry: &Registry, requester: &Requester, a: NodeId, b: NodeId) -> Order;
}

/// Front-to-back ordering by distance intervals from the eye.
///
/// Each volume maps to `[near, far]` where `near` is the distance to the
/// closest point of its box and `far` the distance to its farthest corner.
/// Overlapping or unbounded volumes cannot be ordered.
#[derive(Debug, Clone, Copy)]
pub struct DepthOrder {
    pub overlap_epsilon: f32,
}

impl Default for DepthOrder {
    fn default() -> Self {
        Self { overlap_epsilon: 1e-4 }
    }
}

impl DepthOrder {
    fn interval(aabb: &Aabb, eye: Vec3) -> (f32, f32) {
        (aabb.distance_to(eye), aabb.farthest_distance(eye))
    }
}

impl OrderPredicate for DepthOrder {
    fn compare(&self, registry: &Registry, requester: &Requester, a: NodeId, b: NodeId) -> Order {
        let (ba, bb) = (registry[a].aabb(), registry[b].aabb());
        if ba.is_unbounded() || bb.is_unbounded() || ba.is_empty() || bb.is_empty() {
            return Order::Unorderable;
        }
        if ba.overlaps(bb, self.overlap_epsilon) {
            return Order::Unorderable;
        }

        let (a_near, a_far) = Self::interval(ba, requester.eye);
        let (b_near, b_far) = Self::interval(bb, requester.eye);
        if a_far <= b_near {
            Order::Before
        } else if b_far <= a_near {
            Order::Swap
        } else {
            Order::Neutral
        }
    }
}

/// Which side(s) of a requester a candidate lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Inner,
    Outer,
    Both,
}

impl Side {
    #[inline]
    pub fn has_outer(self) -> bool {
        matches!(self, Side::Outer | Side::Both)
    }

    #[inline]
    pub fn has_inner(self) -> bool {
        matches!(self, Side::Inner | Side::Both)
    }
}

pub trait SidePredicate: Send + Sync {
    fn side(&self, registry: &Registry, requester: NodeId, candidate: NodeId) -> Side;
}

/// Classifies candidate box corners against the requester's facing plane.
///
/// The plane passes through the requester's box center with the world-space
/// facing normal. Requesters without a facing normal see everything on both
/// sides.
#[derive(Debug, Clone, Copy)]
pub struct PlaneSide {
    pub epsilon: f32,
}

impl Default for PlaneSide {
    fn default() -> Self {
        Self { epsilon: 1e-4 }
    }
}

impl SidePredicate for PlaneSide {
    fn side(&self, registry: &Registry, requester: NodeId, candidate: NodeId) -> Side {
        let req = &registry[requester];
        let Some(normal) = req.world_facing() else {
            return Side::Both;
        };
        let cand = registry[candidate].aabb();
        if cand.is_unbounded() || cand.is_empty() || req.aabb().is_unbounded() {
            return Side::Both;
        }

        let center = req.aabb().center();
        let (mut outer, mut inner) = (false, false);
        for corner in cand.corners() {
            let d = (corner - center).dot(normal);
            outer |= d > self.epsilon;
            inner |= d < -self.epsilon;
        }
        match (outer, inner) {
            (true, false) => Side::Outer,
            (false, true) => Side::Inner,
            _ => Side::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BoundingPolyhedron, DescriptorId, SurfaceDesc};
    use glam::Affine3A;

    fn registry_with_boxes(centers: &[Vec3], facing: Option<Vec3>) -> (Registry, Vec<NodeId>) {
        let mut reg = Registry::new();
        let ids: Vec<_> = centers
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let desc = SurfaceDesc {
                    descriptor: DescriptorId(i as u32),
                    two_sided: false,
                    facing,
                };
                let bounds = BoundingPolyhedron::cuboid(c - Vec3::splat(0.5), c + Vec3::splat(0.5));
                reg.add_surface(reg.root(), desc, Affine3A::IDENTITY, bounds).unwrap()
            })
            .collect();
        reg.update_hierarchy();
        for &id in &ids {
            let mut verts = Vec::new();
            let aabb = reg.surface_world_bounds(id, &mut verts);
            reg.set_world_bounds(id, verts, aabb);
        }
        (reg, ids)
    }

    #[test]
    fn test_inverse_and_strictness() {
        assert_eq!(Order::Before.inverse(), Order::Swap);
        assert_eq!(Order::Swap.inverse(), Order::Before);
        assert_eq!(Order::Neutral.inverse(), Order::Neutral);
        assert_eq!(Order::Unorderable.inverse(), Order::Unorderable);
        assert!(Order::Before.is_strict() && Order::Unorderable.is_strict());
        assert!(!Order::Swap.is_strict() && !Order::Neutral.is_strict());
    }

    #[test]
    fn test_depth_order_front_to_back() {
        let (reg, ids) = registry_with_boxes(&[Vec3::new(0.0, 0.0, -3.0), Vec3::new(0.0, 0.0, -8.0)], None);
        let eye = Requester::camera(Vec3::ZERO);
        let pred = DepthOrder::default();
        assert_eq!(pred.compare(&reg, &eye, ids[0], ids[1]), Order::Before);
        assert_eq!(pred.compare(&reg, &eye, ids[1], ids[0]), Order::Swap);
    }

    #[test]
    fn test_depth_order_overlap_is_unorderable() {
        let (reg, ids) = registry_with_boxes(&[Vec3::new(0.0, 0.0, -3.0), Vec3::new(0.2, 0.0, -3.2)], None);
        let pred = DepthOrder::default();
        assert_eq!(
            pred.compare(&reg, &Requester::camera(Vec3::ZERO), ids[0], ids[1]),
            Order::Unorderable
        );
    }

    #[test]
    fn test_depth_order_side_by_side_is_neutral() {
        let (reg, ids) = registry_with_boxes(&[Vec3::new(-2.0, 0.0, -5.0), Vec3::new(2.0, 0.0, -5.0)], None);
        let pred = DepthOrder::default();
        assert_eq!(
            pred.compare(&reg, &Requester::camera(Vec3::ZERO), ids[0], ids[1]),
            Order::Neutral
        );
    }

    #[test]
    fn test_plane_side_classification() {
        let (reg, ids) = registry_with_boxes(
            &[Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -3.0, 0.0), Vec3::new(3.0, 0.0, 0.0)],
            Some(Vec3::Y),
        );
        let pred = PlaneSide::default();
        assert_eq!(pred.side(&reg, ids[0], ids[1]), Side::Outer);
        assert_eq!(pred.side(&reg, ids[0], ids[2]), Side::Inner);
        assert_eq!(pred.side(&reg, ids[0], ids[3]), Side::Both);
    }
}
