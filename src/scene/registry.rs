/// Geometry registry: the persistent object graph consumed by the visibility core
///
/// Nodes live in one arena addressed by `NodeId`. Groups own their children by
/// index; each node's transform-group and bounding-volume-group ancestors are
/// plain non-owning indices. Parents are always allocated before their
/// children, so a single forward pass over the arena visits the tree top-down.
use super::bounds::{Aabb, BoundingPolyhedron};
use crate::error::SceneError;
use glam::{Affine3A, Vec3};
use std::ops::Index;

/// Stable index of a node in the registry
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Backend-facing descriptor handle, supplied by the caller per primitive
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorId(pub u32);

/// Which role a group plays for a list entry
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupTag {
    /// Members share one coordinate transform
    Transform,
    /// Members share one enclosing bounding volume
    BoundingVolume,
}

#[derive(Debug, Clone)]
pub struct SurfaceDesc {
    pub descriptor: DescriptorId,
    /// Transparent or reflective surfaces need separate inner-side lists
    pub two_sided: bool,
    /// Local-space normal for planar surfaces; `None` for closed shapes
    pub facing: Option<Vec3>,
}

#[derive(Debug, Clone)]
pub struct LightDesc {
    pub descriptor: DescriptorId,
}

#[derive(Debug, Clone, Default)]
pub struct GroupDesc {
    /// Descendants share this group's transform
    pub transform_group: bool,
    /// Descendants share this group's bounding volume
    pub bounding_group: bool,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Surface(SurfaceDesc),
    Light(LightDesc),
    Group(GroupDesc),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Transform relative to the parent
    pub local: Affine3A,
    /// Bounding polyhedron in local space
    pub bounds: BoundingPolyhedron,
    pub transform_group: Option<NodeId>,
    pub bounding_group: Option<NodeId>,
    world: Affine3A,
    aabb: Aabb,
    world_verts: Vec<Vec3>,
}

impl Node {
    fn new(kind: NodeKind, parent: Option<NodeId>, local: Affine3A, bounds: BoundingPolyhedron) -> Self {
        Self {
            kind,
            parent,
            local,
            bounds,
            transform_group: None,
            bounding_group: None,
            world: Affine3A::IDENTITY,
            aabb: Aabb::EMPTY,
            world_verts: Vec::new(),
        }
    }

    pub fn is_surface(&self) -> bool {
        matches!(self.kind, NodeKind::Surface(_))
    }

    pub fn is_light(&self) -> bool {
        matches!(self.kind, NodeKind::Light(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    pub fn surface(&self) -> Option<&SurfaceDesc> {
        match &self.kind {
            NodeKind::Surface(s) => Some(s),
            _ => None,
        }
    }

    pub fn descriptor(&self) -> Option<DescriptorId> {
        match &self.kind {
            NodeKind::Surface(s) => Some(s.descriptor),
            NodeKind::Light(l) => Some(l.descriptor),
            NodeKind::Group(_) => None,
        }
    }

    /// World transform from the last hierarchy update
    pub fn world(&self) -> &Affine3A {
        &self.world
    }

    /// World-space bounding box from the last frame
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// World-space bounding vertices from the last frame (surfaces only)
    pub fn world_verts(&self) -> &[Vec3] {
        &self.world_verts
    }

    /// World-space position (translation of the world transform)
    pub fn position(&self) -> Vec3 {
        self.world.translation.into()
    }

    /// World-space facing normal for planar surfaces
    pub fn world_facing(&self) -> Option<Vec3> {
        self.surface()
            .and_then(|s| s.facing)
            .map(|n| self.world.transform_vector3(n).normalize_or_zero())
            .filter(|n| *n != Vec3::ZERO)
    }
}

/// Up to two nested groups a candidate sits in, outer-most first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPath {
    entries: [(GroupTag, NodeId); 2],
    len: usize,
}

impl GroupPath {
    const EMPTY: GroupPath = GroupPath {
        entries: [(GroupTag::Transform, NodeId(0)); 2],
        len: 0,
    };

    fn of(entries: &[(GroupTag, NodeId)]) -> Self {
        let mut path = Self::EMPTY;
        for &entry in entries {
            path.entries[path.len] = entry;
            path.len += 1;
        }
        path
    }

    pub fn as_slice(&self) -> &[(GroupTag, NodeId)] {
        &self.entries[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Object graph with a root group at `NodeId(0)`
#[derive(Debug, Clone)]
pub struct Registry {
    nodes: Vec<Node>,
    surfaces: Vec<NodeId>,
    lights: Vec<NodeId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let root = Node::new(
            NodeKind::Group(GroupDesc::default()),
            None,
            Affine3A::IDENTITY,
            BoundingPolyhedron::unbounded(),
        );
        Self {
            nodes: vec![root],
            surfaces: Vec::new(),
            lights: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id.index()).ok_or(SceneError::UnknownNode(id))
    }

    /// Surfaces in registration order
    pub fn surfaces(&self) -> &[NodeId] {
        &self.surfaces
    }

    pub fn lights(&self) -> &[NodeId] {
        &self.lights
    }

    pub fn add_group(
        &mut self,
        parent: NodeId,
        transform_group: bool,
        bounding_group: bool,
        local: Affine3A,
    ) -> Result<NodeId, SceneError> {
        let kind = NodeKind::Group(GroupDesc {
            transform_group,
            bounding_group,
            children: Vec::new(),
        });
        self.attach(parent, Node::new(kind, None, local, BoundingPolyhedron::unbounded()))
    }

    pub fn add_surface(
        &mut self,
        parent: NodeId,
        desc: SurfaceDesc,
        local: Affine3A,
        bounds: BoundingPolyhedron,
    ) -> Result<NodeId, SceneError> {
        let id = self.attach(parent, Node::new(NodeKind::Surface(desc), None, local, bounds))?;
        self.surfaces.push(id);
        Ok(id)
    }

    pub fn add_light(
        &mut self,
        parent: NodeId,
        descriptor: DescriptorId,
        position: Vec3,
    ) -> Result<NodeId, SceneError> {
        let node = Node::new(
            NodeKind::Light(LightDesc { descriptor }),
            None,
            Affine3A::from_translation(position),
            BoundingPolyhedron::point(Vec3::ZERO),
        );
        let id = self.attach(parent, node)?;
        self.lights.push(id);
        Ok(id)
    }

    /// Link a new node under `parent`, inheriting the parent's group references
    fn attach(&mut self, parent: NodeId, mut node: Node) -> Result<NodeId, SceneError> {
        let parent_node = self.get(parent).ok_or(SceneError::UnknownNode(parent))?;
        let NodeKind::Group(group) = &parent_node.kind else {
            return Err(SceneError::NotAGroup(parent));
        };
        node.parent = Some(parent);
        node.transform_group = if group.transform_group {
            Some(parent)
        } else {
            parent_node.transform_group
        };
        node.bounding_group = if group.bounding_group {
            Some(parent)
        } else {
            parent_node.bounding_group
        };

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        if let NodeKind::Group(group) = &mut self.get_mut(parent)?.kind {
            group.children.push(id);
        }
        Ok(id)
    }

    /// Override a node's group references. Checked by `validate`.
    pub fn assign_groups(
        &mut self,
        node: NodeId,
        transform_group: Option<NodeId>,
        bounding_group: Option<NodeId>,
    ) -> Result<(), SceneError> {
        for group in [transform_group, bounding_group].into_iter().flatten() {
            let g = self.get(group).ok_or(SceneError::UnknownNode(group))?;
            if !g.is_group() {
                return Err(SceneError::NotAGroup(group));
            }
        }
        let n = self.get_mut(node)?;
        n.transform_group = transform_group;
        n.bounding_group = bounding_group;
        Ok(())
    }

    pub fn set_local_transform(&mut self, node: NodeId, local: Affine3A) -> Result<(), SceneError> {
        self.get_mut(node)?.local = local;
        Ok(())
    }

    /// Replace a node's local bounding polyhedron; checked by `validate`
    pub fn set_bounds(&mut self, node: NodeId, bounds: BoundingPolyhedron) -> Result<(), SceneError> {
        self.get_mut(node)?.bounds = bounds;
        Ok(())
    }

    /// True if `ancestor` is a strict ancestor of `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.get(node).and_then(|n| n.parent);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.nodes[id.index()].parent;
        }
        false
    }

    /// Check that every primitive's group references form a strict tree and
    /// that every bounding edge indexes an existing vertex
    pub fn validate(&self) -> Result<(), SceneError> {
        for (i, node) in self.nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            if !node.bounds.is_valid() {
                return Err(SceneError::InvalidBounds {
                    node: id,
                    verts: node.bounds.verts.len(),
                });
            }
            if let (Some(t), Some(b)) = (node.transform_group, node.bounding_group) {
                if t != b && !self.is_ancestor(t, b) && !self.is_ancestor(b, t) {
                    return Err(SceneError::GroupChain {
                        node: id,
                        transform: t,
                        bounding: b,
                    });
                }
            }
            for group in [node.transform_group, node.bounding_group].into_iter().flatten() {
                if !self.is_ancestor(group, id) {
                    return Err(SceneError::InvalidGroup { node: id, group });
                }
            }
        }
        Ok(())
    }

    /// Groups relevant to listing `candidate` for `requester`, outer-most first.
    ///
    /// Lights are never grouped. A bounding-volume group that contains the
    /// requester is skipped since its volume test would always pass. When one
    /// group plays both roles the volume test wraps the transform.
    pub fn group_path(
        &self,
        candidate: NodeId,
        requester: Option<NodeId>,
    ) -> Result<GroupPath, SceneError> {
        let node = self.get(candidate).ok_or(SceneError::UnknownNode(candidate))?;
        if !node.is_surface() {
            return Ok(GroupPath::EMPTY);
        }

        let transform = node.transform_group;
        let bounding = node
            .bounding_group
            .filter(|&b| requester.map_or(true, |r| !self.is_ancestor(b, r)));

        use GroupTag::*;
        let path = match (transform, bounding) {
            (None, None) => GroupPath::EMPTY,
            (Some(t), None) => GroupPath::of(&[(Transform, t)]),
            (None, Some(b)) => GroupPath::of(&[(BoundingVolume, b)]),
            (Some(t), Some(b)) if t == b => GroupPath::of(&[(BoundingVolume, b), (Transform, t)]),
            (Some(t), Some(b)) => {
                if self.is_ancestor(t, b) {
                    GroupPath::of(&[(Transform, t), (BoundingVolume, b)])
                } else if self.is_ancestor(b, t) {
                    GroupPath::of(&[(BoundingVolume, b), (Transform, t)])
                } else {
                    return Err(SceneError::GroupChain {
                        node: candidate,
                        transform: t,
                        bounding: b,
                    });
                }
            }
        };
        Ok(path)
    }

    /// Phase 0: propagate world transforms down the tree.
    ///
    /// Light and group bounds are refreshed here as well; surface bounds are
    /// computed per worker in phase 1 and aggregated afterwards.
    pub fn update_hierarchy(&mut self) {
        for i in 0..self.nodes.len() {
            let world = match self.nodes[i].parent {
                Some(p) => self.nodes[p.index()].world * self.nodes[i].local,
                None => self.nodes[i].local,
            };
            let node = &mut self.nodes[i];
            node.world = world;
            match node.kind {
                NodeKind::Light(_) => {
                    node.aabb = Aabb::from_point(world.translation.into());
                }
                NodeKind::Group(_) => node.aabb = Aabb::EMPTY,
                NodeKind::Surface(_) => {}
            }
        }
    }

    /// World-space bounds of a surface, written into `verts`.
    /// Safe to call from worker threads after `update_hierarchy`.
    pub fn surface_world_bounds(&self, surface: NodeId, verts: &mut Vec<Vec3>) -> Aabb {
        let node = &self.nodes[surface.index()];
        node.bounds.transform_into(&node.world, verts);
        if verts.is_empty() {
            Aabb::UNBOUNDED
        } else {
            Aabb::from_points(verts)
        }
    }

    /// Store bounds computed by a worker
    pub fn set_world_bounds(&mut self, surface: NodeId, verts: Vec<Vec3>, aabb: Aabb) {
        let node = &mut self.nodes[surface.index()];
        node.world_verts = verts;
        node.aabb = aabb;
    }

    /// Serial equivalent of the hierarchy and bounds phases of a frame
    pub fn refresh_bounds(&mut self) {
        self.update_hierarchy();
        let mut verts = Vec::new();
        for i in 0..self.surfaces.len() {
            let s = self.surfaces[i];
            let aabb = self.surface_world_bounds(s, &mut verts);
            self.set_world_bounds(s, std::mem::take(&mut verts), aabb);
        }
        self.aggregate_group_bounds();
    }

    /// Fold child boxes into their parent groups, bottom-up
    pub fn aggregate_group_bounds(&mut self) {
        for i in (1..self.nodes.len()).rev() {
            if let Some(p) = self.nodes[i].parent {
                let child = self.nodes[i].aabb;
                if !child.is_empty() {
                    let parent = &mut self.nodes[p.index()];
                    parent.aabb = parent.aabb.union(&child);
                }
            }
        }
    }
}

impl Index<NodeId> for Registry {
    type Output = Node;

    #[inline]
    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}
