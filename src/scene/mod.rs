/// Object graph consumed by the visibility core
pub mod bounds;
pub mod registry;

pub use bounds::{Aabb, BoundingPolyhedron};
pub use registry::{
    DescriptorId, GroupDesc, GroupPath, GroupTag, LightDesc, Node, NodeId, NodeKind, Registry,
    SurfaceDesc,
};
