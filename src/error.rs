//! Error types for scene construction and frame building

use crate::config::ConfigError;
use crate::scene::NodeId;
use thiserror::Error;

/// Errors raised while building or updating a scene.
///
/// Degenerate geometry (zero-length edges, unbounded surfaces) is never
/// reported here; those cases are handled by the tiling and ordering code.
/// Malformed geometry (edges indexing missing vertices) is.
#[derive(Error, Debug)]
pub enum SceneError {
    /// A primitive's transform group and bounding-volume group do not lie on
    /// one ancestor chain.
    #[error(
        "node {node:?} has transform group {transform:?} and bounding group {bounding:?} \
         on different ancestor chains"
    )]
    GroupChain {
        node: NodeId,
        transform: NodeId,
        bounding: NodeId,
    },

    /// An assigned group reference is not an ancestor of the node.
    #[error("group {group:?} assigned to node {node:?} is not one of its ancestors")]
    InvalidGroup { node: NodeId, group: NodeId },

    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("node {0:?} is not a group")]
    NotAGroup(NodeId),

    #[error("node {0:?} is a group, not a surface or light")]
    NotALeaf(NodeId),

    /// A bounding polyhedron edge names a vertex it does not have.
    #[error("node {node:?} has a bounding edge past its {verts} vertices")]
    InvalidBounds { node: NodeId, verts: usize },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
