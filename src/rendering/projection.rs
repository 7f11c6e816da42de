/// Surface tiling: projects a bounding polyhedron onto the tile grid
/// and emits that surface's row-major tile-membership list
use super::element::{ElemRef, Element, ElementStore, FrameArena, Payload, TileCoord};
use super::tiling::TileBounds;
use crate::camera::TileProjection;
use crate::config::TilingConfig;
use crate::perf::FUNCTION_COUNTERS;
use crate::scene::{DescriptorId, NodeId};
use crate::{count_add, count_call};
use glam::{Vec2, Vec3};

/// World-space bounds of one surface, as handed to `stile`
#[derive(Debug, Clone, Copy)]
pub struct SurfaceGeometry<'a> {
    pub node: NodeId,
    pub descriptor: DescriptorId,
    pub verts: &'a [Vec3],
    pub edges: &'a [[usize; 2]],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexTag {
    /// In front of the screen plane
    Front,
    /// Behind the plane but within the clip threshold; projected and capped
    NearBehind,
    /// Discarded, replaced by clip points on crossing edges
    Behind,
}

/// Per-worker projection buffers, sized at scene construction
#[derive(Debug)]
pub struct VertexScratch {
    projected: Vec<Vec2>,
    zed: Vec<f32>,
    tags: Vec<VertexTag>,
    /// Near-behind vertices and synthesized clip points
    cap: Vec<Vec2>,
    capacity: usize,
}

impl VertexScratch {
    pub fn new(capacity: usize) -> Self {
        Self {
            projected: Vec::with_capacity(capacity),
            zed: Vec::with_capacity(capacity),
            tags: Vec::with_capacity(capacity),
            cap: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn clear(&mut self) {
        self.projected.clear();
        self.zed.clear();
        self.tags.clear();
        self.cap.clear();
    }
}

/// Accumulate the tiles covered by a projected, near-clipped polyhedron.
///
/// A polyhedron without vertices covers every tile.
pub fn project_bounds(
    bounds: &mut TileBounds,
    scratch: &mut VertexScratch,
    projection: &TileProjection,
    params: &TilingConfig,
    verts: &[Vec3],
    edges: &[[usize; 2]],
) {
    bounds.reset_empty();
    if verts.is_empty() {
        bounds.mark_all();
        return;
    }

    scratch.clear();
    for &v in verts {
        let z = projection.depth(v);
        let tag = if z >= 0.0 || z.abs() <= params.clip_threshold {
            let p = projection.project(v);
            scratch.projected.push(p);
            if z < 0.0 {
                scratch.cap.push(p);
                VertexTag::NearBehind
            } else {
                VertexTag::Front
            }
        } else {
            scratch.projected.push(Vec2::ZERO);
            VertexTag::Behind
        };
        scratch.zed.push(z);
        scratch.tags.push(tag);
    }

    // Point on the screen plane between a discarded vertex and a front vertex
    let clip = |scratch: &VertexScratch, behind: usize, front: usize| -> Vec2 {
        let (zb, zf) = (scratch.zed[behind], scratch.zed[front]);
        let t = zf / (zf - zb);
        let point = verts[front] + (verts[behind] - verts[front]) * t;
        projection.project_on_plane(point)
    };

    for &[i, j] in edges {
        let (ti, tj) = (scratch.tags[i], scratch.tags[j]);
        if ti != VertexTag::Front && tj != VertexTag::Front {
            continue;
        }
        let mut a = scratch.projected[i];
        let mut b = scratch.projected[j];
        if ti == VertexTag::Behind {
            a = clip(scratch, i, j);
            scratch.cap.push(a);
            count_call!(FUNCTION_COUNTERS.vertices_clipped);
        }
        if tj == VertexTag::Behind {
            b = clip(scratch, j, i);
            scratch.cap.push(b);
            count_call!(FUNCTION_COUNTERS.vertices_clipped);
        }
        bounds.tile_edge(a, b, params);
    }

    if scratch.projected.len() + scratch.cap.len() > scratch.capacity {
        log::warn!(
            "projection used {} vertices, scratch reserved {}; raise vertex_capacity",
            scratch.projected.len() + scratch.cap.len(),
            scratch.capacity
        );
    }

    // Close the clipped face by connecting every cap point pair
    for i in 0..scratch.cap.len() {
        for j in i + 1..scratch.cap.len() {
            bounds.tile_edge(scratch.cap[i], scratch.cap[j], params);
        }
    }
}

/// Allocate one element per covered tile, row-major
pub fn emit_tile_list(
    arena: &mut FrameArena,
    bounds: &TileBounds,
    node: NodeId,
    descriptor: DescriptorId,
) -> Option<ElemRef> {
    let mut head = None;
    let mut tail: Option<ElemRef> = None;

    for (row, lo, hi) in bounds.spans() {
        for col in lo..=hi {
            let mut elem = Element::new(Payload::Surface { node, descriptor });
            elem.tile = Some(TileCoord {
                row: row as u16,
                col: col as u16,
            });
            let r = arena.alloc(elem);
            match tail {
                Some(t) => arena.element_mut(t).next = Some(r),
                None => head = Some(r),
            }
            tail = Some(r);
        }
    }

    count_add!(
        FUNCTION_COUNTERS.tile_elements,
        bounds.spans().map(|(_, lo, hi)| hi - lo + 1).sum::<usize>()
    );
    head
}

/// Build the tile-membership list of one surface in the worker's arena
pub fn stile(
    arena: &mut FrameArena,
    bounds: &mut TileBounds,
    scratch: &mut VertexScratch,
    projection: &TileProjection,
    params: &TilingConfig,
    surface: &SurfaceGeometry<'_>,
) -> Option<ElemRef> {
    count_call!(FUNCTION_COUNTERS.stile_calls);
    project_bounds(bounds, scratch, projection, params, surface.verts, surface.edges);
    emit_tile_list(arena, bounds, surface.node, surface.descriptor)
}
