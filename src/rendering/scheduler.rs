/// Frame scheduler
///
/// Drives one frame through a fixed phase sequence on a dedicated worker pool:
///
/// - phase 0: hierarchy transforms (serial)
/// - phase 1: world bounds and surface tiling, surfaces split by `i % T`
/// - scatter bounds, aggregate group volumes (serial)
/// - phase 2: per-surface candidate lists, same split
/// - camera lists and tile grid assembly (serial)
/// - render: tile rows split by `row % T`, read-only over the frame
/// - arena reset, per worker
///
/// Each parallel phase is a single rayon call over the worker contexts, so the
/// call returning is the barrier. Workers only write their own context; shared
/// state is read-only inside a phase.
use super::element::{ArenaSet, ArenaView, ElemRef, Element, ElementSource, FrameArena, ListIter, Payload};
use super::list_builder::{CandidateLists, ListBuilder, ListSlot};
use super::order::{DepthOrder, OrderPredicate, PlaneSide, SidePredicate};
use super::projection::{stile, SurfaceGeometry, VertexScratch};
use super::resolver::SettleStats;
use super::tile_grid::TileGrid;
use super::tiling::TileBounds;
use crate::camera::{Camera, TileProjection};
use crate::config::{SceneConfig, TilingConfig};
use crate::error::SceneError;
use crate::perf::{FrameTimings, PerfTimer};
use crate::perf_scope;
use crate::scene::{Aabb, NodeId, Registry};
use glam::Vec3;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt::Write as _;

/// Indices owned by `worker` when `count` items are split across `workers`
pub fn partition(count: usize, workers: usize, worker: usize) -> impl Iterator<Item = usize> {
    (worker..count).step_by(workers.max(1))
}

/// Consumer of the finished frame. Called once per tile row, from the worker
/// that owns the row.
pub trait RenderBackend: Sync {
    fn render_tile_row(&self, worker: usize, row: usize, frame: &FrameView<'_>);
}

/// Private per-frame state of one worker
struct WorkerContext {
    id: usize,
    arena: FrameArena,
    bounds: TileBounds,
    scratch: VertexScratch,
    world_bounds: Vec<(usize, Vec<Vec3>, Aabb)>,
    tile_lists: Vec<(usize, Option<ElemRef>)>,
    candidate_lists: Vec<(usize, CandidateLists)>,
    stats: SettleStats,
}

impl WorkerContext {
    fn new(id: usize, config: &SceneConfig) -> Self {
        Self {
            id,
            arena: FrameArena::new(id as u16, config.arena_capacity),
            bounds: TileBounds::new(config.tiles_in_row(), config.tiles_in_col()),
            scratch: VertexScratch::new(config.vertex_capacity),
            world_bounds: Vec::new(),
            tile_lists: Vec::new(),
            candidate_lists: Vec::new(),
            stats: SettleStats::default(),
        }
    }

    /// Phase 1: world bounds plus tile-membership lists for owned surfaces
    fn update_slice(
        &mut self,
        registry: &Registry,
        projection: Option<&TileProjection>,
        params: &TilingConfig,
        workers: usize,
    ) {
        self.world_bounds.clear();
        self.tile_lists.clear();

        let surfaces = registry.surfaces();
        for i in partition(surfaces.len(), workers, self.id) {
            let s = surfaces[i];
            let node = &registry[s];
            let mut verts = Vec::with_capacity(node.bounds.verts.len());
            let aabb = registry.surface_world_bounds(s, &mut verts);

            let tiles = match (projection, node.descriptor()) {
                (Some(projection), Some(descriptor)) => {
                    let geometry = SurfaceGeometry {
                        node: s,
                        descriptor,
                        verts: &verts,
                        edges: &node.bounds.edges,
                    };
                    stile(&mut self.arena, &mut self.bounds, &mut self.scratch, projection, params, &geometry)
                }
                _ => None,
            };

            self.world_bounds.push((i, verts, aabb));
            self.tile_lists.push((i, tiles));
        }
    }

    /// Phase 2: candidate lists for owned surfaces
    fn list_slice(
        &mut self,
        registry: &Registry,
        order: &dyn OrderPredicate,
        sides: &dyn SidePredicate,
        workers: usize,
    ) -> Result<(), SceneError> {
        self.candidate_lists.clear();

        let surfaces = registry.surfaces();
        let mut builder = ListBuilder::new(&mut self.arena, registry, order);
        for i in partition(surfaces.len(), workers, self.id) {
            let lists = builder.build_surface_lists(sides, surfaces[i])?;
            self.candidate_lists.push((i, lists));
        }
        self.stats = builder.stats();
        Ok(())
    }
}

/// Read-only view of a prepared frame
pub struct FrameView<'a> {
    registry: &'a Registry,
    grid: &'a TileGrid,
    arenas: ArenaView<'a>,
    surface_lists: &'a [CandidateLists],
    ordinals: &'a [Option<usize>],
    camera_surfaces: Option<ElemRef>,
    camera_lights: Option<ElemRef>,
}

impl<'a> FrameView<'a> {
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    pub fn tile(&self, row: usize, col: usize) -> Option<ElemRef> {
        self.grid.head(row, col)
    }

    pub fn tile_list(&self, row: usize, col: usize) -> ListIter<'_, ArenaView<'a>> {
        self.arenas.iter_list(self.grid.head(row, col))
    }

    pub fn list(&self, head: Option<ElemRef>) -> ListIter<'_, ArenaView<'a>> {
        self.arenas.iter_list(head)
    }

    pub fn element(&self, r: ElemRef) -> &Element {
        self.arenas.element(r)
    }

    /// Candidate lists of a surface, `None` for non-surfaces
    pub fn surface_lists(&self, surface: NodeId) -> Option<CandidateLists> {
        let ordinal = (*self.ordinals.get(surface.index())?)?;
        self.surface_lists.get(ordinal).copied()
    }

    pub fn camera_surfaces(&self) -> Option<ElemRef> {
        self.camera_surfaces
    }

    pub fn camera_lights(&self) -> Option<ElemRef> {
        self.camera_lights
    }

    /// One-line rendering of a list, for diagnostics
    pub fn describe_list(&self, head: Option<ElemRef>) -> String {
        let mut out = String::from("[");
        for (i, (_, elem)) in self.list(head).enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = match elem.payload {
                Payload::Surface { node, descriptor } => write!(out, "srf {}#{}", node.0, descriptor.0),
                Payload::Light { node, descriptor, shadows } => {
                    write!(out, "lgt {}#{} shadows {}", node.0, descriptor.0, self.describe_list(shadows))
                }
                Payload::Group { node, tag, .. } => write!(out, "{:?} group {}", tag, node.0),
            };
        }
        out.push(']');
        out
    }
}

/// A scene bound to its worker pool
pub struct Scene {
    config: SceneConfig,
    registry: Registry,
    camera: Camera,
    order: Box<dyn OrderPredicate>,
    sides: Box<dyn SidePredicate>,
    pool: ThreadPool,
    workers: Vec<WorkerContext>,
    arena: FrameArena,
    grid: TileGrid,
    ordinals: Vec<Option<usize>>,
    surface_tiles: Vec<Option<ElemRef>>,
    surface_lists: Vec<CandidateLists>,
    camera_surfaces: Option<ElemRef>,
    camera_lights: Option<ElemRef>,
    timings: FrameTimings,
    frame_ready: bool,
    dump_state: bool,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("config", &self.config)
            .field("camera", &self.camera)
            .field("nodes", &self.registry.len())
            .field("workers", &self.workers.len())
            .field("frame_ready", &self.frame_ready)
            .finish_non_exhaustive()
    }
}

impl Scene {
    pub fn new(config: SceneConfig, registry: Registry, camera: Camera) -> Result<Self, SceneError> {
        config.validate()?;
        registry.validate()?;

        let threads = config.threads;
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tile-worker-{i}"))
            .build()?;
        let workers = (0..threads).map(|id| WorkerContext::new(id, &config)).collect();
        let arena = FrameArena::new(threads as u16, config.arena_capacity);
        let grid = TileGrid::new(config.tiles_in_col(), config.tiles_in_row());

        log::info!(
            "scene: {}x{} px, {}x{} tiles of {}x{}, {} workers, tiling {}, {} surfaces, {} lights",
            config.x_res,
            config.y_res,
            config.tiles_in_row(),
            config.tiles_in_col(),
            config.tile_w,
            config.tile_h,
            threads,
            if config.tiling { "on" } else { "off" },
            registry.surfaces().len(),
            registry.lights().len(),
        );

        Ok(Self {
            config,
            registry,
            camera,
            order: Box::new(DepthOrder::default()),
            sides: Box::new(PlaneSide::default()),
            pool,
            workers,
            arena,
            grid,
            ordinals: Vec::new(),
            surface_tiles: Vec::new(),
            surface_lists: Vec::new(),
            camera_surfaces: None,
            camera_lights: None,
            timings: FrameTimings::default(),
            frame_ready: false,
            dump_state: false,
        })
    }

    pub fn with_order_predicate(mut self, order: impl OrderPredicate + 'static) -> Self {
        self.order = Box::new(order);
        self
    }

    pub fn with_side_predicate(mut self, sides: impl SidePredicate + 'static) -> Self {
        self.sides = Box::new(sides);
        self
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registry access between frames; drops any prepared frame
    pub fn registry_mut(&mut self) -> &mut Registry {
        self.end_frame();
        &mut self.registry
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn timings(&self) -> FrameTimings {
        self.timings
    }

    /// Dump the camera, lights, surfaces and tile (0, 0) at trace level
    /// while preparing the next frame
    pub fn print_state(&mut self) {
        self.dump_state = true;
    }

    /// Run every phase up to and including grid assembly
    pub fn prepare_frame(&mut self) -> Result<(), SceneError> {
        self.end_frame();
        self.registry.validate()?;
        let workers = self.workers.len();

        // Phase 0
        let timer = PerfTimer::new("hierarchy");
        self.registry.update_hierarchy();
        self.ordinals.clear();
        self.ordinals.resize(self.registry.len(), None);
        for (i, &s) in self.registry.surfaces().iter().enumerate() {
            self.ordinals[s.index()] = Some(i);
        }
        self.timings.hierarchy_us = timer.elapsed().as_secs_f64() * 1e6;
        drop(timer);

        // Phase 1
        let timer = PerfTimer::new("tiling");
        let projection = self
            .config
            .tiling
            .then(|| TileProjection::new(&self.camera, &self.config));
        {
            let Scene {
                pool,
                workers: contexts,
                registry,
                config,
                ..
            } = self;
            let registry: &Registry = registry;
            let params = &config.tiling_params;
            pool.install(|| {
                contexts
                    .par_iter_mut()
                    .for_each(|w| w.update_slice(registry, projection.as_ref(), params, workers))
            });
        }

        let count = self.registry.surfaces().len();
        self.surface_tiles.clear();
        self.surface_tiles.resize(count, None);
        for w in &mut self.workers {
            for (i, verts, aabb) in w.world_bounds.drain(..) {
                let s = self.registry.surfaces()[i];
                self.registry.set_world_bounds(s, verts, aabb);
            }
            for (i, tiles) in w.tile_lists.drain(..) {
                self.surface_tiles[i] = tiles;
            }
        }
        self.registry.aggregate_group_bounds();
        self.timings.tiling_us = timer.elapsed().as_secs_f64() * 1e6;
        drop(timer);

        // Phase 2
        let timer = PerfTimer::new("lists");
        {
            let Scene {
                pool,
                workers: contexts,
                registry,
                order,
                sides,
                ..
            } = self;
            let registry: &Registry = registry;
            let order: &dyn OrderPredicate = &**order;
            let sides: &dyn SidePredicate = &**sides;
            pool.install(|| {
                contexts
                    .par_iter_mut()
                    .try_for_each(|w| w.list_slice(registry, order, sides, workers))
            })?;
        }

        self.surface_lists.clear();
        self.surface_lists.resize(count, CandidateLists::default());
        let mut stats = SettleStats::default();
        for w in &mut self.workers {
            for (i, lists) in w.candidate_lists.drain(..) {
                self.surface_lists[i] = lists;
            }
            stats += w.stats;
        }
        self.timings.lists_us = timer.elapsed().as_secs_f64() * 1e6;
        log::debug!(
            "lists: {} comparisons, {} swaps, {} splices",
            stats.comparisons,
            stats.swaps,
            stats.splices
        );
        drop(timer);

        // Camera lists and grid
        let timer = PerfTimer::new("assembly");
        let (surfaces, lights) = {
            let mut builder = ListBuilder::new(&mut self.arena, &self.registry, &*self.order);
            builder.build_camera_lists(self.camera.position)?
        };
        self.camera_surfaces = surfaces;
        self.camera_lights = lights;

        if self.config.tiling {
            let Scene {
                workers: contexts,
                arena,
                grid,
                registry,
                ordinals,
                surface_tiles,
                ..
            } = self;
            let home = arena.id();
            let mut arenas = ArenaSet::new(
                contexts
                    .iter_mut()
                    .map(|w| &mut w.arena)
                    .chain(std::iter::once(arena)),
                home,
            );
            grid.assemble(&mut arenas, registry, surfaces, |n| {
                ordinals
                    .get(n.index())
                    .copied()
                    .flatten()
                    .and_then(|i| surface_tiles[i])
            });
        } else {
            self.grid.fill(surfaces);
        }
        self.timings.assembly_us = timer.elapsed().as_secs_f64() * 1e6;
        drop(timer);

        self.frame_ready = true;
        if self.dump_state {
            self.dump_state = false;
            self.log_state();
        }
        Ok(())
    }

    /// View of the prepared frame
    pub fn frame(&self) -> FrameView<'_> {
        FrameView {
            registry: &self.registry,
            grid: &self.grid,
            arenas: ArenaView::new(
                self.workers
                    .iter()
                    .map(|w| &w.arena)
                    .chain(std::iter::once(&self.arena)),
            ),
            surface_lists: &self.surface_lists,
            ordinals: &self.ordinals,
            camera_surfaces: self.camera_surfaces,
            camera_lights: self.camera_lights,
        }
    }

    /// Render phase: hand each tile row to the backend from its owning worker
    pub fn render_frame(&mut self, backend: &dyn RenderBackend) {
        if !self.frame_ready {
            log::warn!("render_frame called without a prepared frame");
            return;
        }
        let timer = PerfTimer::new("render");
        {
            let view = self.frame();
            let rows = self.grid.rows();
            let count = self.workers.len();
            let workers = &self.workers;
            self.pool.install(|| {
                workers.par_iter().for_each(|w| {
                    for row in partition(rows, count, w.id) {
                        backend.render_tile_row(w.id, row, &view);
                    }
                })
            });
        }
        self.timings.render_us = timer.elapsed().as_secs_f64() * 1e6;
    }

    /// Release the frame: every arena is reset and all lists are dropped
    pub fn end_frame(&mut self) {
        if !self.frame_ready && self.arena.is_empty() && self.workers.iter().all(|w| w.arena.is_empty()) {
            return;
        }
        perf_scope!("end_frame");
        let Scene { pool, workers, .. } = self;
        pool.install(|| workers.par_iter_mut().for_each(|w| w.arena.reset()));
        self.arena.reset();
        self.grid.clear();
        self.surface_tiles.clear();
        self.surface_lists.clear();
        self.camera_surfaces = None;
        self.camera_lights = None;
        self.frame_ready = false;
    }

    /// Prepare, render and release one frame
    pub fn render(&mut self, backend: &dyn RenderBackend) -> Result<FrameTimings, SceneError> {
        self.prepare_frame()?;
        self.render_frame(backend);
        self.end_frame();
        self.timings.log_summary();
        Ok(self.timings)
    }

    fn log_state(&self) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        let view = self.frame();
        let cam = &self.camera;
        log::trace!(
            "camera: pos {:?} fwd {:?} right {:?} up {:?} pov {:.3}",
            cam.position,
            cam.forward(),
            cam.right(),
            cam.up(),
            cam.pov()
        );
        log::trace!("lights: {}", view.describe_list(view.camera_lights()));
        log::trace!("surfaces: {}", view.describe_list(view.camera_surfaces()));
        for &s in self.registry.surfaces() {
            let Some(lists) = view.surface_lists(s) else {
                continue;
            };
            for slot in ListSlot::ALL {
                if lists.get(slot).is_some() {
                    log::trace!("  srf {} {:?}: {}", s.0, slot, view.describe_list(lists.get(slot)));
                }
            }
        }
        if view.rows() > 0 && view.cols() > 0 {
            log::trace!("tile (0, 0): {}", view.describe_list(view.tile(0, 0)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_covers_each_index_once() {
        for workers in 1..=6 {
            let mut seen = vec![0; 23];
            for w in 0..workers {
                for i in partition(23, workers, w) {
                    assert_eq!(i % workers, w);
                    seen[i] += 1;
                }
            }
            assert!(seen.iter().all(|&n| n == 1), "workers={workers}");
        }
    }

    #[test]
    fn test_partition_more_workers_than_items() {
        assert_eq!(partition(2, 4, 3).count(), 0);
        assert_eq!(partition(2, 4, 1).collect::<Vec<_>>(), vec![1]);
    }
}
