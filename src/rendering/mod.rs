/// Tile-visibility scheduling
/// Per-frame list construction over frame arenas, merged into a tile grid for the render backend
pub mod element;
pub mod tiling;
pub mod projection;
pub mod order;
pub mod resolver;
pub mod list_builder;
pub mod tile_grid;
pub mod scheduler;

pub use element::{ArenaSet, ArenaView, ElemRef, Element, ElementSource, ElementStore, FrameArena, GroupLink, Payload, TileCoord};
pub use tiling::TileBounds;
pub use projection::{stile, SurfaceGeometry, VertexScratch};
pub use order::{DepthOrder, Order, OrderPredicate, PlaneSide, Requester, Side, SidePredicate};
pub use resolver::{settle, SettleStats};
pub use list_builder::{filter, CandidateLists, ListBuilder, ListSlot};
pub use tile_grid::TileGrid;
pub use scheduler::{partition, FrameView, RenderBackend, Scene};
