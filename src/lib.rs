/// Tile visibility - per-frame visibility lists and a screen-space tile grid
/// for a multi-threaded software renderer
pub mod camera;
pub mod config;
pub mod error;
pub mod perf;
pub mod rendering;
pub mod scene;

pub use camera::{Camera, TileProjection};
pub use config::{ConfigError, SceneConfig, TilingConfig};
pub use error::SceneError;
pub use perf::{CounterSnapshot, FrameTimings, FunctionCounters, FUNCTION_COUNTERS};
pub use rendering::{FrameView, ListSlot, RenderBackend, Scene};
pub use scene::{Aabb, BoundingPolyhedron, NodeId, Registry};
