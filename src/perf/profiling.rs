/// Instrumentation for the visibility pipeline
/// Call counters for tiling, list building and ordering, compiled in with the `profiling` feature
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe performance counters for function call tracking
pub struct FunctionCounters {
    // Tiling counters
    pub tile_edge_calls: AtomicU64,
    pub tile_edges_rejected: AtomicU64,
    pub stile_calls: AtomicU64,
    pub vertices_clipped: AtomicU64,
    pub tile_elements: AtomicU64,

    // List building counters
    pub insert_calls: AtomicU64,
    pub groups_created: AtomicU64,
    pub filter_calls: AtomicU64,

    // Order resolver counters
    pub order_comparisons: AtomicU64,
    pub order_swaps: AtomicU64,
    pub order_splices: AtomicU64,

    // Grid counters
    pub grid_assemblies: AtomicU64,
}

impl FunctionCounters {
    pub const fn new() -> Self {
        Self {
            tile_edge_calls: AtomicU64::new(0),
            tile_edges_rejected: AtomicU64::new(0),
            stile_calls: AtomicU64::new(0),
            vertices_clipped: AtomicU64::new(0),
            tile_elements: AtomicU64::new(0),
            insert_calls: AtomicU64::new(0),
            groups_created: AtomicU64::new(0),
            filter_calls: AtomicU64::new(0),
            order_comparisons: AtomicU64::new(0),
            order_swaps: AtomicU64::new(0),
            order_splices: AtomicU64::new(0),
            grid_assemblies: AtomicU64::new(0),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.tile_edge_calls.store(0, Ordering::Relaxed);
        self.tile_edges_rejected.store(0, Ordering::Relaxed);
        self.stile_calls.store(0, Ordering::Relaxed);
        self.vertices_clipped.store(0, Ordering::Relaxed);
        self.tile_elements.store(0, Ordering::Relaxed);
        self.insert_calls.store(0, Ordering::Relaxed);
        self.groups_created.store(0, Ordering::Relaxed);
        self.filter_calls.store(0, Ordering::Relaxed);
        self.order_comparisons.store(0, Ordering::Relaxed);
        self.order_swaps.store(0, Ordering::Relaxed);
        self.order_splices.store(0, Ordering::Relaxed);
        self.grid_assemblies.store(0, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            tile_edge_calls: self.tile_edge_calls.load(Ordering::Relaxed),
            tile_edges_rejected: self.tile_edges_rejected.load(Ordering::Relaxed),
            stile_calls: self.stile_calls.load(Ordering::Relaxed),
            vertices_clipped: self.vertices_clipped.load(Ordering::Relaxed),
            tile_elements: self.tile_elements.load(Ordering::Relaxed),
            insert_calls: self.insert_calls.load(Ordering::Relaxed),
            groups_created: self.groups_created.load(Ordering::Relaxed),
            filter_calls: self.filter_calls.load(Ordering::Relaxed),
            order_comparisons: self.order_comparisons.load(Ordering::Relaxed),
            order_swaps: self.order_swaps.load(Ordering::Relaxed),
            order_splices: self.order_splices.load(Ordering::Relaxed),
            grid_assemblies: self.grid_assemblies.load(Ordering::Relaxed),
        }
    }
}

impl Default for FunctionCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterSnapshot {
    pub tile_edge_calls: u64,
    pub tile_edges_rejected: u64,
    pub stile_calls: u64,
    pub vertices_clipped: u64,
    pub tile_elements: u64,
    pub insert_calls: u64,
    pub groups_created: u64,
    pub filter_calls: u64,
    pub order_comparisons: u64,
    pub order_swaps: u64,
    pub order_splices: u64,
    pub grid_assemblies: u64,
}

impl CounterSnapshot {
    /// Log formatted report
    pub fn log_report(&self) {
        log::info!("=== Performance Counters Report ===");
        log::info!("Tiling:");
        log::info!("  tile_edge calls:            {:12}", self.tile_edge_calls);
        log::info!("  edges rejected (off-grid):  {:12}", self.tile_edges_rejected);
        log::info!("  stile calls:                {:12}", self.stile_calls);
        log::info!("  vertices clipped:           {:12}", self.vertices_clipped);
        log::info!("  tile elements:              {:12}", self.tile_elements);

        log::info!("Lists:");
        log::info!("  insert calls:               {:12}", self.insert_calls);
        log::info!("  groups created:             {:12}", self.groups_created);
        log::info!("  filter calls:               {:12}", self.filter_calls);

        log::info!("Ordering:");
        log::info!("  comparisons:                {:12}", self.order_comparisons);
        log::info!("  swaps:                      {:12}", self.order_swaps);
        log::info!("  splices:                    {:12}", self.order_splices);
        if self.insert_calls > 0 {
            let per_insert = self.order_comparisons as f64 / self.insert_calls as f64;
            log::info!("  comparisons per insert:     {:12.2}", per_insert);
        }

        log::info!("Grid:");
        log::info!("  assemblies:                 {:12}", self.grid_assemblies);
    }
}

/// Global function counters instance
pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

/// Macro for incrementing a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Macro for adding to a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value as u64, std::sync::atomic::Ordering::Relaxed);
        }
    };
}
