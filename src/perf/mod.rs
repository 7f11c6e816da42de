/// Performance measurement utilities
/// Each frame phase is timed and logged for scheduling analysis
pub mod profiling;

pub use profiling::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};

use std::time::{Duration, Instant};

pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        log::debug!("[PERF] {}: {}μs", self.name, self.elapsed().as_micros());
    }
}

/// Per-frame phase timings, in microseconds
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTimings {
    pub hierarchy_us: f64,
    pub tiling_us: f64,
    pub lists_us: f64,
    pub assembly_us: f64,
    pub render_us: f64,
}

impl FrameTimings {
    pub fn total_us(&self) -> f64 {
        self.hierarchy_us + self.tiling_us + self.lists_us + self.assembly_us + self.render_us
    }

    pub fn log_summary(&self) {
        let total = self.total_us().max(f64::EPSILON);
        log::debug!(
            "frame {:.1}μs | hierarchy {:.1} ({:.0}%) | tiling {:.1} ({:.0}%) | lists {:.1} ({:.0}%) | assembly {:.1} ({:.0}%) | render {:.1} ({:.0}%)",
            total,
            self.hierarchy_us,
            self.hierarchy_us / total * 100.0,
            self.tiling_us,
            self.tiling_us / total * 100.0,
            self.lists_us,
            self.lists_us / total * 100.0,
            self.assembly_us,
            self.assembly_us / total * 100.0,
            self.render_us,
            self.render_us / total * 100.0,
        );
    }
}

/// Macro for easy performance measurement
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}
