/// Tile rasterizer
///
/// Projected bounding-polyhedron edges are walked row by row in tile space
/// and accumulate a running `[colMin, colMax]` per tile row. Tiles are not
/// enumerated here; the caller reads the finished intervals with `spans()`
/// once every edge of a polyhedron has been processed.
use crate::config::TilingConfig;
use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;
use glam::Vec2;

/// Per-row column bounds for one surface, reused across surfaces
#[derive(Debug, Clone)]
pub struct TileBounds {
    cols: usize,
    rows: usize,
    txmin: Vec<i32>,
    txmax: Vec<i32>,
}

impl TileBounds {
    pub fn new(cols: usize, rows: usize) -> Self {
        let mut bounds = Self {
            cols,
            rows,
            txmin: vec![0; rows],
            txmax: vec![0; rows],
        };
        bounds.reset_empty();
        bounds
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Mark every row as untouched
    pub fn reset_empty(&mut self) {
        self.txmin.fill(self.cols as i32);
        self.txmax.fill(-1);
    }

    /// Mark every tile as covered
    pub fn mark_all(&mut self) {
        self.txmin.fill(0);
        self.txmax.fill(self.cols as i32 - 1);
    }

    #[inline]
    fn update_row(&mut self, row: i32, x1: i32, x2: i32, xmin: i32, xmax: i32) {
        let (lo, hi) = if x1 < x2 { (x1, x2) } else { (x2, x1) };
        let r = row as usize;
        if self.txmin[r] > lo {
            self.txmin[r] = lo.max(xmin);
        }
        if self.txmax[r] < hi {
            self.txmax[r] = hi.min(xmax);
        }
    }

    /// Accumulate the tiles touched by the edge `p1`-`p2` (tile-space coordinates)
    pub fn tile_edge(&mut self, p1: Vec2, p2: Vec2, params: &TilingConfig) {
        count_call!(FUNCTION_COUNTERS.tile_edge_calls);
        if self.rows == 0 || self.cols == 0 {
            return;
        }

        let (p1, p2) = if p1.y > p2.y { (p2, p1) } else { (p1, p2) };
        let dx = p2.x - p1.x;
        let dy = p2.y - p1.y;
        let thr = params.line_threshold;

        // Degenerate lines still get a direction for the extended margins
        let (rt, xx, yy) = if dx.abs() <= thr && dy.abs() <= thr {
            (0.0, if dx < 0.0 { -1.0 } else { 1.0 }, 1.0)
        } else if dx.abs() <= thr || dy.abs() <= thr {
            (0.0, dx, dy)
        } else {
            (dx / dy, dx, dy)
        };

        let mut lines = [(p1, p2); 3];
        let count = if params.extended {
            let scale = params.tile_threshold / (xx * xx + yy * yy).sqrt();
            let (xx, yy) = (xx * scale, yy * scale);
            let a = Vec2::new(p1.x - xx, p1.y - yy);
            let b = Vec2::new(p2.x + xx, p2.y + yy);
            let perp = Vec2::new(-yy, xx);
            lines = [(a, b), (a + perp, b + perp), (a - perp, b - perp)];
            3
        } else {
            1
        };

        for &(n1, n2) in &lines[..count] {
            if !self.walk_line(n1, n2, rt) {
                count_call!(FUNCTION_COUNTERS.tile_edges_rejected);
            }
        }
    }

    /// Returns false when the line misses the grid's row range
    fn walk_line(&mut self, n1: Vec2, n2: Vec2, rt: f32) -> bool {
        let xmin = 0;
        let ymin = 0;
        let xmax = self.cols as i32 - 1;
        let ymax = self.rows as i32 - 1;

        let mut x1 = n1.x.floor() as i32;
        let mut y1 = n1.y.floor() as i32;
        let mut x2 = n2.x.floor() as i32;
        let mut y2 = n2.y.floor() as i32;

        if y1 > ymax || y2 < ymin {
            return false;
        }

        // Axis-aligned, single-row or x-outer lines cover whole rows
        if x1 == x2
            || y1 == y2
            || rt == 0.0
            || (x1 < xmin && x2 < xmin)
            || (x1 > xmax && x2 > xmax)
        {
            for row in y1.max(ymin)..=y2.min(ymax) {
                self.update_row(row, x1, x2, xmin, xmax);
            }
            return true;
        }

        // Interior rows step the x-intercept at each row boundary
        y1 = if y1 < ymin { ymin } else { y1 + 1 };
        y2 = if y2 > ymax { ymax } else { y2 - 1 };

        let mut px = n1.x + (y1 as f32 - n1.y) * rt;
        x2 = px.floor() as i32;

        if y1 > ymin {
            self.update_row(y1 - 1, x1, x2, xmin, xmax);
        }
        x1 = x2;

        for row in y1..=y2 {
            px += rt;
            x2 = px.floor() as i32;
            self.update_row(row, x1, x2, xmin, xmax);
            x1 = x2;
        }

        if y2 < ymax {
            x2 = n2.x.floor() as i32;
            self.update_row(y2 + 1, x1, x2, xmin, xmax);
        }
        true
    }

    /// Non-empty rows as `(row, colMin, colMax)`, inclusive
    pub fn spans(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        (0..self.rows).filter_map(move |row| {
            let (lo, hi) = (self.txmin[row], self.txmax[row]);
            (lo <= hi && hi >= 0 && (lo as usize) < self.cols).then(|| (row, lo as usize, hi as usize))
        })
    }

    pub fn is_covered(&self, row: usize, col: usize) -> bool {
        row < self.rows && (self.txmin[row]..=self.txmax[row]).contains(&(col as i32))
    }
}
