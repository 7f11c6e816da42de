/// Scene configuration
/// Tile geometry, worker count and per-frame scratch sizing, loadable from TOML
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default tile size in pixels (both axes)
pub const DEFAULT_TILE_SIZE: u32 = 8;

/// Lines whose deltas fall below this (in tiles) are treated as axis-aligned or points
pub const LINE_THRESHOLD: f32 = 0.01;

/// Margin (in tiles) used by extended tiling
pub const TILE_THRESHOLD: f32 = 0.2;

/// Vertices closer than this to the screen plane still count as in front of it
pub const CLIP_THRESHOLD: f32 = 0.01;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Edge rasterization parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Rasterize three offset edges per bbox edge for gap-free coverage of thin geometry
    pub extended: bool,
    pub line_threshold: f32,
    pub tile_threshold: f32,
    pub clip_threshold: f32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            extended: false,
            line_threshold: LINE_THRESHOLD,
            tile_threshold: TILE_THRESHOLD,
            clip_threshold: CLIP_THRESHOLD,
        }
    }
}

/// Scene-wide configuration, fixed at scene construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Output width in pixels
    pub x_res: u32,
    /// Output height in pixels
    pub y_res: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    /// Worker thread count (fixed for the scene's lifetime)
    pub threads: usize,
    /// Project bounding polyhedra onto the tile grid. When off, every
    /// surface is listed in every tile.
    pub tiling: bool,
    pub tiling_params: TilingConfig,
    /// Elements reserved per arena at construction
    pub arena_capacity: usize,
    /// Projected vertices reserved per worker (bbox verts plus clip points)
    pub vertex_capacity: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            x_res: 800,
            y_res: 480,
            tile_w: DEFAULT_TILE_SIZE,
            tile_h: DEFAULT_TILE_SIZE,
            threads: 4,
            tiling: true,
            tiling_params: TilingConfig::default(),
            arena_capacity: 16 * 1024,
            vertex_capacity: 64,
        }
    }
}

impl SceneConfig {
    /// Number of tile columns (tiles in one row)
    pub fn tiles_in_row(&self) -> usize {
        ((self.x_res + self.tile_w - 1) / self.tile_w) as usize
    }

    /// Number of tile rows (tiles in one column)
    pub fn tiles_in_col(&self) -> usize {
        ((self.y_res + self.tile_h - 1) / self.tile_h) as usize
    }

    /// Height over width
    pub fn aspect(&self) -> f32 {
        self.y_res as f32 / self.x_res as f32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.x_res == 0 || self.y_res == 0 {
            return Err(ConfigError::Invalid(format!(
                "resolution must be non-zero, got {}x{}",
                self.x_res, self.y_res
            )));
        }
        if self.tile_w == 0 || self.tile_h == 0 {
            return Err(ConfigError::Invalid(format!(
                "tile size must be non-zero, got {}x{}",
                self.tile_w, self.tile_h
            )));
        }
        if self.threads == 0 || self.threads >= u16::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "thread count must be between 1 and {}, got {}",
                u16::MAX - 1,
                self.threads
            )));
        }
        if self.tiles_in_row() > u16::MAX as usize || self.tiles_in_col() > u16::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "tile grid {}x{} exceeds 16-bit tile coordinates",
                self.tiles_in_row(),
                self.tiles_in_col()
            )));
        }
        let t = &self.tiling_params;
        if !(t.line_threshold >= 0.0 && t.tile_threshold >= 0.0 && t.clip_threshold >= 0.0) {
            return Err(ConfigError::Invalid("tiling thresholds must be non-negative".into()));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
