//! Engine configuration
//!
//! Everything here is tuning: board size, palette size, screen geometry and
//! the per-phase animation durations. None of it changes the rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::grid::{OrbColor, Palette};
use crate::input::BoardGeometry;

/// Default board height
pub const DEFAULT_ROWS: usize = 7;
/// Default board width
pub const DEFAULT_COLS: usize = 6;

/// How long each resolve phase is held for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTimings {
    pub flash_ms: u64,
    pub clear_ms: u64,
    pub drop_ms: u64,
    pub refill_ms: u64,
}

impl PhaseTimings {
    /// All phases complete on the next tick
    pub const fn instant() -> Self {
        Self {
            flash_ms: 0,
            clear_ms: 0,
            drop_ms: 0,
            refill_ms: 0,
        }
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }

    pub fn clear_duration(&self) -> Duration {
        Duration::from_millis(self.clear_ms)
    }

    pub fn drop_duration(&self) -> Duration {
        Duration::from_millis(self.drop_ms)
    }

    pub fn refill_duration(&self) -> Duration {
        Duration::from_millis(self.refill_ms)
    }

    /// Time one cascade round spends across all four phases
    pub fn round(&self) -> Duration {
        self.flash_duration() + self.clear_duration() + self.drop_duration() + self.refill_duration()
    }
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            flash_ms: 300,
            clear_ms: 150,
            drop_ms: 250,
            refill_ms: 200,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rows: usize,
    pub cols: usize,
    /// Number of orb colors in play, taken from the front of `OrbColor::ALL`
    pub colors: usize,
    pub geometry: BoardGeometry,
    pub timings: PhaseTimings,
    /// Runaway guard for a single resolve sequence; defaults to rows x cols
    pub max_cascade_rounds: Option<u32>,
}

impl EngineConfig {
    /// Check the configuration before an engine is built from it
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::InvalidDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }

        if self.colors == 0 || self.colors > OrbColor::ALL.len() {
            return Err(ConfigError::InvalidColorCount {
                count: self.colors,
                max: OrbColor::ALL.len(),
            });
        }

        if !self.geometry.cell_size.is_finite() || self.geometry.cell_size <= 0.0 {
            return Err(ConfigError::InvalidCellSize(self.geometry.cell_size));
        }

        if !self.geometry.origin_x.is_finite() || !self.geometry.origin_y.is_finite() {
            return Err(ConfigError::InvalidOrigin {
                x: self.geometry.origin_x,
                y: self.geometry.origin_y,
            });
        }

        if self.max_cascade_rounds == Some(0) {
            return Err(ConfigError::ZeroCascadeCap);
        }

        Ok(())
    }

    pub fn palette(&self) -> Palette {
        Palette::first(self.colors)
    }

    /// Effective cascade cap
    pub fn max_rounds(&self) -> u32 {
        self.max_cascade_rounds
            .unwrap_or_else(|| (self.rows * self.cols).min(u32::MAX as usize) as u32)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            colors: OrbColor::ALL.len(),
            geometry: BoardGeometry::default(),
            timings: PhaseTimings::default(),
            max_cascade_rounds: None,
        }
    }
}

/// Errors for configurations an engine cannot be built from
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Board dimensions must be positive, got {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },
    #[error("Color count must be between 1 and {max}, got {count}")]
    InvalidColorCount { count: usize, max: usize },
    #[error("Cell size must be a positive finite number, got {0}")]
    InvalidCellSize(f32),
    #[error("Board origin must be finite, got ({x}, {y})")]
    InvalidOrigin { x: f32, y: f32 },
    #[error("max_cascade_rounds must be greater than 0")]
    ZeroCascadeCap,
    #[error("Grid is {actual_rows}x{actual_cols} but the configuration expects {rows}x{cols}")]
    GridMismatch {
        rows: usize,
        cols: usize,
        actual_rows: usize,
        actual_cols: usize,
    },
    #[error("Grid has {empty} empty cells; an engine board must start full")]
    IncompleteBoard { empty: usize },
}
