//! Engine composition root
//!
//! `Match3Engine` owns the board, the input controller, the cascade resolver
//! and the color source, and is the only type a presentation layer has to
//! talk to: pointer events go in, phase events and snapshots come out.

use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use tracing::debug;

use crate::cascade::{CascadeResolver, Phase, PhaseEvent};
use crate::config::{ConfigError, EngineConfig};
use crate::grid::{Cell, ColorSource, GridState};
use crate::input::{BoardGeometry, InputController, InputOutcome, PointerEvent};

/// Everything a presentation layer needs to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Vec<Cell>>,
    pub busy: bool,
    pub combo: u32,
    pub phase: Phase,
    pub dragging: bool,
}

/// A single match-3 board with its input and resolution state
#[derive(Debug)]
pub struct Match3Engine<S: ColorSource = ChaCha20Rng> {
    config: EngineConfig,
    grid: GridState,
    input: InputController,
    resolver: CascadeResolver,
    source: S,
}

impl Match3Engine<ChaCha20Rng> {
    /// Build an engine whose board and refills come from a seeded ChaCha20 stream
    pub fn new(config: EngineConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_source(config, ChaCha20Rng::seed_from_u64(seed))
    }
}

impl<S: ColorSource> Match3Engine<S> {
    /// Build an engine with a randomly filled board drawn from `source`
    pub fn with_source(config: EngineConfig, mut source: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid = GridState::filled(config.rows, config.cols, config.palette(), &mut source);
        Ok(Self::assemble(config, grid, source))
    }

    /// Build an engine around an existing board
    ///
    /// The board's dimensions must agree with `config` and every cell must be
    /// filled; the board keeps its own palette.
    pub fn from_grid(config: EngineConfig, grid: GridState, source: S) -> Result<Self, ConfigError> {
        config.validate()?;
        if grid.rows() != config.rows || grid.cols() != config.cols {
            return Err(ConfigError::GridMismatch {
                rows: config.rows,
                cols: config.cols,
                actual_rows: grid.rows(),
                actual_cols: grid.cols(),
            });
        }
        if !grid.is_full() {
            return Err(ConfigError::IncompleteBoard { empty: grid.count_empty() });
        }
        Ok(Self::assemble(config, grid, source))
    }

    fn assemble(config: EngineConfig, grid: GridState, source: S) -> Self {
        let input = InputController::new(config.geometry);
        let resolver = CascadeResolver::new(config.timings, config.max_rounds());
        debug!(rows = grid.rows(), cols = grid.cols(), colors = grid.palette().len(), "engine ready");
        Self {
            config,
            grid,
            input,
            resolver,
            source,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridState {
        &self.grid
    }

    pub fn geometry(&self) -> &BoardGeometry {
        self.input.geometry()
    }

    pub fn input(&self) -> &InputController {
        &self.input
    }

    pub fn is_busy(&self) -> bool {
        self.resolver.is_busy()
    }

    pub fn combo(&self) -> u32 {
        self.resolver.combo()
    }

    pub fn phase(&self) -> Phase {
        self.resolver.phase()
    }

    /// Feed a pointer event; releasing a drag starts a resolve sequence
    pub fn handle_pointer(&mut self, event: PointerEvent) -> InputOutcome {
        let outcome = self.input.handle(event, &mut self.grid, self.resolver.is_busy());
        if let InputOutcome::Released { swaps } = outcome {
            debug!(swaps, "drag released");
            self.resolver.resolve(&self.grid);
        }
        outcome
    }

    /// Start a resolve sequence without a drag release
    ///
    /// An active drag is ended first and does not trigger a second resolve.
    /// Returns `false` if a sequence is already running.
    pub fn trigger_resolve(&mut self) -> bool {
        if self.resolver.is_busy() {
            return false;
        }
        if self.input.force_end() {
            debug!("drag ended by external resolve");
        }
        self.resolver.resolve(&self.grid)
    }

    /// Advance the running sequence by one frame's worth of time
    pub fn advance(&mut self, dt: Duration) {
        self.resolver.advance(dt, &mut self.grid, &mut self.source);
    }

    /// Presentation signal that the current phase animation finished
    pub fn complete_phase(&mut self) {
        self.resolver.complete_phase(&mut self.grid, &mut self.source);
    }

    /// Finish the running sequence immediately
    pub fn run_to_idle(&mut self) {
        self.resolver.run_to_idle(&mut self.grid, &mut self.source);
    }

    /// Take every phase event queued since the last call
    pub fn drain_events(&mut self) -> Vec<PhaseEvent> {
        self.resolver.drain_events()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            rows: self.grid.rows(),
            cols: self.grid.cols(),
            cells: self.grid.cells().to_vec(),
            busy: self.resolver.is_busy(),
            combo: self.resolver.combo(),
            phase: self.resolver.phase(),
            dragging: self.input.is_dragging(),
        }
    }
}
