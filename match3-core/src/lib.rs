//! Core types and state machines for the match-3 grid engine
//!
//! This crate provides the pieces a presentation layer drives:
//! - `GridState`: Bounds-checked board of orb cells
//! - `find_matches`: Run-based match detection
//! - `InputController`: Drag-to-swap pointer state machine
//! - `CascadeResolver`: Clear, drop and refill phases with a combo counter
//! - `Match3Engine`: Composition root wiring all of the above together

pub mod grid;
pub mod matcher;
pub mod input;
pub mod cascade;
pub mod config;
pub mod engine;

// Re-export main types for convenience
pub use grid::{Cell, ColorSource, Coord, CycleColors, GridError, GridState, OrbColor, Palette};
pub use matcher::{find_matches, find_runs, MatchSet, Run};
pub use input::{BoardGeometry, InputController, InputOutcome, PointerEvent, PointerKind, PointerPos};
pub use cascade::{CascadeResolver, Phase, PhaseEvent, SlideMove, Spawn};
pub use config::{ConfigError, EngineConfig, PhaseTimings};
pub use engine::{EngineSnapshot, Match3Engine};
