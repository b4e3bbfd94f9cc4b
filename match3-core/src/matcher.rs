//! Run-based match detection
//!
//! A run is a maximal line of same-colored, non-empty cells along a row or a
//! column. Runs of `MIN_RUN` or more cells are matches. Detection is a pure
//! function of the board.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::grid::{Coord, GridState, OrbColor};

/// Minimum run length that counts as a match
pub const MIN_RUN: usize = 3;

/// Deduplicated set of matched coordinates
pub type MatchSet = BTreeSet<Coord>;

/// Direction a run was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A single qualifying run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub orientation: Orientation,
    pub color: OrbColor,
    pub cells: Vec<Coord>,
}

impl Run {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Every qualifying run, rows first (top to bottom) then columns (left to right)
pub fn find_runs(grid: &GridState) -> Vec<Run> {
    let mut runs = Vec::new();

    for row in 0..grid.rows() {
        let line: Vec<Coord> = (0..grid.cols()).map(|col| Coord::new(row, col)).collect();
        scan_line(grid, &line, Orientation::Horizontal, &mut runs);
    }

    for col in 0..grid.cols() {
        let line: Vec<Coord> = (0..grid.rows()).map(|row| Coord::new(row, col)).collect();
        scan_line(grid, &line, Orientation::Vertical, &mut runs);
    }

    runs
}

/// Union of all qualifying runs
///
/// A cell where a horizontal and a vertical run cross appears once.
pub fn find_matches(grid: &GridState) -> MatchSet {
    find_runs(grid)
        .into_iter()
        .flat_map(|run| run.cells)
        .collect()
}

fn scan_line(grid: &GridState, line: &[Coord], orientation: Orientation, out: &mut Vec<Run>) {
    let mut start = 0;
    let mut current: Option<OrbColor> = None;

    for (index, coord) in line.iter().enumerate() {
        let color = grid.cell(*coord).and_then(|cell| cell.color());
        if color != current || color.is_none() {
            flush_run(line, start, index, current, orientation, out);
            start = index;
            current = color;
        }
    }
    flush_run(line, start, line.len(), current, orientation, out);
}

fn flush_run(
    line: &[Coord],
    start: usize,
    end: usize,
    color: Option<OrbColor>,
    orientation: Orientation,
    out: &mut Vec<Run>,
) {
    let Some(color) = color else {
        return;
    };
    if end - start >= MIN_RUN {
        out.push(Run {
            orientation,
            color,
            cells: line[start..end].to_vec(),
        });
    }
}
