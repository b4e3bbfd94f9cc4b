use anyhow::{anyhow, Result};
use match3_core::{BoardGeometry, Coord, GridState, PointerEvent};
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;

/// A drag path over board cells, starting where the pointer goes down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gesture {
    pub path: Vec<Coord>,
}

impl Gesture {
    pub fn new(path: Vec<Coord>) -> Self {
        Self { path }
    }

    /// Number of swaps the drag performs
    pub fn swaps(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Pointer events that replay this gesture at cell centres
    ///
    /// Down on the first cell, one Move per further cell, then Up on the last.
    pub fn to_events(&self, geometry: &BoardGeometry) -> Vec<PointerEvent> {
        let (first, last) = match (self.path.first(), self.path.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Vec::new(),
        };

        let mut events = Vec::with_capacity(self.path.len() + 1);
        let start = geometry.cell_center(first);
        events.push(PointerEvent::down(start.x, start.y));
        for coord in &self.path[1..] {
            let pos = geometry.cell_center(*coord);
            events.push(PointerEvent::moved(pos.x, pos.y));
        }
        let end = geometry.cell_center(last);
        events.push(PointerEvent::up(end.x, end.y));
        events
    }
}

/// Trait for drag selection policies
pub trait Policy: Send + Sync {
    /// Pick the next drag for an idle board
    fn select_gesture(&mut self, grid: &GridState) -> Result<Gesture>;
}

/// Random policy: a uniform start cell followed by a random walk
/// over the eight neighbours
pub struct RandomPolicy {
    rng: ChaCha20Rng,
    max_drag_len: usize,
}

impl RandomPolicy {
    pub fn new(seed: u64, max_drag_len: usize) -> Result<Self> {
        if max_drag_len == 0 {
            return Err(anyhow!("max_drag_len must be greater than 0"));
        }

        Ok(Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            max_drag_len,
        })
    }

    fn neighbours(grid: &GridState, at: Coord) -> Vec<Coord> {
        let mut cells = Vec::with_capacity(8);
        for row in at.row.saturating_sub(1)..=at.row + 1 {
            for col in at.col.saturating_sub(1)..=at.col + 1 {
                let coord = Coord::new(row, col);
                if coord != at && grid.in_bounds(row, col) {
                    cells.push(coord);
                }
            }
        }
        cells
    }
}

impl Policy for RandomPolicy {
    fn select_gesture(&mut self, grid: &GridState) -> Result<Gesture> {
        if grid.rows() == 0 || grid.cols() == 0 {
            return Err(anyhow!("Cannot drag on an empty board"));
        }

        let mut at = Coord::new(
            self.rng.gen_range(0..grid.rows()),
            self.rng.gen_range(0..grid.cols()),
        );
        let steps = self.rng.gen_range(1..=self.max_drag_len);

        let mut path = vec![at];
        for _ in 0..steps {
            let options = Self::neighbours(grid, at);
            match options.choose(&mut self.rng) {
                Some(next) => {
                    at = *next;
                    path.push(at);
                }
                None => break,
            }
        }

        Ok(Gesture::new(path))
    }
}
