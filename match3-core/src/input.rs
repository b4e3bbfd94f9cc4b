//! Pointer input and the drag-to-swap state machine
//!
//! Mouse and touch input are both expressed as `PointerEvent`s. The
//! controller is `Idle` until a pointer goes down over a filled cell, then
//! `Dragging` until the pointer is released. Each move onto a neighbouring
//! cell (diagonals included) swaps the dragged orb into it, so one drag can
//! chain several swaps.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::grid::{Coord, GridState};

/// Pointer event kinds shared by mouse and touch input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Cancel,
}

/// Screen-space pointer position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerPos {
    pub x: f32,
    pub y: f32,
}

impl PointerPos {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub pos: PointerPos,
}

impl PointerEvent {
    pub fn down(x: f32, y: f32) -> Self {
        Self { kind: PointerKind::Down, pos: PointerPos::new(x, y) }
    }

    pub fn moved(x: f32, y: f32) -> Self {
        Self { kind: PointerKind::Move, pos: PointerPos::new(x, y) }
    }

    pub fn up(x: f32, y: f32) -> Self {
        Self { kind: PointerKind::Up, pos: PointerPos::new(x, y) }
    }

    pub fn cancel(x: f32, y: f32) -> Self {
        Self { kind: PointerKind::Cancel, pos: PointerPos::new(x, y) }
    }
}

/// Placement of the board on screen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardGeometry {
    /// Screen x of the left edge of column 0
    pub origin_x: f32,
    /// Screen y of the top edge of row 0
    pub origin_y: f32,
    /// Side length of a square cell
    pub cell_size: f32,
}

impl BoardGeometry {
    pub const fn new(origin_x: f32, origin_y: f32, cell_size: f32) -> Self {
        Self { origin_x, origin_y, cell_size }
    }

    /// Map a screen position to the cell under it
    ///
    /// Returns `None` for positions left of or above the origin, past the
    /// last row or column, or not finite.
    pub fn cell_at(&self, pos: PointerPos, rows: usize, cols: usize) -> Option<Coord> {
        let col = Self::axis_index(pos.x - self.origin_x, self.cell_size, cols)?;
        let row = Self::axis_index(pos.y - self.origin_y, self.cell_size, rows)?;
        Some(Coord::new(row, col))
    }

    /// Screen position of the centre of a cell
    pub fn cell_center(&self, coord: Coord) -> PointerPos {
        PointerPos::new(
            self.origin_x + (coord.col as f32 + 0.5) * self.cell_size,
            self.origin_y + (coord.row as f32 + 0.5) * self.cell_size,
        )
    }

    fn axis_index(offset: f32, cell_size: f32, count: usize) -> Option<usize> {
        let scaled = offset / cell_size;
        if !scaled.is_finite() || scaled < 0.0 {
            return None;
        }
        let index = scaled.floor() as usize;
        (index < count).then_some(index)
    }
}

impl Default for BoardGeometry {
    fn default() -> Self {
        Self::new(0.0, 0.0, 64.0)
    }
}

/// Live drag data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    /// Cell currently holding the dragged orb
    pub controlled: Coord,
    pub last_pos: PointerPos,
    /// Swaps performed so far in this drag
    pub swaps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// What a single pointer event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Ignored,
    DragStarted(Coord),
    Swapped { from: Coord, to: Coord },
    /// Drag finished by the pointer; the caller must start one resolve
    Released { swaps: u32 },
    /// Drag dropped because the board became busy; no resolve follows
    ForcedEnd,
}

/// Drag-to-swap state machine
#[derive(Debug, Clone, Default)]
pub struct InputController {
    geometry: BoardGeometry,
    state: DragState,
}

impl InputController {
    pub fn new(geometry: BoardGeometry) -> Self {
        Self {
            geometry,
            state: DragState::Idle,
        }
    }

    pub fn geometry(&self) -> &BoardGeometry {
        &self.geometry
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            DragState::Idle => None,
        }
    }

    /// Drop an active drag without requesting a resolve
    ///
    /// Returns `true` if a drag was active.
    pub fn force_end(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        self.state = DragState::Idle;
        was_dragging
    }

    /// Feed one pointer event through the state machine
    ///
    /// `busy` is the resolver's busy flag. Swaps are applied to `grid`
    /// directly; nothing else is mutated.
    pub fn handle(&mut self, event: PointerEvent, grid: &mut GridState, busy: bool) -> InputOutcome {
        let target = self.geometry.cell_at(event.pos, grid.rows(), grid.cols());

        match self.state {
            DragState::Dragging(_) if busy => {
                trace!("board became busy, ending drag");
                self.state = DragState::Idle;
                InputOutcome::ForcedEnd
            }
            DragState::Idle => match event.kind {
                PointerKind::Down if !busy => {
                    let Some(coord) = target else {
                        return InputOutcome::Ignored;
                    };
                    match grid.cell(coord) {
                        Some(cell) if !cell.is_empty() => {
                            self.state = DragState::Dragging(DragSession {
                                controlled: coord,
                                last_pos: event.pos,
                                swaps: 0,
                            });
                            InputOutcome::DragStarted(coord)
                        }
                        _ => InputOutcome::Ignored,
                    }
                }
                _ => InputOutcome::Ignored,
            },
            DragState::Dragging(mut session) => match event.kind {
                PointerKind::Move => {
                    session.last_pos = event.pos;
                    let outcome = match target {
                        Some(next) if session.controlled.is_adjacent(next) => {
                            let from = session.controlled;
                            grid.swap(next, from);
                            session.controlled = next;
                            session.swaps += 1;
                            InputOutcome::Swapped { from, to: next }
                        }
                        _ => InputOutcome::Ignored,
                    };
                    self.state = DragState::Dragging(session);
                    outcome
                }
                PointerKind::Up | PointerKind::Cancel => {
                    self.state = DragState::Idle;
                    InputOutcome::Released { swaps: session.swaps }
                }
                PointerKind::Down => InputOutcome::Ignored,
            },
        }
    }
}
