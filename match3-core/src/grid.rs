//! Board representation for the match-3 engine
//!
//! The board is a fixed rows x cols array of plain `Cell` values indexed by
//! `(row, col)`. Row 0 is the top of the board; gravity pulls toward the
//! last row. Every coordinate-taking operation is bounds-checked and treats
//! out-of-range input as a no-op rather than an error.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// Orb colors available to a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrbColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl OrbColor {
    /// Every color, in palette order
    pub const ALL: [OrbColor; 6] = [
        OrbColor::Red,
        OrbColor::Blue,
        OrbColor::Green,
        OrbColor::Yellow,
        OrbColor::Purple,
        OrbColor::Orange,
    ];

    /// One-letter symbol used by the text board format
    pub fn symbol(self) -> char {
        match self {
            OrbColor::Red => 'R',
            OrbColor::Blue => 'B',
            OrbColor::Green => 'G',
            OrbColor::Yellow => 'Y',
            OrbColor::Purple => 'P',
            OrbColor::Orange => 'O',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        Self::ALL.iter().copied().find(|color| color.symbol() == symbol)
    }
}

/// Contents of a single board position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Filled(OrbColor),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Color of the orb in this cell, if any
    pub fn color(&self) -> Option<OrbColor> {
        match self {
            Cell::Empty => None,
            Cell::Filled(color) => Some(*color),
        }
    }

    /// Text-format symbol: the orb letter, or `.` for an empty cell
    pub fn symbol(&self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Filled(color) => color.symbol(),
        }
    }
}

/// Board coordinate, ordered row-major
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Chebyshev distance: `max(|d_row|, |d_col|)`
    pub fn distance(&self, other: Coord) -> usize {
        self.row.abs_diff(other.row).max(self.col.abs_diff(other.col))
    }

    /// True for the eight surrounding cells, diagonals included
    pub fn is_adjacent(&self, other: Coord) -> bool {
        self.distance(other) == 1
    }
}

impl From<(usize, usize)> for Coord {
    fn from((row, col): (usize, usize)) -> Self {
        Self::new(row, col)
    }
}

/// The ordered set of colors a board draws from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    colors: Vec<OrbColor>,
}

impl Palette {
    /// The first `count` colors of `OrbColor::ALL`, clamped to `1..=6`
    pub fn first(count: usize) -> Self {
        let count = count.clamp(1, OrbColor::ALL.len());
        Self {
            colors: OrbColor::ALL[..count].to_vec(),
        }
    }

    /// All six colors
    pub fn full() -> Self {
        Self::first(OrbColor::ALL.len())
    }

    pub fn colors(&self) -> &[OrbColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn contains(&self, color: OrbColor) -> bool {
        self.colors.contains(&color)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::full()
    }
}

/// Source of new orb colors for the initial fill and for refills
pub trait ColorSource {
    /// Pick the next color; implementations must return a palette member
    fn next_color(&mut self, palette: &Palette) -> OrbColor;
}

impl ColorSource for ChaCha20Rng {
    fn next_color(&mut self, palette: &Palette) -> OrbColor {
        palette.colors()[self.gen_range(0..palette.len())]
    }
}

/// Deterministic source that cycles through a fixed list of colors
///
/// Colors outside the palette are skipped; if none of the listed colors
/// are in the palette the first palette color is used.
#[derive(Debug, Clone)]
pub struct CycleColors {
    colors: Vec<OrbColor>,
    next: usize,
}

impl CycleColors {
    pub fn new(colors: Vec<OrbColor>) -> Self {
        Self { colors, next: 0 }
    }
}

impl ColorSource for CycleColors {
    fn next_color(&mut self, palette: &Palette) -> OrbColor {
        for _ in 0..self.colors.len() {
            let color = self.colors[self.next % self.colors.len()];
            self.next = (self.next + 1) % self.colors.len();
            if palette.contains(color) {
                return color;
            }
        }
        palette.colors()[0]
    }
}

/// Errors raised while building a board from explicit contents
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("Board must have at least one row and one column")]
    EmptyBoard,
    #[error("Row {row} has {actual} cells, expected {expected}")]
    RaggedRow { row: usize, expected: usize, actual: usize },
    #[error("Unknown cell symbol {symbol:?} at row {row}, col {col}")]
    UnknownSymbol { row: usize, col: usize, symbol: char },
    #[error("Color {color:?} at row {row}, col {col} is not in the palette")]
    ColorOutsidePalette { row: usize, col: usize, color: OrbColor },
}

/// Rows x cols board of cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridState {
    rows: usize,
    cols: usize,
    palette: Palette,
    cells: Vec<Vec<Cell>>,
}

impl GridState {
    /// Create an all-empty board
    pub fn new(rows: usize, cols: usize, palette: Palette) -> Self {
        Self {
            rows,
            cols,
            palette,
            cells: vec![vec![Cell::Empty; cols]; rows],
        }
    }

    /// Create a board with every cell independently drawn from `source`
    ///
    /// No check is made for pre-existing matches or solvability.
    pub fn filled<S: ColorSource + ?Sized>(
        rows: usize,
        cols: usize,
        palette: Palette,
        source: &mut S,
    ) -> Self {
        let mut grid = Self::new(rows, cols, palette);
        for row in 0..rows {
            for col in 0..cols {
                grid.cells[row][col] = Cell::Filled(source.next_color(&grid.palette));
            }
        }
        grid
    }

    /// Build a board from explicit rows using the full palette
    pub fn from_rows(cells: Vec<Vec<Cell>>) -> Result<Self, GridError> {
        Self::from_rows_with_palette(cells, Palette::full())
    }

    /// Build a board from explicit rows, rejecting colors outside `palette`
    pub fn from_rows_with_palette(cells: Vec<Vec<Cell>>, palette: Palette) -> Result<Self, GridError> {
        let rows = cells.len();
        let cols = cells.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyBoard);
        }

        for (row, line) in cells.iter().enumerate() {
            if line.len() != cols {
                return Err(GridError::RaggedRow { row, expected: cols, actual: line.len() });
            }
            for (col, cell) in line.iter().enumerate() {
                if let Some(color) = cell.color() {
                    if !palette.contains(color) {
                        return Err(GridError::ColorOutsidePalette { row, col, color });
                    }
                }
            }
        }

        Ok(Self { rows, cols, palette, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// Cell at `(row, col)`, or `None` when out of range
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|line| line.get(col)).copied()
    }

    pub fn cell(&self, coord: Coord) -> Option<Cell> {
        self.get(coord.row, coord.col)
    }

    /// Store `cell` at `(row, col)`
    ///
    /// Returns `false` without touching the board when the coordinate is out
    /// of range or the color is not part of this board's palette.
    pub fn set(&mut self, row: usize, col: usize, cell: Cell) -> bool {
        if !self.in_bounds(row, col) {
            return false;
        }
        if let Some(color) = cell.color() {
            if !self.palette.contains(color) {
                return false;
            }
        }
        self.cells[row][col] = cell;
        true
    }

    /// Exchange two cells. Legality (adjacency, busy state) is up to the caller.
    pub fn swap(&mut self, a: Coord, b: Coord) -> bool {
        if !self.in_bounds(a.row, a.col) || !self.in_bounds(b.row, b.col) {
            return false;
        }
        let first = self.cells[a.row][a.col];
        self.cells[a.row][a.col] = self.cells[b.row][b.col];
        self.cells[b.row][b.col] = first;
        true
    }

    /// All coordinates in row-major order
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Coord::new(row, col)))
    }

    pub fn count_empty(&self) -> usize {
        self.cells.iter().flatten().filter(|cell| cell.is_empty()).count()
    }

    pub fn is_full(&self) -> bool {
        self.count_empty() == 0
    }

    /// Borrow the raw rows, top row first
    pub fn cells(&self) -> &[Vec<Cell>] {
        &self.cells
    }
}

impl fmt::Display for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, line) in self.cells.iter().enumerate() {
            if row > 0 {
                writeln!(f)?;
            }
            for cell in line {
                write!(f, "{}", cell.symbol())?;
            }
        }
        Ok(())
    }
}

impl FromStr for GridState {
    type Err = GridError;

    /// Parse one row per whitespace-separated token, e.g. `"RRB\nGYP"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cells = Vec::new();
        for (row, token) in s.split_whitespace().enumerate() {
            let mut line = Vec::new();
            for (col, symbol) in token.chars().enumerate() {
                let cell = match symbol {
                    '.' => Cell::Empty,
                    other => match OrbColor::from_symbol(other) {
                        Some(color) => Cell::Filled(color),
                        None => return Err(GridError::UnknownSymbol { row, col, symbol }),
                    },
                };
                line.push(cell);
            }
            cells.push(line);
        }
        Self::from_rows(cells)
    }
}
