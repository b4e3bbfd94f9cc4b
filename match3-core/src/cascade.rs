//! Cascade resolution
//!
//! After a drag is released the board is resolved in rounds. Each round
//! that finds matches runs through four phases:
//!
//! 1. `Flashing` - matched cells are shown to the player
//! 2. `Clearing` - matched cells become empty
//! 3. `Dropping` - orbs fall to fill the gaps in each column
//! 4. `Refilling` - empty cells at the top are filled with new orbs
//!
//! and then the board is checked again. A sequence ends when a check finds
//! no matches. Phases are advanced either by elapsed time (`advance`) or by
//! an explicit completion signal from the presentation layer
//! (`complete_phase`); the resolver itself never blocks.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, trace};

use crate::config::PhaseTimings;
use crate::grid::{Cell, ColorSource, Coord, GridState, OrbColor};
use crate::matcher::{find_matches, MatchSet};

/// Resolver phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Flashing,
    Clearing,
    Dropping,
    Refilling,
}

/// An orb that fell from one row to another within its column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlideMove {
    pub col: usize,
    pub from_row: usize,
    pub to_row: usize,
    pub color: OrbColor,
}

/// A newly created orb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Spawn {
    pub coord: Coord,
    pub color: OrbColor,
}

/// Phase transitions for the presentation layer to animate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PhaseEvent {
    /// A cascade round found matches; `combo` already counts this round
    Matching { combo: u32, cells: Vec<Coord> },
    Clearing { cells: Vec<Coord> },
    Dropping { moves: Vec<SlideMove> },
    Refilling { spawns: Vec<Spawn> },
    /// The sequence is over and input is accepted again
    Idle { combo: u32, capped: bool },
}

/// Set every listed cell to `Empty`, returning how many were filled before
pub fn clear_cells(grid: &mut GridState, cells: &MatchSet) -> usize {
    let mut cleared = 0;
    for coord in cells {
        if let Some(Cell::Filled(_)) = grid.cell(*coord) {
            grid.set(coord.row, coord.col, Cell::Empty);
            cleared += 1;
        }
    }
    cleared
}

/// Compact every column downward, keeping the top-to-bottom order of orbs
///
/// Vacated cells end up at the top of each column as `Empty`.
pub fn apply_gravity(grid: &mut GridState) -> Vec<SlideMove> {
    let mut moves = Vec::new();

    for col in 0..grid.cols() {
        let mut write = grid.rows();
        for read in (0..grid.rows()).rev() {
            let Some(Cell::Filled(color)) = grid.get(read, col) else {
                continue;
            };
            write -= 1;
            if write != read {
                grid.set(write, col, Cell::Filled(color));
                grid.set(read, col, Cell::Empty);
                moves.push(SlideMove {
                    col,
                    from_row: read,
                    to_row: write,
                    color,
                });
            }
        }
    }

    moves
}

/// Fill every empty cell from `source`, columns left to right and rows top
/// to bottom
pub fn refill<S: ColorSource + ?Sized>(grid: &mut GridState, source: &mut S) -> Vec<Spawn> {
    let mut spawns = Vec::new();

    for col in 0..grid.cols() {
        for row in 0..grid.rows() {
            if grid.get(row, col) != Some(Cell::Empty) {
                continue;
            }
            let color = source.next_color(grid.palette());
            grid.set(row, col, Cell::Filled(color));
            spawns.push(Spawn {
                coord: Coord::new(row, col),
                color,
            });
        }
    }

    spawns
}

/// Phase state machine driving clear, drop and refill rounds
#[derive(Debug, Clone)]
pub struct CascadeResolver {
    timings: PhaseTimings,
    max_rounds: u32,
    phase: Phase,
    busy: bool,
    combo: u32,
    capped: bool,
    elapsed: Duration,
    pending: MatchSet,
    events: VecDeque<PhaseEvent>,
}

impl CascadeResolver {
    pub fn new(timings: PhaseTimings, max_rounds: u32) -> Self {
        Self {
            timings,
            max_rounds: max_rounds.max(1),
            phase: Phase::Idle,
            busy: false,
            combo: 0,
            capped: false,
            elapsed: Duration::ZERO,
            pending: MatchSet::new(),
            events: VecDeque::new(),
        }
    }

    /// True for the whole span of a resolve sequence
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Rounds with matches in the current or most recent sequence
    pub fn combo(&self) -> u32 {
        self.combo
    }

    /// Whether the most recent sequence stopped at the cascade cap
    pub fn was_capped(&self) -> bool {
        self.capped
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    /// Cells being flashed or cleared in the current round
    pub fn pending(&self) -> &MatchSet {
        &self.pending
    }

    /// Start a resolve sequence
    ///
    /// Returns `false` and does nothing if a sequence is already running.
    /// A board without matches finishes immediately with a combo of 0.
    /// Refills only follow clears, so `grid` is expected to be full.
    pub fn resolve(&mut self, grid: &GridState) -> bool {
        if self.busy {
            trace!("resolve requested while busy, ignoring");
            return false;
        }

        self.busy = true;
        self.combo = 0;
        self.capped = false;
        self.elapsed = Duration::ZERO;
        debug!("resolve sequence started");
        self.check(grid);
        true
    }

    /// Advance the current phase by `dt`
    ///
    /// Leftover time carries into the following phases, so a long tick may
    /// complete several phases at once.
    pub fn advance<S: ColorSource + ?Sized>(&mut self, dt: Duration, grid: &mut GridState, source: &mut S) {
        if !self.busy {
            return;
        }

        self.elapsed = self.elapsed.saturating_add(dt);
        while self.busy {
            let needed = self.phase_duration();
            if self.elapsed < needed {
                break;
            }
            self.elapsed -= needed;
            self.finish_phase(grid, source);
        }
        if !self.busy {
            self.elapsed = Duration::ZERO;
        }
    }

    /// Finish the current phase now, e.g. when its animation has completed
    pub fn complete_phase<S: ColorSource + ?Sized>(&mut self, grid: &mut GridState, source: &mut S) {
        if !self.busy {
            return;
        }
        self.elapsed = Duration::ZERO;
        self.finish_phase(grid, source);
    }

    /// Run the current sequence to the end without waiting on any phase
    pub fn run_to_idle<S: ColorSource + ?Sized>(&mut self, grid: &mut GridState, source: &mut S) {
        while self.busy {
            self.complete_phase(grid, source);
        }
    }

    /// Take every queued event, oldest first
    pub fn drain_events(&mut self) -> Vec<PhaseEvent> {
        self.events.drain(..).collect()
    }

    fn phase_duration(&self) -> Duration {
        match self.phase {
            Phase::Idle => Duration::ZERO,
            Phase::Flashing => self.timings.flash_duration(),
            Phase::Clearing => self.timings.clear_duration(),
            Phase::Dropping => self.timings.drop_duration(),
            Phase::Refilling => self.timings.refill_duration(),
        }
    }

    fn finish_phase<S: ColorSource + ?Sized>(&mut self, grid: &mut GridState, source: &mut S) {
        match self.phase {
            Phase::Idle => {}
            Phase::Flashing => {
                let cleared = clear_cells(grid, &self.pending);
                trace!(cleared, "clearing matched cells");
                self.enter(Phase::Clearing);
                self.events.push_back(PhaseEvent::Clearing {
                    cells: self.pending.iter().copied().collect(),
                });
            }
            Phase::Clearing => {
                let moves = apply_gravity(grid);
                trace!(moved = moves.len(), "dropping orbs");
                self.enter(Phase::Dropping);
                self.events.push_back(PhaseEvent::Dropping { moves });
            }
            Phase::Dropping => {
                let spawns = refill(grid, source);
                trace!(spawned = spawns.len(), "refilling board");
                self.enter(Phase::Refilling);
                self.events.push_back(PhaseEvent::Refilling { spawns });
            }
            Phase::Refilling => {
                self.pending.clear();
                self.check(grid);
            }
        }
    }

    /// Look for matches and either start a new round or end the sequence
    fn check(&mut self, grid: &GridState) {
        let matches = find_matches(grid);
        if matches.is_empty() {
            self.finish(false);
            return;
        }

        if self.combo >= self.max_rounds {
            error!(
                rounds = self.combo,
                cap = self.max_rounds,
                remaining = matches.len(),
                "cascade did not settle within the round cap, stopping"
            );
            self.finish(true);
            return;
        }

        self.combo += 1;
        trace!(combo = self.combo, matched = matches.len(), "cascade round");
        self.events.push_back(PhaseEvent::Matching {
            combo: self.combo,
            cells: matches.iter().copied().collect(),
        });
        self.pending = matches;
        self.enter(Phase::Flashing);
    }

    fn finish(&mut self, capped: bool) {
        self.phase = Phase::Idle;
        self.busy = false;
        self.capped = capped;
        self.pending.clear();
        debug!(combo = self.combo, capped, "resolve sequence finished");
        self.events.push_back(PhaseEvent::Idle {
            combo: self.combo,
            capped,
        });
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CycleColors, Palette};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    // Single red run on the bottom row; nothing cascades once it is gone
    const SINGLE_MATCH: &str = "
        GYGYGY
        YGYGYG
        GYGYGY
        YGYGYG
        GYGYGY
        YGYGYG
        RRRBPB
    ";

    fn cell(symbol: char) -> Cell {
        match OrbColor::from_symbol(symbol) {
            Some(color) => Cell::Filled(color),
            None => Cell::Empty,
        }
    }

    fn column(grid: &GridState, col: usize) -> String {
        (0..grid.rows()).map(|row| grid.get(row, col).unwrap().symbol()).collect()
    }

    #[test]
    fn test_gravity_scenario() {
        let mut grid: GridState = "
            GYGYGY
            YGYGYG
            GYBYGY
            YGPGYG
            GYRYGY
            YGRGYG
            GYRYGY
        "
        .parse()
        .unwrap();

        let run: MatchSet = [(4, 2), (5, 2), (6, 2)].into_iter().map(Coord::from).collect();
        assert_eq!(clear_cells(&mut grid, &run), 3);
        // Only rows 2 and 3 keep an orb in column 2 for this scenario
        grid.set(0, 2, Cell::Empty);
        grid.set(1, 2, Cell::Empty);

        let moves = apply_gravity(&mut grid);

        assert_eq!(column(&grid, 2), ".....BP");
        assert_eq!(
            moves,
            vec![
                SlideMove { col: 2, from_row: 3, to_row: 6, color: OrbColor::Purple },
                SlideMove { col: 2, from_row: 2, to_row: 5, color: OrbColor::Blue },
            ]
        );
        // Other columns were already compact
        assert_eq!(column(&grid, 0), "GYGYGYG");
    }

    #[test]
    fn test_refill_fills_top_down() {
        let mut grid: GridState = "..R\n.GR\nBGR".parse().unwrap();
        let mut source = CycleColors::new(vec![OrbColor::Yellow, OrbColor::Purple, OrbColor::Orange]);

        let spawns = refill(&mut grid, &mut source);

        assert!(grid.is_full());
        assert_eq!(grid.to_string(), "YOR\nPGR\nBGR");
        assert_eq!(spawns.len(), 3);
        assert_eq!(spawns[0], Spawn { coord: Coord::new(0, 0), color: OrbColor::Yellow });
    }

    #[test]
    fn test_single_match_resolves_with_combo_one() {
        let mut grid: GridState = SINGLE_MATCH.parse().unwrap();
        let mut source = CycleColors::new(vec![OrbColor::Purple, OrbColor::Orange, OrbColor::Blue]);
        let mut resolver = CascadeResolver::new(PhaseTimings::default(), 42);

        assert!(resolver.resolve(&grid));
        assert!(resolver.is_busy());
        assert_eq!(resolver.phase(), Phase::Flashing);

        resolver.run_to_idle(&mut grid, &mut source);

        assert_eq!(resolver.combo(), 1);
        assert!(!resolver.is_busy());
        assert!(!resolver.was_capped());
        assert!(grid.is_full());
        assert!(find_matches(&grid).is_empty());
        assert_eq!(grid.to_string().lines().next(), Some("POBYGY"));
    }

    #[test]
    fn test_event_order_for_one_round() {
        let mut grid: GridState = SINGLE_MATCH.parse().unwrap();
        let mut source = CycleColors::new(vec![OrbColor::Purple, OrbColor::Orange, OrbColor::Blue]);
        let mut resolver = CascadeResolver::new(PhaseTimings::default(), 42);

        resolver.resolve(&grid);
        resolver.run_to_idle(&mut grid, &mut source);
        let events = resolver.drain_events();

        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            PhaseEvent::Matching {
                combo: 1,
                cells: vec![Coord::new(6, 0), Coord::new(6, 1), Coord::new(6, 2)],
            }
        );
        assert!(matches!(events[1], PhaseEvent::Clearing { ref cells } if cells.len() == 3));
        // Six orbs above each cleared cell fall one row
        assert!(matches!(events[2], PhaseEvent::Dropping { ref moves } if moves.len() == 18));
        assert!(matches!(events[3], PhaseEvent::Refilling { ref spawns } if spawns.len() == 3));
        assert_eq!(events[4], PhaseEvent::Idle { combo: 1, capped: false });
        assert!(resolver.drain_events().is_empty());
    }

    #[test]
    fn test_cascade_counts_each_round() {
        // Clearing the red run drops the blue at (5, 2) into the bottom row
        // next to the two blues already there.
        let mut grid: GridState = "
            YPGYGG
            PYPPGY
            YOPOYO
            GGOGOO
            OYYPOY
            PYBOYO
            RRRBBO
        "
        .parse()
        .unwrap();
        let mut source = CycleColors::new(vec![OrbColor::Blue, OrbColor::Red]);
        let mut resolver = CascadeResolver::new(PhaseTimings::instant(), 42);

        resolver.resolve(&grid);
        resolver.run_to_idle(&mut grid, &mut source);
        let events = resolver.drain_events();

        assert_eq!(resolver.combo(), 2);
        assert!(grid.is_full());
        assert!(find_matches(&grid).is_empty());
        let matching: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                PhaseEvent::Matching { combo, cells } => Some((*combo, cells.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(matching.len(), 2);
        assert_eq!(matching[1], (2, vec![Coord::new(6, 2), Coord::new(6, 3), Coord::new(6, 4)]));
        assert_eq!(events.last(), Some(&PhaseEvent::Idle { combo: 2, capped: false }));
    }

    #[test]
    fn test_board_without_matches_finishes_immediately() {
        let grid: GridState = "GYG\nYGY\nGYG".parse().unwrap();
        let mut resolver = CascadeResolver::new(PhaseTimings::default(), 9);

        assert!(resolver.resolve(&grid));

        assert!(!resolver.is_busy());
        assert_eq!(resolver.combo(), 0);
        assert_eq!(resolver.drain_events(), vec![PhaseEvent::Idle { combo: 0, capped: false }]);
    }

    #[test]
    fn test_resolve_rejected_while_busy() {
        let grid: GridState = SINGLE_MATCH.parse().unwrap();
        let mut resolver = CascadeResolver::new(PhaseTimings::default(), 42);

        assert!(resolver.resolve(&grid));
        assert!(!resolver.resolve(&grid));
        assert_eq!(resolver.combo(), 1);
        assert_eq!(resolver.drain_events().len(), 1);
    }

    #[test]
    fn test_combo_survives_until_next_resolve() {
        let mut grid: GridState = SINGLE_MATCH.parse().unwrap();
        let mut source = CycleColors::new(vec![OrbColor::Purple, OrbColor::Orange, OrbColor::Blue]);
        let mut resolver = CascadeResolver::new(PhaseTimings::default(), 42);

        resolver.resolve(&grid);
        resolver.run_to_idle(&mut grid, &mut source);
        assert_eq!(resolver.combo(), 1);

        // Board is settled, so the next sequence resets the counter to 0
        resolver.resolve(&grid);
        assert_eq!(resolver.combo(), 0);
    }

    #[test]
    fn test_time_driven_phases_hold_busy() {
        let mut grid: GridState = SINGLE_MATCH.parse().unwrap();
        let mut source = CycleColors::new(vec![OrbColor::Purple, OrbColor::Orange, OrbColor::Blue]);
        let timings = PhaseTimings::default();
        let mut resolver = CascadeResolver::new(timings, 42);
        resolver.resolve(&grid);

        resolver.advance(Duration::from_millis(299), &mut grid, &mut source);
        assert_eq!(resolver.phase(), Phase::Flashing);
        assert_eq!(grid.count_empty(), 0);

        resolver.advance(Duration::from_millis(1), &mut grid, &mut source);
        assert_eq!(resolver.phase(), Phase::Clearing);
        assert_eq!(grid.count_empty(), 3);

        // Clearing (150) and most of dropping (250) in one tick
        resolver.advance(Duration::from_millis(300), &mut grid, &mut source);
        assert_eq!(resolver.phase(), Phase::Dropping);
        assert!(resolver.is_busy());

        resolver.advance(Duration::from_millis(100), &mut grid, &mut source);
        assert_eq!(resolver.phase(), Phase::Refilling);
        assert!(grid.is_full());
        assert!(resolver.is_busy());

        resolver.advance(Duration::from_millis(199), &mut grid, &mut source);
        assert!(resolver.is_busy());

        resolver.advance(Duration::from_millis(1), &mut grid, &mut source);
        assert!(!resolver.is_busy());
        assert_eq!(resolver.phase(), Phase::Idle);
        assert_eq!(resolver.combo(), 1);
    }

    #[test]
    fn test_complete_phase_steps_one_phase() {
        let mut grid: GridState = SINGLE_MATCH.parse().unwrap();
        let mut source = CycleColors::new(vec![OrbColor::Purple, OrbColor::Orange, OrbColor::Blue]);
        let mut resolver = CascadeResolver::new(PhaseTimings::default(), 42);
        resolver.resolve(&grid);

        let mut seen = vec![resolver.phase()];
        while resolver.is_busy() {
            resolver.complete_phase(&mut grid, &mut source);
            seen.push(resolver.phase());
        }

        assert_eq!(
            seen,
            vec![Phase::Flashing, Phase::Clearing, Phase::Dropping, Phase::Refilling, Phase::Idle]
        );
    }

    #[test]
    fn test_oversized_tick_finishes_sequence() {
        let mut grid: GridState = SINGLE_MATCH.parse().unwrap();
        let mut source = CycleColors::new(vec![OrbColor::Purple, OrbColor::Orange, OrbColor::Blue]);
        let mut resolver = CascadeResolver::new(PhaseTimings::default(), 42);
        resolver.resolve(&grid);

        resolver.advance(Duration::from_millis(1), &mut grid, &mut source);
        assert!(resolver.is_busy());
        resolver.advance(Duration::MAX, &mut grid, &mut source);

        assert!(!resolver.is_busy());
        assert_eq!(resolver.combo(), 1);
        assert!(grid.is_full());

        // Idle again, so a later tick is a no-op
        resolver.advance(Duration::MAX, &mut grid, &mut source);
        assert_eq!(resolver.phase(), Phase::Idle);
    }

    #[test]
    fn test_pending_tracks_current_round() {
        let mut grid: GridState = SINGLE_MATCH.parse().unwrap();
        let mut source = CycleColors::new(vec![OrbColor::Purple, OrbColor::Orange, OrbColor::Blue]);
        let mut resolver = CascadeResolver::new(PhaseTimings::instant(), 0);
        assert_eq!(resolver.max_rounds(), 1);
        assert_eq!(resolver.timings(), &PhaseTimings::instant());
        assert!(resolver.pending().is_empty());

        resolver.resolve(&grid);
        let expected: MatchSet = [(6, 0), (6, 1), (6, 2)].into_iter().map(Coord::from).collect();
        assert_eq!(resolver.pending(), &expected);

        resolver.complete_phase(&mut grid, &mut source);
        assert_eq!(resolver.phase(), Phase::Clearing);
        assert_eq!(resolver.pending(), &expected);

        resolver.run_to_idle(&mut grid, &mut source);
        assert!(resolver.pending().is_empty());
    }

    #[test]
    fn test_runaway_cascade_is_capped() {
        let mut grid = GridState::filled(3, 3, Palette::first(1), &mut CycleColors::new(vec![OrbColor::Red]));
        let mut source = CycleColors::new(vec![OrbColor::Red]);
        let mut resolver = CascadeResolver::new(PhaseTimings::instant(), 9);

        resolver.resolve(&grid);
        resolver.run_to_idle(&mut grid, &mut source);

        assert!(!resolver.is_busy());
        assert!(resolver.was_capped());
        assert_eq!(resolver.combo(), 9);
        assert!(grid.is_full());
        assert_eq!(
            resolver.drain_events().last(),
            Some(&PhaseEvent::Idle { combo: 9, capped: true })
        );
    }

    fn board_strategy() -> impl Strategy<Value = Vec<Vec<char>>> {
        prop::collection::vec(
            prop::collection::vec(prop::sample::select(vec!['R', 'B', 'G', 'Y', '.']), 6),
            7,
        )
    }

    fn build(cells: &[Vec<char>]) -> GridState {
        let rows = cells
            .iter()
            .map(|line| line.iter().map(|&symbol| cell(symbol)).collect())
            .collect();
        GridState::from_rows(rows).unwrap()
    }

    proptest! {
        #[test]
        fn prop_gravity_leaves_no_gap_under_an_orb(cells in board_strategy()) {
            let mut grid = build(&cells);
            let matches = find_matches(&grid);
            clear_cells(&mut grid, &matches);
            let before: Vec<Vec<OrbColor>> = (0..grid.cols())
                .map(|col| (0..grid.rows()).filter_map(|row| grid.get(row, col).unwrap().color()).collect())
                .collect();

            apply_gravity(&mut grid);

            for col in 0..grid.cols() {
                let mut seen_orb = false;
                for row in 0..grid.rows() {
                    let filled = !grid.get(row, col).unwrap().is_empty();
                    prop_assert!(!(seen_orb && !filled), "gap below an orb in column {}", col);
                    seen_orb |= filled;
                }
                let after: Vec<OrbColor> = (0..grid.rows())
                    .filter_map(|row| grid.get(row, col).unwrap().color())
                    .collect();
                prop_assert_eq!(&after, &before[col]);
            }
        }

        #[test]
        fn prop_refill_fills_exactly_the_empty_cells(cells in board_strategy(), seed in any::<u64>()) {
            let mut grid = build(&cells);
            apply_gravity(&mut grid);
            let empty_per_column: Vec<usize> = (0..grid.cols())
                .map(|col| (0..grid.rows()).filter(|&row| grid.get(row, col) == Some(Cell::Empty)).count())
                .collect();

            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let spawns = refill(&mut grid, &mut rng);

            prop_assert!(grid.is_full());
            for (col, expected) in empty_per_column.iter().enumerate() {
                let spawned = spawns.iter().filter(|spawn| spawn.coord.col == col).count();
                prop_assert_eq!(spawned, *expected);
            }
        }

        #[test]
        fn prop_resolve_always_ends_full_and_idle(seed in any::<u64>()) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut grid = GridState::filled(7, 6, Palette::first(3), &mut rng);
            let mut resolver = CascadeResolver::new(PhaseTimings::instant(), 42);

            resolver.resolve(&grid);
            resolver.run_to_idle(&mut grid, &mut rng);

            prop_assert!(!resolver.is_busy());
            prop_assert!(grid.is_full());
            prop_assert!(resolver.was_capped() || find_matches(&grid).is_empty());
        }
    }
}
