// Core minefield logic
// Handles board generation, reveal/flag rules and the selector cursor

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::asc_solver;

/// Board coordinates as (x, y), i.e. (column, row)
pub type Pos = (usize, usize);

/// A single cell on the minefield
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub mine: bool, // Contains a mine
    pub adj: u8,    // Adjacent mine count (0-8)
}

/// Result of a solvable-board search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Generation {
    pub attempts: usize,
    pub solvable: bool,
}

/// Main game state
#[derive(Clone, Debug)]
pub struct Game {
    pub w: usize,                 // Board width
    pub h: usize,                 // Board height
    pub mines: usize,             // Total mine count
    pub board: Vec<Cell>,         // Board cells (mines + adjacency counts)
    pub revealed: Vec<bool>,      // Cell reveal status
    pub flagged: Vec<bool>,       // Cell flag status
    pub cursor: Pos,              // Selected cell
    pub first_safe: Option<Pos>,  // Opening move the solver starts from
    pub revealed_safe: usize,     // Revealed non-mine cells
    pub game_over: Option<bool>,  // Some(true)=win, Some(false)=loss, None=ongoing
}

/// All in-bounds neighbours of (x, y) in row-major order
pub fn neighbors(w: usize, h: usize, x: usize, y: usize) -> impl Iterator<Item = Pos> {
    let xs = x.saturating_sub(1)..=(x + 1).min(w - 1);
    let ys = y.saturating_sub(1)..=(y + 1).min(h - 1);
    ys.flat_map(move |oy| xs.clone().map(move |ox| (ox, oy)))
        .filter(move |&(ox, oy)| !(ox == x && oy == y))
}

impl Game {
    /// Create an empty board; mines are placed by `generate`
    /// The mine count is clamped so at least one safe cell remains
    pub fn new(w: usize, h: usize, mines: usize) -> Self {
        let n = w * h;
        Game {
            w,
            h,
            mines: mines.min(n.saturating_sub(1)),
            board: vec![Cell::default(); n],
            revealed: vec![false; n],
            flagged: vec![false; n],
            cursor: (0, 0),
            first_safe: None,
            revealed_safe: 0,
            game_over: None,
        }
    }

    /// Build a board with mines at fixed positions
    /// The opening move is the first zero cell (or first safe cell) in row-major order
    pub fn from_layout(w: usize, h: usize, mines: &[Pos]) -> Self {
        let mut g = Game::new(w, h, mines.len());
        for &(x, y) in mines {
            let idx = g.index(x, y);
            g.board[idx].mine = true;
        }
        g.mines = g.board.iter().filter(|c| c.mine).count();
        g.compute_adjacency();
        g.first_safe = g.zero_cells().first().copied().or_else(|| g.first_safe_cell());
        g
    }

    /// Convert (x, y) coordinates to flat array index
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    pub fn cell(&self, (x, y): Pos) -> Cell {
        self.board[self.index(x, y)]
    }

    pub fn is_revealed(&self, (x, y): Pos) -> bool {
        self.revealed[self.index(x, y)]
    }

    pub fn is_flagged(&self, (x, y): Pos) -> bool {
        self.flagged[self.index(x, y)]
    }

    /// Number of cells that do not contain a mine
    pub fn total_safe(&self) -> usize {
        self.w * self.h - self.mines
    }

    pub fn remaining_safe(&self) -> usize {
        self.total_safe() - self.revealed_safe
    }

    /// Fraction of safe cells revealed so far (0.0 - 1.0)
    pub fn progress(&self) -> f32 {
        let total = self.total_safe();
        if total == 0 {
            return 0.0;
        }
        self.revealed_safe as f32 / total as f32
    }

    pub fn is_won(&self) -> bool {
        self.game_over == Some(true)
    }

    pub fn is_lost(&self) -> bool {
        self.game_over == Some(false)
    }

    /// Clear reveal/flag state and the result, keeping the mine layout
    fn reset_state(&mut self) {
        self.revealed.iter_mut().for_each(|r| *r = false);
        self.flagged.iter_mut().for_each(|f| *f = false);
        self.cursor = (0, 0);
        self.revealed_safe = 0;
        self.game_over = None;
    }

    /// Place mines at random, compute adjacency and choose the opening move
    pub fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.reset_state();
        self.place_mines(rng);
        self.compute_adjacency();
        // Any zero cell is as good as another; fall back to the first safe cell
        let zeros = self.zero_cells();
        self.first_safe = zeros.choose(rng).copied().or_else(|| self.first_safe_cell());
    }

    /// Generate boards until the solver can clear one without guessing
    /// Keeps the last board if `max_attempts` is exhausted
    pub fn generate_solvable<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        max_attempts: usize,
    ) -> Generation {
        let max_attempts = max_attempts.max(1);
        for attempt in 1..=max_attempts {
            self.generate(rng);
            if asc_solver::is_solvable(self) {
                debug!(attempt, "solvable board generated");
                return Generation {
                    attempts: attempt,
                    solvable: true,
                };
            }
        }
        warn!(max_attempts, mines = self.mines, "no solvable board found, keeping the last one");
        Generation {
            attempts: max_attempts,
            solvable: false,
        }
    }

    fn place_mines<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let n = self.w * self.h;
        for cell in self.board.iter_mut() {
            *cell = Cell::default();
        }
        let mut placed = 0;
        while placed < self.mines {
            let i = rng.gen_range(0..n);
            if !self.board[i].mine {
                self.board[i].mine = true;
                placed += 1;
            }
        }
    }

    fn compute_adjacency(&mut self) {
        for y in 0..self.h {
            for x in 0..self.w {
                let adj = neighbors(self.w, self.h, x, y)
                    .filter(|&(ox, oy)| self.board[self.index(ox, oy)].mine)
                    .count() as u8;
                let idx = self.index(x, y);
                self.board[idx].adj = if self.board[idx].mine { 0 } else { adj };
            }
        }
    }

    fn zero_cells(&self) -> Vec<Pos> {
        (0..self.h)
            .flat_map(|y| (0..self.w).map(move |x| (x, y)))
            .filter(|&p| {
                let c = self.cell(p);
                !c.mine && c.adj == 0
            })
            .collect()
    }

    fn first_safe_cell(&self) -> Option<Pos> {
        (0..self.h)
            .flat_map(|y| (0..self.w).map(move |x| (x, y)))
            .find(|&p| !self.cell(p).mine)
    }

    /// Reveal the opening move and put the selector on it
    pub fn open_first_safe(&mut self) {
        if let Some((x, y)) = self.first_safe {
            self.reveal(x, y);
            self.cursor = (x, y);
        }
    }

    /// Reveal a cell at (x, y)
    /// - Flagged and already revealed cells are left alone
    /// - Auto-reveals neighbors if cell has no adjacent mines (flood fill)
    /// - Ends game on mine hit or win condition
    pub fn reveal(&mut self, x: usize, y: usize) {
        let idx = self.index(x, y);
        if self.game_over.is_some() || self.revealed[idx] || self.flagged[idx] {
            return;
        }
        let mut pending = vec![(x, y)];
        while let Some((cx, cy)) = pending.pop() {
            let i = self.index(cx, cy);
            if self.revealed[i] || self.flagged[i] {
                continue;
            }
            self.revealed[i] = true;
            if self.board[i].mine {
                // Hit a mine - game over (loss)
                self.game_over = Some(false);
                return;
            }
            self.revealed_safe += 1;
            if self.board[i].adj == 0 {
                pending.extend(
                    neighbors(self.w, self.h, cx, cy).filter(|&(ox, oy)| !self.revealed[self.index(ox, oy)]),
                );
            }
        }
        if self.check_win() {
            self.game_over = Some(true);
        }
    }

    /// Toggle flag state for an unrevealed cell
    pub fn toggle_flag(&mut self, x: usize, y: usize) {
        let idx = self.index(x, y);
        if self.revealed[idx] {
            return;
        }
        self.flagged[idx] = !self.flagged[idx];
    }

    /// Check if all non-mine cells have been revealed (win condition)
    pub fn check_win(&self) -> bool {
        self.revealed_safe == self.total_safe()
    }

    pub fn step_cursor(&mut self, dx: isize, dy: isize) {
        let nx = (self.cursor.0 as isize + dx).clamp(0, (self.w - 1) as isize) as usize;
        let ny = (self.cursor.1 as isize + dy).clamp(0, (self.h - 1) as isize) as usize;
        self.cursor = (nx, ny);
    }
}
