// Deduction engine used to prove boards solvable without guessing
// Knowledge is a list of "these cells hold exactly N mines" constraints;
// safe cells and mines are derived from them until nothing new follows

use std::collections::{BTreeSet, HashSet};

use rand::Rng;
use rand::seq::IteratorRandom;

use crate::asc_game::{Game, Pos, neighbors};

/// A set of cells containing exactly `count` mines
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub cells: BTreeSet<Pos>,
    pub count: usize,
}

impl Constraint {
    pub fn new(cells: impl IntoIterator<Item = Pos>, count: usize) -> Self {
        Constraint {
            cells: cells.into_iter().collect(),
            count,
        }
    }

    fn all_mines(&self) -> bool {
        !self.cells.is_empty() && self.cells.len() == self.count
    }

    fn all_safe(&self) -> bool {
        self.count == 0
    }

    fn remove_mine(&mut self, cell: Pos) {
        if self.cells.remove(&cell) {
            self.count = self.count.saturating_sub(1);
        }
    }

    fn remove_safe(&mut self, cell: Pos) {
        self.cells.remove(&cell);
    }
}

/// Knowledge about a board gathered from revealed clues
#[derive(Clone, Debug)]
pub struct Solver {
    w: usize,
    h: usize,
    pub moves_made: BTreeSet<Pos>,
    pub safes: BTreeSet<Pos>,
    pub mines: BTreeSet<Pos>,
    constraints: Vec<Constraint>,
}

impl Solver {
    pub fn new(w: usize, h: usize) -> Self {
        Solver {
            w,
            h,
            moves_made: BTreeSet::new(),
            safes: BTreeSet::new(),
            mines: BTreeSet::new(),
            constraints: Vec::new(),
        }
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn mark_mine(&mut self, cell: Pos) {
        if self.mines.insert(cell) {
            for c in self.constraints.iter_mut() {
                c.remove_mine(cell);
            }
        }
    }

    pub fn mark_safe(&mut self, cell: Pos) {
        if self.safes.insert(cell) {
            for c in self.constraints.iter_mut() {
                c.remove_safe(cell);
            }
        }
    }

    /// Record a revealed cell and the mine count it shows
    pub fn add_clue(&mut self, cell: Pos, count: u8) {
        self.moves_made.insert(cell);
        self.mark_safe(cell);

        let mut unknown = BTreeSet::new();
        let mut known_mines = 0usize;
        for n in neighbors(self.w, self.h, cell.0, cell.1) {
            if self.mines.contains(&n) {
                known_mines += 1;
            } else if !self.safes.contains(&n) {
                unknown.insert(n);
            }
        }

        if !unknown.is_empty() {
            let constraint = Constraint {
                cells: unknown,
                count: (count as usize).saturating_sub(known_mines),
            };
            if !self.constraints.contains(&constraint) {
                self.constraints.push(constraint);
            }
        }

        self.evaluate();
    }

    /// Apply inference rules until no new safe cell, mine or constraint appears
    fn evaluate(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;

            let mut safes = BTreeSet::new();
            let mut mines = BTreeSet::new();
            for c in &self.constraints {
                if c.all_safe() {
                    safes.extend(c.cells.iter().copied());
                } else if c.all_mines() {
                    mines.extend(c.cells.iter().copied());
                }
            }
            for cell in safes {
                if !self.safes.contains(&cell) {
                    self.mark_safe(cell);
                    changed = true;
                }
            }
            for cell in mines {
                if !self.mines.contains(&cell) {
                    self.mark_mine(cell);
                    changed = true;
                }
            }

            // Drop resolved and duplicate constraints
            let mut seen = HashSet::new();
            self.constraints
                .retain(|c| !c.cells.is_empty() && seen.insert(c.clone()));

            // A ⊂ B  =>  B - A holds N(B) - N(A) mines
            let snapshot = self.constraints.clone();
            for a in &snapshot {
                for b in &snapshot {
                    if a.cells == b.cells || !a.cells.is_subset(&b.cells) {
                        continue;
                    }
                    let Some(count) = b.count.checked_sub(a.count) else {
                        continue;
                    };
                    let derived = Constraint::new(b.cells.difference(&a.cells).copied(), count);
                    if !self.constraints.contains(&derived) {
                        self.constraints.push(derived);
                        changed = true;
                    }
                }
            }
        }
    }

    /// A known safe cell that has not been played yet
    pub fn next_safe_move(&self) -> Option<Pos> {
        self.safes.difference(&self.moves_made).next().copied()
    }

    /// Number of known safe cells that have not been played yet
    pub fn pending_safes(&self) -> usize {
        self.safes.difference(&self.moves_made).count()
    }

    /// Any cell that is neither played nor a known mine
    pub fn random_move<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Pos> {
        (0..self.h)
            .flat_map(|y| (0..self.w).map(move |x| (x, y)))
            .filter(|p| !self.moves_made.contains(p) && !self.mines.contains(p))
            .choose(rng)
    }
}

/// Play every deducible safe move from the opening cell
/// Returns true if that clears all safe cells
pub fn is_solvable(game: &Game) -> bool {
    let Some(first) = game.first_safe else {
        return false;
    };
    let mut solver = Solver::new(game.w, game.h);
    solver.add_clue(first, game.cell(first).adj);
    while let Some(next) = solver.next_safe_move() {
        solver.add_clue(next, game.cell(next).adj);
    }
    solver.moves_made.len() == game.total_safe()
}
