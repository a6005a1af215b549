// Step-by-step visualization of board generation
// Each attempt regenerates the board and lets the solver play one safe move
// per step; the grid flashes green or red when the solver runs dry

use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::asc_color::Tint;
use crate::asc_game::Game;
use crate::asc_solver::Solver;

const SPEED_STEP: f32 = 1.25;
const SPEED_MIN: f32 = 0.10;
const SPEED_MAX: f32 = 250.0;

/// Delays between debugger steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub step: Duration,
    pub attempt_pause: Duration,
    pub flash: Duration,
    pub post_flash: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            step: Duration::from_millis(120),
            attempt_pause: Duration::from_millis(100),
            flash: Duration::from_millis(200),
            post_flash: Duration::from_millis(200),
        }
    }
}

impl Timings {
    /// Timings for a speed factor, scaled inversely from the base delays
    pub fn scaled(speed: f32) -> Self {
        let speed = speed.clamp(SPEED_MIN, SPEED_MAX);
        let ms = |base: f32, floor: u64| Duration::from_millis(((base / speed).round() as u64).max(floor));
        Timings {
            step: ms(180.0, 1),
            attempt_pause: ms(250.0, 20),
            flash: ms(220.0, 20),
            post_flash: ms(220.0, 20),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Attempt,
    Flashing,
    PostPause,
    Done,
}

/// Drives generation attempts until the solver clears a board
#[derive(Debug, Clone)]
pub struct GenerationDebugger {
    timings: Timings,
    speed: f32,
    phase: Phase,
    attempt: usize,
    solver: Option<Solver>,
    solved: bool,
    flash: Option<Tint>,
    next_tick: Instant,
    paused: bool,
}

impl GenerationDebugger {
    pub fn new(now: Instant) -> Self {
        GenerationDebugger {
            timings: Timings::default(),
            speed: 1.0,
            phase: Phase::Idle,
            attempt: 0,
            solver: None,
            solved: false,
            flash: None,
            next_tick: now,
            paused: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn solver(&self) -> Option<&Solver> {
        self.solver.as_ref()
    }

    pub fn flash(&self) -> Option<Tint> {
        self.flash
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        debug!(paused = self.paused, "generation debugger pause toggled");
    }

    /// Safe cells the solver knows about but has not played yet
    pub fn pending_safes(&self) -> usize {
        self.solver.as_ref().map_or(0, Solver::pending_safes)
    }

    pub fn mines_found(&self) -> usize {
        self.solver.as_ref().map_or(0, |s| s.mines.len())
    }

    pub fn moves_made(&self) -> usize {
        self.solver.as_ref().map_or(0, |s| s.moves_made.len())
    }

    /// Begin the first attempt; later calls do nothing
    pub fn start<R: Rng + ?Sized>(&mut self, game: &mut Game, rng: &mut R, now: Instant) {
        if self.phase == Phase::Idle {
            self.start_attempt(game, rng, now);
        }
    }

    fn start_attempt<R: Rng + ?Sized>(&mut self, game: &mut Game, rng: &mut R, now: Instant) {
        game.generate(rng);
        self.attempt += 1;
        self.solver = None;
        self.solved = false;
        self.flash = None;
        self.phase = Phase::Attempt;
        self.next_tick = now + self.timings.attempt_pause;
    }

    /// Advance once the current delay has elapsed
    /// Returns true once a solvable board is on `game`
    pub fn step<R: Rng + ?Sized>(&mut self, game: &mut Game, rng: &mut R, now: Instant) -> bool {
        if self.paused || self.phase == Phase::Idle || now < self.next_tick {
            return self.is_done();
        }
        self.advance(game, rng, now);
        self.is_done()
    }

    /// Advance one step regardless of delays
    pub fn step_manual<R: Rng + ?Sized>(&mut self, game: &mut Game, rng: &mut R, now: Instant) -> bool {
        if self.phase != Phase::Idle {
            self.advance(game, rng, now);
        }
        self.is_done()
    }

    fn advance<R: Rng + ?Sized>(&mut self, game: &mut Game, rng: &mut R, now: Instant) {
        match self.phase {
            Phase::Attempt => {
                let Some(solver) = self.solver.as_mut() else {
                    let Some(first) = game.first_safe else {
                        self.start_attempt(game, rng, now);
                        return;
                    };
                    let mut solver = Solver::new(game.w, game.h);
                    solver.add_clue(first, game.cell(first).adj);
                    game.cursor = first;
                    self.solver = Some(solver);
                    self.next_tick = now + self.timings.step;
                    return;
                };
                if let Some(next) = solver.next_safe_move() {
                    solver.add_clue(next, game.cell(next).adj);
                    game.cursor = next;
                    self.next_tick = now + self.timings.step;
                } else {
                    self.solved = solver.moves_made.len() == game.total_safe();
                    self.flash = Some(if self.solved { Tint::FlashGreen } else { Tint::FlashRed });
                    self.phase = Phase::Flashing;
                    self.next_tick = now + self.timings.flash;
                    debug!(attempt = self.attempt, solved = self.solved, "attempt finished");
                }
            }
            Phase::Flashing => {
                self.flash = None;
                self.phase = Phase::PostPause;
                self.next_tick = now + self.timings.post_flash;
            }
            Phase::PostPause => {
                if self.solved {
                    self.phase = Phase::Done;
                    info!(attempts = self.attempt, "solvable board found");
                } else {
                    self.start_attempt(game, rng, now);
                }
            }
            Phase::Idle | Phase::Done => {}
        }
    }

    pub fn speed_up(&mut self, now: Instant) {
        self.set_speed(self.speed * SPEED_STEP, now);
    }

    pub fn slow_down(&mut self, now: Instant) {
        self.set_speed(self.speed / SPEED_STEP, now);
    }

    /// Apply a new speed factor and reschedule the pending step
    pub fn set_speed(&mut self, speed: f32, now: Instant) {
        self.speed = speed.clamp(SPEED_MIN, SPEED_MAX);
        self.timings = Timings::scaled(self.speed);
        if self.paused {
            return;
        }
        self.next_tick = now
            + match self.phase {
                Phase::Attempt => self.timings.step,
                Phase::Flashing => self.timings.flash,
                Phase::PostPause => self.timings.post_flash,
                Phase::Idle | Phase::Done => self.timings.attempt_pause,
            };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn run_to_done(dbg: &mut GenerationDebugger, game: &mut Game, rng: &mut StdRng) -> usize {
        let mut now = Instant::now();
        dbg.start(game, rng, now);
        let mut steps = 0;
        while !dbg.step(game, rng, now) {
            now += Duration::from_millis(250);
            steps += 1;
            assert!(steps < 1_000_000, "debugger never finished");
        }
        steps
    }

    #[test]
    fn default_and_scaled_timings() {
        let base = Timings::default();
        assert_eq!(base.step, Duration::from_millis(120));
        assert_eq!(base.attempt_pause, Duration::from_millis(100));

        let one = Timings::scaled(1.0);
        assert_eq!(one.step, Duration::from_millis(180));
        assert_eq!(one.attempt_pause, Duration::from_millis(250));

        let fast = Timings::scaled(250.0);
        assert_eq!(fast.step, Duration::from_millis(1));
        assert_eq!(fast.flash, Duration::from_millis(20));
        assert_eq!(fast.post_flash, Duration::from_millis(20));
    }

    #[test]
    fn speed_is_clamped() {
        let now = Instant::now();
        let mut dbg = GenerationDebugger::new(now);
        for _ in 0..100 {
            dbg.speed_up(now);
        }
        assert_eq!(dbg.speed(), SPEED_MAX);
        for _ in 0..200 {
            dbg.slow_down(now);
        }
        assert!((dbg.speed() - SPEED_MIN).abs() < f32::EPSILON);
    }

    #[test]
    fn finishes_on_a_solvable_board() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut game = Game::new(14, 8, 10);
        let mut dbg = GenerationDebugger::new(Instant::now());
        run_to_done(&mut dbg, &mut game, &mut rng);
        assert!(dbg.is_done());
        assert!(dbg.attempt() >= 1);
        assert_eq!(dbg.moves_made(), game.total_safe());
        assert!(crate::asc_solver::is_solvable(&game));
        assert_eq!(dbg.flash(), None);
    }

    #[test]
    fn waits_for_the_delay() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = Game::new(14, 8, 10);
        let now = Instant::now();
        let mut dbg = GenerationDebugger::new(now);
        dbg.start(&mut game, &mut rng, now);
        assert_eq!(dbg.attempt(), 1);
        dbg.step(&mut game, &mut rng, now);
        assert!(dbg.solver().is_none());
        dbg.step(&mut game, &mut rng, now + Duration::from_millis(100));
        assert_eq!(dbg.moves_made(), 1);
        assert_eq!(Some(game.cursor), game.first_safe);
    }

    #[test]
    fn paused_debugger_only_moves_manually() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut game = Game::new(14, 8, 10);
        let now = Instant::now();
        let mut dbg = GenerationDebugger::new(now);
        dbg.start(&mut game, &mut rng, now);
        dbg.toggle_pause();
        let later = now + Duration::from_secs(10);
        dbg.step(&mut game, &mut rng, later);
        assert!(dbg.solver().is_none());
        dbg.step_manual(&mut game, &mut rng, now);
        assert_eq!(dbg.moves_made(), 1);
        dbg.toggle_pause();
        assert!(!dbg.is_paused());
    }

    #[test]
    fn unsolvable_board_flashes_red_and_retries() {
        // 2x2 with one mine is a coin flip for the solver
        let mut rng = StdRng::seed_from_u64(9);
        let mut game = Game::new(2, 2, 1);
        let now = Instant::now();
        let mut dbg = GenerationDebugger::new(now);
        dbg.start(&mut game, &mut rng, now);

        // Seed the solver, then it stalls immediately
        dbg.step_manual(&mut game, &mut rng, now);
        assert_eq!(dbg.moves_made(), 1);
        dbg.step_manual(&mut game, &mut rng, now);
        assert_eq!(dbg.phase(), Phase::Flashing);
        assert_eq!(dbg.flash(), Some(Tint::FlashRed));

        dbg.step_manual(&mut game, &mut rng, now);
        assert_eq!(dbg.phase(), Phase::PostPause);
        assert_eq!(dbg.flash(), None);

        dbg.step_manual(&mut game, &mut rng, now);
        assert_eq!(dbg.attempt(), 2);
        assert_eq!(dbg.phase(), Phase::Attempt);
        assert!(dbg.solver().is_none());
    }
}
