// Screens of the game
// Each view consumes events, advances its own timers and describes what to
// draw as a backend-neutral Scene; the main loop swaps views on transitions

use rand::rngs::StdRng;
use std::time::Instant;
use tracing::info;

use crate::asc_app::AppContext;
use crate::asc_assets::{FONT_REGULAR, FONT_SUBTEXT, FONT_TITLE, Font};
use crate::asc_color::Tint;
use crate::asc_debugger::GenerationDebugger;
use crate::asc_error::AssetError;
use crate::asc_game::{Game, Pos};
use crate::asc_input::GameEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
}

/// Which screen is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Start,
    Game,
    End(Outcome),
}

/// View change requested by the active view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Game,
    End(Outcome),
    Exit,
}

/// What a single grid cell shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFace {
    Hidden,
    Flagged,
    Number(u8),
    Asteroid,
    KnownMine, // Mine deduced by the solver
    KnownSafe, // Safe cell the solver has not played yet
}

/// Centered headline with a line of subtext below
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub headline: String,
    pub headline_font: Font,
    pub headline_tint: Tint,
    pub subline: String,
    pub subline_font: Font,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardScene {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<CellFace>, // Row-major
    pub selected: Pos,
    pub outline: Tint,
    pub background: Tint,
    pub progress: f32,
    pub revealed_label: String,
    pub percent_label: String,
    pub title: Option<String>,
    pub hud: Option<[String; 4]>,
    pub flash: Option<Tint>,
    pub label_font: Font,
    pub title_font: Font,
    pub hud_font: Font,
}

impl BoardScene {
    pub fn face(&self, (x, y): Pos) -> CellFace {
        self.cells[y * self.width + x]
    }
}

/// Render instructions for one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Scene {
    Blank,
    Banner(Banner),
    Board(BoardScene),
}

pub trait View {
    fn kind(&self) -> ViewKind;

    /// React to one input event; quit events never arrive here
    fn handle_event(&mut self, event: GameEvent, ctx: &AppContext, now: Instant) -> Option<Transition>;

    /// Per-frame work that does not depend on input
    fn update(&mut self, _ctx: &AppContext, _now: Instant) -> Option<Transition> {
        None
    }

    fn render(&self, ctx: &AppContext) -> Scene;
}

// ----------------------------------------------------------------------------
// Start screen
// ----------------------------------------------------------------------------

pub struct StartView {
    banner: Banner,
}

impl StartView {
    pub fn new(ctx: &AppContext) -> Result<Self, AssetError> {
        let assets = &ctx.assets;
        Ok(StartView {
            banner: Banner {
                headline: assets.text("critical_error")?.to_string(),
                headline_font: assets.get_font("title", FONT_TITLE)?,
                headline_tint: Tint::Red,
                subline: assets.text("enter_prompt")?.to_string(),
                subline_font: assets.get_font("subtext", FONT_SUBTEXT)?,
            },
        })
    }
}

impl View for StartView {
    fn kind(&self) -> ViewKind {
        ViewKind::Start
    }

    fn handle_event(&mut self, event: GameEvent, _ctx: &AppContext, _now: Instant) -> Option<Transition> {
        (event == GameEvent::Enter).then_some(Transition::Game)
    }

    fn render(&self, _ctx: &AppContext) -> Scene {
        Scene::Banner(self.banner.clone())
    }
}

// ----------------------------------------------------------------------------
// Game screen
// ----------------------------------------------------------------------------

enum Mode {
    Play,
    Debug(GenerationDebugger),
}

// Strings resolved once when the view is created
struct BoardText {
    title: String,
    revealed: String,
    hud: [String; 4],
}

pub struct GameView {
    game: Game,
    rng: StdRng,
    mode: Mode,
    outline: Tint,
    background: Tint,
    fail_at: Option<Instant>, // When the lost board gives way to the end screen
    text: BoardText,
    fonts: [Font; 3], // regular, title, subtext
}

impl GameView {
    /// Create the board; in play mode a solvable board is generated and opened right away
    pub fn new(ctx: &AppContext, mut rng: StdRng, now: Instant) -> Result<Self, AssetError> {
        let assets = &ctx.assets;
        let text = BoardText {
            title: assets.text("title")?.to_string(),
            revealed: assets.text("revealed")?.to_string(),
            hud: [
                assets.text("hud_attempt")?.to_string(),
                assets.text("hud_safe_moves")?.to_string(),
                assets.text("hud_mines")?.to_string(),
                assets.text("hud_speed")?.to_string(),
            ],
        };
        let fonts = [
            assets.get_font("regular", FONT_REGULAR)?,
            assets.get_font("title", FONT_TITLE)?,
            assets.get_font("subtext", FONT_SUBTEXT)?,
        ];

        let mut game = Game::new(ctx.config.field_width, ctx.config.field_height, ctx.mine_count);
        let mode = if ctx.ai_debug {
            Mode::Debug(GenerationDebugger::new(now))
        } else {
            let outcome = game.generate_solvable(&mut rng, ctx.config.max_generation_attempts);
            info!(attempts = outcome.attempts, solvable = outcome.solvable, "board ready");
            game.open_first_safe();
            Mode::Play
        };

        Ok(GameView {
            game,
            rng,
            mode,
            outline: Tint::CellOutline,
            background: Tint::DarkBlue,
            fail_at: None,
            text,
            fonts,
        })
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn debugger(&self) -> Option<&GenerationDebugger> {
        match &self.mode {
            Mode::Debug(dbg) => Some(dbg),
            Mode::Play => None,
        }
    }

    pub fn is_debugging(&self) -> bool {
        matches!(self.mode, Mode::Debug(_))
    }

    // The debugger left a solvable board behind; start playing it
    fn finish_debugging(&mut self) {
        self.game.open_first_safe();
        self.mode = Mode::Play;
        info!("generation debugger done, switching to play");
    }

    fn handle_debug_event(&mut self, event: GameEvent, now: Instant) {
        let Mode::Debug(dbg) = &mut self.mode else {
            return;
        };
        match event {
            GameEvent::Enter => dbg.toggle_pause(),
            GameEvent::Right if dbg.is_paused() => {
                if dbg.step_manual(&mut self.game, &mut self.rng, now) {
                    self.finish_debugging();
                }
            }
            GameEvent::Up => dbg.speed_up(now),
            GameEvent::Down => dbg.slow_down(now),
            _ => {}
        }
    }

    fn handle_play_event(&mut self, event: GameEvent, ctx: &AppContext, now: Instant) -> Option<Transition> {
        if self.game.game_over.is_some() {
            return None;
        }
        let (x, y) = self.game.cursor;
        match event {
            GameEvent::Up => self.game.step_cursor(0, -1),
            GameEvent::Down => self.game.step_cursor(0, 1),
            GameEvent::Left => self.game.step_cursor(-1, 0),
            GameEvent::Right => self.game.step_cursor(1, 0),
            GameEvent::Flag => self.game.toggle_flag(x, y),
            GameEvent::Enter => {
                self.game.reveal(x, y);
                if self.game.is_lost() {
                    self.outline = Tint::Red;
                    self.background = Tint::DarkRed;
                    self.fail_at = Some(now + ctx.config.reset_delay());
                    info!(x, y, "asteroid hit");
                } else if self.game.is_won() {
                    return Some(Transition::End(Outcome::Won));
                }
            }
            GameEvent::Quit => {}
        }
        None
    }

    fn faces(&self) -> Vec<CellFace> {
        let g = &self.game;
        let solver = self.debugger().and_then(GenerationDebugger::solver);
        (0..g.h)
            .flat_map(|y| (0..g.w).map(move |x| (x, y)))
            .map(|p| match (&self.mode, solver) {
                (Mode::Debug(_), Some(s)) => {
                    if s.mines.contains(&p) {
                        CellFace::KnownMine
                    } else if s.moves_made.contains(&p) {
                        CellFace::Number(g.cell(p).adj)
                    } else if s.safes.contains(&p) {
                        CellFace::KnownSafe
                    } else {
                        CellFace::Hidden
                    }
                }
                (Mode::Debug(_), None) => CellFace::Hidden,
                (Mode::Play, _) => {
                    if g.is_flagged(p) {
                        CellFace::Flagged
                    } else if g.is_revealed(p) && g.cell(p).mine {
                        CellFace::Asteroid
                    } else if g.is_revealed(p) {
                        CellFace::Number(g.cell(p).adj)
                    } else {
                        CellFace::Hidden
                    }
                }
            })
            .collect()
    }
}

impl View for GameView {
    fn kind(&self) -> ViewKind {
        ViewKind::Game
    }

    fn handle_event(&mut self, event: GameEvent, ctx: &AppContext, now: Instant) -> Option<Transition> {
        if self.is_debugging() {
            self.handle_debug_event(event, now);
            return None;
        }
        self.handle_play_event(event, ctx, now)
    }

    fn update(&mut self, _ctx: &AppContext, now: Instant) -> Option<Transition> {
        if let Mode::Debug(dbg) = &mut self.mode {
            dbg.start(&mut self.game, &mut self.rng, now);
            if dbg.step(&mut self.game, &mut self.rng, now) {
                self.finish_debugging();
            }
            return None;
        }

        if self.game.is_won() {
            return Some(Transition::End(Outcome::Won));
        }
        match self.fail_at {
            Some(at) if now >= at => Some(Transition::End(Outcome::Lost)),
            _ => None,
        }
    }

    fn render(&self, _ctx: &AppContext) -> Scene {
        let total = self.game.total_safe();
        let (revealed, hud, flash) = match &self.mode {
            Mode::Play => (self.game.revealed_safe, None, None),
            Mode::Debug(dbg) => {
                let [attempt, safes, mines, speed] = &self.text.hud;
                let hud = [
                    format!("{} {}", attempt, dbg.attempt()),
                    format!("{} {}", safes, dbg.pending_safes()),
                    format!("{} {}/{}", mines, dbg.mines_found(), self.game.mines),
                    format!("{} x{:.2}", speed, dbg.speed()),
                ];
                (dbg.moves_made(), Some(hud), dbg.flash())
            }
        };
        let progress = if total > 0 { revealed as f32 / total as f32 } else { 0.0 };
        let [regular, title, subtext] = self.fonts;

        Scene::Board(BoardScene {
            width: self.game.w,
            height: self.game.h,
            cells: self.faces(),
            selected: self.game.cursor,
            outline: self.outline,
            background: self.background,
            progress,
            revealed_label: format!("{} {} / {}", self.text.revealed, revealed, total),
            percent_label: format!("{}%", (progress * 100.0) as u32),
            title: (!self.is_debugging()).then(|| self.text.title.clone()),
            hud,
            flash,
            label_font: regular,
            title_font: title,
            hud_font: subtext,
        })
    }
}

// ----------------------------------------------------------------------------
// End screens
// ----------------------------------------------------------------------------

pub struct EndView {
    outcome: Outcome,
    banner: Banner,
    seconds: String,
    started: Instant,
    remaining: u64, // Seconds left on the lost countdown
}

impl EndView {
    pub fn new(ctx: &AppContext, outcome: Outcome, now: Instant) -> Result<Self, AssetError> {
        let assets = &ctx.assets;
        let seconds = assets.text("seconds")?.to_string();
        let remaining = ctx.config.fail_view_timer_secs;
        let (headline, subline) = match outcome {
            Outcome::Won => (assets.text("mission_success")?.to_string(), "trajectory_restored"),
            Outcome::Lost => (format!("{} {}", remaining, seconds), "until_reset"),
        };
        let banner = Banner {
            headline,
            headline_font: assets.get_font("title", FONT_TITLE)?,
            headline_tint: Tint::White,
            subline: assets.text(subline)?.to_string(),
            subline_font: assets.get_font("subtext", FONT_SUBTEXT)?,
        };
        Ok(EndView {
            outcome,
            banner,
            seconds,
            started: now,
            remaining,
        })
    }

    /// Whole seconds left before the lost screen resets
    pub fn remaining_secs(&self) -> u64 {
        self.remaining
    }
}

impl View for EndView {
    fn kind(&self) -> ViewKind {
        ViewKind::End(self.outcome)
    }

    fn handle_event(&mut self, event: GameEvent, ctx: &AppContext, _now: Instant) -> Option<Transition> {
        match (event, self.outcome) {
            (GameEvent::Enter, Outcome::Won) if ctx.config.quit_after_win => Some(Transition::Exit),
            (GameEvent::Enter, _) => Some(Transition::Start),
            _ => None,
        }
    }

    fn update(&mut self, ctx: &AppContext, now: Instant) -> Option<Transition> {
        if self.outcome == Outcome::Won {
            return None;
        }
        let timer = ctx.config.fail_timer();
        let elapsed = now.saturating_duration_since(self.started);
        self.remaining = timer.as_secs().saturating_sub(elapsed.as_secs());
        self.banner.headline = format!("{} {}", self.remaining, self.seconds);
        (elapsed >= timer).then_some(Transition::Start)
    }

    fn render(&self, _ctx: &AppContext) -> Scene {
        Scene::Banner(self.banner.clone())
    }
}
