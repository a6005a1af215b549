// Main loop and shared context
// poll -> dispatch -> update -> render -> pace, until a quit event arrives

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

use crate::asc_assets::{AssetManager, Language};
use crate::asc_config::Config;
use crate::asc_error::GameError;
use crate::asc_input::{EventManager, GameEvent};
use crate::asc_render::Renderer;
use crate::asc_view::{EndView, GameView, Scene, StartView, Transition, View, ViewKind};

/// Smallest mine count accepted on the command line
pub const MIN_MINES: usize = 10;

/// Process-wide read-only state handed to every view
pub struct AppContext {
    pub language: Language,
    pub mine_count: usize,
    pub ai_debug: bool,
    pub config: Config,
    pub assets: AssetManager,
    pub seed: Option<u64>,
}

impl AppContext {
    /// Validate the mine count against the field and load the assets
    pub fn new(
        language: Language,
        mine_count: usize,
        ai_debug: bool,
        config: Config,
        seed: Option<u64>,
    ) -> Result<Self, GameError> {
        let cells = config.field_cells();
        if config.field_width == 0 || config.field_height == 0 {
            return Err(GameError::InvalidArgument(format!(
                "field size {}x{} is empty",
                config.field_width, config.field_height
            )));
        }
        if mine_count < MIN_MINES {
            return Err(GameError::InvalidArgument(format!(
                "MINECOUNT must be at least {MIN_MINES}, got {mine_count}"
            )));
        }
        if mine_count >= cells {
            return Err(GameError::InvalidArgument(format!(
                "MINECOUNT must be at most {} for a {}x{} field, got {mine_count}",
                cells - 1,
                config.field_width,
                config.field_height
            )));
        }
        let assets = AssetManager::load(language, config.asset_dir.as_deref())?;
        Ok(AppContext {
            language,
            mine_count,
            ai_debug,
            config,
            assets,
            seed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Quitting,
}

pub struct App {
    ctx: AppContext,
    events: EventManager,
    renderer: Box<dyn Renderer>,
    view: Box<dyn View>,
    rng: StdRng,
    state: LoopState,
}

impl App {
    /// Build the loop with the Start view active
    pub fn new(ctx: AppContext, events: EventManager, renderer: Box<dyn Renderer>) -> anyhow::Result<Self> {
        let rng = match ctx.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let view: Box<dyn View> = Box::new(StartView::new(&ctx)?);
        info!(
            language = ctx.language.code(),
            mines = ctx.mine_count,
            ai_debug = ctx.ai_debug,
            inputs = ?events.source_names(),
            "application ready"
        );
        Ok(App {
            ctx,
            events,
            renderer,
            view,
            rng,
            state: LoopState::Running,
        })
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn active_view(&self) -> ViewKind {
        self.view.kind()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    fn make_view(&mut self, transition: Transition, now: Instant) -> anyhow::Result<Option<Box<dyn View>>> {
        let view: Box<dyn View> = match transition {
            Transition::Start => Box::new(StartView::new(&self.ctx)?),
            Transition::Game => {
                // Every game gets its own stream so seeded runs stay reproducible
                let rng = StdRng::seed_from_u64(self.rng.next_u64());
                Box::new(GameView::new(&self.ctx, rng, now)?)
            }
            Transition::End(outcome) => Box::new(EndView::new(&self.ctx, outcome, now)?),
            Transition::Exit => return Ok(None),
        };
        Ok(Some(view))
    }

    fn apply(&mut self, transition: Transition, now: Instant) -> anyhow::Result<()> {
        match self.make_view(transition, now)? {
            Some(view) => {
                info!(from = ?self.view.kind(), to = ?view.kind(), "switching view");
                self.view = view;
            }
            None => {
                info!("exit requested by {:?}", self.view.kind());
                self.state = LoopState::Quitting;
            }
        }
        Ok(())
    }

    /// One loop iteration without pacing
    pub fn tick(&mut self, now: Instant) -> anyhow::Result<LoopState> {
        if self.state == LoopState::Quitting {
            return Ok(self.state);
        }

        let events = self.events.poll(now).context("polling input")?;
        let mut pending = None;
        for event in events {
            if event == GameEvent::Quit {
                info!("quit event received");
                self.state = LoopState::Quitting;
                return Ok(self.state);
            }
            if pending.is_some() {
                debug!(?event, "dropping event after view transition");
                continue;
            }
            pending = self.view.handle_event(event, &self.ctx, now);
        }
        if let Some(transition) = pending {
            self.apply(transition, now)?;
        }

        if self.state == LoopState::Running {
            if let Some(transition) = self.view.update(&self.ctx, now) {
                self.apply(transition, now)?;
            }
        }
        if self.state == LoopState::Running {
            let scene = self.view.render(&self.ctx);
            self.renderer.draw(&scene).context("drawing frame")?;
        }
        Ok(self.state)
    }

    /// Run until quit, then blank and release the display
    pub fn run(&mut self) -> anyhow::Result<()> {
        let frame = self.ctx.config.frame_interval();
        loop {
            let started = Instant::now();
            if self.tick(started)? == LoopState::Quitting {
                break;
            }
            // Pace to the configured frame rate
            thread::sleep(frame.saturating_sub(started.elapsed()));
        }
        self.shutdown()
    }

    pub fn shutdown(&mut self) -> anyhow::Result<()> {
        info!("shutting down");
        self.renderer.draw(&Scene::Blank).context("clearing display")?;
        self.renderer.shutdown().context("releasing display")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asc_input::ScriptedInput;
    use crate::asc_render::{HeadlessRenderer, SceneLog};
    use crate::asc_view::Outcome;
    use std::time::Duration;

    fn app_with(frames: Vec<Vec<GameEvent>>, ai_debug: bool) -> (App, SceneLog) {
        let ctx = AppContext::new(Language::En, 20, ai_debug, Config::default(), Some(42)).expect("context");
        let renderer = HeadlessRenderer::new();
        let log = renderer.log();
        let events = EventManager::new().with_source(Box::new(ScriptedInput::new(frames)));
        let app = App::new(ctx, events, Box::new(renderer)).expect("app");
        (app, log)
    }

    #[test]
    fn mine_count_bounds_are_checked() {
        assert!(matches!(
            AppContext::new(Language::En, 9, false, Config::default(), None),
            Err(GameError::InvalidArgument(_))
        ));
        assert!(matches!(
            AppContext::new(Language::De, 112, false, Config::default(), None),
            Err(GameError::InvalidArgument(_))
        ));
        assert!(AppContext::new(Language::De, 111, false, Config::default(), None).is_ok());
    }

    #[test]
    fn first_frame_is_start_banner() {
        let (mut app, log) = app_with(vec![], false);
        assert_eq!(app.active_view(), ViewKind::Start);
        assert_eq!(app.tick(Instant::now()).expect("tick"), LoopState::Running);
        let Some(Scene::Banner(banner)) = log.last() else {
            panic!("start banner expected");
        };
        assert_eq!(banner.headline, "Critical System Error");
    }

    #[test]
    fn quit_stops_within_one_iteration() {
        let (mut app, log) = app_with(vec![vec![GameEvent::Quit, GameEvent::Enter]], false);
        assert_eq!(app.tick(Instant::now()).expect("tick"), LoopState::Quitting);
        assert_eq!(app.active_view(), ViewKind::Start);
        assert!(log.is_empty());
        // Further ticks do nothing
        assert_eq!(app.tick(Instant::now()).expect("tick"), LoopState::Quitting);
    }

    #[test]
    fn quit_wins_over_earlier_transition() {
        let (mut app, _log) = app_with(vec![vec![GameEvent::Enter, GameEvent::Quit]], false);
        assert_eq!(app.tick(Instant::now()).expect("tick"), LoopState::Quitting);
    }

    #[test]
    fn events_after_a_transition_are_dropped() {
        // The second Enter would reveal on the game board if it leaked through
        let (mut app, log) = app_with(vec![vec![GameEvent::Enter, GameEvent::Down, GameEvent::Flag]], false);
        app.tick(Instant::now()).expect("tick");
        assert_eq!(app.active_view(), ViewKind::Game);
        let Some(Scene::Board(board)) = log.last() else {
            panic!("board expected");
        };
        assert!(board.cells.iter().all(|face| *face != crate::asc_view::CellFace::Flagged));
        assert_eq!(board.title.as_deref(), Some("ASTEROIDSCANNER"));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let boards: Vec<_> = (0..2)
            .map(|_| {
                let (mut app, log) = app_with(vec![vec![GameEvent::Enter]], false);
                app.tick(Instant::now()).expect("tick");
                log.last()
            })
            .collect();
        assert_eq!(boards[0], boards[1]);
    }

    #[test]
    fn debug_mode_starts_with_generation_hud() {
        let (mut app, log) = app_with(vec![vec![GameEvent::Enter]], true);
        let now = Instant::now();
        app.tick(now).expect("tick");
        assert_eq!(app.active_view(), ViewKind::Game);
        let Some(Scene::Board(board)) = log.last() else {
            panic!("board expected");
        };
        assert!(board.title.is_none());
        assert_eq!(board.hud.expect("hud")[0], "Attempt 1");
        app.tick(now + Duration::from_millis(16)).expect("tick");
        assert_eq!(app.active_view(), ViewKind::Game);
    }

    #[test]
    fn lost_screen_returns_to_start_after_timer() {
        let ctx = AppContext::new(
            Language::En,
            10,
            false,
            Config {
                fail_view_timer_secs: 1,
                ..Config::default()
            },
            Some(1),
        )
        .expect("context");
        let renderer = HeadlessRenderer::new();
        let mut app = App::new(ctx, EventManager::new(), Box::new(renderer)).expect("app");
        let now = Instant::now();
        app.apply(Transition::End(Outcome::Lost), now).expect("apply");
        assert_eq!(app.active_view(), ViewKind::End(Outcome::Lost));
        app.tick(now + Duration::from_millis(500)).expect("tick");
        assert_eq!(app.active_view(), ViewKind::End(Outcome::Lost));
        app.tick(now + Duration::from_millis(1000)).expect("tick");
        assert_eq!(app.active_view(), ViewKind::Start);
    }

    #[test]
    fn exit_transition_quits() {
        let (mut app, _log) = app_with(vec![], false);
        app.apply(Transition::Exit, Instant::now()).expect("apply");
        assert_eq!(app.state(), LoopState::Quitting);
    }

    #[test]
    fn shutdown_blanks_the_display() {
        let (mut app, log) = app_with(vec![], false);
        app.shutdown().expect("shutdown");
        assert_eq!(log.last(), Some(Scene::Blank));
    }
}
