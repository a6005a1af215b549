use std::time::{Duration, Instant};

use clap::Parser;

use asteroidscanner::asc_app::{App, AppContext, LoopState};
use asteroidscanner::asc_assets::Language;
use asteroidscanner::asc_cli::Cli;
use asteroidscanner::asc_config::Config;
use asteroidscanner::asc_input::{EventManager, GameEvent, ScriptedInput};
use asteroidscanner::asc_render::{HeadlessRenderer, SceneLog};
use asteroidscanner::asc_view::{Scene, ViewKind};

fn start(language: Language, frames: Vec<Vec<GameEvent>>) -> (App, SceneLog) {
    let ctx = AppContext::new(language, 20, false, Config::default(), Some(3)).expect("context");
    let renderer = HeadlessRenderer::new();
    let log = renderer.log();
    let events = EventManager::new().with_source(Box::new(ScriptedInput::new(frames)));
    (App::new(ctx, events, Box::new(renderer)).expect("app"), log)
}

fn headline(log: &SceneLog) -> String {
    match log.last() {
        Some(Scene::Banner(banner)) => banner.headline,
        other => panic!("banner expected, got {other:?}"),
    }
}

#[test]
fn english_start_screen() {
    let (mut app, log) = start(Language::En, vec![]);
    app.tick(Instant::now()).expect("tick");
    assert_eq!(app.active_view(), ViewKind::Start);
    assert_eq!(headline(&log), "Critical System Error");
}

#[test]
fn german_start_screen() {
    let (mut app, log) = start(Language::De, vec![]);
    app.tick(Instant::now()).expect("tick");
    assert_eq!(app.active_view(), ViewKind::Start);
    assert_eq!(headline(&log), "Kritischer Systemfehler");
}

#[test]
fn enter_starts_a_game_and_quit_ends_the_loop() {
    let (mut app, log) = start(Language::En, vec![vec![], vec![GameEvent::Enter], vec![], vec![GameEvent::Quit]]);
    let t0 = Instant::now();
    let frame = Duration::from_millis(16);

    assert_eq!(app.tick(t0).expect("tick"), LoopState::Running);
    assert_eq!(app.tick(t0 + frame).expect("tick"), LoopState::Running);
    assert_eq!(app.active_view(), ViewKind::Game);
    assert!(matches!(log.last(), Some(Scene::Board(_))));

    assert_eq!(app.tick(t0 + frame * 2).expect("tick"), LoopState::Running);
    let drawn = log.len();
    assert_eq!(app.tick(t0 + frame * 3).expect("tick"), LoopState::Quitting);
    assert_eq!(log.len(), drawn);

    app.shutdown().expect("shutdown");
    let scenes = log.scenes();
    assert!(matches!(scenes.first(), Some(Scene::Banner(_))));
    assert!(scenes[1..scenes.len() - 1].iter().all(|s| matches!(s, Scene::Board(_))));
    assert_eq!(scenes.last(), Some(&Scene::Blank));
}

#[test]
fn invalid_mine_counts_are_rejected() {
    for args in [
        ["asteroidscanner", "EN", "9"],
        ["asteroidscanner", "EN", "lots"],
        ["asteroidscanner", "XX", "10"],
    ] {
        assert!(Cli::try_parse_from(args).is_err(), "{args:?}");
    }
    let cli = Cli::try_parse_from(["asteroidscanner", "de", "500"]).expect("parses");
    assert!(AppContext::new(cli.language, cli.mine_count, cli.debug_enabled(), Config::default(), None).is_err());
}
