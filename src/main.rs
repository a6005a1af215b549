// Entry point for the asteroid scanner
// Parses arguments, loads configuration, picks the platform backends and runs the main loop

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, IsTerminal};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use asteroidscanner::asc_app::{App, AppContext};
use asteroidscanner::asc_cli::Cli;
use asteroidscanner::asc_config::{Platform, load_or_create_config, log_dir};
use asteroidscanner::asc_framebuffer::FramebufferRenderer;
use asteroidscanner::asc_input::{EventManager, GpioInput, InputSource, KeyMap, KeyboardInput, NullInput};
use asteroidscanner::asc_render::{Renderer, TerminalRenderer};

fn main() -> Result<()> {
    // Argument errors are reported by clap before anything else starts
    let cli = Cli::parse();
    let _guard = setup_logging()?;

    let config = load_or_create_config(cli.config.as_deref())?;
    let platform = cli.platform.unwrap_or(config.platform).resolve();
    let ctx = AppContext::new(cli.language, cli.mine_count, cli.debug_enabled(), config, cli.seed)?;
    info!(?platform, "starting");

    let (events, renderer) = backends(platform, &ctx)?;
    let mut app = App::new(ctx, events, renderer)?;
    let result = app.run();
    if let Err(err) = &result {
        error!("{err:#}");
    }
    result
}

/// Log to a file; stdout belongs to the UI
fn setup_logging() -> Result<WorkerGuard> {
    let dir = log_dir();
    fs::create_dir_all(&dir).with_context(|| format!("creating log directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&dir, "asteroidscanner.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    info!("Log file: {}/asteroidscanner.log", dir.display());
    Ok(guard)
}

fn backends(platform: Platform, ctx: &AppContext) -> Result<(EventManager, Box<dyn Renderer>)> {
    let keys = KeyMap::from_config(&ctx.config.keys)?;
    match platform {
        Platform::Desktop => {
            let renderer = TerminalRenderer::new(&ctx.assets, ctx.config.ascii_icons)?;
            let keyboard = KeyboardInput::new(keys)?;
            Ok((EventManager::new().with_source(Box::new(keyboard)), Box::new(renderer)))
        }
        Platform::Pi => {
            let renderer = FramebufferRenderer::open(&ctx.config, &ctx.assets)?;
            let config = &ctx.config;
            let buttons: Box<dyn InputSource> = match GpioInput::open(&config.gpio_chip, &config.pins, config.debounce()) {
                Ok(gpio) => Box::new(gpio),
                Err(err) => {
                    warn!("GPIO unavailable, buttons disabled: {err:#}");
                    Box::new(NullInput)
                }
            };
            let mut events = EventManager::new().with_source(buttons);
            // A console keyboard keeps working next to the buttons
            if io::stdin().is_terminal() {
                match KeyboardInput::new(keys) {
                    Ok(keyboard) => events = events.with_source(Box::new(keyboard)),
                    Err(err) => warn!("keyboard unavailable: {err:#}"),
                }
            }
            Ok((events, Box::new(renderer)))
        }
    }
}
