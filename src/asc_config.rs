// User configuration management
// Holds screen, timing, input and platform settings, persisted as TOML

use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::asc_error::ConfigError;
use crate::asc_input::GameEvent;

const APP_NAME: &str = "asteroidscanner";

/// Which input/render backend pair to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlatformChoice {
    Auto,
    Pi,
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Pi,      // GPIO buttons + framebuffer
    Desktop, // Keyboard + terminal window
}

impl PlatformChoice {
    /// Resolve `Auto` by looking at the CPU architecture (ARM means Pi)
    pub fn resolve(self) -> Platform {
        match self {
            PlatformChoice::Pi => Platform::Pi,
            PlatformChoice::Desktop => Platform::Desktop,
            PlatformChoice::Auto => {
                if is_arm(env::consts::ARCH) {
                    Platform::Pi
                } else {
                    Platform::Desktop
                }
            }
        }
    }
}

fn is_arm(arch: &str) -> bool {
    arch.starts_with("arm") || arch == "aarch64"
}

/// BCM line offsets of the push buttons
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PinConfig {
    pub left: u32,
    pub up: u32,
    pub right: u32,
    pub down: u32,
    pub enter: u32,
    pub flag: u32,
    pub quit: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        PinConfig {
            left: 1,
            up: 12,
            right: 14,
            down: 16,
            enter: 19,
            flag: 7,
            quit: 15,
        }
    }
}

impl PinConfig {
    pub fn bindings(&self) -> [(u32, GameEvent); 7] {
        [
            (self.left, GameEvent::Left),
            (self.up, GameEvent::Up),
            (self.right, GameEvent::Right),
            (self.down, GameEvent::Down),
            (self.enter, GameEvent::Enter),
            (self.flag, GameEvent::Flag),
            (self.quit, GameEvent::Quit),
        ]
    }
}

/// Default keyboard bindings (key name -> event)
pub fn default_keys() -> BTreeMap<String, GameEvent> {
    [
        ("Up", GameEvent::Up),
        ("w", GameEvent::Up),
        ("Down", GameEvent::Down),
        ("s", GameEvent::Down),
        ("Left", GameEvent::Left),
        ("a", GameEvent::Left),
        ("Right", GameEvent::Right),
        ("d", GameEvent::Right),
        ("Enter", GameEvent::Enter),
        ("e", GameEvent::Enter),
        ("f", GameEvent::Flag),
        ("x", GameEvent::Flag),
        ("Esc", GameEvent::Quit),
        ("k", GameEvent::Quit),
    ]
    .into_iter()
    .map(|(k, e)| (k.to_string(), e))
    .collect()
}

/// User configuration
/// Persisted to disk as TOML; missing fields fall back to defaults
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    // Minefield size in cells
    pub field_width: usize,
    pub field_height: usize,

    // Framebuffer geometry (used when the device does not report its own)
    pub screen_width: u32,
    pub screen_height: u32,
    pub cell_size: u32,

    // Timing
    pub fps: u32,
    pub game_over_reset_delay_ms: u64, // Delay between a mine hit and the fail screen
    pub fail_view_timer_secs: u64,     // Countdown on the fail screen
    pub max_generation_attempts: usize,
    pub quit_after_win: bool, // ENTER on the win screen ends the program

    // Platform selection and devices
    pub platform: PlatformChoice,
    pub framebuffer: PathBuf,
    pub gpio_chip: PathBuf,
    pub gpio_debounce_ms: u64,

    // Presentation
    pub ascii_icons: bool, // Use ASCII fallback glyphs in the terminal
    pub asset_dir: Option<PathBuf>,

    pub pins: PinConfig,
    pub keys: BTreeMap<String, GameEvent>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            field_width: 14,
            field_height: 8,
            screen_width: 1920,
            screen_height: 1080,
            cell_size: 70,
            fps: 60,
            game_over_reset_delay_ms: 3000,
            fail_view_timer_secs: 60,
            max_generation_attempts: 100_000,
            quit_after_win: false,
            platform: PlatformChoice::Auto,
            framebuffer: PathBuf::from("/dev/fb0"),
            gpio_chip: PathBuf::from("/dev/gpiochip0"),
            gpio_debounce_ms: 20,
            ascii_icons: false,
            asset_dir: None,
            pins: PinConfig::default(),
            keys: default_keys(),
        }
    }
}

impl Config {
    pub fn field_cells(&self) -> usize {
        self.field_width * self.field_height
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.fps.max(1) as u64)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.game_over_reset_delay_ms)
    }

    pub fn fail_timer(&self) -> Duration {
        Duration::from_secs(self.fail_view_timer_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.gpio_debounce_ms)
    }
}

/// Get the configuration file path
/// Uses platform-specific config directory (e.g., ~/.config/asteroidscanner/asteroidscanner.toml on Linux)
/// Falls back to current directory if ProjectDirs is unavailable
pub fn config_path() -> Option<PathBuf> {
    if let Some(proj) = ProjectDirs::from("com", "xhbl", APP_NAME) {
        let mut path = proj.config_dir().to_path_buf();
        path.push(format!("{}.toml", APP_NAME));
        return Some(path);
    }
    let mut path = env::current_dir().ok()?;
    path.push(format!("{}.toml", APP_NAME));
    Some(path)
}

/// Directory for log files, next to the other per-user data
pub fn log_dir() -> PathBuf {
    ProjectDirs::from("com", "xhbl", APP_NAME)
        .map(|proj| proj.data_local_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Read a configuration file; errors are reported to the caller
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<Config>(&s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from `path`, or create it with defaults if not found
/// A broken file is reported and replaced by defaults for this run only
pub fn load_or_create_at(path: &Path) -> Config {
    if path.exists() {
        match read_config(path) {
            Ok(cfg) => return cfg,
            Err(err) => {
                warn!("{err}; using defaults");
                return Config::default();
            }
        }
    }
    let cfg = Config::default();
    if let Ok(s) = toml::to_string(&cfg) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match fs::write(path, s) {
            Ok(()) => info!("created default config at {}", path.display()),
            Err(err) => warn!("could not write {}: {err}", path.display()),
        }
    }
    cfg
}

/// Load the explicit config file if given, otherwise the per-user one
pub fn load_or_create_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => read_config(path),
        None => Ok(config_path()
            .map(|path| load_or_create_at(&path))
            .unwrap_or_default()),
    }
}
