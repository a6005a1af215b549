//! Input processing.
//!
//! Every physical source (keyboard, GPIO buttons) is an [`InputSource`] that
//! turns raw input into [`GameEvent`]s. The [`EventManager`] polls all sources
//! once per frame so the views never see where an event came from.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::asc_error::ConfigError;

/// Semantic input signal, independent of its physical source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameEvent {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Flag,
    Quit,
}

/// A pollable source of game events
pub trait InputSource {
    fn name(&self) -> &'static str;

    /// Drain pending input without blocking
    fn poll(&mut self, now: Instant) -> Result<Vec<GameEvent>>;
}

/// Polls every registered source once per frame
#[derive(Default)]
pub struct EventManager {
    sources: Vec<Box<dyn InputSource>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Box<dyn InputSource>) -> Self {
        debug!(source = source.name(), "input source registered");
        self.sources.push(source);
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn poll(&mut self, now: Instant) -> Result<Vec<GameEvent>> {
        let mut events = Vec::new();
        for source in self.sources.iter_mut() {
            let batch = source.poll(now)?;
            if !batch.is_empty() {
                trace!(source = source.name(), ?batch, "input");
            }
            events.extend(batch);
        }
        Ok(events)
    }
}

/// Parse a key name from the config file ("Up", "Enter", "Esc", "F5", "w", ...)
pub fn parse_key(name: &str) -> Option<KeyCode> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(KeyCode::Char(c.to_ascii_lowercase()));
    }
    let lower = name.to_ascii_lowercase();
    let code = match lower.as_str() {
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "space" => KeyCode::Char(' '),
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        f if f.starts_with('f') => KeyCode::F(f[1..].parse().ok()?),
        _ => return None,
    };
    Some(code)
}

/// Translates key presses into game events using the configured bindings
#[derive(Debug, Clone)]
pub struct KeyMap {
    map: HashMap<KeyCode, GameEvent>,
}

impl KeyMap {
    pub fn from_config(keys: &BTreeMap<String, GameEvent>) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        for (name, event) in keys {
            let code = parse_key(name).ok_or_else(|| ConfigError::UnknownKey(name.clone()))?;
            map.insert(code, *event);
        }
        Ok(KeyMap { map })
    }

    /// Map a key event; only presses count so one keystroke is one event
    pub fn map_key(&self, key: KeyEvent) -> Option<GameEvent> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        // Raw mode swallows SIGINT, keep Ctrl+C as a way out
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(GameEvent::Quit);
        }
        let code = match key.code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };
        self.map.get(&code).copied()
    }
}

/// Keyboard input from the controlling terminal
/// Raw mode is held for the lifetime of the source
pub struct KeyboardInput {
    keys: KeyMap,
}

impl KeyboardInput {
    pub fn new(keys: KeyMap) -> Result<Self> {
        enable_raw_mode()?;
        Ok(KeyboardInput { keys })
    }
}

impl Drop for KeyboardInput {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

impl InputSource for KeyboardInput {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn poll(&mut self, _now: Instant) -> Result<Vec<GameEvent>> {
        let mut events = Vec::new();
        while event::poll(Duration::ZERO)? {
            // Resize, mouse and focus events are handled by the renderer or ignored
            if let Event::Key(key) = event::read()? {
                if let Some(ev) = self.keys.map_key(key) {
                    events.push(ev);
                }
            }
        }
        Ok(events)
    }
}

/// Edge detector for a single push button
/// Fires once on the low-to-high edge, ignoring edges closer than `interval`
#[derive(Debug, Clone)]
pub struct Debouncer {
    interval: Duration,
    high: bool,
    last_press: Option<Instant>,
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Debouncer {
            interval,
            high: false,
            last_press: None,
        }
    }

    /// Feed the current pin level; returns true when a press should be reported
    pub fn update(&mut self, is_high: bool, now: Instant) -> bool {
        let rising = is_high && !self.high;
        self.high = is_high;
        if !rising {
            return false;
        }
        if let Some(t0) = self.last_press {
            if now.saturating_duration_since(t0) < self.interval {
                return false;
            }
        }
        self.last_press = Some(now);
        true
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use super::*;
    use crate::asc_config::PinConfig;
    use anyhow::Context;
    use linux_embedded_hal::gpio_cdev::{Chip, LineHandle, LineRequestFlags};
    use std::path::Path;

    struct Button {
        event: GameEvent,
        handle: LineHandle,
        debounce: Debouncer,
    }

    /// Push buttons wired to GPIO lines (active-high)
    /// Pull-downs are expected to be configured in /boot/config.txt
    pub struct GpioInput {
        buttons: Vec<Button>,
    }

    impl GpioInput {
        pub fn open(chip_path: &Path, pins: &PinConfig, debounce: Duration) -> Result<Self> {
            let mut chip = Chip::new(chip_path)
                .with_context(|| format!("opening GPIO chip {}", chip_path.display()))?;
            let mut buttons = Vec::new();
            for (pin, event) in pins.bindings() {
                let line = chip
                    .get_line(pin)
                    .with_context(|| format!("requesting GPIO line {}", pin))?;
                let handle = line
                    .request(LineRequestFlags::INPUT, 0, "asteroidscanner")
                    .with_context(|| format!("configuring GPIO line {}", pin))?;
                buttons.push(Button {
                    event,
                    handle,
                    debounce: Debouncer::new(debounce),
                });
            }
            Ok(GpioInput { buttons })
        }
    }

    impl InputSource for GpioInput {
        fn name(&self) -> &'static str {
            "gpio"
        }

        fn poll(&mut self, now: Instant) -> Result<Vec<GameEvent>> {
            let mut events = Vec::new();
            for btn in self.buttons.iter_mut() {
                let is_high = btn.handle.get_value()? != 0;
                if btn.debounce.update(is_high, now) {
                    events.push(btn.event);
                }
            }
            Ok(events)
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use super::*;
    use crate::asc_config::PinConfig;
    use std::path::Path;

    pub struct GpioInput;

    impl GpioInput {
        pub fn open(_: &Path, _: &PinConfig, _: Duration) -> Result<Self> {
            anyhow::bail!("GPIO buttons are only supported on Linux")
        }
    }

    impl InputSource for GpioInput {
        fn name(&self) -> &'static str {
            "gpio"
        }

        fn poll(&mut self, _now: Instant) -> Result<Vec<GameEvent>> {
            Ok(Vec::new())
        }
    }
}

pub use platform::GpioInput;

/// Stand-in for hardware that is not present; never reports input
#[derive(Debug, Default)]
pub struct NullInput;

impl InputSource for NullInput {
    fn name(&self) -> &'static str {
        "null"
    }

    fn poll(&mut self, _now: Instant) -> Result<Vec<GameEvent>> {
        Ok(Vec::new())
    }
}

/// Replays prepared frames of events, one frame per poll
#[derive(Debug, Default)]
pub struct ScriptedInput {
    frames: VecDeque<Vec<GameEvent>>,
}

impl ScriptedInput {
    pub fn new<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<GameEvent>>,
    {
        ScriptedInput {
            frames: frames.into_iter().collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn poll(&mut self, _now: Instant) -> Result<Vec<GameEvent>> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asc_config::default_keys;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::empty(),
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn default_map() -> KeyMap {
        KeyMap::from_config(&default_keys()).expect("default keys parse")
    }

    #[test]
    fn maps_default_bindings() {
        let keys = default_map();
        assert_eq!(keys.map_key(key(KeyCode::Up)), Some(GameEvent::Up));
        assert_eq!(keys.map_key(key(KeyCode::Char('w'))), Some(GameEvent::Up));
        assert_eq!(keys.map_key(key(KeyCode::Char('S'))), Some(GameEvent::Down));
        assert_eq!(keys.map_key(key(KeyCode::Left)), Some(GameEvent::Left));
        assert_eq!(keys.map_key(key(KeyCode::Char('d'))), Some(GameEvent::Right));
        assert_eq!(keys.map_key(key(KeyCode::Enter)), Some(GameEvent::Enter));
        assert_eq!(keys.map_key(key(KeyCode::Char('e'))), Some(GameEvent::Enter));
        assert_eq!(keys.map_key(key(KeyCode::Char('x'))), Some(GameEvent::Flag));
        assert_eq!(keys.map_key(key(KeyCode::Esc)), Some(GameEvent::Quit));
        assert_eq!(keys.map_key(key(KeyCode::Char('k'))), Some(GameEvent::Quit));
    }

    #[test]
    fn ignores_unknown_keys() {
        let keys = default_map();
        assert_eq!(keys.map_key(key(KeyCode::Char('z'))), None);
        assert_eq!(keys.map_key(key(KeyCode::F(3))), None);
    }

    #[test]
    fn release_and_repeat_do_not_produce_events() {
        let keys = default_map();
        let mut release = key(KeyCode::Enter);
        release.kind = KeyEventKind::Release;
        let mut repeat = key(KeyCode::Enter);
        repeat.kind = KeyEventKind::Repeat;
        assert_eq!(keys.map_key(release), None);
        assert_eq!(keys.map_key(repeat), None);
    }

    #[test]
    fn ctrl_c_always_quits() {
        let keys = KeyMap::from_config(&BTreeMap::new()).expect("empty map");
        let mut ctrl_c = key(KeyCode::Char('c'));
        ctrl_c.modifiers = KeyModifiers::CONTROL;
        assert_eq!(keys.map_key(ctrl_c), Some(GameEvent::Quit));
        assert_eq!(keys.map_key(key(KeyCode::Char('c'))), None);
    }

    #[test]
    fn parses_key_names() {
        assert_eq!(parse_key("Space"), Some(KeyCode::Char(' ')));
        assert_eq!(parse_key("escape"), Some(KeyCode::Esc));
        assert_eq!(parse_key("F5"), Some(KeyCode::F(5)));
        assert_eq!(parse_key("f"), Some(KeyCode::Char('f')));
        assert_eq!(parse_key("Q"), Some(KeyCode::Char('q')));
        assert_eq!(parse_key("Fx"), None);
        assert_eq!(parse_key("PageSideways"), None);
    }

    #[test]
    fn unknown_key_name_is_rejected() {
        let mut keys = default_keys();
        keys.insert("Hyper".to_string(), GameEvent::Flag);
        assert!(matches!(
            KeyMap::from_config(&keys),
            Err(ConfigError::UnknownKey(name)) if name == "Hyper"
        ));
    }

    #[test]
    fn held_button_fires_once() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(20));
        assert!(d.update(true, t0));
        for i in 1..10 {
            assert!(!d.update(true, t0 + Duration::from_millis(i * 16)));
        }
        assert!(!d.update(false, t0 + Duration::from_millis(200)));
        assert!(d.update(true, t0 + Duration::from_millis(216)));
    }

    #[test]
    fn bounce_inside_interval_is_ignored() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(50));
        assert!(d.update(true, t0));
        assert!(!d.update(false, t0 + Duration::from_millis(5)));
        assert!(!d.update(true, t0 + Duration::from_millis(10)));
        // Still held after the bounce: no second press
        assert!(!d.update(true, t0 + Duration::from_millis(80)));
    }

    #[test]
    fn null_input_reports_nothing() {
        let mut input = NullInput;
        assert!(input.poll(Instant::now()).expect("poll").is_empty());
    }

    #[test]
    fn event_manager_merges_sources_in_order() {
        let mut manager = EventManager::new()
            .with_source(Box::new(ScriptedInput::new([vec![GameEvent::Up]])))
            .with_source(Box::new(NullInput))
            .with_source(Box::new(ScriptedInput::new([vec![GameEvent::Flag, GameEvent::Enter]])));
        assert_eq!(manager.source_names(), vec!["scripted", "null", "scripted"]);
        let now = Instant::now();
        assert_eq!(
            manager.poll(now).expect("poll"),
            vec![GameEvent::Up, GameEvent::Flag, GameEvent::Enter]
        );
        assert!(manager.poll(now).expect("poll").is_empty());
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn gpio_is_unavailable_off_linux() {
        use crate::asc_config::PinConfig;
        let res = GpioInput::open(std::path::Path::new("/dev/gpiochip0"), &PinConfig::default(), Duration::ZERO);
        assert!(res.is_err());
    }
}
