// Game asset management
// Images and fonts are bundled in the binary, localized strings come from
// per-language TOML bundles that can be overridden from an asset directory

use clap::ValueEnum;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::asc_color::Tint;
use crate::asc_error::AssetError;

// Font sizes in framebuffer pixels
pub const FONT_REGULAR: u32 = 24;
pub const FONT_SUBTEXT: u32 = 40;
pub const FONT_TITLE: u32 = 128;

/// Supported UI languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Language {
    #[value(name = "EN")]
    En,
    #[value(name = "DE")]
    De,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::De => "DE",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Language::En => "en.toml",
            Language::De => "de.toml",
        }
    }

    fn bundled(self) -> &'static str {
        match self {
            Language::En => include_str!("../assets/lang/en.toml"),
            Language::De => include_str!("../assets/lang/de.toml"),
        }
    }
}

/// Every string key the views look up
pub const REQUIRED_STRINGS: &[&str] = &[
    "title",
    "revealed",
    "mission_success",
    "trajectory_restored",
    "critical_error",
    "enter_prompt",
    "seconds",
    "until_reset",
    "hud_attempt",
    "hud_safe_moves",
    "hud_mines",
    "hud_speed",
];

/// Pixel data of a bundled image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitmap {
    /// 16x16 one-bit mask, bit 15 is the leftmost pixel
    Mask(&'static [u16; 16]),
    /// Procedural star field filling the whole screen
    Starfield,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Image {
    pub key: &'static str,
    pub glyph: &'static str, // Terminal glyph
    pub ascii: &'static str, // ASCII fallback glyph
    pub tint: Tint,
    pub bitmap: Bitmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Font {
    pub key: &'static str,
    pub size: u32,
    pub bold: bool,
}

static ASTEROID: [u16; 16] = [
    0b0000011111000000,
    0b0001111111110000,
    0b0011111011111000,
    0b0111111111111100,
    0b0111011111101110,
    0b1111111111111110,
    0b1111111111111111,
    0b1111101111111111,
    0b1111111111110111,
    0b0111111111111111,
    0b0111111111111110,
    0b0011110111111100,
    0b0001111111111000,
    0b0000111111110000,
    0b0000001111000000,
    0b0000000000000000,
];

static CROSSHAIR: [u16; 16] = [
    0b0000000110000000,
    0b0000000110000000,
    0b0000011111100000,
    0b0001100110011000,
    0b0010000110000100,
    0b0010000000000100,
    0b0100000000000010,
    0b1111100000011111,
    0b1111100000011111,
    0b0100000000000010,
    0b0010000000000100,
    0b0010000110000100,
    0b0001100110011000,
    0b0000011111100000,
    0b0000000110000000,
    0b0000000110000000,
];

fn bundled_images() -> [Image; 3] {
    [
        Image {
            key: "crosshair",
            glyph: "⊕",
            ascii: "F",
            tint: Tint::Red,
            bitmap: Bitmap::Mask(&CROSSHAIR),
        },
        Image {
            key: "asteroid",
            glyph: "☼",
            ascii: "*",
            tint: Tint::White,
            bitmap: Bitmap::Mask(&ASTEROID),
        },
        Image {
            key: "background",
            glyph: " ",
            ascii: " ",
            tint: Tint::White,
            bitmap: Bitmap::Starfield,
        },
    ]
}

// Font faces by key; the flag marks bold faces
const FONT_FACES: [(&str, bool); 3] = [("regular", false), ("subtext", false), ("title", true)];

/// Read-only store of images, fonts and the strings of one language
#[derive(Debug, Clone)]
pub struct AssetManager {
    language: Language,
    images: HashMap<&'static str, Image>,
    fonts: HashMap<&'static str, bool>,
    strings: HashMap<String, String>,
}

impl AssetManager {
    /// Load every asset for `language`, failing on the first missing piece
    /// Strings are read from `<asset_dir>/lang/<code>.toml` when an asset directory is set
    pub fn load(language: Language, asset_dir: Option<&Path>) -> Result<Self, AssetError> {
        let strings = match asset_dir {
            Some(dir) => {
                let path = dir.join("lang").join(language.file_name());
                let text = fs::read_to_string(&path).map_err(|source| AssetError::Io {
                    path: path.clone(),
                    source,
                })?;
                parse_bundle(language, &text, path)?
            }
            None => parse_bundle(language, language.bundled(), PathBuf::from(language.file_name()))?,
        };
        info!(language = language.code(), strings = strings.len(), "assets loaded");

        Ok(AssetManager {
            language,
            images: bundled_images().into_iter().map(|img| (img.key, img)).collect(),
            fonts: FONT_FACES.into_iter().collect(),
            strings,
        })
    }

    pub fn get_image(&self, key: &str) -> Result<Image, AssetError> {
        self.images
            .get(key)
            .copied()
            .ok_or_else(|| AssetError::not_found("image", key))
    }

    pub fn get_font(&self, key: &str, size: u32) -> Result<Font, AssetError> {
        self.fonts
            .get_key_value(key)
            .map(|(&key, &bold)| Font { key, size, bold })
            .ok_or_else(|| AssetError::not_found("font", key))
    }

    pub fn get_string(&self, key: &str, language: Language) -> Result<&str, AssetError> {
        if language != self.language {
            return Err(AssetError::not_found("string", format!("{}:{}", language.code(), key)));
        }
        self.strings
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| AssetError::not_found("string", key))
    }

    /// String in the loaded language
    pub fn text(&self, key: &str) -> Result<&str, AssetError> {
        self.get_string(key, self.language)
    }
}

fn parse_bundle(language: Language, text: &str, path: PathBuf) -> Result<HashMap<String, String>, AssetError> {
    let strings: HashMap<String, String> =
        toml::from_str(text).map_err(|source| AssetError::Parse { path, source })?;
    if let Some(key) = REQUIRED_STRINGS.iter().copied().find(|k| !strings.contains_key(*k)) {
        return Err(AssetError::MissingKey {
            code: language.code(),
            key,
        });
    }
    Ok(strings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_languages_are_complete() {
        for lang in [Language::En, Language::De] {
            let assets = AssetManager::load(lang, None).expect("bundle loads");
            for key in REQUIRED_STRINGS {
                assert!(!assets.text(key).expect("key present").is_empty());
            }
        }
    }

    #[test]
    fn strings_follow_language() {
        let en = AssetManager::load(Language::En, None).expect("en");
        let de = AssetManager::load(Language::De, None).expect("de");
        assert_eq!(en.get_string("mission_success", Language::En).unwrap(), "Mission Success.");
        assert_eq!(de.get_string("mission_success", Language::De).unwrap(), "Mission Erfolgreich.");
        assert!(de.text("enter_prompt").unwrap().starts_with("Drücken"));
    }

    #[test]
    fn string_of_unloaded_language_is_not_found() {
        let en = AssetManager::load(Language::En, None).expect("en");
        assert!(matches!(
            en.get_string("revealed", Language::De),
            Err(AssetError::NotFound { kind: "string", .. })
        ));
    }

    #[test]
    fn unknown_keys_are_not_found() {
        let assets = AssetManager::load(Language::En, None).expect("en");
        assert!(matches!(assets.text("nope"), Err(AssetError::NotFound { .. })));
        assert!(matches!(assets.get_image("rocket"), Err(AssetError::NotFound { kind: "image", .. })));
        assert!(matches!(assets.get_font("comic", 12), Err(AssetError::NotFound { kind: "font", .. })));
    }

    #[test]
    fn fonts_and_images_resolve() {
        let assets = AssetManager::load(Language::En, None).expect("en");
        let title = assets.get_font("title", FONT_TITLE).expect("title font");
        assert!(title.bold);
        assert_eq!(title.size, 128);
        assert!(!assets.get_font("regular", FONT_REGULAR).unwrap().bold);
        assert_eq!(assets.get_image("asteroid").unwrap().ascii, "*");
        assert_eq!(assets.get_image("background").unwrap().bitmap, Bitmap::Starfield);
    }

    #[test]
    fn missing_override_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            AssetManager::load(Language::De, Some(dir.path())),
            Err(AssetError::Io { .. })
        ));
    }

    #[test]
    fn override_missing_a_key_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lang")).unwrap();
        fs::write(dir.path().join("lang").join("en.toml"), "title = \"X\"\n").unwrap();
        assert!(matches!(
            AssetManager::load(Language::En, Some(dir.path())),
            Err(AssetError::MissingKey { code: "EN", key: "revealed" })
        ));
    }

    #[test]
    fn override_replaces_bundled_strings() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lang")).unwrap();
        let mut text = Language::En.bundled().replace("Mission Success.", "All clear.");
        text.push_str("extra = \"kept\"\n");
        fs::write(dir.path().join("lang").join("en.toml"), text).unwrap();
        let assets = AssetManager::load(Language::En, Some(dir.path())).expect("override loads");
        assert_eq!(assets.text("mission_success").unwrap(), "All clear.");
        assert_eq!(assets.text("extra").unwrap(), "kept");
    }
}
