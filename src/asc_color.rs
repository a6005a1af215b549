use embedded_graphics::pixelcolor::{Rgb565, Rgb888};
use ratatui::style::Color;
use term_color_support::ColorSupport;

/// Named colors of the scanner theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    Black,
    White,
    Red,
    Blue,
    DarkBlue,
    DarkRed,
    CellRevealed,
    CellOutline,
    SafeOverlay,
    MineOverlay,
    FlashGreen,
    FlashRed,
}

impl Tint {
    /// Exact RGB value used on the framebuffer and true-color terminals
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Tint::Black => (0, 0, 0),
            Tint::White => (255, 255, 255),
            Tint::Red => (255, 0, 0),
            Tint::Blue => (0, 0, 255),
            Tint::DarkBlue => (20, 35, 60),
            Tint::DarkRed => (60, 25, 10),
            Tint::CellRevealed => (10, 15, 30),
            Tint::CellOutline => (0, 65, 255),
            Tint::SafeOverlay => (0, 200, 0),
            Tint::MineOverlay => (200, 0, 0),
            Tint::FlashGreen => (0, 255, 0),
            Tint::FlashRed => (255, 0, 0),
        }
    }

    /// Blend strength when drawn over other content (255 = opaque)
    pub fn alpha(self) -> u8 {
        match self {
            Tint::SafeOverlay => 70,
            Tint::MineOverlay => 90,
            Tint::FlashGreen | Tint::FlashRed => 110,
            _ => 255,
        }
    }

    /// Nearest of the 16 basic ANSI colors
    fn ansi(self) -> Color {
        match self {
            Tint::Black => Color::Black,
            Tint::White => Color::White,
            Tint::Red | Tint::FlashRed => Color::LightRed,
            Tint::Blue | Tint::CellOutline => Color::LightBlue,
            Tint::DarkBlue | Tint::CellRevealed => Color::Blue,
            Tint::DarkRed | Tint::MineOverlay => Color::Red,
            Tint::SafeOverlay => Color::Green,
            Tint::FlashGreen => Color::LightGreen,
        }
    }

    pub fn rgb565(self) -> Rgb565 {
        let (r, g, b) = self.rgb();
        Rgb565::from(Rgb888::new(r, g, b))
    }
}

/// Color capabilities of the terminal, detected once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorDepth {
    pub has_16m: bool,
    pub has_256: bool,
}

impl ColorDepth {
    pub fn detect() -> Self {
        let support = ColorSupport::stdout();
        ColorDepth {
            has_16m: support.has_16m,
            has_256: support.has_256,
        }
    }
}

/// Map a tint to the best terminal color the current terminal can show
pub trait TermMatch {
    fn term(self, support: &ColorDepth) -> Color;
}

impl TermMatch for Tint {
    fn term(self, support: &ColorDepth) -> Color {
        let (r, g, b) = self.rgb();
        if support.has_16m {
            // 1. TrueColor support: Return the exact RGB value
            Color::Rgb(r, g, b)
        } else if support.has_256 {
            // 2. 256-color support: Return the nearest 6x6x6 cube index
            Color::Indexed(cube_index(r, g, b))
        } else {
            // 3. Basic 16-color support
            self.ansi()
        }
    }
}

/// Terminal color of a translucent `over` tint drawn on `base`
/// Basic 16-color terminals cannot blend and get the overlay's own color
pub fn overlay_term(base: Tint, over: Tint, support: &ColorDepth) -> Color {
    let (r, g, b) = blend(base.rgb(), over.rgb(), over.alpha());
    if support.has_16m {
        Color::Rgb(r, g, b)
    } else if support.has_256 {
        Color::Indexed(cube_index(r, g, b))
    } else {
        over.ansi()
    }
}

fn cube_index(r: u8, g: u8, b: u8) -> u8 {
    let level = |v: u8| ((v as u16 * 5 + 127) / 255) as u8;
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

/// Blend `over` onto `base` with the given alpha (0-255)
pub fn blend(base: (u8, u8, u8), over: (u8, u8, u8), alpha: u8) -> (u8, u8, u8) {
    let mix = |b: u8, o: u8| {
        let a = alpha as u16;
        ((o as u16 * a + b as u16 * (255 - a)) / 255) as u8
    };
    (mix(base.0, over.0), mix(base.1, over.1), mix(base.2, over.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_index_covers_corners() {
        assert_eq!(cube_index(0, 0, 0), 16);
        assert_eq!(cube_index(255, 255, 255), 231);
        assert_eq!(cube_index(255, 0, 0), 196);
    }

    #[test]
    fn blend_respects_alpha_extremes() {
        assert_eq!(blend((10, 20, 30), (200, 200, 200), 0), (10, 20, 30));
        assert_eq!(blend((10, 20, 30), (200, 200, 200), 255), (200, 200, 200));
        let half = blend((0, 0, 0), (255, 255, 255), 128);
        assert!(half.0 > 120 && half.0 < 135);
    }

    #[test]
    fn overlays_are_translucent() {
        assert!(Tint::SafeOverlay.alpha() < 255);
        assert!(Tint::FlashRed.alpha() < 255);
        assert_eq!(Tint::DarkBlue.alpha(), 255);
    }

    #[test]
    fn terminal_colors_follow_color_depth() {
        let truecolor = ColorDepth { has_16m: true, has_256: true };
        let indexed = ColorDepth { has_16m: false, has_256: true };
        let basic = ColorDepth::default();
        assert_eq!(Tint::CellOutline.term(&truecolor), Color::Rgb(0, 65, 255));
        assert_eq!(Tint::Red.term(&indexed), Color::Indexed(196));
        assert_eq!(Tint::Red.term(&basic), Color::LightRed);

        assert_eq!(overlay_term(Tint::Black, Tint::SafeOverlay, &truecolor), Color::Rgb(0, 54, 0));
        assert_eq!(overlay_term(Tint::Black, Tint::SafeOverlay, &basic), Color::Green);
    }
}
