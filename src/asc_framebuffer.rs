// Linux framebuffer output
// Scenes are painted into an in-memory RGB565 canvas with embedded-graphics
// and copied to the framebuffer device once per frame

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::iso_8859_1::FONT_10X20;
use embedded_graphics::pixelcolor::raw::{RawData, RawU16};
use embedded_graphics::pixelcolor::{Rgb565, Rgb888};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::convert::Infallible;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::asc_assets::{AssetManager, Bitmap, Font, Image};
use crate::asc_color::{Tint, blend};
use crate::asc_config::Config;
use crate::asc_error::{GameError, Result};
use crate::asc_render::Renderer;
use crate::asc_view::{Banner, BoardScene, CellFace, Scene};

const GRID_BORDER: i32 = 30;
const BAR_HEIGHT: i32 = 40;
const BAR_PADDING: i32 = 10;
const BANNER_GAP: i32 = 100; // Headline to subline distance
const GLYPH_HEIGHT: u32 = 20; // Native height of the bitmap font
const STAR_COUNT: usize = 400;

/// In-memory RGB565 frame
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgb565>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Canvas {
            width,
            height,
            pixels: vec![Rgb565::BLACK; (width * height) as usize],
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb565> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Mix a translucent tint over everything inside `area`
    pub fn blend_rect(&mut self, area: &Rectangle, tint: Tint) {
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else {
            return;
        };
        for y in area.top_left.y..=bottom_right.y {
            for x in area.top_left.x..=bottom_right.x {
                if let Some(i) = self.index(x, y) {
                    let base = Rgb888::from(self.pixels[i]);
                    let (r, g, b) = blend((base.r(), base.g(), base.b()), tint.rgb(), tint.alpha());
                    self.pixels[i] = Rgb565::from(Rgb888::new(r, g, b));
                }
            }
        }
    }

    /// Serialize in the device pixel format (16 bpp RGB565 or 32 bpp XRGB8888, little-endian)
    /// Rows are padded with zeros up to `stride` bytes
    pub fn encode(&self, bpp: u32, stride: usize, out: &mut Vec<u8>) {
        out.clear();
        let row_bytes = self.width as usize * (bpp as usize / 8);
        let stride = stride.max(row_bytes);
        out.reserve(stride * self.height as usize);
        for row in self.pixels.chunks(self.width.max(1) as usize) {
            for &px in row {
                match bpp {
                    32 => {
                        let c = Rgb888::from(px);
                        out.extend_from_slice(&[c.b(), c.g(), c.r(), 0xff]);
                    }
                    _ => out.extend_from_slice(&RawU16::from(px).into_inner().to_le_bytes()),
                }
            }
            out.resize(out.len() + stride - row_bytes, 0);
        }
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, color) in pixels {
            if let Some(i) = self.index(p.x, p.y) {
                self.pixels[i] = color;
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> std::result::Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };
        let w = self.width as usize;
        for y in area.top_left.y..=bottom_right.y {
            let row = y as usize * w;
            self.pixels[row + area.top_left.x as usize..=row + bottom_right.x as usize].fill(color);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> std::result::Result<(), Self::Error> {
        self.pixels.fill(color);
        Ok(())
    }
}

/// Draws every pixel as a `scale` x `scale` block, offset by `origin`
struct Scaled<'a> {
    canvas: &'a mut Canvas,
    origin: Point,
    scale: u32,
}

impl OriginDimensions for Scaled<'_> {
    fn size(&self) -> Size {
        self.canvas.size() / self.scale.max(1)
    }
}

impl DrawTarget for Scaled<'_> {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let s = self.scale as i32;
        for Pixel(p, color) in pixels {
            let block = Rectangle::new(self.origin + p * s, Size::new_equal(self.scale));
            self.canvas.fill_solid(&block, color)?;
        }
        Ok(())
    }
}

/// Integer scale of the bitmap font closest to a point size
pub fn glyph_scale(size: u32) -> u32 {
    ((size + GLYPH_HEIGHT / 2) / GLYPH_HEIGHT).max(1)
}

fn draw_text(
    canvas: &mut Canvas,
    text: &str,
    font: Font,
    tint: Tint,
    at: Point,
    alignment: Alignment,
) -> std::result::Result<(), Infallible> {
    let style = MonoTextStyle::new(&FONT_10X20, tint.rgb565());
    let layout = TextStyleBuilder::new()
        .alignment(alignment)
        .baseline(Baseline::Middle)
        .build();
    let passes = if font.bold { 2 } else { 1 };
    for dx in 0..passes {
        let mut target = Scaled {
            canvas: &mut *canvas,
            origin: at + Point::new(dx, 0),
            scale: glyph_scale(font.size),
        };
        Text::with_text_style(text, Point::zero(), style, layout).draw(&mut target)?;
    }
    Ok(())
}

fn draw_mask(canvas: &mut Canvas, mask: &[u16; 16], center: Point, scale: u32, tint: Tint) -> std::result::Result<(), Infallible> {
    let s = scale as i32;
    let top_left = center - Point::new(8 * s, 8 * s);
    let color = tint.rgb565();
    for (row, bits) in mask.iter().enumerate() {
        for col in 0..16 {
            if bits & (0x8000 >> col) != 0 {
                let block = Rectangle::new(
                    top_left + Point::new(col * s, row as i32 * s),
                    Size::new_equal(scale),
                );
                canvas.fill_solid(&block, color)?;
            }
        }
    }
    Ok(())
}

/// Pixel positions of every board element for one screen size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    pub cell: u32,
    pub grid: Rectangle,
    pub border: Rectangle,
    pub bar: Rectangle,     // Outline-colored frame of the progress bar
    pub bar_width: u32,     // Width of a full fill
    pub label_center: Point,
    pub title_center: Point,
    pub hud_slot: u32,
}

impl BoardLayout {
    pub fn compute(screen: Size, cols: usize, rows: usize, cell: u32) -> Self {
        let (sw, sh) = (screen.width as i32, screen.height as i32);
        let grid_w = cell as i32 * cols as i32;
        let grid_h = cell as i32 * rows as i32;

        let grid = Rectangle::new(
            Point::new((sw - grid_w) / 2, (sh - grid_h) / 2),
            Size::new(grid_w as u32, grid_h as u32),
        );
        let border = Rectangle::new(
            Point::new((sw - grid_w - GRID_BORDER) / 2, (sh - grid_h - GRID_BORDER) / 2),
            Size::new((grid_w + GRID_BORDER) as u32, (grid_h + GRID_BORDER) as u32),
        );

        // Progress bar spans two thirds of the grid, a quarter of the free space above the bottom
        let bar_width = grid_w * 2 / 3;
        let bar_size = Size::new((bar_width + BAR_PADDING) as u32, (BAR_HEIGHT + BAR_PADDING) as u32);
        let bar_top = sh - (sh - grid_h) / 4 - 20;
        let bar = Rectangle::new(Point::new((sw - bar_size.width as i32) / 2, bar_top), bar_size);

        BoardLayout {
            cell,
            grid,
            border,
            bar,
            bar_width: bar_width.max(0) as u32,
            label_center: Point::new(sw / 2, bar_top - 15),
            title_center: Point::new(sw / 2, (sh - grid_h) / 4 - 10),
            hud_slot: (grid_w / 4).max(1) as u32,
        }
    }

    pub fn cell_rect(&self, (x, y): (usize, usize)) -> Rectangle {
        let c = self.cell as i32;
        Rectangle::new(
            self.grid.top_left + Point::new(x as i32 * c, y as i32 * c),
            Size::new_equal(self.cell),
        )
    }

    /// Sprite scale so a 16 px mask fills most of a cell
    pub fn sprite_scale(&self) -> u32 {
        (self.cell / 17).max(1)
    }
}

/// Read "<w>,<h>" from sysfs
pub fn parse_virtual_size(text: &str) -> Option<(u32, u32)> {
    let (w, h) = text.trim().split_once(',')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Visible drawing area for a device
/// The virtual size of a double-buffered device is larger than the screen, so
/// it only ever shrinks the configured size
pub fn visible_size(virtual_size: Option<(u32, u32)>, configured: (u32, u32)) -> Size {
    let (w, h) = match virtual_size {
        Some((vw, vh)) if vw > 0 && vh > 0 => (vw.min(configured.0), vh.min(configured.1)),
        _ => configured,
    };
    Size::new(w, h)
}

pub struct FramebufferRenderer<W: Write + Seek = File> {
    device: W,
    bpp: u32,
    stride: usize, // Bytes per device row
    canvas: Canvas,
    buffer: Vec<u8>,
    cell_size: u32,
    crosshair: Image,
    asteroid: Image,
    stars: Vec<(Point, u8)>,
}

impl FramebufferRenderer<File> {
    /// Open the configured framebuffer device
    /// Geometry and depth come from sysfs when available, else from the config
    pub fn open(config: &Config, assets: &AssetManager) -> Result<Self> {
        let path = &config.framebuffer;
        let device = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|err| GameError::Display(format!("cannot open {}: {err}", path.display())))?;

        let sysfs = path
            .file_name()
            .map(|name| Path::new("/sys/class/graphics").join(name));
        let read = |name: &str| {
            sysfs
                .as_ref()
                .and_then(|dir| fs::read_to_string(dir.join(name)).ok())
        };
        let virtual_size = read("virtual_size").and_then(|s| parse_virtual_size(&s));
        let size = visible_size(virtual_size, (config.screen_width, config.screen_height));
        let bpp = read("bits_per_pixel")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(16);
        let stride = read("stride").and_then(|s| s.trim().parse().ok()).unwrap_or(0);

        info!(
            device = %path.display(),
            width = size.width,
            height = size.height,
            ?virtual_size,
            bpp,
            stride,
            "framebuffer opened"
        );
        Ok(Self::with_device(device, size, bpp, config.cell_size, assets)?.with_stride(stride))
    }
}

impl<W: Write + Seek> FramebufferRenderer<W> {
    pub fn with_device(device: W, size: Size, bpp: u32, cell_size: u32, assets: &AssetManager) -> Result<Self> {
        if bpp != 16 && bpp != 32 {
            return Err(GameError::Display(format!("unsupported framebuffer depth {bpp}")));
        }
        let background = assets.get_image("background")?;
        let stars = match background.bitmap {
            Bitmap::Starfield => starfield(size),
            Bitmap::Mask(_) => Vec::new(),
        };
        Ok(FramebufferRenderer {
            device,
            bpp,
            stride: 0,
            canvas: Canvas::new(size.width, size.height),
            buffer: Vec::new(),
            cell_size,
            crosshair: assets.get_image("crosshair")?,
            asteroid: assets.get_image("asteroid")?,
            stars,
        })
    }

    /// Device row length in bytes; smaller values mean rows are packed
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn device(&self) -> &W {
        &self.device
    }

    fn paint(&mut self, scene: &Scene) -> std::result::Result<(), Infallible> {
        self.canvas.clear(Rgb565::BLACK)?;
        match scene {
            Scene::Blank => Ok(()),
            Scene::Banner(banner) => self.paint_banner(banner),
            Scene::Board(board) => self.paint_board(board),
        }
    }

    fn paint_banner(&mut self, banner: &Banner) -> std::result::Result<(), Infallible> {
        let size = self.canvas.size();
        let center = Point::new(size.width as i32 / 2, size.height as i32 / 2);
        draw_text(
            &mut self.canvas,
            &banner.headline,
            banner.headline_font,
            banner.headline_tint,
            center,
            Alignment::Center,
        )?;
        draw_text(
            &mut self.canvas,
            &banner.subline,
            banner.subline_font,
            Tint::White,
            center + Point::new(0, BANNER_GAP),
            Alignment::Center,
        )
    }

    fn paint_board(&mut self, board: &BoardScene) -> std::result::Result<(), Infallible> {
        let layout = BoardLayout::compute(self.canvas.size(), board.width, board.height, self.cell_size);

        for &(p, level) in &self.stars {
            Pixel(p, Rgb565::from(Rgb888::new(level, level, level))).draw(&mut self.canvas)?;
        }

        // Progress bar
        layout
            .bar
            .into_styled(PrimitiveStyle::with_fill(board.outline.rgb565()))
            .draw(&mut self.canvas)?;
        let fill = (layout.bar_width as f32 * board.progress.clamp(0.0, 1.0)) as u32;
        Rectangle::new(
            layout.bar.top_left + Point::new(BAR_PADDING / 2, BAR_PADDING / 2),
            Size::new(fill, BAR_HEIGHT as u32),
        )
        .into_styled(PrimitiveStyle::with_fill(Rgb565::WHITE))
        .draw(&mut self.canvas)?;

        // Grid
        layout
            .border
            .into_styled(PrimitiveStyle::with_fill(board.outline.rgb565()))
            .draw(&mut self.canvas)?;
        let scale = layout.sprite_scale();
        for y in 0..board.height {
            for x in 0..board.width {
                let rect = layout.cell_rect((x, y));
                let center = rect.center();
                self.canvas.fill_solid(&rect, board.background.rgb565())?;
                match board.face((x, y)) {
                    CellFace::Hidden => {}
                    CellFace::Flagged => {
                        if let Bitmap::Mask(mask) = self.crosshair.bitmap {
                            draw_mask(&mut self.canvas, mask, center, scale, self.crosshair.tint)?;
                        }
                    }
                    CellFace::Number(n) => {
                        draw_text(&mut self.canvas, &n.to_string(), board.label_font, Tint::White, center, Alignment::Center)?;
                    }
                    CellFace::Asteroid | CellFace::KnownMine => {
                        if let Bitmap::Mask(mask) = self.asteroid.bitmap {
                            draw_mask(&mut self.canvas, mask, center, scale, self.asteroid.tint)?;
                        }
                        if board.face((x, y)) == CellFace::KnownMine {
                            self.canvas.blend_rect(&rect, Tint::MineOverlay);
                        }
                    }
                    CellFace::KnownSafe => self.canvas.blend_rect(&rect, Tint::SafeOverlay),
                }
                let outline = if board.selected == (x, y) { Tint::Red } else { board.outline };
                rect.into_styled(PrimitiveStyle::with_stroke(outline.rgb565(), 1))
                    .draw(&mut self.canvas)?;
            }
        }
        if let Some(flash) = board.flash {
            self.canvas.blend_rect(&layout.grid, flash);
        }

        // Text
        draw_text(
            &mut self.canvas,
            &board.revealed_label,
            board.label_font,
            Tint::White,
            layout.label_center,
            Alignment::Center,
        )?;
        draw_text(
            &mut self.canvas,
            &board.percent_label,
            board.label_font,
            Tint::Black,
            layout.bar.center(),
            Alignment::Center,
        )?;
        if let Some(title) = &board.title {
            draw_text(&mut self.canvas, title, board.title_font, Tint::White, layout.title_center, Alignment::Center)?;
        }
        if let Some(hud) = &board.hud {
            for (i, text) in hud.iter().enumerate() {
                let at = Point::new(
                    layout.grid.top_left.x + i as i32 * layout.hud_slot as i32,
                    layout.title_center.y,
                );
                draw_text(&mut self.canvas, text, board.hud_font, Tint::White, at, Alignment::Left)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.canvas.encode(self.bpp, self.stride, &mut self.buffer);
        self.device.seek(SeekFrom::Start(0))?;
        self.device.write_all(&self.buffer)?;
        self.device.flush()
    }
}

impl<W: Write + Seek> Renderer for FramebufferRenderer<W> {
    fn draw(&mut self, scene: &Scene) -> Result<()> {
        self.paint(scene).unwrap_or_else(|never| match never {});
        if let Err(err) = self.flush() {
            warn!("error writing to framebuffer: {err}");
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.paint(&Scene::Blank).unwrap_or_else(|never| match never {});
        self.flush()?;
        Ok(())
    }
}

fn starfield(size: Size) -> Vec<(Point, u8)> {
    let mut rng = StdRng::seed_from_u64(0x5eed_57a2);
    (0..STAR_COUNT)
        .map(|_| {
            let p = Point::new(
                rng.gen_range(0..size.width.max(1)) as i32,
                rng.gen_range(0..size.height.max(1)) as i32,
            );
            (p, rng.gen_range(60..=255))
        })
        .collect()
}
