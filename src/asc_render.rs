// Scene output backends
// The terminal backend draws with ratatui, the headless one records scenes;
// the framebuffer backend lives in asc_framebuffer

use crossterm::{cursor, execute, terminal};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Span, Spans, Text};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph};
use ratatui::Frame;
use std::cell::RefCell;
use std::io::{self, Stdout};
use std::rc::Rc;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use crate::asc_assets::{AssetManager, Image};
use crate::asc_color::{ColorDepth, TermMatch, Tint, overlay_term};
use crate::asc_error::Result;
use crate::asc_view::{Banner, BoardScene, CellFace, Scene};

pub trait Renderer {
    fn draw(&mut self, scene: &Scene) -> Result<()>;

    /// Release the output device; drawing afterwards is not supported
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Headless
// ----------------------------------------------------------------------------

/// Shared record of the scenes a headless renderer received
#[derive(Clone, Debug, Default)]
pub struct SceneLog(Rc<RefCell<Vec<Scene>>>);

impl SceneLog {
    pub fn scenes(&self) -> Vec<Scene> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn last(&self) -> Option<Scene> {
        self.0.borrow().last().cloned()
    }
}

#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    log: SceneLog,
    shut_down: bool,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> SceneLog {
        self.log.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Renderer for HeadlessRenderer {
    fn draw(&mut self, scene: &Scene) -> Result<()> {
        self.log.0.borrow_mut().push(scene.clone());
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.shut_down = true;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Terminal
// ----------------------------------------------------------------------------

// Glyphs for the terminal board
struct Glyphs {
    hidden: &'static str,
    flag: Image,
    asteroid: Image,
    ascii: bool,
}

impl Glyphs {
    fn image(&self, image: &Image) -> &'static str {
        if self.ascii { image.ascii } else { image.glyph }
    }
}

pub struct TerminalRenderer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    support: ColorDepth,
    glyphs: Glyphs,
    active: bool,
}

impl TerminalRenderer {
    /// Switch to the alternate screen and hide the cursor
    pub fn new(assets: &AssetManager, ascii_icons: bool) -> Result<Self> {
        let glyphs = Glyphs {
            hidden: if ascii_icons { "#" } else { "■" },
            flag: assets.get_image("crosshair")?,
            asteroid: assets.get_image("asteroid")?,
            ascii: ascii_icons,
        };
        let mut stdout = io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        debug!(ascii_icons, "terminal renderer ready");
        Ok(TerminalRenderer {
            terminal,
            support: ColorDepth::detect(),
            glyphs,
            active: true,
        })
    }

    fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(self.terminal.backend_mut(), terminal::LeaveAlternateScreen, cursor::Show)
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

impl Renderer for TerminalRenderer {
    fn draw(&mut self, scene: &Scene) -> Result<()> {
        let support = &self.support;
        let glyphs = &self.glyphs;
        self.terminal.draw(|f| {
            let size = f.size();
            f.render_widget(Clear, size);
            match scene {
                Scene::Blank => {}
                Scene::Banner(banner) => draw_banner(f, size, banner, support),
                Scene::Board(board) => draw_board(f, size, board, support, glyphs),
            }
        })?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.restore()?;
        Ok(())
    }
}

fn draw_banner<B: Backend>(f: &mut Frame<B>, size: Rect, banner: &Banner, support: &ColorDepth) {
    let mut headline = Style::default().fg(banner.headline_tint.term(support));
    if banner.headline_font.bold {
        headline = headline.add_modifier(Modifier::BOLD);
    }
    let lines = vec![
        Spans::from(Span::styled(banner.headline.clone(), headline)),
        Spans::from(Span::raw("")),
        Spans::from(Span::styled(
            banner.subline.clone(),
            Style::default().fg(Tint::White.term(support)),
        )),
    ];
    let area = center_rect(size.width, 3, size);
    f.render_widget(Paragraph::new(Text::from(lines)).alignment(Alignment::Center), area);
}

/// Smallest terminal that fits a board of the given cell dimensions
pub fn min_terminal_size(cols: usize, rows: usize) -> (u16, u16) {
    let board_w = (cols * 2 + 3) as u16;
    ((board_w + 2).max(60), rows as u16 + 8)
}

fn draw_board<B: Backend>(
    f: &mut Frame<B>,
    size: Rect,
    board: &BoardScene,
    support: &ColorDepth,
    glyphs: &Glyphs,
) {
    let (min_w, min_h) = min_terminal_size(board.width, board.height);
    if size.width < min_w || size.height < min_h {
        let warn_lines = vec![
            Spans::from(Span::raw("Terminal size too small.")),
            Spans::from(Span::raw(format!("Minimum required: {} x {}", min_w, min_h))),
        ];
        let warn = Paragraph::new(Text::from(warn_lines))
            .block(Block::default().borders(Borders::ALL).title("Resize Terminal"))
            .alignment(Alignment::Center);
        let w = 40u16.min(size.width.saturating_sub(2));
        let h = 5u16.min(size.height.saturating_sub(2));
        f.render_widget(warn, center_rect(w, h, size));
        return;
    }

    // header, spacer, board, label, gauge
    let area = center_rect(min_w - 2, min_h, size);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(board.height as u16 + 2),
                Constraint::Length(1),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    let white = Tint::White.term(support);
    let outline = Style::default().fg(board.outline.term(support));

    if let Some(title) = &board.title {
        let p = Paragraph::new(Spans::from(Span::styled(
            title.clone(),
            Style::default().fg(white).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center);
        f.render_widget(p, chunks[0]);
    }
    if let Some(hud) = &board.hud {
        let slots = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(25); 4].as_ref())
            .split(chunks[0]);
        for (text, slot) in hud.iter().zip(slots.iter()) {
            let p = Paragraph::new(Spans::from(Span::styled(text.clone(), Style::default().fg(white))));
            f.render_widget(p, *slot);
        }
    }

    // grid
    let grid_area = center_rect((board.width * 2 + 3) as u16, chunks[2].height, chunks[2]);
    let background = board.background.term(support);
    let mut lines = Vec::with_capacity(board.height);
    for y in 0..board.height {
        let mut spans = Vec::with_capacity(board.width + 1);
        for x in 0..board.width {
            spans.push(cell_span(board, (x, y), support, glyphs));
        }
        spans.push(Span::styled(" ", Style::default().bg(background)));
        lines.push(Spans::from(spans));
    }
    let grid = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL).border_style(outline));
    f.render_widget(grid, grid_area);

    let label = Paragraph::new(Spans::from(Span::styled(
        board.revealed_label.clone(),
        Style::default().fg(white),
    )))
        .alignment(Alignment::Center);
    f.render_widget(label, chunks[3]);

    let gauge_area = center_rect((board.width * 4 / 3) as u16 + 2, 3, chunks[4]);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).border_style(outline))
        .gauge_style(Style::default().fg(white).bg(Tint::Black.term(support)))
        .ratio(board.progress.clamp(0.0, 1.0) as f64)
        .label(board.percent_label.clone());
    f.render_widget(gauge, gauge_area);
}

fn cell_span(board: &BoardScene, pos: (usize, usize), support: &ColorDepth, glyphs: &Glyphs) -> Span<'static> {
    let face = board.face(pos);
    let selected = board.selected == pos;

    let mut bg = match face {
        CellFace::KnownMine => overlay_term(board.background, Tint::MineOverlay, support),
        CellFace::KnownSafe => overlay_term(board.background, Tint::SafeOverlay, support),
        _ => board.background.term(support),
    };
    if let Some(flash) = board.flash {
        bg = overlay_term(board.background, flash, support);
    }
    if selected {
        bg = Tint::Red.term(support);
    }

    let white = Tint::White.term(support);
    let (text, fg) = match face {
        CellFace::Hidden => (glyphs.hidden.to_string(), Tint::CellOutline.term(support)),
        CellFace::Flagged => {
            let fg = if selected { white } else { glyphs.flag.tint.term(support) };
            (glyphs.image(&glyphs.flag).to_string(), fg)
        }
        CellFace::Number(0) | CellFace::KnownSafe => (" ".to_string(), white),
        CellFace::Number(n) => (n.to_string(), white),
        CellFace::Asteroid | CellFace::KnownMine => (glyphs.image(&glyphs.asteroid).to_string(), white),
    };
    // Every cell is two columns wide
    let pad = 2usize.saturating_sub(text.as_str().width());
    Span::styled(format!("{}{}", " ".repeat(pad), text), Style::default().fg(fg).bg(bg))
}

fn center_rect(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
