//! Interactive terminal heatmap.
//!
//! Column labels run vertically along the top, row labels down the left.
//! Arrows / hjkl move the cursor (the grid scrolls to follow it), `g`/`G`
//! jump to the corners, `q` or Esc quits.

use super::{Rgb, SCALE_MAX, SCALE_MIN, TITLE, cell_color, color_for};
use crate::analysis::CorrelationMatrix;
use crate::utils::fmt_corr;
use anyhow::Result;
use crossterm::cursor::Show;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Widget;
use std::io;

/// Terminal columns per heatmap cell.
const CELL_W: u16 = 3;

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Color::Rgb(c.0, c.1, c.2)
    }
}

pub struct HeatmapView {
    matrix: CorrelationMatrix,
    cursor: (usize, usize),
    offset: (usize, usize),
}

impl HeatmapView {
    pub fn new(matrix: CorrelationMatrix) -> Self {
        Self {
            matrix,
            cursor: (0, 0),
            offset: (0, 0),
        }
    }

    fn label_width(&self) -> u16 {
        self.matrix.labels().iter().map(|l| l.chars().count()).max().unwrap_or(0) as u16 + 1
    }

    fn header_height(&self) -> u16 {
        self.matrix.labels().iter().map(|l| l.chars().count()).max().unwrap_or(0) as u16
    }

    /// How many rows and columns of cells fit in `grid`. Zero when the
    /// labels alone fill it.
    fn visible(&self, grid: Rect) -> (usize, usize) {
        let rows = grid.height.saturating_sub(self.header_height()) as usize;
        let cols = (grid.width.saturating_sub(self.label_width()) / CELL_W) as usize;
        (rows, cols)
    }

    /// Scroll so the cursor stays inside the visible window.
    fn follow_cursor(&mut self, visible_rows: usize, visible_cols: usize) {
        let (r, c) = self.cursor;
        let (or, oc) = &mut self.offset;
        if r < *or {
            *or = r;
        } else if visible_rows > 0 && r >= *or + visible_rows {
            *or = r + 1 - visible_rows;
        }
        if c < *oc {
            *oc = c;
        } else if visible_cols > 0 && c >= *oc + visible_cols {
            *oc = c + 1 - visible_cols;
        }
    }

    /// Apply a key press. Returns `true` when the view should close.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        let last = self.matrix.size().saturating_sub(1);
        let (r, c) = &mut self.cursor;
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return true,
            KeyCode::Up | KeyCode::Char('k') => *r = r.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => *r = (*r + 1).min(last),
            KeyCode::Left | KeyCode::Char('h') => *c = c.saturating_sub(1),
            KeyCode::Right | KeyCode::Char('l') => *c = (*c + 1).min(last),
            KeyCode::Char('g') | KeyCode::Home => (*r, *c) = (0, 0),
            KeyCode::Char('G') | KeyCode::End => (*r, *c) = (last, last),
            _ => {}
        }
        false
    }

    fn status_line(&self) -> String {
        let (r, c) = self.cursor;
        let labels = self.matrix.labels();
        match (labels.get(r), labels.get(c)) {
            (Some(a), Some(b)) => format!(
                " {} × {} = {}   [arrows/hjkl move, q quit]",
                a,
                b,
                fmt_corr(self.matrix.get(r, c))
            ),
            _ => " [q quit]".to_string(),
        }
    }

    fn render_grid(&self, area: Rect, buf: &mut Buffer) {
        let labels = self.matrix.labels();
        let label_w = self.label_width();
        let header_h = self.header_height();
        let (vis_rows, vis_cols) = self.visible(area);
        let (off_r, off_c) = self.offset;
        let muted = Style::default().fg(Color::Gray);
        let bold = muted.add_modifier(Modifier::BOLD).fg(Color::White);

        // Column labels, one character per line, centred over each cell.
        for (vc, col) in (off_c..labels.len()).take(vis_cols).enumerate() {
            let x = area.x + label_w + vc as u16 * CELL_W + CELL_W / 2;
            let style = if col == self.cursor.1 { bold } else { muted };
            for (k, ch) in labels[col].chars().enumerate().take(header_h as usize) {
                put(buf, area, x, area.y + k as u16, &ch.to_string(), style);
            }
        }

        for (vr, row) in (off_r..labels.len()).take(vis_rows).enumerate() {
            let y = area.y + header_h + vr as u16;
            let style = if row == self.cursor.0 { bold } else { muted };
            put(buf, area, area.x, y, &labels[row], style);

            for (vc, col) in (off_c..labels.len()).take(vis_cols).enumerate() {
                let x = area.x + label_w + vc as u16 * CELL_W;
                let bg: Color = cell_color(self.matrix.get(row, col)).into();
                let symbol = if (row, col) == self.cursor { " ◆ " } else { "   " };
                put(buf, area, x, y, symbol, Style::default().bg(bg).fg(Color::Black));
            }
        }
    }

    fn render_legend(&self, area: Rect, buf: &mut Buffer) {
        let muted = Style::default().fg(Color::Gray);
        let lo = format!("{:+.0} ", SCALE_MIN);
        let hi = format!(" {:+.0}", SCALE_MAX);
        let bar_w = area
            .width
            .saturating_sub((lo.len() + hi.len()) as u16)
            .min(44);

        put(buf, area, area.x, area.y, &lo, muted);
        let x0 = area.x + lo.len() as u16;
        for i in 0..bar_w {
            let t = if bar_w > 1 { i as f64 / (bar_w - 1) as f64 } else { 0.5 };
            let value = SCALE_MIN + t * (SCALE_MAX - SCALE_MIN);
            let bg: Color = color_for(value).into();
            put(buf, area, x0 + i, area.y, " ", Style::default().bg(bg));
        }
        put(buf, area, x0 + bar_w, area.y, &hi, muted);
    }

    fn layout(area: Rect) -> [Rect; 4] {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);
        [chunks[0], chunks[1], chunks[2], chunks[3]]
    }

    /// Recompute scroll for a frame of size `area`.
    pub fn fit(&mut self, area: Rect) {
        let [_, grid, _, _] = Self::layout(area);
        let (rows, cols) = self.visible(grid);
        self.follow_cursor(rows, cols);
    }
}

/// `Buffer::set_string` panics outside the buffer; drop anything that
/// starts outside `area` and cut the rest at its right edge.
fn put(buf: &mut Buffer, area: Rect, x: u16, y: u16, s: &str, style: Style) {
    let area = area.intersection(buf.area);
    if x < area.x || x >= area.right() || y < area.y || y >= area.bottom() {
        return;
    }
    buf.set_stringn(x, y, s, (area.right() - x) as usize, style);
}

impl Widget for &HeatmapView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let [title, grid, legend, status] = HeatmapView::layout(area);

        put(
            buf,
            title,
            title.x,
            title.y,
            TITLE,
            Style::default().add_modifier(Modifier::BOLD),
        );
        self.render_grid(grid, buf);
        self.render_legend(legend, buf);
        put(
            buf,
            status,
            status.x,
            status.y,
            &self.status_line(),
            Style::default().fg(Color::Gray),
        );
    }
}

/// Leaves raw mode and the alternate screen when dropped, including while
/// unwinding from a panic.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
    }
}

/// Take over the terminal until the user quits.
pub fn run(matrix: CorrelationMatrix) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut view = HeatmapView::new(matrix);
    event_loop(&mut terminal, &mut view)
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    view: &mut HeatmapView,
) -> Result<()> {
    loop {
        terminal.draw(|f| {
            let area = f.area();
            view.fit(area);
            f.render_widget(&*view, area);
        })?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && view.handle_key(key.code) {
                return Ok(());
            }
        }
    }
}
