//! Layout and drawing: playfield, active pair, clear flash, sidebar, game over.

use crate::app::{ClearEffect, ScorePopup};
use crate::board::{self, BUFFER_ROWS, COLS, Pos, ROWS};
use crate::game::GameState;
use crate::piece::Piece;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{CellFilter, Duration as TfxDuration, EffectRenderer, Interpolation, fx, ref_count};

/// Each grid cell is two terminal columns wide so blobs look round-ish.
const CELL_WIDTH: u16 = 2;
const CELL_SYMBOL: &str = "██";
const SIDEBAR_WIDTH: u16 = 20;
const POPUP_STEP_MS: u64 = 150;

/// Everything the renderer reads besides the game state.
pub struct View<'a> {
    pub theme: &'a Theme,
    pub final_score: Option<u64>,
    pub popups: &'a [ScorePopup],
    pub now_ms: u64,
    pub now: Instant,
    pub no_animation: bool,
}

/// Playfield outer size (border + visible rows).
fn playfield_size() -> (u16, u16) {
    (COLS as u16 * CELL_WIDTH + 2, ROWS as u16 + 2)
}

/// Screen rect of grid cell `(x, y)`, or None for hidden buffer rows.
fn cell_rect(board: Rect, x: usize, y: usize) -> Option<Rect> {
    let vy = y.checked_sub(BUFFER_ROWS)?;
    Some(Rect {
        x: board.x + x as u16 * CELL_WIDTH,
        y: board.y + vy as u16,
        width: CELL_WIDTH,
        height: 1,
    })
    .filter(|r| r.x + r.width <= board.x + board.width && r.y < board.y + board.height)
}

fn paint_cell(frame: &mut Frame, board: Rect, x: usize, y: usize, color: Color) {
    if let Some(r) = cell_rect(board, x, y) {
        frame
            .buffer_mut()
            .set_string(r.x, r.y, CELL_SYMBOL, Style::default().fg(color));
    }
}

pub fn draw(frame: &mut Frame, state: &GameState, view: &View, clear_effect: &mut Option<ClearEffect>) {
    let area = frame.area();
    let (pw, ph) = playfield_size();
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph.max(18)),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    let playfield_area = Rect {
        height: ph.min(inner[0].height),
        ..inner[0]
    };

    let board = draw_playfield(frame, state, view, playfield_area);
    draw_sidebar(frame, state, view, inner[1]);

    if !view.no_animation {
        apply_clear_effect(frame, state, view, board, clear_effect);
    }
    if let Some(score) = view.final_score {
        draw_game_over(frame, view.theme, score, playfield_area);
    }
}

/// Draws the well and returns the inner board rect.
fn draw_playfield(frame: &mut Frame, state: &GameState, view: &View, area: Rect) -> Rect {
    let theme = view.theme;
    let title = if state.is_resolving() {
        format!(" Chain {} ", state.current_pass())
    } else {
        " Puyotui ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    let board = block.inner(area);
    block.render(area, frame.buffer_mut());

    for y in board.y..board.y + board.height {
        for x in board.x..board.x + board.width {
            frame.buffer_mut()[(x, y)].set_style(Style::default().bg(theme.bg));
        }
    }

    let clearing: HashSet<Pos> = state.clearing_cells().iter().copied().collect();
    for (y, row) in state.grid().rows().iter().enumerate() {
        for (x, cell) in row.iter().enumerate() {
            let Some(color) = cell else {
                continue;
            };
            let fg = if clearing.contains(&(x, y)) {
                theme.flash
            } else {
                theme.piece_color(*color)
            };
            paint_cell(frame, board, x, y, fg);
        }
    }

    if let Some(piece) = state.piece() {
        for b in piece.blocks() {
            if b.y >= 0 {
                paint_cell(frame, board, b.x as usize, b.y as usize, theme.piece_color(b.color));
            }
        }
    }

    // Score popups float up from mid-board.
    for popup in view.popups {
        let rise = (view.now_ms.saturating_sub(popup.born_ms) / POPUP_STEP_MS) as u16;
        let ry = board.y + (board.height / 2).saturating_sub(rise);
        let label = if popup.pass > 1 {
            format!("+{} x{}", popup.points, popup.pass)
        } else {
            format!("+{}", popup.points)
        };
        let rx = board.x + board.width.saturating_sub(label.len() as u16) / 2;
        if ry < board.y + board.height {
            frame.buffer_mut().set_string(
                rx,
                ry,
                label,
                Style::default().fg(theme.title).bg(theme.bg).bold(),
            );
        }
    }
    board
}

/// Screen positions covered by visible clearing cells.
fn clearing_buffer_positions(board: Rect, cells: &[Pos]) -> HashSet<(u16, u16)> {
    cells
        .iter()
        .filter_map(|&(x, y)| cell_rect(board, x, y))
        .flat_map(|r| (r.x..r.x + r.width).map(move |bx| (bx, r.y)))
        .collect()
}

/// Fade clearing cells toward the background for the length of the hold.
/// One effect per (epoch, pass); dropped when no hold is running.
fn apply_clear_effect(
    frame: &mut Frame,
    state: &GameState,
    view: &View,
    board: Rect,
    clear_effect: &mut Option<ClearEffect>,
) {
    if state.clearing_cells().is_empty() {
        *clear_effect = None;
        return;
    }
    let key = (state.epoch(), state.current_pass());
    if clear_effect.as_ref().is_none_or(|e| e.key != key) {
        let positions = clearing_buffer_positions(board, state.clearing_cells());
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        let bg = view.theme.bg;
        let hold_ms = state.config().clear_hold_ms.min(u64::from(u32::MAX)) as u32;
        let effect = fx::fade_to(bg, bg, (hold_ms, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board);
        *clear_effect = Some(ClearEffect {
            key,
            effect,
            last_process: None,
        });
    }

    if let Some(fade) = clear_effect {
        let delta = fade
            .last_process
            .map(|t| view.now.saturating_duration_since(t))
            .unwrap_or_default();
        fade.last_process = Some(view.now);
        let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
        frame.render_effect(&mut fade.effect, board, TfxDuration::from_millis(delta_ms));
    }
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, view: &View, area: Rect) {
    let theme = view.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Next
            Constraint::Length(1),
            Constraint::Length(5), // Stats
            Constraint::Length(1),
            Constraint::Length(3), // Colours
        ])
        .split(area);

    // --- Next ---
    let next_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" Next ", title_style));
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    if let Some(next) = state.next_piece() {
        draw_next_preview(frame, theme, next, next_inner);
    }

    // --- Stats ---
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    let status = if state.is_running() {
        Span::styled("playing", fg_style)
    } else {
        Span::styled("stopped", Style::default().fg(Color::Red))
    };
    let stats = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(state.score().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Chain: ", title_style),
            Span::styled(state.chain_count().to_string(), fg_style),
        ]),
        Line::from(vec![Span::styled("State: ", title_style), status]),
    ];
    Paragraph::new(stats).render(stats_inner, frame.buffer_mut());

    // --- Colours ---
    let colours_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let colours_inner = colours_block.inner(chunks[4]);
    colours_block.render(chunks[4], frame.buffer_mut());
    draw_colour_strip(frame, theme, colours_inner);
}

/// Next pair drawn with its anchor above the satellite.
fn draw_next_preview(frame: &mut Frame, theme: &Theme, next: &Piece, area: Rect) {
    let x = area.x + area.width.saturating_sub(CELL_WIDTH) / 2;
    for (i, block) in next.blocks().iter().enumerate() {
        let y = area.y + i as u16;
        if y < area.y + area.height {
            frame.buffer_mut().set_string(
                x,
                y,
                CELL_SYMBOL,
                Style::default().fg(theme.piece_color(block.color)),
            );
        }
    }
}

/// One swatch per piece colour.
fn draw_colour_strip(frame: &mut Frame, theme: &Theme, area: Rect) {
    let n = board::Color::ALL.len() as u16;
    let swatch_w = (area.width / n).max(1);
    for (i, color) in board::Color::ALL.iter().enumerate() {
        let r = Rect {
            x: area.x + i as u16 * swatch_w,
            y: area.y,
            width: swatch_w,
            height: area.height.min(1),
        };
        if r.x + r.width > area.x + area.width {
            break;
        }
        let c = theme.piece_color(*color);
        Paragraph::new("█".repeat(swatch_w as usize))
            .style(Style::default().fg(c).bg(c))
            .render(r, frame.buffer_mut());
    }
}

fn draw_game_over(frame: &mut Frame, theme: &Theme, score: u64, area: Rect) {
    let popup_w = area.width.min(18);
    let popup_h = 7u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w,
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(Span::styled(
            format!("Score: {}", score),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "R restart  Esc quit",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .style(Style::default().bg(theme.bg))
        .render(popup, frame.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Rect {
        Rect::new(10, 5, COLS as u16 * CELL_WIDTH, ROWS as u16)
    }

    #[test]
    fn test_buffer_rows_are_hidden() {
        assert_eq!(cell_rect(board(), 0, 0), None);
        assert_eq!(cell_rect(board(), 3, BUFFER_ROWS - 1), None);
    }

    #[test]
    fn test_cell_rect_maps_visible_rows() {
        let r = cell_rect(board(), 2, BUFFER_ROWS).unwrap();
        assert_eq!((r.x, r.y, r.width), (14, 5, CELL_WIDTH));
        let bottom = cell_rect(board(), COLS - 1, BUFFER_ROWS + ROWS - 1).unwrap();
        assert_eq!((bottom.x, bottom.y), (20, 16));
    }

    #[test]
    fn test_clearing_positions_cover_both_columns() {
        let set = clearing_buffer_positions(board(), &[(0, BUFFER_ROWS), (1, 0)]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&(10, 5)));
        assert!(set.contains(&(11, 5)));
    }
}
