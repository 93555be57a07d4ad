//! App: terminal init, main loop, frame clock and key handling.

use crate::game::{GameEvent, GameState};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::ui::{self, View};
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use rand::rngs::StdRng;
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;
use tracing::debug;

/// Target frame time (~60 FPS).
const FRAME_DURATION: Duration = Duration::from_millis(16);

/// How long a score popup stays on screen.
const POPUP_LIFETIME_MS: u64 = 1_200;

/// Floating "+points" label for one clear pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorePopup {
    pub points: u64,
    pub pass: u32,
    pub born_ms: u64,
}

/// TachyonFX fade over the cells of one hold phase, keyed by (epoch, pass).
pub struct ClearEffect {
    pub key: (u64, u32),
    pub effect: Effect,
    pub last_process: Option<Instant>,
}

pub struct App {
    theme: Theme,
    state: GameState,
    no_animation: bool,
    /// Origin of the millisecond clock handed to the game.
    clock_start: Instant,
    /// Set when the game ends; cleared on restart.
    final_score: Option<u64>,
    popups: Vec<ScorePopup>,
    clear_effect: Option<ClearEffect>,
}

impl App {
    pub fn new(args: &Args, config: GameConfig, theme: Theme, rng: StdRng) -> Self {
        Self {
            theme,
            state: GameState::new(config, rng),
            no_animation: args.no_animation,
            clock_start: Instant::now(),
            final_score: None,
            popups: Vec::new(),
            clear_effect: None,
        }
    }

    fn clock_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.clock_start).as_millis() as u64
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::MoveLeft => self.state.move_left(),
            Action::MoveRight => self.state.move_right(),
            Action::RotateCw => self.state.rotate_cw(),
            Action::RotateCcw => self.state.rotate_ccw(),
            Action::SoftDrop => self.state.soft_drop(),
            Action::HardDrop => self.state.hard_drop(),
            Action::Restart => self.state.restart(),
            Action::Quit | Action::None => {}
        }
    }

    /// Fold game events into UI state (popups, game-over overlay).
    fn process_events(&mut self, now_ms: u64) {
        for event in self.state.drain_events() {
            match event {
                GameEvent::Cleared { pass, points, .. } => self.popups.push(ScorePopup {
                    points,
                    pass,
                    born_ms: now_ms,
                }),
                GameEvent::GameOver { score } => self.final_score = Some(score),
                GameEvent::Restarted => {
                    self.final_score = None;
                    self.popups.clear();
                    self.clear_effect = None;
                }
                GameEvent::Locked | GameEvent::ChainFinished { .. } => {}
            }
        }
        self.popups
            .retain(|p| now_ms.saturating_sub(p.born_ms) < POPUP_LIFETIME_MS);
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;

        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = terminal.show_cursor();
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let now_ms = self.clock_ms(now);
            self.state.advance_frame(now_ms);
            self.process_events(now_ms);

            let view = View {
                theme: &self.theme,
                final_score: self.final_score,
                popups: &self.popups,
                now_ms,
                now,
                no_animation: self.no_animation,
            };
            let state = &self.state;
            let clear_effect = &mut self.clear_effect;
            terminal.draw(|f| ui::draw(f, state, &view, clear_effect))?;

            let timeout = FRAME_DURATION.saturating_sub(now.elapsed());
            if !event::poll(timeout)? {
                continue;
            }
            while event::poll(Duration::ZERO)? {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let action = key_to_action(key);
                if action == Action::Quit {
                    debug!(score = self.state.score(), "quit");
                    return Ok(());
                }
                self.apply_action(action);
            }
            // Input may have locked a pair or restarted; surface it before the next frame.
            let now_ms = self.clock_ms(Instant::now());
            self.process_events(now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rand::SeedableRng;

    fn app() -> App {
        let args = Args::try_parse_from(["puyotui", "--seed", "3"]).unwrap();
        let config = GameConfig::try_from(&args).unwrap();
        App::new(&args, config, Theme::builtin(), StdRng::seed_from_u64(3))
    }

    #[test]
    fn test_actions_reach_the_game() {
        let mut app = app();
        let x = app.state.piece().map(|p| p.anchor().x);
        app.apply_action(Action::MoveRight);
        assert_eq!(app.state.piece().map(|p| p.anchor().x), x.map(|x| x + 1));
        app.apply_action(Action::HardDrop);
        assert_eq!(app.state.grid().occupied_count(), 2);
    }

    #[test]
    fn test_restart_clears_overlay_and_popups() {
        let mut app = app();
        app.final_score = Some(120);
        app.popups.push(ScorePopup {
            points: 40,
            pass: 1,
            born_ms: 0,
        });
        app.apply_action(Action::Restart);
        app.process_events(10);
        assert_eq!(app.final_score, None);
        assert!(app.popups.is_empty());
    }

    #[test]
    fn test_popups_expire() {
        let mut app = app();
        app.popups.push(ScorePopup {
            points: 40,
            pass: 1,
            born_ms: 0,
        });
        app.process_events(POPUP_LIFETIME_MS - 1);
        assert_eq!(app.popups.len(), 1);
        app.process_events(POPUP_LIFETIME_MS);
        assert!(app.popups.is_empty());
    }
}
