//! Game state: active pair, lookahead, chain resolution, scoring and the frame clock.

use crate::GameConfig;
use crate::board::{Grid, Pos};
use crate::piece::{Piece, Rotation};
use rand::rngs::StdRng;
use tracing::{debug, info};

/// Points per removed cell, before the chain multiplier.
pub const POINTS_PER_CELL: u64 = 10;

/// Notifications for the host, drained once per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Active pair committed to the grid.
    Locked,
    /// One clear pass finished.
    Cleared {
        pass: u32,
        removed: usize,
        points: u64,
    },
    /// Resolution settled after at least one pass.
    ChainFinished { chain: u32 },
    /// Spawn blocked; raised once per game.
    GameOver { score: u64 },
    Restarted,
}

/// Chain resolution phase. Phases carry the epoch they were started in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Resolution {
    #[default]
    Idle,
    /// Clearable cells found; shown to the player until the hold elapses.
    Holding {
        epoch: u64,
        completed: u32,
        since_ms: u64,
        cells: Vec<Pos>,
    },
    /// Pass `pass` removed and gravity applied; waiting before the next scan.
    Settling { epoch: u64, pass: u32, since_ms: u64 },
}

impl Resolution {
    fn epoch(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Holding { epoch, .. } | Self::Settling { epoch, .. } => Some(*epoch),
        }
    }
}

/// Whole game: grid, active and next pair, score, chain, running flag and pending resolution.
#[derive(Debug)]
pub struct GameState {
    config: GameConfig,
    rng: StdRng,
    grid: Grid,
    piece: Option<Piece>,
    next: Option<Piece>,
    score: u64,
    chain_count: u32,
    running: bool,
    /// Bumped on every restart.
    epoch: u64,
    resolution: Resolution,
    /// Timestamp of the latest frame; lock-triggered phases start here.
    now_ms: u64,
    last_drop_ms: Option<u64>,
    events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(config: GameConfig, rng: StdRng) -> Self {
        let mut state = Self {
            config,
            rng,
            grid: Grid::new(),
            piece: None,
            next: None,
            score: 0,
            chain_count: 0,
            running: true,
            epoch: 0,
            resolution: Resolution::Idle,
            now_ms: 0,
            last_drop_ms: None,
            events: Vec::new(),
        };
        state.reset();
        state
    }

    fn reset(&mut self) {
        self.grid = Grid::new();
        self.score = 0;
        self.chain_count = 0;
        self.running = true;
        self.resolution = Resolution::Idle;
        self.last_drop_ms = None;
        self.piece = None;
        self.next = Some(Piece::random(&mut self.rng));
        self.spawn();
    }

    // --- queries ---

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn piece(&self) -> Option<&Piece> {
        self.piece.as_ref()
    }

    pub fn next_piece(&self) -> Option<&Piece> {
        self.next.as_ref()
    }

    /// Cells about to clear; empty unless a hold phase is running.
    pub fn clearing_cells(&self) -> &[Pos] {
        match &self.resolution {
            Resolution::Holding { cells, .. } => cells,
            _ => &[],
        }
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    /// Passes in the most recent finished resolution.
    pub fn chain_count(&self) -> u32 {
        self.chain_count
    }

    /// Pass currently being shown or settled; 0 when idle.
    pub fn current_pass(&self) -> u32 {
        match &self.resolution {
            Resolution::Idle => 0,
            Resolution::Holding { completed, .. } => completed + 1,
            Resolution::Settling { pass, .. } => *pass,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_resolving(&self) -> bool {
        self.resolution != Resolution::Idle
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, GameEvent> {
        self.events.drain(..)
    }

    // --- commands ---

    pub fn move_left(&mut self) {
        self.shift(-1);
    }

    pub fn move_right(&mut self) {
        self.shift(1);
    }

    fn shift(&mut self, dx: i32) {
        if !self.running {
            return;
        }
        if let Some(piece) = self.piece {
            let moved = piece.translated(dx, 0);
            if !self.grid.collides(&moved) {
                self.piece = Some(moved);
            }
        }
    }

    pub fn rotate_cw(&mut self) {
        self.rotate(Rotation::Cw);
    }

    pub fn rotate_ccw(&mut self) {
        self.rotate(Rotation::Ccw);
    }

    /// Rotation with wall kicks; on total failure both blocks stay put.
    fn rotate(&mut self, rotation: Rotation) {
        if !self.running {
            return;
        }
        if let Some(rotated) = self.piece.and_then(|p| p.rotated_on(&self.grid, rotation)) {
            self.piece = Some(rotated);
        }
    }

    pub fn soft_drop(&mut self) {
        if self.running {
            self.step_down_or_lock();
        }
    }

    pub fn hard_drop(&mut self) {
        if !self.running {
            return;
        }
        let Some(mut piece) = self.piece else {
            return;
        };
        loop {
            let below = piece.translated(0, 1);
            if self.grid.collides(&below) {
                break;
            }
            piece = below;
        }
        self.piece = Some(piece);
        self.lock_piece();
    }

    /// Start a new game. Honoured even after game over; any pending resolution is dropped.
    pub fn restart(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.events.clear();
        self.reset();
        self.events.push(GameEvent::Restarted);
        info!(epoch = self.epoch, "game restarted");
    }

    // --- clock ---

    /// Advance to `timestamp_ms`: progress chain resolution, then autonomous descent once
    /// more than `drop_interval_ms` has passed since the last step.
    pub fn advance_frame(&mut self, timestamp_ms: u64) {
        self.now_ms = timestamp_ms;
        if !self.running {
            return;
        }
        self.advance_resolution(timestamp_ms);
        // A chain can end in a blocked spawn.
        if !self.running {
            return;
        }

        let last = *self.last_drop_ms.get_or_insert(timestamp_ms);
        if timestamp_ms.saturating_sub(last) > self.config.drop_interval_ms {
            self.last_drop_ms = Some(timestamp_ms);
            self.step_down_or_lock();
        }
    }

    /// The epoch check is a guard only: `restart` already resets the phase to `Idle`.
    fn advance_resolution(&mut self, now: u64) {
        if self
            .resolution
            .epoch()
            .is_some_and(|epoch| epoch != self.epoch)
        {
            debug!("discarding resolution from a previous game");
            self.resolution = Resolution::Idle;
            if self.piece.is_none() {
                self.spawn();
            }
            return;
        }

        loop {
            match std::mem::take(&mut self.resolution) {
                Resolution::Idle => return,
                Resolution::Holding {
                    epoch,
                    completed,
                    since_ms,
                    cells,
                } => {
                    if now.saturating_sub(since_ms) < self.config.clear_hold_ms {
                        self.resolution = Resolution::Holding {
                            epoch,
                            completed,
                            since_ms,
                            cells,
                        };
                        return;
                    }
                    let pass = completed + 1;
                    self.clear_pass(pass, &cells);
                    self.resolution = Resolution::Settling {
                        epoch,
                        pass,
                        since_ms: now,
                    };
                }
                Resolution::Settling {
                    epoch,
                    pass,
                    since_ms,
                } => {
                    if now.saturating_sub(since_ms) < self.config.settle_ms {
                        self.resolution = Resolution::Settling {
                            epoch,
                            pass,
                            since_ms,
                        };
                        return;
                    }
                    self.scan_for_clears(pass);
                }
            }
        }
    }

    // --- lock & resolution ---

    fn step_down_or_lock(&mut self) {
        if !self.running {
            return;
        }
        let Some(piece) = self.piece else {
            return;
        };
        let below = piece.translated(0, 1);
        if self.grid.collides(&below) {
            self.lock_piece();
        } else {
            self.piece = Some(below);
        }
    }

    fn lock_piece(&mut self) {
        let Some(piece) = self.piece.take() else {
            return;
        };
        self.grid.commit(&piece);
        self.grid.apply_gravity();
        self.events.push(GameEvent::Locked);
        debug!(
            anchor = ?(piece.anchor().x, piece.anchor().y),
            satellite = ?(piece.satellite().x, piece.satellite().y),
            "pair locked"
        );
        self.scan_for_clears(0);
    }

    /// Step 1 of a pass: hold clearable cells, or finish the chain with `completed` passes.
    fn scan_for_clears(&mut self, completed: u32) {
        let cells = self.grid.clearable_cells();
        if cells.is_empty() {
            self.finish_chain(completed);
        } else {
            self.resolution = Resolution::Holding {
                epoch: self.epoch,
                completed,
                since_ms: self.now_ms,
                cells,
            };
        }
    }

    fn clear_pass(&mut self, pass: u32, cells: &[Pos]) {
        let removed = self.grid.clear_cells(cells);
        let points = removed as u64 * POINTS_PER_CELL * u64::from(pass);
        self.score += points;
        self.grid.apply_gravity();
        self.events.push(GameEvent::Cleared {
            pass,
            removed,
            points,
        });
        debug!(pass, removed, points, score = self.score, "clear pass");
    }

    fn finish_chain(&mut self, completed: u32) {
        self.chain_count = completed;
        self.resolution = Resolution::Idle;
        if completed > 0 {
            self.events.push(GameEvent::ChainFinished { chain: completed });
            debug!(chain = completed, "chain finished");
        }
        self.spawn();
    }

    /// Promote the lookahead pair to spawn, roll a new lookahead, and end the game if blocked.
    fn spawn(&mut self) {
        let piece = match self.next.take() {
            Some(next) => next.reset_to_spawn(),
            None => Piece::random(&mut self.rng),
        };
        self.next = Some(Piece::random(&mut self.rng));
        let blocked = self.grid.collides(&piece);
        self.piece = Some(piece);
        if blocked {
            self.running = false;
            self.events.push(GameEvent::GameOver { score: self.score });
            info!(score = self.score, "game over");
        }
    }
}
