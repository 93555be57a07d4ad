//! Falling pair: two blocks, anchor and satellite, and their rotation geometry.

use crate::board::{Color, Grid};
use rand::Rng;

/// Anchor spawn column.
pub const SPAWN_X: i32 = 2;

/// Anchor spawn row (top buffer row); the satellite spawns directly below.
pub const SPAWN_Y: i32 = 0;

/// Translations tried in order when a rotation's naive target is illegal.
pub const WALL_KICKS: [(i32, i32); 5] = [(1, 0), (-1, 0), (0, -1), (2, 0), (-2, 0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Cw,
    Ccw,
}

/// One coloured block at signed grid coordinates (y may be negative above the buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub x: i32,
    pub y: i32,
    pub color: Color,
}

impl Block {
    pub const fn new(x: i32, y: i32, color: Color) -> Self {
        Self { x, y, color }
    }
}

/// The player-controlled pair. Block 0 is the anchor; block 1, the satellite, sits one
/// orthogonal step away and encodes orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    blocks: [Block; 2],
}

impl Piece {
    pub fn new(anchor: Block, satellite: Block) -> Self {
        let piece = Self {
            blocks: [anchor, satellite],
        };
        debug_assert!(piece.is_well_formed(), "blocks must be orthogonally adjacent");
        piece
    }

    /// Fresh pair with independently random colours, at spawn coordinates.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let anchor = Color::random(rng);
        let satellite = Color::random(rng);
        Self::at_spawn(anchor, satellite)
    }

    pub fn at_spawn(anchor: Color, satellite: Color) -> Self {
        Self::new(
            Block::new(SPAWN_X, SPAWN_Y, anchor),
            Block::new(SPAWN_X, SPAWN_Y + 1, satellite),
        )
    }

    /// Same colours, moved back to spawn coordinates in the default orientation.
    pub fn reset_to_spawn(&self) -> Self {
        Self::at_spawn(self.anchor().color, self.satellite().color)
    }

    pub fn blocks(&self) -> &[Block; 2] {
        &self.blocks
    }

    pub fn anchor(&self) -> Block {
        self.blocks[0]
    }

    pub fn satellite(&self) -> Block {
        self.blocks[1]
    }

    /// Satellite position relative to the anchor.
    pub fn offset(&self) -> (i32, i32) {
        (
            self.blocks[1].x - self.blocks[0].x,
            self.blocks[1].y - self.blocks[0].y,
        )
    }

    fn is_well_formed(&self) -> bool {
        let (dx, dy) = self.offset();
        dx.abs() + dy.abs() == 1
    }

    /// Both blocks moved by `(dx, dy)`.
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        let mut out = *self;
        for b in &mut out.blocks {
            b.x += dx;
            b.y += dy;
        }
        out
    }

    /// Satellite rotated 90° about the anchor, ignoring the grid.
    pub fn rotated(&self, rotation: Rotation) -> Self {
        let (dx, dy) = self.offset();
        let (ndx, ndy) = match rotation {
            Rotation::Cw => (-dy, dx),
            Rotation::Ccw => (dy, -dx),
        };
        let mut out = *self;
        let anchor = out.blocks[0];
        out.blocks[1].x = anchor.x + ndx;
        out.blocks[1].y = anchor.y + ndy;
        out
    }

    /// Rotation resolved against `grid`: the naive target if legal, else the first legal
    /// wall kick. `None` if every candidate collides.
    pub fn rotated_on(&self, grid: &Grid, rotation: Rotation) -> Option<Self> {
        let naive = self.rotated(rotation);
        if !grid.collides(&naive) {
            return Some(naive);
        }
        WALL_KICKS
            .iter()
            .map(|&(kx, ky)| naive.translated(kx, ky))
            .find(|candidate| !grid.collides(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::COLS;

    fn piece_at(x: i32, y: i32, offset: (i32, i32)) -> Piece {
        Piece::new(
            Block::new(x, y, Color::Green),
            Block::new(x + offset.0, y + offset.1, Color::Yellow),
        )
    }

    #[test]
    fn test_spawn_geometry() {
        let p = Piece::at_spawn(Color::Red, Color::Blue);
        assert_eq!((p.anchor().x, p.anchor().y), (2, 0));
        assert_eq!((p.satellite().x, p.satellite().y), (2, 1));
        assert_eq!(p.offset(), (0, 1));
    }

    #[test]
    fn test_cw_offsets_cycle() {
        let p = piece_at(2, 5, (0, 1));
        let steps: Vec<_> = std::iter::successors(Some(p), |p| Some(p.rotated(Rotation::Cw)))
            .skip(1)
            .take(4)
            .map(|p| p.offset())
            .collect();
        assert_eq!(steps, vec![(-1, 0), (0, -1), (1, 0), (0, 1)]);
    }

    #[test]
    fn test_ccw_offsets_cycle() {
        let p = piece_at(2, 5, (0, 1));
        let first = p.rotated(Rotation::Ccw);
        assert_eq!(first.offset(), (1, 0));
        assert_eq!(first.rotated(Rotation::Cw), p);
    }

    #[test]
    fn test_four_rotations_return_home() {
        let grid = Grid::new();
        for rotation in [Rotation::Cw, Rotation::Ccw] {
            for offset in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                let start = piece_at(2, 6, offset);
                let mut p = start;
                for _ in 0..4 {
                    p = p.rotated_on(&grid, rotation).unwrap();
                }
                assert_eq!(p, start);
            }
        }
    }

    #[test]
    fn test_right_wall_kicks_left() {
        let grid = Grid::new();
        let p = piece_at(COLS as i32 - 1, 5, (0, 1));
        let r = p.rotated_on(&grid, Rotation::Ccw).unwrap();
        assert_eq!((r.anchor().x, r.anchor().y), (COLS as i32 - 2, 5));
        assert_eq!((r.satellite().x, r.satellite().y), (COLS as i32 - 1, 5));
    }

    #[test]
    fn test_left_wall_kicks_right() {
        let grid = Grid::new();
        let p = piece_at(0, 5, (0, 1));
        let r = p.rotated_on(&grid, Rotation::Cw).unwrap();
        assert_eq!((r.anchor().x, r.satellite().x), (1, 0));
    }

    #[test]
    fn test_floor_kick_lifts_piece() {
        let grid = Grid::new();
        let p = piece_at(1, 13, (1, 0));
        let r = p.rotated_on(&grid, Rotation::Cw).unwrap();
        assert_eq!((r.anchor().x, r.anchor().y), (1, 12));
        assert_eq!((r.satellite().x, r.satellite().y), (1, 13));
    }

    #[test]
    fn test_boxed_in_rotation_fails() {
        let grid = Grid::from_ascii(&[
            "YYYYYY",
            "Y.YYYY",
            "Y.YYYY",
        ]);
        let p = piece_at(1, 13, (0, -1));
        assert_eq!(p.rotated_on(&grid, Rotation::Cw), None);
        assert_eq!(p.rotated_on(&grid, Rotation::Ccw), None);
    }
}
