//! Playfield grid: colour occupancy, collision, group detection and gravity.

use crate::piece::Piece;
use rand::Rng;
use tracing::trace;

/// Playfield width in cells.
pub const COLS: usize = 6;

/// Visible playfield height in cells.
pub const ROWS: usize = 12;

/// Hidden rows above the visible playfield (spawn / overflow zone).
pub const BUFFER_ROWS: usize = 2;

/// Full buffered height; row 0 is the top buffer row.
pub const TOTAL_ROWS: usize = ROWS + BUFFER_ROWS;

/// Minimum group size that clears.
pub const CLEAR_THRESHOLD: usize = 4;

const NEIGHBOURS_4: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Block colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Yellow,
    Green,
    Blue,
    Magenta,
}

impl Color {
    pub const ALL: [Self; 5] = [
        Self::Red,
        Self::Yellow,
        Self::Green,
        Self::Blue,
        Self::Magenta,
    ];

    /// Uniformly random colour.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Palette slot for theme lookup (0..5).
    pub fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Yellow => 1,
            Self::Green => 2,
            Self::Blue => 3,
            Self::Magenta => 4,
        }
    }
}

/// Single grid cell: empty or one colour.
pub type Cell = Option<Color>;

/// Grid coordinate `(x, y)`.
pub type Pos = (usize, usize);

/// Maximal same-colour 4-connected region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub color: Color,
    pub cells: Vec<Pos>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_clearable(&self) -> bool {
        self.cells.len() >= CLEAR_THRESHOLD
    }
}

/// Buffered playfield. `rows[y][x]`; rows 0..BUFFER_ROWS are hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: [[Cell; COLS]; TOTAL_ROWS],
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            rows: [[None; COLS]; TOTAL_ROWS],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Cell {
        self.rows.get(y).and_then(|row| row.get(x)).copied().flatten()
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if let Some(slot) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            *slot = cell;
        }
    }

    #[inline]
    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_some()
    }

    /// Read-only view of every row, buffer rows included.
    pub fn rows(&self) -> &[[Cell; COLS]; TOTAL_ROWS] {
        &self.rows
    }

    #[cfg(test)]
    pub fn occupied_count(&self) -> usize {
        self.rows.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// True if any block of `piece` is out of bounds or overlaps an occupied cell.
    /// Blocks above the buffer (negative y) are in bounds and never hit anything.
    pub fn collides(&self, piece: &Piece) -> bool {
        piece.blocks().iter().any(|b| {
            if b.x < 0 || b.x >= COLS as i32 || b.y >= TOTAL_ROWS as i32 {
                return true;
            }
            b.y >= 0 && self.is_occupied(b.x as usize, b.y as usize)
        })
    }

    /// Write the piece's blocks into the grid. Blocks above the buffer are dropped.
    pub fn commit(&mut self, piece: &Piece) {
        for b in piece.blocks() {
            if b.y >= 0 {
                self.set(b.x as usize, b.y as usize, Some(b.color));
            }
        }
    }

    /// Empty every listed cell. Returns how many were occupied.
    pub fn clear_cells(&mut self, cells: &[Pos]) -> usize {
        let mut removed = 0;
        for &(x, y) in cells {
            if self.is_occupied(x, y) {
                self.set(x, y, None);
                removed += 1;
            }
        }
        removed
    }

    /// All same-colour 4-connected groups, in row-major scan order from the top buffer row.
    /// Groups smaller than `CLEAR_THRESHOLD` are included.
    pub fn find_groups(&self) -> Vec<Group> {
        let mut visited = [[false; COLS]; TOTAL_ROWS];
        let mut groups = Vec::new();

        for y in 0..TOTAL_ROWS {
            for x in 0..COLS {
                let Some(color) = self.rows[y][x] else {
                    continue;
                };
                if visited[y][x] {
                    continue;
                }
                visited[y][x] = true;
                let mut cells = Vec::new();
                let mut stack = vec![(x, y)];

                while let Some((cx, cy)) = stack.pop() {
                    cells.push((cx, cy));
                    for (dx, dy) in NEIGHBOURS_4 {
                        let nx = cx as i32 + dx;
                        let ny = cy as i32 + dy;
                        if nx < 0 || nx >= COLS as i32 || ny < 0 || ny >= TOTAL_ROWS as i32 {
                            continue;
                        }
                        let (nx, ny) = (nx as usize, ny as usize);
                        if !visited[ny][nx] && self.rows[ny][nx] == Some(color) {
                            visited[ny][nx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
                groups.push(Group { color, cells });
            }
        }
        groups
    }

    /// Union of all clearable groups, deduplicated, in scan order.
    pub fn clearable_cells(&self) -> Vec<Pos> {
        let mut marked = [[false; COLS]; TOTAL_ROWS];
        let mut out = Vec::new();
        for group in self.find_groups().into_iter().filter(Group::is_clearable) {
            trace!(color = ?group.color, size = group.len(), "clearable group");
            for (x, y) in group.cells {
                if !marked[y][x] {
                    marked[y][x] = true;
                    out.push((x, y));
                }
            }
        }
        out
    }

    /// Compact every column downward, preserving vertical order. Returns true if anything moved.
    pub fn apply_gravity(&mut self) -> bool {
        let mut moved = false;
        for x in 0..COLS {
            let mut write = TOTAL_ROWS;
            for y in (0..TOTAL_ROWS).rev() {
                if let Some(color) = self.rows[y][x] {
                    write -= 1;
                    if write != y {
                        self.rows[write][x] = Some(color);
                        self.rows[y][x] = None;
                        moved = true;
                    }
                }
            }
            for y in 0..write {
                self.rows[y][x] = None;
            }
        }
        moved
    }

    /// Build a grid from text rows aligned to the bottom. `.` is empty; `R Y G B M` are colours.
    #[cfg(test)]
    pub fn from_ascii(lines: &[&str]) -> Self {
        let mut grid = Self::new();
        let top = TOTAL_ROWS - lines.len();
        for (i, line) in lines.iter().enumerate() {
            for (x, ch) in line.chars().enumerate() {
                let cell = match ch {
                    'R' => Some(Color::Red),
                    'Y' => Some(Color::Yellow),
                    'G' => Some(Color::Green),
                    'B' => Some(Color::Blue),
                    'M' => Some(Color::Magenta),
                    _ => None,
                };
                grid.set(x, top + i, cell);
            }
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{Block, Piece};
    use proptest::prelude::*;

    fn pair(a: (i32, i32), b: (i32, i32)) -> Piece {
        Piece::new(
            Block::new(a.0, a.1, Color::Red),
            Block::new(b.0, b.1, Color::Blue),
        )
    }

    fn no_floating_cells(grid: &Grid) -> bool {
        (0..COLS).all(|x| {
            (0..TOTAL_ROWS - 1).all(|y| !grid.is_occupied(x, y) || grid.is_occupied(x, y + 1))
        })
    }

    fn arb_grid() -> impl Strategy<Value = Grid> {
        proptest::collection::vec(proptest::option::weighted(0.5, 0usize..5), COLS * TOTAL_ROWS)
            .prop_map(|cells| {
                let mut grid = Grid::new();
                for (i, c) in cells.into_iter().enumerate() {
                    grid.set(i % COLS, i / COLS, c.map(|k| Color::ALL[k]));
                }
                grid
            })
    }

    #[test]
    fn test_out_of_bounds_collides() {
        let grid = Grid::new();
        assert!(grid.collides(&pair((-1, 5), (0, 5))));
        assert!(grid.collides(&pair((5, 5), (6, 5))));
        assert!(grid.collides(&pair((2, 13), (2, 14))));
        assert!(!grid.collides(&pair((2, 12), (2, 13))));
    }

    #[test]
    fn test_negative_rows_never_collide() {
        let mut grid = Grid::new();
        grid.set(2, 0, Some(Color::Green));
        assert!(!grid.collides(&pair((3, -1), (3, 0))));
        assert!(grid.collides(&pair((2, -1), (2, 0))));
    }

    #[test]
    fn test_commit_drops_blocks_above_buffer() {
        let mut grid = Grid::new();
        grid.commit(&pair((1, 0), (1, -1)));
        assert_eq!(grid.get(1, 0), Some(Color::Red));
        assert_eq!(grid.occupied_count(), 1);
    }

    #[test]
    fn test_two_disjoint_clusters() {
        let grid = Grid::from_ascii(&[
            "RR....",
            "RR..RR",
            "....RR",
            "....R.",
        ]);
        let groups = grid.find_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 4);
        assert_eq!(groups[1].len(), 5);
        for cell in &groups[0].cells {
            assert!(!groups[1].cells.contains(cell));
        }
        assert!(groups.iter().all(|g| g.color == Color::Red));
    }

    #[test]
    fn test_groups_separate_by_colour() {
        let grid = Grid::from_ascii(&["RBRB.."]);
        let groups = grid.find_groups();
        assert_eq!(groups.len(), 4);
        assert!(groups.iter().all(|g| g.len() == 1 && !g.is_clearable()));
        assert!(grid.clearable_cells().is_empty());
    }

    #[test]
    fn test_groups_include_buffer_rows() {
        let mut grid = Grid::new();
        for y in 0..4 {
            grid.set(0, y, Some(Color::Yellow));
        }
        let groups = grid.find_groups();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].is_clearable());
    }

    #[test]
    fn test_gravity_compacts_in_order() {
        let mut grid = Grid::new();
        grid.set(3, 2, Some(Color::Red));
        grid.set(3, 5, Some(Color::Blue));
        grid.set(3, 12, Some(Color::Green));
        assert!(grid.apply_gravity());
        assert_eq!(grid.get(3, 13), Some(Color::Green));
        assert_eq!(grid.get(3, 12), Some(Color::Blue));
        assert_eq!(grid.get(3, 11), Some(Color::Red));
        assert_eq!(grid.occupied_count(), 3);
        assert!(!grid.apply_gravity());
    }

    #[test]
    fn test_clear_cells_counts_only_occupied() {
        let mut grid = Grid::from_ascii(&["GG...."]);
        let removed = grid.clear_cells(&[(0, 13), (1, 13), (2, 13)]);
        assert_eq!(removed, 2);
        assert_eq!(grid.occupied_count(), 0);
    }

    proptest! {
        #[test]
        fn prop_gravity_idempotent(grid in arb_grid()) {
            let mut once = grid.clone();
            once.apply_gravity();
            let mut twice = once.clone();
            twice.apply_gravity();
            prop_assert_eq!(&once, &twice);
            prop_assert!(no_floating_cells(&once));
            prop_assert_eq!(once.occupied_count(), grid.occupied_count());
        }

        #[test]
        fn prop_groups_partition_occupied_cells(grid in arb_grid()) {
            let groups = grid.find_groups();
            let total: usize = groups.iter().map(Group::len).sum();
            prop_assert_eq!(total, grid.occupied_count());
            for g in &groups {
                for &(x, y) in &g.cells {
                    prop_assert_eq!(grid.get(x, y), Some(g.color));
                }
            }
        }

        #[test]
        fn prop_collision_matches_definition(
            grid in arb_grid(),
            x in -2i32..8,
            y in -3i32..16,
            dir in 0usize..4,
        ) {
            let (dx, dy) = [(1, 0), (-1, 0), (0, 1), (0, -1)][dir];
            let piece = pair((x, y), (x + dx, y + dy));
            let expected = piece.blocks().iter().any(|b| {
                let out = b.x < 0 || b.x >= COLS as i32 || b.y >= TOTAL_ROWS as i32;
                out || (b.y >= 0 && grid.get(b.x as usize, b.y as usize).is_some())
            });
            prop_assert_eq!(grid.collides(&piece), expected);
        }
    }
}
