//! Static obstacle grid searched by the pathfinder.
//!
//! Cells are addressed as `(row, col)` with row 0 at the top of the level.
//! The grid is built once per level and never mutated afterwards.

use std::fmt;

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// A discrete grid coordinate. Equality and hashing are by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Offset this cell by `(d_row, d_col)`.
    pub const fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self {
            row: self.row + d_row,
            col: self.col + d_col,
        }
    }

    pub fn manhattan(self, other: Cell) -> u32 {
        (self.row - other.row).unsigned_abs() + (self.col - other.col).unsigned_abs()
    }

    /// True when `other` is one of the 8 cells surrounding this one.
    pub fn is_adjacent(self, other: Cell) -> bool {
        let d_row = (self.row - other.row).abs();
        let d_col = (self.col - other.col).abs();
        self != other && d_row <= 1 && d_col <= 1
    }
}

impl From<(i32, i32)> for Cell {
    fn from((row, col): (i32, i32)) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tile {
    #[default]
    Open,
    Blocked,
}

impl Tile {
    /// Map a loader value: `1` is blocked, anything else is open.
    pub fn from_flag(flag: u8) -> Self {
        if flag == 1 { Tile::Blocked } else { Tile::Open }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GridError {
    #[error("grid has no cells")]
    Empty,

    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown grid character '{ch}' at row {row}, col {col}")]
    UnknownChar { ch: char, row: usize, col: usize },
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Row-major Open/Blocked matrix with fixed dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl Grid {
    /// Build a grid by asking `tile_at` for every cell.
    pub fn from_fn(width: usize, height: usize, mut tile_at: impl FnMut(Cell) -> Tile) -> Self {
        let mut tiles = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                tiles.push(tile_at(Cell::new(row as i32, col as i32)));
            }
        }
        Self {
            width,
            height,
            tiles,
        }
    }

    /// All-open grid.
    pub fn open(width: usize, height: usize) -> Self {
        Self::from_fn(width, height, |_| Tile::Open)
    }

    /// Build from a 0/1 matrix as produced by the level loader.
    pub fn from_flags<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(GridError::Empty);
        }

        let mut tiles = Vec::with_capacity(width * height);
        for (row, flags) in rows.iter().enumerate() {
            let flags = flags.as_ref();
            if flags.len() != width {
                return Err(GridError::Ragged {
                    row,
                    expected: width,
                    found: flags.len(),
                });
            }
            tiles.extend(flags.iter().map(|&f| Tile::from_flag(f)));
        }

        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    /// Parse a compact text grid: `#` or `1` blocked, `.` or `0` open.
    /// Blank lines are skipped so test fixtures can be indented freely.
    pub fn parse(text: &str) -> Result<Self, GridError> {
        let mut rows = Vec::new();
        for (row, line) in text.lines().map(str::trim).filter(|l| !l.is_empty()).enumerate() {
            let mut flags = Vec::with_capacity(line.len());
            for (col, ch) in line.chars().enumerate() {
                let flag = match ch {
                    '#' | '1' => 1,
                    '.' | '0' => 0,
                    _ => return Err(GridError::UnknownChar { ch, row, col }),
                };
                flags.push(flag);
            }
            rows.push(flags);
        }
        Self::from_flags(&rows)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.height
            && (cell.col as usize) < self.width
    }

    /// Dense index of `cell`, or `None` when out of bounds.
    pub fn index(&self, cell: Cell) -> Option<usize> {
        self.contains(cell)
            .then(|| cell.row as usize * self.width + cell.col as usize)
    }

    /// Cell stored at a dense index.
    pub fn cell_at(&self, index: usize) -> Cell {
        Cell::new((index / self.width) as i32, (index % self.width) as i32)
    }

    pub fn tile(&self, cell: Cell) -> Option<Tile> {
        self.index(cell).map(|i| self.tiles[i])
    }

    /// Open and inside the grid.
    pub fn is_open(&self, cell: Cell) -> bool {
        self.tile(cell) == Some(Tile::Open)
    }

    /// Blocked and inside the grid. Out-of-bounds cells are neither open nor blocked.
    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.tile(cell) == Some(Tile::Blocked)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
