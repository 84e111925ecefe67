//! Keyboard cursor over the flattened grid.
//!
//! Compound columns are addressed by their flattened index (see
//! [`ColumnSet`](crate::model::ColumnSet)). A position can only take focus if
//! a target was registered for it; read-only columns simply never register.

use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    /// First column of the current row.
    RowStart,
    /// Last column of the current row.
    RowEnd,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Display form of a registry entry, `"row|col"`.
    pub fn key(self) -> String {
        format!("{}|{}", self.row, self.col)
    }
}

#[derive(Clone, Debug, Default)]
pub struct NavigationController {
    rows: usize,
    cols: usize,
    cursor: CellPos,
    targets: HashSet<CellPos>,
}

impl NavigationController {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cursor: CellPos::default(),
            targets: HashSet::new(),
        }
    }

    pub fn cursor(&self) -> CellPos {
        self.cursor
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Changes the grid dimensions, clamping the cursor and dropping targets
    /// that fall outside.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.cursor = self.clamp(self.cursor.row as isize, self.cursor.col as isize);
        self.targets.retain(|pos| pos.row < rows && pos.col < cols);
    }

    /// Makes `pos` focusable. Positions outside the grid are refused.
    pub fn register(&mut self, pos: CellPos) -> bool {
        if pos.row >= self.rows || pos.col >= self.cols {
            return false;
        }
        self.targets.insert(pos)
    }

    pub fn unregister(&mut self, pos: CellPos) -> bool {
        self.targets.remove(&pos)
    }

    /// Registers every position whose column is enabled.
    pub fn register_all(&mut self, enabled: impl Fn(usize) -> bool) {
        for col in (0..self.cols).filter(|c| enabled(*c)) {
            for row in 0..self.rows {
                self.register(CellPos::new(row, col));
            }
        }
    }

    pub fn clear_targets(&mut self) {
        self.targets.clear();
    }

    pub fn is_registered(&self, pos: CellPos) -> bool {
        self.targets.contains(&pos)
    }

    fn clamp(&self, row: isize, col: isize) -> CellPos {
        let max_row = self.rows.saturating_sub(1) as isize;
        let max_col = self.cols.saturating_sub(1) as isize;
        CellPos::new(row.clamp(0, max_row) as usize, col.clamp(0, max_col) as usize)
    }

    /// Moves one step and returns the new position, or `None` when the
    /// cursor stays put (edge of the grid or no registered target).
    pub fn move_focus(&mut self, direction: Direction) -> Option<CellPos> {
        if self.rows == 0 || self.cols == 0 {
            return None;
        }
        let row = self.cursor.row as isize;
        let col = self.cursor.col as isize;
        let candidate = match direction {
            Direction::Up => self.clamp(row - 1, col),
            Direction::Down => self.clamp(row + 1, col),
            Direction::Left => self.clamp(row, col - 1),
            Direction::Right => self.clamp(row, col + 1),
            Direction::RowStart => self.clamp(row, 0),
            Direction::RowEnd => self.clamp(row, self.cols as isize - 1),
        };
        self.focus(candidate)
    }

    /// Jumps to `pos` if it is inside the grid and registered.
    pub fn focus(&mut self, pos: CellPos) -> Option<CellPos> {
        if pos == self.cursor || !self.targets.contains(&pos) {
            return None;
        }
        self.cursor = pos;
        Some(pos)
    }
}
