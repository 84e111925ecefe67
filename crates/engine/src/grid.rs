//! Cell storage for one plan matrix.
//!
//! The grid is dense over the current row and column sets: every pair exists
//! from construction and starts empty. Changing either set means building a
//! new grid.

use std::collections::HashMap;

use crate::{
    EngineError,
    model::{Column, ColumnId, Row, RowId},
};

/// Explicit acknowledgement required by destructive operations.
#[derive(Clone, Copy, Debug)]
pub struct Confirm;

/// Result of merging a snapshot into the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotMerge {
    pub applied: usize,
    /// Entries naming a row or column outside the grid.
    pub skipped: usize,
}

#[derive(Clone, Debug, Default)]
pub struct GridModel {
    rows: Vec<RowId>,
    columns: Vec<ColumnId>,
    row_index: HashMap<RowId, usize>,
    col_index: HashMap<ColumnId, usize>,
    values: Vec<String>,
    baseline: Vec<String>,
    comments: Vec<String>,
}

impl GridModel {
    pub fn new(rows: &[Row], columns: &[Column]) -> Self {
        let row_ids: Vec<RowId> = rows.iter().map(|r| r.id.clone()).collect();
        let col_ids: Vec<ColumnId> = columns.iter().map(|c| c.id.clone()).collect();
        let row_index = row_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
        let col_index = col_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
        let size = row_ids.len() * col_ids.len();
        Self {
            comments: rows
                .iter()
                .map(|r| r.comment.clone().unwrap_or_default())
                .collect(),
            rows: row_ids,
            columns: col_ids,
            row_index,
            col_index,
            values: vec![String::new(); size],
            baseline: vec![String::new(); size],
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    pub fn contains(&self, row: &RowId, column: &ColumnId) -> bool {
        self.row_index.contains_key(row) && self.col_index.contains_key(column)
    }

    fn slot(&self, row: &RowId, column: &ColumnId) -> Option<usize> {
        let r = *self.row_index.get(row)?;
        let c = *self.col_index.get(column)?;
        Some(r * self.columns.len() + c)
    }

    /// Current value, `""` for pairs outside the grid.
    pub fn cell(&self, row: &RowId, column: &ColumnId) -> &str {
        self.slot(row, column)
            .map(|idx| self.values[idx].as_str())
            .unwrap_or("")
    }

    /// Value at a flattened `(row, col)` position.
    pub fn cell_at(&self, row: usize, col: usize) -> &str {
        if row >= self.rows.len() || col >= self.columns.len() {
            return "";
        }
        self.values[row * self.columns.len() + col].as_str()
    }

    pub fn set_cell(
        &mut self,
        row: &RowId,
        column: &ColumnId,
        value: impl Into<String>,
    ) -> Result<(), EngineError> {
        let idx = self
            .slot(row, column)
            .ok_or_else(|| EngineError::UnknownCell(format!("{row}|{column}")))?;
        self.values[idx] = value.into();
        Ok(())
    }

    /// Values of one row in column order.
    pub fn row_values(&self, row: &RowId) -> Option<&[String]> {
        let r = *self.row_index.get(row)?;
        let width = self.columns.len();
        Some(&self.values[r * width..(r + 1) * width])
    }

    pub fn comment(&self, row: &RowId) -> &str {
        self.row_index
            .get(row)
            .map(|idx| self.comments[*idx].as_str())
            .unwrap_or("")
    }

    pub fn set_comment(
        &mut self,
        row: &RowId,
        comment: impl Into<String>,
    ) -> Result<(), EngineError> {
        let idx = *self
            .row_index
            .get(row)
            .ok_or_else(|| EngineError::UnknownRow(row.to_string()))?;
        self.comments[idx] = comment.into();
        Ok(())
    }

    /// Replaces every cell with the snapshot content.
    ///
    /// Pairs absent from the snapshot become empty. The result is also the
    /// new clean baseline for [`GridModel::is_dirty`].
    pub fn load_snapshot(
        &mut self,
        entries: impl IntoIterator<Item = (RowId, ColumnId, String)>,
    ) -> SnapshotMerge {
        self.values.iter_mut().for_each(String::clear);
        let mut merge = SnapshotMerge::default();
        for (row, column, value) in entries {
            match self.slot(&row, &column) {
                Some(idx) => {
                    self.values[idx] = value;
                    merge.applied += 1;
                }
                None => merge.skipped += 1,
            }
        }
        self.baseline.clone_from(&self.values);
        merge
    }

    /// Clears every cell and comment.
    pub fn reset(&mut self, _confirm: Confirm) {
        self.values.iter_mut().for_each(String::clear);
        self.comments.iter_mut().for_each(String::clear);
    }

    /// Whether any cell differs from the last loaded snapshot.
    pub fn is_dirty(&self) -> bool {
        self.values != self.baseline
    }

    /// Iterates `(row, column, value)` over every pair in grid order.
    pub fn iter(&self) -> impl Iterator<Item = (&RowId, &ColumnId, &str)> + '_ {
        let width = self.columns.len();
        self.values.iter().enumerate().map(move |(idx, value)| {
            (
                &self.rows[idx / width],
                &self.columns[idx % width],
                value.as_str(),
            )
        })
    }
}

/// Operator-edited unit prices; an empty entry falls back to the catalogue.
#[derive(Clone, Debug, Default)]
pub struct PriceBook {
    overrides: HashMap<RowId, String>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, row: &RowId, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.overrides.remove(row);
        } else {
            self.overrides.insert(row.clone(), value);
        }
    }

    /// Raw edited value, if any.
    pub fn raw(&self, row: &RowId) -> Option<&str> {
        self.overrides.get(row).map(String::as_str)
    }

    pub fn unit_price(&self, row: &Row) -> f64 {
        match self.overrides.get(&row.id) {
            Some(raw) => crate::numeric::to_number(raw),
            None => row.unit_price,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn clear(&mut self) {
        self.overrides.clear();
    }

    pub fn edited(&self) -> impl Iterator<Item = (&RowId, &str)> + '_ {
        self.overrides.iter().map(|(id, v)| (id, v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Vec<Row>, Vec<Column>) {
        (
            vec![Row::new("R1", "Wheat"), Row::new("R2", "Barley")],
            vec![Column::unit(1, "North"), Column::unit(2, "South")],
        )
    }

    #[test]
    fn new_grid_is_empty_for_every_pair() {
        let (rows, cols) = fixture();
        let grid = GridModel::new(&rows, &cols);
        assert_eq!(grid.iter().count(), 4);
        assert!(grid.iter().all(|(_, _, v)| v.is_empty()));
        assert!(!grid.is_dirty());
    }

    #[test]
    fn set_cell_touches_one_entry() {
        let (rows, cols) = fixture();
        let mut grid = GridModel::new(&rows, &cols);
        grid.set_cell(&rows[0].id, &cols[1].id, "12.5").unwrap();

        assert_eq!(grid.cell(&rows[0].id, &cols[1].id), "12.5");
        assert_eq!(grid.cell_at(0, 1), "12.5");
        let filled = grid.iter().filter(|(_, _, v)| !v.is_empty()).count();
        assert_eq!(filled, 1);
        assert!(grid.is_dirty());
    }

    #[test]
    fn set_cell_rejects_unknown_pair() {
        let (rows, cols) = fixture();
        let mut grid = GridModel::new(&rows, &cols);
        let err = grid
            .set_cell(&RowId::from("R9"), &cols[0].id, "1")
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownCell("R9|u1".to_string()));
    }

    #[test]
    fn snapshot_replaces_previous_state() {
        let (rows, cols) = fixture();
        let mut grid = GridModel::new(&rows, &cols);
        grid.set_cell(&rows[1].id, &cols[1].id, "99").unwrap();

        let merge = grid.load_snapshot(vec![
            (rows[0].id.clone(), cols[0].id.clone(), "3".to_string()),
            (RowId::from("ghost"), cols[0].id.clone(), "4".to_string()),
        ]);

        assert_eq!(merge, SnapshotMerge { applied: 1, skipped: 1 });
        assert_eq!(grid.cell(&rows[0].id, &cols[0].id), "3");
        assert_eq!(grid.cell(&rows[1].id, &cols[1].id), "");
        assert!(!grid.is_dirty());
    }

    #[test]
    fn reset_clears_cells_and_comments() {
        let (rows, cols) = fixture();
        let mut grid = GridModel::new(&rows, &cols);
        grid.set_cell(&rows[0].id, &cols[0].id, "1").unwrap();
        grid.set_comment(&rows[0].id, "check with agronomist").unwrap();

        grid.reset(Confirm);

        assert!(grid.iter().all(|(_, _, v)| v.is_empty()));
        assert_eq!(grid.comment(&rows[0].id), "");
    }

    #[test]
    fn price_book_falls_back_to_catalogue() {
        let row = Row::new("R1", "Wheat").with_price(16.5);
        let mut prices = PriceBook::new();
        assert_eq!(prices.unit_price(&row), 16.5);

        prices.set(&row.id, "18");
        assert_eq!(prices.unit_price(&row), 18.0);

        prices.set(&row.id, "");
        assert!(prices.is_empty());
        assert_eq!(prices.unit_price(&row), 16.5);
    }
}
