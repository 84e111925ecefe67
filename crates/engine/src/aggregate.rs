//! Derived totals of a plan matrix.
//!
//! Totals are never stored. [`compute`] is a single pass over the grid and is
//! cheap enough to run after every keystroke.

use std::collections::HashMap;

use crate::{
    grid::{GridModel, PriceBook},
    model::{Column, ColumnId, Row, RowId},
    numeric,
};

/// Tolerance for the `grand == Σ rows == Σ columns` invariant.
pub const TOTALS_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Totals {
    pub row_total: HashMap<RowId, f64>,
    pub col_total: HashMap<ColumnId, f64>,
    pub grand: f64,
    /// Quantity × unit price, per row.
    pub row_amount: HashMap<RowId, f64>,
    pub col_amount: HashMap<ColumnId, f64>,
    pub grand_amount: f64,
    /// Per-row sums restricted to one sub-metric (compound layouts only).
    pub metric_total: HashMap<(RowId, String), f64>,
    pub metric_grand: HashMap<String, f64>,
}

impl Totals {
    pub fn row(&self, id: &RowId) -> f64 {
        self.row_total.get(id).copied().unwrap_or(0.0)
    }

    pub fn column(&self, id: &ColumnId) -> f64 {
        self.col_total.get(id).copied().unwrap_or(0.0)
    }

    pub fn row_amount(&self, id: &RowId) -> f64 {
        self.row_amount.get(id).copied().unwrap_or(0.0)
    }

    pub fn column_amount(&self, id: &ColumnId) -> f64 {
        self.col_amount.get(id).copied().unwrap_or(0.0)
    }

    pub fn metric(&self, row: &RowId, metric: &str) -> f64 {
        self.metric_total
            .get(&(row.clone(), metric.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Checks `grand == Σ row totals == Σ column totals`.
    pub fn is_balanced(&self) -> bool {
        let by_rows: f64 = self.row_total.values().sum();
        let by_cols: f64 = self.col_total.values().sum();
        (self.grand - by_rows).abs() <= TOTALS_TOLERANCE
            && (self.grand - by_cols).abs() <= TOTALS_TOLERANCE
    }
}

pub fn compute(rows: &[Row], columns: &[Column], grid: &GridModel, prices: &PriceBook) -> Totals {
    let mut totals = Totals::default();
    let mut col_sums = vec![0.0f64; columns.len()];
    let mut col_amounts = vec![0.0f64; columns.len()];

    for row in rows {
        let price = prices.unit_price(row);
        let mut row_sum = 0.0;
        let mut row_amount = 0.0;

        for (idx, column) in columns.iter().enumerate() {
            let quantity = numeric::to_number(grid.cell(&row.id, &column.id));
            if quantity == 0.0 {
                continue;
            }
            let amount = quantity * price;
            row_sum += quantity;
            row_amount += amount;
            col_sums[idx] += quantity;
            col_amounts[idx] += amount;

            if let Some(metric) = column.metric() {
                *totals
                    .metric_total
                    .entry((row.id.clone(), metric.to_string()))
                    .or_insert(0.0) += quantity;
                *totals.metric_grand.entry(metric.to_string()).or_insert(0.0) += quantity;
            }
        }

        totals.grand += row_sum;
        totals.grand_amount += row_amount;
        totals.row_total.insert(row.id.clone(), row_sum);
        totals.row_amount.insert(row.id.clone(), row_amount);
    }

    for (idx, column) in columns.iter().enumerate() {
        totals.col_total.insert(column.id.clone(), col_sums[idx]);
        totals.col_amount.insert(column.id.clone(), col_amounts[idx]);
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= TOTALS_TOLERANCE
    }

    #[test]
    fn single_cell_quantity_and_amount() {
        let rows = vec![Row::new("R1", "Fertilizer").with_group(2, 1).with_price(16.5)];
        let columns = vec![Column::unit(1, "U1")];
        let mut grid = GridModel::new(&rows, &columns);
        let prices = PriceBook::new();

        grid.set_cell(&rows[0].id, &columns[0].id, "10").unwrap();
        let totals = compute(&rows, &columns, &grid, &prices);
        assert!(approx(totals.row(&rows[0].id), 10.0));
        assert!(approx(totals.grand, 10.0));
        assert!(approx(totals.grand_amount, 165.0));

        grid.set_cell(&rows[0].id, &columns[0].id, "2.5").unwrap();
        let totals = compute(&rows, &columns, &grid, &prices);
        assert!(approx(totals.grand, 2.5));
        assert!(approx(totals.grand_amount, 41.25));
        assert!(approx(totals.column(&columns[0].id), 2.5));
    }

    #[test]
    fn invariant_holds_for_arbitrary_assignments() {
        let rows: Vec<Row> = (0..6)
            .map(|i| Row::new(RowId::from(i as i64), format!("row {i}")).with_price(i as f64 * 1.1))
            .collect();
        let columns: Vec<Column> = (0..9).map(|i| Column::unit(i, format!("u{i}"))).collect();
        let mut grid = GridModel::new(&rows, &columns);
        let prices = PriceBook::new();

        let mut seed = 17u64;
        for step in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let r = (seed >> 33) as usize % rows.len();
            let c = (seed >> 17) as usize % columns.len();
            let raw = format!("{}.{}", (seed >> 40) % 5000, (seed >> 8) % 100);
            let value = if step % 7 == 0 { String::new() } else { numeric::sanitize(&raw, 2) };
            grid.set_cell(&rows[r].id, &columns[c].id, value).unwrap();

            let totals = compute(&rows, &columns, &grid, &prices);
            assert!(totals.is_balanced(), "unbalanced at step {step}");
        }
    }

    #[test]
    fn price_override_changes_amount_only() {
        let rows = vec![Row::new("R1", "Seeds").with_price(2.0)];
        let columns = vec![Column::unit(1, "U1"), Column::unit(2, "U2")];
        let mut grid = GridModel::new(&rows, &columns);
        grid.set_cell(&rows[0].id, &columns[0].id, "3").unwrap();
        grid.set_cell(&rows[0].id, &columns[1].id, "4").unwrap();

        let mut prices = PriceBook::new();
        prices.set(&rows[0].id, "2.5");
        let totals = compute(&rows, &columns, &grid, &prices);

        assert!(approx(totals.grand, 7.0));
        assert!(approx(totals.grand_amount, 17.5));
        assert!(approx(totals.column_amount(&columns[1].id), 10.0));
    }

    #[test]
    fn compound_columns_split_by_metric() {
        let rows = vec![Row::new("P1", "Apples")];
        let columns = vec![
            Column::period(1, "plan", "January"),
            Column::period(1, "actual", "January"),
            Column::period(2, "plan", "February"),
        ];
        let mut grid = GridModel::new(&rows, &columns);
        grid.set_cell(&rows[0].id, &columns[0].id, "5").unwrap();
        grid.set_cell(&rows[0].id, &columns[1].id, "4").unwrap();
        grid.set_cell(&rows[0].id, &columns[2].id, "6").unwrap();

        let totals = compute(&rows, &columns, &grid, &PriceBook::new());
        assert!(approx(totals.metric(&rows[0].id, "plan"), 11.0));
        assert!(approx(totals.metric(&rows[0].id, "actual"), 4.0));
        assert!(approx(totals.metric_grand["plan"], 11.0));
        assert!(approx(totals.grand, 15.0));
    }

    #[test]
    fn empty_grid_has_zero_totals() {
        let rows = vec![Row::new("R1", "Fuel")];
        let columns = vec![Column::unit(1, "U1")];
        let grid = GridModel::new(&rows, &columns);
        let totals = compute(&rows, &columns, &grid, &PriceBook::new());
        assert_eq!(totals.grand, 0.0);
        assert_eq!(totals.row(&rows[0].id), 0.0);
        assert_eq!(totals.column(&columns[0].id), 0.0);
        assert!(totals.is_balanced());
    }
}
