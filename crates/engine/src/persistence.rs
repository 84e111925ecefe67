//! Loading and saving a plan matrix against the planning service.
//!
//! The adapter never talks HTTP itself: a [`PlanningBackend`] performs the
//! calls, the adapter decides what to send and whether a response may still
//! be applied. Responses are tagged with a [`LoadTicket`]; only the ticket of
//! the most recent [`PersistenceAdapter::begin_load`] can touch the grid.

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
};

use api_types::{
    WireAmount,
    save::{CellUpsert, PriceUpsert, RowUpsert, UnitValue},
    snapshot::SnapshotEntry,
};
use serde::{Deserialize, Serialize};

use crate::{
    BackendError, EngineError,
    error::UnmappedRow,
    grid::{GridModel, PriceBook, SnapshotMerge},
    model::{ColumnId, ColumnKey, ColumnSet, Row, RowId},
    numeric,
    resolver::KeyResolver,
};

/// Identity of a loaded matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanKey {
    pub plan_id: i64,
    pub branch_id: i64,
}

/// Payload layout expected by the save endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveShape {
    /// One entry per storage row with per-unit values.
    #[default]
    RowUnits,
    /// One entry per cell.
    FlatCells,
}

/// How snapshot entries identify their row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKeying {
    /// By storage id, translated back through the [`KeyResolver`].
    #[default]
    Storage,
    /// By row id directly (product tables). Saves carry the row id as well,
    /// so the seed is not consulted.
    Row,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersistOptions {
    pub shape: SaveShape,
    pub keying: SnapshotKeying,
    pub max_decimals: usize,
}

/// Read-only view of the table the adapter works on.
#[derive(Clone, Copy)]
pub struct TableView<'a> {
    pub rows: &'a [Row],
    pub columns: &'a ColumnSet,
    pub resolver: &'a KeyResolver,
    pub options: PersistOptions,
}

/// Remote side of a plan table.
pub trait PlanningBackend: Send + Sync {
    fn load_snapshot(
        &self,
        key: PlanKey,
    ) -> impl Future<Output = Result<Vec<SnapshotEntry>, BackendError>> + Send;

    fn save_rows(
        &self,
        key: PlanKey,
        rows: Vec<RowUpsert>,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn save_cells(
        &self,
        key: PlanKey,
        cells: Vec<CellUpsert>,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn save_prices(
        &self,
        key: PlanKey,
        prices: Vec<PriceUpsert>,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    pub key: PlanKey,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    Applied(SnapshotMerge),
    /// Transport failure: the grid was cleared and starts blank.
    Fallback(BackendError),
    /// Any other failure: the grid was left as it was.
    Failed(BackendError),
    /// A newer load superseded this one; nothing was touched.
    Stale,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SaveBatch {
    Prices(Vec<PriceUpsert>),
    Rows(Vec<RowUpsert>),
    Cells(Vec<CellUpsert>),
}

impl SaveBatch {
    pub fn len(&self) -> usize {
        match self {
            Self::Prices(v) => v.len(),
            Self::Rows(v) => v.len(),
            Self::Cells(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything one save will send, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct SavePlan {
    pub key: PlanKey,
    pub batches: Vec<SaveBatch>,
}

impl SavePlan {
    /// Sends every batch in order, stopping at the first failure.
    pub async fn execute<B: PlanningBackend>(self, backend: &B) -> Result<(), BackendError> {
        for batch in self.batches {
            tracing::debug!(
                plan_id = self.key.plan_id,
                branch_id = self.key.branch_id,
                size = batch.len(),
                "sending save batch"
            );
            match batch {
                SaveBatch::Prices(prices) => backend.save_prices(self.key, prices).await?,
                SaveBatch::Rows(rows) => backend.save_rows(self.key, rows).await?,
                SaveBatch::Cells(cells) => backend.save_cells(self.key, cells).await?,
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SaveOutcome {
    /// Written; the caller should reload `reload` to show persisted state.
    Saved { reload: PlanKey },
    /// Nothing changed locally; the operator's values are still in the grid.
    Failed(BackendError),
}

#[derive(Debug, Default)]
pub struct PersistenceAdapter {
    generation: u64,
    current: Option<PlanKey>,
    saving: bool,
}

impl PersistenceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<PlanKey> {
        self.current
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Starts a load for `key`; any ticket handed out before becomes stale.
    pub fn begin_load(&mut self, key: PlanKey) -> LoadTicket {
        self.generation += 1;
        self.current = Some(key);
        LoadTicket {
            generation: self.generation,
            key,
        }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation && self.current == Some(ticket.key)
    }

    /// Drops the current selection; every outstanding ticket becomes stale.
    pub fn detach(&mut self) {
        self.generation += 1;
        self.current = None;
    }

    pub fn apply_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<Vec<SnapshotEntry>, BackendError>,
        grid: &mut GridModel,
        view: TableView<'_>,
    ) -> LoadOutcome {
        if !self.is_current(ticket) {
            tracing::debug!(
                plan_id = ticket.key.plan_id,
                branch_id = ticket.key.branch_id,
                "discarding stale snapshot"
            );
            return LoadOutcome::Stale;
        }

        match result {
            Ok(entries) => {
                let cells = snapshot_cells(&entries, view);
                let merge = grid.load_snapshot(cells);
                if merge.skipped > 0 {
                    tracing::warn!(skipped = merge.skipped, "snapshot entries outside the grid");
                }
                LoadOutcome::Applied(merge)
            }
            Err(err) if err.is_transport() => {
                tracing::warn!("snapshot unavailable, starting blank: {err}");
                grid.load_snapshot(std::iter::empty::<(RowId, ColumnId, String)>());
                LoadOutcome::Fallback(err)
            }
            Err(err) => {
                tracing::error!("snapshot load failed: {err}");
                LoadOutcome::Failed(err)
            }
        }
    }

    /// Builds the save batches and marks the adapter busy.
    ///
    /// Fails without side effects when a save is already outstanding or when
    /// rows with data have no storage id.
    pub fn prepare_save(
        &mut self,
        key: PlanKey,
        grid: &GridModel,
        prices: &PriceBook,
        view: TableView<'_>,
    ) -> Result<SavePlan, EngineError> {
        if self.saving {
            return Err(EngineError::SaveInProgress);
        }
        let plan = build_save_plan(key, grid, prices, view)?;
        self.saving = true;
        Ok(plan)
    }

    pub fn finish_save(&mut self, key: PlanKey, result: Result<(), BackendError>) -> SaveOutcome {
        self.saving = false;
        match result {
            Ok(()) => SaveOutcome::Saved { reload: key },
            Err(err) => {
                tracing::error!(
                    plan_id = key.plan_id,
                    branch_id = key.branch_id,
                    "save failed: {err}"
                );
                SaveOutcome::Failed(err)
            }
        }
    }

    pub async fn load<B: PlanningBackend>(
        &mut self,
        backend: &B,
        key: PlanKey,
        grid: &mut GridModel,
        view: TableView<'_>,
    ) -> LoadOutcome {
        let ticket = self.begin_load(key);
        let result = backend.load_snapshot(key).await;
        self.apply_load(&ticket, result, grid, view)
    }

    /// Sends a prepared plan. On success the grid is reloaded from the
    /// backend so it shows persisted state.
    pub async fn save<B: PlanningBackend>(
        &mut self,
        backend: &B,
        plan: SavePlan,
        grid: &mut GridModel,
        view: TableView<'_>,
    ) -> Result<LoadOutcome, BackendError> {
        let key = plan.key;
        let result = plan.execute(backend).await;
        match self.finish_save(key, result) {
            SaveOutcome::Saved { reload } => Ok(self.load(backend, reload, grid, view).await),
            SaveOutcome::Failed(err) => Err(err),
        }
    }
}

fn wire_to_cell(amount: &WireAmount, max_decimals: usize) -> String {
    match amount {
        WireAmount::Number(n) if n.is_finite() => {
            numeric::sanitize_signed(&n.to_string(), max_decimals)
        }
        WireAmount::Number(_) => String::new(),
        WireAmount::Text(raw) => numeric::sanitize_signed(raw, max_decimals),
    }
}

/// Key a row is written under; the same key the snapshot reports it by.
fn wire_row_key(row: &Row, view: TableView<'_>) -> Option<i64> {
    match view.options.keying {
        SnapshotKeying::Storage => view.resolver.resolve_row(row),
        SnapshotKeying::Row => row.id.as_str().parse().ok(),
    }
}

/// Translates wire entries into grid coordinates. Entries that name an
/// unknown row or column are dropped with a warning.
pub fn snapshot_cells(
    entries: &[SnapshotEntry],
    view: TableView<'_>,
) -> Vec<(RowId, ColumnId, String)> {
    let inverse = match view.options.keying {
        SnapshotKeying::Storage => view.resolver.inverse(view.rows),
        SnapshotKeying::Row => HashMap::new(),
    };
    let default_metric = view.columns.metrics().first().map(|m| m.to_string());

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let row_id = match view.options.keying {
            SnapshotKeying::Storage => inverse.get(&entry.row_key).cloned(),
            SnapshotKeying::Row => {
                let id = RowId::from(entry.row_key);
                view.rows.iter().any(|r| r.id == id).then_some(id)
            }
        };
        let Some(row_id) = row_id else {
            tracing::warn!(row_key = entry.row_key, "snapshot row not in catalogue");
            continue;
        };

        let column_key = match (entry.month, entry.unit_id) {
            (Some(month), _) => entry
                .metric
                .clone()
                .or_else(|| default_metric.clone())
                .map(|metric| ColumnKey::Period { month, metric }),
            (None, Some(unit_id)) => Some(ColumnKey::Unit(unit_id)),
            (None, None) => None,
        };
        let column = column_key
            .as_ref()
            .and_then(|key| view.columns.locate(key))
            .and_then(|idx| view.columns.get(idx));
        let Some(column) = column else {
            tracing::warn!(
                row_key = entry.row_key,
                month = ?entry.month,
                unit_id = ?entry.unit_id,
                "snapshot column not in grid"
            );
            continue;
        };

        out.push((
            row_id,
            column.id.clone(),
            wire_to_cell(&entry.amount, view.options.max_decimals),
        ));
    }
    out
}

/// Serializes the grid into bulk-upsert batches.
///
/// Explicit zeros are sent so an operator can clear a saved amount. Rows
/// with non-zero data or an edited price must resolve to a storage id, and
/// no two written rows may share one; otherwise the whole plan is refused
/// and every offending row is listed.
pub fn build_save_plan(
    key: PlanKey,
    grid: &GridModel,
    prices: &PriceBook,
    view: TableView<'_>,
) -> Result<SavePlan, EngineError> {
    let columns = view.columns;
    let mut unmapped: Vec<UnmappedRow> = Vec::new();
    let mut row_batch: Vec<RowUpsert> = Vec::new();
    let mut cell_batch: Vec<CellUpsert> = Vec::new();
    let mut price_batch: Vec<PriceUpsert> = Vec::new();
    let mut claims: BTreeMap<i64, Vec<UnmappedRow>> = BTreeMap::new();

    for row in view.rows {
        let storage_id = wire_row_key(row, view);
        let Some(values) = grid.row_values(&row.id) else {
            continue;
        };

        let present: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| numeric::is_present(v))
            .map(|(idx, v)| (idx, numeric::to_number(v)))
            .collect();
        let has_data = present.iter().any(|(_, n)| *n != 0.0);
        let price_raw = prices.raw(&row.id).filter(|raw| numeric::is_present(raw));

        let Some(storage_id) = storage_id else {
            if has_data || price_raw.is_some_and(numeric::is_significant) {
                unmapped.push(UnmappedRow {
                    row_id: row.id.to_string(),
                    label: row.label.clone(),
                });
            } else if !present.is_empty() {
                tracing::debug!(row = %row.id, "skipping unmapped row holding only zeros");
            }
            continue;
        };

        if price_raw.is_some() || !present.is_empty() {
            claims.entry(storage_id).or_default().push(UnmappedRow {
                row_id: row.id.to_string(),
                label: row.label.clone(),
            });
        }

        if let Some(raw) = price_raw {
            price_batch.push(PriceUpsert {
                storage_id,
                unit_price: numeric::to_number(raw),
            });
        }

        if present.is_empty() {
            continue;
        }

        match view.options.shape {
            SaveShape::RowUnits => {
                let mut unit_values = Vec::with_capacity(present.len());
                for (idx, amount) in &present {
                    let Some(column) = columns.get(*idx) else {
                        continue;
                    };
                    let ColumnKey::Unit(unit_id) = column.key else {
                        return Err(EngineError::Config(format!(
                            "row-shaped saves need unit columns, got \"{}\"",
                            column.id
                        )));
                    };
                    unit_values.push(UnitValue {
                        unit_id,
                        amount: *amount,
                    });
                }
                let comment = grid.comment(&row.id);
                row_batch.push(RowUpsert {
                    storage_id,
                    row_total: present.iter().map(|(_, n)| n).sum(),
                    unit_values,
                    comment: (!comment.is_empty()).then(|| comment.to_string()),
                });
            }
            SaveShape::FlatCells => {
                for (idx, amount) in &present {
                    let Some(column) = columns.get(*idx) else {
                        continue;
                    };
                    let (unit_id, month, metric) = match &column.key {
                        ColumnKey::Unit(unit_id) => (*unit_id, None, None),
                        ColumnKey::Period { month, metric } => {
                            (key.branch_id, Some(*month), Some(metric.clone()))
                        }
                    };
                    cell_batch.push(CellUpsert {
                        unit_id,
                        category_id: storage_id,
                        month,
                        metric,
                        amount: *amount,
                    });
                }
            }
        }
    }

    if !unmapped.is_empty() {
        return Err(EngineError::Unmapped(unmapped));
    }
    let shared: Vec<UnmappedRow> = claims
        .into_values()
        .filter(|rows| rows.len() > 1)
        .flatten()
        .collect();
    if !shared.is_empty() {
        return Err(EngineError::SharedStorage(shared));
    }

    let mut batches = Vec::new();
    if !price_batch.is_empty() {
        batches.push(SaveBatch::Prices(price_batch));
    }
    match view.options.shape {
        SaveShape::RowUnits => batches.push(SaveBatch::Rows(row_batch)),
        SaveShape::FlatCells => batches.push(SaveBatch::Cells(cell_batch)),
    }
    Ok(SavePlan { key, batches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::Column,
        resolver::MappingEntry,
    };

    const KEY: PlanKey = PlanKey {
        plan_id: 3,
        branch_id: 1,
    };

    fn options(shape: SaveShape) -> PersistOptions {
        PersistOptions {
            shape,
            keying: SnapshotKeying::Storage,
            max_decimals: 2,
        }
    }

    fn fixture() -> (Vec<Row>, ColumnSet, KeyResolver) {
        let rows = vec![
            Row::new("R1", "Fuel").with_group(2, 8).with_price(16.5),
            Row::new("R2", "Seeds").with_group(5, 8),
            Row::new("R3", "Unlisted"),
        ];
        let columns = ColumnSet::new(vec![Column::unit(10, "North"), Column::unit(11, "South")]);
        let resolver = KeyResolver::from_seed(&[
            MappingEntry {
                storage_id: 200,
                category_id: 2,
                group_id: 8,
            },
            MappingEntry {
                storage_id: 500,
                category_id: 5,
                group_id: 8,
            },
        ]);
        (rows, columns, resolver)
    }

    #[test]
    fn zero_cells_are_transmitted() {
        let (rows, columns, resolver) = fixture();
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::RowUnits),
        };
        let mut grid = GridModel::new(&rows, columns.as_slice());
        grid.set_cell(&rows[0].id, &columns.get(0).unwrap().id, "7").unwrap();
        grid.set_cell(&rows[0].id, &columns.get(0).unwrap().id, "0").unwrap();

        let plan = build_save_plan(KEY, &grid, &PriceBook::new(), view).unwrap();
        let SaveBatch::Rows(rows_out) = &plan.batches[0] else {
            panic!("expected row batch");
        };
        assert_eq!(rows_out.len(), 1);
        assert_eq!(rows_out[0].storage_id, 200);
        assert_eq!(
            rows_out[0].unit_values,
            vec![UnitValue {
                unit_id: 10,
                amount: 0.0
            }]
        );
    }

    #[test]
    fn unmapped_rows_with_data_fail_loud() {
        let (rows, columns, resolver) = fixture();
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::FlatCells),
        };
        let mut grid = GridModel::new(&rows, columns.as_slice());
        grid.set_cell(&rows[0].id, &columns.get(1).unwrap().id, "4").unwrap();
        grid.set_cell(&rows[2].id, &columns.get(1).unwrap().id, "9").unwrap();

        let err = build_save_plan(KEY, &grid, &PriceBook::new(), view).unwrap_err();
        assert_eq!(
            err,
            EngineError::Unmapped(vec![UnmappedRow {
                row_id: "R3".to_string(),
                label: "Unlisted".to_string(),
            }])
        );
    }

    #[test]
    fn unmapped_zero_rows_are_skipped() {
        let (rows, columns, resolver) = fixture();
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::FlatCells),
        };
        let mut grid = GridModel::new(&rows, columns.as_slice());
        grid.set_cell(&rows[2].id, &columns.get(0).unwrap().id, "0").unwrap();

        let plan = build_save_plan(KEY, &grid, &PriceBook::new(), view).unwrap();
        assert_eq!(plan.batches, vec![SaveBatch::Cells(Vec::new())]);
    }

    #[test]
    fn edited_prices_form_their_own_batch() {
        let (rows, columns, resolver) = fixture();
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::FlatCells),
        };
        let grid = GridModel::new(&rows, columns.as_slice());
        let mut prices = PriceBook::new();
        prices.set(&rows[1].id, "3.20");

        let plan = build_save_plan(KEY, &grid, &prices, view).unwrap();
        assert_eq!(
            plan.batches[0],
            SaveBatch::Prices(vec![PriceUpsert {
                storage_id: 500,
                unit_price: 3.2
            }])
        );
    }

    #[test]
    fn second_save_is_suppressed_while_busy() {
        let (rows, columns, resolver) = fixture();
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::RowUnits),
        };
        let grid = GridModel::new(&rows, columns.as_slice());
        let prices = PriceBook::new();
        let mut adapter = PersistenceAdapter::new();

        adapter.prepare_save(KEY, &grid, &prices, view).unwrap();
        assert_eq!(
            adapter.prepare_save(KEY, &grid, &prices, view).unwrap_err(),
            EngineError::SaveInProgress
        );
        assert_eq!(
            adapter.finish_save(KEY, Ok(())),
            SaveOutcome::Saved { reload: KEY }
        );
        assert!(adapter.prepare_save(KEY, &grid, &prices, view).is_ok());
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let (rows, columns, resolver) = fixture();
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::RowUnits),
        };
        let mut grid = GridModel::new(&rows, columns.as_slice());
        let mut adapter = PersistenceAdapter::new();

        let old = adapter.begin_load(KEY);
        let new = adapter.begin_load(PlanKey {
            plan_id: 3,
            branch_id: 2,
        });
        let entry = SnapshotEntry {
            unit_id: Some(10),
            row_key: 200,
            month: None,
            metric: None,
            amount: WireAmount::Number(5.0),
        };

        let outcome = adapter.apply_load(&old, Ok(vec![entry.clone()]), &mut grid, view);
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(grid.cell(&rows[0].id, &columns.get(0).unwrap().id), "");

        let outcome = adapter.apply_load(&new, Ok(vec![entry]), &mut grid, view);
        assert_eq!(
            outcome,
            LoadOutcome::Applied(SnapshotMerge {
                applied: 1,
                skipped: 0
            })
        );
        assert_eq!(grid.cell(&rows[0].id, &columns.get(0).unwrap().id), "5");
    }

    #[test]
    fn transport_failure_falls_back_to_blank() {
        let (rows, columns, resolver) = fixture();
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::RowUnits),
        };
        let mut grid = GridModel::new(&rows, columns.as_slice());
        grid.set_cell(&rows[0].id, &columns.get(0).unwrap().id, "8").unwrap();
        let mut adapter = PersistenceAdapter::new();

        let ticket = adapter.begin_load(KEY);
        let rejected = BackendError::Rejected {
            status: 500,
            message: "boom".to_string(),
        };
        let outcome = adapter.apply_load(&ticket, Err(rejected.clone()), &mut grid, view);
        assert_eq!(outcome, LoadOutcome::Failed(rejected));
        assert_eq!(grid.cell(&rows[0].id, &columns.get(0).unwrap().id), "8");

        let offline = BackendError::Transport("connection refused".to_string());
        let outcome = adapter.apply_load(&ticket, Err(offline.clone()), &mut grid, view);
        assert_eq!(outcome, LoadOutcome::Fallback(offline));
        assert_eq!(grid.cell(&rows[0].id, &columns.get(0).unwrap().id), "");
    }

    #[test]
    fn calendar_snapshot_maps_month_and_metric() {
        let rows = vec![Row::new(RowId::from(7), "Apples")];
        let columns = ColumnSet::new(vec![
            Column::period(1, "qty", "January"),
            Column::period(1, "price", "January"),
        ]);
        let resolver = KeyResolver::default();
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: PersistOptions {
                shape: SaveShape::FlatCells,
                keying: SnapshotKeying::Row,
                max_decimals: 2,
            },
        };
        let entries = vec![
            SnapshotEntry {
                unit_id: Some(1),
                row_key: 7,
                month: Some(1),
                metric: None,
                amount: WireAmount::Text("12.50".to_string()),
            },
            SnapshotEntry {
                unit_id: Some(1),
                row_key: 7,
                month: Some(1),
                metric: Some("price".to_string()),
                amount: WireAmount::Number(1.999),
            },
            SnapshotEntry {
                unit_id: Some(1),
                row_key: 8,
                month: Some(1),
                metric: None,
                amount: WireAmount::Number(1.0),
            },
        ];

        let cells = snapshot_cells(&entries, view);
        assert_eq!(
            cells,
            vec![
                (RowId::from(7), ColumnId::from("m01:qty"), "12.50".to_string()),
                (RowId::from(7), ColumnId::from("m01:price"), "1.99".to_string()),
            ]
        );
    }

    #[test]
    fn negative_amounts_keep_their_sign() {
        let (rows, columns, resolver) = fixture();
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::RowUnits),
        };
        let entries = vec![
            SnapshotEntry {
                unit_id: Some(10),
                row_key: 200,
                month: None,
                metric: None,
                amount: WireAmount::Number(-5.0),
            },
            SnapshotEntry {
                unit_id: Some(11),
                row_key: 200,
                month: None,
                metric: None,
                amount: WireAmount::Text("-1.25".to_string()),
            },
        ];
        let mut grid = GridModel::new(&rows, columns.as_slice());
        grid.load_snapshot(snapshot_cells(&entries, view));
        assert_eq!(grid.cell(&rows[0].id, &columns.get(0).unwrap().id), "-5");
        assert_eq!(grid.cell(&rows[0].id, &columns.get(1).unwrap().id), "-1.25");

        let plan = build_save_plan(KEY, &grid, &PriceBook::new(), view).unwrap();
        let SaveBatch::Rows(rows_out) = &plan.batches[0] else {
            panic!("expected row batch");
        };
        assert_eq!(
            rows_out[0].unit_values,
            vec![
                UnitValue {
                    unit_id: 10,
                    amount: -5.0
                },
                UnitValue {
                    unit_id: 11,
                    amount: -1.25
                },
            ]
        );
        assert_eq!(rows_out[0].row_total, -6.25);
    }

    #[test]
    fn rows_sharing_a_storage_id_are_refused() {
        let mut rows = vec![
            Row::new("a", "Diesel").with_group(2, 1),
            Row::new("b", "Petrol").with_group(2, 1),
        ];
        let columns = ColumnSet::new(vec![Column::unit(10, "North")]);
        let resolver = KeyResolver::from_seed(&[MappingEntry {
            storage_id: 50,
            category_id: 2,
            group_id: 1,
        }]);
        let mut grid = GridModel::new(&rows, columns.as_slice());
        grid.set_cell(&rows[0].id, &columns.get(0).unwrap().id, "3").unwrap();
        grid.set_cell(&rows[1].id, &columns.get(0).unwrap().id, "7").unwrap();

        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::RowUnits),
        };
        let err = build_save_plan(KEY, &grid, &PriceBook::new(), view).unwrap_err();
        assert_eq!(
            err,
            EngineError::SharedStorage(vec![
                UnmappedRow {
                    row_id: "a".to_string(),
                    label: "Diesel".to_string(),
                },
                UnmappedRow {
                    row_id: "b".to_string(),
                    label: "Petrol".to_string(),
                },
            ])
        );

        rows[1] = rows[1].clone().with_storage_override(51);
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: options(SaveShape::RowUnits),
        };
        let plan = build_save_plan(KEY, &grid, &PriceBook::new(), view).unwrap();
        let SaveBatch::Rows(rows_out) = &plan.batches[0] else {
            panic!("expected row batch");
        };
        let ids: Vec<i64> = rows_out.iter().map(|r| r.storage_id).collect();
        assert_eq!(ids, vec![50, 51]);
    }

    #[test]
    fn row_keyed_saves_send_the_row_id() {
        let rows = vec![Row::new(RowId::from(5), "Apples").with_group(5, 1)];
        let columns = ColumnSet::new(vec![Column::period(1, "qty", "January")]);
        let resolver = KeyResolver::from_seed(&[MappingEntry {
            storage_id: 99,
            category_id: 5,
            group_id: 1,
        }]);
        let view = TableView {
            rows: &rows,
            columns: &columns,
            resolver: &resolver,
            options: PersistOptions {
                shape: SaveShape::FlatCells,
                keying: SnapshotKeying::Row,
                max_decimals: 2,
            },
        };
        let mut grid = GridModel::new(&rows, columns.as_slice());
        grid.set_cell(&rows[0].id, &columns.get(0).unwrap().id, "30").unwrap();

        let plan = build_save_plan(KEY, &grid, &PriceBook::new(), view).unwrap();
        assert_eq!(
            plan.batches,
            vec![SaveBatch::Cells(vec![CellUpsert {
                unit_id: KEY.branch_id,
                category_id: 5,
                month: Some(1),
                metric: Some("qty".to_string()),
                amount: 30.0,
            }])]
        );
    }
}
