//! One plan matrix screen.
//!
//! [`PlanTable`] is instantiated per screen with a [`TableSpec`], a mapping
//! seed, and catalogue data as it arrives. It owns the grid, the cursor, the
//! scroll state and the persistence bookkeeping; totals are recomputed after
//! every mutation.

use api_types::{
    catalogue::{ProductView, UnitView},
    snapshot::SnapshotEntry,
};
use serde::{Deserialize, Serialize};

use crate::{
    BackendError, EngineError,
    aggregate::{self, Totals},
    calendar::{self, FiscalCalendar, PriceSource},
    grid::{Confirm, GridModel, PriceBook},
    model::{Column, ColumnSet, Row},
    navigation::{CellPos, Direction, NavigationController},
    numeric,
    persistence::{
        LoadOutcome, LoadTicket, PersistOptions, PersistenceAdapter, PlanKey, PlanningBackend,
        SaveOutcome, SavePlan, SaveShape, SnapshotKeying, TableView,
    },
    resolver::KeyResolver,
    viewport::{Bounds, ColumnLayout, FrozenExtent, ScrollOffset, ViewportSync},
};

/// Where the columns of a table come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Distribution units of the selected branch, loaded per branch.
    #[default]
    Units,
    /// Fiscal months × sub-metrics, fixed.
    Calendar,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSpec {
    pub dimension: Dimension,
    pub calendar: FiscalCalendar,
    pub shape: SaveShape,
    pub keying: SnapshotKeying,
    pub price_source: PriceSource,
    pub editable_prices: bool,
    pub max_decimals: usize,
    /// Group applied to catalogue rows that carry none.
    pub default_group: Option<i64>,
    /// Sub-metrics shown but never enterable.
    pub locked_metrics: Vec<String>,
}

impl Default for TableSpec {
    fn default() -> Self {
        Self {
            dimension: Dimension::Units,
            calendar: FiscalCalendar::default(),
            shape: SaveShape::RowUnits,
            keying: SnapshotKeying::Storage,
            price_source: PriceSource::None,
            editable_prices: false,
            max_decimals: 2,
            default_group: None,
            locked_metrics: Vec::new(),
        }
    }
}

/// Requests the host must issue after a selection change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fetch {
    /// Units lookup for this branch.
    pub units: Option<i64>,
    /// Row catalogue for this plan.
    pub rows: Option<i64>,
    /// Snapshot load, when rows and columns are already known.
    pub snapshot: Option<LoadTicket>,
}

#[derive(Debug)]
pub struct PlanTable {
    spec: TableSpec,
    resolver: KeyResolver,
    key: Option<PlanKey>,
    rows: Vec<Row>,
    columns: ColumnSet,
    rows_ready: bool,
    columns_ready: bool,
    grid: GridModel,
    prices: PriceBook,
    totals: Totals,
    nav: NavigationController,
    viewport: ViewportSync,
    persistence: PersistenceAdapter,
}

impl PlanTable {
    pub fn new(spec: TableSpec, resolver: KeyResolver) -> Self {
        let (columns, columns_ready) = match spec.dimension {
            Dimension::Calendar => (ColumnSet::new(spec.calendar.columns()), true),
            Dimension::Units => (ColumnSet::default(), false),
        };
        let mut table = Self {
            spec,
            resolver,
            key: None,
            rows: Vec::new(),
            columns,
            rows_ready: false,
            columns_ready,
            grid: GridModel::default(),
            prices: PriceBook::new(),
            totals: Totals::default(),
            nav: NavigationController::default(),
            viewport: ViewportSync::new(),
            persistence: PersistenceAdapter::new(),
        };
        table.rebuild();
        table
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn key(&self) -> Option<PlanKey> {
        self.key
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn prices(&self) -> &PriceBook {
        &self.prices
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn cursor(&self) -> CellPos {
        self.nav.cursor()
    }

    pub fn viewport(&self) -> &ViewportSync {
        &self.viewport
    }

    pub fn is_saving(&self) -> bool {
        self.persistence.is_saving()
    }

    /// Cells are enterable once the plan is selected and both the row
    /// catalogue and the columns have arrived.
    pub fn is_editable(&self) -> bool {
        self.key.is_some() && self.rows_ready && self.columns_ready
    }

    pub fn is_dirty(&self) -> bool {
        self.grid.is_dirty() || !self.prices.is_empty()
    }

    /// Whether the cell at `pos` accepts input right now.
    pub fn is_enterable(&self, pos: CellPos) -> bool {
        self.is_editable() && self.nav.is_registered(pos)
    }

    fn column_enabled(&self, col: usize) -> bool {
        self.columns
            .get(col)
            .and_then(Column::metric)
            .is_none_or(|metric| !self.spec.locked_metrics.iter().any(|m| m == metric))
    }

    /// Rebuilds grid and cursor from the current rows and columns.
    fn rebuild(&mut self) {
        self.grid = GridModel::new(&self.rows, self.columns.as_slice());
        self.prices.clear();
        self.nav.resize(self.rows.len(), self.columns.len());
        self.nav.clear_targets();
        if self.is_editable() {
            let enabled: Vec<bool> = (0..self.columns.len())
                .map(|col| self.column_enabled(col))
                .collect();
            self.nav.register_all(|col| enabled[col]);
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        self.totals = aggregate::compute(
            &self.rows,
            self.columns.as_slice(),
            &self.grid,
            &self.prices,
        );
    }

    fn begin_load_if_ready(&mut self) -> Option<LoadTicket> {
        let key = self.key?;
        self.is_editable().then(|| self.persistence.begin_load(key))
    }

    /// Switches to another (plan, branch) pair.
    ///
    /// Outstanding loads for the previous pair become stale. The returned
    /// [`Fetch`] lists the lookups to issue.
    pub fn select(&mut self, key: PlanKey) -> Fetch {
        let previous = self.key;
        self.key = Some(key);
        self.persistence.detach();

        let mut fetch = Fetch::default();
        if previous.map(|k| k.plan_id) != Some(key.plan_id) {
            self.rows.clear();
            self.rows_ready = false;
            fetch.rows = Some(key.plan_id);
        }
        if self.spec.dimension == Dimension::Units
            && previous.map(|k| k.branch_id) != Some(key.branch_id)
        {
            self.columns = ColumnSet::default();
            self.columns_ready = false;
            fetch.units = Some(key.branch_id);
        }

        tracing::info!(plan_id = key.plan_id, branch_id = key.branch_id, "plan selected");
        self.rebuild();
        fetch.snapshot = self.begin_load_if_ready();
        fetch
    }

    /// Installs the units of `branch_id`. Ignored if another branch has been
    /// selected since the lookup started.
    pub fn set_units(&mut self, branch_id: i64, units: &[UnitView]) -> Option<LoadTicket> {
        if self.spec.dimension != Dimension::Units
            || self.key.map(|k| k.branch_id) != Some(branch_id)
        {
            tracing::debug!(branch_id, "discarding stale units");
            return None;
        }
        self.columns = ColumnSet::new(calendar::unit_columns(units));
        self.columns_ready = true;
        self.rebuild();
        self.begin_load_if_ready()
    }

    /// Installs the row catalogue of `plan_id`.
    pub fn set_catalogue(&mut self, plan_id: i64, products: &[ProductView]) -> Option<LoadTicket> {
        if self.key.map(|k| k.plan_id) != Some(plan_id) {
            tracing::debug!(plan_id, "discarding stale catalogue");
            return None;
        }
        self.rows =
            calendar::catalogue_rows(products, self.spec.price_source, self.spec.default_group);
        self.rows_ready = true;
        self.rebuild();
        self.begin_load_if_ready()
    }

    /// Starts a fresh snapshot load for the current pair.
    pub fn reload(&mut self) -> Option<LoadTicket> {
        self.begin_load_if_ready()
    }

    pub fn apply_snapshot(
        &mut self,
        ticket: &LoadTicket,
        result: Result<Vec<SnapshotEntry>, BackendError>,
    ) -> LoadOutcome {
        let view = table_view(&self.spec, &self.rows, &self.columns, &self.resolver);
        let outcome = self.persistence.apply_load(ticket, result, &mut self.grid, view);
        self.after_load(&outcome);
        outcome
    }

    fn after_load(&mut self, outcome: &LoadOutcome) {
        if matches!(outcome, LoadOutcome::Applied(_) | LoadOutcome::Fallback(_)) {
            self.prices.clear();
            self.recompute();
        }
    }

    fn ensure_editable(&self) -> Result<(), EngineError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(EngineError::NotReady("catalogue still loading".to_string()))
        }
    }

    fn cursor_target(&self) -> Result<(usize, usize), EngineError> {
        self.ensure_editable()?;
        let pos = self.nav.cursor();
        if !self.nav.is_registered(pos) {
            return Err(EngineError::NotReady(format!("cell {} is read-only", pos.key())));
        }
        Ok((pos.row, pos.col))
    }

    /// Writes `raw` (sanitized) into the cell at `pos`.
    pub fn set_value(&mut self, pos: CellPos, raw: &str) -> Result<(), EngineError> {
        let value = numeric::sanitize(raw, self.spec.max_decimals);
        self.write_cell(pos, value)
    }

    fn write_cell(&mut self, pos: CellPos, value: String) -> Result<(), EngineError> {
        self.ensure_editable()?;
        if !self.nav.is_registered(pos) {
            return Err(EngineError::UnknownCell(pos.key()));
        }
        let row = self
            .rows
            .get(pos.row)
            .ok_or_else(|| EngineError::UnknownCell(pos.key()))?;
        let column = self
            .columns
            .get(pos.col)
            .ok_or_else(|| EngineError::UnknownCell(pos.key()))?;
        self.grid.set_cell(&row.id, &column.id, value)?;
        self.recompute();
        Ok(())
    }

    /// Appends a typed character to the focused cell. A sign loaded from
    /// the service is kept.
    pub fn type_char(&mut self, ch: char) -> Result<(), EngineError> {
        let (row, col) = self.cursor_target()?;
        let mut raw = self.grid.cell_at(row, col).to_string();
        raw.push(ch);
        let value = numeric::sanitize_signed(&raw, self.spec.max_decimals);
        self.write_cell(CellPos::new(row, col), value)
    }

    /// Removes the last character of the focused cell.
    pub fn backspace(&mut self) -> Result<(), EngineError> {
        let (row, col) = self.cursor_target()?;
        let mut raw = self.grid.cell_at(row, col).to_string();
        raw.pop();
        let value = numeric::sanitize_signed(&raw, self.spec.max_decimals);
        self.write_cell(CellPos::new(row, col), value)
    }

    pub fn clear_cell(&mut self) -> Result<(), EngineError> {
        let (row, col) = self.cursor_target()?;
        self.set_value(CellPos::new(row, col), "")
    }

    pub fn set_price(&mut self, row: usize, raw: &str) -> Result<(), EngineError> {
        self.ensure_editable()?;
        if !self.spec.editable_prices {
            return Err(EngineError::Config("prices are read-only for this table".to_string()));
        }
        let row = self
            .rows
            .get(row)
            .ok_or_else(|| EngineError::UnknownRow(row.to_string()))?;
        self.prices
            .set(&row.id, numeric::sanitize(raw, self.spec.max_decimals));
        self.recompute();
        Ok(())
    }

    pub fn set_comment(&mut self, row: usize, comment: &str) -> Result<(), EngineError> {
        self.ensure_editable()?;
        let row = self
            .rows
            .get(row)
            .ok_or_else(|| EngineError::UnknownRow(row.to_string()))?;
        self.grid.set_comment(&row.id, comment.trim())
    }

    /// Clears every value, price and comment.
    pub fn reset(&mut self, confirm: Confirm) {
        tracing::info!("plan matrix reset");
        self.grid.reset(confirm);
        self.prices.clear();
        self.recompute();
    }

    pub fn move_cursor(&mut self, direction: Direction) -> Option<CellPos> {
        self.nav.move_focus(direction)
    }

    pub fn focus(&mut self, pos: CellPos) -> Option<CellPos> {
        self.nav.focus(pos)
    }

    /// Scrolls so the cursor is visible; see [`ViewportSync::ensure_visible`].
    pub fn scroll_to_cursor(
        &mut self,
        layout: &ColumnLayout,
        container: Bounds,
        frozen: FrozenExtent,
    ) -> ScrollOffset {
        self.viewport.set_limits(
            layout.content_width(),
            self.rows.len() as f64 * layout.row_height(),
            container,
            frozen,
        );
        let pos = self.nav.cursor();
        self.viewport.ensure_cell_visible(layout, pos, container, frozen)
    }

    pub fn on_body_scroll(&mut self, left: f64, top: f64) {
        self.viewport.on_body_scroll(left, top);
    }

    /// Builds the save batches; marks the table busy until
    /// [`PlanTable::finish_save`].
    pub fn prepare_save(&mut self) -> Result<SavePlan, EngineError> {
        self.ensure_editable()?;
        let key = self
            .key
            .ok_or_else(|| EngineError::Config("no plan selected".to_string()))?;
        let view = table_view(&self.spec, &self.rows, &self.columns, &self.resolver);
        let plan = self
            .persistence
            .prepare_save(key, &self.grid, &self.prices, view)?;
        tracing::info!(
            plan_id = key.plan_id,
            branch_id = key.branch_id,
            batches = plan.batches.len(),
            "save prepared"
        );
        Ok(plan)
    }

    /// Completes a save. On success returns the reload ticket for the pair
    /// that is still selected (none if the operator switched meanwhile).
    pub fn finish_save(
        &mut self,
        key: PlanKey,
        result: Result<(), BackendError>,
    ) -> Result<Option<LoadTicket>, BackendError> {
        match self.persistence.finish_save(key, result) {
            SaveOutcome::Saved { reload } => {
                if self.key == Some(reload) {
                    Ok(self.begin_load_if_ready())
                } else {
                    Ok(None)
                }
            }
            SaveOutcome::Failed(err) => Err(err),
        }
    }

    /// Loads the snapshot of the selected pair through `backend`.
    pub async fn refresh<B: PlanningBackend>(&mut self, backend: &B) -> Option<LoadOutcome> {
        let key = self.key.filter(|_| self.is_editable())?;
        let view = table_view(&self.spec, &self.rows, &self.columns, &self.resolver);
        let outcome = self
            .persistence
            .load(backend, key, &mut self.grid, view)
            .await;
        self.after_load(&outcome);
        Some(outcome)
    }

    /// Saves through `backend` and reloads the persisted state.
    pub async fn save<B: PlanningBackend>(
        &mut self,
        backend: &B,
    ) -> Result<LoadOutcome, EngineError> {
        let plan = self.prepare_save()?;
        let view = table_view(&self.spec, &self.rows, &self.columns, &self.resolver);
        let outcome = self
            .persistence
            .save(backend, plan, &mut self.grid, view)
            .await?;
        self.after_load(&outcome);
        Ok(outcome)
    }
}

fn table_view<'a>(
    spec: &TableSpec,
    rows: &'a [Row],
    columns: &'a ColumnSet,
    resolver: &'a KeyResolver,
) -> TableView<'a> {
    TableView {
        rows,
        columns,
        resolver,
        options: PersistOptions {
            shape: spec.shape,
            keying: spec.keying,
            max_decimals: spec.max_decimals,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MappingEntry;

    fn units() -> Vec<UnitView> {
        vec![
            UnitView {
                id: 1,
                name: "North".to_string(),
            },
            UnitView {
                id: 2,
                name: "South".to_string(),
            },
        ]
    }

    fn products() -> Vec<ProductView> {
        vec![ProductView {
            id: 2,
            name: "Fertilizer".to_string(),
            unit: Some("kg".to_string()),
            sell_price: Some(16.5),
            buy_price: None,
            comment: None,
            category_id: None,
            group_id: None,
            storage_id: None,
        }]
    }

    fn table() -> PlanTable {
        let spec = TableSpec {
            price_source: PriceSource::Sell,
            default_group: Some(8),
            ..TableSpec::default()
        };
        PlanTable::new(
            spec,
            KeyResolver::from_seed(&[MappingEntry {
                storage_id: 40,
                category_id: 2,
                group_id: 8,
            }]),
        )
    }

    const KEY: PlanKey = PlanKey {
        plan_id: 1,
        branch_id: 5,
    };

    #[test]
    fn grid_is_read_only_until_units_and_rows_arrive() {
        let mut table = table();
        let fetch = table.select(KEY);
        assert_eq!(fetch.units, Some(5));
        assert_eq!(fetch.rows, Some(1));
        assert_eq!(fetch.snapshot, None);
        assert!(!table.is_editable());
        assert!(table.type_char('1').is_err());

        assert_eq!(table.set_units(5, &units()), None);
        assert!(!table.is_editable());
        let ticket = table.set_catalogue(1, &products());
        assert!(ticket.is_some());
        assert!(table.is_editable());
        assert!(table.type_char('1').is_ok());
    }

    #[test]
    fn typing_updates_totals_live() {
        let mut table = table();
        table.select(KEY);
        table.set_units(5, &units());
        table.set_catalogue(1, &products());

        for ch in "10".chars() {
            table.type_char(ch).unwrap();
        }
        let row_id = table.rows()[0].id.clone();
        assert_eq!(table.totals().row(&row_id), 10.0);
        assert_eq!(table.totals().grand_amount, 165.0);

        table.clear_cell().unwrap();
        for ch in "2.5".chars() {
            table.type_char(ch).unwrap();
        }
        assert_eq!(table.totals().grand, 2.5);
        assert_eq!(table.totals().grand_amount, 41.25);

        table.backspace().unwrap();
        assert_eq!(table.grid().cell_at(0, 0), "2.");
        assert_eq!(table.totals().grand, 2.0);
    }

    #[test]
    fn stale_units_are_ignored_after_branch_switch() {
        let mut table = table();
        table.select(KEY);
        table.select(PlanKey {
            plan_id: 1,
            branch_id: 6,
        });
        assert_eq!(table.set_units(5, &units()), None);
        assert!(table.columns().is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut table = table();
        table.select(KEY);
        table.set_units(5, &units());
        table.set_catalogue(1, &products());
        table.type_char('4').unwrap();
        assert!(table.is_dirty());

        table.reset(Confirm);
        assert_eq!(table.totals().grand, 0.0);
        assert!(!table.is_dirty());
    }

    #[test]
    fn locked_metrics_are_not_enterable() {
        let spec = TableSpec {
            dimension: Dimension::Calendar,
            calendar: FiscalCalendar {
                first_month: 1,
                metrics: vec![
                    calendar::SubMetric::new("qty", "Qty"),
                    calendar::SubMetric::new("value", "Value"),
                ],
            },
            keying: SnapshotKeying::Row,
            shape: SaveShape::FlatCells,
            locked_metrics: vec!["value".to_string()],
            ..TableSpec::default()
        };
        let mut table = PlanTable::new(spec, KeyResolver::default());
        let fetch = table.select(KEY);
        assert_eq!(fetch.units, None);
        table.set_catalogue(1, &products());

        assert_eq!(table.move_cursor(Direction::Right), None);
        assert_eq!(table.move_cursor(Direction::Down), None);
        assert!(table.set_value(CellPos::new(0, 1), "3").is_err());
        assert!(table.set_value(CellPos::new(0, 2), "3").is_ok());
    }
}
