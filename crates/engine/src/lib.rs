//! Data-entry engine for plan matrices.
//!
//! A plan matrix is a grid of rows (products, cost categories) against
//! columns (distribution units, or fiscal months × sub-metrics). Operators
//! type values cell by cell, see totals recompute live, and submit the grid
//! to the planning service in bulk.
//!
//! The building blocks, leaves first:
//!
//! - [`numeric`]: sanitizing and formatting of cell text.
//! - [`KeyResolver`]: `(category, group)` → storage id.
//! - [`GridModel`]: the cell map.
//! - [`aggregate`]: row, column and grand totals.
//! - [`NavigationController`]: the keyboard cursor.
//! - [`ViewportSync`]: scroll-into-view and footer alignment.
//! - [`PersistenceAdapter`]: snapshot loading and bulk saves.
//!
//! [`PlanTable`] wires them together for one screen.
pub use aggregate::Totals;
pub use calendar::{FiscalCalendar, PriceSource, SubMetric};
pub use error::{BackendError, EngineError, UnmappedRow};
pub use grid::{Confirm, GridModel, PriceBook, SnapshotMerge};
pub use model::{Column, ColumnId, ColumnKey, ColumnSet, GroupKey, Row, RowId};
pub use navigation::{CellPos, Direction, NavigationController};
pub use persistence::{
    LoadOutcome, LoadTicket, PersistenceAdapter, PlanKey, PlanningBackend, SaveBatch, SaveOutcome,
    SavePlan, SaveShape, SnapshotKeying,
};
pub use resolver::{KeyResolver, MappingEntry};
pub use table::{Dimension, Fetch, PlanTable, TableSpec};
pub use viewport::{Bounds, ColumnLayout, FrozenExtent, ScrollOffset, ViewportSync};

pub mod aggregate;
pub mod calendar;
mod error;
pub mod grid;
pub mod model;
pub mod navigation;
pub mod numeric;
pub mod persistence;
pub mod resolver;
pub mod table;
pub mod viewport;
