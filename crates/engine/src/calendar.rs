//! Builds rows and columns from catalogue data.

use api_types::catalogue::{ProductView, UnitView};
use chrono::Month;
use serde::{Deserialize, Serialize};

use crate::model::{Column, GroupKey, Row, RowId};

/// A fixed sub-measure recorded for every month (e.g. quantity, price).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMetric {
    pub id: String,
    pub label: String,
}

impl SubMetric {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Twelve fiscal months starting at `first_month`, crossed with `metrics`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalCalendar {
    pub first_month: u32,
    pub metrics: Vec<SubMetric>,
}

impl Default for FiscalCalendar {
    fn default() -> Self {
        Self {
            first_month: 1,
            metrics: vec![SubMetric::new("qty", "Qty")],
        }
    }
}

impl FiscalCalendar {
    /// Calendar months (1..=12) in fiscal order.
    pub fn months(&self) -> Vec<u32> {
        let first = self.first_month.clamp(1, 12);
        (0..12).map(|offset| (first - 1 + offset) % 12 + 1).collect()
    }

    /// Flattened columns, month-major.
    pub fn columns(&self) -> Vec<Column> {
        let mut out = Vec::with_capacity(12 * self.metrics.len());
        for month in self.months() {
            let name = month_name(month);
            let abbrev: String = name.chars().take(3).collect();
            for metric in &self.metrics {
                let mut column =
                    Column::period(month, metric.id.clone(), format!("{name} {}", metric.label));
                column.short_label = format!("{abbrev} {}", metric.label);
                out.push(column);
            }
        }
        out
    }
}

fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("?")
}

/// One column per distribution unit, in lookup order.
pub fn unit_columns(units: &[UnitView]) -> Vec<Column> {
    units.iter().map(|u| Column::unit(u.id, u.name.clone())).collect()
}

/// Which catalogue price feeds the monetary totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Sell,
    Buy,
    #[default]
    None,
}

/// Turns catalogue entries into grid rows.
///
/// The category defaults to the entry id; `default_group` applies when the
/// entry carries no group of its own.
pub fn catalogue_rows(
    products: &[ProductView],
    price: PriceSource,
    default_group: Option<i64>,
) -> Vec<Row> {
    products
        .iter()
        .map(|p| {
            let unit_price = match price {
                PriceSource::Sell => p.sell_price,
                PriceSource::Buy => p.buy_price,
                PriceSource::None => None,
            };
            Row {
                id: RowId::from(p.id),
                label: p.name.clone(),
                group_key: p.group_id.or(default_group).map(|group_id| GroupKey {
                    category_id: p.category_id.unwrap_or(p.id),
                    group_id,
                }),
                storage_override: p.storage_id,
                unit_label: p.unit.clone(),
                unit_price: unit_price.unwrap_or(0.0),
                comment: p.comment.clone(),
            }
        })
        .collect()
}
