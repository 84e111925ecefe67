use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

/// Identifier of a grid row (a product or a cost category).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for RowId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a flattened grid column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Semantic key used to look up a storage id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub category_id: i64,
    pub group_id: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub label: String,
    pub group_key: Option<GroupKey>,
    /// Explicit storage id for rows that share a category with another row.
    pub storage_override: Option<i64>,
    pub unit_label: Option<String>,
    pub unit_price: f64,
    pub comment: Option<String>,
}

impl Row {
    pub fn new(id: impl Into<RowId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            group_key: None,
            storage_override: None,
            unit_label: None,
            unit_price: 0.0,
            comment: None,
        }
    }

    #[must_use]
    pub fn with_group(mut self, category_id: i64, group_id: i64) -> Self {
        self.group_key = Some(GroupKey {
            category_id,
            group_id,
        });
        self
    }

    #[must_use]
    pub fn with_storage_override(mut self, storage_id: i64) -> Self {
        self.storage_override = Some(storage_id);
        self
    }

    #[must_use]
    pub fn with_price(mut self, unit_price: f64) -> Self {
        self.unit_price = unit_price;
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit_label: impl Into<String>) -> Self {
        self.unit_label = Some(unit_label.into());
        self
    }
}

/// What a column measures.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    /// A distribution unit of the selected branch.
    Unit(i64),
    /// A fiscal month (1..=12) combined with a sub-metric.
    Period { month: u32, metric: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    pub label: String,
    pub short_label: String,
    pub key: ColumnKey,
}

impl Column {
    pub fn unit(unit_id: i64, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: ColumnId::new(format!("u{unit_id}")),
            short_label: short_label(&label),
            label,
            key: ColumnKey::Unit(unit_id),
        }
    }

    pub fn period(month: u32, metric: impl Into<String>, label: impl Into<String>) -> Self {
        let metric = metric.into();
        let label = label.into();
        Self {
            id: ColumnId::new(format!("m{month:02}:{metric}")),
            short_label: short_label(&label),
            label,
            key: ColumnKey::Period { month, metric },
        }
    }

    pub fn metric(&self) -> Option<&str> {
        match &self.key {
            ColumnKey::Period { metric, .. } => Some(metric.as_str()),
            ColumnKey::Unit(_) => None,
        }
    }
}

fn short_label(label: &str) -> String {
    label.chars().take(3).collect()
}

/// Ordered set of flattened columns with lookup by id and compound key.
#[derive(Clone, Debug, Default)]
pub struct ColumnSet {
    columns: Vec<Column>,
    by_id: HashMap<ColumnId, usize>,
    by_key: HashMap<ColumnKey, usize>,
}

impl ColumnSet {
    pub fn new(columns: Vec<Column>) -> Self {
        let mut by_id = HashMap::with_capacity(columns.len());
        let mut by_key = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            by_id.entry(column.id.clone()).or_insert(idx);
            by_key.entry(column.key.clone()).or_insert(idx);
        }
        Self {
            columns,
            by_id,
            by_key,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    pub fn as_slice(&self) -> &[Column] {
        &self.columns
    }

    /// Column at a flattened index.
    pub fn get(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn index_of(&self, id: &ColumnId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, id: &ColumnId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Flattened index of a compound or unit key.
    pub fn locate(&self, key: &ColumnKey) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    /// Distinct sub-metrics in column order.
    pub fn metrics(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for metric in self.columns.iter().filter_map(Column::metric) {
            if !out.contains(&metric) {
                out.push(metric);
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
