//! Storage id lookup for plan rows.
//!
//! The planning service stores cost values against its own row ids. The seed
//! table maps `(category, group)` pairs onto those ids. Seeds are known to
//! contain duplicate pairs; the first occurrence always wins so that saves
//! stay deterministic.

use std::collections::{HashMap, hash_map::Entry};

use serde::{Deserialize, Serialize};

use crate::model::{GroupKey, Row, RowId};

/// One line of the static mapping seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub storage_id: i64,
    pub category_id: i64,
    pub group_id: i64,
}

#[derive(Clone, Debug, Default)]
pub struct KeyResolver {
    by_key: HashMap<GroupKey, i64>,
}

impl KeyResolver {
    pub fn from_seed<'a>(seed: impl IntoIterator<Item = &'a MappingEntry>) -> Self {
        let mut by_key = HashMap::new();
        for (position, entry) in seed.into_iter().enumerate() {
            let key = GroupKey {
                category_id: entry.category_id,
                group_id: entry.group_id,
            };
            match by_key.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(entry.storage_id);
                }
                Entry::Occupied(kept) => {
                    tracing::debug!(
                        position,
                        category_id = entry.category_id,
                        group_id = entry.group_id,
                        kept = *kept.get(),
                        ignored = entry.storage_id,
                        "duplicate mapping seed entry ignored"
                    );
                }
            }
        }
        Self { by_key }
    }

    /// Parses a JSON array of [`MappingEntry`].
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let seed: Vec<MappingEntry> = serde_json::from_str(raw)?;
        Ok(Self::from_seed(&seed))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn resolve(&self, category_id: i64, group_id: i64) -> Option<i64> {
        self.by_key
            .get(&GroupKey {
                category_id,
                group_id,
            })
            .copied()
    }

    /// Storage id for a row; an explicit override bypasses the pair lookup.
    pub fn resolve_row(&self, row: &Row) -> Option<i64> {
        if let Some(id) = row.storage_override {
            return Some(id);
        }
        let key = row.group_key?;
        self.resolve(key.category_id, key.group_id)
    }

    /// Maps storage ids back to rows. The first row claiming an id keeps it.
    pub fn inverse(&self, rows: &[Row]) -> HashMap<i64, RowId> {
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(storage_id) = self.resolve_row(row) {
                out.entry(storage_id).or_insert_with(|| row.id.clone());
            }
        }
        out
    }
}
