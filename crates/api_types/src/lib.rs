use serde::{Deserialize, Serialize};

/// Amount as returned by the planning service.
///
/// Older endpoints serialize decimals as strings (`"12.50"`), newer ones as
/// JSON numbers. Both are accepted on input; output always uses numbers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireAmount {
    Number(f64),
    Text(String),
}

impl Default for WireAmount {
    fn default() -> Self {
        Self::Number(0.0)
    }
}

pub mod catalogue {
    use super::*;

    /// A distribution unit of a branch (flat column dimension).
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct UnitView {
        pub id: i64,
        pub name: String,
    }

    /// A product or cost category row as listed for a plan.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct ProductView {
        pub id: i64,
        pub name: String,
        #[serde(default)]
        pub unit: Option<String>,
        #[serde(default)]
        pub sell_price: Option<f64>,
        #[serde(default)]
        pub buy_price: Option<f64>,
        #[serde(default)]
        pub comment: Option<String>,
        /// Cost category the row belongs to, when the plan groups rows.
        #[serde(default)]
        pub category_id: Option<i64>,
        #[serde(default)]
        pub group_id: Option<i64>,
        /// Explicit storage id, bypassing the category lookup.
        #[serde(default)]
        pub storage_id: Option<i64>,
    }
}

pub mod snapshot {
    use super::*;

    /// One saved value of a plan matrix.
    ///
    /// Cost tables key the column by `unit_id`, sale goals by `branch_id`
    /// plus `month`; rows are keyed by `category_id` (storage id) or
    /// `product_id` (row id) depending on the table.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct SnapshotEntry {
        #[serde(default, alias = "branch_id")]
        pub unit_id: Option<i64>,
        #[serde(alias = "category_id", alias = "product_id")]
        pub row_key: i64,
        #[serde(default)]
        pub month: Option<u32>,
        #[serde(default)]
        pub metric: Option<String>,
        #[serde(default)]
        pub amount: WireAmount,
    }
}

pub mod save {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct UnitValue {
        pub unit_id: i64,
        pub amount: f64,
    }

    /// Row-shaped upsert: one entry per storage row with its per-unit values.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct RowUpsert {
        pub storage_id: i64,
        pub unit_values: Vec<UnitValue>,
        pub row_total: f64,
        pub comment: Option<String>,
    }

    /// Flat cell upsert, used by month-based tables.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct CellUpsert {
        pub unit_id: i64,
        pub category_id: i64,
        pub month: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub metric: Option<String>,
        pub amount: f64,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct PriceUpsert {
        pub storage_id: i64,
        pub unit_price: f64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RowsSave {
        pub plan_id: i64,
        pub branch_id: i64,
        pub rows: Vec<RowUpsert>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CellsSave {
        pub plan_id: i64,
        pub branch_id: i64,
        pub cells: Vec<CellUpsert>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PricesSave {
        pub plan_id: i64,
        pub prices: Vec<PriceUpsert>,
    }
}

/// Error body returned by the planning service on non-2xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(alias = "message", alias = "detail")]
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_entry_accepts_both_key_spellings() {
        let cost: snapshot::SnapshotEntry =
            serde_json::from_str(r#"{"unit_id": 4, "category_id": 23, "amount": 10}"#).unwrap();
        assert_eq!(cost.unit_id, Some(4));
        assert_eq!(cost.row_key, 23);
        assert_eq!(cost.amount, WireAmount::Number(10.0));

        let goal: snapshot::SnapshotEntry = serde_json::from_str(
            r#"{"branch_id": 1, "product_id": 7, "month": 3, "amount": "2.50"}"#,
        )
        .unwrap();
        assert_eq!(goal.unit_id, Some(1));
        assert_eq!(goal.row_key, 7);
        assert_eq!(goal.month, Some(3));
        assert_eq!(goal.amount, WireAmount::Text("2.50".to_string()));
    }

    #[test]
    fn cell_upsert_omits_missing_metric() {
        let cell = save::CellUpsert {
            unit_id: 1,
            category_id: 2,
            month: Some(4),
            metric: None,
            amount: 0.0,
        };
        let json = serde_json::to_value(&cell).unwrap();
        assert!(json.get("metric").is_none());
        assert_eq!(json["amount"], 0.0);
    }
}
