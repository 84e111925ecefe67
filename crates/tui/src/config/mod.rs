use clap::Parser;
use engine::{
    Dimension, FiscalCalendar, PriceSource, SaveShape, SnapshotKeying, SubMetric, TableSpec,
};
use reqwest::Url;
use serde::Deserialize;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/planner.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub plan_id: Option<i64>,
    pub branch_id: Option<i64>,
    pub log_level: String,
    pub log_file: String,
    pub session_path: String,
    pub table: TableConfig,
    /// Bearer token from the command line or `PLANNER_TOKEN`; never read
    /// from the config file.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            plan_id: None,
            branch_id: None,
            log_level: "info".to_string(),
            log_file: "planner_tui.log".to_string(),
            session_path: "config/planner_session.json".to_string(),
            table: TableConfig::default(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub title: String,
    pub layout: Dimension,
    pub keying: SnapshotKeying,
    pub save_shape: SaveShape,
    pub price_model: PriceSource,
    pub editable_prices: bool,
    pub max_decimals: usize,
    pub first_month: u32,
    pub metrics: Vec<SubMetric>,
    pub locked_metrics: Vec<String>,
    pub default_group: Option<i64>,
    /// JSON file with `[{storage_id, category_id, group_id}]`.
    pub seed_path: Option<String>,
    pub endpoints: EndpointsConfig,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            title: "Business costs".to_string(),
            layout: Dimension::Units,
            keying: SnapshotKeying::Storage,
            save_shape: SaveShape::RowUnits,
            price_model: PriceSource::Sell,
            editable_prices: false,
            max_decimals: 2,
            first_month: 1,
            metrics: FiscalCalendar::default().metrics,
            locked_metrics: Vec::new(),
            default_group: None,
            seed_path: None,
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl TableConfig {
    pub fn spec(&self) -> TableSpec {
        TableSpec {
            dimension: self.layout,
            calendar: FiscalCalendar {
                first_month: self.first_month,
                metrics: self.metrics.clone(),
            },
            shape: self.save_shape,
            keying: self.keying,
            price_source: self.price_model,
            editable_prices: self.editable_prices,
            max_decimals: self.max_decimals,
            default_group: self.default_group,
            locked_metrics: self.locked_metrics.clone(),
        }
    }
}

/// Paths relative to `base_url`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub units: String,
    pub rows: String,
    pub snapshot: String,
    pub save: String,
    pub prices: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            units: "units".to_string(),
            rows: "products".to_string(),
            snapshot: "plans/snapshot".to_string(),
            save: "plans/save".to_string(),
            prices: "plans/prices".to_string(),
        }
    }
}

impl AppConfig {
    /// Problems that block every network call. Empty when usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.base_url.trim().is_empty() {
            issues.push("API base URL is not set (base_url)".to_string());
        } else if let Err(err) = Url::parse(&self.base_url) {
            issues.push(format!("invalid base_url \"{}\": {err}", self.base_url));
        }
        if self.plan_id.is_none() {
            issues.push("no plan selected (plan_id)".to_string());
        }
        if self.branch_id.is_none() {
            issues.push("no branch selected (branch_id)".to_string());
        }

        let table = &self.table;
        if table.max_decimals > 6 {
            issues.push(format!(
                "table.max_decimals is {}, at most 6 is supported",
                table.max_decimals
            ));
        }
        if table.layout == Dimension::Calendar {
            if !(1..=12).contains(&table.first_month) {
                issues.push(format!(
                    "table.first_month must be 1-12, got {}",
                    table.first_month
                ));
            }
            if table.metrics.is_empty() {
                issues.push("calendar tables need at least one metric".to_string());
            }
            if table.save_shape == SaveShape::RowUnits {
                issues.push("calendar tables must save as flat_cells".to_string());
            }
        }

        let endpoints = [
            ("units", &table.endpoints.units),
            ("rows", &table.endpoints.rows),
            ("snapshot", &table.endpoints.snapshot),
            ("save", &table.endpoints.save),
        ];
        for (name, path) in endpoints {
            if path.trim().is_empty() {
                issues.push(format!("table.endpoints.{name} is empty"));
            }
        }
        if table.editable_prices && table.endpoints.prices.trim().is_empty() {
            issues.push("editable prices need table.endpoints.prices".to_string());
        }

        issues
    }
}

#[derive(Debug, Parser)]
#[command(name = "planner_tui", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override base URL (e.g. https://planning.example.org/api/).
    #[arg(long)]
    base_url: Option<String>,
    /// Plan to open.
    #[arg(long)]
    plan_id: Option<i64>,
    /// Branch to open.
    #[arg(long)]
    branch_id: Option<i64>,
    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
    /// Bearer token for the planning service.
    #[arg(long, env = "PLANNER_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

pub fn load() -> Result<AppConfig> {
    load_from(Args::parse())
}

fn load_from(args: Args) -> Result<AppConfig> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(
        config::Environment::with_prefix("PLANNER_TUI")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(plan_id) = args.plan_id {
        settings.plan_id = Some(plan_id);
    }
    if let Some(branch_id) = args.branch_id {
        settings.branch_id = Some(branch_id);
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    settings.token = args.token.filter(|token| !token.trim().is_empty());

    Ok(settings)
}
