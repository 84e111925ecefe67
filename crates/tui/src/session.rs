use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use engine::PlanKey;
use serde::{Deserialize, Serialize};

use crate::{config::AppConfig, error::Result};

/// Credentials and last selection, kept between runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Session {
    pub token: Option<String>,
    pub last_plan_id: Option<i64>,
    pub last_branch_id: Option<i64>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn load(path: &str) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let parent = Path::new(path).parent();
        if let Some(parent) = parent {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload)?;
        Ok(())
    }

    /// Fills what the config leaves open. An explicit token or selection
    /// always wins over the stored one.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if config.token.is_none() {
            config.token = self.token.clone().filter(|t| !t.trim().is_empty());
        }
        if config.plan_id.is_none() {
            config.plan_id = self.last_plan_id;
        }
        if config.branch_id.is_none() {
            config.branch_id = self.last_branch_id;
        }
    }

    pub fn remember(&mut self, key: PlanKey) {
        self.last_plan_id = Some(key.plan_id);
        self.last_branch_id = Some(key.branch_id);
        self.saved_at = Some(Utc::now());
    }
}
