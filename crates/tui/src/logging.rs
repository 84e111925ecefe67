use std::{fs::OpenOptions, path::Path, sync::Mutex};

use tracing_subscriber::EnvFilter;

use crate::error::{AppError, Result};

/// Routes `tracing` output to `path`; the terminal itself is in raw mode.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init(path: &str, level: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| AppError::Logging(err.to_string()))?;

    tracing::info!(log_file = path, "planner_tui logging initialized");
    Ok(())
}

fn default_directives(level: &str) -> String {
    format!("planner_tui={level},engine={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cover_host_and_engine() {
        assert_eq!(default_directives("debug"), "planner_tui=debug,engine=debug");
    }
}
