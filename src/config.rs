//! Process configuration: environment variables and logging setup.

use std::path::PathBuf;
use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "SCHOOLD_LOG";
pub const WORKSPACE_ENV: &str = "SCHOOLD_WORKSPACE";
const DEFAULT_FILTER: &str = "info";

/// Settings key holding the alert thresholds as JSON.
pub const ALERT_THRESHOLDS_KEY: &str = "analytics.alertThresholds";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let workspace = lookup(WORKSPACE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self { workspace }
    }
}

static INIT: Once = Once::new();

/// Logs go to stderr; stdout carries protocol responses only.
///
/// Reads `SCHOOLD_LOG` (e.g. `schoold=debug`), falling back to `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_workspace_is_ignored() {
        let cfg = Config::from_lookup(|_| Some("   ".to_string()));
        assert_eq!(cfg.workspace, None);
        let cfg = Config::from_lookup(|k| (k == WORKSPACE_ENV).then(|| "/tmp/ws".to_string()));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/ws")));
    }
}
