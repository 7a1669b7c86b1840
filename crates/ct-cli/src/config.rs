//! Configuration loading and management.

use std::path::{Path, PathBuf};

use ct_core::{AlertThresholds, BreakPolicy};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Whether breaks are written to history when a contraction closes.
    #[serde(default)]
    pub break_policy: BreakPolicy,

    /// Thresholds for the hospital alert.
    #[serde(default)]
    pub alert: AlertThresholds,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("ct.db"),
            break_policy: BreakPolicy::default(),
            alert: AlertThresholds::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `~/.config/ct/config.toml`, `config_path`,
    /// then `CT_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // CT_DATABASE_PATH, CT_BREAK_POLICY, CT_ALERT__MIN_MEAN_LENGTH_SECS, ...
        figment = figment.merge(Env::prefixed("CT_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for ct.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ct"))
}

/// Returns the platform-specific data directory for ct.
///
/// On Linux: `~/.local/share/ct`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("ct"))
}
