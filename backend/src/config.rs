//! Runtime configuration.
//!
//! Values come from the environment (a `.env` file is loaded by the binary
//! through `dotenvy`). CLI flags override individual fields.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_DIR;
use crate::error::ConfigError;

pub const ENV_LOGO_CACHE_DIR: &str = "WALLETCARDS_LOGO_CACHE_DIR";
pub const ENV_LOGO_URL: &str = "WALLETCARDS_LOGO_URL";
pub const ENV_LOGO_TIMEOUT_SECS: &str = "WALLETCARDS_LOGO_TIMEOUT_SECS";
pub const ENV_LOGOS: &str = "WALLETCARDS_LOGOS";
pub const ENV_SCRATCH_DIR: &str = "WALLETCARDS_SCRATCH_DIR";
pub const ENV_ACCESS_KEY: &str = "WALLETCARDS_ACCESS_KEY";

/// Per-coin icon convention; `{coin}` is replaced by the coin id.
pub const DEFAULT_LOGO_URL: &str = "https://assets.coincap.io/assets/icons/{coin}@2x.png";

/// Remote logo fetch timeout.
pub const DEFAULT_LOGO_TIMEOUT: Duration = Duration::from_secs(5);

/// Placeholder substituted in the logo URL template.
pub const COIN_PLACEHOLDER: &str = "{coin}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub logo_cache_dir: PathBuf,
    pub logo_url_template: String,
    pub logo_timeout: Duration,
    pub logos_enabled: bool,
    /// Where ephemeral images for the PDF backend are written.
    pub scratch_dir: PathBuf,
    /// Shared secret for the HTTP API; `None` leaves it open.
    pub access_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logo_cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            logo_url_template: DEFAULT_LOGO_URL.to_string(),
            logo_timeout: DEFAULT_LOGO_TIMEOUT,
            logos_enabled: true,
            scratch_dir: env::temp_dir(),
            access_key: None,
        }
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(ENV_LOGO_CACHE_DIR) {
            config.logo_cache_dir = PathBuf::from(dir);
        }
        if let Some(template) = get(ENV_LOGO_URL) {
            if !template.contains(COIN_PLACEHOLDER) {
                return Err(ConfigError::MissingPlaceholder(template));
            }
            config.logo_url_template = template;
        }
        if let Some(secs) = get(ENV_LOGO_TIMEOUT_SECS) {
            let parsed: u64 = secs.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_LOGO_TIMEOUT_SECS.to_string(),
                value: secs.clone(),
            })?;
            config.logo_timeout = Duration::from_secs(parsed.max(1));
        }
        if let Some(flag) = get(ENV_LOGOS) {
            config.logos_enabled = parse_flag(&flag).ok_or_else(|| ConfigError::InvalidValue {
                key: ENV_LOGOS.to_string(),
                value: flag.clone(),
            })?;
        }
        if let Some(dir) = get(ENV_SCRATCH_DIR) {
            config.scratch_dir = PathBuf::from(dir);
        }
        config.access_key = get(ENV_ACCESS_KEY);

        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
