use super::models::Config;
use ::config::{ConfigError, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};

pub(crate) const CONFIG_ENV_VAR: &str = "TONEBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/tonebox.toml";
const ENV_PREFIX: &str = "TONEBOX";
const ENV_SEPARATOR: &str = "__";

/// Path of the settings file: `TONEBOX_CONFIG` or the default location
pub fn config_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load settings with priority (lowest to highest):
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if it exists)
/// 3. Variables from a `.env` file
/// 4. Process environment
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env file is normal
    let _ = dotenvy::dotenv();

    load_from_sources(&config_path())
}

/// Load settings from a specific file plus the environment
pub fn load_from_sources(config_path: &Path) -> Result<Config, ConfigError> {
    let mut builder = ::config::Config::builder();

    if config_path.exists() {
        tracing::debug!(path = %config_path.display(), "Loading configuration file");
        builder = builder.add_source(
            File::from(config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "Configuration file not found, using defaults and environment overrides"
        );
    }

    // TONEBOX__PROVISIONING__RINGTONE_URL -> provisioning.ringtone_url
    // No try_parsing: phone numbers must keep their leading '+'
    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR));

    builder.build()?.try_deserialize()
}
