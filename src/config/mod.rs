//! Configuration management for tonebox
//!
//! Two kinds of configuration live here:
//!
//! - Application settings (storage paths, limits, timeouts, scheduler policy),
//!   loaded once at startup from defaults, a TOML file and the environment.
//! - The managed provisioning values (`[provisioning]`: source URL, recipient
//!   phone numbers, display name). These are re-read through a
//!   [`ConfigSource`] on every pipeline run so that administrator changes take
//!   effect on the next trigger, then checked by [`ConfigValidator`].
//!
//! # Environment Variables
//!
//! Any value can be overridden with `TONEBOX__<section>__<key>`:
//! - `TONEBOX__PROVISIONING__RINGTONE_URL=https://acct.blob.core.windows.net/...`
//! - `TONEBOX__STORAGE__MIN_FREE_SPACE=100MB`
//!
//! The settings file defaults to `config/tonebox.toml` and can be moved with
//! `TONEBOX_CONFIG`.

mod models;
pub mod provisioning;
mod sources;
mod validation;

pub use models::{
    Config, DownloadConfig, PolicyConfig, RawProvisioning, SchedulerConfig, ServerConfig,
    StorageConfig,
};
pub use provisioning::{
    ConfigSource, ConfigValidator, DEFAULT_DISPLAY_NAME, FileConfigSource, ProvisioningConfig,
    StaticConfigSource, Validation,
};
pub use sources::config_path;
pub use validation::SettingsError;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] ::config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] SettingsError),
}

impl Config {
    /// Load settings from all sources (file + environment) and validate them
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or a setting is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Validator for the `[provisioning]` values under this policy
    pub fn validator(&self) -> ConfigValidator {
        ConfigValidator::from_policy(&self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_and_validate_provisioning() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("tonebox.toml");

        fs::write(
            &config_path,
            r#"
[provisioning]
ringtone_url = "https://acct.blob.core.windows.net/tones/brand.mp3?sig=abc"
contact_phone_numbers = "+14155552671,+12125551234"
            "#,
        )
        .unwrap();

        let config = Config::load_from_path(&config_path).unwrap();
        let Validation::Valid(provisioning) = config.validator().validate_raw(&config.provisioning)
        else {
            panic!("expected valid provisioning values");
        };
        assert_eq!(provisioning.recipient_identifiers().len(), 2);
        assert_eq!(provisioning.display_name(), DEFAULT_DISPLAY_NAME);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("tonebox.toml");

        fs::write(
            &config_path,
            r#"
[scheduler]
max_attempts = 0
            "#,
        )
        .unwrap();

        let result = Config::load_from_path(&config_path);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError(SettingsError::NoAttempts))
        ));
    }

    #[test]
    fn test_file_source_rereads_changes() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("tonebox.toml");
        let source = FileConfigSource::new(&config_path);

        fs::write(
            &config_path,
            "[provisioning]\nringtone_display_name = \"First\"\n",
        )
        .unwrap();
        assert_eq!(
            source.read().unwrap().ringtone_display_name.as_deref(),
            Some("First")
        );

        fs::write(
            &config_path,
            "[provisioning]\nringtone_display_name = \"Second\"\n",
        )
        .unwrap();
        assert_eq!(
            source.read().unwrap().ringtone_display_name.as_deref(),
            Some("Second")
        );
    }
}
