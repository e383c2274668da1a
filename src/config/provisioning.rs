//! Validation of the administrator-supplied provisioning values
//!
//! A [`ProvisioningConfig`] can only be obtained from
//! [`ConfigValidator::validate`], so holding one means every rule passed.
//! All rules run on every call and every violation is reported together.

use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{LazyLock, PoisonError, RwLock};
use url::Url;

use super::models::{PolicyConfig, RawProvisioning};
use super::{ConfigError, sources};

/// Used when the display name is absent or blank
pub const DEFAULT_DISPLAY_NAME: &str = "Enterprise Ringtone";

pub const MISSING_URL: &str = "source URL is not configured";
pub const MALFORMED_URL: &str = "source URL is not a valid URL";
pub const INSECURE_URL: &str = "source URL must use HTTPS";
pub const UNTRUSTED_HOST: &str = "source URL host is not a trusted storage domain";
pub const NO_IDENTIFIERS: &str = "no recipient identifiers configured";
pub const INVALID_IDENTIFIERS_PREFIX: &str = "invalid E.164 phone numbers: ";

static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("E.164 regex is valid"));

/// A provisioning request that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningConfig {
    source_url: String,
    recipient_identifiers: Vec<String>,
    display_name: String,
}

impl ProvisioningConfig {
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Recipients in configured order, duplicates preserved
    pub fn recipient_identifiers(&self) -> &[String] {
        &self.recipient_identifiers
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Render back into the three raw values it was parsed from
    pub fn to_raw(&self) -> RawProvisioning {
        RawProvisioning {
            ringtone_url: Some(self.source_url.clone()),
            contact_phone_numbers: Some(self.recipient_identifiers.join(",")),
            ringtone_display_name: Some(self.display_name.clone()),
        }
    }
}

/// Result of one validation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(ProvisioningConfig),
    Invalid(Vec<String>),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn errors(&self) -> &[String] {
        match self {
            Validation::Valid(_) => &[],
            Validation::Invalid(errors) => errors,
        }
    }
}

/// Checks raw provisioning values against the URL policy and identifier format
#[derive(Debug, Clone)]
pub struct ConfigValidator {
    trusted_suffixes: Vec<String>,
}

impl ConfigValidator {
    pub fn new(trusted_suffixes: Vec<String>) -> Self {
        Self { trusted_suffixes }
    }

    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self::new(policy.trusted_domain_suffixes.clone())
    }

    pub fn validate_raw(&self, raw: &RawProvisioning) -> Validation {
        self.validate(
            raw.ringtone_url.as_deref(),
            raw.contact_phone_numbers.as_deref(),
            raw.ringtone_display_name.as_deref(),
        )
    }

    pub fn validate(
        &self,
        source_url: Option<&str>,
        identifiers_raw: Option<&str>,
        display_name: Option<&str>,
    ) -> Validation {
        let mut errors = Vec::new();

        let source_url = source_url.map(str::trim).filter(|url| !url.is_empty());
        match source_url {
            None => errors.push(MISSING_URL.to_string()),
            Some(url) => self.check_url(url, &mut errors),
        }

        let identifiers = split_identifiers(identifiers_raw);
        if identifiers.is_empty() {
            errors.push(NO_IDENTIFIERS.to_string());
        }

        let invalid: Vec<&str> = identifiers
            .iter()
            .map(String::as_str)
            .filter(|id| !E164.is_match(id))
            .collect();
        if !invalid.is_empty() {
            errors.push(format!("{INVALID_IDENTIFIERS_PREFIX}{}", invalid.join(", ")));
        }

        match source_url {
            Some(url) if errors.is_empty() => Validation::Valid(ProvisioningConfig {
                source_url: url.to_string(),
                recipient_identifiers: identifiers,
                display_name: display_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or(DEFAULT_DISPLAY_NAME)
                    .to_string(),
            }),
            _ => Validation::Invalid(errors),
        }
    }

    /// Scheme and host are checked independently so both failures surface
    fn check_url(&self, raw: &str, errors: &mut Vec<String>) {
        let Ok(url) = Url::parse(raw) else {
            errors.push(MALFORMED_URL.to_string());
            return;
        };

        if url.scheme() != "https" {
            errors.push(INSECURE_URL.to_string());
        }

        let trusted = url.host_str().is_some_and(|host| {
            let host = host.to_ascii_lowercase();
            self.trusted_suffixes
                .iter()
                .any(|suffix| host.ends_with(suffix.as_str()))
        });
        if !trusted {
            errors.push(UNTRUSTED_HOST.to_string());
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::from_policy(&PolicyConfig::default())
    }
}

fn split_identifiers(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Supplies the raw provisioning values, read fresh on every call
pub trait ConfigSource: Send + Sync {
    fn read(&self) -> Result<RawProvisioning, ConfigError>;
}

/// Reads the `[provisioning]` section from the settings file and environment
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn read(&self) -> Result<RawProvisioning, ConfigError> {
        let config = sources::load_from_sources(&self.path)?;
        Ok(config.provisioning)
    }
}

/// Holds values in memory; callers swap them with [`StaticConfigSource::set`]
#[derive(Debug, Default)]
pub struct StaticConfigSource {
    raw: RwLock<RawProvisioning>,
}

impl StaticConfigSource {
    pub fn new(raw: RawProvisioning) -> Self {
        Self {
            raw: RwLock::new(raw),
        }
    }

    pub fn set(&self, raw: RawProvisioning) {
        *self.raw.write().unwrap_or_else(PoisonError::into_inner) = raw;
    }
}

impl ConfigSource for StaticConfigSource {
    fn read(&self) -> Result<RawProvisioning, ConfigError> {
        Ok(self
            .raw
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
