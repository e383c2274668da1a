use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("download.max_bytes must be positive")]
    ZeroDownloadLimit,

    #[error("Timeout must be positive: {field} = 0")]
    ZeroTimeout { field: &'static str },

    #[error("scheduler.max_attempts must be at least 1")]
    NoAttempts,

    #[error("policy.trusted_domain_suffixes must not be empty")]
    NoTrustedDomains,

    #[error("Trusted domain suffix '{suffix}' must be a lower-case DNS suffix such as '.blob.core.windows.net'")]
    InvalidDomainSuffix { suffix: String },

    #[error("Pinned CA certificate not found: {path}")]
    MissingPinnedCertificate { path: String },
}

/// Validate the application settings
///
/// The `[provisioning]` values are not checked here; they are validated on
/// every pipeline run so that a bad value never blocks startup.
pub fn validate(config: &Config) -> Result<(), SettingsError> {
    validate_download(config)?;
    validate_scheduler(config)?;
    validate_policy(config)?;
    Ok(())
}

fn validate_download(config: &Config) -> Result<(), SettingsError> {
    let download = &config.download;

    if download.max_bytes.as_u64() == 0 {
        return Err(SettingsError::ZeroDownloadLimit);
    }
    if download.connect_timeout_secs == 0 {
        return Err(SettingsError::ZeroTimeout {
            field: "download.connect_timeout_secs",
        });
    }
    if download.read_timeout_secs == 0 {
        return Err(SettingsError::ZeroTimeout {
            field: "download.read_timeout_secs",
        });
    }

    if let Some(missing) = download.pinned_ca_certs.iter().find(|path| !path.exists()) {
        return Err(SettingsError::MissingPinnedCertificate {
            path: missing.display().to_string(),
        });
    }

    Ok(())
}

fn validate_scheduler(config: &Config) -> Result<(), SettingsError> {
    if config.scheduler.max_attempts == 0 {
        return Err(SettingsError::NoAttempts);
    }
    Ok(())
}

fn validate_policy(config: &Config) -> Result<(), SettingsError> {
    let suffixes = &config.policy.trusted_domain_suffixes;
    if suffixes.is_empty() {
        return Err(SettingsError::NoTrustedDomains);
    }

    for suffix in suffixes {
        if !is_dns_suffix(suffix) {
            return Err(SettingsError::InvalidDomainSuffix {
                suffix: suffix.clone(),
            });
        }
    }

    Ok(())
}

/// `.example.com` style: leading dot, at least two labels, lower-case
fn is_dns_suffix(suffix: &str) -> bool {
    let Some(rest) = suffix.strip_prefix('.') else {
        return false;
    };

    let labels: Vec<&str> = rest.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        })
}
