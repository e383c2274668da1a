//! HTTPS client used for ringtone downloads
//!
//! Redirects are never followed: a redirect response surfaces as a non-2xx
//! status so a signed URL is never replayed against another host. When
//! pinned CA certificates are configured the built-in roots are disabled and
//! only those CAs are trusted.

use reqwest::{Certificate, Client};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::{DownloadError, Result};
use crate::config::DownloadConfig;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
    pub pinned_ca_certs: Vec<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for TransportConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            user_agent: config.user_agent.clone(),
            pinned_ca_certs: config.pinned_ca_certs.clone(),
        }
    }
}

/// Build the download client
pub fn build_client(config: &TransportConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .user_agent(&config.user_agent)
        .redirect(reqwest::redirect::Policy::none());

    if !config.pinned_ca_certs.is_empty() {
        builder = builder.tls_built_in_root_certs(false);
        for path in &config.pinned_ca_certs {
            let pem = std::fs::read(path).map_err(|e| {
                DownloadError::Transport(format!("cannot read CA certificate {}: {e}", path.display()))
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                DownloadError::Transport(format!("invalid CA certificate {}: {e}", path.display()))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        debug!(pinned = config.pinned_ca_certs.len(), "Restricted TLS trust to pinned CAs");
    }

    builder
        .build()
        .map_err(|e| DownloadError::Transport(e.to_string()))
}
