use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub provisioning: RawProvisioning,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// The three managed-configuration values, exactly as the administrator supplied them
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawProvisioning {
    pub ringtone_url: Option<String>,
    pub contact_phone_numbers: Option<String>,
    pub ringtone_display_name: Option<String>,
}

/// Source URL policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    #[serde(default = "default_trusted_domain_suffixes")]
    pub trusted_domain_suffixes: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            trusted_domain_suffixes: default_trusted_domain_suffixes(),
        }
    }
}

fn default_trusted_domain_suffixes() -> Vec<String> {
    vec![".blob.core.windows.net".to_string()]
}

/// Download limits and transport settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: ByteSize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// PEM files of the CAs the client is allowed to chain to; empty means system roots
    #[serde(default)]
    pub pinned_ca_certs: Vec<PathBuf>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl DownloadConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            pinned_ca_certs: Vec::new(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_max_bytes() -> ByteSize {
    ByteSize::mib(10)
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("tonebox/{}", env!("CARGO_PKG_VERSION"))
}

/// Where registered assets and the ledger live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_min_free_space")]
    pub min_free_space: ByteSize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            ledger_path: default_ledger_path(),
            min_free_space: default_min_free_space(),
        }
    }
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("data/ringtones")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

fn default_min_free_space() -> ByteSize {
    ByteSize::mib(50)
}

/// Whole-pipeline retry policy for background runs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Linear backoff step; attempt `n` waits `n * backoff_secs`
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_secs() -> u64 {
    10
}

/// HTTP control surface
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
