//! Shared harness: a mock storage origin, an in-memory registry over a temp
//! ledger and an in-process contact directory

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tonebox::assignment::AssignmentEngine;
use tonebox::config::{ConfigValidator, DownloadConfig, RawProvisioning, StaticConfigSource};
use tonebox::directory::{Contact, MemoryDirectory};
use tonebox::download::{self, AssetDownloader, AssetFetcher, DownloadOutcome};
use tonebox::humanize::ByteSize;
use tonebox::ledger::Ledger;
use tonebox::pipeline::ProvisioningOrchestrator;
use tonebox::registry::{AssetRegistrar, LedgerAssetStore, SpaceProbe};

pub const SOURCE_URL: &str = "https://acct.blob.core.windows.net/tones/brand.mp3?sig=secret";
pub const TONE_PATH: &str = "/tones/brand.mp3";
pub const TONE_BYTES: &[u8] = b"ID3\x03\x00fake-mp3-frames";

/// Sends every request to the mock origin, keeping path and query
pub struct OriginFetcher {
    inner: AssetDownloader,
    origin: String,
}

#[async_trait]
impl AssetFetcher for OriginFetcher {
    async fn fetch(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> download::Result<DownloadOutcome> {
        let parsed = Url::parse(url).expect("configured URL parses");
        let target = match parsed.query() {
            Some(query) => format!("{}{}?{}", self.origin, parsed.path(), query),
            None => format!("{}{}", self.origin, parsed.path()),
        };
        self.inner.fetch(&target, sink, cancel).await
    }
}

pub struct Plenty;

impl SpaceProbe for Plenty {
    fn available_bytes(&self) -> std::io::Result<u64> {
        Ok(u64::MAX)
    }
}

pub fn provisioning(numbers: &str) -> RawProvisioning {
    RawProvisioning {
        ringtone_url: Some(SOURCE_URL.to_string()),
        contact_phone_numbers: Some(numbers.to_string()),
        ringtone_display_name: Some("Brand Tone".to_string()),
    }
}

pub fn contacts() -> Vec<Contact> {
    vec![
        Contact::new("Ada Lovelace", vec!["+14155552671".to_string()]),
        Contact::new("Alan Turing", vec!["+44 20 7946 0958".to_string()]),
    ]
}

pub struct TestEnv {
    pub server: MockServer,
    pub ledger: Ledger,
    pub assets: LedgerAssetStore,
    pub directory: Arc<MemoryDirectory>,
    pub source: Arc<StaticConfigSource>,
    pub orchestrator: Arc<ProvisioningOrchestrator>,
    _temp_dir: TempDir,
}

impl TestEnv {
    /// Origin serving `TONE_BYTES` as audio/mpeg
    pub async fn start(numbers: &str) -> Self {
        Self::with_response(
            numbers,
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(TONE_BYTES),
        )
        .await
    }

    pub async fn with_response(numbers: &str, response: ResponseTemplate) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TONE_PATH))
            .respond_with(response)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let ledger = Ledger::open(temp_dir.path().join("ledger")).unwrap();
        let assets = LedgerAssetStore::in_memory(ledger.clone());
        let directory = Arc::new(MemoryDirectory::with_contacts(contacts()));
        let source = Arc::new(StaticConfigSource::new(provisioning(numbers)));

        let fetcher = OriginFetcher {
            inner: AssetDownloader::from_config(&DownloadConfig::default()).unwrap(),
            origin: server.uri(),
        };
        let registrar = AssetRegistrar::new(
            Arc::new(assets.clone()),
            Arc::new(Plenty),
            ByteSize::mib(50),
        );
        let orchestrator = ProvisioningOrchestrator::new(
            source.clone(),
            ConfigValidator::new(vec![".blob.core.windows.net".to_string()]),
            Arc::new(fetcher),
            Arc::new(registrar),
            Arc::new(AssignmentEngine::new(directory.clone())),
        );

        Self {
            server,
            ledger,
            assets,
            directory,
            source,
            orchestrator: Arc::new(orchestrator),
            _temp_dir: temp_dir,
        }
    }
}
