use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::error::{LedgerError, Result};
use super::partitions::{ASSETS, CONTACTS, PHONES};

/// Fjall keyspace holding the asset index and the contact directory
#[derive(Clone)]
pub struct Ledger {
    keyspace: Keyspace,
    assets: PartitionHandle,
    contacts: PartitionHandle,
    phones: PartitionHandle,
}

impl Ledger {
    /// Open or create a ledger at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening ledger");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let assets = keyspace.open_partition(ASSETS, PartitionCreateOptions::default())?;
        let contacts = keyspace.open_partition(CONTACTS, PartitionCreateOptions::default())?;
        let phones = keyspace.open_partition(PHONES, PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            assets,
            contacts,
            phones,
        })
    }

    pub fn assets(&self) -> &PartitionHandle {
        &self.assets
    }

    pub fn contacts(&self) -> &PartitionHandle {
        &self.contacts
    }

    pub fn phones(&self) -> &PartitionHandle {
        &self.phones
    }

    /// Serialize `value` as JSON under `key`, replacing any previous value
    pub fn put_json<T: Serialize>(
        &self,
        partition: &PartitionHandle,
        key: Vec<u8>,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        partition.insert(key, bytes)?;
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        partition: &PartitionHandle,
        key: Vec<u8>,
    ) -> Result<Option<T>> {
        match partition.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn get_string(&self, partition: &PartitionHandle, key: Vec<u8>) -> Result<Option<String>> {
        match partition.get(key)? {
            Some(value) => String::from_utf8(value.to_vec())
                .map(Some)
                .map_err(|e| LedgerError::InvalidKey(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn put_string(&self, partition: &PartitionHandle, key: Vec<u8>, value: &str) -> Result<()> {
        partition.insert(key, value.as_bytes())?;
        Ok(())
    }

    pub fn remove(&self, partition: &PartitionHandle, key: Vec<u8>) -> Result<()> {
        partition.remove(key)?;
        Ok(())
    }

    /// Every JSON value in the partition, in key order
    pub fn scan_json<T: DeserializeOwned>(&self, partition: &PartitionHandle) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for item in partition.iter() {
            let (_, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Ledger persisted");
        Ok(())
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        let mut stats = LedgerStats::default();

        for item in self.assets.iter() {
            item?;
            stats.asset_count += 1;
        }
        for item in self.contacts.iter() {
            item?;
            stats.contact_count += 1;
        }

        Ok(stats)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LedgerStats {
    pub asset_count: usize,
    pub contact_count: usize,
}
