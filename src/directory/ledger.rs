use async_trait::async_trait;
use tracing::{debug, info};

use super::{Contact, ContactDirectory, DirectoryEntity, DirectoryError, Result, normalize_phone};
use crate::ledger::Ledger;
use crate::ledger::partitions::{encode_contact_key, encode_phone_key};
use crate::registry::AssetHandle;

/// Contacts persisted in the ledger with a phone-number index
#[derive(Clone)]
pub struct LedgerDirectory {
    ledger: Ledger,
}

impl LedgerDirectory {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Insert or replace a contact and re-index its phone numbers
    pub fn upsert_contact(&self, contact: &Contact) -> Result<()> {
        if contact.phone_numbers.is_empty() {
            return Err(DirectoryError::InvalidContact(format!(
                "contact {} has no phone numbers",
                contact.id
            )));
        }

        if let Some(previous) = self.get_contact(&contact.id)? {
            let current: Vec<String> = contact
                .phone_numbers
                .iter()
                .map(|phone| normalize_phone(phone))
                .collect();
            for phone in &previous.phone_numbers {
                let normalized = normalize_phone(phone);
                if !current.contains(&normalized) {
                    self.release_phone(&normalized, &contact.id)?;
                }
            }
        }

        self.ledger.put_json(
            self.ledger.contacts(),
            encode_contact_key(&contact.id),
            contact,
        )?;
        for phone in &contact.phone_numbers {
            self.ledger.put_string(
                self.ledger.phones(),
                encode_phone_key(&normalize_phone(phone)),
                &contact.id,
            )?;
        }

        info!(contact_id = %contact.id, numbers = contact.phone_numbers.len(), "Contact saved");
        Ok(())
    }

    /// Drop `owner`'s claim on a number, handing it to another contact that
    /// still lists it
    fn release_phone(&self, normalized: &str, owner: &str) -> Result<()> {
        let key = encode_phone_key(normalized);
        if self.ledger.get_string(self.ledger.phones(), key.clone())?.as_deref() != Some(owner) {
            return Ok(());
        }

        let successor = self.list_contacts()?.into_iter().find(|other| {
            other.id != owner
                && other
                    .phone_numbers
                    .iter()
                    .any(|phone| normalize_phone(phone) == normalized)
        });
        match successor {
            Some(other) => {
                self.ledger.put_string(self.ledger.phones(), key, &other.id)?;
                debug!(contact_id = %other.id, "Phone index reassigned");
            }
            None => self.ledger.remove(self.ledger.phones(), key)?,
        }
        Ok(())
    }

    pub fn get_contact(&self, id: &str) -> Result<Option<Contact>> {
        Ok(self
            .ledger
            .get_json(self.ledger.contacts(), encode_contact_key(id))?)
    }

    pub fn list_contacts(&self) -> Result<Vec<Contact>> {
        Ok(self.ledger.scan_json(self.ledger.contacts())?)
    }
}

#[async_trait]
impl ContactDirectory for LedgerDirectory {
    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<DirectoryEntity>> {
        let key = encode_phone_key(&normalize_phone(identifier));
        let Some(contact_id) = self.ledger.get_string(self.ledger.phones(), key)? else {
            return Ok(None);
        };

        let contact = self.get_contact(&contact_id)?.ok_or_else(|| {
            DirectoryError::Inconsistent(format!("phone index points at missing contact {contact_id}"))
        })?;

        Ok(Some(DirectoryEntity {
            id: contact.id,
            display_name: Some(contact.display_name),
        }))
    }

    async fn update_reference(&self, entity_id: &str, reference: &AssetHandle) -> Result<bool> {
        let Some(mut contact) = self.get_contact(entity_id)? else {
            return Ok(false);
        };

        contact.custom_ringtone = Some(reference.uri());
        self.ledger.put_json(
            self.ledger.contacts(),
            encode_contact_key(&contact.id),
            &contact,
        )?;
        debug!(contact_id = entity_id, %reference, "Custom ringtone updated");
        Ok(true)
    }
}
