use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{Contact, ContactDirectory, DirectoryEntity, Result, normalize_phone};
use crate::registry::AssetHandle;

/// In-process directory keyed by contact id
#[derive(Default)]
pub struct MemoryDirectory {
    contacts: RwLock<BTreeMap<String, Contact>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contacts(contacts: impl IntoIterator<Item = Contact>) -> Self {
        let map = contacts
            .into_iter()
            .map(|contact| (contact.id.clone(), contact))
            .collect();
        Self {
            contacts: RwLock::new(map),
        }
    }

    pub async fn insert(&self, contact: Contact) {
        self.contacts
            .write()
            .await
            .insert(contact.id.clone(), contact);
    }

    pub async fn get(&self, id: &str) -> Option<Contact> {
        self.contacts.read().await.get(id).cloned()
    }
}

#[async_trait]
impl ContactDirectory for MemoryDirectory {
    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<DirectoryEntity>> {
        let wanted = normalize_phone(identifier);
        let contacts = self.contacts.read().await;

        Ok(contacts
            .values()
            .find(|contact| {
                contact
                    .phone_numbers
                    .iter()
                    .any(|phone| normalize_phone(phone) == wanted)
            })
            .map(|contact| DirectoryEntity {
                id: contact.id.clone(),
                display_name: Some(contact.display_name.clone()),
            }))
    }

    async fn update_reference(&self, entity_id: &str, reference: &AssetHandle) -> Result<bool> {
        let mut contacts = self.contacts.write().await;
        match contacts.get_mut(entity_id) {
            Some(contact) => {
                contact.custom_ringtone = Some(reference.uri());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_and_update() {
        let contact = Contact::new("Grace", vec!["+44 20 7946 0958".to_string()]);
        let id = contact.id.clone();
        let directory = MemoryDirectory::with_contacts([contact]);

        let entity = directory
            .lookup_by_identifier("+442079460958")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entity.id, id);

        let handle = AssetHandle::generate();
        assert!(directory.update_reference(&id, &handle).await.unwrap());
        assert_eq!(
            directory.get(&id).await.unwrap().custom_ringtone,
            Some(handle.uri())
        );
    }

    #[tokio::test]
    async fn test_unknown_entity_not_updated() {
        let directory = MemoryDirectory::new();
        assert!(
            !directory
                .update_reference("nope", &AssetHandle::generate())
                .await
                .unwrap()
        );
        assert!(
            directory
                .lookup_by_identifier("+14155552671")
                .await
                .unwrap()
                .is_none()
        );
    }
}
