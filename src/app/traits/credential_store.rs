use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::app::models::{CredentialRecord, TemplateId};

/// The only way this crate touches per-user credential metadata (spec §3.3,
/// §6.1): the host owns the storage medium, the core only ever reads and
/// writes through this narrow interface. Production deployments supply
/// their own (backed by whatever store holds identity-provider user
/// attributes); this crate only ships `InMemoryCredentialStore` as the
/// reference implementation the CLI and tests run against.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, realm: &str, user_id: &str) -> anyhow::Result<Option<CredentialRecord>>;

    async fn put(&self, realm: &str, user_id: &str, record: CredentialRecord) -> anyhow::Result<()>;

    async fn delete(&self, realm: &str, user_id: &str) -> anyhow::Result<()>;

    async fn find_by_template_id(&self, realm: &str, template_id: TemplateId) -> anyhow::Result<Option<String>>;

    /// Streams user ids with a credential matching `tag`, for bulk operations (spec §4.6).
    async fn list_users_with_tag(&self, realm: &str, tag: &str) -> anyhow::Result<Vec<String>>;
}

fn key(realm: &str, user_id: &str) -> String {
    format!("{realm}:{user_id}")
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, realm: &str, user_id: &str) -> anyhow::Result<Option<CredentialRecord>> {
        Ok(self.records.lock().expect("credential store lock poisoned").get(&key(realm, user_id)).cloned())
    }

    async fn put(&self, realm: &str, user_id: &str, record: CredentialRecord) -> anyhow::Result<()> {
        self.records.lock().expect("credential store lock poisoned").insert(key(realm, user_id), record);
        Ok(())
    }

    async fn delete(&self, realm: &str, user_id: &str) -> anyhow::Result<()> {
        self.records.lock().expect("credential store lock poisoned").remove(&key(realm, user_id));
        Ok(())
    }

    async fn find_by_template_id(&self, realm: &str, template_id: TemplateId) -> anyhow::Result<Option<String>> {
        let records = self.records.lock().expect("credential store lock poisoned");
        Ok(records
            .iter()
            .find(|(k, v)| k.starts_with(&format!("{realm}:")) && v.template_id == template_id)
            .map(|(k, _)| k.split_once(':').map(|(_, u)| u.to_string()).unwrap_or_default()))
    }

    async fn list_users_with_tag(&self, realm: &str, tag: &str) -> anyhow::Result<Vec<String>> {
        let records = self.records.lock().expect("credential store lock poisoned");
        Ok(records
            .iter()
            .filter(|(k, v)| k.starts_with(&format!("{realm}:")) && v.tags.iter().any(|t| t == tag))
            .map(|(k, _)| k.split_once(':').map(|(_, u)| u.to_string()).unwrap_or_default())
            .collect())
    }
}
