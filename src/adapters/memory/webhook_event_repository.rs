//! In-memory webhook event repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookEventRepository {
    records: Arc<RwLock<HashMap<String, WebhookEventRecord>>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.event_id) {
            Ok(SaveResult::AlreadyExists)
        } else {
            records.insert(record.event_id.clone(), record);
            Ok(SaveResult::Inserted)
        }
    }
}
