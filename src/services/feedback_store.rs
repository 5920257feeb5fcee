use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{Feedback, StoredFeedback};
use crate::utils::error::Result;

/// Where accepted feedback is kept. Hosts plug in their own database.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn save(&self, feedback: Feedback) -> Result<StoredFeedback>;

    async fn find(&self, id: u64) -> Result<Option<StoredFeedback>>;

    async fn count(&self) -> Result<usize>;
}

#[derive(Default)]
pub struct InMemoryFeedbackStore {
    records: RwLock<Vec<StoredFeedback>>,
    next_id: AtomicU64,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn save(&self, feedback: Feedback) -> Result<StoredFeedback> {
        let record = StoredFeedback {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            feedback,
            created_at: Utc::now(),
        };

        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn find(&self, id: u64) -> Result<Option<StoredFeedback>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}
