use chrono::Utc;

use crate::config::QuotaConfig;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{NewWebhookLog, WebhookLog};
use crate::services::{TokenRegistry, WebhookStore};

pub struct IngestService;

impl IngestService {
    /// Admits and records one inbound request
    ///
    /// Quota increment, log append and cap eviction run in a single
    /// transaction: a request is either fully admitted (counter moved AND
    /// entry stored) or fully rejected, and entries land in the exact order
    /// their increments were admitted. Any rejection rolls back.
    pub async fn capture(
        pool: &DbPool,
        quota: &QuotaConfig,
        token_id: &str,
        entry: NewWebhookLog,
    ) -> AppResult<(WebhookLog, i64)> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let remaining = TokenRegistry::increment_usage(&mut tx, token_id, now).await?;
        let stored =
            WebhookStore::append(&mut tx, token_id, entry, quota.max_entries_per_token).await?;

        tx.commit().await?;

        Ok((stored, remaining))
    }
}
