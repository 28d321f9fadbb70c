use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{NewWebhookLog, WebhookLog};

const LOG_COLUMNS: &str = "seq, id, token_id, method, headers, body, body_truncated, received_at";

pub struct WebhookStore;

impl WebhookStore {
    /// Appends a captured request to a token's log and enforces the
    /// retention cap
    ///
    /// Runs on the gateway's admission transaction: the insert and the
    /// keep-newest-N prune commit together with the quota increment, so the
    /// cap is never exceeded and list order always matches admission order.
    pub async fn append(
        conn: &mut SqliteConnection,
        token_id: &str,
        entry: NewWebhookLog,
        max_entries: i64,
    ) -> AppResult<WebhookLog> {
        let log = sqlx::query_as::<_, WebhookLog>(&format!(
            r#"
            INSERT INTO webhook_logs (id, token_id, method, headers, body, body_truncated, received_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(token_id)
        .bind(&entry.method)
        .bind(Json(&entry.headers))
        .bind(&entry.body)
        .bind(entry.body_truncated)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_foreign_key_violation() {
                    return AppError::NotFound(format!("Unknown token {}", token_id));
                }
            }
            AppError::Database(e)
        })?;

        // Atomic "keep newest N" rather than a read-then-delete pair
        sqlx::query(
            r#"
            DELETE FROM webhook_logs
            WHERE token_id = ?
              AND seq NOT IN (
                SELECT seq FROM webhook_logs
                WHERE token_id = ?
                ORDER BY seq DESC
                LIMIT ?
              )
            "#,
        )
        .bind(token_id)
        .bind(token_id)
        .bind(max_entries)
        .execute(&mut *conn)
        .await?;

        Ok(log)
    }

    /// Lists a token's entries in admission (chronological) order
    ///
    /// A token with no captures yields an empty list, not an error.
    pub async fn list(pool: &DbPool, token_id: &str) -> AppResult<Vec<WebhookLog>> {
        let logs = sqlx::query_as::<_, WebhookLog>(&format!(
            "SELECT {LOG_COLUMNS} FROM webhook_logs WHERE token_id = ? ORDER BY seq ASC"
        ))
        .bind(token_id)
        .fetch_all(pool)
        .await?;

        Ok(logs)
    }

    /// Gets a single entry by id
    pub async fn get(pool: &DbPool, entry_id: &str) -> AppResult<Option<WebhookLog>> {
        let log = sqlx::query_as::<_, WebhookLog>(&format!(
            "SELECT {LOG_COLUMNS} FROM webhook_logs WHERE id = ?"
        ))
        .bind(entry_id)
        .fetch_optional(pool)
        .await?;

        Ok(log)
    }

    /// Deletes an entry; returns whether anything was removed
    pub async fn delete(pool: &DbPool, entry_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM webhook_logs WHERE id = ?")
            .bind(entry_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Purges a token's whole log; returns the number of entries removed
    pub async fn delete_all_for_token(pool: &DbPool, token_id: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM webhook_logs WHERE token_id = ?")
            .bind(token_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Counts a token's stored entries
    pub async fn count_for_token(pool: &DbPool, token_id: &str) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM webhook_logs WHERE token_id = ?")
                .bind(token_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
