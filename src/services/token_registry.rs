use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::auth::generate_token_id;
use crate::config::QuotaConfig;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::Token;

const TOKEN_COLUMNS: &str =
    "id, owner, privileged, quota_limit, requests_used, created_at, expires_at";

pub struct TokenRegistry;

impl TokenRegistry {
    /// Creates a fresh token
    ///
    /// Tier follows ownership: tokens created for a logged-in user are
    /// privileged, anonymous ones are basic. The ceiling is frozen on the
    /// row so later config changes don't affect live tokens.
    pub async fn create(
        pool: &DbPool,
        owner: Option<&str>,
        quota: &QuotaConfig,
    ) -> AppResult<Token> {
        let privileged = owner.is_some();
        let now = Utc::now();

        let token = sqlx::query_as::<_, Token>(&format!(
            r#"
            INSERT INTO tokens (id, owner, privileged, quota_limit, requests_used, created_at, expires_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(generate_token_id())
        .bind(owner)
        .bind(privileged)
        .bind(quota.ceiling_for(privileged))
        .bind(now)
        .bind(now.timestamp() + quota.default_ttl_seconds)
        .fetch_one(pool)
        .await?;

        Ok(token)
    }

    /// Gets a token by id
    pub async fn get(pool: &DbPool, token_id: &str) -> AppResult<Token> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ?"
        ))
        .bind(token_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Unknown token {}", token_id)))?;

        Ok(token)
    }

    /// Gets the token owned by a GitHub user, if any
    pub async fn find_by_owner(pool: &DbPool, owner: &str) -> AppResult<Option<Token>> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE owner = ?"
        ))
        .bind(owner)
        .fetch_optional(pool)
        .await?;

        Ok(token)
    }

    /// Ingestion-side check: the token must exist, be unexpired and have
    /// quota left. Rejections happen here, before any body or store work.
    pub async fn authorize(pool: &DbPool, token_id: &str, now: DateTime<Utc>) -> AppResult<Token> {
        let token = Self::get(pool, token_id).await?;

        if token.is_expired(now) {
            return Err(AppError::Expired(token_id.to_string()));
        }

        if token.requests_remaining() == 0 {
            return Err(AppError::QuotaExceeded {
                retry_after: token.ttl_seconds(now).max(1) as u64,
            });
        }

        Ok(token)
    }

    /// The only counter mutator: an atomic check-and-increment
    ///
    /// Runs on a connection (usually the gateway's admission transaction) so
    /// concurrent bursts against one token can never push `requests_used`
    /// past the ceiling. Returns the remaining quota after this admission.
    pub async fn increment_usage(
        conn: &mut SqliteConnection,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET requests_used = requests_used + 1
            WHERE id = ? AND expires_at > ? AND requests_used < quota_limit
            "#,
        )
        .bind(token_id)
        .bind(now.timestamp())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            let remaining: i64 = sqlx::query_scalar(
                "SELECT quota_limit - requests_used FROM tokens WHERE id = ?",
            )
            .bind(token_id)
            .fetch_one(&mut *conn)
            .await?;

            return Ok(remaining);
        }

        // The guard rejected; classify why
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT expires_at FROM tokens WHERE id = ?")
                .bind(token_id)
                .fetch_optional(&mut *conn)
                .await?;

        match row {
            None => Err(AppError::NotFound(format!("Unknown token {}", token_id))),
            Some((expires_at,)) if expires_at <= now.timestamp() => {
                Err(AppError::Expired(token_id.to_string()))
            }
            Some((expires_at,)) => Err(AppError::QuotaExceeded {
                retry_after: (expires_at - now.timestamp()).max(1) as u64,
            }),
        }
    }

    /// Destroys a token and reissues a replacement
    ///
    /// The old id becomes permanently invalid and its log entries are
    /// cascade-deleted; the replacement keeps the owner and tier but gets a
    /// fresh id, fresh counters and a fresh TTL window.
    pub async fn reset(pool: &DbPool, old: &Token, quota: &QuotaConfig) -> AppResult<Token> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM tokens WHERE id = ?")
            .bind(&old.id)
            .execute(&mut *tx)
            .await?;

        let token = sqlx::query_as::<_, Token>(&format!(
            r#"
            INSERT INTO tokens (id, owner, privileged, quota_limit, requests_used, created_at, expires_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(generate_token_id())
        .bind(old.owner.as_deref())
        .bind(old.privileged)
        .bind(quota.ceiling_for(old.privileged))
        .bind(now)
        .bind(now.timestamp() + quota.default_ttl_seconds)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(token)
    }

    /// Returns the owner's live token, replacing an expired one or creating
    /// a new one as needed. Used by the OAuth callback.
    pub async fn find_or_create_for_owner(
        pool: &DbPool,
        owner: &str,
        quota: &QuotaConfig,
    ) -> AppResult<Token> {
        if let Some(token) = Self::find_by_owner(pool, owner).await? {
            if !token.is_expired(Utc::now()) {
                return Ok(token);
            }
            return Self::reset(pool, &token, quota).await;
        }

        match Self::create(pool, Some(owner), quota).await {
            Ok(token) => Ok(token),
            // Concurrent login for the same user: keep the winner's token
            Err(AppError::Database(sqlx::Error::Database(ref db_err)))
                if db_err.is_unique_violation() =>
            {
                Self::find_by_owner(pool, owner).await?.ok_or_else(|| {
                    AppError::Internal(format!("Token for {} vanished during creation", owner))
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Sweep: removes expired tokens, cascading their logs
    pub async fn delete_expired(pool: &DbPool, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at <= ?")
            .bind(now.timestamp())
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
