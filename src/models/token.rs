use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Capture token model for reading from the database
///
/// `quota_limit` is frozen at creation from the tier ceiling, so
/// `requests_used + requests_remaining == quota_limit` holds for the
/// lifetime of the row even if the configured ceilings change later.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Token {
    pub id: String,
    pub owner: Option<String>,
    pub privileged: bool,
    pub quota_limit: i64,
    pub requests_used: i64,
    pub created_at: DateTime<Utc>,
    /// Unix seconds; the token stops accepting captures past this instant
    pub expires_at: i64,
}

/// Status view rendered by the dashboard
#[derive(Debug, Serialize)]
pub struct TokenStatusResponse {
    pub token: String,
    pub owner: Option<String>,
    pub privileged: bool,
    pub limit: i64,
    pub requests_used: i64,
    pub requests_remaining: i64,
    pub ttl_seconds: i64,
}

/// Response for `/api/create`
#[derive(Debug, Serialize)]
pub struct TokenCreatedResponse {
    pub token: String,
    pub privileged: bool,
    pub limit: i64,
    pub ttl_seconds: i64,
    /// False when an existing live token was returned instead
    pub created: bool,
}

impl Token {
    pub fn requests_remaining(&self) -> i64 {
        (self.quota_limit - self.requests_used).max(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }

    /// Seconds until expiry, floored at zero
    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now.timestamp()).max(0)
    }

    pub fn to_status_response(&self, now: DateTime<Utc>) -> TokenStatusResponse {
        TokenStatusResponse {
            token: self.id.clone(),
            owner: self.owner.clone(),
            privileged: self.privileged,
            limit: self.quota_limit,
            requests_used: self.requests_used,
            requests_remaining: self.requests_remaining(),
            ttl_seconds: self.ttl_seconds(now),
        }
    }

    pub fn to_created_response(&self, now: DateTime<Utc>, created: bool) -> TokenCreatedResponse {
        TokenCreatedResponse {
            token: self.id.clone(),
            privileged: self.privileged,
            limit: self.quota_limit,
            ttl_seconds: self.ttl_seconds(now),
            created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(used: i64, limit: i64, expires_at: i64) -> Token {
        Token {
            id: "t".repeat(32),
            owner: None,
            privileged: false,
            quota_limit: limit,
            requests_used: used,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn test_remaining_plus_used_equals_limit() {
        for used in 0..=50 {
            let t = token(used, 50, i64::MAX);
            assert_eq!(t.requests_used + t.requests_remaining(), t.quota_limit);
        }
    }

    #[test]
    fn test_remaining_never_negative() {
        // Defensive floor; the store guard should prevent used > limit
        let t = token(60, 50, i64::MAX);
        assert_eq!(t.requests_remaining(), 0);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        assert!(token(0, 50, now.timestamp()).is_expired(now));
        assert!(!token(0, 50, now.timestamp() + 1).is_expired(now));
        assert_eq!(token(0, 50, now.timestamp() - 10).ttl_seconds(now), 0);
    }
}
