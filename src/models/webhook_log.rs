use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A captured inbound request
#[derive(Debug, Clone, FromRow)]
pub struct WebhookLog {
    /// Admission order within the token's log (monotonic, assigned at insert)
    pub seq: i64,
    pub id: String,
    pub token_id: String,
    pub method: String,
    /// JSON object of header name -> list of values, as received
    pub headers: Json<serde_json::Value>,
    pub body: Vec<u8>,
    pub body_truncated: bool,
    pub received_at: DateTime<Utc>,
}

/// What the ingestion gateway hands to the store
#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub method: String,
    pub headers: serde_json::Value,
    pub body: Vec<u8>,
    pub body_truncated: bool,
}

/// Log entry as rendered by the dashboard
#[derive(Debug, Serialize)]
pub struct WebhookLogResponse {
    pub id: String,
    pub method: String,
    pub headers: serde_json::Value,
    pub body: String,
    pub truncated: bool,
    pub timestamp: DateTime<Utc>,
}

impl WebhookLog {
    /// Converts to API response format
    ///
    /// The body is stored verbatim; non-UTF-8 bytes are replaced for display
    /// only (the dashboard decides how to pretty-print).
    pub fn to_response(&self) -> WebhookLogResponse {
        WebhookLogResponse {
            id: self.id.clone(),
            method: self.method.clone(),
            headers: self.headers.0.clone(),
            body: String::from_utf8_lossy(&self.body).into_owned(),
            truncated: self.body_truncated,
            timestamp: self.received_at,
        }
    }
}
