use actix_web::{web, HttpRequest, HttpResponse};
use bytes::BytesMut;
use chrono::Utc;
use futures_util::StreamExt;

use crate::auth::is_valid_token_id;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::NewWebhookLog;
use crate::services::{IngestService, TokenRegistry};

/// Response for an accepted capture
#[derive(serde::Serialize)]
pub struct CaptureResponse {
    pub id: String,
    pub requests_remaining: i64,
    pub truncated: bool,
}

/// ANY /api/hooks/{token}
/// Public capture endpoint: any method, any payload, from anywhere.
pub async fn capture_hook(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Payload,
) -> AppResult<HttpResponse> {
    let token_id = path.into_inner();

    // A malformed id cannot exist in the registry; skip the lookup
    if !is_valid_token_id(&token_id) {
        return Err(AppError::NotFound(format!("Unknown token {}", token_id)));
    }

    // 1. Authorize before any body or store work: unknown -> 404,
    //    expired -> 410, exhausted -> 429
    TokenRegistry::authorize(pool.get_ref(), &token_id, Utc::now()).await?;

    // 2. Read the body up to the configured bound
    let (body, truncated) = read_body_bounded(payload, config.quota.max_body_bytes).await?;

    // 3. Snapshot the request as received; the dashboard pretty-prints later
    let entry = NewWebhookLog {
        method: req.method().to_string(),
        headers: snapshot_headers(&req),
        body,
        body_truncated: truncated,
    };

    // 4. Atomic admission: increment + append + evict in one transaction
    let (stored, remaining) =
        IngestService::capture(pool.get_ref(), &config.quota, &token_id, entry).await?;

    log::debug!("Captured webhook {} for token {}", stored.id, token_id);

    let response = CaptureResponse {
        id: stored.id,
        requests_remaining: remaining,
        truncated,
    };

    // Oversize bodies are still recorded (truncated); the sender learns via
    // the status code that its payload was clipped
    let mut builder = if truncated {
        HttpResponse::PayloadTooLarge()
    } else {
        HttpResponse::Ok()
    };

    Ok(builder
        .insert_header(("X-RateLimit-Remaining", remaining.to_string()))
        .json(response))
}

/// Reads the request body, clipping it at `limit` bytes
///
/// Reading stops at the bound, so a hostile sender cannot buffer more than
/// `limit` bytes per request no matter what Content-Length claims.
async fn read_body_bounded(
    mut payload: web::Payload,
    limit: usize,
) -> AppResult<(Vec<u8>, bool)> {
    let mut buf = BytesMut::new();
    let mut truncated = false;

    while let Some(chunk) = payload.next().await {
        let chunk =
            chunk.map_err(|e| AppError::Validation(format!("Failed to read request body: {}", e)))?;

        if !append_bounded(&mut buf, &chunk, limit) {
            truncated = true;
            break;
        }
    }

    Ok((buf.to_vec(), truncated))
}

/// Appends a chunk to the buffer without exceeding `limit`
///
/// Returns false when the chunk had to be clipped.
fn append_bounded(buf: &mut BytesMut, chunk: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(buf.len());

    if chunk.len() <= room {
        buf.extend_from_slice(chunk);
        true
    } else {
        buf.extend_from_slice(&chunk[..room]);
        false
    }
}

/// Snapshots headers into a JSON object of name -> list of values
fn snapshot_headers(req: &HttpRequest) -> serde_json::Value {
    let mut map = serde_json::Map::new();

    for (name, value) in req.headers() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_string())
            .or_insert_with(|| serde_json::Value::Array(Vec::new()))
            .as_array_mut()
            .expect("header entries are always arrays")
            .push(serde_json::Value::String(value));
    }

    serde_json::Value::Object(map)
}

/// Configures the capture route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/hooks/{token}").route(web::route().to(capture_hook)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use proptest::prelude::*;

    #[test]
    fn test_snapshot_headers_groups_repeated_names() {
        let req = TestRequest::default()
            .insert_header(("content-type", "application/json"))
            .append_header(("x-tag", "a"))
            .append_header(("x-tag", "b"))
            .to_http_request();

        let headers = snapshot_headers(&req);
        assert_eq!(headers["content-type"][0], "application/json");
        assert_eq!(headers["x-tag"][0], "a");
        assert_eq!(headers["x-tag"][1], "b");
    }

    #[test]
    fn test_append_bounded_clips_at_limit() {
        let mut buf = BytesMut::new();
        assert!(append_bounded(&mut buf, b"hello", 8));
        assert!(!append_bounded(&mut buf, b"world", 8));
        assert_eq!(&buf[..], b"hellowor");
    }

    proptest! {
        #[test]
        fn test_append_bounded_never_exceeds_limit(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..16),
            limit in 0usize..128,
        ) {
            let mut buf = BytesMut::new();
            let mut clipped = false;

            for chunk in &chunks {
                if !append_bounded(&mut buf, chunk, limit) {
                    clipped = true;
                    break;
                }
            }

            let total: usize = chunks.iter().map(|c| c.len()).sum();
            prop_assert!(buf.len() <= limit);
            if !clipped {
                prop_assert_eq!(buf.len(), total);
            }
        }
    }
}
