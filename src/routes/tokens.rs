use actix_session::Session;
use actix_web::{web, HttpResponse};
use chrono::Utc;

use crate::auth::{set_session_token_id, SessionIdentity};
use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::routes::resolve_session_token;
use crate::services::TokenRegistry;

/// Response for `/api/reset`
#[derive(serde::Serialize)]
struct ResetResponse {
    new_token: String,
    privileged: bool,
    limit: i64,
    ttl_seconds: i64,
}

/// GET /api/create
/// Issues a capture token. Works without a login (anonymous trial use); a
/// session that already holds a live token gets that token back unchanged.
pub async fn create_token(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    session: Session,
    identity: SessionIdentity,
) -> AppResult<HttpResponse> {
    let now = Utc::now();

    // Logged-in users hold one privileged token, keyed by username
    if let Some(username) = &identity.username {
        let (token, created) = match TokenRegistry::find_by_owner(pool.get_ref(), username).await? {
            Some(token) if !token.is_expired(now) => (token, false),
            Some(expired) => (
                TokenRegistry::reset(pool.get_ref(), &expired, &config.quota).await?,
                true,
            ),
            None => (
                TokenRegistry::create(pool.get_ref(), Some(username.as_str()), &config.quota)
                    .await?,
                true,
            ),
        };

        set_session_token_id(&session, &token.id)?;
        return Ok(HttpResponse::Ok().json(token.to_created_response(now, created)));
    }

    // Anonymous: reuse the live token already bound to this browser
    if let Some(token_id) = &identity.token_id {
        if let Ok(token) = TokenRegistry::get(pool.get_ref(), token_id).await {
            if !token.is_expired(now) {
                return Ok(HttpResponse::Ok().json(token.to_created_response(now, false)));
            }
        }
    }

    let token = TokenRegistry::create(pool.get_ref(), None, &config.quota).await?;
    set_session_token_id(&session, &token.id)?;

    log::info!("Issued anonymous token {}", token.id);
    Ok(HttpResponse::Ok().json(token.to_created_response(now, true)))
}

/// GET /api/status
/// Quota and TTL state for the session's current token.
pub async fn token_status(
    pool: web::Data<DbPool>,
    identity: SessionIdentity,
) -> AppResult<HttpResponse> {
    let token = resolve_session_token(pool.get_ref(), &identity).await?;
    let now = Utc::now();

    if token.is_expired(now) {
        return Err(AppError::Expired(token.id));
    }

    Ok(HttpResponse::Ok().json(token.to_status_response(now)))
}

/// POST /api/reset
/// Destroys the session's token (and all its logs) and reissues a fresh
/// one. The dashboard reloads afterwards because the capture URL changes.
pub async fn reset_token(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    session: Session,
    identity: SessionIdentity,
) -> AppResult<HttpResponse> {
    let old = resolve_session_token(pool.get_ref(), &identity).await?;
    let token = TokenRegistry::reset(pool.get_ref(), &old, &config.quota).await?;

    set_session_token_id(&session, &token.id)?;
    log::info!("Token {} reset to {}", old.id, token.id);

    Ok(HttpResponse::Ok().json(ResetResponse {
        ttl_seconds: token.ttl_seconds(Utc::now()),
        new_token: token.id,
        privileged: token.privileged,
        limit: token.quota_limit,
    }))
}

/// Configure token management routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/create", web::get().to(create_token))
        .route("/api/status", web::get().to(token_status))
        .route("/api/reset", web::post().to(reset_token));
}
