use actix_web::{web, HttpResponse};
use chrono::Utc;

use crate::auth::SessionIdentity;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::routes::resolve_session_token;
use crate::services::WebhookStore;

/// GET /api/logs
/// Captured requests for the session's token, oldest first.
pub async fn list_logs(
    pool: web::Data<DbPool>,
    identity: SessionIdentity,
) -> AppResult<HttpResponse> {
    let token = resolve_session_token(pool.get_ref(), &identity).await?;

    if token.is_expired(Utc::now()) {
        return Err(AppError::Expired(token.id));
    }

    let entries = WebhookStore::list(pool.get_ref(), &token.id).await?;
    let responses: Vec<_> = entries.iter().map(|e| e.to_response()).collect();

    Ok(HttpResponse::Ok().json(responses))
}

/// DELETE /api/logs/{id}
/// Removes one entry. Deleting an id that is already gone is not an error
/// (the dashboard deletes and refreshes regardless), but an entry owned by
/// another token is firmly rejected.
pub async fn delete_log(
    pool: web::Data<DbPool>,
    identity: SessionIdentity,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let token = resolve_session_token(pool.get_ref(), &identity).await?;
    let entry_id = path.into_inner();

    match WebhookStore::get(pool.get_ref(), &entry_id).await? {
        None => Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": false }))),
        Some(entry) if entry.token_id != token.id => Err(AppError::Forbidden(
            "Log entry belongs to a different token".to_string(),
        )),
        Some(entry) => {
            let deleted = WebhookStore::delete(pool.get_ref(), &entry.id).await?;
            Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": deleted })))
        }
    }
}

/// Configure log routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/logs", web::get().to(list_logs))
        .route("/api/logs/{id}", web::delete().to(delete_log));
}
