pub mod auth;
pub mod health;
pub mod hooks;
pub mod logs;
pub mod tokens;

use crate::auth::SessionIdentity;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::Token;
use crate::services::TokenRegistry;

/// Resolves a cookie session to the token it manages
///
/// This is the ownership boundary for every management operation: a
/// logged-in user reaches the token owned by their username, an anonymous
/// session only the token id it was handed at creation. The registry itself
/// stays unaware of sessions.
pub(crate) async fn resolve_session_token(
    pool: &DbPool,
    identity: &SessionIdentity,
) -> AppResult<Token> {
    if let Some(username) = &identity.username {
        return TokenRegistry::find_by_owner(pool, username)
            .await?
            .ok_or(AppError::NoToken);
    }

    if let Some(token_id) = &identity.token_id {
        return match TokenRegistry::get(pool, token_id).await {
            Ok(token) => Ok(token),
            // The binding outlived the token (reset elsewhere, or swept)
            Err(AppError::NotFound(_)) => Err(AppError::NoToken),
            Err(e) => Err(e),
        };
    }

    Err(AppError::NoToken)
}
