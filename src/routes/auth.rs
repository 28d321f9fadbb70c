use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::auth::{
    self, generate_token_id, GitHubClient, SessionIdentity,
};
use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::TokenRegistry;

#[derive(Serialize)]
struct MeResponse {
    logged_in: bool,
    username: String,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

fn github_client(data: &web::Data<Option<GitHubClient>>) -> AppResult<&GitHubClient> {
    data.get_ref()
        .as_ref()
        .ok_or_else(|| AppError::Validation("GitHub OAuth is not configured".to_string()))
}

/// GET /api/auth/github
/// Redirects the browser to GitHub's consent screen.
pub async fn github_login(
    github: web::Data<Option<GitHubClient>>,
    session: Session,
) -> AppResult<HttpResponse> {
    let client = github_client(&github)?;

    // Single-use nonce, verified on the callback
    let state = generate_token_id();
    auth::set_oauth_state(&session, &state)?;

    Ok(HttpResponse::Found()
        .insert_header(("Location", client.authorize_url(&state)))
        .finish())
}

/// GET /api/auth/github/callback
/// Completes the login: exchanges the code, binds the user to their
/// privileged token and sends the browser back to the dashboard.
pub async fn github_callback(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    github: web::Data<Option<GitHubClient>>,
    session: Session,
    query: web::Query<CallbackQuery>,
) -> AppResult<HttpResponse> {
    let client = github_client(&github)?;

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::Validation("Missing code in callback".to_string()))?;

    let expected = auth::take_oauth_state(&session);
    if expected.is_none() || expected.as_deref() != query.state.as_deref() {
        return Err(AppError::Unauthorized("OAuth state mismatch".to_string()));
    }

    let access_token = client.exchange_code(code).await?;
    let user = client.fetch_user(&access_token).await?;

    let token =
        TokenRegistry::find_or_create_for_owner(pool.get_ref(), &user.login, &config.quota).await?;

    auth::set_session_username(&session, &user.login)?;
    auth::set_session_token_id(&session, &token.id)?;

    log::info!("User {} logged in", user.login);

    Ok(HttpResponse::Found()
        .insert_header(("Location", format!("{}?login=1", config.frontend_url)))
        .finish())
}

/// GET /api/me
/// Identity of the logged-in user, 401 otherwise.
pub async fn current_user(identity: SessionIdentity) -> AppResult<HttpResponse> {
    match identity.username {
        Some(username) => Ok(HttpResponse::Ok().json(MeResponse {
            logged_in: true,
            username,
        })),
        None => Err(AppError::Unauthorized("No active session".to_string())),
    }
}

/// GET /api/logout
/// Clears the session. The anonymous token bound to it (if any) keeps
/// accepting captures until it expires; only the browser's binding is gone.
pub async fn logout(config: web::Data<Config>, session: Session) -> impl Responder {
    auth::clear_session(&session);

    HttpResponse::Found()
        .insert_header(("Location", format!("{}?logout=1", config.frontend_url)))
        .finish()
}

/// Configure auth routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/auth/github", web::get().to(github_login))
        .route("/api/auth/github/callback", web::get().to(github_callback))
        .route("/api/me", web::get().to(current_user))
        .route("/api/logout", web::get().to(logout));
}
