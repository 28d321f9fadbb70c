use actix_session::Session;
use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::error::{AppError, AppResult};

const SESSION_USERNAME_KEY: &str = "username";
const SESSION_TOKEN_ID_KEY: &str = "token_id";
const SESSION_OAUTH_STATE_KEY: &str = "oauth_state";

/// Store the GitHub username in the session (login)
pub fn set_session_username(session: &Session, username: &str) -> AppResult<()> {
    session
        .insert(SESSION_USERNAME_KEY, username)
        .map_err(|e| AppError::Internal(format!("Failed to set session: {}", e)))
}

/// Bind a token id to the session (anonymous users and post-login)
pub fn set_session_token_id(session: &Session, token_id: &str) -> AppResult<()> {
    session
        .insert(SESSION_TOKEN_ID_KEY, token_id)
        .map_err(|e| AppError::Internal(format!("Failed to set session: {}", e)))
}

/// Stash the OAuth state nonce for the callback round-trip
pub fn set_oauth_state(session: &Session, state: &str) -> AppResult<()> {
    session
        .insert(SESSION_OAUTH_STATE_KEY, state)
        .map_err(|e| AppError::Internal(format!("Failed to set session: {}", e)))
}

/// Take the OAuth state nonce, clearing it so it is single-use
pub fn take_oauth_state(session: &Session) -> Option<String> {
    let state = session.get::<String>(SESSION_OAUTH_STATE_KEY).ok().flatten();
    session.remove(SESSION_OAUTH_STATE_KEY);
    state
}

/// Clear session (logout)
pub fn clear_session(session: &Session) {
    session.purge();
}

/// What the cookie session says about the caller
///
/// Extraction never fails: both fields are optional, and each management
/// route decides what an absent binding means (`NoTokenYet`, `Unauthorized`).
pub struct SessionIdentity {
    pub username: Option<String>,
    pub token_id: Option<String>,
}

impl FromRequest for SessionIdentity {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let identity = match Session::from_request(req, payload).into_inner() {
            Ok(session) => SessionIdentity {
                username: session.get::<String>(SESSION_USERNAME_KEY).ok().flatten(),
                token_id: session.get::<String>(SESSION_TOKEN_ID_KEY).ok().flatten(),
            },
            Err(_) => SessionIdentity {
                username: None,
                token_id: None,
            },
        };

        ready(Ok(identity))
    }
}
