use serde::Deserialize;

use crate::config::GitHubConfig;
use crate::error::{AppError, AppResult};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_API_URL: &str = "https://api.github.com/user";

/// GitHub OAuth client
///
/// Only the pieces of the flow the session layer needs: build the authorize
/// redirect, exchange the callback code, and read the user's login name.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    config: GitHubConfig,
}

/// The subset of the GitHub user record we consume
#[derive(Debug, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub id: i64,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self { http, config }
    }

    /// URL the browser is redirected to for login
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope=read:user%20user:email&state={}",
            AUTHORIZE_URL, self.config.client_id, self.config.redirect_url, state
        )
    }

    /// Exchanges the callback code for an access token
    pub async fn exchange_code(&self, code: &str) -> AppResult<String> {
        let response = self
            .http
            .post(ACCESS_TOKEN_URL)
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "client_id": self.config.client_id,
                "client_secret": self.config.client_secret,
                "code": code,
                "redirect_uri": self.config.redirect_url,
            }))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("GitHub token exchange failed: {}", e)))?;

        let body: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid GitHub token response: {}", e)))?;

        body.access_token.ok_or_else(|| {
            AppError::Unauthorized(format!(
                "GitHub rejected the authorization code: {}",
                body.error_description.unwrap_or_default()
            ))
        })
    }

    /// Fetches the authenticated user's profile
    pub async fn fetch_user(&self, access_token: &str) -> AppResult<GitHubUser> {
        let response = self
            .http
            .get(USER_API_URL)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", access_token))
            // GitHub's API rejects requests without a User-Agent
            .header("User-Agent", "hookscope")
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("GitHub user lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Unauthorized(format!(
                "GitHub user lookup returned {}",
                response.status()
            )));
        }

        response
            .json::<GitHubUser>()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid GitHub user response: {}", e)))
    }
}
