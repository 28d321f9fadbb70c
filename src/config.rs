use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub quota: QuotaConfig,
    pub security: SecurityConfig,
    pub github: Option<GitHubConfig>,
    /// Dashboard URL used for post-login redirects and the CORS origin
    pub frontend_url: String,
    /// How often the background sweep removes expired tokens
    pub sweep_interval: Duration,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

/// Quota and retention configuration
///
/// Ceilings are per token per TTL window; the window resets when the token
/// expires or is reset.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Max captures for anonymous tokens
    pub tier_ceiling_basic: i64,
    /// Max captures for tokens owned by a logged-in user
    pub tier_ceiling_privileged: i64,
    /// Token lifetime in seconds
    pub default_ttl_seconds: i64,
    /// Retention cap: oldest entries are evicted past this count
    pub max_entries_per_token: i64,
    /// Bodies above this size are truncated at capture
    pub max_body_bytes: usize,
}

/// Security configuration for production deployments
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// True if server is behind a proxy that terminates SSL (nginx, Cloudflare, etc.)
    /// When true: cookie_secure=true is enabled
    pub ssl_proxy: bool,
    /// Session encryption key (64+ hex chars). Required when ssl_proxy=true
    pub session_secret_key: Option<String>,
}

/// GitHub OAuth application credentials; login is disabled when absent
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            database: DatabaseConfig::from_env(),
            quota: QuotaConfig::from_env(),
            security: SecurityConfig::from_env()?,
            github: GitHubConfig::from_env(),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173/dashboard".to_string()),
            sweep_interval: Duration::from_secs(
                env::var("SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            ),
        })
    }
}

impl QuotaConfig {
    /// Load quota configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            tier_ceiling_basic: env::var("BASIC_TIER_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
            tier_ceiling_privileged: env::var("PRIVILEGED_TIER_LIMIT")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            default_ttl_seconds: env::var("TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86400),
            max_entries_per_token: env::var("MAX_ENTRIES_PER_TOKEN")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .unwrap_or_else(|_| "262144".to_string())
                .parse()
                .unwrap_or(262_144),
        }
    }

    /// Quota ceiling for a token tier
    pub fn ceiling_for(&self, privileged: bool) -> i64 {
        if privileged {
            self.tier_ceiling_privileged
        } else {
            self.tier_ceiling_basic
        }
    }
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://hookscope.db".to_string()),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            busy_timeout: Duration::from_secs(
                env::var("DATABASE_BUSY_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            ),
        }
    }
}

impl SecurityConfig {
    /// Load security configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_secret_key = env::var("SESSION_SECRET_KEY").ok();

        let ssl_proxy = env::var("SSL_PROXY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        // When SSL_PROXY is enabled, SESSION_SECRET_KEY is required
        if ssl_proxy && session_secret_key.is_none() {
            return Err(ConfigError::MissingSessionSecret);
        }

        Ok(Self {
            ssl_proxy,
            session_secret_key,
        })
    }
}

impl GitHubConfig {
    /// Load GitHub OAuth configuration; None when the app is not registered
    pub fn from_env() -> Option<Self> {
        let client_id = env::var("GITHUB_CLIENT_ID").ok()?;
        let client_secret = env::var("GITHUB_CLIENT_SECRET").ok()?;

        Some(Self {
            client_id,
            client_secret,
            redirect_url: env::var("OAUTH_REDIRECT_URL").unwrap_or_else(|_| {
                "http://localhost:8080/api/auth/github/callback".to_string()
            }),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    MissingSessionSecret,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "PORT must be a valid number"),
            ConfigError::MissingSessionSecret => {
                write!(
                    f,
                    "SESSION_SECRET_KEY is required when SSL_PROXY is enabled"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
