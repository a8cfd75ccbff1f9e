//! Configuration management for giftbox.
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present) once, at startup.

use std::env;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub shopify: ShopifyConfig,
    pub unlock: UnlockConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_url: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct ShopifyConfig {
    /// Shared secret used to sign order webhooks. Webhooks are refused when unset.
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UnlockConfig {
    /// Failed PIN attempts allowed inside one window.
    pub max_attempts: u32,
    /// Length of the attempt window, and of the lockout once it is exhausted.
    pub lockout_secs: u64,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 900,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per minute per client IP on the public gift endpoints.
    pub public_per_minute: u32,
    /// Key clients on the first `X-Forwarded-For` hop. Only safe behind a
    /// proxy that overwrites the header; otherwise the socket peer is used.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            public_per_minute: 30,
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Token seeded as an admin credential on startup.
    pub bootstrap_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "8787").parse().unwrap_or(8787),
                public_url: env_or("PUBLIC_URL", "http://localhost:8787"),
                json_logs: env_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/giftbox.db"),
            },
            shopify: ShopifyConfig {
                webhook_secret: env::var("SHOPIFY_WEBHOOK_SECRET")
                    .ok()
                    .filter(|s| !s.is_empty()),
            },
            unlock: UnlockConfig {
                max_attempts: env_or("UNLOCK_MAX_ATTEMPTS", "5").parse().unwrap_or(5),
                lockout_secs: env_or("UNLOCK_LOCKOUT_SECS", "900").parse().unwrap_or(900),
            },
            rate_limit: RateLimitConfig {
                public_per_minute: env_or("PUBLIC_RATE_PER_MINUTE", "30")
                    .parse()
                    .unwrap_or(30),
                trust_forwarded_for: env_flag("TRUST_PROXY_HEADERS"),
            },
            auth: AuthConfig {
                bootstrap_token: env::var("ADMIN_BOOTSTRAP_TOKEN")
                    .ok()
                    .filter(|s| !s.is_empty()),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    matches!(
        env::var(key).map(|v| v.to_ascii_lowercase()).as_deref(),
        Ok("1" | "true" | "yes")
    )
}
