//! Application state for giftbox.
//!
//! Contains the shared state that is passed to all handlers.

use std::sync::Arc;

use crate::config::{RateLimitConfig, ShopifyConfig, UnlockConfig};
use crate::db::DbPool;
use crate::services::{ClientRateLimiter, UnlockPolicy, UnlockService};
use crate::{config, db, Result};

/// Settings the state is built from, separate from the global config so
/// tests can supply their own.
#[derive(Debug, Clone, Default)]
pub struct StateSettings {
    pub unlock: UnlockConfig,
    pub rate_limit: RateLimitConfig,
    pub shopify: ShopifyConfig,
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// Gift unlock flow.
    pub unlock: UnlockService,
    /// Per-client limiter for public gift endpoints.
    pub limiter: ClientRateLimiter,
    /// Shopify webhook settings.
    pub shopify: Arc<ShopifyConfig>,
}

impl AppState {
    /// Create the application state from the global configuration.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        let db = db::init_pool(&config.database.path).await?;
        db::initialize_schema(&db).await?;

        if let Some(token) = &config.auth.bootstrap_token {
            db::ensure_bootstrap_admin(&db, token).await?;
        }

        if config.shopify.webhook_secret.is_none() {
            tracing::warn!("SHOPIFY_WEBHOOK_SECRET is not set; order webhooks will be rejected");
        }

        Ok(Self::with_pool(
            db,
            StateSettings {
                unlock: config.unlock.clone(),
                rate_limit: config.rate_limit.clone(),
                shopify: config.shopify.clone(),
            },
        ))
    }

    /// Build state over an existing pool.
    pub fn with_pool(db: DbPool, settings: StateSettings) -> Self {
        let unlock = UnlockService::new(db.clone(), UnlockPolicy::from(&settings.unlock));
        let limiter = ClientRateLimiter::new(&settings.rate_limit);

        Self {
            db,
            unlock,
            limiter,
            shopify: Arc::new(settings.shopify),
        }
    }
}
