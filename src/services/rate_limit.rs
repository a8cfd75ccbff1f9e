//! Per-client rate limiting for the public gift endpoints.
//!
//! Complements the per-gift PIN counter: that one stops guessing against a
//! single gift, this one stops a single client hammering many gifts.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter as GovernorLimiter,
};

use crate::config::RateLimitConfig;
use crate::{AppState, Error};

type KeyedLimiter = GovernorLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Keyed limiter over client addresses.
#[derive(Clone)]
pub struct ClientRateLimiter {
    limiter: Arc<KeyedLimiter>,
    clock: DefaultClock,
    trust_forwarded_for: bool,
}

impl ClientRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_minute = NonZeroU32::new(config.public_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(GovernorLimiter::keyed(Quota::per_minute(per_minute))),
            clock: DefaultClock::default(),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }

    /// Key for the client behind `req` under this limiter's proxy setting.
    pub fn client_key(&self, req: &Request<Body>) -> String {
        client_key(req, self.trust_forwarded_for)
    }

    /// Admit one request from `client`, or report how long to wait.
    pub fn check(&self, client: &str) -> Result<(), Error> {
        self.limiter.check_key(&client.to_string()).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            Error::RateLimitExceeded {
                retry_after_secs: wait.as_secs().max(1),
            }
        })
    }

    /// Drop state for clients that are back under their quota.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Start a background task that prunes idle clients periodically.
    pub fn start_pruning(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                limiter.prune();
                tracing::trace!(clients = limiter.limiter.len(), "Pruned rate limiter state");
            }
        })
    }
}

/// Identify the client by its socket peer.
///
/// With `trust_forwarded_for` the first `X-Forwarded-For` hop wins. Direct
/// clients control that header, so it is ignored unless a proxy sets it.
pub fn client_key(req: &Request<Body>, trust_forwarded_for: bool) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded_for)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware applying the client limiter.
pub async fn limit_public(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let client = state.limiter.client_key(&req);
    if let Err(e) = state.limiter.check(&client) {
        tracing::warn!(client = %client, path = %req.uri().path(), "Public rate limit hit");
        return Err(e);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_blocks_after_quota() {
        let limiter = ClientRateLimiter::new(&RateLimitConfig {
            public_per_minute: 2,
            ..Default::default()
        });
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_ok());
        match limiter.check("10.0.0.1") {
            Err(Error::RateLimitExceeded { retry_after_secs }) => assert!(retry_after_secs >= 1),
            other => panic!("expected rate limit, got {:?}", other),
        }
        // Other clients are unaffected
        assert!(limiter.check("10.0.0.2").is_ok());
    }

    fn from_peer(peer: &str, forwarded: &str) -> Request<Body> {
        let mut req = Request::builder()
            .header("x-forwarded-for", forwarded)
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[test]
    fn test_client_key_uses_peer_by_default() {
        let req = from_peer("192.0.2.4:5555", "203.0.113.9, 10.0.0.1");
        assert_eq!(client_key(&req, false), "192.0.2.4");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare, false), "unknown");
    }

    #[test]
    fn test_client_key_trusts_proxy_header_when_configured() {
        let req = from_peer("10.0.0.1:443", "203.0.113.9, 10.0.0.1");
        assert_eq!(client_key(&req, true), "203.0.113.9");
    }
}
