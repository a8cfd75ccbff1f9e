//! Business logic services for giftbox.
//!
//! - `unlock` - gift unlock state machine and PIN handling
//! - `orders` - Shopify order webhook verification and gift matching
//! - `rate_limit` - per-client limiter for public endpoints
//! - `slug` - slugs for shared notes and links

pub mod orders;
pub mod rate_limit;
pub mod slug;
pub mod unlock;

pub use orders::{apply_order, verify_shopify_signature, MatchReport, OrderTopic, ShopifyOrder};
pub use rate_limit::ClientRateLimiter;
pub use unlock::{generate_pin, GiftAccess, UnlockPolicy, UnlockService};
