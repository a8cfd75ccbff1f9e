//! Gift unlock flow.
//!
//! Decides what a visitor may see of a gift: nothing, a waiting screen
//! until the scheduled date, a PIN prompt, a lockout after too many wrong
//! PINs, or the full content merged with its contributions.
//!
//! The decision itself is pure: `decide` gates a request on the stored
//! gift, its failed-attempt counter and the clock, and `settle_pin` judges
//! a PIN once an attempt slot has been reserved for it. `UnlockService`
//! loads the inputs, reserves the slot and applies the side effects.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::config::UnlockConfig;
use crate::db::{self, DbPool, Gift, UnlockAttempt};
use crate::models::{GiftSummary, GiftView};
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Attempt threshold and window for PIN guessing.
#[derive(Debug, Clone, Copy)]
pub struct UnlockPolicy {
    pub max_attempts: u32,
    pub lockout: Duration,
}

impl From<&UnlockConfig> for UnlockPolicy {
    fn from(config: &UnlockConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            lockout: Duration::seconds(config.lockout_secs as i64),
        }
    }
}

impl Default for UnlockPolicy {
    fn default() -> Self {
        Self::from(&UnlockConfig::default())
    }
}

/// What a visitor gets after asking to open a gift.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GiftAccess {
    NotFound,
    Disabled,
    TimeLocked { unlock_at: DateTime<Utc> },
    RateLimited { retry_after_secs: u64 },
    PinRequired { attempts_remaining: u32 },
    Unlocked(GiftView),
}

impl GiftAccess {
    /// Convert every non-unlocked state into the matching API error.
    pub fn into_result(self, gift_id: &str) -> Result<GiftView> {
        match self {
            Self::Unlocked(view) => Ok(view),
            Self::NotFound => Err(Error::NotFound(format!("Gift not found: {}", gift_id))),
            Self::Disabled => Err(Error::GiftDisabled),
            Self::TimeLocked { unlock_at } => Err(Error::TimeLocked(unlock_at.to_rfc3339())),
            Self::RateLimited { retry_after_secs } => {
                Err(Error::RateLimitExceeded { retry_after_secs })
            }
            Self::PinRequired { attempts_remaining } => {
                Err(Error::PinRequired { attempts_remaining })
            }
        }
    }
}

/// Outcome of the pure decision step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NotFound,
    Disabled,
    TimeLocked(DateTime<Utc>),
    RateLimited { retry_after_secs: u64 },
    NeedPin { attempts_remaining: u32 },
    /// A PIN was supplied. It is only compared under a reserved attempt.
    CheckPin,
    Grant,
}

/// Decide access for one request.
pub fn decide(
    gift: Option<&Gift>,
    attempt: Option<&UnlockAttempt>,
    pin: Option<&str>,
    now: DateTime<Utc>,
    policy: &UnlockPolicy,
) -> Decision {
    let Some(gift) = gift else {
        return Decision::NotFound;
    };

    if gift.disabled {
        return Decision::Disabled;
    }

    if let Some(unlock_at) = gift.unlock_date.filter(|d| *d > now) {
        return Decision::TimeLocked(unlock_at);
    }

    if !gift.locked {
        return Decision::Grant;
    }

    // Failures only count inside a live window
    let live = attempt.filter(|a| now < a.window_started_at + policy.lockout);
    let failed = live.map(|a| a.failed_count.max(0) as u32).unwrap_or(0);

    if failed >= policy.max_attempts {
        return Decision::RateLimited {
            retry_after_secs: lockout_remaining(live, now, policy),
        };
    }

    match candidate_pin(pin) {
        None => Decision::NeedPin {
            attempts_remaining: policy.max_attempts - failed,
        },
        Some(_) => Decision::CheckPin,
    }
}

/// Judge a PIN against the gift once `slot` was reserved for it.
///
/// The slot already counts this attempt, so a wrong PIN that fills the
/// window locks the gift right away.
pub fn settle_pin(
    gift: &Gift,
    slot: &UnlockAttempt,
    candidate: &str,
    now: DateTime<Utc>,
    policy: &UnlockPolicy,
) -> Decision {
    if pin_matches(&gift.id, &gift.access_pin, candidate) {
        return Decision::Grant;
    }

    let failed = slot.failed_count.max(0) as u32;
    if failed >= policy.max_attempts {
        Decision::RateLimited {
            retry_after_secs: lockout_remaining(Some(slot), now, policy),
        }
    } else {
        Decision::NeedPin {
            attempts_remaining: policy.max_attempts - failed,
        }
    }
}

/// Seconds until the window of `attempt` closes, at least one.
fn lockout_remaining(
    attempt: Option<&UnlockAttempt>,
    now: DateTime<Utc>,
    policy: &UnlockPolicy,
) -> u64 {
    let ends = attempt
        .map(|a| a.window_started_at + policy.lockout)
        .unwrap_or(now + policy.lockout);
    (ends - now).num_seconds().max(1) as u64
}

fn candidate_pin(pin: Option<&str>) -> Option<&str> {
    pin.map(str::trim).filter(|p| !p.is_empty())
}

/// Compare a PIN attempt against the stored PIN in constant time.
///
/// Both sides are MACed under the gift id so the comparison runs over
/// fixed-length digests regardless of PIN length.
pub fn pin_matches(gift_id: &str, stored: &str, candidate: &str) -> bool {
    let digest = |value: &str| -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(gift_id.as_bytes()).ok()?;
        mac.update(value.trim().as_bytes());
        Some(mac)
    };

    let (Some(expected), Some(attempt)) = (digest(stored), digest(candidate)) else {
        return false;
    };
    let expected = expected.finalize().into_bytes();
    attempt.verify_slice(&expected).is_ok()
}

/// Generate a random 6-digit access PIN.
pub fn generate_pin() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
}

/// Loads gifts and applies unlock outcomes.
#[derive(Clone)]
pub struct UnlockService {
    db: DbPool,
    policy: UnlockPolicy,
}

impl UnlockService {
    pub fn new(db: DbPool, policy: UnlockPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &UnlockPolicy {
        &self.policy
    }

    /// Public preview of a gift.
    pub async fn summary(&self, gift_id: &str) -> Result<GiftSummary> {
        let gift = db::get_gift(&self.db, gift_id).await?;
        let contributions = db::count_contributions(&self.db, gift_id).await?;
        Ok(GiftSummary::from_gift(&gift, contributions))
    }

    /// Run the unlock flow for one request.
    pub async fn unlock(
        &self,
        gift_id: &str,
        pin: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<GiftAccess> {
        let gift = db::get_gift_optional(&self.db, gift_id).await?;
        let attempt = match &gift {
            Some(g) if g.locked => db::get_unlock_attempt(&self.db, &g.id).await?,
            _ => None,
        };

        let mut decision = decide(gift.as_ref(), attempt.as_ref(), pin, now, &self.policy);
        let mut reserved = false;

        if decision == Decision::CheckPin {
            if let (Some(g), Some(candidate)) = (gift.as_ref(), candidate_pin(pin)) {
                let expired_before = now - self.policy.lockout;
                decision = match db::reserve_unlock_attempt(
                    &self.db,
                    &g.id,
                    now,
                    expired_before,
                    self.policy.max_attempts,
                )
                .await?
                {
                    Some(slot) => {
                        reserved = true;
                        settle_pin(g, &slot, candidate, now, &self.policy)
                    }
                    // Another request filled the window since the snapshot
                    None => {
                        let current = db::get_unlock_attempt(&self.db, &g.id).await?;
                        Decision::RateLimited {
                            retry_after_secs: lockout_remaining(
                                current.as_ref(),
                                now,
                                &self.policy,
                            ),
                        }
                    }
                };
            }
        }
        debug!(gift_id = %gift_id, decision = ?decision, "Unlock decision");

        let access = match decision {
            Decision::NotFound => GiftAccess::NotFound,
            Decision::Disabled => GiftAccess::Disabled,
            Decision::TimeLocked(unlock_at) => GiftAccess::TimeLocked { unlock_at },
            Decision::RateLimited { retry_after_secs } => {
                warn!(gift_id = %gift_id, retry_after_secs, "Unlock refused, too many attempts");
                GiftAccess::RateLimited { retry_after_secs }
            }
            Decision::NeedPin { attempts_remaining } => {
                GiftAccess::PinRequired { attempts_remaining }
            }
            // Only reachable without a gift or a PIN, which `decide` rules out
            Decision::CheckPin => GiftAccess::PinRequired {
                attempts_remaining: self.policy.max_attempts,
            },
            Decision::Grant => {
                // Decision::Grant implies the gift exists
                let Some(gift) = gift else {
                    return Ok(GiftAccess::NotFound);
                };
                if reserved || attempt.is_some() {
                    db::reset_unlock_attempts(&self.db, &gift.id).await?;
                }
                let first_view = !gift.viewed;
                let gift = db::mark_gift_viewed(&self.db, &gift.id, now).await?;
                let contributions = db::list_contributions(&self.db, &gift.id).await?;
                if first_view {
                    info!(gift_id = %gift.id, "Gift opened for the first time");
                }
                GiftAccess::Unlocked(GiftView::merge(gift, contributions))
            }
        };

        Ok(access)
    }
}
