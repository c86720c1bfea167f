//! # Referral Module
//!
//! Per-user referral accounts and the discount they accumulate. Discounts are
//! earned outside the bot; the ordering flow only reads and consumes them.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::store::{ReferralStore, StoreResult};

pub const DISCOUNT_STEP: u8 = 10;
pub const MAX_DISCOUNT: u8 = 50;
pub const CODE_LENGTH: usize = 8;
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralAccount {
    pub user_id: i64,
    pub code: String,
    pub referrer_code: Option<String>,
    pub total_referrals: u32,
    pub discount_percent: u8,
    pub created_at: DateTime<Utc>,
}

impl ReferralAccount {
    pub fn new(user_id: i64, code: String, referrer_code: Option<String>) -> Self {
        Self {
            user_id,
            code,
            referrer_code,
            total_referrals: 0,
            discount_percent: 0,
            created_at: Utc::now(),
        }
    }
}

/// Round down to a multiple of [`DISCOUNT_STEP`] and cap at [`MAX_DISCOUNT`]
pub fn clamp_discount(percent: u8) -> u8 {
    let capped = percent.min(MAX_DISCOUNT);
    capped - capped % DISCOUNT_STEP
}

pub fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect()
}

/// Referral bookkeeping on top of a [`ReferralStore`]
#[derive(Clone)]
pub struct ReferralLedger {
    store: Arc<dyn ReferralStore>,
}

impl ReferralLedger {
    pub fn new(store: Arc<dyn ReferralStore>) -> Self {
        Self { store }
    }

    /// Create the user's account on first contact
    ///
    /// Registering an existing user returns the stored account untouched.
    /// An unknown referrer code, or the user's own code, is dropped.
    pub async fn register(
        &self,
        user_id: i64,
        referrer_code: Option<&str>,
    ) -> StoreResult<ReferralAccount> {
        if let Some(existing) = self.store.account(user_id).await? {
            return Ok(existing);
        }

        let referrer_code = match referrer_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => match self.store.find_by_code(code).await? {
                Some(referrer) if referrer.user_id != user_id => Some(referrer.code),
                _ => {
                    debug!(user_id, code, "Ignoring unknown referrer code");
                    None
                }
            },
            None => None,
        };

        for _ in 0..MAX_CODE_ATTEMPTS {
            let account = ReferralAccount::new(user_id, generate_code(), referrer_code.clone());
            match self.store.insert_if_absent(account).await {
                Ok(stored) => {
                    info!(user_id, code = %stored.code, "Referral account ready");
                    return Ok(stored);
                }
                Err(StoreError::Conflict(reason)) => {
                    warn!(user_id, reason = %reason, "Referral code collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::Conflict(format!(
            "could not allocate a referral code for user {user_id}"
        )))
    }

    pub async fn account(&self, user_id: i64) -> StoreResult<Option<ReferralAccount>> {
        self.store.account(user_id).await
    }

    pub async fn get_discount(&self, user_id: i64) -> StoreResult<u8> {
        Ok(self
            .store
            .account(user_id)
            .await?
            .map(|account| account.discount_percent)
            .unwrap_or(0))
    }

    /// Atomically zero the discount, returning the amount consumed
    ///
    /// Two concurrent calls for one user consume the discount once; the
    /// second caller gets 0.
    pub async fn consume_discount(&self, user_id: i64) -> StoreResult<u8> {
        let consumed = self.store.take_discount(user_id).await?;
        if consumed > 0 {
            info!(user_id, percent = consumed, "Discount consumed");
        }
        Ok(consumed)
    }

    pub async fn restore_discount(&self, user_id: i64, percent: u8) -> StoreResult<()> {
        if percent == 0 {
            return Ok(());
        }
        warn!(user_id, percent, "Restoring discount after failed order");
        self.store.restore_discount(user_id, percent).await
    }
}
