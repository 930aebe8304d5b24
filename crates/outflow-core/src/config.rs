//! Pricing and dispatch configuration.
//!
//! Components receive these as immutable values at construction; there is
//! no global settings singleton.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Credit pricing for metered operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Credits charged per outbound message.
    pub credits_per_send: i64,

    /// Credits charged per email verification.
    pub credits_per_verify: i64,

    /// Credits charged per resume scan.
    pub credits_per_resume_scan: i64,

    /// One-time reward credited to a referrer.
    pub referral_reward_credits: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            credits_per_send: 5,
            credits_per_verify: 1,
            credits_per_resume_scan: 20,
            referral_reward_credits: 25,
        }
    }
}

/// Dispatch pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Provider-imposed daily send ceiling, shared by all accounts.
    pub daily_send_cap: u64,

    /// Maximum records claimed per dispatcher run.
    pub batch_size: usize,

    /// Delay before the first message of a scheduling call becomes due.
    pub initial_delay: Duration,

    /// Stagger between successive recipients of one scheduling call.
    /// Keeps sends under per-minute provider quotas.
    pub stagger: Duration,

    /// Maximum recipients resolved per scheduling call.
    pub max_recipients: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            daily_send_cap: 250,
            batch_size: 50,
            initial_delay: Duration::from_secs(60),
            stagger: Duration::from_secs(30),
            max_recipients: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_pricing() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.credits_per_send, 5);
        assert_eq!(pricing.referral_reward_credits, 25);

        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.daily_send_cap, 250);
        assert_eq!(dispatch.batch_size, 50);
        assert_eq!(dispatch.initial_delay, Duration::from_secs(60));
        assert_eq!(dispatch.stagger, Duration::from_secs(30));
    }
}
