//! Limit policy for unverified accounts
//!
//! Limits are measured in destination units (`amount_to`). The daily window
//! starts at 00:00 UTC. Verified accounts bypass both checks.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use common::VerificationTier;
use config::LimitsConfig;

/// Which ceiling an order would exceed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "limit", rename_all = "snake_case")]
pub enum LimitBreach {
    PerOrder {
        amount: Decimal,
        ceiling: Decimal,
    },
    DailyVolume {
        volume_today: Decimal,
        amount: Decimal,
        ceiling: Decimal,
    },
}

impl LimitBreach {
    /// Label used for the denial counter
    pub fn label(&self) -> &'static str {
        match self {
            LimitBreach::PerOrder { .. } => "per_order",
            LimitBreach::DailyVolume { .. } => "daily_volume",
        }
    }
}

impl fmt::Display for LimitBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitBreach::PerOrder { amount, ceiling } => {
                write!(f, "order amount {} exceeds per-order limit {}", amount, ceiling)
            }
            LimitBreach::DailyVolume {
                volume_today,
                amount,
                ceiling,
            } => write!(
                f,
                "daily volume {} plus {} exceeds daily limit {}",
                volume_today, amount, ceiling
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitDecision {
    Allow,
    Deny(LimitBreach),
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitDecision::Allow)
    }
}

/// Per-order and daily-volume ceilings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitPolicy {
    per_order_max: Decimal,
    daily_volume_max: Decimal,
}

impl LimitPolicy {
    pub fn new(per_order_max: Decimal, daily_volume_max: Decimal) -> Self {
        Self {
            per_order_max,
            daily_volume_max,
        }
    }

    pub fn from_config(config: &LimitsConfig) -> Self {
        Self::new(config.unverified_order_max, config.unverified_daily_volume_max)
    }

    pub fn per_order_max(&self) -> Decimal {
        self.per_order_max
    }

    pub fn daily_volume_max(&self) -> Decimal {
        self.daily_volume_max
    }

    /// Decide whether an order of `amount` may be created
    ///
    /// `volume_today` is the sum of `amount_to` over the account's orders
    /// created since the start of the current UTC day. Reaching a ceiling
    /// exactly is allowed.
    pub fn check(&self, tier: VerificationTier, amount: Decimal, volume_today: Decimal) -> LimitDecision {
        if tier.is_verified() {
            return LimitDecision::Allow;
        }

        if amount > self.per_order_max {
            return LimitDecision::Deny(LimitBreach::PerOrder {
                amount,
                ceiling: self.per_order_max,
            });
        }

        if volume_today + amount > self.daily_volume_max {
            return LimitDecision::Deny(LimitBreach::DailyVolume {
                volume_today,
                amount,
                ceiling: self.daily_volume_max,
            });
        }

        LimitDecision::Allow
    }
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default())
    }
}

/// 00:00 UTC of the day containing `now`
pub fn start_of_day_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&midnight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn policy() -> LimitPolicy {
        LimitPolicy::new(dec!(100), dec!(500))
    }

    #[test]
    fn test_daily_volume() {
        let policy = policy();
        assert_matches!(
            policy.check(VerificationTier::Unverified, dec!(30), dec!(480)),
            LimitDecision::Deny(LimitBreach::DailyVolume { .. })
        );
        assert!(policy
            .check(VerificationTier::Unverified, dec!(15), dec!(480))
            .is_allowed());
        // Exactly at the ceiling
        assert!(policy
            .check(VerificationTier::Unverified, dec!(20), dec!(480))
            .is_allowed());
    }

    #[test]
    fn test_per_order() {
        let policy = policy();
        let decision = policy.check(VerificationTier::Unverified, dec!(100.01), dec!(0));
        assert_matches!(decision, LimitDecision::Deny(ref breach) if breach.label() == "per_order");
        assert!(policy
            .check(VerificationTier::Unverified, dec!(100), dec!(0))
            .is_allowed());
    }

    #[test]
    fn test_non_verified_tiers_are_limited() {
        let policy = policy();
        for tier in [VerificationTier::Pending, VerificationTier::Rejected] {
            assert!(!policy.check(tier, dec!(101), dec!(0)).is_allowed());
        }
    }

    #[test]
    fn test_verified_bypass() {
        let policy = policy();
        assert!(policy
            .check(VerificationTier::Verified, dec!(10000), dec!(10000))
            .is_allowed());
    }

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 12).unwrap();
        assert_eq!(
            start_of_day_utc(now),
            Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_breach_message() {
        let breach = LimitBreach::DailyVolume {
            volume_today: dec!(480),
            amount: dec!(30),
            ceiling: dec!(500),
        };
        assert_eq!(
            breach.to_string(),
            "daily volume 480 plus 30 exceeds daily limit 500"
        );
    }
}
