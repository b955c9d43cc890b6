//! # Loyalty Accrual & Redemption (pure part)
//!
//! Point math, tier derivation and redemption capping. Storage and the
//! guarded balance updates live in `grocer-db::service::loyalty`.
//!
//! ## Point Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EARN                                                                   │
//! │   sale_total ─► ≥ min_purchase? ─► total / spend_per_point             │
//! │                                    × multiplier(current tier)          │
//! │                                    round to 0.01                       │
//! │        balance  += points                                               │
//! │        lifetime += points ─► tier_for(lifetime)                         │
//! │                                                                         │
//! │  REDEEM                                                                 │
//! │   points ─► ≥ min_points? ≤ balance?                                   │
//! │        discount = points × value_per_point                             │
//! │        cap      = sale_total × max_redemption                          │
//! │        discount > cap ─► discount = cap,                               │
//! │                          points   = floor(cap / value_per_point)       │
//! │        balance  -= points        (lifetime untouched)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::LoyaltyTier;

// =============================================================================
// Settings
// =============================================================================

/// Lifetime-point thresholds. Bronze always starts at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TierThresholds {
    pub silver: f64,
    pub gold: f64,
    pub platinum: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        TierThresholds {
            silver: 500.0,
            gold: 2000.0,
            platinum: 5000.0,
        }
    }
}

/// Earning multiplier per tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TierMultipliers {
    pub bronze: f64,
    pub silver: f64,
    pub gold: f64,
    pub platinum: f64,
}

impl TierMultipliers {
    pub fn for_tier(&self, tier: LoyaltyTier) -> f64 {
        match tier {
            LoyaltyTier::Bronze => self.bronze,
            LoyaltyTier::Silver => self.silver,
            LoyaltyTier::Gold => self.gold,
            LoyaltyTier::Platinum => self.platinum,
        }
    }
}

impl Default for TierMultipliers {
    fn default() -> Self {
        TierMultipliers {
            bronze: 1.0,
            silver: 1.2,
            gold: 1.5,
            platinum: 2.0,
        }
    }
}

/// The store's single loyalty program record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct LoyaltySettings {
    pub enabled: bool,
    /// Money spent to earn one point (before the tier multiplier).
    pub spend_per_point_cents: i64,
    /// Money value of one point at redemption.
    pub value_per_point_cents: i64,
    /// Sales below this total earn nothing.
    pub min_purchase_for_points_cents: i64,
    pub min_points_for_redemption: i64,
    /// Largest share of a sale that points may pay for, in bps.
    pub max_redemption_bps: u32,
    /// Earned points expire after this many days. `None` means never.
    pub points_expiry_days: Option<u32>,
    pub tier_thresholds: TierThresholds,
    pub tier_multipliers: TierMultipliers,
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        LoyaltySettings {
            enabled: true,
            spend_per_point_cents: 100,
            value_per_point_cents: 100,
            min_purchase_for_points_cents: 0,
            min_points_for_redemption: 10,
            max_redemption_bps: 5000,
            points_expiry_days: None,
            tier_thresholds: TierThresholds::default(),
            tier_multipliers: TierMultipliers::default(),
        }
    }
}

impl LoyaltySettings {
    /// Checks internal consistency before the record is stored.
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |reason: &str| {
            Err(CoreError::InvalidSettings {
                reason: reason.to_string(),
            })
        };

        if self.spend_per_point_cents <= 0 {
            return invalid("spend_per_point must be positive");
        }
        if self.value_per_point_cents <= 0 {
            return invalid("value_per_point must be positive");
        }
        if self.min_purchase_for_points_cents < 0 || self.min_points_for_redemption < 0 {
            return invalid("minimums must not be negative");
        }
        if self.max_redemption_bps > 10000 {
            return invalid("max_redemption must be between 0% and 100%");
        }

        let t = &self.tier_thresholds;
        if !(t.silver > 0.0 && t.silver < t.gold && t.gold < t.platinum && t.platinum.is_finite()) {
            return invalid("tier thresholds must be strictly increasing above zero");
        }

        let m = &self.tier_multipliers;
        if [m.bronze, m.silver, m.gold, m.platinum]
            .iter()
            .any(|x| !x.is_finite() || *x <= 0.0)
        {
            return invalid("tier multipliers must be positive");
        }

        Ok(())
    }
}

// =============================================================================
// Tiers
// =============================================================================

/// Tier implied by a lifetime points total.
///
/// ## Example
/// ```rust
/// use grocer_core::loyalty::{tier_for, TierThresholds};
/// use grocer_core::types::LoyaltyTier;
///
/// let t = TierThresholds::default();
/// assert_eq!(tier_for(499.99, &t), LoyaltyTier::Bronze);
/// assert_eq!(tier_for(500.0, &t), LoyaltyTier::Silver);
/// assert_eq!(tier_for(5000.0, &t), LoyaltyTier::Platinum);
/// ```
pub fn tier_for(lifetime_points: f64, thresholds: &TierThresholds) -> LoyaltyTier {
    if lifetime_points >= thresholds.platinum {
        LoyaltyTier::Platinum
    } else if lifetime_points >= thresholds.gold {
        LoyaltyTier::Gold
    } else if lifetime_points >= thresholds.silver {
        LoyaltyTier::Silver
    } else {
        LoyaltyTier::Bronze
    }
}

/// Next tier above `tier` and the lifetime total that reaches it.
pub fn next_tier(tier: LoyaltyTier, thresholds: &TierThresholds) -> Option<(LoyaltyTier, f64)> {
    match tier {
        LoyaltyTier::Bronze => Some((LoyaltyTier::Silver, thresholds.silver)),
        LoyaltyTier::Silver => Some((LoyaltyTier::Gold, thresholds.gold)),
        LoyaltyTier::Gold => Some((LoyaltyTier::Platinum, thresholds.platinum)),
        LoyaltyTier::Platinum => None,
    }
}

/// Rounds a points value to two decimals.
#[inline]
pub fn round_points(points: f64) -> f64 {
    (points * 100.0).round() / 100.0
}

// =============================================================================
// Earning
// =============================================================================

/// Points a sale earns at the customer's current tier.
///
/// Zero when the program is disabled or the sale is under the minimum.
pub fn points_for_purchase(settings: &LoyaltySettings, sale_total: Money, tier: LoyaltyTier) -> f64 {
    if !settings.enabled
        || settings.spend_per_point_cents <= 0
        || sale_total.cents() < settings.min_purchase_for_points_cents
    {
        return 0.0;
    }

    let base = sale_total.cents() as f64 / settings.spend_per_point_cents as f64;
    round_points(base * settings.tier_multipliers.for_tier(tier))
}

/// Balance state of a customer before an earn event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointsSnapshot {
    pub balance: f64,
    pub lifetime: f64,
    pub tier: LoyaltyTier,
}

/// Computed result of an earn event, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EarnPlan {
    pub points: f64,
    pub new_balance: f64,
    pub new_lifetime: f64,
    pub new_tier: LoyaltyTier,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Plans an earn event. `None` when the sale earns nothing.
pub fn plan_earn(
    settings: &LoyaltySettings,
    current: PointsSnapshot,
    sale_total: Money,
    now: DateTime<Utc>,
) -> Option<EarnPlan> {
    let points = points_for_purchase(settings, sale_total, current.tier);
    if points <= 0.0 {
        return None;
    }

    let new_lifetime = round_points(current.lifetime + points);

    Some(EarnPlan {
        points,
        new_balance: round_points(current.balance + points),
        new_lifetime,
        new_tier: tier_for(new_lifetime, &settings.tier_thresholds),
        expires_at: settings
            .points_expiry_days
            .map(|days| now + Duration::days(i64::from(days))),
    })
}

/// Description stored on an earn transaction.
pub fn earn_description(invoice_number: &str) -> String {
    format!("Points earned from purchase {invoice_number}")
}

// =============================================================================
// Redemption
// =============================================================================

/// Computed result of a redemption, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RedemptionPlan {
    pub points_redeemed: i64,
    pub discount: Money,
    pub new_balance: f64,
}

/// Plans a redemption of `requested` points against a sale.
///
/// ## Errors
/// - [`CoreError::LoyaltyDisabled`] when the program is off
/// - [`CoreError::BelowMinimumRedemption`] under the configured minimum
/// - [`CoreError::InsufficientPoints`] above the balance
///
/// ## Example
/// ```rust
/// use grocer_core::loyalty::{plan_redemption, LoyaltySettings};
/// use grocer_core::money::Money;
///
/// let settings = LoyaltySettings { max_redemption_bps: 1000, ..Default::default() };
/// let plan = plan_redemption(&settings, 300.0, 100, Money::from_cents(50000)).unwrap();
///
/// // 100 points would be 100.00, but only 10% of 500.00 may be paid in points
/// assert_eq!(plan.discount.cents(), 5000);
/// assert_eq!(plan.points_redeemed, 50);
/// assert_eq!(plan.new_balance, 250.0);
/// ```
pub fn plan_redemption(
    settings: &LoyaltySettings,
    balance: f64,
    requested: i64,
    sale_total: Money,
) -> CoreResult<RedemptionPlan> {
    if !settings.enabled {
        return Err(CoreError::LoyaltyDisabled);
    }
    if requested <= 0 {
        return Err(ValidationError::must_be_positive("points").into());
    }
    if requested < settings.min_points_for_redemption {
        return Err(CoreError::BelowMinimumRedemption {
            minimum: settings.min_points_for_redemption,
            requested,
        });
    }
    if requested as f64 > balance {
        return Err(CoreError::InsufficientPoints {
            available: balance,
            requested,
        });
    }

    let value_per_point = Money::from_cents(settings.value_per_point_cents);
    let cap = sale_total.percentage(settings.max_redemption_bps);
    let full_value = value_per_point.multiply_quantity(requested);

    let (discount, points_redeemed) = if full_value > cap {
        let points = if value_per_point.is_positive() {
            cap.cents().max(0) / value_per_point.cents()
        } else {
            0
        };
        (cap, points)
    } else {
        (full_value, requested)
    };

    Ok(RedemptionPlan {
        points_redeemed,
        discount,
        new_balance: round_points(balance - points_redeemed as f64),
    })
}

/// Description stored on a redeem transaction.
pub fn redeem_description(points: i64, discount: Money) -> String {
    format!("Redeemed {points} points for {discount} discount")
}

// =============================================================================
// Outcomes & Reports
// =============================================================================

/// Result of awarding points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EarnOutcome {
    pub customer_id: String,
    pub points_earned: f64,
    pub new_balance: f64,
    pub lifetime_points: f64,
    pub tier: LoyaltyTier,
    pub tier_changed: bool,
}

/// Result of a redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RedeemOutcome {
    pub customer_id: String,
    pub discount_amount_cents: i64,
    pub points_redeemed: i64,
    pub new_balance: f64,
    pub message: String,
}

/// A customer's standing in the program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerPoints {
    pub customer_id: String,
    pub customer_name: String,
    pub points_balance: f64,
    pub lifetime_points: f64,
    pub tier: LoyaltyTier,
    pub tier_multiplier: f64,
    pub next_tier: Option<LoyaltyTier>,
    /// Lifetime points still needed for `next_tier`.
    pub points_to_next_tier: Option<f64>,
}

impl CustomerPoints {
    /// The tier is derived from `lifetime` under the current thresholds.
    pub fn new(
        customer_id: String,
        customer_name: String,
        balance: f64,
        lifetime: f64,
        settings: &LoyaltySettings,
    ) -> Self {
        let tier = tier_for(lifetime, &settings.tier_thresholds);
        let next = next_tier(tier, &settings.tier_thresholds);

        CustomerPoints {
            customer_id,
            customer_name,
            points_balance: balance,
            lifetime_points: lifetime,
            tier,
            tier_multiplier: settings.tier_multipliers.for_tier(tier),
            next_tier: next.map(|(t, _)| t),
            points_to_next_tier: next.map(|(_, at)| round_points((at - lifetime).max(0.0))),
        }
    }
}

/// Customers per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TierDistribution {
    pub bronze: u64,
    pub silver: u64,
    pub gold: u64,
    pub platinum: u64,
}

impl TierDistribution {
    pub fn add(&mut self, tier: LoyaltyTier, count: u64) {
        match tier {
            LoyaltyTier::Bronze => self.bronze += count,
            LoyaltyTier::Silver => self.silver += count,
            LoyaltyTier::Gold => self.gold += count,
            LoyaltyTier::Platinum => self.platinum += count,
        }
    }
}

/// Program-wide statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyStats {
    pub enabled: bool,
    pub total_customers: u64,
    pub tier_distribution: TierDistribution,
    pub points_in_circulation: f64,
    pub lifetime_points_awarded: f64,
    pub total_transactions: u64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(balance: f64, lifetime: f64, tier: LoyaltyTier) -> PointsSnapshot {
        PointsSnapshot {
            balance,
            lifetime,
            tier,
        }
    }

    #[test]
    fn test_default_settings_are_valid() {
        let settings = LoyaltySettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.min_points_for_redemption, 10);
        assert_eq!(settings.max_redemption_bps, 5000);
    }

    #[test]
    fn test_settings_validation() {
        let bad_thresholds = LoyaltySettings {
            tier_thresholds: TierThresholds {
                silver: 2000.0,
                gold: 500.0,
                platinum: 5000.0,
            },
            ..Default::default()
        };
        assert!(bad_thresholds.validate().is_err());

        let zero_rate = LoyaltySettings {
            spend_per_point_cents: 0,
            ..Default::default()
        };
        assert!(zero_rate.validate().is_err());

        let over_cap = LoyaltySettings {
            max_redemption_bps: 10001,
            ..Default::default()
        };
        assert!(over_cap.validate().is_err());

        let mut negative_multiplier = LoyaltySettings::default();
        negative_multiplier.tier_multipliers.gold = -1.0;
        assert!(negative_multiplier.validate().is_err());
    }

    #[test]
    fn test_tier_boundaries() {
        let t = TierThresholds::default();
        assert_eq!(tier_for(0.0, &t), LoyaltyTier::Bronze);
        assert_eq!(tier_for(1999.99, &t), LoyaltyTier::Silver);
        assert_eq!(tier_for(2000.0, &t), LoyaltyTier::Gold);
        assert_eq!(tier_for(1_000_000.0, &t), LoyaltyTier::Platinum);
    }

    #[test]
    fn test_points_for_purchase() {
        let settings = LoyaltySettings::default();
        let total = Money::from_cents(123456); // 1234.56

        assert_eq!(points_for_purchase(&settings, total, LoyaltyTier::Bronze), 1234.56);
        assert_eq!(points_for_purchase(&settings, total, LoyaltyTier::Gold), 1851.84);

        let per_hundred = LoyaltySettings {
            spend_per_point_cents: 10000,
            ..Default::default()
        };
        assert_eq!(points_for_purchase(&per_hundred, total, LoyaltyTier::Bronze), 12.35);
    }

    #[test]
    fn test_no_points_when_disabled_or_below_minimum() {
        let disabled = LoyaltySettings {
            enabled: false,
            ..Default::default()
        };
        assert_eq!(points_for_purchase(&disabled, Money::from_cents(10000), LoyaltyTier::Bronze), 0.0);

        let minimum = LoyaltySettings {
            min_purchase_for_points_cents: 50000,
            ..Default::default()
        };
        assert_eq!(points_for_purchase(&minimum, Money::from_cents(49999), LoyaltyTier::Bronze), 0.0);
        assert!(plan_earn(&minimum, snapshot(0.0, 0.0, LoyaltyTier::Bronze), Money::from_cents(49999), Utc::now()).is_none());
    }

    #[test]
    fn test_earn_promotes_tier() {
        let settings = LoyaltySettings::default();
        let plan = plan_earn(
            &settings,
            snapshot(120.0, 450.0, LoyaltyTier::Bronze),
            Money::from_cents(10000),
            Utc::now(),
        )
        .unwrap();

        // multiplier of the tier held before the sale
        assert_eq!(plan.points, 100.0);
        assert_eq!(plan.new_balance, 220.0);
        assert_eq!(plan.new_lifetime, 550.0);
        assert_eq!(plan.new_tier, LoyaltyTier::Silver);
        assert!(plan.expires_at.is_none());
    }

    #[test]
    fn test_earn_sets_expiry() {
        let settings = LoyaltySettings {
            points_expiry_days: Some(365),
            ..Default::default()
        };
        let now = Utc::now();
        let plan = plan_earn(&settings, snapshot(0.0, 0.0, LoyaltyTier::Bronze), Money::from_cents(100), now).unwrap();
        assert_eq!(plan.expires_at, Some(now + Duration::days(365)));
    }

    #[test]
    fn test_redeem_capped_by_sale_share() {
        let settings = LoyaltySettings {
            max_redemption_bps: 1000,
            ..Default::default()
        };

        let plan = plan_redemption(&settings, 100.0, 100, Money::from_cents(50000)).unwrap();
        assert_eq!(plan.discount.cents(), 5000);
        assert_eq!(plan.points_redeemed, 50);
        assert_eq!(plan.new_balance, 50.0);
    }

    #[test]
    fn test_redeem_cap_floors_points() {
        let settings = LoyaltySettings {
            value_per_point_cents: 300,
            max_redemption_bps: 1000,
            ..Default::default()
        };

        // cap = 10% of 99.99 = 10.00; 10.00 / 3.00 = 3.33 → 3 points
        let plan = plan_redemption(&settings, 40.0, 20, Money::from_cents(9999)).unwrap();
        assert_eq!(plan.discount.cents(), 1000);
        assert_eq!(plan.points_redeemed, 3);
        assert_eq!(plan.new_balance, 37.0);
    }

    #[test]
    fn test_redeem_uncapped() {
        let settings = LoyaltySettings::default();
        let plan = plan_redemption(&settings, 80.0, 30, Money::from_cents(100000)).unwrap();
        assert_eq!(plan.discount.cents(), 3000);
        assert_eq!(plan.points_redeemed, 30);
        assert_eq!(plan.new_balance, 50.0);
    }

    #[test]
    fn test_redeem_errors() {
        let settings = LoyaltySettings::default();
        let total = Money::from_cents(100000);

        assert!(matches!(
            plan_redemption(&settings, 100.0, 5, total),
            Err(CoreError::BelowMinimumRedemption { minimum: 10, requested: 5 })
        ));
        assert!(matches!(
            plan_redemption(&settings, 20.0, 50, total),
            Err(CoreError::InsufficientPoints { .. })
        ));
        assert!(matches!(
            plan_redemption(&settings, 20.0, 0, total),
            Err(CoreError::Validation(_))
        ));

        let disabled = LoyaltySettings {
            enabled: false,
            ..Default::default()
        };
        assert!(matches!(
            plan_redemption(&disabled, 100.0, 50, total),
            Err(CoreError::LoyaltyDisabled)
        ));
    }

    #[test]
    fn test_redeem_never_goes_negative() {
        let settings = LoyaltySettings {
            min_points_for_redemption: 1,
            ..Default::default()
        };

        for balance in [1.0, 10.5, 99.99, 250.0] {
            for requested in 1..=(balance as i64) {
                let plan = plan_redemption(&settings, balance, requested, Money::from_cents(7777)).unwrap();
                assert!(plan.new_balance >= 0.0);
                assert!(plan.points_redeemed <= requested);
                assert!(plan.discount <= Money::from_cents(7777).percentage(settings.max_redemption_bps));
            }
        }
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            earn_description("INV-20240101-0001"),
            "Points earned from purchase INV-20240101-0001"
        );
        assert_eq!(
            redeem_description(50, Money::from_cents(5000)),
            "Redeemed 50 points for LKR 50.00 discount"
        );
    }

    #[test]
    fn test_customer_points_next_tier() {
        let settings = LoyaltySettings::default();
        let summary = CustomerPoints::new("c1".into(), "Kamala".into(), 80.0, 450.0, &settings);
        assert_eq!(summary.tier, LoyaltyTier::Bronze);
        assert_eq!(summary.next_tier, Some(LoyaltyTier::Silver));
        assert_eq!(summary.points_to_next_tier, Some(50.0));
        assert_eq!(summary.tier_multiplier, 1.0);

        let top = CustomerPoints::new("c2".into(), "Sunil".into(), 10.0, 9000.0, &settings);
        assert_eq!(top.tier, LoyaltyTier::Platinum);
        assert_eq!(top.next_tier, None);
        assert_eq!(top.tier_multiplier, 2.0);
    }

    #[test]
    fn test_customer_points_tier_follows_thresholds() {
        let mut settings = LoyaltySettings::default();
        let silver = CustomerPoints::new("c3".into(), "Nimal".into(), 600.0, 600.0, &settings);
        assert_eq!(silver.tier, LoyaltyTier::Silver);
        assert_eq!(silver.tier_multiplier, 1.2);

        settings.tier_thresholds.silver = 1000.0;
        let bronze = CustomerPoints::new("c3".into(), "Nimal".into(), 600.0, 600.0, &settings);
        assert_eq!(bronze.tier, LoyaltyTier::Bronze);
        assert_eq!(bronze.points_to_next_tier, Some(400.0));
    }
}
