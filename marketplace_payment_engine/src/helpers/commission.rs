//! Commission allocation.
//!
//! Splits a gross payment into food subtotal, delivery fee, tax, platform commission and net vendor payout.
//! The same computation runs twice in a payment's life: once at checkout initialization (to derive the
//! platform-share directive sent to the gateway) and once at verification time (recomputed from the metadata
//! the gateway echoes back). The two must agree; a disagreement is an audit-worthy mismatch, not an error.

use mps_common::Kobo;
use serde::{Deserialize, Serialize};

pub const DEFAULT_COMMISSION_RATE: f64 = 0.10;

/// Tolerance for sum-of-parts vs gross, in kobo.
const MISMATCH_EPSILON: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub food_amount: Kobo,
    pub delivery_fee: Kobo,
    pub tax_amount: Kobo,
    pub commission: Kobo,
    pub platform_share: Kobo,
    pub vendor_payout: Kobo,
}

impl CommissionSplit {
    /// Returns the discrepancy between the gross amount and `food + delivery + tax`, if it exceeds the
    /// 1-kobo tolerance. The caller logs this; it never blocks settlement.
    pub fn mismatch(&self, gross: Kobo) -> Option<Kobo> {
        let parts = self.food_amount + self.delivery_fee + self.tax_amount;
        let diff = gross - parts;
        if diff.value().abs() > MISMATCH_EPSILON {
            Some(diff)
        } else {
            None
        }
    }
}

/// Compute the commission split for a gross payment.
///
/// Missing components derive from the gross: `food = max(gross - delivery, 0)` and
/// `tax = max(gross - food - delivery, 0)`. Negative inputs clamp to zero. This function cannot fail.
pub fn allocate(
    gross: Kobo,
    food_amount: Option<Kobo>,
    delivery_fee: Option<Kobo>,
    tax_amount: Option<Kobo>,
    rate: f64,
) -> CommissionSplit {
    let gross = gross.clamped();
    let delivery_fee = delivery_fee.unwrap_or_default().clamped();
    let food_amount = food_amount.map(Kobo::clamped).unwrap_or_else(|| (gross - delivery_fee).clamped());
    let tax_amount = tax_amount.map(Kobo::clamped).unwrap_or_else(|| (gross - food_amount - delivery_fee).clamped());
    #[allow(clippy::cast_possible_truncation)]
    let commission = Kobo::from((food_amount.value() as f64 * rate).round() as i64);
    let platform_share = commission + delivery_fee + tax_amount;
    let vendor_payout = food_amount - commission;
    CommissionSplit { food_amount, delivery_fee, tax_amount, commission, platform_share, vendor_payout }
}

/// Allocate a line's share of the total tax, proportional to its share of the food total.
/// A zero food total means no line carries tax.
pub fn proportional_tax(line_total: Kobo, total_food: Kobo, total_tax: Kobo) -> Kobo {
    if total_food.value() <= 0 {
        return Kobo::default();
    }
    #[allow(clippy::cast_possible_truncation)]
    let share = ((line_total.value() as i128 * total_tax.value() as i128) / total_food.value() as i128) as i64;
    Kobo::from(share)
}

#[cfg(test)]
mod test {
    use mps_common::Kobo;

    use super::{allocate, proportional_tax, DEFAULT_COMMISSION_RATE};

    #[test]
    fn standard_split() {
        let split = allocate(
            Kobo::from(10_000),
            Some(Kobo::from(9_000)),
            Some(Kobo::from(500)),
            Some(Kobo::from(500)),
            DEFAULT_COMMISSION_RATE,
        );
        assert_eq!(split.commission, Kobo::from(900));
        assert_eq!(split.platform_share, Kobo::from(1_900));
        assert_eq!(split.vendor_payout, Kobo::from(8_100));
        assert!(split.mismatch(Kobo::from(10_000)).is_none());
    }

    #[test]
    fn derives_missing_components() {
        let split = allocate(Kobo::from(10_000), None, Some(Kobo::from(500)), None, DEFAULT_COMMISSION_RATE);
        assert_eq!(split.food_amount, Kobo::from(9_500));
        assert_eq!(split.tax_amount, Kobo::from(0));
        assert!(split.mismatch(Kobo::from(10_000)).is_none());
    }

    #[test]
    fn negative_inputs_clamp_to_zero() {
        let split = allocate(
            Kobo::from(1_000),
            Some(Kobo::from(-200)),
            Some(Kobo::from(-1)),
            Some(Kobo::from(-5)),
            DEFAULT_COMMISSION_RATE,
        );
        assert_eq!(split.food_amount, Kobo::from(0));
        assert_eq!(split.delivery_fee, Kobo::from(0));
        assert_eq!(split.commission, Kobo::from(0));
        assert_eq!(split.vendor_payout, Kobo::from(0));
    }

    #[test]
    fn mismatch_detected_beyond_epsilon() {
        let split = allocate(
            Kobo::from(10_000),
            Some(Kobo::from(9_000)),
            Some(Kobo::from(490)),
            Some(Kobo::from(500)),
            DEFAULT_COMMISSION_RATE,
        );
        assert_eq!(split.mismatch(Kobo::from(10_000)), Some(Kobo::from(10)));
        // one kobo off is tolerated
        let split = allocate(
            Kobo::from(10_000),
            Some(Kobo::from(9_000)),
            Some(Kobo::from(499)),
            Some(Kobo::from(500)),
            DEFAULT_COMMISSION_RATE,
        );
        assert!(split.mismatch(Kobo::from(10_000)).is_none());
    }

    #[test]
    fn tax_split_is_proportional() {
        let tax = Kobo::from(500);
        let total = Kobo::from(10_000);
        assert_eq!(proportional_tax(Kobo::from(3_000), total, tax), Kobo::from(150));
        assert_eq!(proportional_tax(Kobo::from(7_000), total, tax), Kobo::from(350));
    }

    #[test]
    fn zero_food_total_means_zero_tax() {
        assert_eq!(proportional_tax(Kobo::from(3_000), Kobo::from(0), Kobo::from(500)), Kobo::from(0));
    }
}
