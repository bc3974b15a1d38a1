//! Billing calculator
//!
//! Pure functions only: period date arithmetic, discounted totals, and
//! late fees. No storage access, no side effects. Amounts round to two
//! decimal places, half away from zero.

use chrono::{Days, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{BillingError, BillingResult};
use crate::model::{PaymentPlan, PeriodType};

/// Scale and rounding applied to every computed amount
const AMOUNT_SCALE: u32 = 2;

/// Total charge for a subscription purchase, with the discount broken out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeTotal {
    pub total: Decimal,
    pub discount: Decimal,
}

fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn add_months(start: NaiveDate, months: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(months))
}

/// Add `period_count` units of `period_type` to `start`.
///
/// Units are whole days or whole months, so there is no rounding
/// ambiguity; month arithmetic clamps to the last day of shorter months
/// (Jan 31 + 1 month = Feb 28/29), which is chrono's behavior.
pub fn period_end_date(
    start: NaiveDate,
    period_type: PeriodType,
    period_count: u32,
) -> BillingResult<NaiveDate> {
    if period_count == 0 {
        return Err(BillingError::InvalidArgument(
            "period count must be at least 1".to_string(),
        ));
    }

    let end = match period_type {
        PeriodType::Daily => start.checked_add_days(Days::new(u64::from(period_count))),
        PeriodType::Weekly => start.checked_add_days(Days::new(7 * u64::from(period_count))),
        PeriodType::Monthly => add_months(start, period_count),
        PeriodType::Quarterly => add_months(start, period_count.saturating_mul(3)),
        PeriodType::SemiAnnual => add_months(start, period_count.saturating_mul(6)),
        PeriodType::Yearly => add_months(start, period_count.saturating_mul(12)),
    };

    end.ok_or_else(|| BillingError::InvalidArgument("period end date out of range".to_string()))
}

/// Charge for paying `periods` plan periods at once.
///
/// `base_amount * periods`, discounted by the plan's percentage only when
/// `periods > 1` — a single-period purchase or renewal always charges the
/// full base amount. The discount applies to advance purchases only.
pub fn total_amount(plan: &PaymentPlan, periods: u32) -> BillingResult<ChargeTotal> {
    if periods == 0 {
        return Err(BillingError::InvalidArgument(
            "periods must be at least 1".to_string(),
        ));
    }

    let gross = plan.base_amount * Decimal::from(periods);
    if periods > 1 && plan.discount_percentage > Decimal::ZERO {
        let rate = (Decimal::ONE_HUNDRED - plan.discount_percentage) / Decimal::ONE_HUNDRED;
        let total = round_amount(gross * rate);
        Ok(ChargeTotal {
            total,
            discount: round_amount(gross - total),
        })
    } else {
        Ok(ChargeTotal {
            total: round_amount(gross),
            discount: Decimal::ZERO,
        })
    }
}

/// Late fee for a payment `days_late` days past its due date.
///
/// Zero within the plan's grace period; afterwards each day past the
/// grace period accrues `late_fee_per_day`. Never negative.
pub fn late_fee(plan: &PaymentPlan, days_late: i64) -> Decimal {
    if days_late <= plan.grace_period_days {
        return Decimal::ZERO;
    }
    let billable_days = days_late - plan.grace_period_days;
    round_amount(Decimal::from(billable_days) * plan.late_fee_per_day)
}
