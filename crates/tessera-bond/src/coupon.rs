//! Coupon terms and the payment schedule derived from them.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tessera_core::Amount;

use crate::error::BondError;

/// Days between a coupon's record date and its payment date.
pub const RECORD_DATE_LEAD_DAYS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponFrequency {
    Monthly,
    #[default]
    Quarterly,
    SemiAnnual,
    Annual,
    /// No periodic coupons; principal only at maturity.
    ZeroCoupon,
}

impl CouponFrequency {
    /// Months between payments, `None` for zero-coupon bonds.
    pub fn months(&self) -> Option<u32> {
        match self {
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::SemiAnnual => Some(6),
            Self::Annual => Some(12),
            Self::ZeroCoupon => None,
        }
    }

    pub fn periods_per_year(&self) -> u32 {
        self.months().map_or(0, |m| 12 / m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Scheduled,
    /// Payments prepared, awaiting signatures.
    Processing,
    Paid,
    Skipped,
}

/// One scheduled coupon payment for the whole bond.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// 1-based position in the schedule.
    pub number: u32,
    pub payment_date: NaiveDate,
    /// Holders on this date are entitled to the payment.
    pub record_date: NaiveDate,
    /// Total paid across all holders.
    pub amount: Amount,
    pub status: CouponStatus,
}

/// Coupon due each period on `face_value` at an annual `rate`.
pub fn period_amount(face_value: Amount, rate: Amount, frequency: CouponFrequency) -> Option<Amount> {
    match frequency.periods_per_year() {
        0 => Some(Amount::ZERO),
        periods => face_value.checked_mul(rate)?.checked_div(periods),
    }
}

/// Build the schedule: one coupon every period after `issue_date`, up to
/// and including `maturity_date`.
pub fn build_schedule(
    face_value: Amount,
    rate: Amount,
    frequency: CouponFrequency,
    issue_date: NaiveDate,
    maturity_date: NaiveDate,
) -> Result<Vec<Coupon>, BondError> {
    let Some(months) = frequency.months() else {
        return Ok(Vec::new());
    };
    let amount = period_amount(face_value, rate, frequency)
        .ok_or_else(|| BondError::InvalidParams(format!("coupon on {} overflows", face_value)))?;

    let mut schedule = Vec::new();
    for number in 1u32.. {
        let payment_date = months
            .checked_mul(number)
            .and_then(|offset| issue_date.checked_add_months(Months::new(offset)))
            .ok_or_else(|| BondError::InvalidParams("coupon schedule leaves the calendar".into()))?;
        if payment_date > maturity_date {
            break;
        }
        let record_date = payment_date
            .checked_sub_days(Days::new(RECORD_DATE_LEAD_DAYS))
            .unwrap_or(payment_date);
        schedule.push(Coupon {
            number,
            payment_date,
            record_date,
            amount,
            status: CouponStatus::Scheduled,
        });
    }
    Ok(schedule)
}

/// `holding`'s share of a coupon `total`, truncated to micro-units.
pub fn pro_rata(total: Amount, holding: Amount, face_value: Amount) -> Option<Amount> {
    if face_value.is_zero() {
        return None;
    }
    total
        .units()
        .checked_mul(holding.units())
        .map(|scaled| Amount::from_units(scaled / face_value.units()))
}
