use crate::error::{DistributionError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// An integer number of US cents.
///
/// Dollar values exist only at the computation boundary; everything that is
/// persisted or compared is integer cents. All rounding goes through the
/// three constructors below and uses a single rule: round half away from
/// zero (round-half-up for the non-negative amounts this domain handles).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Hash,
)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Self = Self(0);

    /// Converts a dollar amount into cents, rounding to the nearest cent.
    ///
    /// This is the only dollars-to-cents conversion boundary in the crate.
    pub fn from_usd(usd: Decimal) -> Result<Self> {
        let cents = (usd * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents
            .to_i64()
            .map(Self)
            .ok_or_else(|| DistributionError::ValidationError(format!("Amount out of range: {usd}")))
    }

    /// Returns `part / whole` of this amount, rounded to the cent.
    ///
    /// Used when a pass-through entity's aggregate amount is split across
    /// its underlying holders. Each split rounds independently, so the
    /// pieces may drift from the aggregate by up to a cent per split.
    pub fn proportion(self, part: Cents, whole: Cents) -> Result<Self> {
        if whole.0 == 0 {
            return Err(DistributionError::ValidationError(
                "Cannot split an amount across a zero-sized holding".to_string(),
            ));
        }
        let share = Decimal::from(self.0) * Decimal::from(part.0) / Decimal::from(whole.0);
        share
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
            .ok_or_else(|| {
                DistributionError::ValidationError(format!("Split amount out of range: {share}"))
            })
    }

    /// Computes the withheld amount for a percentage of this total,
    /// rounded to the cent.
    pub fn withhold(self, percentage: Decimal) -> Result<Self> {
        let withheld = percentage * Decimal::from(self.0) / Decimal::ONE_HUNDRED;
        withheld
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
            .ok_or_else(|| {
                DistributionError::ValidationError(format!(
                    "Withheld amount out of range: {withheld}"
                ))
            })
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for Cents {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_usd_rounds_to_nearest_cent() {
        assert_eq!(Cents::from_usd(dec!(1234.56)).unwrap(), Cents(123456));
        assert_eq!(Cents::from_usd(dec!(0.005)).unwrap(), Cents(1));
        assert_eq!(Cents::from_usd(dec!(0.004)).unwrap(), Cents(0));
        assert_eq!(Cents::from_usd(dec!(10)).unwrap(), Cents(1000));
    }

    #[test]
    fn test_proportion_splits_by_holding() {
        // 100.00 split for a holder owning 1/3 of the entity.
        let split = Cents(10000).proportion(Cents(100), Cents(300)).unwrap();
        assert_eq!(split, Cents(3333));
    }

    #[test]
    fn test_proportion_rejects_zero_whole() {
        assert!(matches!(
            Cents(10000).proportion(Cents(100), Cents(0)),
            Err(DistributionError::ValidationError(_))
        ));
    }

    #[test]
    fn test_withhold_rounds_per_amount() {
        // p=15, t=600000 => withheld=90000
        assert_eq!(Cents(600000).withhold(dec!(15)).unwrap(), Cents(90000));
        // Midpoint rounds up: 12.5% of 1.00 = 12.5 cents -> 13
        assert_eq!(Cents(100).withhold(dec!(12.5)).unwrap(), Cents(13));
        assert_eq!(Cents(100).withhold(dec!(0)).unwrap(), Cents::ZERO);
    }

    #[test]
    fn test_display_formats_dollars() {
        assert_eq!(Cents(123456).to_string(), "1234.56");
        assert_eq!(Cents(5).to_string(), "0.05");
    }
}
