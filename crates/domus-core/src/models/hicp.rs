//! HICP (Harmonized Index of Consumer Prices) model
//!
//! Monthly index values used to adjust rents for inflation.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::YearMonth;

/// Index value of one month
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HicpValue {
    pub year: i32,
    pub month: u32,
    pub value: Decimal,
}

impl HicpValue {
    pub fn period(&self) -> Option<YearMonth> {
        YearMonth::new(self.year, self.month)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.period().is_none() {
            return Err(format!("Invalid month {} for year {}", self.month, self.year));
        }
        if self.value <= Decimal::ZERO {
            return Err(format!(
                "HICP value for {}-{:02} must be positive",
                self.year, self.month
            ));
        }
        Ok(())
    }
}

/// Result of indexing an amount between two months
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Indexation {
    pub from: YearMonth,
    pub to: YearMonth,
    pub from_index: Decimal,
    pub to_index: Decimal,
    /// to_index / from_index, 6 decimal places
    pub factor: Decimal,
    pub base_amount: Decimal,
    /// base_amount * factor, 2 decimal places
    pub indexed_amount: Decimal,
}

impl Indexation {
    /// Compute the indexation; a factor below 1 is clamped unless allowed
    pub fn compute(
        base_amount: Decimal,
        from: HicpValue,
        to: HicpValue,
        allow_decrease: bool,
    ) -> Result<Self, String> {
        let from_period = from
            .period()
            .ok_or_else(|| format!("Invalid month {} for year {}", from.month, from.year))?;
        let to_period = to
            .period()
            .ok_or_else(|| format!("Invalid month {} for year {}", to.month, to.year))?;
        if from.value <= Decimal::ZERO {
            return Err(format!("HICP value for {} must be positive", from_period));
        }

        let mut factor = to
            .value
            .checked_div(from.value)
            .ok_or_else(|| format!("Index factor {} -> {} is out of range", from_period, to_period))?
            .round_dp_with_strategy(6, RoundingStrategy::MidpointAwayFromZero);
        if !allow_decrease && factor < Decimal::ONE {
            factor = Decimal::ONE;
        }

        let indexed_amount = base_amount
            .checked_mul(factor)
            .ok_or_else(|| format!("Indexed amount of {} is out of range", base_amount))?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        Ok(Self {
            from: from_period,
            to: to_period,
            from_index: from.value,
            to_index: to.value,
            factor,
            base_amount,
            indexed_amount,
        })
    }
}
