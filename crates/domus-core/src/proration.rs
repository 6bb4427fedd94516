//! Proration of monthly rent
//!
//! Decides whether an invoice covers a month and which fraction of it.
//! Advance ("next month") invoices issued in month M cover M+1; a contract
//! ending on day 1 or 2 of M+1 gets no advance invoice at all.

use chrono::Datelike;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{Contract, InvoiceMode, RentType, YearMonth};
use crate::AppResult;

/// Last day of the month that still yields no advance invoice
const ADVANCE_EXCLUSION_LAST_DAY: u32 = 2;

/// Coverage of one month by a contract
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Proration {
    /// Whether the month is invoiced at all
    pub include: bool,

    /// Covered fraction of the month, 0 when not included
    pub fraction: f64,

    /// Days covered
    pub covered_days: u32,

    /// Length of the month
    pub days_in_month: u32,
}

impl Proration {
    pub fn none(days_in_month: u32) -> Self {
        Self {
            include: false,
            fraction: 0.0,
            covered_days: 0,
            days_in_month,
        }
    }

    pub fn full(days_in_month: u32) -> Self {
        Self {
            include: true,
            fraction: 1.0,
            covered_days: days_in_month,
            days_in_month,
        }
    }

    pub fn partial(covered_days: u32, days_in_month: u32) -> Self {
        Self {
            include: true,
            fraction: f64::from(covered_days) / f64::from(days_in_month),
            covered_days,
            days_in_month,
        }
    }

    pub fn is_full(&self) -> bool {
        self.include && self.covered_days == self.days_in_month
    }
}

fn issue_month(issue_year: i32, issue_month: u32) -> AppResult<YearMonth> {
    YearMonth::new(issue_year, issue_month)
        .ok_or_else(|| AppError::Validation(format!("Invalid month: {}", issue_month)))
}

/// Coverage of the month after the issue month for advance billing
///
/// Only monthly contracts billed in `next_month` mode are considered; every
/// other contract yields `{include: false, fraction: 0}`.
pub fn compute_next_month_proration(
    contract: &Contract,
    issue_year: i32,
    issue_month_number: u32,
) -> AppResult<Proration> {
    let next = issue_month(issue_year, issue_month_number)?.next();
    let days = next.days();

    if contract.rent_type != RentType::Monthly || contract.invoice_mode != InvoiceMode::NextMonth {
        return Ok(Proration::none(days));
    }

    if !contract.overlaps(next) {
        return Ok(Proration::none(days));
    }

    let end = contract.effective_end();
    if end >= next.last_day() {
        return Ok(Proration::full(days));
    }

    let last_covered = end.day();
    if last_covered <= ADVANCE_EXCLUSION_LAST_DAY {
        return Ok(Proration::none(days));
    }

    Ok(Proration::partial(last_covered, days))
}

/// Coverage of the issue month itself for `current_month` billing
///
/// Partial months count the days from the start day (first month) or up to
/// the end day (last month).
pub fn compute_current_month_coverage(
    contract: &Contract,
    year: i32,
    month: u32,
) -> AppResult<Proration> {
    let period = issue_month(year, month)?;
    let days = period.days();

    if contract.rent_type != RentType::Monthly || !contract.overlaps(period) {
        return Ok(Proration::none(days));
    }

    let from = contract.start_date.max(period.first_day());
    let to = contract.effective_end().min(period.last_day());
    let covered = to.day() - from.day() + 1;

    if covered >= days {
        Ok(Proration::full(days))
    } else {
        Ok(Proration::partial(covered, days))
    }
}
