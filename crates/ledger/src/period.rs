//! Accounting periods.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A bookkeeping period. Once closed it rejects new postings dated inside
/// its range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    pub year: i32,
    pub period: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub closed: bool,
    pub closed_at: Option<DateTime<Utc>>,
}

impl AccountingPeriod {
    /// Calendar-month period; `period` is the month index (1..=12).
    pub fn monthly(year: i32, period: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, period, 1)?;
        let end = if period == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, period + 1, 1)?
        }
        .pred_opt()?;
        Some(Self {
            year,
            period,
            start,
            end,
            closed: false,
            closed_at: None,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn close(&mut self, at: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.closed {
            return Err(LedgerError::PeriodClosed {
                year: self.year,
                period: self.period,
            });
        }
        self.closed = true;
        self.closed_at = Some(at);
        Ok(())
    }
}
