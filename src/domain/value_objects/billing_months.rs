use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingMonthError {
    #[error("expected MM-YYYY, got {0:?}")]
    Format(String),
    #[error("month out of range: {0}")]
    MonthOutOfRange(u32),
}

/// A calendar month, stored as the first day of that month (UTC calendar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillingMonth(NaiveDate);

impl BillingMonth {
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 exists in every month.
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn from_ym(year: i32, month: u32) -> Result<Self, BillingMonthError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or(BillingMonthError::MonthOutOfRange(month))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Number of calendar months in `[left, right]`, both ends included.
    /// `left == right` counts as one month; `left > right` yields zero or less.
    pub fn months_inclusive(left: BillingMonth, right: BillingMonth) -> i64 {
        let years = i64::from(right.0.year()) - i64::from(left.0.year());
        let months = i64::from(right.0.month()) - i64::from(left.0.month());
        years * 12 + months + 1
    }
}

impl FromStr for BillingMonth {
    type Err = BillingMonthError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let format_error = || BillingMonthError::Format(raw.to_string());

        let (month, year) = raw.split_once('-').ok_or_else(format_error)?;
        let all_digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !all_digits(month, 2) || !all_digits(year, 4) {
            return Err(format_error());
        }

        let month: u32 = month.parse().map_err(|_| format_error())?;
        let year: i32 = year.parse().map_err(|_| format_error())?;
        Self::from_ym(year, month)
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%m-%Y"))
    }
}
