//! Calendar month identifying one reconciliation period

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{LedgerError, LedgerResult};

/// A calendar month, represented by its first day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(NaiveDate);

impl Month {
    /// Month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        // Day 1 exists in every month
        Month(date.with_day(1).unwrap_or(date))
    }

    pub fn from_ymd(year: i32, month: u32) -> LedgerResult<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Month)
            .ok_or_else(|| {
                LedgerError::validation("month", format!("{year}-{month} is not a month"))
            })
    }

    /// Accept a date only when it is the first day of its month
    pub fn from_first_day(date: NaiveDate) -> LedgerResult<Self> {
        if date.day() != 1 {
            return Err(LedgerError::validation(
                "month",
                "date must be the first day of the month",
            ));
        }
        Ok(Month(date))
    }

    /// Parse the `YYYY-MM-01` form
    pub fn parse(input: &str) -> LedgerResult<Self> {
        let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
            LedgerError::validation("month", format!("'{input}' is not a YYYY-MM-01 date"))
        })?;
        Self::from_first_day(date)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn number(&self) -> u32 {
        self.0.month()
    }

    /// The calendar month immediately before this one
    pub fn previous(&self) -> LedgerResult<Self> {
        self.0
            .checked_sub_months(Months::new(1))
            .map(Month)
            .ok_or_else(|| LedgerError::validation("month", "month is out of range"))
    }

    /// The calendar month immediately after this one
    pub fn next(&self) -> LedgerResult<Self> {
        self.0
            .checked_add_months(Months::new(1))
            .map(Month)
            .ok_or_else(|| LedgerError::validation("month", "month is out of range"))
    }

    /// Whether `date` falls in `[first day, first day of next month)`
    pub fn contains(&self, date: NaiveDate) -> bool {
        Month::containing(date) == *self
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for Month {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Month::parse(s)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Month::parse(&raw).map_err(serde::de::Error::custom)
    }
}
