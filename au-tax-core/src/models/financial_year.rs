use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Earliest and latest start years a [`FinancialYear`] may carry.
const MIN_START_YEAR: i32 = 1900;
const MAX_START_YEAR: i32 = 9998;

/// Errors produced when parsing or constructing a [`FinancialYear`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FinancialYearError {
    /// The key is not of the form `YYYY-YY`.
    #[error("financial year '{0}' is not in YYYY-YY format")]
    InvalidFormat(String),

    /// The two halves of the key are not consecutive calendar years.
    #[error("financial year '{0}' does not span consecutive years")]
    NonConsecutive(String),

    /// The start year is outside the supported range.
    #[error("financial year starting {0} is out of range")]
    OutOfRange(i32),
}

/// Australian financial year (runs 1 July to 30 June).
///
/// The wrapped value is the calendar year the financial year starts in, so
/// `FinancialYear(2024)` is the 2024-25 year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FinancialYear(i32);

impl FinancialYear {
    /// Creates the financial year starting on 1 July of `start_year`.
    pub fn new(start_year: i32) -> Result<Self, FinancialYearError> {
        if !(MIN_START_YEAR..=MAX_START_YEAR).contains(&start_year) {
            return Err(FinancialYearError::OutOfRange(start_year));
        }
        Ok(Self(start_year))
    }

    /// Calendar year in which the financial year starts.
    pub fn start_year(&self) -> i32 {
        self.0
    }

    /// The financial year containing `date`.
    ///
    /// July and later belong to the year starting in the same calendar
    /// year; January to June belong to the year that started the previous
    /// July.
    pub fn from_date(date: NaiveDate) -> Self {
        if date.month() >= 7 {
            Self(date.year())
        } else {
            Self(date.year() - 1)
        }
    }

    /// 1 July of the start year.
    pub fn start_date(&self) -> NaiveDate {
        // in range for every year accepted by `new`
        NaiveDate::from_ymd_opt(self.0, 7, 1).unwrap_or_default()
    }

    /// 30 June of the following year.
    pub fn end_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0 + 1, 6, 30).unwrap_or_default()
    }

    /// The financial year `years` before this one.
    pub fn years_before(
        &self,
        years: i32,
    ) -> Self {
        Self(self.0 - years)
    }

    /// Number of whole years from `earlier` to `self`. Negative when
    /// `earlier` is actually later.
    pub fn years_since(
        &self,
        earlier: FinancialYear,
    ) -> i32 {
        self.0 - earlier.0
    }

    /// Display as `2024-25`.
    pub fn display(&self) -> String {
        format!("{}-{:02}", self.0, (self.0 + 1) % 100)
    }
}

impl FromStr for FinancialYear {
    type Err = FinancialYearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        let invalid = || FinancialYearError::InvalidFormat(key.to_string());

        let (start, end) = key.split_once('-').ok_or_else(invalid)?;
        if start.len() != 4 || end.len() != 2 {
            return Err(invalid());
        }
        if !start.bytes().chain(end.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let start_year: i32 = start.parse().map_err(|_| invalid())?;
        let end_suffix: i32 = end.parse().map_err(|_| invalid())?;
        if (start_year + 1) % 100 != end_suffix {
            return Err(FinancialYearError::NonConsecutive(key.to_string()));
        }

        Self::new(start_year)
    }
}

impl TryFrom<String> for FinancialYear {
    type Error = FinancialYearError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FinancialYear> for String {
    fn from(value: FinancialYear) -> Self {
        value.display()
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}
