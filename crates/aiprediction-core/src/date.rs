//! Date identifiers
//!
//! The prediction API keys each day's data by a six digit `YYMMDD` string.
//! Callers may pass two or four digit years, so [`resolve_year`] maps short
//! years onto a century before the calendar date is checked.

use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const DID_FORMAT: &str = "%y%m%d";

/// Six digit `YYMMDD` date identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateId(String);

impl DateId {
    /// Identifier for the current local date
    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    /// Identifier for a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(DID_FORMAT).to_string())
    }

    /// Identifier for the day `days` before today
    pub fn days_ago(days: u32) -> Result<Self> {
        Local::now()
            .date_naive()
            .checked_sub_days(Days::new(u64::from(days)))
            .map(Self::from_date)
            .ok_or_else(|| Error::InvalidDate(format!("{} days ago is out of range", days)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DateId {
    type Err = Error;

    /// Accepts exactly six ASCII digits. The calendar is not checked, the
    /// remote API decides whether the day exists.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Validation(format!(
                "Date must be in YYMMDD format (6 digits), got '{}'",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for DateId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DateId> for String {
    fn from(did: DateId) -> Self {
        did.0
    }
}

impl fmt::Display for DateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Map a possibly two digit year onto a full year.
///
/// `0..=49` and `50` land in the 2000s, `51..=99` in the 1900s, anything
/// larger is already a full year. Negative years are rejected.
pub fn resolve_year(year: i32) -> Result<i32> {
    match year {
        y if y < 0 => Err(Error::InvalidDate(format!("year {} is negative", y))),
        // 50 shares the 2000s branch; callers rely on 50 -> 2050.
        0..=50 => Ok(2000 + year),
        51..=99 => Ok(1900 + year),
        _ => Ok(year),
    }
}

/// Build the identifier for an optional year/month/day triple.
///
/// If any component is missing the current local date is used.
pub fn normalize(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> Result<DateId> {
    let (Some(year), Some(month), Some(day)) = (year, month, day) else {
        return Ok(DateId::today());
    };

    let full_year = resolve_year(year)?;
    let date = NaiveDate::from_ymd_opt(full_year, month, day).ok_or_else(|| {
        Error::InvalidDate(format!(
            "{:04}-{:02}-{:02} is not a calendar date",
            full_year, month, day
        ))
    })?;

    Ok(DateId::from_date(date))
}
