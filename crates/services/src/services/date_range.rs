use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::validation::ValidationError;

pub const DEFAULT_DAYS: i64 = 30;
pub const MAX_DAYS: i64 = 365;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    pub fn new(since: NaiveDate, until: NaiveDate) -> Result<Self, ValidationError> {
        if since > until {
            return Err(ValidationError::InvertedRange {
                since: since.format(DATE_FORMAT).to_string(),
                until: until.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { since, until })
    }

    /// The `days` days ending today.
    pub fn last_days(days: i64, today: NaiveDate) -> Result<Self, ValidationError> {
        if !(1..=MAX_DAYS).contains(&days) {
            return Err(ValidationError::DaysOutOfRange {
                value: days,
                max: MAX_DAYS,
            });
        }
        Ok(Self {
            since: today - Duration::days(days - 1),
            until: today,
        })
    }

    /// Resolve the `since`/`until`/`days` query parameters. With none given the
    /// window is the last [`DEFAULT_DAYS`] days.
    pub fn from_params(
        since: Option<&str>,
        until: Option<&str>,
        days: Option<i64>,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let since = since.map(str::trim).filter(|s| !s.is_empty());
        let until = until.map(str::trim).filter(|s| !s.is_empty());

        match (since, until, days) {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => Err(ValidationError::ConflictingRange),
            (Some(since), Some(until), None) => {
                Self::new(parse_date("since", since)?, parse_date("until", until)?)
            }
            (Some(_), None, None) | (None, Some(_), None) => Err(ValidationError::IncompleteRange),
            (None, None, Some(days)) => Self::last_days(days, today),
            (None, None, None) => Self::last_days(DEFAULT_DAYS, today),
        }
    }

    pub fn since_str(&self) -> String {
        self.since.format(DATE_FORMAT).to_string()
    }

    pub fn until_str(&self) -> String {
        self.until.format(DATE_FORMAT).to_string()
    }

    pub fn num_days(&self) -> i64 {
        (self.until - self.since).num_days() + 1
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}
