use thiserror::Error;

/// Malformed caller input. Always rejected before any vendor call or write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("invalid date `{value}` for `{field}`, expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },
    #[error("`since` ({since}) is after `until` ({until})")]
    InvertedRange { since: String, until: String },
    #[error("`since` and `until` must be given together")]
    IncompleteRange,
    #[error("use either `since`/`until` or `days`, not both")]
    ConflictingRange,
    #[error("`days` must be between 1 and {max}, got {value}")]
    DaysOutOfRange { value: i64, max: i64 },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },
    #[error("{field} total exceeds {max}")]
    TooLarge { field: &'static str, max: u64 },
    #[error("nothing to update")]
    NoChanges,
}

/// Reject blank strings; returns the trimmed value.
pub fn non_empty(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Empty(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Largest count the database can store.
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// Sum counts, rejecting totals the database cannot store.
pub fn bounded_total(
    field: &'static str,
    values: impl IntoIterator<Item = u64>,
) -> Result<u64, ValidationError> {
    let too_large = ValidationError::TooLarge { field, max: MAX_COUNT };
    values
        .into_iter()
        .try_fold(0u64, |acc, v| acc.checked_add(v))
        .filter(|total| *total <= MAX_COUNT)
        .ok_or(too_large)
}

pub fn non_negative(field: &'static str, value: i64) -> Result<u64, ValidationError> {
    u64::try_from(value).map_err(|_| ValidationError::Negative { field, value })
}
