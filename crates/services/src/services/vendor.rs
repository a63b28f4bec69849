//! Pieces shared by every vendor client: platform identity, the error taxonomy
//! and lenient numeric decoding.

use std::str::FromStr;

use reqwest::StatusCode;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    GoogleAds,
    MetaAds,
    SearchConsole,
    BusinessProfile,
}

impl Platform {
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::GoogleAds => "Google Ads",
            Platform::MetaAds => "Meta Ads",
            Platform::SearchConsole => "Google Search Console",
            Platform::BusinessProfile => "Google Business Profile",
        }
    }

    /// Environment variables holding this platform's credentials.
    pub fn credential_vars(self) -> &'static [&'static str] {
        match self {
            Platform::GoogleAds => &[
                "GOOGLE_ADS_DEVELOPER_TOKEN",
                "GOOGLE_ADS_CLIENT_ID",
                "GOOGLE_ADS_CLIENT_SECRET",
                "GOOGLE_ADS_REFRESH_TOKEN",
            ],
            Platform::MetaAds => &["META_ACCESS_TOKEN"],
            Platform::SearchConsole => &["GSC_CLIENT_ID", "GSC_CLIENT_SECRET", "GSC_REFRESH_TOKEN"],
            Platform::BusinessProfile => &["GBP_CLIENT_ID", "GBP_CLIENT_SECRET", "GBP_REFRESH_TOKEN"],
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum VendorError {
    #[error("{} is not configured", .platform.display_name())]
    ConfigurationMissing { platform: Platform },
    #[error("{} authentication failed: {message}", .platform.display_name())]
    Authentication { platform: Platform, message: String },
    #[error("{} permission denied: {message}", .platform.display_name())]
    Permission { platform: Platform, message: String },
    #[error("{} api error: {message}", .platform.display_name())]
    Api {
        platform: Platform,
        status: Option<u16>,
        message: String,
    },
}

impl VendorError {
    pub fn api(platform: Platform, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            platform,
            status,
            message: message.into(),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::ConfigurationMissing { platform }
            | Self::Authentication { platform, .. }
            | Self::Permission { platform, .. }
            | Self::Api { platform, .. } => *platform,
        }
    }

    /// Machine-readable error code returned to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing { .. } => "CONFIGURATION_MISSING",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Permission { .. } => "PERMISSION_ERROR",
            Self::Api { .. } => "API_ERROR",
        }
    }

    /// Human remediation hint.
    pub fn solution(&self) -> String {
        match self {
            Self::ConfigurationMissing { platform } => format!(
                "Set {} to connect {}.",
                platform.credential_vars().join(", "),
                platform.display_name()
            ),
            Self::Authentication { platform, .. } => match platform {
                Platform::MetaAds => "The Meta access token is expired or invalid. Generate a new \
                    long-lived token in Business Manager and update META_ACCESS_TOKEN."
                    .to_string(),
                other => format!(
                    "The {} refresh token was rejected. Re-run the OAuth consent flow and update \
                     the refresh token.",
                    other.display_name()
                ),
            },
            Self::Permission { platform, .. } => match platform {
                Platform::MetaAds => "Regenerate the Meta access token with the ads_management and \
                    ads_read permissions and make sure the ad account is shared with the app's \
                    Business Manager."
                    .to_string(),
                Platform::GoogleAds => "Make sure the developer token is approved and the OAuth \
                    user can access the customer account, or set GOOGLE_ADS_LOGIN_CUSTOMER_ID to \
                    the manager account."
                    .to_string(),
                Platform::SearchConsole => "Add the OAuth user to the Search Console property with \
                    at least restricted access and confirm the site URL matches the property \
                    exactly."
                    .to_string(),
                Platform::BusinessProfile => "Grant the OAuth user manager access to the Business \
                    Profile location and enable the Business Profile Performance API."
                    .to_string(),
            },
            Self::Api { platform, .. } => format!(
                "{} returned an error. Check the account id and date range; representative data \
                 is shown until the call succeeds.",
                platform.display_name()
            ),
        }
    }

    pub fn annotation(&self) -> ErrorAnnotation {
        ErrorAnnotation {
            code: self.code().to_string(),
            message: self.to_string(),
            solution: self.solution(),
        }
    }
}

/// Error details attached to degraded (demo) responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ErrorAnnotation {
    pub code: String,
    pub message: String,
    pub solution: String,
}

pub fn map_reqwest_error(platform: Platform, e: reqwest::Error) -> VendorError {
    let message = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        format!("network error: {e}")
    };
    VendorError::api(platform, e.status().map(|s| s.as_u16()), message)
}

/// Fallback classification from the HTTP status alone.
pub fn classify_status(platform: Platform, status: StatusCode, message: String) -> VendorError {
    match status {
        StatusCode::UNAUTHORIZED => VendorError::Authentication { platform, message },
        StatusCode::FORBIDDEN => VendorError::Permission { platform, message },
        s => VendorError::api(platform, Some(s.as_u16()), message),
    }
}

/// A metric that vendors send as a JSON number or as a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    pub fn as_f64(&self) -> f64 {
        match self {
            Numeric::Int(v) => *v as f64,
            Numeric::Float(v) => *v,
            Numeric::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    /// Rounded to the nearest whole count; negative and unparsable values are 0.
    pub fn as_u64(&self) -> u64 {
        match self {
            Numeric::Int(v) => (*v).max(0) as u64,
            other => {
                let v = other.as_f64();
                if v.is_finite() && v > 0.0 {
                    v.round() as u64
                } else {
                    0
                }
            }
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        match self {
            Numeric::Int(v) => Decimal::from(*v),
            Numeric::Float(v) => Decimal::from_f64(*v).unwrap_or_default(),
            Numeric::Text(s) => Decimal::from_str(s.trim()).unwrap_or_default(),
        }
    }
}

pub fn opt_u64(value: &Option<Numeric>) -> u64 {
    value.as_ref().map(Numeric::as_u64).unwrap_or(0)
}

pub fn opt_f64(value: &Option<Numeric>) -> f64 {
    value.as_ref().map(Numeric::as_f64).unwrap_or(0.0)
}
