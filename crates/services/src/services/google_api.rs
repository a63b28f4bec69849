//! OAuth2 refresh-token exchange and error decoding shared by the Google clients.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::vendor::{Platform, VendorError, classify_status, map_reqwest_error};

#[derive(Debug, Clone, Default)]
pub struct GoogleOAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_url: String,
}

impl GoogleOAuthCredentials {
    pub fn is_complete(&self) -> bool {
        [&self.client_id, &self.client_secret, &self.refresh_token]
            .iter()
            .all(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange the refresh token for a short-lived access token.
pub async fn fetch_access_token(
    http: &Client,
    platform: Platform,
    credentials: &GoogleOAuthCredentials,
) -> Result<String, VendorError> {
    let res = http
        .post(&credentials.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", credentials.refresh_token.as_str()),
        ])
        .send()
        .await
        .map_err(|e| map_reqwest_error(platform, e))?;

    let status = res.status();
    if status.is_success() {
        let token: TokenResponse = res
            .json()
            .await
            .map_err(|e| VendorError::api(platform, None, format!("invalid token response: {e}")))?;
        debug!(platform = %platform, "Obtained Google access token");
        return Ok(token.access_token);
    }

    let body = res.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<TokenErrorResponse>(&body).ok();
    let message = parsed
        .as_ref()
        .map(|e| match &e.error_description {
            Some(description) => format!("{}: {}", e.error, description),
            None => e.error.clone(),
        })
        .unwrap_or_else(|| body.clone());

    match parsed.as_ref().map(|e| e.error.as_str()) {
        Some("invalid_grant" | "invalid_client" | "unauthorized_client") => {
            Err(VendorError::Authentication { platform, message })
        }
        _ if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED => {
            Err(VendorError::Authentication { platform, message })
        }
        _ => Err(VendorError::api(platform, Some(status.as_u16()), message)),
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Map a non-success Google API response to the vendor error taxonomy.
pub fn classify_google_error(platform: Platform, status: StatusCode, body: &str) -> VendorError {
    let parsed = serde_json::from_str::<GoogleErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(500).collect());

    let google_status = parsed.as_ref().and_then(|e| e.error.status.as_deref());
    match google_status {
        Some("PERMISSION_DENIED") => VendorError::Permission { platform, message },
        Some("UNAUTHENTICATED") => VendorError::Authentication { platform, message },
        _ if body.contains("DEVELOPER_TOKEN_NOT_APPROVED")
            || body.contains("USER_PERMISSION_DENIED") =>
        {
            VendorError::Permission { platform, message }
        }
        _ => classify_status(platform, status, message),
    }
}
