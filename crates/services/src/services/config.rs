//! Runtime configuration read from the process environment.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

use super::google_api::GoogleOAuthCredentials;

pub const META_GRAPH_URL: &str = "https://graph.facebook.com/v19.0";
pub const GOOGLE_ADS_API_URL: &str = "https://googleads.googleapis.com/v17";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const SEARCH_CONSOLE_API_URL: &str = "https://www.googleapis.com/webmasters/v3";
pub const BUSINESS_PROFILE_API_URL: &str = "https://businessprofileperformance.googleapis.com/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default)]
pub struct MetaAdsConfig {
    pub access_token: String,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub default_account_id: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct GoogleAdsConfig {
    pub developer_token: String,
    pub oauth: GoogleOAuthCredentials,
    pub login_customer_id: Option<String>,
    pub default_customer_id: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchConsoleConfig {
    pub oauth: GoogleOAuthCredentials,
    pub default_site_url: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct BusinessProfileConfig {
    pub oauth: GoogleOAuthCredentials,
    pub default_location_id: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub cache_dir: PathBuf,
    pub cache_sync_interval: Duration,
    pub meta_ads: MetaAdsConfig,
    pub google_ads: GoogleAdsConfig,
    pub search_console: SearchConsoleConfig,
    pub business_profile: BusinessProfileConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &str| get(name).unwrap_or_default();
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let host = or("HOST", "127.0.0.1");
        let port = or("PORT", "3001");
        let listen_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    name: "HOST/PORT",
                    value: format!("{host}:{port}"),
                })?;

        let interval_raw = or("CACHE_SYNC_INTERVAL_SECS", "30");
        let interval_secs: u64 = interval_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "CACHE_SYNC_INTERVAL_SECS",
            value: interval_raw.clone(),
        })?;

        let google_token_url = or("GOOGLE_TOKEN_URL", GOOGLE_TOKEN_URL);
        let google_oauth = |prefix: &str| GoogleOAuthCredentials {
            client_id: required(&format!("{prefix}_CLIENT_ID")),
            client_secret: required(&format!("{prefix}_CLIENT_SECRET")),
            refresh_token: required(&format!("{prefix}_REFRESH_TOKEN")),
            token_url: google_token_url.clone(),
        };

        Ok(Self {
            database_url: or("DATABASE_URL", "sqlite://restaurant-insights.db"),
            listen_addr,
            cache_dir: PathBuf::from(or("LOCAL_CACHE_DIR", ".cache/restaurant-insights")),
            cache_sync_interval: Duration::from_secs(interval_secs.max(1)),
            meta_ads: MetaAdsConfig {
                access_token: required("META_ACCESS_TOKEN"),
                app_id: get("META_APP_ID"),
                app_secret: get("META_APP_SECRET"),
                default_account_id: get("META_AD_ACCOUNT_ID"),
                api_url: or("META_GRAPH_URL", META_GRAPH_URL),
            },
            google_ads: GoogleAdsConfig {
                developer_token: required("GOOGLE_ADS_DEVELOPER_TOKEN"),
                oauth: google_oauth("GOOGLE_ADS"),
                login_customer_id: get("GOOGLE_ADS_LOGIN_CUSTOMER_ID"),
                default_customer_id: get("GOOGLE_ADS_CUSTOMER_ID"),
                api_url: or("GOOGLE_ADS_API_URL", GOOGLE_ADS_API_URL),
            },
            search_console: SearchConsoleConfig {
                oauth: google_oauth("GSC"),
                default_site_url: get("GSC_SITE_URL"),
                api_url: or("SEARCH_CONSOLE_API_URL", SEARCH_CONSOLE_API_URL),
            },
            business_profile: BusinessProfileConfig {
                oauth: google_oauth("GBP"),
                default_location_id: get("GBP_LOCATION_ID"),
                api_url: or("BUSINESS_PROFILE_API_URL", BUSINESS_PROFILE_API_URL),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.listen_addr.port(), 3001);
        assert_eq!(config.database_url, "sqlite://restaurant-insights.db");
        assert_eq!(config.cache_sync_interval, Duration::from_secs(30));
        assert!(config.meta_ads.access_token.is_empty());
        assert_eq!(config.meta_ads.api_url, META_GRAPH_URL);
        assert_eq!(config.google_ads.oauth.token_url, GOOGLE_TOKEN_URL);
    }

    #[test]
    fn test_reads_vendor_credentials() {
        let config = Config::from_lookup(lookup(&[
            ("META_ACCESS_TOKEN", " token "),
            ("META_AD_ACCOUNT_ID", "act_42"),
            ("GSC_CLIENT_ID", "gsc-id"),
            ("GSC_SITE_URL", "sc-domain:luigis.example"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.meta_ads.access_token, "token");
        assert_eq!(config.meta_ads.default_account_id.as_deref(), Some("act_42"));
        assert_eq!(config.search_console.oauth.client_id, "gsc-id");
        assert!(config.search_console.oauth.refresh_token.is_empty());
        assert_eq!(config.listen_addr.port(), 8080);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(Config::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CACHE_SYNC_INTERVAL_SECS", "soon")])).is_err());
    }
}
