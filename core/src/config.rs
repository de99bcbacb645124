//! Client configuration: credentials, timezone, and base URL.
//!
//! # Design
//! `ApiConfig::from_env` reproduces the ambient-environment lookup the
//! service's users expect (`CHALLONGE_USER` / `CHALLONGE_KEY` /
//! `CHALLONGE_IANA_TZ_NAME`), but the struct itself is plain data so tests
//! can inject fixtures without touching process globals.

use chrono::{Local, Offset, Utc};

use crate::error::ApiError;

/// Environment variable holding the account identifier.
pub const USER_ENV_VAR: &str = "CHALLONGE_USER";
/// Environment variable holding the API access key.
pub const KEY_ENV_VAR: &str = "CHALLONGE_KEY";
/// Optional environment variable overriding the local timezone (IANA name).
pub const TZ_ENV_VAR: &str = "CHALLONGE_IANA_TZ_NAME";

/// Default API root. The v1 surface lives under a fixed versioned prefix.
pub const DEFAULT_BASE_URL: &str = "https://api.challonge.com/v1/";

/// Configuration for [`crate::Transport`] construction.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Challonge account identifier, used as the basic-auth username.
    pub user: String,
    /// API access key, used as the basic-auth password.
    pub key: String,
    /// Optional IANA zone name overriding the host's local timezone.
    pub tz_name: Option<String>,
    /// API root URL. Overridable so tests can target a local server.
    pub base_url: String,
}

impl ApiConfig {
    /// Build a config with the default base URL and no timezone override.
    pub fn new(user: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            key: key.into(),
            tz_name: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Read credentials and the optional timezone override from the process
    /// environment. Missing or empty credentials fail with a [`ApiError::Config`]
    /// naming the variable.
    pub fn from_env() -> Result<Self, ApiError> {
        let user = std::env::var(USER_ENV_VAR).unwrap_or_default();
        if user.is_empty() {
            return Err(ApiError::Config(format!(
                "no API username was defined in the {USER_ENV_VAR} environment variable"
            )));
        }

        let key = std::env::var(KEY_ENV_VAR).unwrap_or_default();
        if key.is_empty() {
            return Err(ApiError::Config(format!(
                "no API key was defined in the {KEY_ENV_VAR} environment variable"
            )));
        }

        let tz_name = std::env::var(TZ_ENV_VAR).ok().filter(|v| !v.is_empty());

        Ok(Self {
            user,
            key,
            tz_name,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Resolve the configured timezone to a `±HH:MM` UTC-offset string.
    ///
    /// With a `tz_name` the offset is taken from that zone at the current
    /// instant; otherwise the host's local offset is used. The result is
    /// computed once at transport construction and never refreshed.
    pub fn utc_offset_string(&self) -> Result<String, ApiError> {
        let seconds = match &self.tz_name {
            Some(name) => {
                let tz: chrono_tz::Tz = name.parse().map_err(|_| {
                    ApiError::Config(format!("the timezone {name:?} is not a known IANA zone name"))
                })?;
                Utc::now().with_timezone(&tz).offset().fix().local_minus_utc()
            }
            None => Local::now().offset().local_minus_utc(),
        };
        Ok(format_offset(seconds))
    }
}

/// Format a UTC offset in seconds as `±HH:MM`.
fn format_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.abs();
    format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}
