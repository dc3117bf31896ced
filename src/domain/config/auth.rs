use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    NotPositiveInteger { name: &'static str, value: String },
}

/// Token lifetimes, throttling and store limits, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    pub login_token_validity: Duration,
    pub reset_token_validity: Duration,
    pub registration_token_validity: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u64,
    pub session_scan_page_size: usize,
    pub store_timeout: Duration,
    pub cache_transaction_max_retries: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_token_validity: Duration::from_secs(1440 * 60),
            reset_token_validity: Duration::from_secs(30 * 60),
            registration_token_validity: Duration::from_secs(1440 * 60),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 100,
            session_scan_page_size: 100,
            store_timeout: Duration::from_secs(5),
            cache_transaction_max_retries: 5,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Unset variables
    /// fall back to defaults; set but malformed ones are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(value) if value > 0 => Ok(value),
                    _ => Err(ConfigError::NotPositiveInteger { name, value: raw }),
                },
            }
        };

        Ok(Self {
            login_token_validity: minutes(read(
                "LOGIN_TOKEN_VALIDITY_MINUTES",
                defaults.login_token_validity.as_secs() / 60,
            )?),
            reset_token_validity: minutes(read(
                "RESET_TOKEN_VALIDITY_MINUTES",
                defaults.reset_token_validity.as_secs() / 60,
            )?),
            registration_token_validity: minutes(read(
                "REGISTRATION_TOKEN_VALIDITY_MINUTES",
                defaults.registration_token_validity.as_secs() / 60,
            )?),
            rate_limit_window: Duration::from_secs(read(
                "RATE_LIMIT_WINDOW_SECONDS",
                defaults.rate_limit_window.as_secs(),
            )?),
            rate_limit_max_requests: read(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            )?,
            session_scan_page_size: read(
                "SESSION_SCAN_PAGE_SIZE",
                defaults.session_scan_page_size as u64,
            )? as usize,
            store_timeout: Duration::from_secs(read(
                "STORE_TIMEOUT_SECONDS",
                defaults.store_timeout.as_secs(),
            )?),
            cache_transaction_max_retries: read(
                "CACHE_TRANSACTION_MAX_RETRIES",
                defaults.cache_transaction_max_retries as u64,
            )?
            .min(u32::MAX as u64) as u32,
        })
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}
