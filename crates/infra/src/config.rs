//! Configuration loading and representation.
//!
//! Every setting has a default; environment variables override them.

use std::time::Duration;

use thiserror::Error;

pub const ENV_DEFAULT_LOCALE: &str = "BAZAAR_DEFAULT_LOCALE";
pub const ENV_DEFAULT_CURRENCY: &str = "BAZAAR_DEFAULT_CURRENCY";
pub const ENV_RESELLER_COMMISSION_BPS: &str = "BAZAAR_RESELLER_COMMISSION_BPS";
pub const ENV_SIGN_IN_AFTER_REGISTRATION: &str = "BAZAAR_SIGN_IN_AFTER_REGISTRATION";
pub const ENV_SESSION_TTL_SECS: &str = "BAZAAR_SESSION_TTL_SECS";
pub const ENV_LOG_FILTER: &str = "RUST_LOG";

const MAX_COMMISSION_BPS: u32 = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the identity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Locale stored on new profiles unless the signup overrides it.
    pub default_locale: String,
    /// Currency stored on new profiles unless the signup overrides it.
    pub default_currency: String,
    /// Initial reseller commission, in basis points.
    pub reseller_commission_bps: u32,
    /// Sign the new credential in once registration's records exist.
    pub sign_in_after_registration: bool,
    /// Lifetime of sessions issued by the in-memory provider.
    pub session_ttl: Duration,
    pub log_filter: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            default_currency: "USD".to_string(),
            reseller_commission_bps: 1_000,
            sign_in_after_registration: true,
            session_ttl: Duration::from_secs(3_600),
            log_filter: "info".to_string(),
        }
    }
}

impl IdentityConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (unset keys keep their defaults).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = non_empty(lookup(ENV_DEFAULT_LOCALE)) {
            config.default_locale = v;
        }
        if let Some(v) = non_empty(lookup(ENV_DEFAULT_CURRENCY)) {
            if v.len() != 3 || !v.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(invalid(ENV_DEFAULT_CURRENCY, v, "expected an ISO 4217 code"));
            }
            config.default_currency = v.to_ascii_uppercase();
        }
        if let Some(v) = non_empty(lookup(ENV_RESELLER_COMMISSION_BPS)) {
            let bps: u32 = v
                .parse()
                .map_err(|e| invalid(ENV_RESELLER_COMMISSION_BPS, v.clone(), format!("{e}")))?;
            if bps > MAX_COMMISSION_BPS {
                return Err(invalid(ENV_RESELLER_COMMISSION_BPS, v, "must be at most 10000"));
            }
            config.reseller_commission_bps = bps;
        }
        if let Some(v) = non_empty(lookup(ENV_SIGN_IN_AFTER_REGISTRATION)) {
            config.sign_in_after_registration = parse_bool(&v)
                .ok_or_else(|| invalid(ENV_SIGN_IN_AFTER_REGISTRATION, v, "expected a boolean"))?;
        }
        if let Some(v) = non_empty(lookup(ENV_SESSION_TTL_SECS)) {
            let secs: u64 = v
                .parse()
                .map_err(|e| invalid(ENV_SESSION_TTL_SECS, v.clone(), format!("{e}")))?;
            if secs == 0 {
                return Err(invalid(ENV_SESSION_TTL_SECS, v, "must be positive"));
            }
            config.session_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = non_empty(lookup(ENV_LOG_FILTER)) {
            config.log_filter = v;
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<IdentityConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IdentityConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(load(&[]).unwrap(), IdentityConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            (ENV_DEFAULT_LOCALE, "fr"),
            (ENV_DEFAULT_CURRENCY, "eur"),
            (ENV_RESELLER_COMMISSION_BPS, "750"),
            (ENV_SIGN_IN_AFTER_REGISTRATION, "no"),
            (ENV_SESSION_TTL_SECS, "60"),
        ])
        .unwrap();

        assert_eq!(config.default_locale, "fr");
        assert_eq!(config.default_currency, "EUR");
        assert_eq!(config.reseller_commission_bps, 750);
        assert!(!config.sign_in_after_registration);
        assert_eq!(config.session_ttl, Duration::from_secs(60));
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = load(&[(ENV_DEFAULT_LOCALE, "   ")]).unwrap();
        assert_eq!(config.default_locale, "en");
    }

    #[test]
    fn out_of_range_commission_is_rejected() {
        let err = load(&[(ENV_RESELLER_COMMISSION_BPS, "10001")]).unwrap_err();
        assert!(err.to_string().contains(ENV_RESELLER_COMMISSION_BPS));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(load(&[(ENV_SIGN_IN_AFTER_REGISTRATION, "maybe")]).is_err());
        assert!(load(&[(ENV_SESSION_TTL_SECS, "0")]).is_err());
        assert!(load(&[(ENV_DEFAULT_CURRENCY, "dollars")]).is_err());
    }
}
