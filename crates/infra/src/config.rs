//! Engine configuration from `STOCKHOLD_*` environment variables.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use stockhold_core::AccountId;
use stockhold_inventory::SelectionPolicy;

use crate::reservation::{AcceptAny, AmountPolicy, TrailingDigit};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub sweep_interval: Duration,
    /// Used when the `settings` record carries no validity.
    pub default_validity: Duration,
    pub selection: SelectionPolicy,
    pub deep_link_scheme: String,
    /// Whole-unit trailing digit required of every target amount.
    pub price_trailing_digit: Option<u8>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(30),
            default_validity: Duration::from_secs(180),
            selection: SelectionPolicy::Random,
            deep_link_scheme: "alipays".to_string(),
            price_trailing_digit: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(v) = get("STOCKHOLD_POLL_INTERVAL_SECS") {
            config.poll_interval = secs("STOCKHOLD_POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("STOCKHOLD_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = secs("STOCKHOLD_SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("STOCKHOLD_VALIDITY_SECS") {
            config.default_validity = secs("STOCKHOLD_VALIDITY_SECS", &v)?;
        }
        if let Some(seller) = get("STOCKHOLD_SELLER") {
            config.selection = SelectionPolicy::SellerCatalog {
                seller: AccountId::new(seller),
            };
        }
        if let Some(scheme) = get("STOCKHOLD_DEEPLINK_SCHEME") {
            config.deep_link_scheme = scheme;
        }
        if let Some(v) = get("STOCKHOLD_PRICE_TRAILING_DIGIT") {
            let digit = v
                .parse::<u8>()
                .ok()
                .filter(|d| *d <= 9)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "STOCKHOLD_PRICE_TRAILING_DIGIT",
                    message: format!("expected a single digit, got '{v}'"),
                })?;
            config.price_trailing_digit = Some(digit);
        }

        Ok(config)
    }

    pub fn amount_policy(&self) -> Arc<dyn AmountPolicy> {
        match self.price_trailing_digit {
            Some(digit) => Arc::new(TrailingDigit(digit)),
            None => Arc::new(AcceptAny),
        }
    }
}

fn secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
        _ => Err(ConfigError::Invalid {
            key,
            message: format!("expected a positive number of seconds, got '{value}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(from(&[]).unwrap(), EngineConfig::default());
    }

    #[test]
    fn values_override_defaults() {
        let config = from(&[
            ("STOCKHOLD_VALIDITY_SECS", "240"),
            ("STOCKHOLD_SELLER", "s9"),
            ("STOCKHOLD_PRICE_TRAILING_DIGIT", "8"),
        ])
        .unwrap();
        assert_eq!(config.default_validity, Duration::from_secs(240));
        assert_eq!(
            config.selection,
            SelectionPolicy::SellerCatalog { seller: AccountId::new("s9") }
        );
        assert!(config.amount_policy().check(stockhold_core::Money::from_minor(29800)).is_ok());
        assert!(config.amount_policy().check(stockhold_core::Money::from_minor(29900)).is_err());
    }

    #[test]
    fn bad_values_name_the_key() {
        let err = from(&[("STOCKHOLD_POLL_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("STOCKHOLD_POLL_INTERVAL_SECS"));
        assert!(from(&[("STOCKHOLD_PRICE_TRAILING_DIGIT", "12")]).is_err());
        assert!(from(&[("STOCKHOLD_SWEEP_INTERVAL_SECS", "0")]).is_err());
    }
}
