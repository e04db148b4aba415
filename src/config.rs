//! Runtime configuration.
//!
//! Settings come from `DISBURSAL_*` environment variables, optionally loaded
//! from a `.env` file. Anything unset keeps its default.

use crate::application::coordinator::TransferSettings;
use crate::domain::transfer::{Party, PartyIdType};
use crate::error::{DisbursalError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the core ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub base_url: String,
    pub tenant: String,
    pub username: String,
    pub password: String,
    pub request_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8443/fineract-provider/api/v1".to_string(),
            tenant: "default".to_string(),
            username: "mifos".to_string(),
            password: "password".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Connection and transfer settings for the payment hub.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub base_url: String,
    pub tenant: String,
    pub currency: String,
    pub sender: Party,
    pub transfer_timeout: Duration,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            tenant: "gorilla".to_string(),
            currency: "KES".to_string(),
            sender: Party {
                account_id: "lender-account-id".to_string(),
                party_id_type: PartyIdType::Msisdn,
                party_identifier: "254700000000".to_string(),
            },
            transfer_timeout: Duration::from_secs(30),
        }
    }
}

impl PaymentConfig {
    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            currency: self.currency.clone(),
            sender: self.sender.clone(),
            timeout: self.transfer_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisbursalConfig {
    pub ledger: LedgerConfig,
    pub payment: PaymentConfig,
    pub locale: String,
    /// Ledger date pattern, e.g. `dd MMMM yyyy`.
    pub date_format: String,
}

impl Default for DisbursalConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            payment: PaymentConfig::default(),
            locale: "en".to_string(),
            date_format: "dd MMMM yyyy".to_string(),
        }
    }
}

impl DisbursalConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("DISBURSAL_LEDGER_URL") {
            config.ledger.base_url = validate_url("DISBURSAL_LEDGER_URL", url)?;
        }
        if let Some(tenant) = lookup("DISBURSAL_LEDGER_TENANT") {
            config.ledger.tenant = tenant;
        }
        if let Some(username) = lookup("DISBURSAL_LEDGER_USERNAME") {
            config.ledger.username = username;
        }
        if let Some(password) = lookup("DISBURSAL_LEDGER_PASSWORD") {
            config.ledger.password = password;
        }
        if let Some(secs) = lookup("DISBURSAL_LEDGER_TIMEOUT_SECS") {
            config.ledger.request_timeout =
                Duration::from_secs(parse("DISBURSAL_LEDGER_TIMEOUT_SECS", &secs)?);
        }

        if let Some(url) = lookup("DISBURSAL_PAYMENT_URL") {
            config.payment.base_url = validate_url("DISBURSAL_PAYMENT_URL", url)?;
        }
        if let Some(tenant) = lookup("DISBURSAL_PAYMENT_TENANT") {
            config.payment.tenant = tenant;
        }
        if let Some(currency) = lookup("DISBURSAL_CURRENCY") {
            config.payment.currency = currency.to_uppercase();
        }
        if let Some(account) = lookup("DISBURSAL_SENDER_ACCOUNT") {
            config.payment.sender.account_id = account;
        }
        if let Some(msisdn) = lookup("DISBURSAL_SENDER_MSISDN") {
            config.payment.sender.party_identifier = msisdn;
        }
        if let Some(secs) = lookup("DISBURSAL_TRANSFER_TIMEOUT_SECS") {
            let secs: u64 = parse("DISBURSAL_TRANSFER_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(DisbursalError::Config(
                    "DISBURSAL_TRANSFER_TIMEOUT_SECS must be greater than zero".to_string(),
                ));
            }
            config.payment.transfer_timeout = Duration::from_secs(secs);
        }

        if let Some(locale) = lookup("DISBURSAL_LOCALE") {
            config.locale = locale;
        }
        if let Some(format) = lookup("DISBURSAL_DATE_FORMAT") {
            config.date_format = format;
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DisbursalError::Config(format!("Invalid {key}: {e}")))
}

fn validate_url(key: &str, value: String) -> Result<String> {
    let url = reqwest::Url::parse(&value)
        .map_err(|e| DisbursalError::Config(format!("Invalid {key}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(value),
        other => Err(DisbursalError::Config(format!(
            "Invalid {key}: unsupported scheme '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DisbursalConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.payment.currency, "KES");
        assert_eq!(config.payment.sender.party_id_type, PartyIdType::Msisdn);
        assert_eq!(config.date_format, "dd MMMM yyyy");
        assert_eq!(config.payment.transfer_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = DisbursalConfig::from_lookup(lookup(&[
            ("DISBURSAL_LEDGER_URL", "https://ledger.example.com/api/v1"),
            ("DISBURSAL_CURRENCY", "ugx"),
            ("DISBURSAL_TRANSFER_TIMEOUT_SECS", "5"),
            ("DISBURSAL_SENDER_MSISDN", "256700000001"),
        ]))
        .unwrap();

        assert_eq!(config.ledger.base_url, "https://ledger.example.com/api/v1");
        assert_eq!(config.payment.currency, "UGX");
        assert_eq!(config.payment.transfer_settings().timeout, Duration::from_secs(5));
        assert_eq!(config.payment.sender.party_identifier, "256700000001");
    }

    #[test]
    fn test_rejects_bad_values() {
        for vars in [
            [("DISBURSAL_TRANSFER_TIMEOUT_SECS", "soon")],
            [("DISBURSAL_TRANSFER_TIMEOUT_SECS", "0")],
            [("DISBURSAL_PAYMENT_URL", "ftp://hub")],
            [("DISBURSAL_LEDGER_URL", "not a url")],
        ] {
            assert!(matches!(
                DisbursalConfig::from_lookup(lookup(&vars)),
                Err(DisbursalError::Config(_))
            ));
        }
    }
}
