//! Environment-driven configuration.

use std::env;
use std::time::Duration;

use crate::domain::value_objects::CountryCode;
use crate::payment::GatewayConfig;
use crate::service::CheckoutSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable '{0}'")]
    Missing(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    /// Storefront origin customers are redirected back to.
    pub public_base_url: String,
    pub currency: String,
    pub home_country: CountryCode,
    pub admin_token: String,
    pub gateway: GatewayConfig,
    pub stale_order_after: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| get(name).filter(|v| !v.trim().is_empty()).ok_or(ConfigError::Missing(name));
        let parsed = |name: &'static str, default: &str| -> Result<u64, ConfigError> {
            get(name).unwrap_or_else(|| default.to_string()).trim().parse::<u64>()
                .map_err(|e| ConfigError::Invalid { name, reason: e.to_string() })
        };

        let port = u16::try_from(parsed("PORT", "8083")?).map_err(|e| ConfigError::Invalid { name: "PORT", reason: e.to_string() })?;
        let database_max_connections = u32::try_from(parsed("DATABASE_MAX_CONNECTIONS", "10")?)
            .map_err(|e| ConfigError::Invalid { name: "DATABASE_MAX_CONNECTIONS", reason: e.to_string() })?;
        let currency = get("STORE_CURRENCY").unwrap_or_else(|| "EUR".to_string()).trim().to_uppercase();
        if currency.len() != 3 { return Err(ConfigError::Invalid { name: "STORE_CURRENCY", reason: format!("'{}' is not an ISO 4217 code", currency) }); }
        let home_country = CountryCode::new(get("STORE_HOME_COUNTRY").unwrap_or_else(|| "HR".to_string()))
            .map_err(|e| ConfigError::Invalid { name: "STORE_HOME_COUNTRY", reason: e.to_string() })?;

        let gateway = GatewayConfig::new(required("STRIPE_SECRET_KEY")?)
            .with_api_base(get("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string()))
            .with_timeout(Duration::from_millis(parsed("STRIPE_TIMEOUT_MS", "15000")?));

        Ok(Self {
            port,
            database_url: required("DATABASE_URL")?,
            database_max_connections,
            nats_url: get("NATS_URL").filter(|v| !v.trim().is_empty()),
            public_base_url: get("PUBLIC_BASE_URL").unwrap_or_else(|| "http://localhost:3000".to_string()).trim_end_matches('/').to_string(),
            currency,
            home_country,
            admin_token: required("ADMIN_API_TOKEN")?,
            gateway,
            stale_order_after: Duration::from_secs(parsed("STALE_ORDER_MINUTES", "60")? * 60),
        })
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            currency: self.currency.clone(),
            home_country: self.home_country.clone(),
            // Stripe substitutes the placeholder with the real session id on redirect.
            success_url: format!("{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}", self.public_base_url),
            cancel_url: format!("{}/api/v1/payment/cancel?session_id={{CHECKOUT_SESSION_ID}}", self.public_base_url),
        }
    }

    pub fn cancel_page_url(&self) -> String { format!("{}/checkout/cancelled", self.public_base_url) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/gallery"), ("ADMIN_API_TOKEN", "t"), ("STRIPE_SECRET_KEY", "sk_test")])).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.currency, "EUR");
        assert_eq!(cfg.home_country.as_str(), "HR");
        assert_eq!(cfg.stale_order_after, Duration::from_secs(3600));
        assert!(cfg.nats_url.is_none());
        assert_eq!(cfg.checkout_settings().success_url, "http://localhost:3000/payment/success?session_id={CHECKOUT_SESSION_ID}");
    }

    #[test]
    fn test_missing_and_invalid() {
        assert!(matches!(AppConfig::from_lookup(lookup(&[("ADMIN_API_TOKEN", "t"), ("STRIPE_SECRET_KEY", "sk")])), Err(ConfigError::Missing("DATABASE_URL"))));
        let bad_port = lookup(&[("DATABASE_URL", "pg"), ("ADMIN_API_TOKEN", "t"), ("STRIPE_SECRET_KEY", "sk"), ("PORT", "99999")]);
        assert!(matches!(AppConfig::from_lookup(bad_port), Err(ConfigError::Invalid { name: "PORT", .. })));
    }
}
