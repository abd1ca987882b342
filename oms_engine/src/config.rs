use std::{env, fmt::Display, str::FromStr};

use log::*;
use oms_common::{parse_boolean_flag, DEFAULT_CURRENCY_CODE};

const DEFAULT_OMS_DATABASE_URL: &str = "sqlite://data/oms_store.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Applied to new orders that do not specify a currency
    pub currency: String,
    /// When true, a cash-on-delivery order can only be completed once its payment has been confirmed, or a bank
    /// transaction has been reconciled against it.
    pub require_cod_payment_on_complete: bool,
    /// The channel capacity of each event hook
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_OMS_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            require_cod_payment_on_complete: true,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn new(database_url: &str) -> Self {
        Self { database_url: database_url.to_string(), ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let database_url = env::var("OMS_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ OMS_DATABASE_URL is not set. Using the default, {DEFAULT_OMS_DATABASE_URL}.");
            DEFAULT_OMS_DATABASE_URL.to_string()
        });
        let max_connections = parse_or_default("OMS_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let currency = env::var("OMS_CURRENCY")
            .ok()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        let require_cod_payment_on_complete =
            parse_boolean_flag(env::var("OMS_REQUIRE_COD_PAYMENT_ON_COMPLETE").ok(), true);
        let event_buffer_size = parse_or_default("OMS_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        Self { database_url, max_connections, currency, require_cod_payment_on_complete, event_buffer_size }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn with_cod_payment_required(mut self, required: bool) -> Self {
        self.require_cod_payment_on_complete = required;
        self
    }
}

fn parse_or_default<T>(var: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match env::var(var) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.database_url, "sqlite://data/oms_store.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.currency, "VND");
        assert!(config.require_cod_payment_on_complete);
        assert_eq!(config.event_buffer_size, 25);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        env::set_var("OMS_TEST_MAX_CONNECTIONS", "lots");
        assert_eq!(parse_or_default("OMS_TEST_MAX_CONNECTIONS", 5u32), 5);
        env::set_var("OMS_TEST_MAX_CONNECTIONS", " 12 ");
        assert_eq!(parse_or_default("OMS_TEST_MAX_CONNECTIONS", 5u32), 12);
        env::remove_var("OMS_TEST_MAX_CONNECTIONS");
        assert_eq!(parse_or_default("OMS_TEST_MAX_CONNECTIONS", 5u32), 5);
    }
}
