use std::env;

use log::*;
use marketplace_payment_engine::helpers::DEFAULT_COMMISSION_RATE;
use mps_common::parse_boolean_flag;
use paystack_tools::PaystackConfig;

const DEFAULT_MPS_HOST: &str = "127.0.0.1";
const DEFAULT_MPS_PORT: u16 = 8380;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Fraction of the food subtotal retained as platform commission.
    pub commission_rate: f64,
    /// Card gateway configuration
    pub paystack: GatewayConfig,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub api: PaystackConfig,
    /// If false, webhook signatures are not checked and every webhook call is allowed. **DANGER**: only for
    /// local testing against a gateway simulator.
    pub hmac_checks: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { api: PaystackConfig::default(), hmac_checks: true }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPS_HOST.to_string(),
            port: DEFAULT_MPS_PORT,
            database_url: String::default(),
            commission_rate: DEFAULT_COMMISSION_RATE,
            paystack: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPS_HOST").ok().unwrap_or_else(|| DEFAULT_MPS_HOST.into());
        let port = env::var("MPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPS_PORT. {e} Using the default, {DEFAULT_MPS_PORT}, instead."
                    );
                    DEFAULT_MPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPS_PORT);
        let database_url = env::var("MPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MPS_DATABASE_URL is not set. Please set it to the URL for the payment store.");
            String::default()
        });
        let commission_rate = env::var("MPS_COMMISSION_RATE")
            .ok()
            .and_then(|s| {
                s.parse::<f64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for MPS_COMMISSION_RATE. {e}"))
                    .ok()
            })
            .filter(|rate| {
                let sane = (0.0..1.0).contains(rate);
                if !sane {
                    warn!("🪛️ MPS_COMMISSION_RATE must be a fraction in [0, 1). Using the default.");
                }
                sane
            })
            .unwrap_or(DEFAULT_COMMISSION_RATE);
        let paystack = GatewayConfig::from_env_or_defaults();
        Self { host, port, database_url, commission_rate, paystack }
    }
}

impl GatewayConfig {
    pub fn from_env_or_defaults() -> Self {
        let api = PaystackConfig::new_from_env_or_default();
        let hmac_checks = parse_boolean_flag(env::var("MPS_PAYSTACK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!(
                "🚨️ Webhook HMAC checks are disabled. Anyone who can reach this server can forge payment \
                 notifications. Never run production like this."
            );
        }
        Self { api, hmac_checks }
    }
}
