use log::*;
use mps_common::Secret;

pub const DEFAULT_PAYSTACK_API_URL: &str = "https://api.paystack.co";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    /// Base URL of the gateway API. Overridable so that tests can point the client at a local stub.
    pub api_url: String,
    pub secret_key: Secret<String>,
    /// Timeout for outbound calls. A timeout is reported as an unreachable gateway, never retried here.
    pub timeout_secs: u64,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PAYSTACK_API_URL.to_string(),
            secret_key: Secret::default(),
            timeout_secs: DEFAULT_GATEWAY_TIMEOUT_SECS,
        }
    }
}

impl PaystackConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MPS_PAYSTACK_API_URL").unwrap_or_else(|_| {
            info!("MPS_PAYSTACK_API_URL not set, using {DEFAULT_PAYSTACK_API_URL}");
            DEFAULT_PAYSTACK_API_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("MPS_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            warn!("MPS_PAYSTACK_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let timeout_secs = std::env::var("MPS_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_GATEWAY_TIMEOUT_SECS);
        Self { api_url, secret_key, timeout_secs }
    }
}
