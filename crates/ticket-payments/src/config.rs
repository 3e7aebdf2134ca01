//! PayOS Configuration

use crate::error::{PaymentError, Result};

/// PayOS client configuration
#[derive(Clone, Debug)]
pub struct PayOsConfig {
    pub client_id: String,

    pub api_key: String,

    /// Key for request and webhook checksums
    pub checksum_key: String,

    /// API base URL
    pub base_url: String,

    /// Default redirect after a successful payment
    pub return_url: String,

    /// Default redirect after the buyer cancels
    pub cancel_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PayOsConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            api_key: String::new(),
            checksum_key: String::new(),
            base_url: "https://api-merchant.payos.vn".into(),
            return_url: "http://localhost:3000/payment/success".into(),
            cancel_url: "http://localhost:3000/payment/cancel".into(),
            timeout_secs: 30,
        }
    }
}

impl PayOsConfig {
    /// Create from environment variables
    ///
    /// Credentials are required; everything else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            client_id: required_var("PAYOS_CLIENT_ID")?,
            api_key: required_var("PAYOS_API_KEY")?,
            checksum_key: required_var("PAYOS_CHECKSUM_KEY")?,
            base_url: std::env::var("PAYOS_BASE_URL").unwrap_or(defaults.base_url),
            return_url: std::env::var("PAYOS_RETURN_URL").unwrap_or(defaults.return_url),
            cancel_url: std::env::var("PAYOS_CANCEL_URL").unwrap_or(defaults.cancel_url),
            timeout_secs: std::env::var("PAYOS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations with blank credentials
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("api_key", &self.api_key),
            ("checksum_key", &self.checksum_key),
        ] {
            if value.trim().is_empty() {
                return Err(PaymentError::Config(format!("PayOS {name} is empty")));
            }
        }
        Ok(())
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| PaymentError::Config(format!("{name} not set")))
}
