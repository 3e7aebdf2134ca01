//! Payment Error Types

use thiserror::Error;

use crate::order_code::OrderCode;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Transport or protocol failure talking to the provider
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider answered with a non-success code
    #[error("Provider rejected request: {code} {desc}")]
    ProviderRejected { code: String, desc: String },

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Order code already assigned to another payment
    #[error("Duplicate order code: {0}")]
    DuplicateOrderCode(OrderCode),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Notification publish failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Provider(_) | PaymentError::Http(_) | PaymentError::Storage(_)
        )
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            PaymentError::Provider(_) | PaymentError::Http(_) => {
                "Payment provider is unavailable. Please try again."
            }
            PaymentError::ProviderRejected { .. } => "Payment request was rejected by the provider.",
            PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
                "Invalid webhook payload."
            }
            PaymentError::DuplicateOrderCode(_) => "Order code already in use. Please retry.",
            PaymentError::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}
