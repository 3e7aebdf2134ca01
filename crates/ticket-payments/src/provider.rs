//! Payment Provider
//!
//! The `PaymentProvider` trait is the seam between this crate and the
//! external payment service. `PayOsClient` implements it against the PayOS
//! merchant API; tests implement it in memory.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PayOsConfig;
use crate::error::{PaymentError, Result};
use crate::order_code::OrderCode;
use crate::signature::{SUCCESS_CODE, VerifiedWebhook, WebhookVerifier};

/// Line item shown on the checkout page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentItem {
    pub name: String,
    pub quantity: u32,
    pub price: i64,
}

/// Payment link creation parameters, fully resolved
#[derive(Clone, Debug)]
pub struct CreatePaymentLink {
    pub order_code: OrderCode,
    pub amount: i64,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
    pub items: Vec<PaymentItem>,

    /// Link expiry as unix seconds
    pub expired_at: Option<i64>,
}

/// Provider response to link creation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPaymentLink {
    pub payment_link_id: String,
    pub checkout_url: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub account_name: String,
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    pub order_code: OrderCode,
    pub status: String,
    #[serde(default)]
    pub qr_code: Option<String>,
}

/// A bank transfer recorded against a payment link
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderTransaction {
    pub reference: String,
    pub amount: i64,
    pub account_number: String,
    pub description: String,
    pub transaction_date_time: String,
    pub counter_account_name: Option<String>,
    pub counter_account_number: Option<String>,
}

/// Payment link state as reported by the provider
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkInfo {
    pub id: String,
    pub order_code: OrderCode,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub transactions: Vec<ProviderTransaction>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl PaymentLinkInfo {
    /// Transaction with the latest timestamp, if any
    pub fn latest_transaction(&self) -> Option<&ProviderTransaction> {
        self.transactions
            .iter()
            .max_by(|a, b| a.transaction_date_time.cmp(&b.transaction_date_time))
    }
}

/// Payment provider client trait
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a payment link
    async fn create_payment_link(&self, request: &CreatePaymentLink) -> Result<CreatedPaymentLink>;

    /// Fetch a payment link and its transactions
    async fn get_payment_link(&self, order_code: OrderCode) -> Result<PaymentLinkInfo>;

    /// Cancel an open payment link
    async fn cancel_payment_link(
        &self,
        order_code: OrderCode,
        reason: Option<&str>,
    ) -> Result<PaymentLinkInfo>;

    /// Authenticate an inbound webhook body
    fn verify_webhook(&self, payload: &[u8]) -> Result<VerifiedWebhook>;

    /// Provider name
    fn name(&self) -> &str;
}

#[derive(Deserialize)]
struct ApiEnvelope {
    code: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    signature: Option<String>,
}

impl ApiEnvelope {
    fn into_data(self) -> Result<(Value, Option<String>)> {
        if self.code != SUCCESS_CODE {
            return Err(PaymentError::ProviderRejected {
                code: self.code,
                desc: self.desc,
            });
        }

        let data = self
            .data
            .filter(|d| !d.is_null())
            .ok_or_else(|| PaymentError::Provider("response has no data".into()))?;

        Ok((data, self.signature))
    }
}

/// PayOS merchant API client
#[derive(Debug)]
pub struct PayOsClient {
    http: Client,
    config: PayOsConfig,
    verifier: WebhookVerifier,
}

impl PayOsClient {
    /// Create a client, failing fast on missing credentials
    pub fn new(config: PayOsConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let verifier = WebhookVerifier::new(&config.checksum_key)?;

        Ok(Self {
            http,
            config,
            verifier,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(PayOsConfig::from_env()?)
    }

    pub const fn config(&self) -> &PayOsConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/payment-requests{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Signed JSON body for link creation
    fn create_body(&self, request: &CreatePaymentLink) -> Value {
        let signed = serde_json::json!({
            "amount": request.amount,
            "cancelUrl": request.cancel_url,
            "description": request.description,
            "orderCode": request.order_code,
            "returnUrl": request.return_url,
        });
        let signature = signed
            .as_object()
            .map(|fields| self.verifier.sign_data(fields))
            .unwrap_or_default();

        let mut body = signed;
        body["items"] = serde_json::to_value(&request.items).unwrap_or(Value::Array(Vec::new()));
        if let Some(expired_at) = request.expired_at {
            body["expiredAt"] = Value::from(expired_at);
        }
        body["signature"] = Value::String(signature);
        body
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(Value, Option<String>)> {
        let response = request
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", &self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<ApiEnvelope>(&bytes) {
            Ok(envelope) => envelope.into_data(),
            Err(_) if !status.is_success() => {
                Err(PaymentError::Provider(format!("PayOS returned HTTP {status}")))
            }
            Err(e) => Err(PaymentError::Provider(format!("unreadable PayOS response: {e}"))),
        }
    }
}

#[async_trait]
impl PaymentProvider for PayOsClient {
    async fn create_payment_link(&self, request: &CreatePaymentLink) -> Result<CreatedPaymentLink> {
        let body = self.create_body(request);
        let (data, signature) = self.send(self.http.post(self.url("")).json(&body)).await?;

        // PayOS signs the create response; a mismatch means it did not come from them
        if let Some(signature) = signature {
            self.verifier
                .verify_data(&data, &signature)
                .map_err(|e| PaymentError::Provider(format!("response {e}")))?;
        }

        let created: CreatedPaymentLink = serde_json::from_value(data)?;

        tracing::info!(
            order_code = %created.order_code,
            payment_link_id = %created.payment_link_id,
            amount = created.amount,
            "Created PayOS payment link"
        );

        Ok(created)
    }

    async fn get_payment_link(&self, order_code: OrderCode) -> Result<PaymentLinkInfo> {
        let url = self.url(&format!("/{order_code}"));
        let (data, _) = self.send(self.http.get(url)).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn cancel_payment_link(
        &self,
        order_code: OrderCode,
        reason: Option<&str>,
    ) -> Result<PaymentLinkInfo> {
        let url = self.url(&format!("/{order_code}/cancel"));
        let body = serde_json::json!({ "cancellationReason": reason });
        let (data, _) = self.send(self.http.post(url).json(&body)).await?;

        tracing::info!(order_code = %order_code, "Cancelled PayOS payment link");

        Ok(serde_json::from_value(data)?)
    }

    fn verify_webhook(&self, payload: &[u8]) -> Result<VerifiedWebhook> {
        self.verifier.verify(payload)
    }

    fn name(&self) -> &str {
        crate::model::PROVIDER_PAYOS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> PayOsClient {
        PayOsClient::new(PayOsConfig {
            client_id: "client".into(),
            api_key: "api".into(),
            checksum_key: "checksum".into(),
            base_url: "https://payos.test/".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_missing_credentials_fail_fast() {
        let err = PayOsClient::new(PayOsConfig::default()).unwrap_err();
        assert!(matches!(err, PaymentError::Config(_)));
    }

    #[test]
    fn test_urls() {
        let client = test_client();
        assert_eq!(client.url(""), "https://payos.test/v2/payment-requests");
        assert_eq!(
            client.url("/12/cancel"),
            "https://payos.test/v2/payment-requests/12/cancel"
        );
    }

    #[test]
    fn test_create_body_is_signed() {
        let client = test_client();
        let request = CreatePaymentLink {
            order_code: OrderCode::new(12345),
            amount: 500_000,
            description: "Ticket 42".into(),
            return_url: "https://r".into(),
            cancel_url: "https://c".into(),
            items: vec![PaymentItem {
                name: "Seat A1".into(),
                quantity: 1,
                price: 500_000,
            }],
            expired_at: Some(1_700_000_000),
        };

        let body = client.create_body(&request);
        let expected = client.verifier.sign(
            "amount=500000&cancelUrl=https://c&description=Ticket 42&orderCode=12345&returnUrl=https://r",
        );

        assert_eq!(body["signature"], Value::String(expected));
        assert_eq!(body["items"][0]["name"], "Seat A1");
        assert_eq!(body["expiredAt"], 1_700_000_000);
    }

    #[test]
    fn test_envelope_rejection() {
        let envelope: ApiEnvelope =
            serde_json::from_str(r#"{"code":"231","desc":"Đơn thanh toán đã tồn tại","data":null}"#)
                .unwrap();
        let err = envelope.into_data().unwrap_err();
        assert!(matches!(err, PaymentError::ProviderRejected { ref code, .. } if code == "231"));
    }

    #[test]
    fn test_latest_transaction() {
        let info: PaymentLinkInfo = serde_json::from_value(serde_json::json!({
            "id": "link",
            "orderCode": 7,
            "amount": 100,
            "status": "PAID",
            "transactions": [
                {"reference": "old", "amount": 50, "transactionDateTime": "2024-01-01 10:00:00"},
                {"reference": "new", "amount": 50, "transactionDateTime": "2024-01-01 11:00:00"}
            ]
        }))
        .unwrap();

        assert_eq!(info.latest_transaction().unwrap().reference, "new");
    }
}
