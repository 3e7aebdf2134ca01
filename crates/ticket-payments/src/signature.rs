//! Checksums and Webhook Verification
//!
//! PayOS signs a JSON object by sorting its keys, rendering the pairs as
//! `key=value` joined with `&`, and taking the hex HMAC-SHA256 of that string
//! with the merchant checksum key. The same scheme covers outbound payment
//! requests, create responses and inbound webhooks.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::order_code::{MAX_ORDER_CODE, OrderCode};

type HmacSha256 = Hmac<Sha256>;

/// Provider result code for a successful payment
pub const SUCCESS_CODE: &str = "00";

/// Render a JSON object as the sorted `key=value&...` string that gets signed
pub fn signing_string(data: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();

    keys.into_iter()
        .map(|key| format!("{key}={}", render_value(&data[key.as_str()])))
        .collect::<Vec<_>>()
        .join("&")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        // numbers, booleans, arrays and objects render as compact JSON
        other => other.to_string(),
    }
}

/// A webhook that passed signature and shape checks.
///
/// Only [`WebhookVerifier::verify`] can build one, so the reconciliation
/// engine never sees an unauthenticated event.
#[derive(Clone, Debug)]
pub struct VerifiedWebhook {
    pub order_code: OrderCode,
    pub amount: i64,
    pub description: String,

    /// Payment result code (`"00"` on success)
    pub code: String,

    /// Provider's description of the result code
    pub desc: String,

    /// Bank transfer reference
    pub reference: Option<String>,

    pub payment_link_id: Option<String>,

    pub transaction_date_time: Option<String>,

    _sealed: (),
}

impl VerifiedWebhook {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookData {
    order_code: i64,
    amount: i64,
    #[serde(default)]
    description: String,
    code: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    payment_link_id: Option<String>,
    #[serde(default)]
    transaction_date_time: Option<String>,
}

/// Checksum signer and webhook verifier
#[derive(Clone)]
pub struct WebhookVerifier {
    mac: HmacSha256,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Create a verifier for the given checksum key
    pub fn new(checksum_key: &str) -> Result<Self> {
        if checksum_key.is_empty() {
            return Err(PaymentError::Config("checksum key is empty".into()));
        }

        let mac = HmacSha256::new_from_slice(checksum_key.as_bytes())
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(Self { mac })
    }

    /// Hex HMAC of an arbitrary message
    pub fn sign(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Hex HMAC of a JSON object in signing order
    pub fn sign_data(&self, data: &Map<String, Value>) -> String {
        self.sign(&signing_string(data))
    }

    /// Check `signature` against `data` in constant time
    pub fn verify_data(&self, data: &Value, signature: &str) -> Result<()> {
        let object = data
            .as_object()
            .ok_or_else(|| PaymentError::WebhookParse("data is not an object".into()))?;

        let expected = hex::decode(signature)
            .map_err(|e| PaymentError::WebhookSignature(format!("signature is not hex: {e}")))?;

        let mut mac = self.mac.clone();
        mac.update(signing_string(object).as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| PaymentError::WebhookSignature("checksum mismatch".into()))
    }

    /// Verify a raw webhook body and extract the payment outcome
    pub fn verify(&self, payload: &[u8]) -> Result<VerifiedWebhook> {
        let envelope: WebhookEnvelope = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

        let data = envelope
            .data
            .ok_or_else(|| PaymentError::WebhookParse("missing data".into()))?;
        let signature = envelope
            .signature
            .ok_or_else(|| PaymentError::WebhookSignature("missing signature".into()))?;

        self.verify_data(&data, &signature)?;

        let data: WebhookData = serde_json::from_value(data)
            .map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

        if !(0..=MAX_ORDER_CODE).contains(&data.order_code) {
            return Err(PaymentError::WebhookParse(format!(
                "order code {} out of range",
                data.order_code
            )));
        }

        Ok(VerifiedWebhook {
            order_code: OrderCode::new(data.order_code),
            amount: data.amount,
            description: data.description,
            code: data.code,
            desc: data.desc,
            reference: data.reference,
            payment_link_id: data.payment_link_id,
            transaction_date_time: data.transaction_date_time,
            _sealed: (),
        })
    }

    /// Build a signed webhook body; used by tests and local tooling.
    pub fn signed_webhook(&self, data: &Value) -> Result<Vec<u8>> {
        let object = data
            .as_object()
            .ok_or_else(|| PaymentError::WebhookParse("data is not an object".into()))?;
        let code = object.get("code").cloned().unwrap_or(Value::Null);
        let desc = object.get("desc").cloned().unwrap_or(Value::Null);

        let body = serde_json::json!({
            "code": code,
            "desc": desc,
            "success": code == Value::String(SUCCESS_CODE.into()),
            "data": data,
            "signature": self.sign_data(object),
        });

        Ok(serde_json::to_vec(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: &str = "1a54716c8f0efb2744fb28b6e38b25da7f67a925d98bc1c18bd8faaecadd7675";

    fn sample_data() -> Value {
        json!({
            "orderCode": 123,
            "amount": 3000,
            "description": "VQRIO123",
            "accountNumber": "12345678",
            "reference": "TF230204212323",
            "transactionDateTime": "2023-02-04 18:25:00",
            "currency": "VND",
            "paymentLinkId": "124c33293c43417ab7879e14c8d9eb18",
            "code": "00",
            "desc": "Thành công",
            "counterAccountBankId": null,
            "counterAccountName": null
        })
    }

    #[test]
    fn test_signing_string_sorts_keys_and_blanks_nulls() {
        let data = json!({"b": 2, "a": "x", "c": null});
        let rendered = signing_string(data.as_object().unwrap());
        assert_eq!(rendered, "a=x&b=2&c=");
    }

    #[test]
    fn test_payment_request_signing_string() {
        let data = json!({
            "orderCode": 12345,
            "amount": 500_000,
            "description": "Ticket 42",
            "returnUrl": "https://r",
            "cancelUrl": "https://c"
        });
        assert_eq!(
            signing_string(data.as_object().unwrap()),
            "amount=500000&cancelUrl=https://c&description=Ticket 42&orderCode=12345&returnUrl=https://r"
        );
    }

    #[test]
    fn test_verify_accepts_signed_webhook() {
        let verifier = WebhookVerifier::new(KEY).unwrap();
        let body = verifier.signed_webhook(&sample_data()).unwrap();

        let event = verifier.verify(&body).unwrap();
        assert_eq!(event.order_code, OrderCode::new(123));
        assert_eq!(event.amount, 3000);
        assert_eq!(event.reference.as_deref(), Some("TF230204212323"));
        assert!(event.is_success());
    }

    #[test]
    fn test_verify_rejects_tampered_amount() {
        let verifier = WebhookVerifier::new(KEY).unwrap();
        let body = verifier.signed_webhook(&sample_data()).unwrap();

        let mut value: Value = serde_json::from_slice(&body).unwrap();
        value["data"]["amount"] = json!(1);
        let tampered = serde_json::to_vec(&value).unwrap();

        let err = verifier.verify(&tampered).unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let signer = WebhookVerifier::new("another-key").unwrap();
        let body = signer.signed_webhook(&sample_data()).unwrap();

        let verifier = WebhookVerifier::new(KEY).unwrap();
        assert!(matches!(
            verifier.verify(&body),
            Err(PaymentError::WebhookSignature(_))
        ));
    }

    #[test]
    fn test_verify_rejects_bad_shape() {
        let verifier = WebhookVerifier::new(KEY).unwrap();

        assert!(matches!(
            verifier.verify(b"not json"),
            Err(PaymentError::WebhookParse(_))
        ));
        assert!(matches!(
            verifier.verify(br#"{"code":"00","signature":"ab"}"#),
            Err(PaymentError::WebhookParse(_))
        ));
        assert!(matches!(
            verifier.verify(br#"{"data":{"orderCode":1}}"#),
            Err(PaymentError::WebhookSignature(_))
        ));

        // correctly signed but missing the result code
        let body = verifier
            .signed_webhook(&json!({"orderCode": 1, "amount": 10}))
            .unwrap();
        assert!(matches!(
            verifier.verify(&body),
            Err(PaymentError::WebhookParse(_))
        ));
    }

    #[test]
    fn test_empty_key_is_config_error() {
        assert!(matches!(
            WebhookVerifier::new(""),
            Err(PaymentError::Config(_))
        ));
    }
}
