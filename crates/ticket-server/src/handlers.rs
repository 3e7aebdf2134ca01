//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use ticket_payments::{
    OrderCode, PaymentError, PaymentLinkRequest, PaymentLinkResponse, WebhookOutcome,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// The cancel body is optional; no body means no reason
fn cancellation_reason(payload: Option<Json<CancelRequest>>) -> Option<String> {
    payload.and_then(|Json(body)| body.cancellation_reason)
}

fn api_error(err: &PaymentError) -> ApiError {
    let (status, code) = match err {
        PaymentError::Provider(_) | PaymentError::Http(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
        PaymentError::ProviderRejected { .. } => (StatusCode::BAD_GATEWAY, "PROVIDER_REJECTED"),
        PaymentError::DuplicateOrderCode(_) => (StatusCode::CONFLICT, "DUPLICATE_ORDER_CODE"),
        PaymentError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        PaymentError::WebhookParse(_) => (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "PAYMENT_ERROR"),
    };

    (
        status,
        Json(ErrorResponse {
            error: err.user_message().into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.provider.name().to_string(),
    })
}

/// Create a payment link
pub async fn create_payment_link(
    State(state): State<AppState>,
    Json(payload): Json<PaymentLinkRequest>,
) -> Result<Json<PaymentLinkResponse>, ApiError> {
    state
        .coordinator
        .create_link(payload)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Payment link creation failed: {}", e);
            api_error(&e)
        })
}

/// Query a payment link
pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(order_code): Path<i64>,
) -> Result<Json<PaymentLinkResponse>, ApiError> {
    state
        .coordinator
        .get_status(OrderCode::new(order_code))
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(order_code, "Payment status query failed: {}", e);
            api_error(&e)
        })
}

/// Cancel a payment link
pub async fn cancel_payment_link(
    State(state): State<AppState>,
    Path(order_code): Path<i64>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<PaymentLinkResponse>, ApiError> {
    let reason = cancellation_reason(payload);

    state
        .coordinator
        .cancel(OrderCode::new(order_code), reason.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(order_code, "Payment cancellation failed: {}", e);
            api_error(&e)
        })
}

/// PayOS webhook handler
///
/// Unauthentic payloads get 400 and never reach reconciliation. A retryable
/// outcome (payment row not written) gets 500 so PayOS redelivers; anything
/// else is acknowledged with 200.
pub async fn payos_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookOutcome>), ApiError> {
    let event = state.provider.verify_webhook(&body).map_err(|e| {
        tracing::warn!("Webhook verification failed: {}", e);
        api_error(&e)
    })?;

    let outcome = state.engine.process_isolated(event).await;

    let status = if outcome.retryable {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    Ok((status, Json(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::FromRequest, http::Request};

    async fn reason_of(request: Request<Body>) -> Option<String> {
        let payload = <Option<Json<CancelRequest>> as FromRequest<()>>::from_request(request, &())
            .await
            .unwrap();
        cancellation_reason(payload)
    }

    #[tokio::test]
    async fn test_cancel_without_body_has_no_reason() {
        let request = Request::post("/api/payments/12345/cancel")
            .body(Body::empty())
            .unwrap();

        assert_eq!(reason_of(request).await, None);
    }

    #[tokio::test]
    async fn test_cancel_reason_read_from_json_body() {
        let request = Request::post("/api/payments/12345/cancel")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"cancellationReason":"changed plans"}"#))
            .unwrap();

        assert_eq!(reason_of(request).await.as_deref(), Some("changed plans"));
    }

    #[tokio::test]
    async fn test_cancel_with_empty_json_object_has_no_reason() {
        let request = Request::post("/api/payments/12345/cancel")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        assert_eq!(reason_of(request).await, None);
    }
}
