//! Webhook Reconciliation
//!
//! Applies a verified payment outcome to the payment, its booking and the
//! booking's seats.
//!
//! ```text
//! verified webhook
//!       │
//!       ▼
//! ┌──────────────┐  miss   ┌──────────────────────┐
//! │ find payment │────────▶│ "Payment not found"  │
//! └──────────────┘         └──────────────────────┘
//!       │
//!       ▼
//! ┌──────────────────────┐  error  ┌─────────────────────────────┐
//! │ payment status write │────────▶│ "Failed to process webhook" │
//! └──────────────────────┘         └─────────────────────────────┘
//!       │ (event is now acknowledged)
//!       ▼
//! booking update → seat update → booking notify → seat notify
//! (each step independent; failures logged)
//! ```
//!
//! The payment write is the checkpoint. Once it lands the provider gets a
//! success acknowledgement, even if later steps fail. Replaying an event
//! converges to the same rows. An event that disagrees with a payment
//! already in a final status is acknowledged and dropped.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::cascade::{BookingCascade, Settlement};
use crate::error::Result;
use crate::model::PaymentStatus;
use crate::signature::VerifiedWebhook;
use crate::store::PaymentStore;

pub const MSG_PROCESSED: &str = "Webhook processed successfully";
pub const MSG_NOT_FOUND: &str = "Payment not found";
pub const MSG_FAILED: &str = "Failed to process webhook";

const REASON_PAYMENT_FAILED: &str = "payment failed";

/// Result of processing one webhook delivery
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookOutcome {
    pub success: bool,
    pub message: String,

    /// Nothing was recorded; a redelivery is safe and wanted
    #[serde(skip)]
    pub retryable: bool,
}

impl WebhookOutcome {
    fn processed() -> Self {
        Self {
            success: true,
            message: MSG_PROCESSED.into(),
            retryable: false,
        }
    }

    fn not_found() -> Self {
        Self {
            success: false,
            message: MSG_NOT_FOUND.into(),
            retryable: false,
        }
    }

    fn failed() -> Self {
        Self {
            success: false,
            message: MSG_FAILED.into(),
            retryable: true,
        }
    }
}

/// Payment outcome state machine
pub struct ReconciliationEngine {
    payments: Arc<dyn PaymentStore>,
    cascade: Arc<BookingCascade>,
}

impl ReconciliationEngine {
    pub fn new(payments: Arc<dyn PaymentStore>, cascade: Arc<BookingCascade>) -> Self {
        Self { payments, cascade }
    }

    /// Process a verified webhook. Never fails; every path ends in an outcome.
    pub async fn process(&self, event: &VerifiedWebhook) -> WebhookOutcome {
        tracing::info!(
            order_code = %event.order_code,
            amount = event.amount,
            code = %event.code,
            "Processing payment webhook"
        );

        match self.reconcile(event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log_failure(event, &e.to_string());
                WebhookOutcome::failed()
            }
        }
    }

    /// Process on a separate task so a panic in a store or notifier cannot
    /// take down the caller.
    pub async fn process_isolated(self: &Arc<Self>, event: VerifiedWebhook) -> WebhookOutcome {
        let engine = Arc::clone(self);
        let task_event = event.clone();

        match tokio::spawn(async move { engine.process(&task_event).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log_failure(&event, &e.to_string());
                WebhookOutcome::failed()
            }
        }
    }

    async fn reconcile(&self, event: &VerifiedWebhook) -> Result<WebhookOutcome> {
        let Some(payment) = self.payments.find_by_order_code(event.order_code).await? else {
            tracing::warn!(order_code = %event.order_code, "No payment for webhook order code");
            return Ok(WebhookOutcome::not_found());
        };

        // any code other than "00" is final; there is no pending outcome
        let (target, settlement) = if event.is_success() {
            (PaymentStatus::Completed, Settlement::Paid)
        } else {
            (
                PaymentStatus::Failed,
                Settlement::Released {
                    reason: REASON_PAYMENT_FAILED,
                },
            )
        };

        // the stored status is authoritative once final
        if payment.status == target {
            tracing::info!(
                order_code = %event.order_code,
                status = %target,
                "Replayed webhook; re-applying"
            );
        } else if payment.status.is_final() {
            tracing::warn!(
                payment_id = payment.id,
                order_code = %event.order_code,
                current = %payment.status,
                ignored = %target,
                "Payment already settled; ignoring conflicting webhook"
            );
            return Ok(WebhookOutcome::processed());
        }

        let affected = self.payments.update_status(event.order_code, target).await?;
        if affected == 0 {
            tracing::warn!(order_code = %event.order_code, "Payment vanished before update");
            return Ok(WebhookOutcome::not_found());
        }

        tracing::info!(
            payment_id = payment.id,
            order_code = %event.order_code,
            from = %payment.status,
            to = %target,
            "Payment status recorded"
        );

        let Some(booking_id) = payment.booking_id else {
            tracing::info!(payment_id = payment.id, "Payment has no booking; nothing to cascade");
            return Ok(WebhookOutcome::processed());
        };

        let metadata = serde_json::json!({
            "orderCode": event.order_code,
            "paymentId": payment.id,
            "amount": event.amount,
            "code": event.code,
            "desc": event.desc,
        });

        let report = self.cascade.settle(booking_id, settlement, metadata).await;

        if report.is_clean() {
            tracing::info!(
                booking_id,
                seats = report.seats.len(),
                "Booking reconciled with payment"
            );
        } else {
            // payment status stands; booking/seat rows may lag until repaired
            tracing::warn!(
                booking_id,
                order_code = %event.order_code,
                failed_steps = ?report.failed_steps,
                "Booking partially reconciled"
            );
        }

        Ok(WebhookOutcome::processed())
    }
}

fn log_failure(event: &VerifiedWebhook, error: &str) {
    tracing::error!(
        order_code = %event.order_code,
        amount = event.amount,
        code = %event.code,
        desc = %event.desc,
        at = %Utc::now(),
        error = %error,
        "Failed to process webhook"
    );
}
