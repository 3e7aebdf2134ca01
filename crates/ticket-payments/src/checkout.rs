//! Payment Link Coordination
//!
//! Creates, queries and cancels PayOS payment links and mirrors the result
//! into the local payment row. No local row is written until the provider
//! has answered successfully.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cascade::{BookingCascade, Settlement};
use crate::config::PayOsConfig;
use crate::error::Result;
use crate::model::{NewPayment, PaymentStatus};
use crate::order_code::{OrderCode, OrderCodeGenerator};
use crate::provider::{CreatePaymentLink, PaymentItem, PaymentLinkInfo, PaymentProvider};
use crate::store::PaymentStore;

const REASON_PAYMENT_CANCELLED: &str = "payment cancelled";

/// Request to create a payment link
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkRequest {
    /// Booking paid for by this link
    #[serde(default)]
    pub booking_id: Option<i64>,

    pub amount: i64,

    pub description: String,

    /// Overrides the configured return URL
    #[serde(default)]
    pub return_url: Option<String>,

    /// Overrides the configured cancel URL
    #[serde(default)]
    pub cancel_url: Option<String>,

    #[serde(default)]
    pub items: Vec<PaymentItem>,

    /// Link expiry as unix seconds
    #[serde(default)]
    pub expired_at: Option<i64>,
}

/// Payment link details returned to callers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkResponse {
    pub checkout_url: String,
    pub order_code: OrderCode,
    pub account_number: String,
    pub account_name: String,
    pub amount: i64,
    pub description: String,

    /// Provider payment link id
    pub transaction_id: String,

    pub status: String,

    /// Local payment id, when one exists
    pub payment_id: Option<i64>,
}

impl PaymentLinkResponse {
    /// Build from a queried or cancelled link; fields the query form does
    /// not carry are left empty.
    fn from_link_info(info: &PaymentLinkInfo, payment_id: Option<i64>) -> Self {
        let latest = info.latest_transaction();

        Self {
            checkout_url: String::new(),
            order_code: info.order_code,
            account_number: latest.map(|t| t.account_number.clone()).unwrap_or_default(),
            account_name: String::new(),
            amount: info.amount,
            description: latest.map(|t| t.description.clone()).unwrap_or_default(),
            transaction_id: info.id.clone(),
            status: info.status.clone(),
            payment_id,
        }
    }
}

/// Default redirect targets for new links
#[derive(Clone, Debug)]
pub struct LinkUrls {
    pub return_url: String,
    pub cancel_url: String,
}

impl From<&PayOsConfig> for LinkUrls {
    fn from(config: &PayOsConfig) -> Self {
        Self {
            return_url: config.return_url.clone(),
            cancel_url: config.cancel_url.clone(),
        }
    }
}

/// Payment link coordinator
pub struct PaymentLinkCoordinator {
    provider: Arc<dyn PaymentProvider>,
    payments: Arc<dyn PaymentStore>,
    cascade: Arc<BookingCascade>,
    order_codes: OrderCodeGenerator,
    urls: LinkUrls,
}

impl PaymentLinkCoordinator {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        payments: Arc<dyn PaymentStore>,
        cascade: Arc<BookingCascade>,
        urls: LinkUrls,
    ) -> Self {
        Self {
            provider,
            payments,
            cascade,
            order_codes: OrderCodeGenerator::new(),
            urls,
        }
    }

    /// Create a payment link and record a pending payment for it
    pub async fn create_link(&self, request: PaymentLinkRequest) -> Result<PaymentLinkResponse> {
        let order_code = self.order_codes.generate();

        let link = CreatePaymentLink {
            order_code,
            amount: request.amount,
            description: request.description,
            return_url: request.return_url.unwrap_or_else(|| self.urls.return_url.clone()),
            cancel_url: request.cancel_url.unwrap_or_else(|| self.urls.cancel_url.clone()),
            items: request.items,
            expired_at: request.expired_at,
        };

        let created = self.provider.create_payment_link(&link).await?;

        let payment = self
            .payments
            .insert(NewPayment {
                booking_id: request.booking_id,
                provider: self.provider.name().to_string(),
                transaction_ref: Some(created.payment_link_id.clone()),
                order_code,
                amount: request.amount,
            })
            .await
            .inspect_err(|e| {
                tracing::error!(
                    order_code = %order_code,
                    payment_link_id = %created.payment_link_id,
                    error = %e,
                    "Provider link created but payment row was not saved"
                );
            })?;

        tracing::info!(
            payment_id = payment.id,
            order_code = %order_code,
            booking_id = ?request.booking_id,
            amount = payment.amount,
            "Created payment link"
        );

        Ok(PaymentLinkResponse {
            checkout_url: created.checkout_url,
            order_code: created.order_code,
            account_number: created.account_number,
            account_name: created.account_name,
            amount: created.amount,
            description: created.description,
            transaction_id: created.payment_link_id,
            status: created.status,
            payment_id: Some(payment.id),
        })
    }

    /// Current link status from the provider; nothing local is modified
    pub async fn get_status(&self, order_code: OrderCode) -> Result<PaymentLinkResponse> {
        let info = self.provider.get_payment_link(order_code).await?;

        let payment_id = match self.payments.find_by_order_code(order_code).await {
            Ok(payment) => payment.map(|p| p.id),
            Err(e) => {
                tracing::debug!(order_code = %order_code, error = %e, "Local payment lookup failed");
                None
            }
        };

        Ok(PaymentLinkResponse::from_link_info(&info, payment_id))
    }

    /// Cancel a link at the provider, then cascade locally if we know it
    ///
    /// Local steps are best-effort: a failure is logged and the next step
    /// still runs. The provider result is returned either way.
    pub async fn cancel(
        &self,
        order_code: OrderCode,
        reason: Option<&str>,
    ) -> Result<PaymentLinkResponse> {
        let info = self.provider.cancel_payment_link(order_code, reason).await?;

        let payment = match self.payments.find_by_order_code(order_code).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                tracing::info!(order_code = %order_code, "Cancelled link has no local payment");
                return Ok(PaymentLinkResponse::from_link_info(&info, None));
            }
            Err(e) => {
                tracing::error!(order_code = %order_code, error = %e, "Local payment lookup failed");
                return Ok(PaymentLinkResponse::from_link_info(&info, None));
            }
        };

        if payment.status.is_final() && payment.status != PaymentStatus::Cancelled {
            tracing::warn!(
                payment_id = payment.id,
                order_code = %order_code,
                current = %payment.status,
                "Payment already settled; keeping local state"
            );
            return Ok(PaymentLinkResponse::from_link_info(&info, Some(payment.id)));
        }

        match self
            .payments
            .update_status(order_code, PaymentStatus::Cancelled)
            .await
        {
            Ok(0) => {
                tracing::warn!(
                    payment_id = payment.id,
                    order_code = %order_code,
                    "Payment vanished before cancellation"
                );
                return Ok(PaymentLinkResponse::from_link_info(&info, None));
            }
            Ok(_) => tracing::info!(payment_id = payment.id, order_code = %order_code, "Payment cancelled"),
            Err(e) => tracing::error!(
                payment_id = payment.id,
                order_code = %order_code,
                error = %e,
                "Failed to mark payment cancelled"
            ),
        }

        if let Some(booking_id) = payment.booking_id {
            let metadata = serde_json::json!({
                "orderCode": order_code,
                "paymentId": payment.id,
                "cancellationReason": reason,
            });

            let report = self
                .cascade
                .settle(
                    booking_id,
                    Settlement::Released {
                        reason: REASON_PAYMENT_CANCELLED,
                    },
                    metadata,
                )
                .await;

            if !report.is_clean() {
                tracing::warn!(
                    booking_id,
                    order_code = %order_code,
                    failed_steps = ?report.failed_steps,
                    "Cancellation partially applied"
                );
            }
        }

        Ok(PaymentLinkResponse::from_link_info(&info, Some(payment.id)))
    }
}
