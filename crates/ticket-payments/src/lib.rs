//! # ticket-payments
//!
//! Payment links and webhook reconciliation for seat bookings.
//!
//! A booking holds locked seats while the buyer pays through a PayOS
//! payment link. When PayOS reports the outcome, three independently stored
//! records have to agree: the payment, the booking and the booking's seats.
//!
//! ```text
//! ┌────────────────────────┐     ┌─────────────────┐
//! │ PaymentLinkCoordinator │────▶│ PaymentProvider │  create / get / cancel
//! └───────────┬────────────┘     └─────────────────┘
//!             │ cancel
//!             ▼
//! ┌────────────────────────┐     ┌─────────────────────┐
//! │     BookingCascade     │────▶│ NotificationGateway │
//! └────────────────────────┘     └─────────────────────┘
//!             ▲
//!             │ payment outcome
//! ┌────────────────────────┐
//! │  ReconciliationEngine  │
//! └────────────────────────┘
//!             ▲
//!             │ VerifiedWebhook
//! ┌────────────────────────┐
//! │    WebhookVerifier     │  HMAC-SHA256 checksum
//! └────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ticket_payments::{PayOsClient, ReconciliationEngine};
//!
//! let provider = PayOsClient::from_env()?;
//! let event = provider.verify_webhook(&body)?;
//! let outcome = engine.process(&event).await;
//! ```

pub mod cascade;
pub mod checkout;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod order_code;
pub mod provider;
pub mod signature;
pub mod store;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use cascade::{BookingCascade, CascadeReport, Settlement};
pub use checkout::{LinkUrls, PaymentLinkCoordinator, PaymentLinkRequest, PaymentLinkResponse};
pub use config::PayOsConfig;
pub use error::{PaymentError, Result};
pub use model::{Booking, BookingStatus, Payment, PaymentStatus, SeatState, SeatStatus};
pub use notify::{BroadcastNotifier, Notification, NotificationGateway};
pub use order_code::{OrderCode, OrderCodeGenerator};
pub use provider::{PayOsClient, PaymentItem, PaymentProvider};
pub use signature::{VerifiedWebhook, WebhookVerifier};
pub use store::{
    BookingStore, MemoryBookingStore, MemoryPaymentStore, MemorySeatStatusStore, PaymentStore,
    SeatStatusStore,
};
pub use webhook::{ReconciliationEngine, WebhookOutcome};
