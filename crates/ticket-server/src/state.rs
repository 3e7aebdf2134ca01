//! Application State

use std::sync::Arc;

use ticket_payments::{PaymentLinkCoordinator, PaymentProvider, ReconciliationEngine};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment provider, also used to verify webhooks
    pub provider: Arc<dyn PaymentProvider>,

    /// Link creation, status and cancellation
    pub coordinator: Arc<PaymentLinkCoordinator>,

    /// Webhook reconciliation
    pub engine: Arc<ReconciliationEngine>,
}
