//! ticket-server
//!
//! Axum server exposing payment link endpoints and the PayOS webhook.
//!
//! Storage is in memory and notifications go to a broadcast channel whose
//! events are logged; both are stand-ins for the booking platform's own
//! database and real-time transport.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::sync::broadcast::error::RecvError;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticket_payments::{
    BookingCascade, BroadcastNotifier, LinkUrls, MemoryBookingStore, MemoryPaymentStore,
    MemorySeatStatusStore, PayOsClient, PayOsConfig, PaymentLinkCoordinator, PaymentProvider,
    ReconciliationEngine,
};

use crate::handlers::{
    cancel_payment_link, create_payment_link, get_payment_status, health_check, payos_webhook,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Missing PayOS credentials are fatal
    let config = PayOsConfig::from_env().inspect_err(|e| {
        tracing::error!("PayOS not configured: {}", e);
        tracing::error!("  Set PAYOS_CLIENT_ID, PAYOS_API_KEY and PAYOS_CHECKSUM_KEY in .env");
    })?;
    let urls = LinkUrls::from(&config);
    let provider: Arc<dyn PaymentProvider> = Arc::new(PayOsClient::new(config)?);
    tracing::info!("✓ PayOS configured");

    // Stores
    let payments = Arc::new(MemoryPaymentStore::new());
    let bookings = Arc::new(MemoryBookingStore::new());
    let seats = Arc::new(MemorySeatStatusStore::new());

    // Notifications
    let notifier = BroadcastNotifier::new(256);
    spawn_notification_logger(&notifier);

    let cascade = Arc::new(BookingCascade::new(
        bookings,
        seats,
        Arc::new(notifier),
    ));

    // Build application state
    let state = AppState {
        coordinator: Arc::new(PaymentLinkCoordinator::new(
            provider.clone(),
            payments.clone(),
            cascade.clone(),
            urls,
        )),
        engine: Arc::new(ReconciliationEngine::new(payments, cascade)),
        provider,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        // Payment links
        .route("/api/payments", post(create_payment_link))
        .route("/api/payments/{order_code}", get(get_payment_status))
        .route("/api/payments/{order_code}/cancel", post(cancel_payment_link))
        // Provider callbacks
        .route("/webhook/payos", post(payos_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("ticket-server running on http://{}", addr);
    tracing::info!("  POST /api/payments                    - Create payment link");
    tracing::info!("  GET  /api/payments/{{order_code}}        - Payment link status");
    tracing::info!("  POST /api/payments/{{order_code}}/cancel - Cancel payment link");
    tracing::info!("  POST /webhook/payos                   - PayOS webhook");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Log every published notification until the channel closes
fn spawn_notification_logger(notifier: &BroadcastNotifier) {
    let mut rx = notifier.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(notification) => match serde_json::to_string(&notification) {
                    Ok(json) => tracing::info!(notification = %json, "Notification published"),
                    Err(e) => tracing::warn!("Unserializable notification: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
