//! Test doubles shared by the unit tests in this crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use crate::cascade::BookingCascade;
use crate::error::{PaymentError, Result};
use crate::model::{Booking, BookingStatus, Payment, PaymentStatus, SeatStatus, PROVIDER_PAYOS};
use crate::notify::{Notification, NotificationGateway};
use crate::order_code::OrderCode;
use crate::provider::{
    CreatePaymentLink, CreatedPaymentLink, PaymentLinkInfo, PaymentProvider, ProviderTransaction,
};
use crate::signature::{VerifiedWebhook, WebhookVerifier};
use crate::store::{MemoryBookingStore, MemoryPaymentStore, MemorySeatStatusStore, SeatStatusStore};

pub const CHECKSUM_KEY: &str = "test-checksum-key";

/// Sign and verify a webhook so tests get a real `VerifiedWebhook`
pub fn verified_event(order_code: i64, amount: i64, code: &str, desc: &str) -> VerifiedWebhook {
    let verifier = WebhookVerifier::new(CHECKSUM_KEY).unwrap();
    let body = verifier
        .signed_webhook(&serde_json::json!({
            "orderCode": order_code,
            "amount": amount,
            "description": format!("Booking {order_code}"),
            "code": code,
            "desc": desc,
            "reference": "FT0001",
            "transactionDateTime": "2024-05-01 10:00:00"
        }))
        .unwrap();
    verifier.verify(&body).unwrap()
}

/// Notifier that remembers what it was asked to publish
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: AtomicBool::new(true),
        }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    async fn record(&self, notification: Notification) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentError::Notification("transport down".into()));
        }
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn notify_seats_available(&self, trip_id: i64, seat_ids: &[String]) -> Result<()> {
        self.record(Notification::SeatsAvailable {
            trip_id,
            seat_ids: seat_ids.to_vec(),
        })
        .await
    }

    async fn notify_seats_booked(&self, trip_id: i64, seat_ids: &[String]) -> Result<()> {
        self.record(Notification::SeatsBooked {
            trip_id,
            seat_ids: seat_ids.to_vec(),
        })
        .await
    }

    async fn notify_booking_status_changed(
        &self,
        booking_id: i64,
        status: BookingStatus,
        metadata: serde_json::Value,
    ) -> Result<()> {
        self.record(Notification::BookingStatusChanged {
            booking_id,
            status,
            metadata,
        })
        .await
    }
}

/// Seat store whose writes can be made to fail
#[derive(Default)]
pub struct TestSeatStore {
    inner: MemorySeatStatusStore,
    fail_updates: AtomicBool,
}

impl TestSeatStore {
    pub async fn find_all(&self) -> Vec<SeatStatus> {
        self.inner.all().await
    }

    pub async fn seed(&self, seat: SeatStatus) {
        self.inner.seed(seat).await;
    }

    fn check(&self) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            Err(PaymentError::Storage("seat table unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SeatStatusStore for TestSeatStore {
    async fn find_by_booking(&self, booking_id: i64) -> Result<Vec<SeatStatus>> {
        self.inner.find_by_booking(booking_id).await
    }

    async fn mark_booked(&self, booking_id: i64) -> Result<u64> {
        self.check()?;
        self.inner.mark_booked(booking_id).await
    }

    async fn release(&self, booking_id: i64) -> Result<u64> {
        self.check()?;
        self.inner.release(booking_id).await
    }
}

/// Stores, notifier and cascade wired together
pub struct Fixture {
    pub payments: Arc<MemoryPaymentStore>,
    pub bookings: Arc<MemoryBookingStore>,
    pub seats: Arc<TestSeatStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub cascade: Arc<BookingCascade>,
}

#[derive(Default)]
pub struct FixtureBuilder {
    failing_notifier: bool,
    failing_seat_updates: bool,
}

impl FixtureBuilder {
    pub const fn failing_notifier(mut self) -> Self {
        self.failing_notifier = true;
        self
    }

    pub const fn failing_seat_updates(mut self) -> Self {
        self.failing_seat_updates = true;
        self
    }

    pub fn build(self) -> Fixture {
        let notifier = Arc::new(if self.failing_notifier {
            RecordingNotifier::failing()
        } else {
            RecordingNotifier::default()
        });
        let seats = Arc::new(TestSeatStore::default());
        seats
            .fail_updates
            .store(self.failing_seat_updates, Ordering::SeqCst);
        let bookings = Arc::new(MemoryBookingStore::new());

        let cascade = Arc::new(BookingCascade::new(
            bookings.clone(),
            seats.clone(),
            notifier.clone(),
        ));

        Fixture {
            payments: Arc::new(MemoryPaymentStore::new()),
            bookings,
            seats,
            notifier,
            cascade,
        }
    }

    /// Build with a pending booking holding locked seats on one trip
    pub async fn build_with_locked_booking(
        self,
        booking_id: i64,
        trip_id: i64,
        seat_ids: &[&str],
    ) -> Fixture {
        let fixture = self.build();
        fixture.bookings.seed(Booking::new(booking_id)).await;

        let locked_until = Utc::now() + Duration::minutes(10);
        for (index, seat_id) in (1i64..).zip(seat_ids) {
            fixture
                .seats
                .seed(SeatStatus::locked(index, *seat_id, trip_id, booking_id, locked_until))
                .await;
        }

        fixture
    }
}

impl Fixture {
    pub fn builder() -> FixtureBuilder {
        FixtureBuilder::default()
    }

    pub async fn with_locked_booking(booking_id: i64, trip_id: i64, seat_ids: &[&str]) -> Self {
        Self::builder()
            .build_with_locked_booking(booking_id, trip_id, seat_ids)
            .await
    }

    /// Seed a pending payment
    pub async fn seed_payment(&self, id: i64, order_code: i64, booking_id: Option<i64>) {
        let now = Utc::now();
        self.payments
            .seed(Payment {
                id,
                booking_id,
                provider: PROVIDER_PAYOS.into(),
                transaction_ref: Some(format!("link-{order_code}")),
                order_code: OrderCode::new(order_code),
                amount: 500_000,
                status: PaymentStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .await;
    }
}

/// In-memory provider recording the calls it receives
pub struct MockProvider {
    verifier: WebhookVerifier,
    fail: AtomicBool,
    pub created: Mutex<Vec<CreatePaymentLink>>,
    pub cancelled: Mutex<Vec<OrderCode>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            verifier: WebhookVerifier::new(CHECKSUM_KEY).unwrap(),
            fail: AtomicBool::new(false),
            created: Mutex::default(),
            cancelled: Mutex::default(),
        }
    }
}

impl MockProvider {
    pub fn failing() -> Self {
        let provider = Self::default();
        provider.fail.store(true, Ordering::SeqCst);
        provider
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PaymentError::Provider("connection reset".into()))
        } else {
            Ok(())
        }
    }

    fn link_info(order_code: OrderCode, status: &str) -> PaymentLinkInfo {
        PaymentLinkInfo {
            id: format!("link-{order_code}"),
            order_code,
            amount: 500_000,
            amount_paid: 0,
            status: status.into(),
            created_at: None,
            transactions: vec![
                ProviderTransaction {
                    reference: "FT-early".into(),
                    amount: 200_000,
                    account_number: "0001".into(),
                    description: "first transfer".into(),
                    transaction_date_time: "2024-05-01 09:00:00".into(),
                    ..Default::default()
                },
                ProviderTransaction {
                    reference: "FT-late".into(),
                    amount: 300_000,
                    account_number: "0002".into(),
                    description: "second transfer".into(),
                    transaction_date_time: "2024-05-01 10:00:00".into(),
                    ..Default::default()
                },
            ],
            cancellation_reason: None,
        }
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_payment_link(&self, request: &CreatePaymentLink) -> Result<CreatedPaymentLink> {
        self.check()?;
        self.created.lock().await.push(request.clone());

        Ok(CreatedPaymentLink {
            payment_link_id: format!("link-{}", request.order_code),
            checkout_url: format!("https://pay.test/web/{}", request.order_code),
            account_number: "113366668888".into(),
            account_name: "TICKET CO".into(),
            amount: request.amount,
            description: request.description.clone(),
            order_code: request.order_code,
            status: "PENDING".into(),
            qr_code: None,
        })
    }

    async fn get_payment_link(&self, order_code: OrderCode) -> Result<PaymentLinkInfo> {
        self.check()?;
        Ok(Self::link_info(order_code, "PAID"))
    }

    async fn cancel_payment_link(
        &self,
        order_code: OrderCode,
        _reason: Option<&str>,
    ) -> Result<PaymentLinkInfo> {
        self.check()?;
        self.cancelled.lock().await.push(order_code);
        Ok(Self::link_info(order_code, "CANCELLED"))
    }

    fn verify_webhook(&self, payload: &[u8]) -> Result<VerifiedWebhook> {
        self.verifier.verify(payload)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
