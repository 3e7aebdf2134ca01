//! Record Storage
//!
//! Each store is atomic per call (update-by-filter, returning the number of
//! affected rows) and nothing more: there are no transactions spanning
//! stores. Concurrent writers resolve last-write-wins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};
use crate::model::{Booking, BookingStatus, NewPayment, Payment, PaymentStatus, SeatState, SeatStatus};
use crate::order_code::OrderCode;

/// Payment storage trait
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a new pending payment; fails on a duplicate order code
    async fn insert(&self, payment: NewPayment) -> Result<Payment>;

    /// Get payment by order code
    async fn find_by_order_code(&self, order_code: OrderCode) -> Result<Option<Payment>>;

    /// Set the status of the payment with this order code
    async fn update_status(&self, order_code: OrderCode, status: PaymentStatus) -> Result<u64>;
}

/// Booking storage trait. Bookings are created elsewhere; this crate only
/// moves their status.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find(&self, booking_id: i64) -> Result<Option<Booking>>;

    async fn update_status(
        &self,
        booking_id: i64,
        status: BookingStatus,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Result<u64>;
}

/// Seat status storage trait
#[async_trait]
pub trait SeatStatusStore: Send + Sync {
    /// All seat rows referencing a booking
    async fn find_by_booking(&self, booking_id: i64) -> Result<Vec<SeatStatus>>;

    /// Booked, lock expiry cleared
    async fn mark_booked(&self, booking_id: i64) -> Result<u64>;

    /// Available, booking reference and lock expiry cleared
    async fn release(&self, booking_id: i64) -> Result<u64>;
}

/// In-memory payment store (for development)
pub struct MemoryPaymentStore {
    payments: RwLock<HashMap<OrderCode, Payment>>,
    next_id: AtomicI64,
}

impl Default for MemoryPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self {
            payments: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Load an existing row as-is
    pub async fn seed(&self, payment: Payment) {
        self.next_id.fetch_max(payment.id + 1, Ordering::SeqCst);
        self.payments.write().await.insert(payment.order_code, payment);
    }

    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert(&self, payment: NewPayment) -> Result<Payment> {
        let mut payments = self.payments.write().await;

        if payments.contains_key(&payment.order_code) {
            return Err(PaymentError::DuplicateOrderCode(payment.order_code));
        }

        let now = Utc::now();
        let row = Payment {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            booking_id: payment.booking_id,
            provider: payment.provider,
            transaction_ref: payment.transaction_ref,
            order_code: payment.order_code,
            amount: payment.amount,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        payments.insert(row.order_code, row.clone());

        Ok(row)
    }

    async fn find_by_order_code(&self, order_code: OrderCode) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(&order_code).cloned())
    }

    async fn update_status(&self, order_code: OrderCode, status: PaymentStatus) -> Result<u64> {
        let mut payments = self.payments.write().await;

        Ok(payments.get_mut(&order_code).map_or(0, |payment| {
            payment.status = status;
            payment.updated_at = Utc::now();
            1
        }))
    }
}

/// In-memory booking store (for development)
#[derive(Default)]
pub struct MemoryBookingStore {
    bookings: RwLock<HashMap<i64, Booking>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a booking owned by the booking subsystem
    pub async fn seed(&self, booking: Booking) {
        self.bookings.write().await.insert(booking.id, booking);
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn find(&self, booking_id: i64) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&booking_id).cloned())
    }

    async fn update_status(
        &self,
        booking_id: i64,
        status: BookingStatus,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let mut bookings = self.bookings.write().await;

        Ok(bookings.get_mut(&booking_id).map_or(0, |booking| {
            booking.status = status;
            booking.cancelled_at = cancelled_at;
            booking.updated_at = Utc::now();
            1
        }))
    }
}

/// In-memory seat status store (for development)
#[derive(Default)]
pub struct MemorySeatStatusStore {
    seats: RwLock<HashMap<i64, SeatStatus>>,
}

impl MemorySeatStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a seat row written by the seat-locking subsystem
    pub async fn seed(&self, seat: SeatStatus) {
        self.seats.write().await.insert(seat.id, seat);
    }

    pub async fn get(&self, id: i64) -> Option<SeatStatus> {
        self.seats.read().await.get(&id).cloned()
    }

    /// Every row, ordered by id
    pub async fn all(&self) -> Vec<SeatStatus> {
        let mut rows: Vec<SeatStatus> = self.seats.read().await.values().cloned().collect();
        rows.sort_by_key(|s| s.id);
        rows
    }

    async fn update_where<F>(&self, booking_id: i64, mut apply: F) -> u64
    where
        F: FnMut(&mut SeatStatus) + Send,
    {
        let mut seats = self.seats.write().await;
        let mut affected = 0;

        for seat in seats.values_mut().filter(|s| s.booking_id == Some(booking_id)) {
            apply(seat);
            affected += 1;
        }

        affected
    }
}

#[async_trait]
impl SeatStatusStore for MemorySeatStatusStore {
    async fn find_by_booking(&self, booking_id: i64) -> Result<Vec<SeatStatus>> {
        let seats = self.seats.read().await;
        let mut rows: Vec<SeatStatus> = seats
            .values()
            .filter(|s| s.booking_id == Some(booking_id))
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.id);
        Ok(rows)
    }

    async fn mark_booked(&self, booking_id: i64) -> Result<u64> {
        Ok(self
            .update_where(booking_id, |seat| {
                seat.state = SeatState::Booked;
                seat.locked_until = None;
            })
            .await)
    }

    async fn release(&self, booking_id: i64) -> Result<u64> {
        Ok(self
            .update_where(booking_id, |seat| {
                seat.state = SeatState::Available;
                seat.booking_id = None;
                seat.locked_until = None;
            })
            .await)
    }
}
