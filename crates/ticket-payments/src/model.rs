//! Domain Records
//!
//! Payment, booking and seat rows as this crate sees them. Each is stored
//! and updated on its own; nothing here assumes a cross-record transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::order_code::OrderCode;

/// Provider name recorded on payments created by this crate
pub const PROVIDER_PAYOS: &str = "payos";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    /// No further outcome may overwrite this status
    pub const fn is_final(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,

    /// Booking this payment settles, if any
    pub booking_id: Option<i64>,

    pub provider: String,

    /// Provider-side payment link id
    pub transaction_ref: Option<String>,

    pub order_code: OrderCode,

    pub amount: i64,

    pub status: PaymentStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a payment; the store assigns the id
#[derive(Clone, Debug)]
pub struct NewPayment {
    pub booking_id: Option<i64>,
    pub provider: String,
    pub transaction_ref: Option<String>,
    pub order_code: OrderCode,
    pub amount: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Paid,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Paid => "PAID",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking row. `cancelled_at` is set exactly when the status is cancelled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub status: BookingStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            status: BookingStatus::Pending,
            cancelled_at: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Available,
    Locked,
    Booked,
}

/// Per-trip seat row
///
/// `booking_id` is present iff the seat is locked or booked, and
/// `locked_until` only while locked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeatStatus {
    pub id: i64,
    pub seat_id: String,
    pub trip_id: i64,
    pub booking_id: Option<i64>,
    pub state: SeatState,
    pub locked_until: Option<DateTime<Utc>>,
}

impl SeatStatus {
    /// A seat held for a booking until `locked_until`
    pub fn locked(
        id: i64,
        seat_id: impl Into<String>,
        trip_id: i64,
        booking_id: i64,
        locked_until: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            seat_id: seat_id.into(),
            trip_id,
            booking_id: Some(booking_id),
            state: SeatState::Locked,
            locked_until: Some(locked_until),
        }
    }

    /// Whether the booking reference and lock expiry agree with the state
    pub const fn is_consistent(&self) -> bool {
        match self.state {
            SeatState::Available => self.booking_id.is_none() && self.locked_until.is_none(),
            SeatState::Locked => self.booking_id.is_some(),
            SeatState::Booked => self.booking_id.is_some() && self.locked_until.is_none(),
        }
    }
}
