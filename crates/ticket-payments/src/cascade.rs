//! Booking and Seat Cascade
//!
//! Once a payment has reached a terminal status, its booking and seats have
//! to follow. The cascade runs four steps in order (booking update, seat
//! update, booking notification, seat notification). Each step runs even if
//! an earlier one failed; failures are logged and reported back by name.

use std::sync::Arc;

use chrono::Utc;

use crate::model::{Booking, BookingStatus, SeatStatus};
use crate::notify::{NotificationGateway, seats_by_trip};
use crate::store::{BookingStore, SeatStatusStore};

/// Where a booking ends up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// Payment completed: booking paid, seats booked
    Paid,

    /// Payment failed or was cancelled: booking cancelled, seats released
    Released { reason: &'static str },
}

impl Settlement {
    pub const fn booking_status(self) -> BookingStatus {
        match self {
            Settlement::Paid => BookingStatus::Paid,
            Settlement::Released { .. } => BookingStatus::Cancelled,
        }
    }
}

/// Outcome of a cascade run
#[derive(Clone, Debug, Default)]
pub struct CascadeReport {
    /// Steps that failed, in execution order
    pub failed_steps: Vec<&'static str>,

    /// Seat rows read before the seat update
    pub seats: Vec<SeatStatus>,
}

impl CascadeReport {
    pub fn is_clean(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

/// Drives booking and seat rows after a payment outcome
pub struct BookingCascade {
    bookings: Arc<dyn BookingStore>,
    seats: Arc<dyn SeatStatusStore>,
    notifier: Arc<dyn NotificationGateway>,
}

impl BookingCascade {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        seats: Arc<dyn SeatStatusStore>,
        notifier: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self {
            bookings,
            seats,
            notifier,
        }
    }

    /// Run all four steps for one booking
    ///
    /// `metadata` is attached to the booking notification; for released
    /// bookings a `reason` field is added to it.
    pub async fn settle(
        &self,
        booking_id: i64,
        settlement: Settlement,
        metadata: serde_json::Value,
    ) -> CascadeReport {
        let mut report = CascadeReport::default();

        // a failed lookup still notifies; only a known-missing booking is silent
        let booking_exists = match self.update_booking(booking_id, settlement).await {
            Ok(exists) => exists,
            Err(step) => {
                report.failed_steps.push(step);
                true
            }
        };

        match self.update_seats(booking_id, settlement).await {
            Ok(seats) => report.seats = seats,
            Err((step, seats)) => {
                report.failed_steps.push(step);
                report.seats = seats;
            }
        }

        let metadata = match (settlement, metadata) {
            (Settlement::Released { reason }, serde_json::Value::Object(mut fields)) => {
                fields.insert("reason".into(), reason.into());
                serde_json::Value::Object(fields)
            }
            (_, other) => other,
        };

        if booking_exists {
            if let Err(e) = self
                .notifier
                .notify_booking_status_changed(booking_id, settlement.booking_status(), metadata)
                .await
            {
                tracing::warn!(booking_id, error = %e, "Booking notification failed");
                report.failed_steps.push("booking_notification");
            }
        }

        for (trip_id, seat_ids) in seats_by_trip(&report.seats) {
            let sent = match settlement {
                Settlement::Paid => self.notifier.notify_seats_booked(trip_id, &seat_ids).await,
                Settlement::Released { .. } => {
                    self.notifier.notify_seats_available(trip_id, &seat_ids).await
                }
            };

            if let Err(e) = sent {
                tracing::warn!(booking_id, trip_id, error = %e, "Seat notification failed");
                if !report.failed_steps.contains(&"seat_notification") {
                    report.failed_steps.push("seat_notification");
                }
            }
        }

        report
    }

    async fn update_booking(
        &self,
        booking_id: i64,
        settlement: Settlement,
    ) -> Result<bool, &'static str> {
        let target = settlement.booking_status();

        let snapshot: Option<Booking> = self.bookings.find(booking_id).await.map_err(|e| {
            tracing::error!(booking_id, error = %e, "Booking lookup failed");
            "booking_update"
        })?;

        match snapshot {
            None => {
                tracing::warn!(booking_id, "Booking referenced by payment does not exist");
                return Ok(false);
            }
            Some(booking) if booking.status == target => {
                // replayed event; keep the original cancellation time
                tracing::debug!(booking_id, status = %target, "Booking already settled");
                return Ok(true);
            }
            Some(_) => {}
        }

        let cancelled_at = match settlement {
            Settlement::Paid => None,
            Settlement::Released { .. } => Some(Utc::now()),
        };

        self.bookings
            .update_status(booking_id, target, cancelled_at)
            .await
            .map(|affected| {
                tracing::info!(booking_id, status = %target, affected, "Updated booking");
                true
            })
            .map_err(|e| {
                tracing::error!(booking_id, status = %target, error = %e, "Booking update failed");
                "booking_update"
            })
    }

    async fn update_seats(
        &self,
        booking_id: i64,
        settlement: Settlement,
    ) -> Result<Vec<SeatStatus>, (&'static str, Vec<SeatStatus>)> {
        // read first: a release clears the booking reference we filter on
        let snapshot = match self.seats.find_by_booking(booking_id).await {
            Ok(seats) => seats,
            Err(e) => {
                tracing::error!(booking_id, error = %e, "Seat lookup failed");
                Vec::new()
            }
        };

        let updated = match settlement {
            Settlement::Paid => self.seats.mark_booked(booking_id).await,
            Settlement::Released { .. } => self.seats.release(booking_id).await,
        };

        match updated {
            Ok(affected) => {
                tracing::info!(booking_id, affected, ?settlement, "Updated seats");
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!(booking_id, ?settlement, error = %e, "Seat update failed");
                Err(("seat_update", snapshot))
            }
        }
    }
}
