//! Notification Fanout
//!
//! Best-effort publishing of seat and booking changes to real-time
//! observers. Delivery is at most once; callers log failures and move on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::model::{BookingStatus, SeatStatus};

/// Notification gateway trait
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Seats on a trip became available again
    async fn notify_seats_available(&self, trip_id: i64, seat_ids: &[String]) -> Result<()>;

    /// Seats on a trip are now booked
    async fn notify_seats_booked(&self, trip_id: i64, seat_ids: &[String]) -> Result<()>;

    /// A booking moved to a new status
    async fn notify_booking_status_changed(
        &self,
        booking_id: i64,
        status: BookingStatus,
        metadata: serde_json::Value,
    ) -> Result<()>;
}

/// Published notification
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    SeatsAvailable {
        trip_id: i64,
        seat_ids: Vec<String>,
    },
    SeatsBooked {
        trip_id: i64,
        seat_ids: Vec<String>,
    },
    BookingStatusChanged {
        booking_id: i64,
        status: BookingStatus,
        metadata: serde_json::Value,
    },
}

/// Group seat ids by trip, in trip order
pub fn seats_by_trip(seats: &[SeatStatus]) -> BTreeMap<i64, Vec<String>> {
    let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for seat in seats {
        grouped.entry(seat.trip_id).or_default().push(seat.seat_id.clone());
    }
    grouped
}

/// Notifier backed by a tokio broadcast channel
///
/// Having no subscribers is not an error: nobody is watching.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    fn publish(&self, notification: Notification) {
        match self.tx.send(notification) {
            Ok(receivers) => tracing::debug!(receivers, "Published notification"),
            Err(_) => tracing::trace!("No notification subscribers"),
        }
    }
}

#[async_trait]
impl NotificationGateway for BroadcastNotifier {
    async fn notify_seats_available(&self, trip_id: i64, seat_ids: &[String]) -> Result<()> {
        self.publish(Notification::SeatsAvailable {
            trip_id,
            seat_ids: seat_ids.to_vec(),
        });
        Ok(())
    }

    async fn notify_seats_booked(&self, trip_id: i64, seat_ids: &[String]) -> Result<()> {
        self.publish(Notification::SeatsBooked {
            trip_id,
            seat_ids: seat_ids.to_vec(),
        });
        Ok(())
    }

    async fn notify_booking_status_changed(
        &self,
        booking_id: i64,
        status: BookingStatus,
        metadata: serde_json::Value,
    ) -> Result<()> {
        self.publish(Notification::BookingStatusChanged {
            booking_id,
            status,
            metadata,
        });
        Ok(())
    }
}
