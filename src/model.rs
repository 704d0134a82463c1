//! Core domain types for the booking service.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Amount;

/// Order identifier.
pub type OrderId = u64;

/// Creation event identifier.
pub type EventId = u64;

/// Client-supplied token guaranteeing at most one order per logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct IdempotencyKey(String);

/// The key was empty or only whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("idempotency key must not be empty")]
pub struct EmptyIdempotencyKey;

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Result<Self, EmptyIdempotencyKey> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(EmptyIdempotencyKey);
        }
        Ok(Self(key))
    }

    /// For keys fixed at compile time and known to be non-empty.
    pub(crate) fn from_static(key: &'static str) -> Self {
        Self(key.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one room on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey {
    pub hotel_id: String,
    pub room_id: String,
    pub date: NaiveDate,
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.hotel_id, self.room_id, self.date)
    }
}

/// Remaining quota for one room on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAvailability {
    pub hotel_id: String,
    pub room_id: String,
    pub date: NaiveDate,
    pub quota: u32,
    /// Nightly rate charged for this room on this day.
    pub rate: Amount,
    /// Store-managed revision, bumped on every commit touching the record.
    /// Records that were never committed carry 0.
    pub version: u64,
}

impl RoomAvailability {
    pub fn new(
        hotel_id: impl Into<String>,
        room_id: impl Into<String>,
        date: NaiveDate,
        quota: u32,
    ) -> Self {
        Self {
            hotel_id: hotel_id.into(),
            room_id: room_id.into(),
            date,
            quota,
            rate: Amount::ZERO,
            version: 0,
        }
    }

    pub fn with_rate(mut self, rate: Amount) -> Self {
        self.rate = rate;
        self
    }

    pub fn key(&self) -> RoomKey {
        RoomKey {
            hotel_id: self.hotel_id.clone(),
            room_id: self.room_id.clone(),
            date: self.date,
        }
    }
}

/// A day-granular availability window for one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub hotel_id: String,
    pub room_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl AvailabilityQuery {
    /// Every key covered by the inclusive window.
    pub fn keys(&self) -> impl Iterator<Item = RoomKey> + '_ {
        days(self.from, self.to).map(|date| RoomKey {
            hotel_id: self.hotel_id.clone(),
            room_id: self.room_id.clone(),
            date,
        })
    }
}

/// Inclusive day range, empty when `from > to`.
pub fn days(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |day| *day <= to)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub email: String,
}

/// A requested stay as received from the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaceRequest {
    #[serde(default)]
    pub hotel_id: String,
    #[serde(default)]
    pub room_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Booking request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookInput {
    pub payer: Payer,
    #[serde(default)]
    pub places: Vec<PlaceRequest>,
}

/// A booked stay, normalized to whole days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Place {
    pub hotel_id: String,
    pub room_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub price: Amount,
}

impl Place {
    pub fn query(&self) -> AvailabilityQuery {
        AvailabilityQuery {
            hotel_id: self.hotel_id.clone(),
            room_id: self.room_id.clone(),
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub payer: Payer,
    pub places: Vec<Place>,
    pub created_at: DateTime<Utc>,
    pub price: Amount,
}

impl Order {
    /// Recompute the order total from its places.
    pub fn reprice(&mut self) {
        self.price = self.places.iter().map(|place| place.price).sum();
    }
}

/// Append-only creation record, one per committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: EventId,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
}
