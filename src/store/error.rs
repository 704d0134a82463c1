//! Error types for the inventory store.

use chrono::NaiveDate;
use thiserror::Error;

use super::TransactionHandle;
use crate::model::{IdempotencyKey, RoomKey};

/// Errors raised by transaction management and lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("cannot open a transaction: handle space exhausted")]
    TransactionCreation,

    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionHandle),

    #[error("transaction {0} has no idempotency key to commit under")]
    IdempotencyKeyMissing(TransactionHandle),

    #[error("no order recorded under idempotency key '{0}'")]
    RecordNotFound(IdempotencyKey),

    #[error(
        "transaction {transaction} staged {count} stale room availabilities",
        count = .rooms.len()
    )]
    VersionConflict {
        transaction: TransactionHandle,
        rooms: Vec<RoomKey>,
    },

    #[error("idempotency key '{0}' already has a committed order")]
    IdempotencyKeyTaken(IdempotencyKey),
}

/// Dates one room cannot be booked on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "room '{room_id}' is unavailable in hotel '{hotel_id}' on dates [{}]",
    .dates.iter().map(NaiveDate::to_string).collect::<Vec<_>>().join(", ")
)]
pub struct UnavailableRoom {
    pub hotel_id: String,
    pub room_id: String,
    pub dates: Vec<NaiveDate>,
}

/// Every requested room-day lacking quota, grouped per (hotel, room) in
/// request order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
#[error("{}", .rooms.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct AvailabilityError {
    rooms: Vec<UnavailableRoom>,
}

impl AvailabilityError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a RoomKey>) -> Self {
        let mut error = Self::new();
        for key in keys {
            error.add(key);
        }
        error
    }

    /// Record `key` as unavailable. Repeated dates are kept once.
    pub fn add(&mut self, key: &RoomKey) {
        let position = self
            .rooms
            .iter()
            .position(|room| room.hotel_id == key.hotel_id && room.room_id == key.room_id);

        match position {
            Some(idx) => {
                let dates = &mut self.rooms[idx].dates;
                if !dates.contains(&key.date) {
                    dates.push(key.date);
                }
            }
            None => self.rooms.push(UnavailableRoom {
                hotel_id: key.hotel_id.clone(),
                room_id: key.room_id.clone(),
                dates: vec![key.date],
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn rooms(&self) -> &[UnavailableRoom] {
        &self.rooms
    }

    /// Human-readable line per room, as returned to clients.
    pub fn messages(&self) -> Vec<String> {
        self.rooms.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(room: &str, day: u32) -> RoomKey {
        RoomKey {
            hotel_id: "reddison".into(),
            room_id: room.into(),
            date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
        }
    }

    #[test]
    fn groups_dates_per_room() {
        let error = AvailabilityError::from_keys(&[key("lux", 26), key("std", 26), key("lux", 28)]);

        assert_eq!(error.rooms().len(), 2);
        assert_eq!(error.rooms()[0].room_id, "lux");
        assert_eq!(error.rooms()[0].dates.len(), 2);
        assert_eq!(error.rooms()[1].room_id, "std");
    }

    #[test]
    fn repeated_dates_are_kept_once() {
        let error = AvailabilityError::from_keys(&[key("lux", 26), key("lux", 26)]);
        assert_eq!(error.rooms()[0].dates.len(), 1);
    }

    #[test]
    fn messages_name_room_hotel_and_dates() {
        let error = AvailabilityError::from_keys(&[key("lux", 26), key("lux", 27)]);
        assert_eq!(
            error.messages(),
            vec!["room 'lux' is unavailable in hotel 'reddison' on dates [2024-02-26, 2024-02-27]"]
        );
        assert_eq!(error.to_string(), error.messages()[0]);
    }

    #[test]
    fn display_joins_rooms() {
        let error = AvailabilityError::from_keys(&[key("lux", 26), key("suite", 27)]);
        assert_eq!(
            error.to_string(),
            "room 'lux' is unavailable in hotel 'reddison' on dates [2024-02-26]; \
             room 'suite' is unavailable in hotel 'reddison' on dates [2024-02-27]"
        );
    }

    #[test]
    fn new_error_is_empty() {
        assert!(AvailabilityError::new().is_empty());
    }
}
