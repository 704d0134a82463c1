use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use crate::model::{Event, EventId, IdempotencyKey, Order, OrderId, RoomAvailability, RoomKey};

/// Opaque reference to an open transaction.
///
/// Every staging call, the commit and the rollback must carry it. Once the
/// transaction is committed or rolled back the handle is stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionHandle(pub(super) u64);

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trx-{}", self.0)
    }
}

/// Write buffer of one transaction. Nothing in it is visible to readers until
/// the commit merges it into the store.
#[derive(Debug, Default)]
pub(super) struct Transaction {
    pub idempotency_key: Option<IdempotencyKey>,
    pub rooms: HashMap<RoomKey, RoomAvailability>,
    pub orders: HashMap<OrderId, Order>,
    pub events: HashMap<EventId, Event>,
}

impl Transaction {
    pub fn new(idempotency_key: Option<IdempotencyKey>) -> Self {
        Self {
            idempotency_key,
            ..Self::default()
        }
    }

    /// Stage `room` unless its key is already staged. Returns whether it was staged.
    pub fn stage_room(&mut self, room: RoomAvailability) -> bool {
        match self.rooms.entry(room.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(room);
                true
            }
        }
    }

    pub fn stage_order(&mut self, order: Order) -> bool {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(order);
                true
            }
        }
    }

    pub fn stage_event(&mut self, event: Event) -> bool {
        match self.events.entry(event.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(event);
                true
            }
        }
    }

    pub fn staged_writes(&self) -> usize {
        self.rooms.len() + self.orders.len() + self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn room(quota: u32) -> RoomAvailability {
        let date = NaiveDate::from_ymd_opt(2024, 2, 26).unwrap();
        RoomAvailability::new("reddison", "lux", date, quota)
    }

    #[test]
    fn first_staged_room_wins() {
        let mut trx = Transaction::new(None);
        assert!(trx.stage_room(room(1)));
        assert!(!trx.stage_room(room(0)));

        assert_eq!(trx.rooms.len(), 1);
        assert_eq!(trx.rooms.values().next().unwrap().quota, 1);
    }

    #[test]
    fn handle_display() {
        assert_eq!(TransactionHandle(7).to_string(), "trx-7");
    }

    #[test]
    fn new_transaction_is_empty() {
        let trx = Transaction::new(Some(IdempotencyKey::new("k").unwrap()));
        assert_eq!(trx.staged_writes(), 0);
        assert!(trx.idempotency_key.is_some());
    }
}
