//! Transactional in-memory inventory store.
//!
//! The store owns the authoritative room availabilities, committed orders and
//! events, and the idempotency index. Writes go through transactions: staging
//! calls fill a per-transaction buffer, the commit merges it into authoritative
//! state in one critical section, and a rollback simply drops the buffer.
//!
//! Every committed availability carries a version. The commit refuses a
//! transaction whose staged availabilities were read at an older version, so
//! two bookings racing for the same room-day cannot both succeed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::model::{
    AvailabilityQuery, Event, EventId, IdempotencyKey, Order, OrderId, RoomAvailability, RoomKey,
};

mod error;
pub use error::{AvailabilityError, StoreError, UnavailableRoom};

mod transaction;
use transaction::Transaction;
pub use transaction::TransactionHandle;

/// Storage contract consumed by the booking workflow.
pub trait Inventory: Send + Sync {
    /// Open a transaction. Only transactions opened with an idempotency key can
    /// be committed.
    fn begin_transaction(
        &self,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<TransactionHandle, StoreError>;

    fn save_room_availabilities(
        &self,
        trx: &TransactionHandle,
        availabilities: Vec<RoomAvailability>,
    ) -> Result<(), StoreError>;

    fn save_order(&self, trx: &TransactionHandle, order: Order) -> Result<(), StoreError>;

    fn save_event(&self, trx: &TransactionHandle, event: Event) -> Result<(), StoreError>;

    fn commit_transaction(&self, trx: &TransactionHandle) -> Result<(), StoreError>;

    fn rollback_transaction(&self, trx: &TransactionHandle) -> Result<(), StoreError>;

    /// One record per requested day, in query order, or every unavailable day.
    fn get_availabilities(
        &self,
        queries: &[AvailabilityQuery],
    ) -> Result<Vec<RoomAvailability>, AvailabilityError>;

    fn get_order_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Order, StoreError>;
}

#[derive(Debug, Default)]
struct State {
    rooms: HashMap<RoomKey, RoomAvailability>,
    orders: HashMap<OrderId, Order>,
    events: BTreeMap<EventId, Event>,
    idempotency: HashMap<IdempotencyKey, OrderId>,
    transactions: HashMap<u64, Transaction>,
    last_transaction: u64,
}

/// The in-memory store. All maps sit behind one mutex and every method is a
/// single critical section.
#[derive(Debug, Default)]
pub struct InventoryStore {
    state: Mutex<State>,
}

/// Public API
impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed availability for one room-day.
    pub fn availability(&self, key: &RoomKey) -> Option<RoomAvailability> {
        self.state().rooms.get(key).cloned()
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.state().orders.get(&id).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.state().orders.len()
    }

    /// Committed creation events in id order.
    pub fn events(&self) -> Vec<Event> {
        self.state().events.values().cloned().collect()
    }

    pub fn open_transactions(&self) -> usize {
        self.state().transactions.len()
    }
}

/// Private API
impl InventoryStore {
    /// Authoritative state is only written by the commit merge, which cannot
    /// leave it half-updated, so a poisoned lock is safe to reuse.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transaction<'a>(
        state: &'a mut State,
        trx: &TransactionHandle,
    ) -> Result<&'a mut Transaction, StoreError> {
        state
            .transactions
            .get_mut(&trx.0)
            .ok_or_else(|| StoreError::TransactionNotFound(trx.clone()))
    }
}

impl Inventory for InventoryStore {
    fn begin_transaction(
        &self,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<TransactionHandle, StoreError> {
        let mut state = self.state();

        let id = state
            .last_transaction
            .checked_add(1)
            .ok_or(StoreError::TransactionCreation)?;
        state.last_transaction = id;
        state
            .transactions
            .insert(id, Transaction::new(idempotency_key));

        let trx = TransactionHandle(id);
        debug!(transaction = %trx, "transaction opened");
        Ok(trx)
    }

    fn save_room_availabilities(
        &self,
        trx: &TransactionHandle,
        availabilities: Vec<RoomAvailability>,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let transaction = Self::transaction(&mut state, trx)?;

        let requested = availabilities.len();
        let staged = availabilities
            .into_iter()
            .map(|room| transaction.stage_room(room))
            .filter(|staged| *staged)
            .count();

        debug!(transaction = %trx, requested, staged, "room availabilities staged");
        Ok(())
    }

    fn save_order(&self, trx: &TransactionHandle, order: Order) -> Result<(), StoreError> {
        let mut state = self.state();
        let order_id = order.id;
        if Self::transaction(&mut state, trx)?.stage_order(order) {
            debug!(transaction = %trx, order_id, "order staged");
        }
        Ok(())
    }

    fn save_event(&self, trx: &TransactionHandle, event: Event) -> Result<(), StoreError> {
        let mut state = self.state();
        let event_id = event.id;
        if Self::transaction(&mut state, trx)?.stage_event(event) {
            debug!(transaction = %trx, event_id, "event staged");
        }
        Ok(())
    }

    fn commit_transaction(&self, trx: &TransactionHandle) -> Result<(), StoreError> {
        let mut guard = self.state();
        let state = &mut *guard;

        let transaction = state
            .transactions
            .get(&trx.0)
            .ok_or_else(|| StoreError::TransactionNotFound(trx.clone()))?;

        let key = transaction
            .idempotency_key
            .clone()
            .ok_or_else(|| StoreError::IdempotencyKeyMissing(trx.clone()))?;

        // Validate everything before touching authoritative state; a rejected
        // transaction stays open for the caller to roll back.
        // A taken key wins over stale versions: the caller replays instead of
        // retrying.
        if !transaction.orders.is_empty() && state.idempotency.contains_key(&key) {
            return Err(StoreError::IdempotencyKeyTaken(key));
        }

        let mut stale: Vec<RoomKey> = transaction
            .rooms
            .iter()
            .filter(|(key, staged)| {
                let committed = state.rooms.get(*key).map_or(0, |room| room.version);
                committed != staged.version
            })
            .map(|(key, _)| key.clone())
            .collect();

        if !stale.is_empty() {
            stale.sort();
            return Err(StoreError::VersionConflict {
                transaction: trx.clone(),
                rooms: stale,
            });
        }

        let Some(transaction) = state.transactions.remove(&trx.0) else {
            return Err(StoreError::TransactionNotFound(trx.clone()));
        };
        let writes = transaction.staged_writes();

        for (room_key, mut room) in transaction.rooms {
            room.version += 1;
            state.rooms.insert(room_key, room);
        }

        for (order_id, order) in transaction.orders {
            state.idempotency.entry(key.clone()).or_insert(order_id);
            state.orders.insert(order_id, order);
        }

        state.events.extend(transaction.events);

        debug!(transaction = %trx, idempotency_key = %key, writes, "transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, trx: &TransactionHandle) -> Result<(), StoreError> {
        let mut state = self.state();
        let transaction = state
            .transactions
            .remove(&trx.0)
            .ok_or_else(|| StoreError::TransactionNotFound(trx.clone()))?;

        debug!(
            transaction = %trx,
            discarded = transaction.staged_writes(),
            "transaction rolled back"
        );
        Ok(())
    }

    fn get_availabilities(
        &self,
        queries: &[AvailabilityQuery],
    ) -> Result<Vec<RoomAvailability>, AvailabilityError> {
        let state = self.state();

        let mut unavailable = AvailabilityError::new();
        let mut result = Vec::new();

        for key in queries.iter().flat_map(AvailabilityQuery::keys) {
            match state.rooms.get(&key) {
                Some(room) if room.quota >= 1 => result.push(room.clone()),
                _ => unavailable.add(&key),
            }
        }

        if !unavailable.is_empty() {
            return Err(unavailable);
        }

        Ok(result)
    }

    fn get_order_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Order, StoreError> {
        let state = self.state();
        state
            .idempotency
            .get(key)
            .and_then(|id| state.orders.get(id))
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound(key.clone()))
    }
}
