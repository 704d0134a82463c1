//! Order creation workflow.
//!
//! A booking validates the request, returns the already committed order when
//! the idempotency key was seen before, and otherwise reads availability,
//! decrements one unit per requested room-day, prices the order and persists
//! order, availabilities and creation event in one transaction.
//!
//! The availability read and the commit are separate critical sections of the
//! store. A commit whose availabilities changed in between is rejected by the
//! store's version check; the workflow then rolls back and starts over from
//! the read, up to [`BookingConfig::max_commit_attempts`] times.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::{debug, error, info, warn};

use crate::Amount;
use crate::boost::{PriceAdjustment, StrategyProvider};
use crate::config::BookingConfig;
use crate::idgen::IdGenerator;
use crate::model::{
    AvailabilityQuery, BookInput, Event, IdempotencyKey, Order, Payer, Place, RoomAvailability,
    RoomKey,
};
use crate::store::{AvailabilityError, Inventory, StoreError, TransactionHandle};

mod cancel;
pub use cancel::CancellationSignal;

mod error;
pub use error::BookingError;

mod validate;
pub use validate::InputValidationError;

/// The booking workflow over a store `S` and an identifier source `G`.
pub struct Booking<S, G> {
    store: S,
    ids: G,
    strategies: Option<Box<dyn StrategyProvider>>,
    clock: Arc<dyn Clock + Send + Sync>,
    config: BookingConfig,
}

/// Public API
impl<S: Inventory, G: IdGenerator> Booking<S, G> {
    pub fn new(store: S, ids: G) -> Self {
        Self {
            store,
            ids,
            strategies: None,
            clock: Arc::new(DefaultClock),
            config: BookingConfig::default(),
        }
    }

    pub fn with_strategies(mut self, provider: impl StrategyProvider + 'static) -> Self {
        self.strategies = Some(Box::new(provider));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: BookingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create the order for `key`, or return the one already created for it.
    pub fn create_order(
        &self,
        key: &IdempotencyKey,
        input: BookInput,
    ) -> Result<Order, BookingError> {
        self.create_order_with(key, input, &CancellationSignal::new())
    }

    /// Like [`create_order`](Self::create_order), giving up with
    /// [`BookingError::Cancelled`] if `cancel` fires before identifiers are
    /// drawn for an attempt.
    pub fn create_order_with(
        &self,
        key: &IdempotencyKey,
        input: BookInput,
        cancel: &CancellationSignal,
    ) -> Result<Order, BookingError> {
        input.validate(self.clock.utc().date_naive())?;

        if let Some(order) = self.existing_order(key)? {
            info!(idempotency_key = %key, order_id = order.id, "order replayed");
            return Ok(order);
        }

        let payer = Payer {
            email: input.payer.email.trim().to_owned(),
        };
        let places = normalize(&input);
        let queries: Vec<AvailabilityQuery> = places.iter().map(Place::query).collect();
        let strategies = self.load_strategies()?;

        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(BookingError::Cancelled);
            }

            let decremented = self
                .store
                .get_availabilities(&queries)
                .map_err(BookingError::from)
                .and_then(|availabilities| decrement(&places, availabilities));
            let (rooms, priced) = match decremented {
                Ok(decremented) => decremented,
                // A same-key request may have committed since the lookup and
                // taken the last unit.
                Err(err @ BookingError::Unavailable(_)) => return self.replay_or(key, err),
                Err(err) => return Err(err),
            };

            if cancel.is_cancelled() {
                return Err(BookingError::Cancelled);
            }

            let (mut order, event) = self.build_order(&payer, priced)?;
            Self::apply_strategies(&strategies, &mut order)?;

            match self.persist(key, &order, rooms, event) {
                Ok(()) => {
                    info!(
                        idempotency_key = %key,
                        order_id = order.id,
                        price = %order.price,
                        attempt,
                        "order created"
                    );
                    return Ok(order);
                }
                Err(StoreError::VersionConflict { rooms, .. }) => {
                    if attempt >= self.config.max_commit_attempts() {
                        warn!(
                            idempotency_key = %key,
                            attempt,
                            "giving up after repeated availability conflicts"
                        );
                        return self.replay_or(key, AvailabilityError::from_keys(&rooms).into());
                    }
                    debug!(
                        idempotency_key = %key,
                        attempt,
                        conflicts = rooms.len(),
                        "retrying booking"
                    );
                    attempt += 1;
                }
                Err(StoreError::IdempotencyKeyTaken(_)) => {
                    // A concurrent request with the same key committed first.
                    let order = self.store.get_order_by_idempotency_key(key)?;
                    info!(idempotency_key = %key, order_id = order.id, "order replayed");
                    return Ok(order);
                }
                Err(err) => {
                    error!(idempotency_key = %key, reason = %err, "order persistence failed");
                    return Err(err.into());
                }
            }
        }
    }
}

/// Private API
impl<S: Inventory, G: IdGenerator> Booking<S, G> {
    fn existing_order(&self, key: &IdempotencyKey) -> Result<Option<Order>, BookingError> {
        match self.store.get_order_by_idempotency_key(key) {
            Ok(order) => Ok(Some(order)),
            Err(StoreError::RecordNotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The order already committed under `key`, or `err` if there is none.
    fn replay_or(&self, key: &IdempotencyKey, err: BookingError) -> Result<Order, BookingError> {
        match self.existing_order(key)? {
            Some(order) => {
                info!(idempotency_key = %key, order_id = order.id, "order replayed");
                Ok(order)
            }
            None => Err(err),
        }
    }

    fn load_strategies(&self) -> Result<Vec<PriceAdjustment>, BookingError> {
        match &self.strategies {
            Some(provider) => Ok(provider.strategies()?),
            None => Ok(Vec::new()),
        }
    }

    fn apply_strategies(
        strategies: &[PriceAdjustment],
        order: &mut Order,
    ) -> Result<(), BookingError> {
        for strategy in strategies {
            strategy
                .apply(order)
                .map_err(|source| BookingError::Adjustment {
                    strategy: strategy.name().to_owned(),
                    source,
                })?;
        }
        Ok(())
    }

    fn build_order(
        &self,
        payer: &Payer,
        places: Vec<Place>,
    ) -> Result<(Order, Event), BookingError> {
        let created_at = self.clock.utc();

        let mut order = Order {
            id: self.ids.next_id()?,
            payer: payer.clone(),
            places,
            created_at,
            price: Amount::ZERO,
        };
        order.reprice();

        let event = Event {
            id: self.ids.next_id()?,
            order_id: order.id,
            created_at,
        };

        Ok((order, event))
    }

    /// Stage and commit everything in one transaction. Any failure, including
    /// a panic, rolls the transaction back before it propagates.
    fn persist(
        &self,
        key: &IdempotencyKey,
        order: &Order,
        rooms: Vec<RoomAvailability>,
        event: Event,
    ) -> Result<(), StoreError> {
        let trx = self.store.begin_transaction(Some(key.clone()))?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), StoreError> {
            self.store.save_order(&trx, order.clone())?;
            self.store.save_room_availabilities(&trx, rooms)?;
            self.store.save_event(&trx, event)?;
            self.store.commit_transaction(&trx)
        }));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.rollback(&trx, key);
                Err(err)
            }
            Err(payload) => {
                error!(transaction = %trx, idempotency_key = %key, "panic while persisting order");
                self.rollback(&trx, key);
                panic::resume_unwind(payload)
            }
        }
    }

    fn rollback(&self, trx: &TransactionHandle, key: &IdempotencyKey) {
        match self.store.rollback_transaction(trx) {
            Ok(()) => debug!(transaction = %trx, idempotency_key = %key, "booking rolled back"),
            Err(err) => error!(
                transaction = %trx,
                idempotency_key = %key,
                reason = %err,
                "could not roll back booking"
            ),
        }
    }
}

/// Truncate every requested stay to whole days.
fn normalize(input: &BookInput) -> Vec<Place> {
    input
        .places
        .iter()
        .map(|place| Place {
            hotel_id: place.hotel_id.clone(),
            room_id: place.room_id.clone(),
            from: place.from.date_naive(),
            to: place.to.date_naive(),
            price: Amount::ZERO,
        })
        .collect()
}

/// Take one unit per requested room-day out of `availabilities`.
///
/// Returns each touched record once, carrying its decremented quota and the
/// version it was read at, and the places priced at the nightly rates. A day
/// requested more often than its quota allows is unavailable.
fn decrement(
    places: &[Place],
    availabilities: Vec<RoomAvailability>,
) -> Result<(Vec<RoomAvailability>, Vec<Place>), BookingError> {
    let mut records: HashMap<RoomKey, RoomAvailability> = availabilities
        .into_iter()
        .map(|room| (room.key(), room))
        .collect();

    let mut touched: Vec<RoomKey> = Vec::new();
    let mut exhausted = AvailabilityError::new();
    let mut priced = Vec::with_capacity(places.len());

    for place in places {
        let mut price = Amount::ZERO;

        for key in place.query().keys() {
            let Some(record) = records.get_mut(&key) else {
                error!(room = %key, "availability read missed a requested day");
                return Err(BookingError::DataConsistency(key));
            };

            if record.quota == 0 {
                exhausted.add(&key);
                continue;
            }

            record.quota -= 1;
            price += record.rate;
            if !touched.contains(&key) {
                touched.push(key);
            }
        }

        priced.push(Place {
            price,
            ..place.clone()
        });
    }

    if !exhausted.is_empty() {
        return Err(exhausted.into());
    }

    let rooms = touched
        .iter()
        .filter_map(|key| records.remove(key))
        .collect();

    Ok((rooms, priced))
}
