//! Initial inventory loading.

use tracing::{error, info};

use crate::model::{IdempotencyKey, RoomAvailability};
use crate::store::{Inventory, StoreError};

/// Idempotency key the seeding transaction commits under.
pub const SEED_KEY: &str = "seed";

/// Write `rooms` into the store in a single transaction.
///
/// Either every room is committed or, on failure, none is.
pub fn apply(store: &impl Inventory, rooms: Vec<RoomAvailability>) -> Result<usize, StoreError> {
    let count = rooms.len();
    let trx = store.begin_transaction(Some(IdempotencyKey::from_static(SEED_KEY)))?;

    let result = store
        .save_room_availabilities(&trx, rooms)
        .and_then(|()| store.commit_transaction(&trx));

    if let Err(err) = result {
        if let Err(rollback) = store.rollback_transaction(&trx) {
            error!(transaction = %trx, reason = %rollback, "could not roll back seed transaction");
        }
        return Err(err);
    }

    info!(rooms = count, "inventory seeded");
    Ok(count)
}
