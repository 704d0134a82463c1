pub mod amount;
pub mod api;
pub mod booking;
pub mod boost;
pub mod config;
pub mod csv;
pub mod idgen;
pub mod model;
pub mod seed;
pub mod store;

pub use amount::Amount;
pub use booking::{Booking, BookingError, CancellationSignal};
pub use config::BookingConfig;
pub use idgen::{IdGenerator, SequentialIdGenerator};
pub use model::{
    BookInput, Event, IdempotencyKey, Order, Payer, Place, PlaceRequest, RoomAvailability, RoomKey,
};
pub use store::{Inventory, InventoryStore};
