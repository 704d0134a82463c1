use std::thread;

use chrono::{Days, NaiveDate, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use room_booking::{
    Amount, BookInput, Booking, IdempotencyKey, InventoryStore, Payer, PlaceRequest,
    RoomAvailability, SequentialIdGenerator, seed,
};

const FIRST_DAY: (i32, u32, u32) = (2099, 1, 1);

fn first_day() -> NaiveDate {
    let (y, m, d) = FIRST_DAY;
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Inventory for `rooms` rooms of one hotel over `days` days, each with
/// `quota` units at 100.0 a night.
fn inventory(rooms: u32, days: u64, quota: u32) -> InventoryStore {
    let store = InventoryStore::new();
    let records = (0..rooms)
        .flat_map(|room| {
            (0..days).map(move |offset| {
                let date = first_day() + Days::new(offset);
                RoomAvailability::new("bench", format!("room-{room}"), date, quota)
                    .with_rate(Amount::from_scaled(1_000_000))
            })
        })
        .collect();
    seed::apply(&store, records).unwrap();
    store
}

/// A stay of `nights` days in `room`, starting on the first inventory day.
fn stay(room: u32, nights: u32) -> BookInput {
    let (y, m, d) = FIRST_DAY;
    let from = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
    BookInput {
        payer: Payer {
            email: "bench@example.com".into(),
        },
        places: vec![PlaceRequest {
            hotel_id: "bench".into(),
            room_id: format!("room-{room}"),
            from,
            to: from + chrono::Duration::days(i64::from(nights) - 1),
        }],
    }
}

fn key(n: usize) -> IdempotencyKey {
    IdempotencyKey::new(format!("bench-{n}")).unwrap()
}

fn bench_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential");

    for nights in [1u32, 7, 30] {
        group.bench_with_input(BenchmarkId::from_parameter(nights), &nights, |b, &nights| {
            b.iter(|| {
                let booking = Booking::new(inventory(1, 30, 1_000), SequentialIdGenerator::new());
                for n in 0..1_000 {
                    let _ = black_box(booking.create_order(&key(n), stay(0, nights)));
                }
                booking
            });
        });
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let booking = Booking::new(inventory(1, 7, 1), SequentialIdGenerator::new());
    booking.create_order(&key(0), stay(0, 7)).unwrap();

    c.bench_function("replay", |b| {
        b.iter(|| black_box(booking.create_order(&key(0), stay(0, 7))));
    });
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");

    // Threads either share one room or each book their own.
    for (label, rooms) in [("one_room", 1u32), ("room_per_thread", 8)] {
        group.bench_with_input(BenchmarkId::from_parameter(label), &rooms, |b, &rooms| {
            b.iter(|| {
                let booking = Booking::new(inventory(rooms, 7, 200), SequentialIdGenerator::new());
                thread::scope(|scope| {
                    for worker in 0..8usize {
                        let booking = &booking;
                        scope.spawn(move || {
                            let room = worker as u32 % rooms;
                            for n in 0..100 {
                                let _ = black_box(
                                    booking.create_order(&key(worker * 100 + n), stay(room, 7)),
                                );
                            }
                        });
                    }
                });
                booking
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sequential, bench_replay, bench_contended);
criterion_main!(benches);
