use std::env;
use std::process::ExitCode;

use room_booking::api::{self, CreateOrderRequest, read_requests};
use room_booking::config::Args;
use room_booking::csv::read_availabilities;
use room_booking::{
    Booking, BookingConfig, CancellationSignal, InventoryStore, SequentialIdGenerator, seed,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::parse(env::args()) {
        Ok(args) => args,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let config = match BookingConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let rooms = match read_availabilities(&args.inventory) {
        Ok(rows) => rows
            .filter_map(|result| match result {
                Ok(room) => Some(room),
                Err(e) => {
                    warn!("{e}");
                    None
                }
            })
            .collect(),
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let store = InventoryStore::new();
    if let Err(e) = seed::apply(&store, rooms) {
        error!(reason = %e, "could not seed inventory");
        return ExitCode::FAILURE;
    }

    let booking = Booking::new(store, SequentialIdGenerator::new()).with_config(config);
    let cancel = CancellationSignal::new();

    let requests = match read_requests(args.requests.clone()) {
        Ok(requests) => requests,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (request_sender, request_receiver) = tokio::sync::mpsc::channel::<CreateOrderRequest>(16);

    tokio::spawn(async move {
        for result in requests {
            match result {
                Ok(request) => {
                    if request_sender.send(request).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling in-flight bookings");
            interrupt.cancel();
        }
    });

    print(&api::liveness());
    info!("ready");

    let answered = api::serve(
        &booking,
        ReceiverStream::new(request_receiver),
        &cancel,
        |response| print(&response),
    )
    .await;
    info!(answered, "requests processed");

    if cancel.is_cancelled() {
        return ExitCode::from(130);
    }
    ExitCode::SUCCESS
}

fn print(response: &api::Response) {
    match serde_json::to_string(response) {
        Ok(line) => println!("{line}"),
        Err(e) => error!(reason = %e, "could not serialize response"),
    }
}
