//! Inbound boundary: booking requests in, client-facing responses out.
//!
//! Requests arrive as JSON lines, one create-order call per line, carrying
//! the idempotency key next to the booking body. Every workflow outcome maps
//! to exactly one [`Response`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, warn};

use crate::booking::{Booking, BookingError, CancellationSignal};
use crate::idgen::IdGenerator;
use crate::model::{BookInput, IdempotencyKey, Order};
use crate::store::Inventory;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("cannot open requests file: {0}")]
    Open(#[source] io::Error),

    #[error("line {line}: cannot read request: {source}")]
    Read { line: usize, source: io::Error },

    #[error("line {line}: malformed request: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

/// One create-order call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(flatten)]
    pub body: BookInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "body", rename_all = "snake_case")]
pub enum Response {
    Created(Order),
    /// Field name to messages.
    Invalid(BTreeMap<String, Vec<String>>),
    Unavailable(Vec<String>),
    BadRequest(String),
    Internal,
    Ready,
}

/// Read create-order requests, one JSON object per line. Blank lines are
/// skipped.
pub fn read_requests(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<CreateOrderRequest, RequestError>>, RequestError> {
    let file = File::open(path).map_err(RequestError::Open)?;

    Ok(BufReader::new(file)
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line_no = idx + 1;
            match line {
                Ok(text) if text.trim().is_empty() => None,
                Ok(text) => Some(serde_json::from_str(&text).map_err(|source| {
                    RequestError::Parse {
                        line: line_no,
                        source,
                    }
                })),
                Err(source) => Some(Err(RequestError::Read {
                    line: line_no,
                    source,
                })),
            }
        }))
}

/// Run one request through the workflow. Never panics: a panic inside the
/// workflow becomes [`Response::Internal`].
pub fn create_order<S: Inventory, G: IdGenerator>(
    booking: &Booking<S, G>,
    request: CreateOrderRequest,
    cancel: &CancellationSignal,
) -> Response {
    let key = match IdempotencyKey::new(request.idempotency_key) {
        Ok(key) => key,
        Err(err) => return Response::BadRequest(err.to_string()),
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        booking.create_order_with(&key, request.body, cancel)
    }));

    match outcome {
        Ok(Ok(order)) => Response::Created(order),
        Ok(Err(BookingError::InputValidation(err))) => Response::Invalid(err.fields().clone()),
        Ok(Err(BookingError::Unavailable(err))) => Response::Unavailable(err.messages()),
        Ok(Err(err)) => {
            error!(idempotency_key = %key, reason = %err, "could not create order");
            Response::Internal
        }
        Err(_) => {
            error!(idempotency_key = %key, "panic while creating order");
            Response::Internal
        }
    }
}

/// Answer `requests` in arrival order, handing each response to `respond`.
///
/// Stops taking requests once `cancel` fires; requests still queued get no
/// response. Returns how many requests were answered.
pub async fn serve<S: Inventory, G: IdGenerator>(
    booking: &Booking<S, G>,
    mut requests: impl Stream<Item = CreateOrderRequest> + Unpin,
    cancel: &CancellationSignal,
    mut respond: impl FnMut(Response),
) -> usize {
    let mut answered = 0;
    while let Some(request) = requests.next().await {
        if cancel.is_cancelled() {
            warn!(answered, "cancelled, remaining requests dropped");
            break;
        }
        respond(create_order(booking, request, cancel));
        answered += 1;
    }
    answered
}

/// Liveness probe.
pub fn liveness() -> Response {
    Response::Ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idgen::{IdGenerationError, SequentialIdGenerator};
    use crate::model::RoomAvailability;
    use crate::store::InventoryStore;
    use crate::seed;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DAY: &str = "2099-03-01";

    fn store() -> InventoryStore {
        let store = InventoryStore::new();
        let date = NaiveDate::parse_from_str(DAY, "%Y-%m-%d").unwrap();
        seed::apply(&store, vec![RoomAvailability::new("reddison", "lux", date, 1)]).unwrap();
        store
    }

    fn parse(line: &str) -> CreateOrderRequest {
        serde_json::from_str(line).unwrap()
    }

    fn request(key: &str, email: &str) -> CreateOrderRequest {
        parse(&format!(
            r#"{{"idempotency_key":"{key}","payer":{{"email":"{email}"}},"places":[{{"hotel_id":"reddison","room_id":"lux","from":"{DAY}T12:00:00Z","to":"{DAY}T12:00:00Z"}}]}}"#
        ))
    }

    #[test]
    fn parses_request_line() {
        let request = request("k1", "guest@example.com");
        assert_eq!(request.idempotency_key, "k1");
        assert_eq!(request.body.payer.email, "guest@example.com");
        assert_eq!(request.body.places.len(), 1);
        assert_eq!(request.body.places[0].hotel_id, "reddison");
    }

    #[test]
    fn created_then_unavailable() {
        let booking = Booking::new(store(), SequentialIdGenerator::new());
        let cancel = CancellationSignal::new();

        let created = create_order(&booking, request("k1", "guest@example.com"), &cancel);
        assert!(matches!(created, Response::Created(ref order) if order.id == 1));

        let unavailable = create_order(&booking, request("k2", "guest@example.com"), &cancel);
        assert_eq!(
            unavailable,
            Response::Unavailable(vec![format!(
                "room 'lux' is unavailable in hotel 'reddison' on dates [{DAY}]"
            )])
        );
    }

    #[test]
    fn invalid_body_lists_fields() {
        let booking = Booking::new(store(), SequentialIdGenerator::new());
        let response = create_order(&booking, request("k1", "nope"), &CancellationSignal::new());

        let Response::Invalid(fields) = response else {
            panic!("expected invalid response");
        };
        assert_eq!(fields["payer.email"], vec!["provide a valid email"]);
    }

    #[test]
    fn missing_key_is_bad_request() {
        let booking = Booking::new(store(), SequentialIdGenerator::new());
        let mut request = request("k1", "guest@example.com");
        request.idempotency_key.clear();

        let response = create_order(&booking, request, &CancellationSignal::new());

        assert_eq!(
            response,
            Response::BadRequest("idempotency key must not be empty".into())
        );
        assert_eq!(booking.store().order_count(), 0);
    }

    #[test]
    fn cancellation_is_internal() {
        let booking = Booking::new(store(), SequentialIdGenerator::new());
        let cancel = CancellationSignal::new();
        cancel.cancel();

        let response = create_order(&booking, request("k1", "guest@example.com"), &cancel);
        assert_eq!(response, Response::Internal);
    }

    struct PanickingIds;

    impl IdGenerator for PanickingIds {
        fn next_id(&self) -> Result<u64, IdGenerationError> {
            panic!("id service crashed")
        }
    }

    #[test]
    fn panic_becomes_internal_error() {
        let booking = Booking::new(store(), PanickingIds);
        let response = create_order(
            &booking,
            request("k1", "guest@example.com"),
            &CancellationSignal::new(),
        );
        assert_eq!(response, Response::Internal);
    }

    #[tokio::test]
    async fn serve_answers_in_order() {
        let booking = Booking::new(store(), SequentialIdGenerator::new());
        let requests = tokio_stream::iter(vec![
            request("k1", "guest@example.com"),
            request("k1", "guest@example.com"),
            request("k2", "nope"),
        ]);
        let mut responses = Vec::new();

        let answered = serve(&booking, requests, &CancellationSignal::new(), |response| {
            responses.push(response)
        })
        .await;

        assert_eq!(answered, 3);
        assert!(matches!(responses[0], Response::Created(_)));
        assert_eq!(responses[1], responses[0]);
        assert!(matches!(responses[2], Response::Invalid(_)));
    }

    #[tokio::test]
    async fn serve_stops_once_cancelled() {
        let booking = Booking::new(store(), SequentialIdGenerator::new());
        let cancel = CancellationSignal::new();
        let requests = tokio_stream::iter(vec![
            request("k1", "guest@example.com"),
            request("k2", "guest@example.com"),
            request("k3", "guest@example.com"),
        ]);
        let mut responses = Vec::new();

        let answered = serve(&booking, requests, &cancel, |response| {
            responses.push(response);
            cancel.cancel();
        })
        .await;

        assert_eq!(answered, 1);
        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0], Response::Created(_)));
        assert_eq!(booking.store().order_count(), 1);
    }

    #[test]
    fn responses_serialize_with_status_tag() {
        let json = serde_json::to_string(&Response::Unavailable(vec!["x".into()])).unwrap();
        assert_eq!(json, r#"{"status":"unavailable","body":["x"]}"#);
        assert_eq!(
            serde_json::to_string(&liveness()).unwrap(),
            r#"{"status":"ready"}"#
        );
    }

    #[test]
    fn reads_requests_skipping_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"idempotency_key":"k1","payer":{{"email":"a@b"}},"places":[]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();

        let results: Vec<_> = read_requests(file.path()).unwrap().collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(RequestError::Parse { line: 3, .. })));
    }

    #[test]
    fn missing_requests_file_fails_to_open() {
        assert!(matches!(
            read_requests("does/not/exist.jsonl"),
            Err(RequestError::Open(_))
        ));
    }
}
