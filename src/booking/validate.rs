use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use crate::model::BookInput;

/// Every problem found in a booking request, keyed by field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
#[error(
    "{}",
    .fields
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
)]
pub struct InputValidationError {
    fields: BTreeMap<String, Vec<String>>,
}

impl InputValidationError {
    fn add(&mut self, field: impl Into<String>, message: &str) {
        let messages = self.fields.entry(field.into()).or_default();
        if !messages.iter().any(|existing| existing == message) {
            messages.push(message.to_owned());
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    /// Total number of messages across all fields.
    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        let pattern = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*$";
        Regex::new(pattern)
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

impl BookInput {
    /// Check the request against `today`. Dates are compared at day
    /// granularity, so a stay starting today is accepted.
    pub fn validate(&self, today: NaiveDate) -> Result<(), InputValidationError> {
        let mut error = InputValidationError::default();

        if !email_regex().is_match(self.payer.email.trim()) {
            error.add("payer.email", "provide a valid email");
        }

        if self.places.is_empty() {
            error.add("places", "provide at least one place");
        }

        for (idx, place) in self.places.iter().enumerate() {
            let field = |name: &str| format!("places[{idx}].{name}");
            let from = place.from.date_naive();
            let to = place.to.date_naive();

            if place.hotel_id.trim().is_empty() {
                error.add(field("hotel_id"), "provide a hotel id");
            }
            if place.room_id.trim().is_empty() {
                error.add(field("room_id"), "provide a room id");
            }
            if from < today {
                error.add(field("from"), "must not be in the past");
            }
            if to < today {
                error.add(field("to"), "must not be in the past");
            }
            if from > to {
                error.add(field("from"), "must not be after places.to");
            }
        }

        if error.is_empty() {
            Ok(())
        } else {
            Err(error)
        }
    }
}
