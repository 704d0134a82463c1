use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::{Amount, RoomAvailability};

/// Errors that can occur when reading inventory csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot open inventory file: {0}")]
    Open(#[source] csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: quota {quota} is out of range")]
    QuotaOutOfRange { line: usize, quota: i64 },
}

#[derive(Debug, Deserialize)]
struct InventoryRow {
    hotel_id: String,
    room_id: String,
    date: NaiveDate,
    quota: i64,
    rate: Option<Amount>,
}

impl InventoryRow {
    fn into_availability(self, line: usize) -> Result<RoomAvailability, CsvError> {
        if self.hotel_id.is_empty() {
            return Err(CsvError::MissingField {
                line,
                field: "hotel_id",
            });
        }
        if self.room_id.is_empty() {
            return Err(CsvError::MissingField {
                line,
                field: "room_id",
            });
        }
        let quota = u32::try_from(self.quota).map_err(|_| CsvError::QuotaOutOfRange {
            line,
            quota: self.quota,
        })?;

        Ok(
            RoomAvailability::new(self.hotel_id, self.room_id, self.date, quota)
                .with_rate(self.rate.unwrap_or_default()),
        )
    }
}

/// Read room availabilities from a csv file with the header
/// `hotel_id,room_id,date,quota,rate` (`rate` may be left empty)
pub fn read_availabilities(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<RoomAvailability, CsvError>>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(CsvError::Open)?;

    Ok(reader_rows(reader))
}

fn reader_rows(
    reader: csv::Reader<File>,
) -> impl Iterator<Item = Result<RoomAvailability, CsvError>> {
    reader
        .into_deserialize::<InventoryRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row.into_availability(line)
        })
}
