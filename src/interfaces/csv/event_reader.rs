use crate::domain::customer::CustomerId;
use crate::domain::movie::MovieId;
use crate::error::{RentalError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Checkout,
    Return,
}

/// One row of the events file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RentalEvent {
    pub op: EventKind,
    pub customer: CustomerId,
    pub movie: MovieId,
    /// When the event happened. Empty means "now".
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// Reads rental events from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<RentalEvent>`.
/// It handles whitespace trimming and flexible record lengths automatically, so
/// the trailing `at` column may be left out entirely.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    /// Creates a new `EventReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes events.
    pub fn events(self) -> impl Iterator<Item = Result<RentalEvent>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(RentalError::from))
    }
}
