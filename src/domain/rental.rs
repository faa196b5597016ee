use crate::domain::customer::{Customer, CustomerSnapshot};
use crate::domain::fee;
use crate::domain::movie::{DailyRate, Movie, MovieId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RentalId(Uuid);

impl RentalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RentalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RentalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RentalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The part of a movie a rental keeps: enough to bill it, never its stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSnapshot {
    pub id: MovieId,
    pub title: String,
    pub daily_rental_rate: DailyRate,
}

impl From<&Movie> for MovieSnapshot {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id.clone(),
            title: movie.title.clone(),
            daily_rental_rate: movie.daily_rental_rate,
        }
    }
}

/// Return timestamp and fee, computed together so they are always written together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RentalClosure {
    pub returned_at: DateTime<Utc>,
    pub fee: Decimal,
}

/// A rental record.
///
/// Open while `returned_at` is `None`. `returned_at` and `rental_fee` are only
/// ever set together, once, by [`Rental::apply_closure`].
///
/// A rental starts unconfirmed and only becomes returnable once the stock
/// reserve for it has landed and [`Rental::confirm`] has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    pub id: RentalId,
    pub customer: CustomerSnapshot,
    pub movie: MovieSnapshot,
    pub checked_out_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub rental_fee: Option<Decimal>,
    #[serde(default)]
    pub confirmed: bool,
}

impl Rental {
    /// Opens a new rental, snapshotting both parties by value.
    pub fn open(customer: &Customer, movie: &Movie, checked_out_at: DateTime<Utc>) -> Self {
        Self {
            id: RentalId::new(),
            customer: CustomerSnapshot::from(customer),
            movie: MovieSnapshot::from(movie),
            checked_out_at,
            returned_at: None,
            rental_fee: None,
            confirmed: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Computes the closure for a return at `returned_at`, billed at the rate
    /// captured at checkout.
    pub fn closure_at(&self, returned_at: DateTime<Utc>) -> RentalClosure {
        RentalClosure {
            returned_at,
            fee: fee::rental_fee(
                self.checked_out_at,
                returned_at,
                self.movie.daily_rental_rate,
            ),
        }
    }

    /// Marks the stock reserve as done. Returns `false` if it already was.
    pub fn confirm(&mut self) -> bool {
        !std::mem::replace(&mut self.confirmed, true)
    }

    /// Closes the rental. Returns `false` and leaves the record untouched if it
    /// was already closed.
    pub fn apply_closure(&mut self, closure: &RentalClosure) -> bool {
        if !self.is_open() {
            return false;
        }
        self.returned_at = Some(closure.returned_at);
        self.rental_fee = Some(closure.fee);
        true
    }
}
