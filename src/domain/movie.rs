use crate::domain::rental::{Rental, RentalId};
use crate::error::RentalError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Upper bound on both the stock count and the daily rate a movie record accepts.
pub const MAX_STOCK: u32 = 255;
pub const MAX_DAILY_RATE: Decimal = Decimal::from_parts(255, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(String);

impl MovieId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MovieId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Price charged per elapsed rental day.
///
/// Always within `0..=MAX_DAILY_RATE`, so fees computed from it are never negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct DailyRate(Decimal);

impl DailyRate {
    pub fn new(value: Decimal) -> Result<Self, RentalError> {
        if value < Decimal::ZERO {
            Err(RentalError::ValidationError(
                "Daily rental rate must not be negative".to_string(),
            ))
        } else if value > MAX_DAILY_RATE {
            Err(RentalError::ValidationError(format!(
                "Daily rental rate must not exceed {}",
                MAX_DAILY_RATE
            )))
        } else {
            Ok(Self(value))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for DailyRate {
    type Error = RentalError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DailyRate> for Decimal {
    fn from(rate: DailyRate) -> Self {
        rate.0
    }
}

/// Which way a stock adjustment moves the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    /// Checkout: take one unit out of available stock.
    Reserve,
    /// Return: put one unit back.
    Release,
}

impl fmt::Display for StockDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockDirection::Reserve => f.write_str("reserve"),
            StockDirection::Release => f.write_str("release"),
        }
    }
}

/// One logical change to a movie's stock, tied to the rental that caused it.
///
/// The movie tracks which rentals currently hold a unit, so replaying the
/// same adjustment leaves the counter untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub movie: MovieId,
    pub rental: RentalId,
    pub direction: StockDirection,
}

impl StockAdjustment {
    pub fn reserve(rental: &Rental) -> Self {
        Self {
            movie: rental.movie.id.clone(),
            rental: rental.id,
            direction: StockDirection::Reserve,
        }
    }

    pub fn release(rental: &Rental) -> Self {
        Self {
            movie: rental.movie.id.clone(),
            rental: rental.id,
            direction: StockDirection::Release,
        }
    }
}

/// Result of applying a [`StockAdjustment`] to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustOutcome {
    Applied,
    /// Nothing to do: the rental already holds its unit (reserve), or holds
    /// none (release).
    AlreadyApplied,
    /// A reserve found no available stock.
    Insufficient,
    MovieMissing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub daily_rental_rate: DailyRate,
    pub available_stock: u32,
    /// Rentals currently holding one unit each. Entries leave on release, so
    /// the set never outgrows the movie's inventory.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub reserved_by: BTreeSet<RentalId>,
}

impl Movie {
    pub fn new(
        id: MovieId,
        title: impl Into<String>,
        daily_rental_rate: DailyRate,
        available_stock: u32,
    ) -> Result<Self, RentalError> {
        let movie = Self {
            id,
            title: title.into(),
            daily_rental_rate,
            available_stock,
            reserved_by: BTreeSet::new(),
        };
        movie.validate()?;
        Ok(movie)
    }

    /// Checks the fields a deserialized record cannot enforce on its own.
    pub fn validate(&self) -> Result<(), RentalError> {
        if self.title.trim().is_empty() {
            return Err(RentalError::ValidationError(
                "Movie title must not be empty".to_string(),
            ));
        }
        if self.available_stock > MAX_STOCK {
            return Err(RentalError::ValidationError(format!(
                "Stock for movie {} exceeds {}",
                self.id, MAX_STOCK
            )));
        }
        Ok(())
    }

    pub fn in_stock(&self) -> bool {
        self.available_stock > 0
    }

    /// Applies an adjustment to this document. Stores call this while holding
    /// exclusive access to the record, which makes the guard and the write a
    /// single atomic step.
    pub fn apply(&mut self, adjustment: &StockAdjustment) -> AdjustOutcome {
        match adjustment.direction {
            StockDirection::Reserve => {
                if self.reserved_by.contains(&adjustment.rental) {
                    return AdjustOutcome::AlreadyApplied;
                }
                if !self.in_stock() {
                    return AdjustOutcome::Insufficient;
                }
                self.available_stock -= 1;
                self.reserved_by.insert(adjustment.rental);
            }
            StockDirection::Release => {
                // Only a unit this rental actually took can come back
                if !self.reserved_by.remove(&adjustment.rental) {
                    return AdjustOutcome::AlreadyApplied;
                }
                self.available_stock = self.available_stock.saturating_add(1);
            }
        }
        AdjustOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn movie(stock: u32) -> Movie {
        Movie::new(
            MovieId::new("m1"),
            "Heat",
            DailyRate::new(dec!(2)).unwrap(),
            stock,
        )
        .unwrap()
    }

    fn adjustment(direction: StockDirection) -> StockAdjustment {
        StockAdjustment {
            movie: MovieId::new("m1"),
            rental: RentalId::new(),
            direction,
        }
    }

    #[test]
    fn test_daily_rate_validation() {
        assert!(DailyRate::new(dec!(0)).is_ok());
        assert!(DailyRate::new(dec!(255)).is_ok());
        assert!(matches!(
            DailyRate::new(dec!(-0.5)),
            Err(RentalError::ValidationError(_))
        ));
        assert!(matches!(
            DailyRate::new(dec!(255.01)),
            Err(RentalError::ValidationError(_))
        ));
    }

    #[test]
    fn test_movie_rejects_stock_above_limit() {
        let result = Movie::new(
            MovieId::new("m1"),
            "Heat",
            DailyRate::new(dec!(1)).unwrap(),
            MAX_STOCK + 1,
        );
        assert!(matches!(result, Err(RentalError::ValidationError(_))));
    }

    #[test]
    fn test_reserve_decrements_once() {
        let mut movie = movie(2);
        let reserve = adjustment(StockDirection::Reserve);

        assert_eq!(movie.apply(&reserve), AdjustOutcome::Applied);
        assert_eq!(movie.available_stock, 1);

        // Replaying the same key is a no-op
        assert_eq!(movie.apply(&reserve), AdjustOutcome::AlreadyApplied);
        assert_eq!(movie.available_stock, 1);
    }

    #[test]
    fn test_reserve_without_stock_is_rejected() {
        let mut movie = movie(0);
        let reserve = adjustment(StockDirection::Reserve);

        assert_eq!(movie.apply(&reserve), AdjustOutcome::Insufficient);
        assert_eq!(movie.available_stock, 0);
        assert!(movie.reserved_by.is_empty());
    }

    #[test]
    fn test_release_returns_reserved_unit_once() {
        let mut movie = movie(1);
        let reserve = adjustment(StockDirection::Reserve);
        let release = StockAdjustment {
            direction: StockDirection::Release,
            ..reserve.clone()
        };

        assert_eq!(movie.apply(&reserve), AdjustOutcome::Applied);
        assert_eq!(movie.apply(&release), AdjustOutcome::Applied);
        assert_eq!(movie.apply(&release), AdjustOutcome::AlreadyApplied);
        assert_eq!(movie.available_stock, 1);
        assert!(movie.reserved_by.is_empty());
    }

    #[test]
    fn test_release_without_reserve_is_ignored() {
        let mut movie = movie(0);
        let release = adjustment(StockDirection::Release);

        assert_eq!(movie.apply(&release), AdjustOutcome::AlreadyApplied);
        assert_eq!(movie.available_stock, 0);
    }

    #[test]
    fn test_reservations_stay_bounded_over_many_rentals() {
        let mut movie = movie(1);
        for _ in 0..500 {
            let reserve = adjustment(StockDirection::Reserve);
            let release = StockAdjustment {
                direction: StockDirection::Release,
                ..reserve.clone()
            };
            assert_eq!(movie.apply(&reserve), AdjustOutcome::Applied);
            assert_eq!(movie.reserved_by.len(), 1);
            assert_eq!(movie.apply(&release), AdjustOutcome::Applied);
        }

        assert!(movie.reserved_by.is_empty());
        assert_eq!(movie.available_stock, 1);
        let json = serde_json::to_string(&movie).unwrap();
        assert!(!json.contains("reserved_by"));
    }

    #[test]
    fn test_movie_deserializes_without_adjustments() {
        let json = r#"{"id":"m1","title":"Heat","daily_rental_rate":2,"available_stock":3}"#;
        let movie: Movie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.available_stock, 3);
        assert_eq!(movie.daily_rental_rate.value(), dec!(2));
        assert!(movie.reserved_by.is_empty());
    }

    #[test]
    fn test_movie_rejects_negative_rate_on_deserialize() {
        let json = r#"{"id":"m1","title":"Heat","daily_rental_rate":-1,"available_stock":3}"#;
        assert!(serde_json::from_str::<Movie>(json).is_err());
    }
}
