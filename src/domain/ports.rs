use super::customer::{Customer, CustomerId};
use super::movie::{AdjustOutcome, Movie, MovieId, StockAdjustment};
use super::reconciliation::ReconciliationEntry;
use super::rental::{Rental, RentalClosure, RentalId};
use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Movie records and their stock counters.
///
/// Stock only moves through the two adjustment methods, each of which must
/// check and write a single movie atomically.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_movie(&self, id: &MovieId) -> StoreResult<Option<Movie>>;
    async fn upsert_movie(&self, movie: Movie) -> StoreResult<()>;
    async fn all_movies(&self) -> StoreResult<Vec<Movie>>;
    /// Takes one unit if `available_stock > 0`, otherwise reports `Insufficient`.
    async fn decrement_stock_if_available(
        &self,
        adjustment: &StockAdjustment,
    ) -> StoreResult<AdjustOutcome>;
    async fn increment_stock(&self, adjustment: &StockAdjustment) -> StoreResult<AdjustOutcome>;
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customer(&self, id: &CustomerId) -> StoreResult<Option<Customer>>;
    async fn upsert_customer(&self, customer: Customer) -> StoreResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The customer already holds an open rental of this movie.
    DuplicateOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Closed(Rental),
    AlreadyClosed,
    /// The rental exists but its stock reserve has not been confirmed yet.
    Pending,
    Missing,
}

#[async_trait]
pub trait RentalStore: Send + Sync {
    /// Inserts a new open rental, refusing a second open rental for the same
    /// (customer, movie) pair.
    async fn insert_rental(&self, rental: Rental) -> StoreResult<InsertOutcome>;
    async fn get_rental(&self, id: &RentalId) -> StoreResult<Option<Rental>>;
    /// Most recent rental for the pair, open or closed. On a checkout-time tie
    /// the open one wins.
    async fn find_latest_rental(
        &self,
        customer: &CustomerId,
        movie: &MovieId,
    ) -> StoreResult<Option<Rental>>;
    /// Marks the rental's stock reserve as done. `false` if the rental is gone.
    async fn confirm_rental(&self, id: &RentalId) -> StoreResult<bool>;
    /// Sets return time and fee only if the rental is still open and confirmed.
    async fn close_rental_if_open(
        &self,
        id: &RentalId,
        closure: &RentalClosure,
    ) -> StoreResult<CloseOutcome>;
    /// Removes a rental that was never confirmed. Used only to compensate a
    /// checkout whose reserve failed; confirmed rentals are left alone.
    async fn discard_rental(&self, id: &RentalId) -> StoreResult<bool>;
    async fn all_rentals(&self) -> StoreResult<Vec<Rental>>;
}

#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    async fn record(&self, entry: ReconciliationEntry) -> StoreResult<()>;
    async fn pending(&self) -> StoreResult<Vec<ReconciliationEntry>>;
    async fn resolve(&self, id: Uuid, resolved_at: DateTime<Utc>) -> StoreResult<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type CatalogStoreRef = Arc<dyn CatalogStore>;
pub type CustomerDirectoryRef = Arc<dyn CustomerDirectory>;
pub type RentalStoreRef = Arc<dyn RentalStore>;
pub type ReconciliationLogRef = Arc<dyn ReconciliationLog>;
pub type ClockRef = Arc<dyn Clock>;

/// The full set of backends the engine runs against.
#[derive(Clone)]
pub struct Stores {
    pub catalog: CatalogStoreRef,
    pub customers: CustomerDirectoryRef,
    pub rentals: RentalStoreRef,
    pub reconciliation: ReconciliationLogRef,
}
