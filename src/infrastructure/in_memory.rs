use crate::domain::customer::{Customer, CustomerId};
use crate::domain::movie::{AdjustOutcome, Movie, MovieId, StockAdjustment, StockDirection};
use crate::domain::ports::{
    CatalogStore, CloseOutcome, CustomerDirectory, InsertOutcome, ReconciliationLog, RentalStore,
    Stores,
};
use crate::domain::reconciliation::ReconciliationEntry;
use crate::domain::rental::{Rental, RentalClosure, RentalId};
use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory movie catalog.
///
/// Every stock adjustment runs under the write lock, so the availability check
/// and the decrement can't interleave with another request.
#[derive(Default, Clone)]
pub struct InMemoryCatalogStore {
    movies: Arc<RwLock<HashMap<MovieId, Movie>>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn adjust(&self, adjustment: &StockAdjustment) -> StoreResult<AdjustOutcome> {
        let mut movies = self.movies.write().await;
        Ok(match movies.get_mut(&adjustment.movie) {
            Some(movie) => movie.apply(adjustment),
            None => AdjustOutcome::MovieMissing,
        })
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_movie(&self, id: &MovieId) -> StoreResult<Option<Movie>> {
        let movies = self.movies.read().await;
        Ok(movies.get(id).cloned())
    }

    async fn upsert_movie(&self, movie: Movie) -> StoreResult<()> {
        let mut movies = self.movies.write().await;
        movies.insert(movie.id.clone(), movie);
        Ok(())
    }

    async fn all_movies(&self) -> StoreResult<Vec<Movie>> {
        let movies = self.movies.read().await;
        Ok(movies.values().cloned().collect())
    }

    async fn decrement_stock_if_available(
        &self,
        adjustment: &StockAdjustment,
    ) -> StoreResult<AdjustOutcome> {
        debug_assert_eq!(adjustment.direction, StockDirection::Reserve);
        self.adjust(adjustment).await
    }

    async fn increment_stock(&self, adjustment: &StockAdjustment) -> StoreResult<AdjustOutcome> {
        debug_assert_eq!(adjustment.direction, StockDirection::Release);
        self.adjust(adjustment).await
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCustomerDirectory {
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn find_customer(&self, id: &CustomerId) -> StoreResult<Option<Customer>> {
        let customers = self.customers.read().await;
        Ok(customers.get(id).cloned())
    }

    async fn upsert_customer(&self, customer: Customer) -> StoreResult<()> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.clone(), customer);
        Ok(())
    }
}

/// A thread-safe in-memory rental ledger.
#[derive(Default, Clone)]
pub struct InMemoryRentalStore {
    rentals: Arc<RwLock<HashMap<RentalId, Rental>>>,
}

impl InMemoryRentalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same_pair(rental: &Rental, customer: &CustomerId, movie: &MovieId) -> bool {
    rental.customer.id == *customer && rental.movie.id == *movie
}

#[async_trait]
impl RentalStore for InMemoryRentalStore {
    async fn insert_rental(&self, rental: Rental) -> StoreResult<InsertOutcome> {
        let mut rentals = self.rentals.write().await;
        let duplicate = rentals
            .values()
            .any(|r| r.is_open() && same_pair(r, &rental.customer.id, &rental.movie.id));
        if duplicate {
            return Ok(InsertOutcome::DuplicateOpen);
        }
        rentals.insert(rental.id, rental);
        Ok(InsertOutcome::Inserted)
    }

    async fn get_rental(&self, id: &RentalId) -> StoreResult<Option<Rental>> {
        let rentals = self.rentals.read().await;
        Ok(rentals.get(id).cloned())
    }

    async fn find_latest_rental(
        &self,
        customer: &CustomerId,
        movie: &MovieId,
    ) -> StoreResult<Option<Rental>> {
        let rentals = self.rentals.read().await;
        Ok(rentals
            .values()
            .filter(|r| same_pair(r, customer, movie))
            .max_by_key(|r| (r.checked_out_at, r.is_open()))
            .cloned())
    }

    async fn close_rental_if_open(
        &self,
        id: &RentalId,
        closure: &RentalClosure,
    ) -> StoreResult<CloseOutcome> {
        let mut rentals = self.rentals.write().await;
        Ok(match rentals.get_mut(id) {
            Some(rental) if !rental.confirmed => CloseOutcome::Pending,
            Some(rental) => {
                if rental.apply_closure(closure) {
                    CloseOutcome::Closed(rental.clone())
                } else {
                    CloseOutcome::AlreadyClosed
                }
            }
            None => CloseOutcome::Missing,
        })
    }

    async fn confirm_rental(&self, id: &RentalId) -> StoreResult<bool> {
        let mut rentals = self.rentals.write().await;
        Ok(match rentals.get_mut(id) {
            Some(rental) => {
                rental.confirm();
                true
            }
            None => false,
        })
    }

    async fn discard_rental(&self, id: &RentalId) -> StoreResult<bool> {
        let mut rentals = self.rentals.write().await;
        if rentals.get(id).is_some_and(|r| r.confirmed) {
            return Ok(false);
        }
        Ok(rentals.remove(id).is_some())
    }

    async fn all_rentals(&self) -> StoreResult<Vec<Rental>> {
        let rentals = self.rentals.read().await;
        Ok(rentals.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryReconciliationLog {
    entries: Arc<RwLock<Vec<ReconciliationEntry>>>,
}

impl InMemoryReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReconciliationLog for InMemoryReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }

    async fn pending(&self) -> StoreResult<Vec<ReconciliationEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| e.is_pending()).cloned().collect())
    }

    async fn resolve(&self, id: Uuid, resolved_at: DateTime<Utc>) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.resolved_at = Some(resolved_at);
        }
        Ok(())
    }
}

/// A fresh, empty set of in-memory backends.
pub fn in_memory_stores() -> Stores {
    Stores {
        catalog: Arc::new(InMemoryCatalogStore::new()),
        customers: Arc::new(InMemoryCustomerDirectory::new()),
        rentals: Arc::new(InMemoryRentalStore::new()),
        reconciliation: Arc::new(InMemoryReconciliationLog::new()),
    }
}
