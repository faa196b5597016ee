#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use movie_rentals::application::engine::RentalEngine;
use movie_rentals::config::RetryPolicy;
use movie_rentals::domain::customer::{Customer, CustomerId};
use movie_rentals::domain::movie::{AdjustOutcome, DailyRate, Movie, MovieId, StockAdjustment};
use movie_rentals::domain::ports::{CatalogStore, CloseOutcome, InsertOutcome, RentalStore, Stores};
use movie_rentals::domain::rental::{Rental, RentalClosure, RentalId};
use movie_rentals::error::{StoreError, StoreResult};
use movie_rentals::infrastructure::clock::ManualClock;
use movie_rentals::infrastructure::in_memory::{
    InMemoryCatalogStore, InMemoryRentalStore, in_memory_stores,
};
use rand::Rng;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Notify;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
}

pub fn movie(id: &str, rate: Decimal, stock: u32) -> Movie {
    Movie::new(
        MovieId::new(id),
        id.to_uppercase(),
        DailyRate::new(rate).unwrap(),
        stock,
    )
    .unwrap()
}

pub fn customer(id: &str) -> Customer {
    Customer::new(CustomerId::new(id), id.to_uppercase(), "5550100", false)
}

pub async fn seed(stores: &Stores, movies: Vec<Movie>, customers: &[&str]) {
    for movie in movies {
        stores.catalog.upsert_movie(movie).await.unwrap();
    }
    for id in customers {
        stores.customers.upsert_customer(customer(id)).await.unwrap();
    }
}

pub async fn stock_of(stores: &Stores, id: &str) -> u32 {
    stores
        .catalog
        .find_movie(&MovieId::new(id))
        .await
        .unwrap()
        .unwrap()
        .available_stock
}

pub async fn open_rentals(stores: &Stores) -> usize {
    stores
        .rentals
        .all_rentals()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.is_open())
        .count()
}

pub fn engine(stores: &Stores) -> (RentalEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let engine = RentalEngine::new(stores.clone(), clock.clone(), RetryPolicy::immediate(3));
    (engine, clock)
}

/// In-memory stores seeded with one movie and the given customers.
pub async fn seeded(rate: Decimal, stock: u32, customers: &[&str]) -> Stores {
    let stores = in_memory_stores();
    seed(&stores, vec![movie("m1", rate, stock)], customers).await;
    stores
}

/// Catalog whose stock adjustments fail a configurable number of times.
///
/// With `apply_then_fail` set, a failing attempt still writes the adjustment
/// before reporting the error, as if the acknowledgement were lost.
#[derive(Default)]
pub struct FlakyCatalogStore {
    inner: InMemoryCatalogStore,
    failures_left: AtomicU32,
    apply_then_fail: AtomicBool,
    sold_out: AtomicBool,
    attempts: AtomicU32,
}

impl FlakyCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, times: u32) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    pub fn apply_then_fail(&self, enabled: bool) {
        self.apply_then_fail.store(enabled, Ordering::SeqCst);
    }

    /// Makes every reserve report `Insufficient`, as if a concurrent checkout
    /// had just taken the last unit.
    pub fn sell_out_on_reserve(&self, enabled: bool) {
        self.sold_out.store(enabled, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn adjust(
        &self,
        adjustment: &StockAdjustment,
        reserve: bool,
    ) -> StoreResult<AdjustOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if reserve && self.sold_out.load(Ordering::SeqCst) {
            return Ok(AdjustOutcome::Insufficient);
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if failing && !self.apply_then_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("catalog timeout".to_string()));
        }

        let outcome = if reserve {
            self.inner.decrement_stock_if_available(adjustment).await?
        } else {
            self.inner.increment_stock(adjustment).await?
        };

        if failing {
            return Err(StoreError::Unavailable("acknowledgement lost".to_string()));
        }
        Ok(outcome)
    }
}

#[async_trait]
impl CatalogStore for FlakyCatalogStore {
    async fn find_movie(&self, id: &MovieId) -> StoreResult<Option<Movie>> {
        self.inner.find_movie(id).await
    }

    async fn upsert_movie(&self, movie: Movie) -> StoreResult<()> {
        self.inner.upsert_movie(movie).await
    }

    async fn all_movies(&self) -> StoreResult<Vec<Movie>> {
        self.inner.all_movies().await
    }

    async fn decrement_stock_if_available(
        &self,
        adjustment: &StockAdjustment,
    ) -> StoreResult<AdjustOutcome> {
        self.adjust(adjustment, true).await
    }

    async fn increment_stock(&self, adjustment: &StockAdjustment) -> StoreResult<AdjustOutcome> {
        self.adjust(adjustment, false).await
    }
}

/// Catalog that can hold the next reserve until the test lets it through,
/// so other requests can run inside a checkout's reserve window.
#[derive(Default)]
pub struct GatedCatalogStore {
    inner: InMemoryCatalogStore,
    armed: AtomicBool,
    reached: Notify,
    proceed: Notify,
}

impl GatedCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds the next reserve until [`GatedCatalogStore::open`] is called.
    pub fn hold_next_reserve(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Resolves once the held reserve has started.
    pub async fn reserve_started(&self) {
        self.reached.notified().await;
    }

    pub fn open(&self) {
        self.proceed.notify_one();
    }
}

#[async_trait]
impl CatalogStore for GatedCatalogStore {
    async fn find_movie(&self, id: &MovieId) -> StoreResult<Option<Movie>> {
        self.inner.find_movie(id).await
    }

    async fn upsert_movie(&self, movie: Movie) -> StoreResult<()> {
        self.inner.upsert_movie(movie).await
    }

    async fn all_movies(&self) -> StoreResult<Vec<Movie>> {
        self.inner.all_movies().await
    }

    async fn decrement_stock_if_available(
        &self,
        adjustment: &StockAdjustment,
    ) -> StoreResult<AdjustOutcome> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.proceed.notified().await;
        }
        self.inner.decrement_stock_if_available(adjustment).await
    }

    async fn increment_stock(&self, adjustment: &StockAdjustment) -> StoreResult<AdjustOutcome> {
        self.inner.increment_stock(adjustment).await
    }
}

/// Rental store that can be told to fail inserts, confirmations or discards.
#[derive(Default)]
pub struct FailingRentalStore {
    inner: InMemoryRentalStore,
    pub fail_insert: AtomicBool,
    pub fail_confirm: AtomicBool,
    pub fail_discard: AtomicBool,
}

impl FailingRentalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("rental store down".to_string())
}

#[async_trait]
impl RentalStore for FailingRentalStore {
    async fn insert_rental(&self, rental: Rental) -> StoreResult<InsertOutcome> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.insert_rental(rental).await
    }

    async fn get_rental(&self, id: &RentalId) -> StoreResult<Option<Rental>> {
        self.inner.get_rental(id).await
    }

    async fn find_latest_rental(
        &self,
        customer: &CustomerId,
        movie: &MovieId,
    ) -> StoreResult<Option<Rental>> {
        self.inner.find_latest_rental(customer, movie).await
    }

    async fn confirm_rental(&self, id: &RentalId) -> StoreResult<bool> {
        if self.fail_confirm.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.confirm_rental(id).await
    }

    async fn close_rental_if_open(
        &self,
        id: &RentalId,
        closure: &RentalClosure,
    ) -> StoreResult<CloseOutcome> {
        self.inner.close_rental_if_open(id, closure).await
    }

    async fn discard_rental(&self, id: &RentalId) -> StoreResult<bool> {
        if self.fail_discard.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.discard_rental(id).await
    }

    async fn all_rentals(&self) -> StoreResult<Vec<Rental>> {
        self.inner.all_rentals().await
    }
}

/// Writes a random stream of checkouts and returns over `customers` x `movies`.
pub fn generate_events(
    path: &Path,
    rows: usize,
    customers: &[&str],
    movies: &[&str],
) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    let mut rng = rand::thread_rng();

    wtr.write_record(["op", "customer", "movie", "at"])?;

    for i in 0..rows {
        let op = if rng.gen_bool(0.6) { "checkout" } else { "return" };
        let customer = customers.choose(&mut rng).copied().unwrap_or("c1");
        let movie = movies.choose(&mut rng).copied().unwrap_or("m1");
        let at = (start() + chrono::Duration::hours(i as i64)).to_rfc3339();
        wtr.write_record([op, customer, movie, at.as_str()])?;
    }

    wtr.flush()?;
    Ok(())
}
