use crate::domain::customer::{Customer, CustomerId};
use crate::domain::movie::{AdjustOutcome, Movie, MovieId, StockAdjustment};
use crate::domain::ports::{
    CatalogStore, CloseOutcome, CustomerDirectory, InsertOutcome, ReconciliationLog, RentalStore,
    Stores,
};
use crate::domain::reconciliation::ReconciliationEntry;
use crate::domain::rental::{Rental, RentalClosure, RentalId};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for movie documents, keyed by movie id.
pub const CF_MOVIES: &str = "movies";
/// Column Family for customer documents, keyed by customer id.
pub const CF_CUSTOMERS: &str = "customers";
/// Column Family for rental documents, keyed by rental id.
pub const CF_RENTALS: &str = "rentals";
/// Column Family mapping `customer \0 movie` to the id of its open rental.
pub const CF_OPEN_RENTALS: &str = "open_rentals";
/// Column Family mapping `customer \0 movie` to its most recently confirmed rental.
pub const CF_LATEST_RENTALS: &str = "latest_rentals";
/// Column Family for reconciliation entries, keyed by entry id.
pub const CF_RECONCILIATION: &str = "reconciliation";

/// A persistent store implementation using RocksDB.
///
/// Each entity lives in its own Column Family. RocksDB has no conditional
/// write, so every check-then-write (stock guard, open-rental uniqueness,
/// close-if-open) runs under `write_lock` and lands through a single write or
/// `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_MOVIES,
            CF_CUSTOMERS,
            CF_RENTALS,
            CF_OPEN_RENTALS,
            CF_LATEST_RENTALS,
            CF_RECONCILIATION,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// One shared handle serving every port.
    pub fn stores(&self) -> Stores {
        Stores {
            catalog: Arc::new(self.clone()),
            customers: Arc::new(self.clone()),
            rentals: Arc::new(self.clone()),
            reconciliation: Arc::new(self.clone()),
        }
    }

    fn cf(&self, name: &'static str) -> StoreResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or(StoreError::MissingColumnFamily(name))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        cf: &'static str,
        key: &[u8],
    ) -> StoreResult<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf: &'static str, key: &[u8], value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    fn scan_json<T: DeserializeOwned>(&self, cf: &'static str) -> StoreResult<Vec<T>> {
        let mut items = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    async fn adjust(&self, adjustment: &StockAdjustment) -> StoreResult<AdjustOutcome> {
        let _guard = self.write_lock.lock().await;

        let key = adjustment.movie.as_str().as_bytes();
        let Some(mut movie) = self.get_json::<Movie>(CF_MOVIES, key)? else {
            return Ok(AdjustOutcome::MovieMissing);
        };

        let outcome = movie.apply(adjustment);
        if outcome == AdjustOutcome::Applied {
            self.put_json(CF_MOVIES, key, &movie)?;
        }
        Ok(outcome)
    }
}

fn pair_key(customer: &CustomerId, movie: &MovieId) -> Vec<u8> {
    let mut key = Vec::with_capacity(customer.as_str().len() + movie.as_str().len() + 1);
    key.extend_from_slice(customer.as_str().as_bytes());
    key.push(0);
    key.extend_from_slice(movie.as_str().as_bytes());
    key
}

fn rental_key(id: &RentalId) -> Vec<u8> {
    id.to_string().into_bytes()
}

#[async_trait]
impl CatalogStore for RocksDBStore {
    async fn find_movie(&self, id: &MovieId) -> StoreResult<Option<Movie>> {
        self.get_json(CF_MOVIES, id.as_str().as_bytes())
    }

    async fn upsert_movie(&self, movie: Movie) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.put_json(CF_MOVIES, movie.id.as_str().as_bytes(), &movie)
    }

    async fn all_movies(&self) -> StoreResult<Vec<Movie>> {
        self.scan_json(CF_MOVIES)
    }

    async fn decrement_stock_if_available(
        &self,
        adjustment: &StockAdjustment,
    ) -> StoreResult<AdjustOutcome> {
        self.adjust(adjustment).await
    }

    async fn increment_stock(&self, adjustment: &StockAdjustment) -> StoreResult<AdjustOutcome> {
        self.adjust(adjustment).await
    }
}

#[async_trait]
impl CustomerDirectory for RocksDBStore {
    async fn find_customer(&self, id: &CustomerId) -> StoreResult<Option<Customer>> {
        self.get_json(CF_CUSTOMERS, id.as_str().as_bytes())
    }

    async fn upsert_customer(&self, customer: Customer) -> StoreResult<()> {
        self.put_json(CF_CUSTOMERS, customer.id.as_str().as_bytes(), &customer)
    }
}

#[async_trait]
impl RentalStore for RocksDBStore {
    async fn insert_rental(&self, rental: Rental) -> StoreResult<InsertOutcome> {
        let _guard = self.write_lock.lock().await;

        let index_key = pair_key(&rental.customer.id, &rental.movie.id);
        let index = self.cf(CF_OPEN_RENTALS)?;
        if self.db.get_pinned_cf(index, &index_key)?.is_some() {
            return Ok(InsertOutcome::DuplicateOpen);
        }

        let key = rental_key(&rental.id);
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_RENTALS)?, &key, serde_json::to_vec(&rental)?);
        batch.put_cf(index, &index_key, &key);
        self.db.write(batch)?;

        Ok(InsertOutcome::Inserted)
    }

    async fn get_rental(&self, id: &RentalId) -> StoreResult<Option<Rental>> {
        self.get_json(CF_RENTALS, &rental_key(id))
    }

    async fn find_latest_rental(
        &self,
        customer: &CustomerId,
        movie: &MovieId,
    ) -> StoreResult<Option<Rental>> {
        // An open rental is always the latest one for its pair
        let pair = pair_key(customer, movie);
        for index in [CF_OPEN_RENTALS, CF_LATEST_RENTALS] {
            if let Some(id) = self.db.get_cf(self.cf(index)?, &pair)? {
                return self.get_json(CF_RENTALS, &id);
            }
        }
        Ok(None)
    }

    async fn confirm_rental(&self, id: &RentalId) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;

        let key = rental_key(id);
        let Some(mut rental) = self.get_json::<Rental>(CF_RENTALS, &key)? else {
            return Ok(false);
        };
        if !rental.confirm() {
            return Ok(true);
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_RENTALS)?, &key, serde_json::to_vec(&rental)?);
        batch.put_cf(
            self.cf(CF_LATEST_RENTALS)?,
            pair_key(&rental.customer.id, &rental.movie.id),
            &key,
        );
        self.db.write(batch)?;

        Ok(true)
    }

    async fn close_rental_if_open(
        &self,
        id: &RentalId,
        closure: &RentalClosure,
    ) -> StoreResult<CloseOutcome> {
        let _guard = self.write_lock.lock().await;

        let key = rental_key(id);
        let Some(mut rental) = self.get_json::<Rental>(CF_RENTALS, &key)? else {
            return Ok(CloseOutcome::Missing);
        };
        if !rental.confirmed {
            return Ok(CloseOutcome::Pending);
        }
        if !rental.apply_closure(closure) {
            return Ok(CloseOutcome::AlreadyClosed);
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_RENTALS)?, &key, serde_json::to_vec(&rental)?);
        batch.delete_cf(
            self.cf(CF_OPEN_RENTALS)?,
            pair_key(&rental.customer.id, &rental.movie.id),
        );
        self.db.write(batch)?;

        Ok(CloseOutcome::Closed(rental))
    }

    async fn discard_rental(&self, id: &RentalId) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;

        let key = rental_key(id);
        let Some(rental) = self.get_json::<Rental>(CF_RENTALS, &key)? else {
            return Ok(false);
        };
        if rental.confirmed {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_RENTALS)?, &key);
        batch.delete_cf(
            self.cf(CF_OPEN_RENTALS)?,
            pair_key(&rental.customer.id, &rental.movie.id),
        );
        self.db.write(batch)?;

        Ok(true)
    }

    async fn all_rentals(&self) -> StoreResult<Vec<Rental>> {
        self.scan_json(CF_RENTALS)
    }
}

#[async_trait]
impl ReconciliationLog for RocksDBStore {
    async fn record(&self, entry: ReconciliationEntry) -> StoreResult<()> {
        self.put_json(CF_RECONCILIATION, entry.id.as_bytes(), &entry)
    }

    async fn pending(&self) -> StoreResult<Vec<ReconciliationEntry>> {
        let entries: Vec<ReconciliationEntry> = self.scan_json(CF_RECONCILIATION)?;
        Ok(entries.into_iter().filter(|e| e.is_pending()).collect())
    }

    async fn resolve(&self, id: Uuid, resolved_at: DateTime<Utc>) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let key = id.as_bytes();
        if let Some(mut entry) = self.get_json::<ReconciliationEntry>(CF_RECONCILIATION, key)? {
            entry.resolved_at = Some(resolved_at);
            self.put_json(CF_RECONCILIATION, key, &entry)?;
        }
        Ok(())
    }
}
