use crate::application::coordinator::ConsistencyCoordinator;
use crate::application::reconcile::{ReconciliationReport, Reconciler};
use crate::config::RetryPolicy;
use crate::domain::caller::{Caller, Capability};
use crate::domain::customer::CustomerId;
use crate::domain::movie::{Movie, MovieId};
use crate::domain::ports::{CatalogStoreRef, ClockRef, CustomerDirectoryRef, RentalStoreRef, Stores};
use crate::domain::rental::{Rental, RentalId};
use crate::error::{Entity, RentalError, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// The main entry point for rental operations.
///
/// `RentalEngine` validates a checkout or return against the current catalog
/// and rental state, then hands the two writes to the
/// [`ConsistencyCoordinator`]. Each call is independent; the only shared
/// mutable state is the per-movie stock counter, which stores change
/// atomically.
pub struct RentalEngine {
    catalog: CatalogStoreRef,
    customers: CustomerDirectoryRef,
    rentals: RentalStoreRef,
    clock: ClockRef,
    coordinator: Arc<ConsistencyCoordinator>,
    reconciler: Reconciler,
}

impl RentalEngine {
    /// Creates a new `RentalEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `stores` - The catalog, customer, rental and reconciliation backends.
    /// * `clock` - Source of checkout and return timestamps.
    /// * `retry` - Retry policy for stock adjustments.
    pub fn new(stores: Stores, clock: ClockRef, retry: RetryPolicy) -> Self {
        let coordinator = Arc::new(ConsistencyCoordinator::new(
            stores.catalog.clone(),
            stores.rentals.clone(),
            stores.reconciliation.clone(),
            clock.clone(),
            retry,
        ));
        let reconciler = Reconciler::new(
            coordinator.clone(),
            stores.rentals.clone(),
            stores.reconciliation,
            clock.clone(),
        );

        Self {
            catalog: stores.catalog,
            customers: stores.customers,
            rentals: stores.rentals,
            clock,
            coordinator,
            reconciler,
        }
    }

    /// Opens a rental of `movie_id` for `customer_id` and reserves one unit of stock.
    pub async fn checkout(
        &self,
        caller: &Caller,
        customer_id: &CustomerId,
        movie_id: &MovieId,
    ) -> Result<Rental> {
        caller.authorize(Capability::Rent)?;

        let movie = self
            .catalog
            .find_movie(movie_id)
            .await?
            .ok_or(RentalError::NotFound(Entity::Movie))?;

        if !movie.in_stock() {
            return Err(RentalError::OutOfStock);
        }

        let customer = self
            .customers
            .find_customer(customer_id)
            .await?
            .ok_or(RentalError::NotFound(Entity::Customer))?;

        let rental = Rental::open(&customer, &movie, self.clock.now());
        debug!(rental = %rental.id, customer = %customer_id, movie = %movie_id, "Opening rental");

        let coordinator = self.coordinator.clone();
        let rental = run_detached(async move { coordinator.open_rental(rental).await }).await?;

        info!(
            rental = %rental.id,
            customer = %customer_id,
            movie = %movie_id,
            caller = caller.id().unwrap_or("anonymous"),
            "Movie checked out"
        );
        Ok(rental)
    }

    /// Closes the customer's rental of `movie_id`, bills it and restocks the movie.
    pub async fn return_rental(
        &self,
        caller: &Caller,
        customer_id: &CustomerId,
        movie_id: &MovieId,
    ) -> Result<Rental> {
        caller.authorize(Capability::Rent)?;

        let rental = self
            .rentals
            .find_latest_rental(customer_id, movie_id)
            .await?
            .ok_or(RentalError::NotFound(Entity::Rental))?;

        // A checkout still waiting on its stock is not returnable yet
        if !rental.confirmed {
            return Err(RentalError::NotFound(Entity::Rental));
        }
        if !rental.is_open() {
            return Err(RentalError::AlreadyReturned);
        }

        let closure = rental.closure_at(self.clock.now());

        let coordinator = self.coordinator.clone();
        let closed =
            run_detached(async move { coordinator.close_rental(&rental, closure).await }).await?;

        info!(
            rental = %closed.id,
            customer = %customer_id,
            movie = %movie_id,
            fee = %closure.fee,
            caller = caller.id().unwrap_or("anonymous"),
            "Movie returned"
        );
        Ok(closed)
    }

    pub async fn get_rental(&self, caller: &Caller, id: &RentalId) -> Result<Rental> {
        caller.authorize(Capability::ManageRentals)?;

        self.rentals
            .get_rental(id)
            .await?
            .ok_or(RentalError::NotFound(Entity::Rental))
    }

    /// All rentals, most recent checkout first.
    pub async fn list_rentals(&self, caller: &Caller) -> Result<Vec<Rental>> {
        caller.authorize(Capability::ManageRentals)?;

        let mut rentals = self.rentals.all_rentals().await?;
        rentals.sort_by(|a, b| b.checked_out_at.cmp(&a.checked_out_at));
        Ok(rentals)
    }

    /// Replays pending reconciliation entries.
    pub async fn reconcile(&self, caller: &Caller) -> Result<ReconciliationReport> {
        caller.authorize(Capability::ManageRentals)?;
        self.reconciler.run().await
    }

    /// Every movie with its current stock, ordered by id.
    pub async fn stock_report(&self) -> Result<Vec<Movie>> {
        let mut movies = self.catalog.all_movies().await?;
        movies.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(movies)
    }
}

/// Runs a two-step write on its own task. If the caller stops waiting, the
/// task still runs to completion instead of stopping between the two writes.
async fn run_detached<F>(work: F) -> Result<Rental>
where
    F: Future<Output = Result<Rental>> + Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| RentalError::TransactionFailed(format!("rental task aborted: {}", e)))?
}
