use crate::config::RetryPolicy;
use crate::domain::movie::{AdjustOutcome, StockAdjustment, StockDirection};
use crate::domain::ports::{
    CatalogStoreRef, ClockRef, CloseOutcome, InsertOutcome, ReconciliationLogRef, RentalStoreRef,
};
use crate::domain::reconciliation::{ReconciliationEntry, ReconciliationKind};
use crate::domain::rental::{Rental, RentalClosure};
use crate::error::{Entity, RentalError, Result, StoreError, StoreResult};
use tracing::{debug, error, warn};

/// Applies a rental write and its stock adjustment as one unit of work.
///
/// The stores only guarantee atomicity per document, so the two writes are
/// ordered: the rental (the ledger) is written first, then the movie's
/// counter is adjusted. A new rental stays unconfirmed, and cannot be
/// returned, until its reserve has landed. A failed adjustment is retried; once retries run out
/// the divergence is written to the reconciliation log and the caller gets
/// [`RentalError::TransactionFailed`]. The ledger may run ahead of the
/// counter, never the other way round.
pub struct ConsistencyCoordinator {
    catalog: CatalogStoreRef,
    rentals: RentalStoreRef,
    reconciliation: ReconciliationLogRef,
    clock: ClockRef,
    retry: RetryPolicy,
}

impl ConsistencyCoordinator {
    pub fn new(
        catalog: CatalogStoreRef,
        rentals: RentalStoreRef,
        reconciliation: ReconciliationLogRef,
        clock: ClockRef,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            rentals,
            reconciliation,
            clock,
            retry,
        }
    }

    /// Inserts a new rental, reserves one unit of its movie, then confirms it.
    pub async fn open_rental(&self, rental: Rental) -> Result<Rental> {
        match self.rentals.insert_rental(rental.clone()).await {
            Ok(InsertOutcome::Inserted) => {}
            Ok(InsertOutcome::DuplicateOpen) => return Err(RentalError::DuplicateRental),
            Err(e) => {
                warn!(rental = %rental.id, error = %e, "Rental insert failed, no stock touched");
                return Err(RentalError::TransactionFailed(format!(
                    "rental insert failed: {}",
                    e
                )));
            }
        }

        let adjustment = StockAdjustment::reserve(&rental);
        match self.adjust_stock(&adjustment).await {
            Ok(AdjustOutcome::Applied | AdjustOutcome::AlreadyApplied) => {
                self.confirm(rental, adjustment).await
            }
            Ok(AdjustOutcome::Insufficient) => {
                debug!(rental = %rental.id, "Lost the race for the last unit, discarding rental");
                self.compensate(&rental, &adjustment).await?;
                Err(RentalError::OutOfStock)
            }
            Ok(AdjustOutcome::MovieMissing) => {
                self.compensate(&rental, &adjustment).await?;
                Err(RentalError::NotFound(Entity::Movie))
            }
            Err(e) => Err(self.escalate_adjustment(adjustment, e).await),
        }
    }

    /// Closes an open rental, then releases its unit back to stock.
    pub async fn close_rental(&self, rental: &Rental, closure: RentalClosure) -> Result<Rental> {
        let closed = match self.rentals.close_rental_if_open(&rental.id, &closure).await {
            Ok(CloseOutcome::Closed(closed)) => closed,
            Ok(CloseOutcome::AlreadyClosed) => return Err(RentalError::AlreadyReturned),
            Ok(CloseOutcome::Pending | CloseOutcome::Missing) => {
                return Err(RentalError::NotFound(Entity::Rental));
            }
            Err(e) => {
                warn!(rental = %rental.id, error = %e, "Rental close failed, no stock touched");
                return Err(RentalError::TransactionFailed(format!(
                    "rental close failed: {}",
                    e
                )));
            }
        };

        let adjustment = StockAdjustment::release(&closed);
        match self.adjust_stock(&adjustment).await {
            Ok(AdjustOutcome::MovieMissing) => {
                warn!(
                    rental = %closed.id,
                    movie = %adjustment.movie,
                    "Returned movie no longer in catalog, stock not restored"
                );
                Ok(closed)
            }
            Ok(_) => Ok(closed),
            Err(e) => Err(self.escalate_adjustment(adjustment, e).await),
        }
    }

    /// Applies a keyed adjustment, retrying transient store failures.
    ///
    /// The rental id travels with every attempt, so an attempt whose write
    /// landed but whose acknowledgement was lost comes back as `AlreadyApplied`.
    pub async fn adjust_stock(&self, adjustment: &StockAdjustment) -> StoreResult<AdjustOutcome> {
        let mut attempt = 1;
        loop {
            let result = match adjustment.direction {
                StockDirection::Reserve => {
                    self.catalog.decrement_stock_if_available(adjustment).await
                }
                StockDirection::Release => self.catalog.increment_stock(adjustment).await,
            };

            match result {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < self.retry.max_attempts => {
                    warn!(
                        movie = %adjustment.movie,
                        rental = %adjustment.rental,
                        direction = %adjustment.direction,
                        attempt,
                        error = %e,
                        "Stock adjustment failed, retrying"
                    );
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn confirm(&self, mut rental: Rental, adjustment: StockAdjustment) -> Result<Rental> {
        let reason = match self.rentals.confirm_rental(&rental.id).await {
            Ok(true) => {
                rental.confirm();
                return Ok(rental);
            }
            Ok(false) => format!("rental {} vanished before confirmation", rental.id),
            Err(e) => format!("confirming rental {} failed: {}", rental.id, e),
        };
        Err(self
            .escalate(ReconciliationKind::StockAdjustment, adjustment, reason)
            .await)
    }

    /// Undoes a rental insert whose reserve could not be applied.
    async fn compensate(&self, rental: &Rental, adjustment: &StockAdjustment) -> Result<()> {
        match self.rentals.discard_rental(&rental.id).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let reason = format!("discarding rental {} failed: {}", rental.id, e);
                Err(self
                    .escalate(ReconciliationKind::OrphanedRental, adjustment.clone(), reason)
                    .await)
            }
        }
    }

    async fn escalate_adjustment(
        &self,
        adjustment: StockAdjustment,
        cause: StoreError,
    ) -> RentalError {
        let reason = format!(
            "{} failed after {} attempt(s): {}",
            adjustment.direction, self.retry.max_attempts, cause
        );
        self.escalate(ReconciliationKind::StockAdjustment, adjustment, reason)
            .await
    }

    async fn escalate(
        &self,
        kind: ReconciliationKind,
        adjustment: StockAdjustment,
        reason: String,
    ) -> RentalError {
        let entry = ReconciliationEntry::new(kind, adjustment, reason.clone(), self.clock.now());

        error!(
            entry = %entry.id,
            kind = ?entry.kind,
            movie = %entry.adjustment.movie,
            rental = %entry.adjustment.rental,
            reason = %reason,
            "Rental and stock diverged, reconciliation required"
        );

        if let Err(e) = self.reconciliation.record(entry).await {
            error!(error = %e, "Failed to persist reconciliation entry");
        }

        RentalError::TransactionFailed(reason)
    }
}
