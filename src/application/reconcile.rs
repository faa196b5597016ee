use crate::application::coordinator::ConsistencyCoordinator;
use crate::domain::movie::{AdjustOutcome, StockAdjustment, StockDirection};
use crate::domain::ports::{ClockRef, ReconciliationLogRef, RentalStoreRef};
use crate::domain::reconciliation::{ReconciliationEntry, ReconciliationKind};
use crate::domain::rental::Rental;
use crate::error::Result;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub repaired: usize,
    pub pending: usize,
}

/// Replays pending reconciliation entries until stock and ledger agree again.
///
/// Safe to run repeatedly: every repair goes through the same per-rental stock
/// adjustment the coordinator uses, so an entry applied twice moves the
/// counter once.
pub struct Reconciler {
    coordinator: Arc<ConsistencyCoordinator>,
    rentals: RentalStoreRef,
    log: ReconciliationLogRef,
    clock: ClockRef,
}

impl Reconciler {
    pub fn new(
        coordinator: Arc<ConsistencyCoordinator>,
        rentals: RentalStoreRef,
        log: ReconciliationLogRef,
        clock: ClockRef,
    ) -> Self {
        Self {
            coordinator,
            rentals,
            log,
            clock,
        }
    }

    pub async fn run(&self) -> Result<ReconciliationReport> {
        let mut report = ReconciliationReport::default();

        for entry in self.log.pending().await? {
            match self.repair(&entry).await {
                Ok(true) => {
                    self.log.resolve(entry.id, self.clock.now()).await?;
                    report.repaired += 1;
                }
                Ok(false) => report.pending += 1,
                Err(e) => {
                    warn!(entry = %entry.id, error = %e, "Repair failed, will retry next pass");
                    report.pending += 1;
                }
            }
        }

        info!(
            repaired = report.repaired,
            pending = report.pending,
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    /// Returns whether the entry can be marked resolved.
    async fn repair(&self, entry: &ReconciliationEntry) -> Result<bool> {
        let adjustment = &entry.adjustment;
        let rental = self.rentals.get_rental(&adjustment.rental).await?;

        match (entry.kind, adjustment.direction) {
            (ReconciliationKind::OrphanedRental, _) => {
                if rental.is_some() {
                    self.rentals.discard_rental(&adjustment.rental).await?;
                }
                Ok(true)
            }
            (ReconciliationKind::StockAdjustment, StockDirection::Reserve) => match rental {
                // Confirmation only follows a landed reserve
                Some(rental) if rental.confirmed => Ok(true),
                Some(rental) => self.finish_checkout(entry, &rental).await,
                None => {
                    // Hand back any unit taken for a rental that no longer exists
                    let release = StockAdjustment {
                        direction: StockDirection::Release,
                        ..adjustment.clone()
                    };
                    self.coordinator.adjust_stock(&release).await?;
                    Ok(true)
                }
            },
            (ReconciliationKind::StockAdjustment, StockDirection::Release) => {
                if self.coordinator.adjust_stock(adjustment).await? == AdjustOutcome::MovieMissing {
                    warn!(
                        entry = %entry.id,
                        movie = %adjustment.movie,
                        "Movie gone, dropping reconciliation entry"
                    );
                }
                Ok(true)
            }
        }
    }

    /// Replays the reserve of an unconfirmed rental and confirms it, or drops
    /// the rental when no unit can back it.
    async fn finish_checkout(&self, entry: &ReconciliationEntry, rental: &Rental) -> Result<bool> {
        let adjustment = &entry.adjustment;
        match self.coordinator.adjust_stock(adjustment).await? {
            AdjustOutcome::Applied | AdjustOutcome::AlreadyApplied => {
                Ok(self.rentals.confirm_rental(&rental.id).await?)
            }
            outcome @ (AdjustOutcome::Insufficient | AdjustOutcome::MovieMissing) => {
                warn!(
                    entry = %entry.id,
                    movie = %adjustment.movie,
                    rental = %rental.id,
                    outcome = ?outcome,
                    "No stock to back unconfirmed rental, discarding it"
                );
                self.rentals.discard_rental(&rental.id).await?;
                Ok(true)
            }
        }
    }
}
