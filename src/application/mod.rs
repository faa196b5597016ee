//! Application layer containing the rental workflow orchestration.
//!
//! `RentalEngine` is the entry point for checkouts and returns. It delegates
//! the cross-store write sequence to `ConsistencyCoordinator`, and
//! `Reconciler` repairs whatever the coordinator could not finish.

pub mod coordinator;
pub mod engine;
pub mod reconcile;
