//! Domain model: movies, customers, rentals and the ports the engine drives.

pub mod caller;
pub mod customer;
pub mod fee;
pub mod movie;
pub mod ports;
pub mod reconciliation;
pub mod rental;
