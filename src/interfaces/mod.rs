//! Adapters between the outside world and the rental engine: CSV event input,
//! CSV reports, and the JSON catalog used to seed the stores.

pub mod catalog;
pub mod csv;
