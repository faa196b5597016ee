use std::fmt;
use thiserror::Error;

/// The kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Customer,
    Movie,
    Rental,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Customer => "Customer",
            Entity::Movie => "Movie",
            Entity::Rental => "Rental",
        };
        f.write_str(name)
    }
}

/// Failures raised by a storage backend.
///
/// These never reach HTTP callers directly; the engine folds them into
/// [`RentalError::TransactionFailed`] or [`RentalError::Storage`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Column family not found: {0}")]
    MissingColumnFamily(&'static str),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum RentalError {
    #[error("{0} not found.")]
    NotFound(Entity),
    #[error("Movie not in stock.")]
    OutOfStock,
    #[error("Return already processed.")]
    AlreadyReturned,
    #[error("Customer already has an open rental for this movie.")]
    DuplicateRental,
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
    #[error("Access denied. No credentials provided.")]
    Unauthenticated,
    #[error("Access denied.")]
    Forbidden,
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Catalog error: {0}")]
    CatalogError(String),
}

impl RentalError {
    /// HTTP status an outer routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RentalError::NotFound(_) => 404,
            RentalError::OutOfStock
            | RentalError::AlreadyReturned
            | RentalError::DuplicateRental
            | RentalError::ValidationError(_)
            | RentalError::CsvError(_)
            | RentalError::CatalogError(_) => 400,
            RentalError::Unauthenticated => 401,
            RentalError::Forbidden => 403,
            RentalError::TransactionFailed(_)
            | RentalError::Storage(_)
            | RentalError::IoError(_) => 500,
        }
    }

    /// Message safe to show to a client. Server-side failures collapse to a
    /// generic text so retry and storage details stay in the logs.
    pub fn public_message(&self) -> String {
        if self.status_code() >= 500 {
            "Something failed.".to_string()
        } else {
            self.to_string()
        }
    }
}

pub type Result<T, E = RentalError> = std::result::Result<T, E>;
