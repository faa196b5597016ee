//! Pre-authorised caller context.
//!
//! Authentication happens outside the engine; whoever authenticated the
//! request hands the engine a [`Caller`] and every entry point checks the
//! capability it needs before touching a store.

use crate::error::RentalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Check out and return movies.
    Rent,
    /// Inspect every rental and run reconciliation.
    ManageRentals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User { id: String, is_admin: bool },
}

impl Caller {
    pub fn user(id: impl Into<String>) -> Self {
        Caller::User {
            id: id.into(),
            is_admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Caller::User {
            id: id.into(),
            is_admin: true,
        }
    }

    /// Caller used by local tooling such as the CLI.
    pub fn system() -> Self {
        Self::admin("system")
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Caller::Anonymous => None,
            Caller::User { id, .. } => Some(id),
        }
    }

    pub fn authorize(&self, capability: Capability) -> Result<(), RentalError> {
        match (self, capability) {
            (Caller::Anonymous, _) => Err(RentalError::Unauthenticated),
            (Caller::User { .. }, Capability::Rent) => Ok(()),
            (Caller::User { is_admin: true, .. }, Capability::ManageRentals) => Ok(()),
            (Caller::User { is_admin: false, .. }, Capability::ManageRentals) => {
                Err(RentalError::Forbidden)
            }
        }
    }
}
