use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CustomerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A customer master record, owned by the customer directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub is_gold: bool,
}

impl Customer {
    pub fn new(
        id: CustomerId,
        name: impl Into<String>,
        phone: impl Into<String>,
        is_gold: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            phone: phone.into(),
            is_gold,
        }
    }
}

/// Copy of a customer taken when a rental is opened.
///
/// Later edits to the [`Customer`] record never reach rentals already holding
/// a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    pub is_gold: bool,
}

impl From<&Customer> for CustomerSnapshot {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id.clone(),
            name: customer.name.clone(),
            phone: customer.phone.clone(),
            is_gold: customer.is_gold,
        }
    }
}
