use crate::domain::movie::StockAdjustment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationKind {
    /// The rental write landed but its stock adjustment did not.
    StockAdjustment,
    /// A rental was inserted, its reserve found no stock, and removing the
    /// rental again failed.
    OrphanedRental,
}

/// A divergence between the rental ledger and the stock counters that needs
/// out-of-band repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub id: Uuid,
    pub kind: ReconciliationKind,
    pub adjustment: StockAdjustment,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReconciliationEntry {
    pub fn new(
        kind: ReconciliationKind,
        adjustment: StockAdjustment,
        reason: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            adjustment,
            reason: reason.into(),
            recorded_at,
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.resolved_at.is_none()
    }
}
