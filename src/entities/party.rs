// Party entity - external counterparty in a money exchange

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A counterparty the user exchanges money with.
///
/// Identity is a UUID assigned by the store at creation and never changes.
/// Parties are immutable once created; there is no edit operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    /// Stable identity (UUID)
    pub id: String,

    /// Counterparty name (e.g., "Acme Traders")
    pub name: String,

    /// Town the counterparty operates from
    pub town: String,

    /// Owning user - no cross-user visibility
    pub user_id: String,

    /// When the record was created (also the sort tie-break for reports)
    pub created_at: DateTime<Utc>,
}

impl Party {
    pub fn new(name: String, town: String, user_id: String) -> Self {
        Party {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            town,
            user_id,
            created_at: Utc::now(),
        }
    }

    /// Display label for report rows: "Name (Town)", or just the name
    /// when no town was recorded.
    pub fn display_label(&self) -> String {
        if self.town.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.town)
        }
    }
}
