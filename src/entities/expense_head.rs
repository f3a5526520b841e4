// ExpenseHead entity - named expense category with a fixed classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed classification an expense head belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Need,
    Wants,
    Pride,
    Unexpected,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 4] = [
        ExpenseCategory::Need,
        ExpenseCategory::Wants,
        ExpenseCategory::Pride,
        ExpenseCategory::Unexpected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Need => "need",
            ExpenseCategory::Wants => "wants",
            ExpenseCategory::Pride => "pride",
            ExpenseCategory::Unexpected => "unexpected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "need" => Some(ExpenseCategory::Need),
            "wants" => Some(ExpenseCategory::Wants),
            "pride" => Some(ExpenseCategory::Pride),
            "unexpected" => Some(ExpenseCategory::Unexpected),
            _ => None,
        }
    }
}

/// A named expense category label (e.g., "Groceries" under `need`).
///
/// Immutable once created, deletable only while no expense transaction
/// references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseHead {
    /// Stable identity (UUID)
    pub id: String,

    pub name: String,

    pub category: ExpenseCategory,

    /// Owning user - no cross-user visibility
    pub user_id: String,

    pub created_at: DateTime<Utc>,
}

impl ExpenseHead {
    pub fn new(name: String, category: ExpenseCategory, user_id: String) -> Self {
        ExpenseHead {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            category,
            user_id,
            created_at: Utc::now(),
        }
    }
}
