// Entity models
//
// Each entity has a stable identity (UUID assigned at creation) and an
// immutable set of values; records are created and deleted, never edited.

use std::fmt;

pub mod expense_head;
pub mod party;

pub use expense_head::{ExpenseCategory, ExpenseHead};
pub use party::Party;

/// The four record kinds held by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Party,
    ExpenseHead,
    PartyTransaction,
    ExpenseTransaction,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Party => "party",
            EntityKind::ExpenseHead => "expense head",
            EntityKind::PartyTransaction => "party transaction",
            EntityKind::ExpenseTransaction => "expense transaction",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
