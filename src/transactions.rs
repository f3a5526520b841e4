// Transaction records - immutable monetary events
//
// Amounts are non-negative decimals; direction of the cash flow is carried
// by `is_paid` on party transactions, never by the sign of the amount.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Money exchanged with a party.
///
/// `is_paid = true` means money was given to the party (outflow);
/// `false` means money was received from the party (inflow).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyTransaction {
    /// Stable identity (UUID)
    pub id: String,

    /// Reference to the party this money moved to or from
    pub party_id: String,

    /// Non-negative exact decimal amount
    pub amount: Decimal,

    pub description: Option<String>,

    /// Direction flag: true = given to party, false = received from party
    pub is_paid: bool,

    /// Calendar date of the exchange (ISO `YYYY-MM-DD` on the wire)
    pub date: NaiveDate,

    pub user_id: String,

    /// Creation instant; secondary sort key after `date`
    pub created_at: DateTime<Utc>,
}

impl PartyTransaction {
    pub fn new(input: PartyTransactionInput, user_id: String) -> Self {
        PartyTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            party_id: input.party_id,
            amount: input.amount,
            description: normalize_description(input.description),
            is_paid: input.is_paid,
            date: input.date,
            user_id,
            created_at: Utc::now(),
        }
    }
}

/// An expense attributed to an expense head and the party it was paid to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseTransaction {
    /// Stable identity (UUID)
    pub id: String,

    /// Reference to the expense head this spend is categorized under
    pub expense_head_id: String,

    /// Reference to the party the expense was paid to
    pub party_id: String,

    /// Non-negative exact decimal amount
    pub amount: Decimal,

    pub description: Option<String>,

    /// Calendar date of the expense
    pub date: NaiveDate,

    pub user_id: String,

    /// Creation instant; secondary sort key after `date`
    pub created_at: DateTime<Utc>,
}

impl ExpenseTransaction {
    pub fn new(input: ExpenseTransactionInput, user_id: String) -> Self {
        ExpenseTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            expense_head_id: input.expense_head_id,
            party_id: input.party_id,
            amount: input.amount,
            description: normalize_description(input.description),
            date: input.date,
            user_id,
            created_at: Utc::now(),
        }
    }
}

/// Form input for a new party transaction, before the store assigns identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyTransactionInput {
    pub party_id: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub is_paid: bool,
    pub date: NaiveDate,
}

/// Form input for a new expense transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseTransactionInput {
    pub expense_head_id: String,
    pub party_id: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: NaiveDate,
}

/// Trim the optional free-text description; whitespace-only input is
/// stored as no description at all.
pub fn normalize_description(description: Option<String>) -> Option<String> {
    match description {
        Some(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        None => None,
    }
}
