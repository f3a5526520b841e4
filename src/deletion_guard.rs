// Deletion guard - referenced-entity check
//
// Pure predicates over a snapshot of the user's transactions. This is a
// client-side advisory check: a referencing transaction created between the
// check and the delete still makes the store refuse, which the service
// surfaces as a concurrent deletion race.

use crate::transactions::{ExpenseTransaction, PartyTransaction};

/// A party may be deleted only while no party transaction references it.
/// Expense transactions hold a soft party reference and do not block.
pub fn can_delete_party(party_id: &str, transactions: &[PartyTransaction]) -> bool {
    !transactions.iter().any(|t| t.party_id == party_id)
}

/// An expense head may be deleted only while no expense transaction
/// references it.
pub fn can_delete_expense_head(head_id: &str, transactions: &[ExpenseTransaction]) -> bool {
    !transactions.iter().any(|t| t.expense_head_id == head_id)
}
