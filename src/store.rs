// Entity store - abstract persistence collaborator
//
// The tracker delegates all persistence to a document-oriented backend.
// `EntityStore` describes that boundary; `MemoryStore` is the conforming
// in-process implementation used by tests and the demo binary, and
// `SqliteStore` (src/db.rs) is the durable one.
//
// Listing contracts every implementation must honor:
// - entities are ordered by name ascending (ties by id),
// - transactions are ordered by date descending, then created_at
//   descending, then id ascending, so the order is total,
// - all queries are scoped to one owning user,
// - creates validate their references at write time and assign identity.

use std::cmp::Ordering;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::entities::{EntityKind, ExpenseCategory, ExpenseHead, Party};
use crate::error::StoreError;
use crate::transactions::{
    ExpenseTransaction, ExpenseTransactionInput, PartyTransaction, PartyTransactionInput,
};

// ============================================================================
// QUERY
// ============================================================================

/// Narrowing applied to a transaction listing: an optional inclusive date
/// range and an optional dimension id (party for party transactions,
/// expense head for expense transactions).
///
/// No validation is performed on the range; `from > to` simply matches
/// nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub dimension_id: Option<String>,
}

impl TransactionQuery {
    /// Everything the user owns, newest first.
    pub fn all() -> Self {
        TransactionQuery::default()
    }

    pub fn range(from: NaiveDate, to: NaiveDate) -> Self {
        TransactionQuery {
            from: Some(from),
            to: Some(to),
            dimension_id: None,
        }
    }

    pub fn with_dimension(mut self, dimension_id: Option<String>) -> Self {
        self.dimension_id = dimension_id;
        self
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        if let Some(from) = self.from {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if date > to {
                return false;
            }
        }
        true
    }

    fn matches_dimension(&self, id: &str) -> bool {
        match &self.dimension_id {
            Some(wanted) => wanted == id,
            None => true,
        }
    }
}

/// Total order for transaction listings: date descending, creation instant
/// descending, id ascending as the final disambiguator.
pub(crate) fn transaction_order(
    a: (NaiveDate, DateTime<Utc>, &str),
    b: (NaiveDate, DateTime<Utc>, &str),
) -> Ordering {
    b.0.cmp(&a.0)
        .then_with(|| b.1.cmp(&a.1))
        .then_with(|| a.2.cmp(b.2))
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Abstract document store holding the four record kinds.
///
/// Methods map one-to-one onto the remote API of the real backend; every
/// call is independent, so callers may issue them concurrently.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list_parties(&self, user_id: &str) -> Result<Vec<Party>, StoreError>;

    async fn list_expense_heads(&self, user_id: &str) -> Result<Vec<ExpenseHead>, StoreError>;

    async fn list_party_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<PartyTransaction>, StoreError>;

    async fn list_expense_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<ExpenseTransaction>, StoreError>;

    async fn create_party(
        &self,
        user_id: &str,
        name: &str,
        town: &str,
    ) -> Result<Party, StoreError>;

    async fn create_expense_head(
        &self,
        user_id: &str,
        name: &str,
        category: ExpenseCategory,
    ) -> Result<ExpenseHead, StoreError>;

    async fn create_party_transaction(
        &self,
        user_id: &str,
        input: PartyTransactionInput,
    ) -> Result<PartyTransaction, StoreError>;

    async fn create_expense_transaction(
        &self,
        user_id: &str,
        input: ExpenseTransactionInput,
    ) -> Result<ExpenseTransaction, StoreError>;

    async fn delete_party(&self, user_id: &str, id: &str) -> Result<(), StoreError>;

    async fn delete_expense_head(&self, user_id: &str, id: &str) -> Result<(), StoreError>;

    async fn delete_party_transaction(&self, user_id: &str, id: &str) -> Result<(), StoreError>;

    async fn delete_expense_transaction(&self, user_id: &str, id: &str) -> Result<(), StoreError>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Debug, Default)]
struct MemoryInner {
    parties: Vec<Party>,
    expense_heads: Vec<ExpenseHead>,
    party_transactions: Vec<PartyTransaction>,
    expense_transactions: Vec<ExpenseTransaction>,
}

/// In-process `EntityStore` backed by plain vectors behind a lock.
///
/// Enforces the same write-time referential validation and delete
/// restrictions as the durable store, so tests exercise identical
/// semantics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list_parties(&self, user_id: &str) -> Result<Vec<Party>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut parties: Vec<Party> = inner
            .parties
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        parties.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(parties)
    }

    async fn list_expense_heads(&self, user_id: &str) -> Result<Vec<ExpenseHead>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut heads: Vec<ExpenseHead> = inner
            .expense_heads
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        heads.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(heads)
    }

    async fn list_party_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<PartyTransaction>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut txns: Vec<PartyTransaction> = inner
            .party_transactions
            .iter()
            .filter(|t| {
                t.user_id == user_id
                    && query.matches_date(t.date)
                    && query.matches_dimension(&t.party_id)
            })
            .cloned()
            .collect();
        txns.sort_by(|a, b| {
            transaction_order((a.date, a.created_at, &a.id), (b.date, b.created_at, &b.id))
        });
        Ok(txns)
    }

    async fn list_expense_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<ExpenseTransaction>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut txns: Vec<ExpenseTransaction> = inner
            .expense_transactions
            .iter()
            .filter(|t| {
                t.user_id == user_id
                    && query.matches_date(t.date)
                    && query.matches_dimension(&t.expense_head_id)
            })
            .cloned()
            .collect();
        txns.sort_by(|a, b| {
            transaction_order((a.date, a.created_at, &a.id), (b.date, b.created_at, &b.id))
        });
        Ok(txns)
    }

    async fn create_party(
        &self,
        user_id: &str,
        name: &str,
        town: &str,
    ) -> Result<Party, StoreError> {
        let party = Party::new(name.to_string(), town.to_string(), user_id.to_string());
        let mut inner = self.inner.write().unwrap();
        inner.parties.push(party.clone());
        Ok(party)
    }

    async fn create_expense_head(
        &self,
        user_id: &str,
        name: &str,
        category: ExpenseCategory,
    ) -> Result<ExpenseHead, StoreError> {
        let head = ExpenseHead::new(name.to_string(), category, user_id.to_string());
        let mut inner = self.inner.write().unwrap();
        inner.expense_heads.push(head.clone());
        Ok(head)
    }

    async fn create_party_transaction(
        &self,
        user_id: &str,
        input: PartyTransactionInput,
    ) -> Result<PartyTransaction, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let party_exists = inner
            .parties
            .iter()
            .any(|p| p.id == input.party_id && p.user_id == user_id);
        if !party_exists {
            return Err(StoreError::Constraint(format!(
                "party {} does not exist for this user",
                input.party_id
            )));
        }
        let txn = PartyTransaction::new(input, user_id.to_string());
        inner.party_transactions.push(txn.clone());
        Ok(txn)
    }

    async fn create_expense_transaction(
        &self,
        user_id: &str,
        input: ExpenseTransactionInput,
    ) -> Result<ExpenseTransaction, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let head_exists = inner
            .expense_heads
            .iter()
            .any(|h| h.id == input.expense_head_id && h.user_id == user_id);
        if !head_exists {
            return Err(StoreError::Constraint(format!(
                "expense head {} does not exist for this user",
                input.expense_head_id
            )));
        }
        let party_exists = inner
            .parties
            .iter()
            .any(|p| p.id == input.party_id && p.user_id == user_id);
        if !party_exists {
            return Err(StoreError::Constraint(format!(
                "party {} does not exist for this user",
                input.party_id
            )));
        }
        let txn = ExpenseTransaction::new(input, user_id.to_string());
        inner.expense_transactions.push(txn.clone());
        Ok(txn)
    }

    async fn delete_party(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let position = find_owned(
            inner.parties.iter().map(|p| (p.id.as_str(), p.user_id.as_str())),
            EntityKind::Party,
            user_id,
            id,
        )?;
        // Only party transactions guard a party; expense transactions keep a
        // soft reference that joins to "unknown" after the party is gone.
        let referenced = inner.party_transactions.iter().any(|t| t.party_id == id);
        if referenced {
            return Err(StoreError::Constraint(format!(
                "party {id} is referenced by existing transactions"
            )));
        }
        inner.parties.remove(position);
        Ok(())
    }

    async fn delete_expense_head(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let position = find_owned(
            inner
                .expense_heads
                .iter()
                .map(|h| (h.id.as_str(), h.user_id.as_str())),
            EntityKind::ExpenseHead,
            user_id,
            id,
        )?;
        let referenced = inner
            .expense_transactions
            .iter()
            .any(|t| t.expense_head_id == id);
        if referenced {
            return Err(StoreError::Constraint(format!(
                "expense head {id} is referenced by existing transactions"
            )));
        }
        inner.expense_heads.remove(position);
        Ok(())
    }

    async fn delete_party_transaction(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let position = find_owned(
            inner
                .party_transactions
                .iter()
                .map(|t| (t.id.as_str(), t.user_id.as_str())),
            EntityKind::PartyTransaction,
            user_id,
            id,
        )?;
        inner.party_transactions.remove(position);
        Ok(())
    }

    async fn delete_expense_transaction(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let position = find_owned(
            inner
                .expense_transactions
                .iter()
                .map(|t| (t.id.as_str(), t.user_id.as_str())),
            EntityKind::ExpenseTransaction,
            user_id,
            id,
        )?;
        inner.expense_transactions.remove(position);
        Ok(())
    }
}

/// Locate a record by id and check ownership. Unknown id is `NotFound`;
/// a known id owned by someone else is `Unauthorized`.
fn find_owned<'a>(
    records: impl Iterator<Item = (&'a str, &'a str)>,
    kind: EntityKind,
    user_id: &str,
    id: &str,
) -> Result<usize, StoreError> {
    let mut found_other_user = false;
    for (position, (record_id, owner)) in records.enumerate() {
        if record_id == id {
            if owner == user_id {
                return Ok(position);
            }
            found_other_user = true;
        }
    }
    if found_other_user {
        Err(StoreError::Unauthorized {
            user_id: user_id.to_string(),
        })
    } else {
        Err(StoreError::NotFound {
            kind,
            id: id.to_string(),
        })
    }
}
