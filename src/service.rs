// Finance service - the surface the presentation layer talks to
//
// Generic over the two external collaborators so any conforming store and
// identity provider slot in. Every operation resolves the acting user
// first and scopes all retrieval to it. Report retrievals for the two
// transaction kinds are decoupled and issued concurrently; one kind
// failing leaves the other's section intact.

use crate::deletion_guard::{can_delete_expense_head, can_delete_party};
use crate::entities::{EntityKind, ExpenseCategory, ExpenseHead, Party};
use crate::error::{Error, StoreError};
use crate::identity::{CurrentUser, IdentityProvider};
use crate::report::{
    join_expense_transactions, join_party_transactions, summarize_expense, summarize_party,
    ExpenseSection, PartySection, ReportFilter, ReportView,
};
use crate::store::{EntityStore, TransactionQuery};
use crate::transactions::{
    ExpenseTransaction, ExpenseTransactionInput, PartyTransaction, PartyTransactionInput,
};

pub struct FinanceService<S, I> {
    store: S,
    identity: I,
}

impl<S: EntityStore, I: IdentityProvider> FinanceService<S, I> {
    pub fn new(store: S, identity: I) -> Self {
        FinanceService { store, identity }
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    async fn require_user(&self) -> Result<CurrentUser, Error> {
        self.identity
            .current_user()
            .await
            .ok_or_else(|| Error::Validation("no signed-in user".to_string()))
    }

    // ========================================================================
    // ENTITY OPERATIONS
    // ========================================================================

    pub async fn create_party(&self, name: &str, town: &str) -> Result<Party, Error> {
        let user = self.require_user().await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("party name must not be empty".to_string()));
        }
        Ok(self.store.create_party(&user.id, name, town.trim()).await?)
    }

    pub async fn create_expense_head(
        &self,
        name: &str,
        category: ExpenseCategory,
    ) -> Result<ExpenseHead, Error> {
        let user = self.require_user().await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation(
                "expense head name must not be empty".to_string(),
            ));
        }
        Ok(self
            .store
            .create_expense_head(&user.id, name, category)
            .await?)
    }

    pub async fn list_parties(&self) -> Result<Vec<Party>, Error> {
        let user = self.require_user().await?;
        self.store
            .list_parties(&user.id)
            .await
            .map_err(|e| Error::retrieval(EntityKind::Party, e))
    }

    pub async fn list_expense_heads(&self) -> Result<Vec<ExpenseHead>, Error> {
        let user = self.require_user().await?;
        self.store
            .list_expense_heads(&user.id)
            .await
            .map_err(|e| Error::retrieval(EntityKind::ExpenseHead, e))
    }

    /// Guarded delete: skip the store entirely when transactions still
    /// reference the party, and surface a store-side constraint refusal as
    /// the check-then-act race it is.
    pub async fn delete_party(&self, id: &str) -> Result<(), Error> {
        let user = self.require_user().await?;
        let transactions = self
            .store
            .list_party_transactions(&user.id, &TransactionQuery::all())
            .await
            .map_err(|e| Error::retrieval(EntityKind::PartyTransaction, e))?;
        if !can_delete_party(id, &transactions) {
            return Err(Error::DeletionBlocked {
                kind: EntityKind::Party,
                id: id.to_string(),
            });
        }
        match self.store.delete_party(&user.id, id).await {
            Err(StoreError::Constraint(reason)) => {
                log::warn!("delete of party {id} lost a race: {reason}");
                Err(Error::ConcurrentDeletionRace {
                    kind: EntityKind::Party,
                    id: id.to_string(),
                })
            }
            other => Ok(other?),
        }
    }

    pub async fn delete_expense_head(&self, id: &str) -> Result<(), Error> {
        let user = self.require_user().await?;
        let transactions = self
            .store
            .list_expense_transactions(&user.id, &TransactionQuery::all())
            .await
            .map_err(|e| Error::retrieval(EntityKind::ExpenseTransaction, e))?;
        if !can_delete_expense_head(id, &transactions) {
            return Err(Error::DeletionBlocked {
                kind: EntityKind::ExpenseHead,
                id: id.to_string(),
            });
        }
        match self.store.delete_expense_head(&user.id, id).await {
            Err(StoreError::Constraint(reason)) => {
                log::warn!("delete of expense head {id} lost a race: {reason}");
                Err(Error::ConcurrentDeletionRace {
                    kind: EntityKind::ExpenseHead,
                    id: id.to_string(),
                })
            }
            other => Ok(other?),
        }
    }

    // ========================================================================
    // TRANSACTION OPERATIONS
    // ========================================================================

    pub async fn create_party_transaction(
        &self,
        input: PartyTransactionInput,
    ) -> Result<PartyTransaction, Error> {
        let user = self.require_user().await?;
        if input.party_id.is_empty() {
            return Err(Error::Validation("a party must be selected".to_string()));
        }
        if input.amount.is_sign_negative() {
            return Err(Error::Validation(
                "amount must not be negative".to_string(),
            ));
        }
        Ok(self.store.create_party_transaction(&user.id, input).await?)
    }

    pub async fn create_expense_transaction(
        &self,
        input: ExpenseTransactionInput,
    ) -> Result<ExpenseTransaction, Error> {
        let user = self.require_user().await?;
        if input.expense_head_id.is_empty() {
            return Err(Error::Validation(
                "an expense head must be selected".to_string(),
            ));
        }
        if input.party_id.is_empty() {
            return Err(Error::Validation("a party must be selected".to_string()));
        }
        if input.amount.is_sign_negative() {
            return Err(Error::Validation(
                "amount must not be negative".to_string(),
            ));
        }
        Ok(self
            .store
            .create_expense_transaction(&user.id, input)
            .await?)
    }

    /// Full listing for the transactions page, newest first.
    pub async fn list_party_transactions(&self) -> Result<Vec<PartyTransaction>, Error> {
        let user = self.require_user().await?;
        self.store
            .list_party_transactions(&user.id, &TransactionQuery::all())
            .await
            .map_err(|e| Error::retrieval(EntityKind::PartyTransaction, e))
    }

    pub async fn list_expense_transactions(&self) -> Result<Vec<ExpenseTransaction>, Error> {
        let user = self.require_user().await?;
        self.store
            .list_expense_transactions(&user.id, &TransactionQuery::all())
            .await
            .map_err(|e| Error::retrieval(EntityKind::ExpenseTransaction, e))
    }

    pub async fn delete_party_transaction(&self, id: &str) -> Result<(), Error> {
        let user = self.require_user().await?;
        Ok(self.store.delete_party_transaction(&user.id, id).await?)
    }

    pub async fn delete_expense_transaction(&self, id: &str) -> Result<(), Error> {
        let user = self.require_user().await?;
        Ok(self.store.delete_expense_transaction(&user.id, id).await?)
    }

    // ========================================================================
    // REPORTS
    // ========================================================================

    /// Build the report for a filter. Fails outright only when no user is
    /// signed in; per-kind retrieval failures land inside the view so a
    /// combined report can still show the kind that loaded.
    pub async fn build_report(&self, filter: &ReportFilter) -> Result<ReportView, Error> {
        let user = self.require_user().await?;

        let party_future = async {
            if filter.kind.includes_party() {
                Some(self.load_party_section(&user.id, filter).await)
            } else {
                None
            }
        };
        let expense_future = async {
            if filter.kind.includes_expense() {
                Some(self.load_expense_section(&user.id, filter).await)
            } else {
                None
            }
        };
        let (party, expense) = tokio::join!(party_future, expense_future);

        Ok(ReportView {
            filter: filter.clone(),
            party,
            expense,
        })
    }

    async fn load_party_section(
        &self,
        user_id: &str,
        filter: &ReportFilter,
    ) -> Result<PartySection, Error> {
        let query =
            TransactionQuery::range(filter.from, filter.to).with_dimension(filter.party_id.clone());
        let (transactions, parties) = tokio::join!(
            self.store.list_party_transactions(user_id, &query),
            self.store.list_parties(user_id),
        );
        let transactions =
            transactions.map_err(|e| Error::retrieval(EntityKind::PartyTransaction, e))?;
        let parties = parties.map_err(|e| Error::retrieval(EntityKind::Party, e))?;

        let rows = join_party_transactions(transactions, &parties);
        let summary = summarize_party(&rows);
        Ok(PartySection { rows, summary })
    }

    async fn load_expense_section(
        &self,
        user_id: &str,
        filter: &ReportFilter,
    ) -> Result<ExpenseSection, Error> {
        let query = TransactionQuery::range(filter.from, filter.to)
            .with_dimension(filter.expense_head_id.clone());
        let (transactions, heads, parties) = tokio::join!(
            self.store.list_expense_transactions(user_id, &query),
            self.store.list_expense_heads(user_id),
            self.store.list_parties(user_id),
        );
        let transactions =
            transactions.map_err(|e| Error::retrieval(EntityKind::ExpenseTransaction, e))?;
        let heads = heads.map_err(|e| Error::retrieval(EntityKind::ExpenseHead, e))?;
        // The party snapshot only feeds the display join; without it the
        // rows still aggregate, they just show unknown parties.
        let parties = match parties {
            Ok(parties) => parties,
            Err(e) => {
                log::warn!("party snapshot unavailable for expense report: {e}");
                Vec::new()
            }
        };

        let rows = join_expense_transactions(transactions, &heads, &parties);
        let summary = summarize_expense(&rows);
        Ok(ExpenseSection { rows, summary })
    }
}
