// Hisab - Personal Finance Tracker Core
// Exposes all modules for use in the demo binary and tests

pub mod db;
pub mod deletion_guard;
pub mod entities;
pub mod error;
pub mod identity;
pub mod report;
pub mod service;
pub mod store;
pub mod transactions;

// Re-export commonly used types
pub use db::SqliteStore;
pub use deletion_guard::{can_delete_expense_head, can_delete_party};
pub use entities::{EntityKind, ExpenseCategory, ExpenseHead, Party};
pub use error::{Error, StoreError};
pub use identity::{CurrentUser, IdentityError, IdentityProvider, StaticIdentity};
pub use report::{
    ExpenseReportRow, ExpenseSection, ExpenseSummary, PartyReportRow, PartySection, PartySummary,
    ReportFilter, ReportKind, ReportTracker, ReportView, UNKNOWN_LABEL,
};
pub use service::FinanceService;
pub use store::{EntityStore, MemoryStore, TransactionQuery};
pub use transactions::{
    ExpenseTransaction, ExpenseTransactionInput, PartyTransaction, PartyTransactionInput,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
