// Report aggregation
//
// Pure functions over records already retrieved from the store: join each
// transaction to its referenced entity through an id-keyed snapshot map,
// then reduce to exact-decimal totals. Nothing here mutates or retrieves;
// given the same inputs the output is identical.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{ExpenseHead, Party};
use crate::error::Error;
use crate::transactions::{ExpenseTransaction, PartyTransaction};

pub const UNKNOWN_LABEL: &str = "Unknown";

// ============================================================================
// FILTER
// ============================================================================

/// Which transaction kinds a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Party,
    Expense,
    Combined,
}

impl ReportKind {
    pub fn includes_party(self) -> bool {
        matches!(self, ReportKind::Party | ReportKind::Combined)
    }

    pub fn includes_expense(self) -> bool {
        matches!(self, ReportKind::Expense | ReportKind::Combined)
    }
}

/// Report request: kind, inclusive date range, optional dimension filters.
///
/// The range is taken as given; `from > to` is not an error and simply
/// matches no transactions. `None` dimension filters mean "all".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub kind: ReportKind,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub party_id: Option<String>,
    pub expense_head_id: Option<String>,
}

impl ReportFilter {
    pub fn new(kind: ReportKind, from: NaiveDate, to: NaiveDate) -> Self {
        ReportFilter {
            kind,
            from,
            to,
            party_id: None,
            expense_head_id: None,
        }
    }
}

// ============================================================================
// JOINED ROWS
// ============================================================================

/// A party transaction with its party resolved, or `None` when the
/// reference no longer matches any entity in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyReportRow {
    pub transaction: PartyTransaction,
    pub party: Option<Party>,
}

impl PartyReportRow {
    /// "Name (Town)" of the resolved party, or "Unknown".
    pub fn party_label(&self) -> String {
        match &self.party {
            Some(party) => party.display_label(),
            None => UNKNOWN_LABEL.to_string(),
        }
    }
}

/// An expense transaction with its expense head (and, for display, its
/// party) resolved where possible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseReportRow {
    pub transaction: ExpenseTransaction,
    pub expense_head: Option<ExpenseHead>,
    pub party: Option<Party>,
}

impl ExpenseReportRow {
    pub fn head_label(&self) -> String {
        match &self.expense_head {
            Some(head) => head.name.clone(),
            None => UNKNOWN_LABEL.to_string(),
        }
    }

    pub fn category_label(&self) -> &'static str {
        match &self.expense_head {
            Some(head) => head.category.as_str(),
            None => UNKNOWN_LABEL,
        }
    }

    pub fn party_label(&self) -> String {
        match &self.party {
            Some(party) => party.display_label(),
            None => UNKNOWN_LABEL.to_string(),
        }
    }
}

// ============================================================================
// SUMMARIES
// ============================================================================

/// Exact-decimal totals over a party transaction listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartySummary {
    /// Σ amount where is_paid (money given out)
    pub total_paid: Decimal,
    /// Σ amount where !is_paid (money received)
    pub total_received: Decimal,
    /// total_received − total_paid
    pub net_balance: Decimal,
}

/// Exact-decimal total over an expense transaction listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpenseSummary {
    /// Σ amount over every matched transaction, regardless of category
    pub total_expense: Decimal,
}

/// One kind's share of a report: the joined, date-descending rows plus the
/// scalar totals over exactly those rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartySection {
    pub rows: Vec<PartyReportRow>,
    pub summary: PartySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseSection {
    pub rows: Vec<ExpenseReportRow>,
    pub summary: ExpenseSummary,
}

/// The derived view handed to the presentation layer.
///
/// Each requested kind carries either its section or the retrieval error
/// that prevented it; an unrequested kind is `None`. The two kinds fail
/// independently, so a combined report can be half-populated.
#[derive(Debug)]
pub struct ReportView {
    pub filter: ReportFilter,
    pub party: Option<Result<PartySection, Error>>,
    pub expense: Option<Result<ExpenseSection, Error>>,
}

impl ReportView {
    /// Successfully loaded party section, if one was requested and loaded.
    pub fn party_section(&self) -> Option<&PartySection> {
        match &self.party {
            Some(Ok(section)) => Some(section),
            _ => None,
        }
    }

    pub fn expense_section(&self) -> Option<&ExpenseSection> {
        match &self.expense {
            Some(Ok(section)) => Some(section),
            _ => None,
        }
    }

    /// Errors of the failed sections, for the empty-with-indicator rendering.
    pub fn section_errors(&self) -> Vec<&Error> {
        let mut errors = Vec::new();
        if let Some(Err(e)) = &self.party {
            errors.push(e);
        }
        if let Some(Err(e)) = &self.expense {
            errors.push(e);
        }
        errors
    }
}

// ============================================================================
// JOIN + REDUCE
// ============================================================================

/// Build the one-per-report lookup table for joins.
fn index_by_id<'a, T, F: Fn(&T) -> &str>(entities: &'a [T], id_of: F) -> HashMap<&'a str, &'a T> {
    entities.iter().map(|e| (id_of(e), e)).collect()
}

/// Join party transactions to the party snapshot. A transaction whose
/// reference is missing joins to `None` and is logged, never dropped.
pub fn join_party_transactions(
    transactions: Vec<PartyTransaction>,
    parties: &[Party],
) -> Vec<PartyReportRow> {
    let by_id = index_by_id(parties, |p: &Party| p.id.as_str());
    transactions
        .into_iter()
        .map(|transaction| {
            let party = by_id.get(transaction.party_id.as_str()).map(|p| (*p).clone());
            if party.is_none() {
                log::warn!(
                    "party transaction {} references unknown party {}",
                    transaction.id,
                    transaction.party_id
                );
            }
            PartyReportRow { transaction, party }
        })
        .collect()
}

/// Join expense transactions to the expense head snapshot, resolving the
/// soft party reference for display where possible.
pub fn join_expense_transactions(
    transactions: Vec<ExpenseTransaction>,
    expense_heads: &[ExpenseHead],
    parties: &[Party],
) -> Vec<ExpenseReportRow> {
    let heads_by_id = index_by_id(expense_heads, |h: &ExpenseHead| h.id.as_str());
    let parties_by_id = index_by_id(parties, |p: &Party| p.id.as_str());
    transactions
        .into_iter()
        .map(|transaction| {
            let expense_head = heads_by_id
                .get(transaction.expense_head_id.as_str())
                .map(|h| (*h).clone());
            if expense_head.is_none() {
                log::warn!(
                    "expense transaction {} references unknown expense head {}",
                    transaction.id,
                    transaction.expense_head_id
                );
            }
            let party = parties_by_id
                .get(transaction.party_id.as_str())
                .map(|p| (*p).clone());
            ExpenseReportRow {
                transaction,
                expense_head,
                party,
            }
        })
        .collect()
}

/// Reduce joined party rows to the three scalars. Rows with an unresolved
/// party still count.
pub fn summarize_party(rows: &[PartyReportRow]) -> PartySummary {
    let mut total_paid = Decimal::ZERO;
    let mut total_received = Decimal::ZERO;
    for row in rows {
        if row.transaction.is_paid {
            total_paid += row.transaction.amount;
        } else {
            total_received += row.transaction.amount;
        }
    }
    PartySummary {
        total_paid,
        total_received,
        net_balance: total_received - total_paid,
    }
}

pub fn summarize_expense(rows: &[ExpenseReportRow]) -> ExpenseSummary {
    let mut total_expense = Decimal::ZERO;
    for row in rows {
        total_expense += row.transaction.amount;
    }
    ExpenseSummary { total_expense }
}

// ============================================================================
// SUPERSESSION
// ============================================================================

/// Most-recent-filter-wins gate for abandoned report computations.
///
/// The caller registers a filter with `submit` when it starts computing and
/// offers the finished view to `accept`; a view whose filter is no longer
/// the latest is discarded. Supersession is by filter identity, not by
/// completion order, so a stale computation finishing late never overwrites
/// newer state.
#[derive(Debug, Default)]
pub struct ReportTracker {
    latest: Mutex<Option<ReportFilter>>,
}

impl ReportTracker {
    pub fn new() -> Self {
        ReportTracker::default()
    }

    /// Mark this filter as the one the user currently wants.
    pub fn submit(&self, filter: ReportFilter) {
        *self.latest.lock().unwrap() = Some(filter);
    }

    pub fn is_current(&self, filter: &ReportFilter) -> bool {
        self.latest.lock().unwrap().as_ref() == Some(filter)
    }

    /// Accept a finished view only if its filter is still the latest.
    pub fn accept(&self, view: ReportView) -> Option<ReportView> {
        if self.is_current(&view.filter) {
            Some(view)
        } else {
            log::debug!("discarding superseded report for {:?}", view.filter);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::{ExpenseTransactionInput, PartyTransactionInput};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn party(name: &str, town: &str) -> Party {
        Party::new(name.to_string(), town.to_string(), "user-1".to_string())
    }

    fn party_txn(party_id: &str, amount: Decimal, is_paid: bool, on: NaiveDate) -> PartyTransaction {
        PartyTransaction::new(
            PartyTransactionInput {
                party_id: party_id.to_string(),
                amount,
                description: None,
                is_paid,
                date: on,
            },
            "user-1".to_string(),
        )
    }

    fn expense_txn(head_id: &str, amount: Decimal, on: NaiveDate) -> ExpenseTransaction {
        ExpenseTransaction::new(
            ExpenseTransactionInput {
                expense_head_id: head_id.to_string(),
                party_id: "party-1".to_string(),
                amount,
                description: None,
                date: on,
            },
            "user-1".to_string(),
        )
    }

    #[test]
    fn test_party_report_scenario() {
        // Acme of Springfield: 100 given on Jan 5, 60 received on Jan 10.
        let acme = party("Acme", "Springfield");
        let txns = vec![
            party_txn(&acme.id, dec!(60), false, date(2024, 1, 10)),
            party_txn(&acme.id, dec!(100), true, date(2024, 1, 5)),
        ];

        let rows = join_party_transactions(txns, std::slice::from_ref(&acme));
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.party_label(), "Acme (Springfield)");
        }

        let summary = summarize_party(&rows);
        assert_eq!(summary.total_paid, dec!(100));
        assert_eq!(summary.total_received, dec!(60));
        assert_eq!(summary.net_balance, dec!(-40));
    }

    #[test]
    fn test_missing_reference_joins_to_unknown_and_still_counts() {
        let known = party("Acme", "Springfield");
        let txns = vec![
            party_txn(&known.id, dec!(30), true, date(2024, 1, 5)),
            party_txn("deleted-party", dec!(70), true, date(2024, 1, 6)),
        ];

        let rows = join_party_transactions(txns, std::slice::from_ref(&known));
        assert_eq!(rows.len(), 2);
        let unknown_row = rows
            .iter()
            .find(|r| r.transaction.party_id == "deleted-party")
            .unwrap();
        assert_eq!(unknown_row.party, None);
        assert_eq!(unknown_row.party_label(), "Unknown");

        let summary = summarize_party(&rows);
        assert_eq!(summary.total_paid, dec!(100));
    }

    #[test]
    fn test_expense_join_resolves_head_and_party() {
        let head = ExpenseHead::new(
            "Groceries".to_string(),
            crate::entities::ExpenseCategory::Need,
            "user-1".to_string(),
        );
        let acme = party("Acme", "Springfield");
        let mut txn = expense_txn(&head.id, dec!(45.50), date(2024, 2, 1));
        txn.party_id = acme.id.clone();

        let rows = join_expense_transactions(
            vec![txn, expense_txn("gone-head", dec!(4.50), date(2024, 2, 2))],
            std::slice::from_ref(&head),
            std::slice::from_ref(&acme),
        );

        assert_eq!(rows[0].head_label(), "Groceries");
        assert_eq!(rows[0].category_label(), "need");
        assert_eq!(rows[0].party.as_ref().unwrap().id, acme.id);
        assert_eq!(rows[1].head_label(), "Unknown");
        assert_eq!(rows[1].category_label(), "Unknown");

        let summary = summarize_expense(&rows);
        assert_eq!(summary.total_expense, dec!(50.00));
    }

    #[test]
    fn test_empty_rows_give_zero_totals() {
        let party_summary = summarize_party(&[]);
        assert_eq!(party_summary.total_paid, Decimal::ZERO);
        assert_eq!(party_summary.total_received, Decimal::ZERO);
        assert_eq!(party_summary.net_balance, Decimal::ZERO);

        let expense_summary = summarize_expense(&[]);
        assert_eq!(expense_summary.total_expense, Decimal::ZERO);
    }

    #[test]
    fn test_accumulation_has_no_float_drift() {
        // 0.10 added a thousand times must be exactly 100, and a mix of
        // fraction-prone cent values must sum to the exact cent.
        let acme = party("Acme", "Springfield");
        let txns: Vec<PartyTransaction> = (0..1000)
            .map(|i| {
                party_txn(
                    &acme.id,
                    dec!(0.10),
                    true,
                    date(2024, 1, 1 + (i % 28) as u32),
                )
            })
            .collect();
        let rows = join_party_transactions(txns, std::slice::from_ref(&acme));
        let summary = summarize_party(&rows);
        assert_eq!(summary.total_paid, dec!(100.00));

        let cents: Vec<PartyTransaction> = (0..1000)
            .map(|_| party_txn(&acme.id, dec!(0.03), false, date(2024, 1, 15)))
            .collect();
        let rows = join_party_transactions(cents, std::slice::from_ref(&acme));
        assert_eq!(summarize_party(&rows).total_received, dec!(30.00));
    }

    #[test]
    fn test_net_balance_identity_holds() {
        let acme = party("Acme", "Springfield");
        let txns = vec![
            party_txn(&acme.id, dec!(12.34), true, date(2024, 1, 1)),
            party_txn(&acme.id, dec!(56.78), false, date(2024, 1, 2)),
            party_txn(&acme.id, dec!(0.01), true, date(2024, 1, 3)),
        ];
        let rows = join_party_transactions(txns, std::slice::from_ref(&acme));
        let summary = summarize_party(&rows);
        assert_eq!(
            summary.net_balance,
            summary.total_received - summary.total_paid
        );
    }

    #[test]
    fn test_tracker_accepts_only_latest_filter() {
        let tracker = ReportTracker::new();
        let first = ReportFilter::new(ReportKind::Party, date(2024, 1, 1), date(2024, 1, 31));
        let second = ReportFilter::new(ReportKind::Combined, date(2024, 2, 1), date(2024, 2, 28));

        tracker.submit(first.clone());
        tracker.submit(second.clone());

        // The first computation finishes late; its result is discarded.
        let stale = ReportView {
            filter: first,
            party: None,
            expense: None,
        };
        assert!(tracker.accept(stale).is_none());

        let fresh = ReportView {
            filter: second,
            party: None,
            expense: None,
        };
        assert!(tracker.accept(fresh).is_some());
    }

    #[test]
    fn test_resubmitting_same_filter_is_still_current() {
        let tracker = ReportTracker::new();
        let filter = ReportFilter::new(ReportKind::Expense, date(2024, 1, 1), date(2024, 1, 31));
        tracker.submit(filter.clone());
        tracker.submit(filter.clone());
        assert!(tracker.is_current(&filter));
    }
}
