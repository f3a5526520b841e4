// Demo binary: seeds a store with sample data and walks through the core
// flows, printing the combined report as a table and as JSON.
//
// With no argument the data lives in an in-memory SQLite database; pass a
// path to persist it.

use std::env;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use hisab::{
    ExpenseCategory, ExpenseTransactionInput, FinanceService, IdentityProvider,
    PartyTransactionInput, ReportFilter, ReportKind, ReportView, SqliteStore, StaticIdentity,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let store = match env::args().nth(1) {
        Some(path) => SqliteStore::open(&path)?,
        None => SqliteStore::open_in_memory()?,
    };
    let identity = StaticIdentity::new();
    identity.sign_in("owner@example.com").await?;
    let service = FinanceService::new(store, identity);

    println!("hisab v{} - personal finance tracker demo", hisab::VERSION);
    println!("=================================================");

    // Seed entities
    let acme = service.create_party("Acme Traders", "Springfield").await?;
    let zenith = service.create_party("Zenith Supply", "Pune").await?;
    let groceries = service
        .create_expense_head("Groceries", ExpenseCategory::Need)
        .await?;
    let dining = service
        .create_expense_head("Dining Out", ExpenseCategory::Wants)
        .await?;
    println!("\nSeeded {} parties, 2 expense heads", service.list_parties().await?.len());

    // Seed transactions across January 2024
    let entries = [
        (&acme.id, "100", true, date(2024, 1, 5), Some("advance for steel")),
        (&acme.id, "60", false, date(2024, 1, 10), Some("partial refund")),
        (&zenith.id, "250.75", true, date(2024, 1, 18), None),
    ];
    for (party_id, amount, is_paid, on, note) in entries {
        service
            .create_party_transaction(PartyTransactionInput {
                party_id: party_id.clone(),
                amount: amount.parse::<Decimal>()?,
                description: note.map(str::to_string),
                is_paid,
                date: on,
            })
            .await?;
    }
    service
        .create_expense_transaction(ExpenseTransactionInput {
            expense_head_id: groceries.id.clone(),
            party_id: zenith.id.clone(),
            amount: "45.50".parse()?,
            description: Some("weekly market run".to_string()),
            date: date(2024, 1, 12),
        })
        .await?;
    let dining_expense = service
        .create_expense_transaction(ExpenseTransactionInput {
            expense_head_id: dining.id.clone(),
            party_id: acme.id.clone(),
            amount: "32.00".parse()?,
            description: None,
            date: date(2024, 1, 20),
        })
        .await?;

    // Deletion guard in action
    println!("\nDeletion guard:");
    match service.delete_party(&acme.id).await {
        Err(e) => println!("  delete {} refused: {}", acme.display_label(), e),
        Ok(()) => println!("  delete {} succeeded unexpectedly", acme.display_label()),
    }

    // Combined report for January
    let filter = ReportFilter::new(ReportKind::Combined, date(2024, 1, 1), date(2024, 1, 31));
    let view = service.build_report(&filter).await?;
    print_report(&view);

    println!("\nJSON:");
    println!("{}", serde_json::to_string_pretty(&report_json(&view))?);

    // Listings and cleanup
    let party_txns = service.list_party_transactions().await?;
    let heads = service.list_expense_heads().await?;
    println!(
        "\nOn file: {} party transactions, {} expense heads",
        party_txns.len(),
        heads.len()
    );

    // An expense head frees up once its transactions are removed
    match service.delete_expense_head(&dining.id).await {
        Err(e) => println!("delete {} refused: {}", dining.name, e),
        Ok(()) => println!("delete {} succeeded unexpectedly", dining.name),
    }
    service.delete_expense_transaction(&dining_expense.id).await?;
    service.delete_expense_head(&dining.id).await?;
    println!("deleted {} after removing its transaction", dining.name);

    // A party held only by a soft expense reference can go once its own
    // transactions are removed; the groceries row then shows Unknown.
    for txn in party_txns.iter().filter(|t| t.party_id == zenith.id) {
        service.delete_party_transaction(&txn.id).await?;
    }
    service.delete_party(&zenith.id).await?;
    println!("deleted {}", zenith.display_label());

    let remaining = service.list_expense_transactions().await?;
    println!("{} expense transaction(s) remain", remaining.len());

    Ok(())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid demo date")
}

fn print_report(view: &ReportView) {
    println!("\nCombined report {} .. {}", view.filter.from, view.filter.to);

    if let Some(section) = view.party_section() {
        println!("\n  Party transactions:");
        println!("  {:<12} {:<24} {:>10}  {}", "date", "party", "amount", "direction");
        for row in &section.rows {
            println!(
                "  {:<12} {:<24} {:>10}  {}",
                row.transaction.date.to_string(),
                row.party_label(),
                row.transaction.amount.to_string(),
                if row.transaction.is_paid { "paid" } else { "received" },
            );
        }
        println!(
            "  total paid {}  total received {}  net balance {}",
            section.summary.total_paid, section.summary.total_received, section.summary.net_balance,
        );
    }

    if let Some(section) = view.expense_section() {
        println!("\n  Expense transactions:");
        println!("  {:<12} {:<16} {:<12} {:<24} {:>10}", "date", "head", "category", "party", "amount");
        for row in &section.rows {
            println!(
                "  {:<12} {:<16} {:<12} {:<24} {:>10}",
                row.transaction.date.to_string(),
                row.head_label(),
                row.category_label(),
                row.party_label(),
                row.transaction.amount.to_string(),
            );
        }
        println!("  total expense {}", section.summary.total_expense);
    }

    for error in view.section_errors() {
        println!("  section unavailable: {error}");
    }
}

fn report_json(view: &ReportView) -> serde_json::Value {
    serde_json::json!({
        "from": view.filter.from,
        "to": view.filter.to,
        "party": view.party_section().map(|s| serde_json::json!({
            "rows": s.rows,
            "summary": s.summary,
        })),
        "expense": view.expense_section().map(|s| serde_json::json!({
            "rows": s.rows,
            "summary": s.summary,
        })),
    })
}
