// SQLite-backed entity store
//
// Durable `EntityStore` implementation. Unlike the hosted document backend
// it stands in for, it enforces the guarded references (party transaction ->
// party, expense transaction -> expense head) with real foreign keys, so a
// delete that races a concurrent insert fails here instead of leaving a
// dangling reference. The expense transaction -> party reference is soft on
// purpose: deleting a party may leave expense rows joining to "unknown",
// matching the deletion guard's scope.
//
// Amounts are stored as canonical decimal text, never as REAL, so nothing
// is lost between write and read.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::entities::{EntityKind, ExpenseCategory, ExpenseHead, Party};
use crate::error::StoreError;
use crate::store::{EntityStore, TransactionQuery};
use crate::transactions::{
    ExpenseTransaction, ExpenseTransactionInput, PartyTransaction, PartyTransactionInput,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS parties (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    town        TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS expense_heads (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    category    TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS party_transactions (
    id          TEXT PRIMARY KEY,
    party_id    TEXT NOT NULL REFERENCES parties(id),
    amount      TEXT NOT NULL,
    description TEXT,
    is_paid     INTEGER NOT NULL,
    date        TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS expense_transactions (
    id              TEXT PRIMARY KEY,
    expense_head_id TEXT NOT NULL REFERENCES expense_heads(id),
    party_id        TEXT NOT NULL,
    amount          TEXT NOT NULL,
    description     TEXT,
    date            TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_party_txns_user_date
    ON party_transactions(user_id, date);
CREATE INDEX IF NOT EXISTS idx_expense_txns_user_date
    ON expense_transactions(user_id, date);
";

/// `EntityStore` on a local SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(map_sqlite)?;
        Self::from_connection(conn)
    }

    /// Fresh private database; used by tests and throwaway demos.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqlite)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(map_sqlite)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(map_sqlite)?;
        conn.execute_batch(SCHEMA).map_err(map_sqlite)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }
}

fn map_sqlite(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, message)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Constraint(
                message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string()),
            )
        }
        _ => StoreError::Unavailable(e.to_string()),
    }
}

/// Fixed-width UTC timestamp so text ordering matches time ordering.
fn encode_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_instant(column: usize, text: String) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn decode_date(column: usize, text: String) -> Result<NaiveDate, rusqlite::Error> {
    text.parse::<NaiveDate>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn decode_amount(column: usize, text: String) -> Result<Decimal, rusqlite::Error> {
    text.parse::<Decimal>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// Owner of a record, if the record exists at all.
fn owner_of(conn: &Connection, table: &str, id: &str) -> Result<Option<String>, StoreError> {
    conn.query_row(
        &format!("SELECT user_id FROM {table} WHERE id = ?1"),
        params![id],
        |row| row.get(0),
    )
    .optional()
    .map_err(map_sqlite)
}

/// Check a foreign reference points at a record owned by the same user.
fn check_reference(
    conn: &Connection,
    table: &str,
    id: &str,
    user_id: &str,
    what: &str,
) -> Result<(), StoreError> {
    match owner_of(conn, table, id)? {
        Some(owner) if owner == user_id => Ok(()),
        _ => Err(StoreError::Constraint(format!(
            "{what} {id} does not exist for this user"
        ))),
    }
}

fn check_owned(
    conn: &Connection,
    table: &str,
    kind: EntityKind,
    id: &str,
    user_id: &str,
) -> Result<(), StoreError> {
    match owner_of(conn, table, id)? {
        Some(owner) if owner == user_id => Ok(()),
        Some(_) => Err(StoreError::Unauthorized {
            user_id: user_id.to_string(),
        }),
        None => Err(StoreError::NotFound {
            kind,
            id: id.to_string(),
        }),
    }
}

/// Append optional range/dimension clauses and return the parameter list.
/// All bound values are TEXT, ISO dates included, so the date comparison in
/// SQL is plain string comparison.
fn transaction_filter(
    user_id: &str,
    query: &TransactionQuery,
    dimension_column: &str,
    sql: &mut String,
) -> Vec<String> {
    let mut bind = vec![user_id.to_string()];
    if let Some(from) = query.from {
        bind.push(from.to_string());
        sql.push_str(&format!(" AND date >= ?{}", bind.len()));
    }
    if let Some(to) = query.to {
        bind.push(to.to_string());
        sql.push_str(&format!(" AND date <= ?{}", bind.len()));
    }
    if let Some(dimension_id) = &query.dimension_id {
        bind.push(dimension_id.clone());
        sql.push_str(&format!(" AND {dimension_column} = ?{}", bind.len()));
    }
    sql.push_str(" ORDER BY date DESC, created_at DESC, id ASC");
    bind
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn list_parties(&self, user_id: &str) -> Result<Vec<Party>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, town, user_id, created_at
                 FROM parties WHERE user_id = ?1 ORDER BY name ASC, id ASC",
            )
            .map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(Party {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    town: row.get(2)?,
                    user_id: row.get(3)?,
                    created_at: decode_instant(4, row.get(4)?)?,
                })
            })
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    async fn list_expense_heads(&self, user_id: &str) -> Result<Vec<ExpenseHead>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, category, user_id, created_at
                 FROM expense_heads WHERE user_id = ?1 ORDER BY name ASC, id ASC",
            )
            .map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                let raw: String = row.get(2)?;
                let category = ExpenseCategory::parse(&raw).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        Type::Text,
                        format!("unknown expense category: {raw}").into(),
                    )
                })?;
                Ok(ExpenseHead {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category,
                    user_id: row.get(3)?,
                    created_at: decode_instant(4, row.get(4)?)?,
                })
            })
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    async fn list_party_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<PartyTransaction>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, party_id, amount, description, is_paid, date, user_id, created_at
             FROM party_transactions WHERE user_id = ?1",
        );
        let bind = transaction_filter(user_id, query, "party_id", &mut sql);
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params_from_iter(bind.iter()), |row| {
                Ok(PartyTransaction {
                    id: row.get(0)?,
                    party_id: row.get(1)?,
                    amount: decode_amount(2, row.get(2)?)?,
                    description: row.get(3)?,
                    is_paid: row.get(4)?,
                    date: decode_date(5, row.get(5)?)?,
                    user_id: row.get(6)?,
                    created_at: decode_instant(7, row.get(7)?)?,
                })
            })
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    async fn list_expense_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<ExpenseTransaction>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, expense_head_id, party_id, amount, description, date, user_id, created_at
             FROM expense_transactions WHERE user_id = ?1",
        );
        let bind = transaction_filter(user_id, query, "expense_head_id", &mut sql);
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params_from_iter(bind.iter()), |row| {
                Ok(ExpenseTransaction {
                    id: row.get(0)?,
                    expense_head_id: row.get(1)?,
                    party_id: row.get(2)?,
                    amount: decode_amount(3, row.get(3)?)?,
                    description: row.get(4)?,
                    date: decode_date(5, row.get(5)?)?,
                    user_id: row.get(6)?,
                    created_at: decode_instant(7, row.get(7)?)?,
                })
            })
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    async fn create_party(
        &self,
        user_id: &str,
        name: &str,
        town: &str,
    ) -> Result<Party, StoreError> {
        let conn = self.conn.lock().unwrap();
        let party = Party::new(name.to_string(), town.to_string(), user_id.to_string());
        conn.execute(
            "INSERT INTO parties (id, name, town, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                party.id,
                party.name,
                party.town,
                party.user_id,
                encode_instant(party.created_at)
            ],
        )
        .map_err(map_sqlite)?;
        Ok(party)
    }

    async fn create_expense_head(
        &self,
        user_id: &str,
        name: &str,
        category: ExpenseCategory,
    ) -> Result<ExpenseHead, StoreError> {
        let conn = self.conn.lock().unwrap();
        let head = ExpenseHead::new(name.to_string(), category, user_id.to_string());
        conn.execute(
            "INSERT INTO expense_heads (id, name, category, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                head.id,
                head.name,
                head.category.as_str(),
                head.user_id,
                encode_instant(head.created_at)
            ],
        )
        .map_err(map_sqlite)?;
        Ok(head)
    }

    async fn create_party_transaction(
        &self,
        user_id: &str,
        input: PartyTransactionInput,
    ) -> Result<PartyTransaction, StoreError> {
        let conn = self.conn.lock().unwrap();
        check_reference(&conn, "parties", &input.party_id, user_id, "party")?;
        let txn = PartyTransaction::new(input, user_id.to_string());
        conn.execute(
            "INSERT INTO party_transactions
                 (id, party_id, amount, description, is_paid, date, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                txn.id,
                txn.party_id,
                txn.amount.to_string(),
                txn.description,
                txn.is_paid,
                txn.date.to_string(),
                txn.user_id,
                encode_instant(txn.created_at)
            ],
        )
        .map_err(map_sqlite)?;
        Ok(txn)
    }

    async fn create_expense_transaction(
        &self,
        user_id: &str,
        input: ExpenseTransactionInput,
    ) -> Result<ExpenseTransaction, StoreError> {
        let conn = self.conn.lock().unwrap();
        check_reference(
            &conn,
            "expense_heads",
            &input.expense_head_id,
            user_id,
            "expense head",
        )?;
        check_reference(&conn, "parties", &input.party_id, user_id, "party")?;
        let txn = ExpenseTransaction::new(input, user_id.to_string());
        conn.execute(
            "INSERT INTO expense_transactions
                 (id, expense_head_id, party_id, amount, description, date, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                txn.id,
                txn.expense_head_id,
                txn.party_id,
                txn.amount.to_string(),
                txn.description,
                txn.date.to_string(),
                txn.user_id,
                encode_instant(txn.created_at)
            ],
        )
        .map_err(map_sqlite)?;
        Ok(txn)
    }

    async fn delete_party(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        check_owned(&conn, "parties", EntityKind::Party, id, user_id)?;
        // The foreign key from party_transactions rejects this delete while
        // references exist.
        conn.execute("DELETE FROM parties WHERE id = ?1", params![id])
            .map_err(map_sqlite)?;
        Ok(())
    }

    async fn delete_expense_head(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        check_owned(&conn, "expense_heads", EntityKind::ExpenseHead, id, user_id)?;
        conn.execute("DELETE FROM expense_heads WHERE id = ?1", params![id])
            .map_err(map_sqlite)?;
        Ok(())
    }

    async fn delete_party_transaction(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        check_owned(
            &conn,
            "party_transactions",
            EntityKind::PartyTransaction,
            id,
            user_id,
        )?;
        conn.execute("DELETE FROM party_transactions WHERE id = ?1", params![id])
            .map_err(map_sqlite)?;
        Ok(())
    }

    async fn delete_expense_transaction(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        check_owned(
            &conn,
            "expense_transactions",
            EntityKind::ExpenseTransaction,
            id,
            user_id,
        )?;
        conn.execute(
            "DELETE FROM expense_transactions WHERE id = ?1",
            params![id],
        )
        .map_err(map_sqlite)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const USER: &str = "user-1";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip_party_transaction() {
        let store = SqliteStore::open_in_memory().unwrap();
        let party = store.create_party(USER, "Acme", "Springfield").await.unwrap();
        let created = store
            .create_party_transaction(
                USER,
                PartyTransactionInput {
                    party_id: party.id.clone(),
                    amount: dec!(45.50),
                    description: Some("bricks".to_string()),
                    is_paid: true,
                    date: date(2024, 1, 5),
                },
            )
            .await
            .unwrap();

        let listed = store
            .list_party_transactions(USER, &TransactionQuery::all())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], created);
        // Amount survives as an exact decimal, not a float.
        assert_eq!(listed[0].amount, dec!(45.50));
        assert_eq!(listed[0].amount.to_string(), "45.50");
    }

    #[tokio::test]
    async fn test_roundtrip_expense_head_category() {
        let store = SqliteStore::open_in_memory().unwrap();
        for category in ExpenseCategory::ALL {
            store
                .create_expense_head(USER, category.as_str(), category)
                .await
                .unwrap();
        }
        let heads = store.list_expense_heads(USER).await.unwrap();
        assert_eq!(heads.len(), 4);
        for head in heads {
            assert_eq!(head.name, head.category.as_str());
        }
    }

    #[tokio::test]
    async fn test_range_and_dimension_filter() {
        let store = SqliteStore::open_in_memory().unwrap();
        let acme = store.create_party(USER, "Acme", "Springfield").await.unwrap();
        let zenith = store.create_party(USER, "Zenith", "Pune").await.unwrap();
        for (party_id, day) in [(&acme.id, 5), (&acme.id, 20), (&zenith.id, 10)] {
            store
                .create_party_transaction(
                    USER,
                    PartyTransactionInput {
                        party_id: party_id.to_string(),
                        amount: dec!(10),
                        description: None,
                        is_paid: false,
                        date: date(2024, 1, day),
                    },
                )
                .await
                .unwrap();
        }

        let txns = store
            .list_party_transactions(
                USER,
                &TransactionQuery::range(date(2024, 1, 1), date(2024, 1, 15))
                    .with_dimension(Some(acme.id.clone())),
            )
            .await
            .unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].date, date(2024, 1, 5));
    }

    #[tokio::test]
    async fn test_transactions_ordered_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let party = store.create_party(USER, "Acme", "Springfield").await.unwrap();
        for day in [5, 10, 7] {
            store
                .create_party_transaction(
                    USER,
                    PartyTransactionInput {
                        party_id: party.id.clone(),
                        amount: dec!(1),
                        description: None,
                        is_paid: true,
                        date: date(2024, 1, day),
                    },
                )
                .await
                .unwrap();
        }
        let txns = store
            .list_party_transactions(USER, &TransactionQuery::all())
            .await
            .unwrap();
        let days: Vec<u32> = txns
            .iter()
            .map(|t| chrono::Datelike::day(&t.date))
            .collect();
        assert_eq!(days, vec![10, 7, 5]);
    }

    #[tokio::test]
    async fn test_create_transaction_rejects_unknown_party() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store
            .create_party_transaction(
                USER,
                PartyTransactionInput {
                    party_id: "ghost".to_string(),
                    amount: dec!(10),
                    description: None,
                    is_paid: true,
                    date: date(2024, 1, 5),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_foreign_key_blocks_referenced_party_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let party = store.create_party(USER, "Acme", "Springfield").await.unwrap();
        store
            .create_party_transaction(
                USER,
                PartyTransactionInput {
                    party_id: party.id.clone(),
                    amount: dec!(10),
                    description: None,
                    is_paid: true,
                    date: date(2024, 1, 5),
                },
            )
            .await
            .unwrap();

        let result = store.delete_party(USER, &party.id).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert_eq!(store.list_parties(USER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_party_with_only_expense_references_can_be_deleted() {
        let store = SqliteStore::open_in_memory().unwrap();
        let party = store.create_party(USER, "Acme", "Springfield").await.unwrap();
        let head = store
            .create_expense_head(USER, "Groceries", ExpenseCategory::Need)
            .await
            .unwrap();
        store
            .create_expense_transaction(
                USER,
                ExpenseTransactionInput {
                    expense_head_id: head.id.clone(),
                    party_id: party.id.clone(),
                    amount: dec!(45.50),
                    description: None,
                    date: date(2024, 2, 1),
                },
            )
            .await
            .unwrap();

        store.delete_party(USER, &party.id).await.unwrap();

        // The expense row survives with a now-dangling party reference.
        let txns = store
            .list_expense_transactions(USER, &TransactionQuery::all())
            .await
            .unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].party_id, party.id);
    }

    #[tokio::test]
    async fn test_delete_unknown_and_unauthorized() {
        let store = SqliteStore::open_in_memory().unwrap();
        let theirs = store.create_party("user-2", "Theirs", "There").await.unwrap();

        assert!(matches!(
            store.delete_party(USER, "ghost").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_party(USER, &theirs.id).await,
            Err(StoreError::Unauthorized { .. })
        ));
    }
}
