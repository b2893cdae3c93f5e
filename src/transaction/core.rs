//! Defines the core data model and database queries for transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    category::{Category, CategoryName},
    database_id::{CategoryId, TransactionId},
};

// ============================================================================
// MODELS
// ============================================================================

/// A copy of the category details a transaction was filed under.
///
/// The copy is denormalized onto the transaction row for fast reads. It can
/// drift from the category record after a rename or recolor until
/// [propagate_category_details](crate::category::propagate_category_details)
/// pushes the current details back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySnapshot {
    /// The ID of the category record the copy was taken from.
    pub id: CategoryId,
    /// The category name at the time the transaction was last written.
    pub name: CategoryName,
    /// The category color at the time the transaction was last written.
    pub color: String,
}

impl CategorySnapshot {
    /// Take a snapshot of the current details of `category`.
    pub fn of(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            color: category.color.clone(),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// Amounts are in minor currency units (e.g. cents) and the sign encodes the
/// kind: zero or more is income, below zero is an expense.
///
/// To create or edit a `Transaction`, pass a [TransactionBuilder] to
/// [upsert_transaction](crate::ledger::upsert_transaction) so the aggregate
/// buckets stay in step with the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// A text description of what the transaction was for.
    pub memo: String,
    /// The amount of money spent or earned, in minor currency units.
    pub amount: i64,
    /// The category details the transaction was filed under.
    pub category: CategorySnapshot,
    /// When the transaction happened.
    ///
    /// Decides which month bucket the transaction contributes to.
    pub date: Date,
    /// When the record was last written.
    pub last_modified: OffsetDateTime,
    /// Whether the transaction is in the trash.
    ///
    /// Trashed transactions do not contribute to any aggregate bucket.
    pub deleted: bool,
}

impl Transaction {
    /// Describe a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        amount: i64,
        date: Date,
        memo: &str,
        category: CategorySnapshot,
    ) -> TransactionBuilder {
        TransactionBuilder {
            id: None,
            amount,
            date,
            memo: memo.to_owned(),
            category,
        }
    }
}

/// The target state of a transaction for
/// [upsert_transaction](crate::ledger::upsert_transaction).
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionBuilder {
    /// The ID of the transaction to create or update.
    ///
    /// `None` creates a new record with a fresh ID.
    pub id: Option<TransactionId>,
    /// The amount of money spent or earned, in minor currency units.
    pub amount: i64,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub memo: String,
    /// The category to file the transaction under.
    pub category: CategorySnapshot,
}

impl TransactionBuilder {
    /// Target the transaction with `id` instead of creating a new record.
    pub fn id(mut self, id: TransactionId) -> Self {
        self.id = Some(id);
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Retrieve a transaction from the database by its `id`.
///
/// Trashed transactions are returned too; check the `deleted` flag.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, memo, amount, category_id, category_name, category_color, date, last_modified, deleted
             FROM \"transaction\" WHERE id = :id",
        )?
        .query_one(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Get the number of live (non-trashed) transactions in the database.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE deleted = 0;",
            [],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// The category columns are a denormalized snapshot, not a foreign key: a
/// transaction must stay writable even when its category record has been
/// trashed or is missing.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                memo TEXT NOT NULL,
                amount INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                category_name TEXT NOT NULL,
                category_color TEXT NOT NULL,
                date TEXT NOT NULL,
                last_modified TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    // Composite index used by the filtered listing queries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_date_category ON \"transaction\"(date, category_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let memo = row.get(1)?;
    let amount = row.get(2)?;
    let category_id = row.get(3)?;
    let category_name: String = row.get(4)?;
    let category_color = row.get(5)?;
    let date = row.get(6)?;
    let last_modified = row.get(7)?;
    let deleted = row.get(8)?;

    Ok(Transaction {
        id,
        memo,
        amount,
        category: CategorySnapshot {
            id: category_id,
            name: CategoryName::new_unchecked(&category_name),
            color: category_color,
        },
        date,
        last_modified,
        deleted,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::{OffsetDateTime, macros::date};

    use crate::{Error, db::initialize};

    use super::{count_transactions, get_transaction};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn insert_raw_transaction(conn: &Connection, amount: i64, memo: &str, deleted: bool) {
        conn.execute(
            "INSERT INTO \"transaction\"
             (memo, amount, category_id, category_name, category_color, date, last_modified, deleted)
             VALUES (?1, ?2, 1, 'Groceries', '#4CAF50', ?3, ?4, ?5)",
            (
                memo,
                amount,
                date!(2024 - 03 - 05),
                OffsetDateTime::UNIX_EPOCH,
                deleted,
            ),
        )
        .unwrap();
    }

    #[test]
    fn get_transaction_round_trips() {
        let conn = get_test_connection();
        insert_raw_transaction(&conn, -500, "weekly shop", false);

        let got = get_transaction(1, &conn).expect("Could not get transaction");

        assert_eq!(got.id, 1);
        assert_eq!(got.amount, -500);
        assert_eq!(got.memo, "weekly shop");
        assert_eq!(got.category.id, 1);
        assert_eq!(got.category.name.as_ref(), "Groceries");
        assert_eq!(got.date, date!(2024 - 03 - 05));
        assert!(!got.deleted);
    }

    #[test]
    fn get_transaction_fails_on_invalid_id() {
        let conn = get_test_connection();

        let result = get_transaction(999, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn count_ignores_trashed_transactions() {
        let conn = get_test_connection();
        insert_raw_transaction(&conn, -500, "weekly shop", false);
        insert_raw_transaction(&conn, 1200, "refund", false);
        insert_raw_transaction(&conn, -300, "mistake", true);

        let got = count_transactions(&conn).expect("Could not get count");

        assert_eq!(got, 2);
    }
}
