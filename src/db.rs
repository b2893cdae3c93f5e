//! Database setup for the application.

use std::path::Path;

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, account::create_account_table, category::create_category_table,
    ledger::create_bucket_tables, transaction::create_transaction_table,
};

/// Open the database at `path`, creating the file if it does not exist, and
/// apply the connection settings the application relies on.
///
/// # Errors
/// Returns an [Error::SqlError] if the database cannot be opened.
pub fn open(path: &Path) -> Result<Connection, Error> {
    let connection = Connection::open(path)?;

    connection.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;

    Ok(connection)
}

/// Create the application tables if they do not exist.
///
/// All tables are created in a single exclusive transaction so that a
/// half-initialized schema is never visible to other connections.
///
/// # Errors
/// Returns an [Error::SqlError] if a table cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_bucket_tables(&transaction)?;
    create_account_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
