//! Savings account tracking.
//!
//! Accounts sit outside the aggregation ledger: their balances are edited
//! directly and never contribute to the transaction buckets.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, database_id::AccountId};

/// The amount of money available in a savings or bank account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The name of the account.
    pub name: String,
    /// The balance in minor currency units.
    pub balance: i64,
    /// When the balance was updated.
    pub date: Date,
}

/// Create the account table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            balance INTEGER NOT NULL,
            date TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Map a database row to an Account.
pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    let id = row.get(0)?;
    let name = row.get(1)?;
    let balance = row.get(2)?;
    let date = row.get(3)?;

    Ok(Account {
        id,
        name,
        balance,
        date,
    })
}

/// Create a new account.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateAccountName] if an account named `name` already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_account(
    name: &str,
    balance: i64,
    date: Date,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(
            "INSERT INTO account (name, balance, date) VALUES (?1, ?2, ?3)
             RETURNING id, name, balance, date",
        )?
        .query_row((name, balance, date), map_row_to_account)
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateAccountName(name.to_owned()),
            error => error.into(),
        })
}

/// Retrieve every account, in name order.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_accounts(connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare("SELECT id, name, balance, date FROM account ORDER BY name COLLATE NOCASE ASC")?
        .query_map([], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::SqlError))
        .collect()
}

/// Set an account's balance and the date it was updated.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingAccount] if `id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_account(
    id: AccountId,
    balance: i64,
    date: Date,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(
            "UPDATE account SET balance = ?1, date = ?2 WHERE id = ?3
             RETURNING id, name, balance, date",
        )?
        .query_row((balance, date, id), map_row_to_account)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingAccount,
            error => error.into(),
        })
}

/// Delete an account.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingAccount] if `id` does not refer to a valid account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_account(id: AccountId, connection: &Connection) -> Result<(), Error> {
    let rows_deleted = connection.execute("DELETE FROM account WHERE id = ?1", (id,))?;

    if rows_deleted == 0 {
        return Err(Error::DeleteMissingAccount);
    }

    Ok(())
}

/// Get the total balance across all accounts.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_total_account_balance(connection: &Connection) -> Result<i64, Error> {
    let mut stmt = connection.prepare("SELECT COALESCE(SUM(balance), 0) FROM account")?;

    let total: i64 = stmt.query_row([], |row| row.get(0))?;

    Ok(total)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{Error, db::initialize};

    use super::{
        create_account, delete_account, get_accounts, get_total_account_balance, update_account,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_and_list_accounts() {
        let conn = get_test_connection();

        let savings = create_account("Savings", 150_000, date!(2024 - 01 - 01), &conn)
            .expect("Could not create account");
        let everyday = create_account("Everyday", 12_345, date!(2024 - 01 - 01), &conn)
            .expect("Could not create account");

        let got = get_accounts(&conn).expect("Could not list accounts");

        assert_eq!(got, vec![everyday, savings]);
    }

    #[test]
    fn create_fails_on_duplicate_name() {
        let conn = get_test_connection();
        create_account("Savings", 150_000, date!(2024 - 01 - 01), &conn).unwrap();

        let result = create_account("Savings", 0, date!(2024 - 02 - 01), &conn);

        assert_eq!(
            result,
            Err(Error::DuplicateAccountName("Savings".to_owned()))
        );
    }

    #[test]
    fn update_sets_balance_and_date() {
        let conn = get_test_connection();
        let account = create_account("Savings", 150_000, date!(2024 - 01 - 01), &conn).unwrap();

        let got = update_account(account.id, 175_000, date!(2024 - 02 - 01), &conn)
            .expect("Could not update account");

        assert_eq!(got.balance, 175_000);
        assert_eq!(got.date, date!(2024 - 02 - 01));
        assert_eq!(got.name, "Savings");
    }

    #[test]
    fn update_fails_on_invalid_id() {
        let conn = get_test_connection();

        let result = update_account(999, 0, date!(2024 - 01 - 01), &conn);

        assert_eq!(result, Err(Error::UpdateMissingAccount));
    }

    #[test]
    fn delete_removes_account() {
        let conn = get_test_connection();
        let account = create_account("Savings", 150_000, date!(2024 - 01 - 01), &conn).unwrap();

        delete_account(account.id, &conn).expect("Could not delete account");

        assert!(get_accounts(&conn).unwrap().is_empty());
    }

    #[test]
    fn delete_fails_on_invalid_id() {
        let conn = get_test_connection();

        assert_eq!(delete_account(999, &conn), Err(Error::DeleteMissingAccount));
    }

    #[test]
    fn total_balance_sums_all_accounts() {
        let conn = get_test_connection();
        create_account("Savings", 150_000, date!(2024 - 01 - 01), &conn).unwrap();
        create_account("Credit Card", -25_000, date!(2024 - 01 - 01), &conn).unwrap();

        let total = get_total_account_balance(&conn).expect("Could not get total");

        assert_eq!(total, 125_000);
    }

    #[test]
    fn total_balance_is_zero_with_no_accounts() {
        let conn = get_test_connection();

        assert_eq!(get_total_account_balance(&conn), Ok(0));
    }
}
