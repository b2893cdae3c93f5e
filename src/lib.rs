//! Tallybook is a personal finance tracker that keeps incremental running
//! totals of your money.
//!
//! Users record signed-amount transactions (income or expense) filed under a
//! category, and track savings account balances. The heart of the library is
//! the [ledger] module: it maintains net, income, expense and per-category
//! sums for an all-time bucket and for each calendar month, and keeps those
//! sums consistent with the live set of transactions as records are created,
//! edited, moved to the trash and restored.

#![warn(missing_docs)]

pub mod account;
pub mod category;
mod database_id;
pub mod db;
pub mod ledger;
pub mod transaction;

pub use database_id::{AccountId, CategoryId, DatabaseId, TransactionId};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// A string other than "income" or "expense" was used as a category kind.
    #[error("\"{0}\" is not a valid category kind, expected \"income\" or \"expense\"")]
    InvalidCategoryKind(String),

    /// The requested resource was not found.
    ///
    /// Callers should check that the parameters (e.g., ID) are correct and
    /// that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    ///
    /// The ledger operations retry on this error internally; if it still
    /// reaches the caller, the database stayed contended through every
    /// attempt and the operation had no effect.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The specified account name already exists in the database.
    #[error("the account \"{0}\" already exists in the database")]
    DuplicateAccountName(String),

    /// Tried to update an account that does not exist
    #[error("tried to update an account that is not in the database")]
    UpdateMissingAccount,

    /// Tried to delete an account that does not exist
    #[error("tried to delete an account that is not in the database")]
    DeleteMissingAccount,

    /// Tried to update a category that does not exist
    #[error("tried to update a category that is not in the database")]
    UpdateMissingCategory,

    /// Tried to move a category to the trash that does not exist
    #[error("tried to move a category to the trash that is not in the database")]
    TrashMissingCategory,

    /// Tried to edit a transaction that is in the trash.
    ///
    /// A trashed transaction does not contribute to any aggregate bucket, so
    /// editing it in place has no previous contribution to reconcile against.
    /// Restore it first.
    #[error("tried to edit a transaction that is in the trash")]
    EditTrashedTransaction,

    /// Tried to move a transaction to the trash that is already there
    #[error("tried to move a transaction to the trash that is already there")]
    TrashTrashedTransaction,

    /// Tried to restore a transaction that is not in the trash
    #[error("tried to restore a transaction that is not in the trash")]
    RestoreLiveTransaction,

    /// Tried to permanently delete a transaction that is not in the trash
    #[error("tried to permanently delete a transaction that is not in the trash")]
    PurgeLiveTransaction,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.code == rusqlite::ErrorCode::DatabaseBusy
                    || sql_error.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                Error::DatabaseLockError
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
