//! Transaction records and the read-side query facade.
//!
//! This module contains everything related to transaction records:
//! - The `Transaction` model and `TransactionBuilder` for describing writes
//! - Point lookups against the transaction table
//! - Read-side filtering, sorting and month grouping for presentation
//!
//! All writes to transaction records go through the
//! [ledger](crate::ledger) module so the aggregate buckets stay consistent
//! with the records.

mod core;
mod grouping;
mod query;

pub use self::core::{
    CategorySnapshot, Transaction, TransactionBuilder, count_transactions,
    create_transaction_table, get_transaction, map_transaction_row,
};
pub use grouping::{MonthGroup, group_transactions_by_month};
pub use query::{Period, TransactionFilter, TransactionSort, get_filtered_transactions};
