//! The four atomic operations that keep transaction records and aggregate
//! buckets in step.
//!
//! Every operation reads and writes inside one immediate database
//! transaction: the read of the previous record state happens in the same
//! transaction as the bucket increments and the record write, so two
//! concurrent operations on the same transaction ID can never both compute
//! deltas against a stale previous state. On contention the whole operation
//! rolls back and is retried from scratch.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::TransactionId,
    transaction::{Transaction, TransactionBuilder, get_transaction, map_transaction_row},
};

use super::{
    bucket::{BucketScope, BucketTotals, apply_category_delta, apply_totals_delta},
    retry::with_retry,
};

/// Create or update a transaction and reconcile the aggregate buckets, as a
/// single atomic unit.
///
/// A builder without an ID creates a fresh record. A builder with an ID
/// updates the record with that ID, or creates it if no record with that ID
/// exists.
///
/// # Errors
/// This function will return a:
/// - [Error::EditTrashedTransaction] if the targeted transaction is in the
///   trash (restore it first),
/// - [Error::DatabaseLockError] if the database stayed contended through
///   every retry,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn upsert_transaction(
    builder: &TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    with_retry(|| {
        let sql_transaction =
            SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

        let prev = match builder.id {
            Some(id) => match get_transaction(id, &sql_transaction) {
                Ok(prev) => Some(prev),
                Err(Error::NotFound) => None,
                Err(error) => return Err(error),
            },
            None => None,
        };

        if prev.as_ref().is_some_and(|prev| prev.deleted) {
            return Err(Error::EditTrashedTransaction);
        }

        let new_contribution = BucketTotals::contribution(builder.amount);
        let new_month = BucketScope::month_of(builder.date);

        match &prev {
            Some(prev) => {
                let prev_contribution = BucketTotals::contribution(prev.amount);
                let prev_month = BucketScope::month_of(prev.date);

                if prev_month == new_month {
                    apply_totals_delta(
                        &new_month,
                        new_contribution.minus(prev_contribution),
                        &sql_transaction,
                    )?;
                } else {
                    apply_totals_delta(&prev_month, prev_contribution.negated(), &sql_transaction)?;
                    apply_totals_delta(&new_month, new_contribution, &sql_transaction)?;
                }

                apply_totals_delta(
                    &BucketScope::AllTime,
                    new_contribution.minus(prev_contribution),
                    &sql_transaction,
                )?;

                // A move between categories is two independent updates, an
                // edit within one category a single combined delta.
                if prev.category.id == builder.category.id && prev_month == new_month {
                    apply_category_delta(
                        &new_month,
                        builder.category.id,
                        builder.amount - prev.amount,
                        &sql_transaction,
                    )?;
                } else {
                    apply_category_delta(
                        &prev_month,
                        prev.category.id,
                        -prev.amount,
                        &sql_transaction,
                    )?;
                    apply_category_delta(
                        &new_month,
                        builder.category.id,
                        builder.amount,
                        &sql_transaction,
                    )?;
                }

                if prev.category.id == builder.category.id {
                    apply_category_delta(
                        &BucketScope::AllTime,
                        builder.category.id,
                        builder.amount - prev.amount,
                        &sql_transaction,
                    )?;
                } else {
                    apply_category_delta(
                        &BucketScope::AllTime,
                        prev.category.id,
                        -prev.amount,
                        &sql_transaction,
                    )?;
                    apply_category_delta(
                        &BucketScope::AllTime,
                        builder.category.id,
                        builder.amount,
                        &sql_transaction,
                    )?;
                }
            }
            None => {
                apply_totals_delta(&new_month, new_contribution, &sql_transaction)?;
                apply_totals_delta(&BucketScope::AllTime, new_contribution, &sql_transaction)?;
                apply_category_delta(
                    &new_month,
                    builder.category.id,
                    builder.amount,
                    &sql_transaction,
                )?;
                apply_category_delta(
                    &BucketScope::AllTime,
                    builder.category.id,
                    builder.amount,
                    &sql_transaction,
                )?;
            }
        }

        let transaction = write_transaction_record(builder, &sql_transaction)?;

        sql_transaction.commit()?;

        Ok(transaction)
    })
}

/// Move a transaction to the trash and remove its contribution from every
/// bucket it is counted in, as a single atomic unit.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - [Error::TrashTrashedTransaction] if it is already in the trash,
/// - [Error::DatabaseLockError] if the database stayed contended through
///   every retry,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn move_to_trash(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    with_retry(|| {
        let sql_transaction =
            SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

        let transaction = get_transaction(id, &sql_transaction)?;

        if transaction.deleted {
            return Err(Error::TrashTrashedTransaction);
        }

        remove_contribution(&transaction, &sql_transaction)?;

        let transaction = set_deleted_flag(id, true, &sql_transaction)?;

        sql_transaction.commit()?;

        Ok(transaction)
    })
}

/// Restore a transaction from the trash and re-add its contribution to the
/// buckets it was removed from, as a single atomic unit.
///
/// The amount, category and date are used exactly as stored on the trashed
/// record; a record is never mutated while it sits in the trash, so restoring
/// returns every touched bucket to its pre-trash value.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - [Error::RestoreLiveTransaction] if the transaction is not in the trash,
/// - [Error::DatabaseLockError] if the database stayed contended through
///   every retry,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn restore_from_trash(
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    with_retry(|| {
        let sql_transaction =
            SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

        let transaction = get_transaction(id, &sql_transaction)?;

        if !transaction.deleted {
            return Err(Error::RestoreLiveTransaction);
        }

        add_contribution(&transaction, &sql_transaction)?;

        let transaction = set_deleted_flag(id, false, &sql_transaction)?;

        sql_transaction.commit()?;

        Ok(transaction)
    })
}

/// Remove a trashed transaction's record for good.
///
/// The record stopped contributing to the buckets when it was trashed, so no
/// bucket is touched here.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - [Error::PurgeLiveTransaction] if the transaction is not in the trash
///   (trash it first),
/// - [Error::DatabaseLockError] if the database stayed contended through
///   every retry,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_permanently(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    with_retry(|| {
        let sql_transaction =
            SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

        let transaction = get_transaction(id, &sql_transaction)?;

        if !transaction.deleted {
            return Err(Error::PurgeLiveTransaction);
        }

        sql_transaction.execute("DELETE FROM \"transaction\" WHERE id = ?1", (id,))?;

        sql_transaction.commit()?;

        Ok(())
    })
}

/// Subtract `transaction`'s contribution from its month and all-time buckets.
/// Runs inside the caller's database transaction.
fn remove_contribution(
    transaction: &Transaction,
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    let contribution = BucketTotals::contribution(transaction.amount);
    let month = BucketScope::month_of(transaction.date);

    apply_totals_delta(&month, contribution.negated(), connection)?;
    apply_totals_delta(&BucketScope::AllTime, contribution.negated(), connection)?;
    apply_category_delta(&month, transaction.category.id, -transaction.amount, connection)?;
    apply_category_delta(
        &BucketScope::AllTime,
        transaction.category.id,
        -transaction.amount,
        connection,
    )?;

    Ok(())
}

/// Add `transaction`'s contribution to its month and all-time buckets. Runs
/// inside the caller's database transaction.
fn add_contribution(
    transaction: &Transaction,
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    let contribution = BucketTotals::contribution(transaction.amount);
    let month = BucketScope::month_of(transaction.date);

    apply_totals_delta(&month, contribution, connection)?;
    apply_totals_delta(&BucketScope::AllTime, contribution, connection)?;
    apply_category_delta(&month, transaction.category.id, transaction.amount, connection)?;
    apply_category_delta(
        &BucketScope::AllTime,
        transaction.category.id,
        transaction.amount,
        connection,
    )?;

    Ok(())
}

/// Write the transaction record itself. Runs inside the caller's database
/// transaction.
fn write_transaction_record(
    builder: &TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let last_modified = OffsetDateTime::now_utc();

    let transaction = match builder.id {
        Some(id) => connection
            .prepare(
                "INSERT INTO \"transaction\"
                 (id, memo, amount, category_id, category_name, category_color, date, last_modified, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
                 ON CONFLICT(id) DO UPDATE SET
                    memo = excluded.memo,
                    amount = excluded.amount,
                    category_id = excluded.category_id,
                    category_name = excluded.category_name,
                    category_color = excluded.category_color,
                    date = excluded.date,
                    last_modified = excluded.last_modified
                 RETURNING id, memo, amount, category_id, category_name, category_color, date, last_modified, deleted",
            )?
            .query_row(
                (
                    id,
                    &builder.memo,
                    builder.amount,
                    builder.category.id,
                    builder.category.name.as_ref(),
                    &builder.category.color,
                    builder.date,
                    last_modified,
                ),
                map_transaction_row,
            )?,
        None => connection
            .prepare(
                "INSERT INTO \"transaction\"
                 (memo, amount, category_id, category_name, category_color, date, last_modified, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
                 RETURNING id, memo, amount, category_id, category_name, category_color, date, last_modified, deleted",
            )?
            .query_row(
                (
                    &builder.memo,
                    builder.amount,
                    builder.category.id,
                    builder.category.name.as_ref(),
                    &builder.category.color,
                    builder.date,
                    last_modified,
                ),
                map_transaction_row,
            )?,
    };

    Ok(transaction)
}

/// Flip the soft-delete flag and refresh the modification time. Runs inside
/// the caller's database transaction.
fn set_deleted_flag(
    id: TransactionId,
    deleted: bool,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "UPDATE \"transaction\" SET deleted = ?1, last_modified = ?2 WHERE id = ?3
             RETURNING id, memo, amount, category_id, category_name, category_color, date, last_modified, deleted",
        )?
        .query_row((deleted, OffsetDateTime::now_utc(), id), map_transaction_row)?;

    Ok(transaction)
}

// ============================================================================
// TESTS
// ============================================================================
