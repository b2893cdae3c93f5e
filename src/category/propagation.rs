//! Pushes edited category details into the denormalized copies stored on
//! transactions.

use rusqlite::Connection;

use crate::{Error, category::Category};

/// Overwrite the denormalized category name and color on every live
/// transaction filed under `category`.
///
/// The fan-out is best-effort: if it fails, the copies stay stale until the
/// next propagation, which only affects how those transactions are displayed.
/// Aggregate buckets are never touched since no amount changes. Transactions
/// in the trash keep the snapshot they were trashed with; they pick up the
/// current details the next time they are edited.
///
/// # Returns
/// The number of transactions that were updated.
///
/// # Errors
/// This function will return an [Error::SqlError] if the bulk update fails.
pub fn propagate_category_details(
    category: &Category,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows_updated = connection.execute(
        "UPDATE \"transaction\" SET category_name = ?1, category_color = ?2
         WHERE category_id = ?3 AND deleted = 0",
        (category.name.as_ref(), category.color.as_str(), category.id),
    )?;

    tracing::debug!(
        "propagated details of category {} to {} transactions",
        category.id,
        rows_updated
    );

    Ok(rows_updated)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        category::{CategoryKind, CategoryName, create_category, update_category},
        db::initialize,
        ledger::{get_summary, move_to_trash, upsert_transaction, BucketScope},
        transaction::{CategorySnapshot, Transaction, get_transaction},
    };

    use super::propagate_category_details;

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn updates_live_transactions_only() {
        let conn = get_test_connection();
        let category = create_category(
            CategoryName::new("Groceries").unwrap(),
            "#4CAF50",
            CategoryKind::Expense,
            &conn,
        )
        .unwrap();
        let snapshot = CategorySnapshot::of(&category);

        let live = upsert_transaction(
            &Transaction::build(-500, date!(2024 - 03 - 05), "weekly shop", snapshot.clone()),
            &conn,
        )
        .unwrap();
        let trashed = upsert_transaction(
            &Transaction::build(-250, date!(2024 - 03 - 12), "top up", snapshot),
            &conn,
        )
        .unwrap();
        move_to_trash(trashed.id, &conn).unwrap();

        let updated = update_category(
            category.id,
            CategoryName::new("Food").unwrap(),
            "#FF5722",
            &conn,
        )
        .unwrap();
        let rows_updated = propagate_category_details(&updated, &conn)
            .expect("Could not propagate category details");

        assert_eq!(rows_updated, 1);

        let got_live = get_transaction(live.id, &conn).unwrap();
        assert_eq!(got_live.category.name.as_ref(), "Food");
        assert_eq!(got_live.category.color, "#FF5722");

        // The trashed transaction keeps the snapshot it was trashed with.
        let got_trashed = get_transaction(trashed.id, &conn).unwrap();
        assert_eq!(got_trashed.category.name.as_ref(), "Groceries");
        assert_eq!(got_trashed.category.color, "#4CAF50");
    }

    #[test]
    fn leaves_other_categories_untouched() {
        let conn = get_test_connection();
        let groceries = create_category(
            CategoryName::new("Groceries").unwrap(),
            "#4CAF50",
            CategoryKind::Expense,
            &conn,
        )
        .unwrap();
        let rent = create_category(
            CategoryName::new("Rent").unwrap(),
            "#9C27B0",
            CategoryKind::Expense,
            &conn,
        )
        .unwrap();

        let rent_transaction = upsert_transaction(
            &Transaction::build(
                -120_000,
                date!(2024 - 03 - 01),
                "march rent",
                CategorySnapshot::of(&rent),
            ),
            &conn,
        )
        .unwrap();

        let updated = update_category(
            groceries.id,
            CategoryName::new("Food").unwrap(),
            "#FF5722",
            &conn,
        )
        .unwrap();
        let rows_updated = propagate_category_details(&updated, &conn).unwrap();

        assert_eq!(rows_updated, 0);

        let got = get_transaction(rent_transaction.id, &conn).unwrap();
        assert_eq!(got.category.name.as_ref(), "Rent");
    }

    #[test]
    fn never_touches_aggregate_buckets() {
        let conn = get_test_connection();
        let category = create_category(
            CategoryName::new("Groceries").unwrap(),
            "#4CAF50",
            CategoryKind::Expense,
            &conn,
        )
        .unwrap();

        upsert_transaction(
            &Transaction::build(
                -500,
                date!(2024 - 03 - 05),
                "weekly shop",
                CategorySnapshot::of(&category),
            ),
            &conn,
        )
        .unwrap();

        let before = get_summary(&BucketScope::AllTime, &conn).unwrap();

        let updated = update_category(
            category.id,
            CategoryName::new("Food").unwrap(),
            "#FF5722",
            &conn,
        )
        .unwrap();
        propagate_category_details(&updated, &conn).unwrap();

        let after = get_summary(&BucketScope::AllTime, &conn).unwrap();

        assert_eq!(before, after);
    }
}
