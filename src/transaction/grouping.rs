//! Grouping of filtered transactions into month labels for display.

use serde::Serialize;
use time::Date;

use super::Transaction;

/// The transactions of one calendar month in a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthGroup {
    /// The first day of the month the group covers.
    pub month: Date,
    /// The display label for the group, e.g. "March 2024".
    pub label: String,
    /// The transactions in the group, in listing order.
    pub transactions: Vec<Transaction>,
}

/// Group transactions by calendar month for display.
///
/// Groups appear in order of first appearance so the listing keeps the sort
/// order chosen by the caller; transactions keep their order within each
/// group.
pub fn group_transactions_by_month(transactions: Vec<Transaction>) -> Vec<MonthGroup> {
    let mut groups: Vec<MonthGroup> = Vec::new();

    for transaction in transactions {
        let month = transaction.date.replace_day(1).unwrap();

        let group = match groups.iter_mut().find(|group| group.month == month) {
            Some(group) => group,
            None => {
                groups.push(MonthGroup {
                    month,
                    label: format!("{} {}", month.month(), month.year()),
                    transactions: Vec::new(),
                });
                groups.last_mut().expect("group just added")
            }
        };

        group.transactions.push(transaction);
    }

    groups
}
