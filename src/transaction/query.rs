//! Read-side filtering and sorting of transactions for presentation.
//!
//! The summary figures shown alongside a filtered listing come from
//! [get_summary](crate::ledger::get_summary); this module reads transaction
//! records only and never consults the aggregate buckets.

use rusqlite::{Connection, params_from_iter, types::Value};
use time::{Date, Month};

use crate::{Error, database_id::CategoryId};

use super::{Transaction, map_transaction_row};

/// The period of time a transaction listing is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Transactions dated within the calendar month containing the anchor
    /// date.
    Month(Date),
    /// Transactions dated within the calendar year containing the anchor
    /// date.
    Year(Date),
    /// No date restriction.
    Total,
}

impl Period {
    /// The half-open `[start, end)` date range the period covers, or `None`
    /// for [Period::Total].
    pub fn date_range(self) -> Option<(Date, Date)> {
        match self {
            Period::Month(anchor) => {
                let start = anchor.replace_day(1).unwrap();
                let end = match start.month() {
                    Month::December => {
                        Date::from_calendar_date(start.year() + 1, Month::January, 1)
                    }
                    month => Date::from_calendar_date(start.year(), month.next(), 1),
                }
                .unwrap();

                Some((start, end))
            }
            Period::Year(anchor) => {
                let start = Date::from_calendar_date(anchor.year(), Month::January, 1).unwrap();
                let end = Date::from_calendar_date(anchor.year() + 1, Month::January, 1).unwrap();

                Some((start, end))
            }
            Period::Total => None,
        }
    }
}

/// The order a transaction listing is presented in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionSort {
    /// Most recent first.
    #[default]
    DateDescending,
    /// Largest absolute amount first.
    AmountDescending,
    /// Memo text in alphabetical order.
    MemoAscending,
}

/// Defines which live transactions [get_filtered_transactions] returns and in
/// what order.
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    /// Only include transactions filed under these categories. An empty list
    /// includes every category.
    pub category_ids: Vec<CategoryId>,
    /// Only include transactions dated within this period.
    pub period: Period,
    /// Only include transactions whose memo contains this text
    /// (case-insensitive).
    pub memo_search: Option<String>,
    /// The order to return transactions in.
    pub sort: TransactionSort,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            category_ids: Vec::new(),
            period: Period::Total,
            memo_search: None,
            sort: TransactionSort::default(),
        }
    }
}

/// Retrieve the live transactions selected by `filter`, sorted by its sort
/// key.
///
/// Transactions in the trash are never returned.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_filtered_transactions(
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut query_string_parts = vec![
        "SELECT id, memo, amount, category_id, category_name, category_color, date, last_modified, deleted FROM \"transaction\""
            .to_string(),
    ];
    let mut where_clause_parts = vec!["deleted = 0".to_string()];
    let mut query_parameters: Vec<Value> = vec![];

    if let Some((start, end)) = filter.period.date_range() {
        where_clause_parts.push(format!(
            "date >= ?{} AND date < ?{}",
            query_parameters.len() + 1,
            query_parameters.len() + 2,
        ));
        query_parameters.push(Value::Text(start.to_string()));
        query_parameters.push(Value::Text(end.to_string()));
    }

    if !filter.category_ids.is_empty() {
        let mut placeholders = Vec::new();

        for category_id in &filter.category_ids {
            query_parameters.push(Value::Integer(*category_id));
            placeholders.push(format!("?{}", query_parameters.len()));
        }

        where_clause_parts.push(format!("category_id IN ({})", placeholders.join(", ")));
    }

    query_string_parts.push(String::from("WHERE ") + &where_clause_parts.join(" AND "));

    // Sort by the selected key, and then ID to keep transaction order stable
    // after updates.
    let order_clause = match filter.sort {
        TransactionSort::DateDescending => "ORDER BY date DESC, id ASC",
        TransactionSort::AmountDescending => "ORDER BY ABS(amount) DESC, id ASC",
        TransactionSort::MemoAscending => "ORDER BY memo COLLATE NOCASE ASC, id ASC",
    };
    query_string_parts.push(order_clause.to_string());

    let query_string = query_string_parts.join(" ");
    let params = params_from_iter(query_parameters.iter());

    let transactions = connection
        .prepare(&query_string)?
        .query_map(params, map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::SqlError))
        .collect::<Result<Vec<Transaction>, Error>>()?;

    let transactions = match &filter.memo_search {
        Some(search) => {
            let needle = search.to_lowercase();

            transactions
                .into_iter()
                .filter(|transaction| transaction.memo.to_lowercase().contains(&needle))
                .collect()
        }
        None => transactions,
    };

    Ok(transactions)
}

#[cfg(test)]
mod period_tests {
    use time::macros::date;

    use super::Period;

    #[test]
    fn month_range_is_half_open() {
        let range = Period::Month(date!(2024 - 03 - 15)).date_range();

        assert_eq!(range, Some((date!(2024 - 03 - 01), date!(2024 - 04 - 01))));
    }

    #[test]
    fn month_range_crosses_year_boundary() {
        let range = Period::Month(date!(2024 - 12 - 31)).date_range();

        assert_eq!(range, Some((date!(2024 - 12 - 01), date!(2025 - 01 - 01))));
    }

    #[test]
    fn year_range_covers_whole_year() {
        let range = Period::Year(date!(2024 - 06 - 15)).date_range();

        assert_eq!(range, Some((date!(2024 - 01 - 01), date!(2025 - 01 - 01))));
    }

    #[test]
    fn total_has_no_range() {
        assert_eq!(Period::Total.date_range(), None);
    }
}
