//! Aggregate bucket storage: scopes, totals and the increment primitives.

use std::{collections::HashMap, fmt::Display};

use rusqlite::Connection;
use serde::Serialize;
use time::Date;

use crate::{Error, database_id::CategoryId};

/// The scope key of the all-time bucket.
const ALL_TIME_KEY: &str = "all-time";

/// Identifies an aggregate bucket: the all-time bucket or one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketScope {
    /// Sums over every live transaction.
    AllTime,
    /// Sums over the live transactions of one calendar month. The date is the
    /// first day of that month.
    Month(Date),
}

impl BucketScope {
    /// The month bucket a transaction dated `date` contributes to.
    pub fn month_of(date: Date) -> Self {
        Self::Month(date.replace_day(1).unwrap())
    }

    /// The scope's key in the bucket tables: `all-time` or `YYYY-MM`.
    ///
    /// Month keys sort chronologically as plain text.
    pub(super) fn key(&self) -> String {
        match self {
            Self::AllTime => ALL_TIME_KEY.to_string(),
            Self::Month(month) => format!("{:04}-{:02}", month.year(), month.month() as u8),
        }
    }
}

impl Display for BucketScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// The running sums held by one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketTotals {
    /// Sum of every live amount in scope.
    pub net: i64,
    /// Sum of the live amounts at or above zero.
    pub income: i64,
    /// Sum of the live amounts below zero.
    pub expense: i64,
}

impl BucketTotals {
    /// The contribution a live transaction of `amount` makes to its buckets.
    ///
    /// An amount at or above zero counts toward `income`, an amount below
    /// zero toward `expense`; `net` always receives the signed amount.
    pub(super) fn contribution(amount: i64) -> Self {
        if amount < 0 {
            Self {
                net: amount,
                income: 0,
                expense: amount,
            }
        } else {
            Self {
                net: amount,
                income: amount,
                expense: 0,
            }
        }
    }

    /// The delta that moves a bucket holding `other` to holding `self`.
    pub(super) fn minus(self, other: Self) -> Self {
        Self {
            net: self.net - other.net,
            income: self.income - other.income,
            expense: self.expense - other.expense,
        }
    }

    /// The delta that removes this contribution from a bucket.
    pub(super) fn negated(self) -> Self {
        Self {
            net: -self.net,
            income: -self.income,
            expense: -self.expense,
        }
    }
}

/// The summary figures for one scope, read straight from its bucket rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// The running sums of the scope.
    pub totals: BucketTotals,
    /// The signed sum per category in the scope.
    pub by_category: HashMap<CategoryId, i64>,
}

/// Create the aggregate bucket tables in the database.
///
/// # Errors
/// Returns an error if the tables cannot be created or if there is an SQL error.
pub fn create_bucket_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS bucket (
                scope TEXT PRIMARY KEY,
                net INTEGER NOT NULL DEFAULT 0,
                income INTEGER NOT NULL DEFAULT 0,
                expense INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS bucket_category (
                scope TEXT NOT NULL,
                category_id INTEGER NOT NULL,
                total INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (scope, category_id)
                )",
        (),
    )?;

    Ok(())
}

/// Add `delta` to the totals of the bucket for `scope`.
///
/// The bucket row is created on its first contribution and never deleted,
/// even when its sums return to zero. The update is a plain additive
/// increment so concurrent transactions touching the same bucket compose
/// instead of overwriting each other.
pub(super) fn apply_totals_delta(
    scope: &BucketScope,
    delta: BucketTotals,
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "INSERT INTO bucket (scope, net, income, expense) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(scope) DO UPDATE SET
            net = net + excluded.net,
            income = income + excluded.income,
            expense = expense + excluded.expense",
        (scope.key(), delta.net, delta.income, delta.expense),
    )?;

    Ok(())
}

/// Add `delta` to the per-category sum for `scope`, creating the entry on its
/// first contribution.
pub(super) fn apply_category_delta(
    scope: &BucketScope,
    category_id: CategoryId,
    delta: i64,
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "INSERT INTO bucket_category (scope, category_id, total) VALUES (?1, ?2, ?3)
         ON CONFLICT(scope, category_id) DO UPDATE SET total = total + excluded.total",
        (scope.key(), category_id, delta),
    )?;

    Ok(())
}

/// Get the summary figures for `scope`.
///
/// A scope no transaction has ever contributed to reads as all zeros, since
/// bucket rows are only created on first contribution.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_summary(scope: &BucketScope, connection: &Connection) -> Result<Summary, Error> {
    let totals = match connection
        .prepare("SELECT net, income, expense FROM bucket WHERE scope = :scope")?
        .query_one(&[(":scope", &scope.key())], |row| {
            Ok(BucketTotals {
                net: row.get(0)?,
                income: row.get(1)?,
                expense: row.get(2)?,
            })
        }) {
        Ok(totals) => totals,
        Err(rusqlite::Error::QueryReturnedNoRows) => BucketTotals::default(),
        Err(error) => return Err(error.into()),
    };

    let by_category = connection
        .prepare("SELECT category_id, total FROM bucket_category WHERE scope = :scope")?
        .query_map(&[(":scope", &scope.key())], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<Result<HashMap<CategoryId, i64>, rusqlite::Error>>()?;

    Ok(Summary { totals, by_category })
}

/// Get the totals of every month bucket, keyed by `YYYY-MM`, in chronological
/// order.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_month_summaries(connection: &Connection) -> Result<Vec<(String, BucketTotals)>, Error> {
    connection
        .prepare(
            "SELECT scope, net, income, expense FROM bucket
             WHERE scope != :all_time
             ORDER BY scope ASC",
        )?
        .query_map(&[(":all_time", &ALL_TIME_KEY)], |row| {
            Ok((
                row.get(0)?,
                BucketTotals {
                    net: row.get(1)?,
                    income: row.get(2)?,
                    expense: row.get(3)?,
                },
            ))
        })?
        .map(|maybe_row| maybe_row.map_err(Error::SqlError))
        .collect()
}

#[cfg(test)]
mod scope_tests {
    use time::macros::date;

    use super::BucketScope;

    #[test]
    fn month_of_truncates_to_first_day() {
        let scope = BucketScope::month_of(date!(2024 - 03 - 15));

        assert_eq!(scope, BucketScope::Month(date!(2024 - 03 - 01)));
    }

    #[test]
    fn month_key_pads_single_digit_months() {
        let scope = BucketScope::month_of(date!(2024 - 03 - 15));

        assert_eq!(scope.key(), "2024-03");
    }

    #[test]
    fn all_time_key_is_sentinel() {
        assert_eq!(BucketScope::AllTime.key(), "all-time");
    }
}

#[cfg(test)]
mod contribution_tests {
    use super::BucketTotals;

    #[test]
    fn positive_amount_routes_to_income() {
        let contribution = BucketTotals::contribution(500);

        assert_eq!(
            contribution,
            BucketTotals {
                net: 500,
                income: 500,
                expense: 0
            }
        );
    }

    #[test]
    fn negative_amount_routes_to_expense() {
        let contribution = BucketTotals::contribution(-200);

        assert_eq!(
            contribution,
            BucketTotals {
                net: -200,
                income: 0,
                expense: -200
            }
        );
    }

    #[test]
    fn zero_amount_counts_as_income() {
        let contribution = BucketTotals::contribution(0);

        assert_eq!(contribution, BucketTotals::default());
    }

    #[test]
    fn minus_gives_componentwise_delta() {
        let delta = BucketTotals::contribution(-200).minus(BucketTotals::contribution(500));

        assert_eq!(
            delta,
            BucketTotals {
                net: -700,
                income: -500,
                expense: -200
            }
        );
    }
}

#[cfg(test)]
mod summary_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::db::initialize;

    use super::{BucketScope, BucketTotals, get_summary};

    #[test]
    fn untouched_scope_reads_as_zero() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let summary = get_summary(&BucketScope::month_of(date!(2031 - 07 - 01)), &conn)
            .expect("Could not get summary");

        assert_eq!(summary.totals, BucketTotals::default());
        assert!(summary.by_category.is_empty());
    }
}
