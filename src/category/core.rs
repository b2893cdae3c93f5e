//! Defines the core data model and database queries for categories.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::CategoryId};

// ============================================================================
// MODELS
// ============================================================================

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is an
    /// empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because
    /// if the non-empty invariant is violated it will cause incorrect
    /// behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a category groups money coming in or money going out.
///
/// The kind is display metadata: the sign of each transaction amount decides
/// which aggregate column the amount lands in, not the category kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Money earned, e.g. 'Wages', 'Interest'.
    Income,
    /// Money spent, e.g. 'Groceries', 'Rent'.
    Expense,
}

impl CategoryKind {
    /// The kind as the text stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl FromStr for CategoryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(Error::InvalidCategoryKind(other.to_string())),
        }
    }
}

impl Display for CategoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A grouping for expenses and income, e.g., 'Groceries', 'Eating Out',
/// 'Wages'.
///
/// Categories are referenced by value: each transaction stores a copy of the
/// name and color it was filed with (see
/// [CategorySnapshot](crate::transaction::CategorySnapshot)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The name of the category.
    pub name: CategoryName,
    /// The display color of the category as a hex string, e.g. `#4CAF50`.
    pub color: String,
    /// Whether the category groups income or expenses.
    pub kind: CategoryKind,
    /// Whether the category has been moved to the trash.
    ///
    /// Trashed categories are hidden from listings but transactions filed
    /// under them keep their snapshots.
    pub deleted: bool,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new category in the database.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn create_category(
    name: CategoryName,
    color: &str,
    kind: CategoryKind,
    connection: &Connection,
) -> Result<Category, Error> {
    let category = connection
        .prepare(
            "INSERT INTO category (name, color, kind, deleted)
             VALUES (?1, ?2, ?3, 0)
             RETURNING id, name, color, kind, deleted",
        )?
        .query_row((name.as_ref(), color, kind.as_str()), map_category_row)?;

    Ok(category)
}

/// Retrieve a category from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_category(id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    let category = connection
        .prepare("SELECT id, name, color, kind, deleted FROM category WHERE id = :id")?
        .query_one(&[(":id", &id)], map_category_row)?;

    Ok(category)
}

/// Retrieve every category that is not in the trash, in name order.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, color, kind, deleted FROM category
             WHERE deleted = 0
             ORDER BY name COLLATE NOCASE ASC",
        )?
        .query_map([], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(Error::SqlError))
        .collect()
}

/// Rename and/or recolor a category.
///
/// The denormalized copies stored on transactions are not touched here; call
/// [propagate_category_details](crate::category::propagate_category_details)
/// afterwards to push the new details out.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingCategory] if `id` does not refer to a valid
///   category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_category(
    id: CategoryId,
    name: CategoryName,
    color: &str,
    connection: &Connection,
) -> Result<Category, Error> {
    let rows_updated = connection.execute(
        "UPDATE category SET name = ?1, color = ?2 WHERE id = ?3",
        (name.as_ref(), color, id),
    )?;

    if rows_updated == 0 {
        return Err(Error::UpdateMissingCategory);
    }

    get_category(id, connection)
}

/// Move a category to the trash.
///
/// Transactions filed under the category are untouched: they keep their
/// denormalized snapshot and their aggregate contributions.
///
/// # Errors
/// This function will return a:
/// - [Error::TrashMissingCategory] if `id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn move_category_to_trash(id: CategoryId, connection: &Connection) -> Result<(), Error> {
    let rows_updated = connection.execute("UPDATE category SET deleted = 1 WHERE id = ?1", (id,))?;

    if rows_updated == 0 {
        return Err(Error::TrashMissingCategory);
    }

    Ok(())
}

/// Create the category table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                color TEXT NOT NULL,
                kind TEXT NOT NULL CHECK(kind IN ('income', 'expense')),
                deleted INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Category.
pub fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let name: String = row.get(1)?;
    let color = row.get(2)?;
    let kind: String = row.get(3)?;
    let deleted = row.get(4)?;

    let kind = kind.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("invalid category kind {kind:?}").into(),
        )
    })?;

    Ok(Category {
        id,
        name: CategoryName::new_unchecked(&name),
        color,
        kind,
        deleted,
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;

    use crate::{Error, db::initialize};

    use super::{
        CategoryKind, CategoryName, create_category, get_categories, get_category,
        move_category_to_trash, update_category,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_and_get_round_trips() {
        let conn = get_test_connection();

        let want = create_category(
            CategoryName::new("Groceries").unwrap(),
            "#4CAF50",
            CategoryKind::Expense,
            &conn,
        )
        .expect("Could not create category");

        let got = get_category(want.id, &conn).expect("Could not get category");

        assert_eq!(want, got);
        assert!(!got.deleted);
    }

    #[test]
    fn get_fails_on_invalid_id() {
        let conn = get_test_connection();

        let result = get_category(999, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_categories_excludes_trashed() {
        let conn = get_test_connection();
        let groceries = create_category(
            CategoryName::new("Groceries").unwrap(),
            "#4CAF50",
            CategoryKind::Expense,
            &conn,
        )
        .unwrap();
        let wages = create_category(
            CategoryName::new("Wages").unwrap(),
            "#2196F3",
            CategoryKind::Income,
            &conn,
        )
        .unwrap();

        move_category_to_trash(groceries.id, &conn).expect("Could not trash category");

        let got = get_categories(&conn).expect("Could not list categories");

        assert_eq!(got, vec![wages]);
    }

    #[test]
    fn update_changes_name_and_color() {
        let conn = get_test_connection();
        let category = create_category(
            CategoryName::new("Groceries").unwrap(),
            "#4CAF50",
            CategoryKind::Expense,
            &conn,
        )
        .unwrap();

        let got = update_category(
            category.id,
            CategoryName::new("Food").unwrap(),
            "#FF5722",
            &conn,
        )
        .expect("Could not update category");

        assert_eq!(got.name.as_ref(), "Food");
        assert_eq!(got.color, "#FF5722");
        assert_eq!(got.kind, category.kind);
    }

    #[test]
    fn update_fails_on_invalid_id() {
        let conn = get_test_connection();

        let result = update_category(999, CategoryName::new("Food").unwrap(), "#FF5722", &conn);

        assert_eq!(result, Err(Error::UpdateMissingCategory));
    }

    #[test]
    fn trash_fails_on_invalid_id() {
        let conn = get_test_connection();

        let result = move_category_to_trash(999, &conn);

        assert_eq!(result, Err(Error::TrashMissingCategory));
    }
}
