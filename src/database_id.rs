//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of a transaction record.
pub type TransactionId = DatabaseId;

/// The ID of a category record.
pub type CategoryId = DatabaseId;

/// The ID of a savings account record.
pub type AccountId = DatabaseId;
