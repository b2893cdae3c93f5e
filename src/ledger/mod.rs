//! The incremental aggregation ledger.
//!
//! Keeps running sums (net, income, expense and per-category totals) for an
//! all-time bucket and for each calendar month, consistent with the live set
//! of transactions. The four operations in this module are the only writers
//! of the bucket tables; each one runs as a single atomic database
//! transaction so a record is never out of step with the sums it contributes
//! to, and each one retries a bounded number of times when the database is
//! contended.

mod bucket;
mod ops;
mod retry;

pub use bucket::{
    BucketScope, BucketTotals, Summary, create_bucket_tables, get_month_summaries, get_summary,
};
pub use ops::{delete_permanently, move_to_trash, restore_from_trash, upsert_transaction};
