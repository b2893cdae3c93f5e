//! Bounded retry for ledger operations that hit database contention.

use std::{thread, time::Duration};

use crate::Error;

/// The number of times a ledger operation is attempted before surfacing
/// [Error::DatabaseLockError] to the caller.
pub(super) const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Run `operation` until it returns something other than
/// [Error::DatabaseLockError], retrying with exponential backoff up to
/// [MAX_COMMIT_ATTEMPTS] attempts.
///
/// The store rolls an aborted transaction back in full, so a retried
/// operation always starts from a clean slate and no partial bucket update is
/// ever visible.
pub(super) fn with_retry<T>(mut operation: impl FnMut() -> Result<T, Error>) -> Result<T, Error> {
    let mut attempt = 1;
    let mut backoff = Duration::from_millis(10);

    loop {
        match operation() {
            Err(Error::DatabaseLockError) if attempt < MAX_COMMIT_ATTEMPTS => {
                tracing::warn!(
                    "ledger operation hit a locked database on attempt {attempt}, retrying"
                );
                thread::sleep(backoff);
                attempt += 1;
                backoff *= 2;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;

    use super::{MAX_COMMIT_ATTEMPTS, with_retry};

    #[test]
    fn returns_first_success() {
        let mut calls = 0;

        let result = with_retry(|| {
            calls += 1;
            Ok(42)
        });

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 1);
    }

    #[test]
    fn retries_through_lock_errors() {
        let mut calls = 0;

        let result = with_retry(|| {
            calls += 1;
            if calls < 3 {
                Err(Error::DatabaseLockError)
            } else {
                Ok("committed")
            }
        });

        assert_eq!(result, Ok("committed"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let mut calls = 0;

        let result: Result<(), Error> = with_retry(|| {
            calls += 1;
            Err(Error::DatabaseLockError)
        });

        assert_eq!(result, Err(Error::DatabaseLockError));
        assert_eq!(calls, MAX_COMMIT_ATTEMPTS);
    }

    #[test]
    fn does_not_retry_other_errors() {
        let mut calls = 0;

        let result: Result<(), Error> = with_retry(|| {
            calls += 1;
            Err(Error::NotFound)
        });

        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(calls, 1);
    }
}
