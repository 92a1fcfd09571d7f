use tracing::warn;

use crate::{CoreError, Result};

/// Attempts made before a lost storage race is surfaced to the caller.
pub const MAX_CONFLICT_RETRIES: usize = 3;

/// Run `op`, re-running it from scratch while it fails with
/// `ConcurrentModification`, at most `MAX_CONFLICT_RETRIES` times in total.
pub fn retry_on_conflict<T>(what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(CoreError::ConcurrentModification) if attempt < MAX_CONFLICT_RETRIES => {
                warn!("{} lost a storage race (attempt {}), retrying", what, attempt);
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let result = retry_on_conflict("test", || {
            calls += 1;
            if calls < MAX_CONFLICT_RETRIES {
                Err(CoreError::ConcurrentModification)
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(MAX_CONFLICT_RETRIES));
    }

    #[test]
    fn gives_up_after_bound() {
        let mut calls = 0;
        let result: Result<()> = retry_on_conflict("test", || {
            calls += 1;
            Err(CoreError::ConcurrentModification)
        });
        assert_eq!(result, Err(CoreError::ConcurrentModification));
        assert_eq!(calls, MAX_CONFLICT_RETRIES);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = retry_on_conflict("test", || {
            calls += 1;
            Err(CoreError::not_found("thing"))
        });
        assert_eq!(result, Err(CoreError::NotFound("thing".into())));
        assert_eq!(calls, 1);
    }
}
