//! Retry logic with exponential backoff for transient errors.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use std::thread;

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called when an operation is being retried.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay_secs` - Seconds until next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_secs: u64);
}

/// Callback that logs retries at warn level.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_secs: u64) {
        log::warn!("Attempt {attempt}/{max_attempts} failed: {error}. Retrying in {delay_secs}s...");
    }
}

/// Execute an operation with retry logic.
///
/// Retries the operation while it returns a retryable error, sleeping with
/// exponential backoff between attempts. Non-retryable errors are returned
/// immediately.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut last_error: Option<Error> = None;

    for attempt in 0..config.max_attempts.max(1) {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() || attempt + 1 >= config.max_attempts {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, config.max_attempts, &e, delay.as_secs());
                }
                thread::sleep(delay);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Other("retry exhausted".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_success_first_try() {
        let result = with_retry(&RetryConfig::no_retry(), None, || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_non_retryable_error_not_retried() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(5), None, || {
            attempts.set(attempts.get() + 1);
            Err(Error::NotFound {
                name: "nginxx".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_lock_contention_eventually_succeeds() {
        let attempts = Cell::new(0);
        let result = with_retry(&fast(3), None, || {
            let n = attempts.get();
            attempts.set(n + 1);
            if n < 2 {
                Err(Error::Locked {
                    message: "held by process 4242".to_string(),
                })
            } else {
                Ok("installed")
            }
        });
        assert_eq!(result.unwrap(), "installed");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_all_attempts_fail_returns_last_error() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&fast(3), None, || {
            attempts.set(attempts.get() + 1);
            Err(Error::Network {
                message: format!("timeout #{}", attempts.get()),
            })
        });
        assert_eq!(attempts.get(), 3);
        assert!(result.unwrap_err().to_string().contains("timeout #3"));
    }

    #[test]
    fn test_callback_invoked_between_attempts() {
        struct Counting(Cell<u32>);
        impl RetryCallback for Counting {
            fn on_retry(&self, _: u32, _: u32, _: &Error, _: u64) {
                self.0.set(self.0.get() + 1);
            }
        }

        let cb = Counting(Cell::new(0));
        let _: Result<()> = with_retry(&fast(3), Some(&cb), || {
            Err(Error::Network {
                message: "down".to_string(),
            })
        });
        assert_eq!(cb.0.get(), 2);
    }
}
