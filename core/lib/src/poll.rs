use crate::clock::Clock;
use crate::error::{EbiError, EbiResult, ErrorContext};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Fixed-interval polling bounded by a wall-clock budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(20 * 60),
        }
    }
}

/// Call `check` until it answers `true`.
///
/// The check runs first, then the budget is compared against the elapsed
/// time, then the poll sleeps. Errors from `check` end the poll at once.
/// Returns the number of checks performed.
pub async fn poll_until<F, Fut>(
    clock: &dyn Clock,
    config: PollConfig,
    operation: &str,
    mut check: F,
) -> EbiResult<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EbiResult<bool>>,
{
    let start = clock.now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if check().await? {
            return Ok(attempts);
        }

        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed >= config.timeout {
            return Err(EbiError::timeout(format!(
                "{} did not complete within {}s",
                operation,
                config.timeout.as_secs()
            ))
            .with_context(
                ErrorContext::new(operation).with_info(format!("attempts={}", attempts)),
            ));
        }

        debug!(
            operation,
            attempts,
            elapsed_secs = elapsed.as_secs(),
            "condition not met yet, waiting"
        );
        clock.sleep(config.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config() -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(120),
        }
    }

    #[tokio::test]
    async fn test_returns_immediately_when_condition_holds() {
        let clock = ManualClock::new(0);
        let attempts = poll_until(&clock, config(), "test", || async { Ok(true) })
            .await
            .unwrap();

        assert_eq!(attempts, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_keeps_polling_until_condition_holds() {
        let clock = ManualClock::new(0);
        let calls = AtomicU32::new(0);

        let attempts = poll_until(&clock, config(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 2) }
        })
        .await
        .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(30); 2]);
    }

    #[tokio::test]
    async fn test_times_out_when_condition_never_holds() {
        let clock = ManualClock::new(0);

        let err = poll_until(&clock, config(), "capacity", || async { Ok(false) })
            .await
            .unwrap_err();

        assert!(matches!(err, EbiError::Timeout { .. }));
        assert_eq!(err.exit_code(), 1);
        // checks at 0, 30, 60, 90 and 120 seconds; the last one hits the budget
        assert_eq!(clock.sleeps().len(), 4);
        assert_eq!(clock.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_check_errors_stop_the_poll() {
        let clock = ManualClock::new(0);

        let err = poll_until(&clock, config(), "test", || async {
            Err(EbiError::transport("describe failed"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, EbiError::Transport { .. }));
        assert!(clock.sleeps().is_empty());
    }
}
