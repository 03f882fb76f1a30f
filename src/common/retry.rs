//! Retry with backoff and per-service circuit breaking
//!
//! Every network call in the client goes through `with_retry` or the
//! composed `with_retry_and_breaker`. The breaker wraps the *entire* retried
//! operation, not each attempt: a call that exhausts its retries counts as a
//! single breaker failure.

use parking_lot::Mutex;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::errors::{ClientError, Result};

/// Decide whether an error is worth another attempt
///
/// Auth failures and caller cancellations are never retried, whatever the
/// category preset says.
pub fn default_retryable(err: &ClientError) -> bool {
    match err {
        ClientError::Authentication(_) | ClientError::Authorization(_) => false,
        ClientError::Cancelled(_) => false,
        ClientError::CircuitOpen(_) => false,
        ClientError::Api { status, .. } => *status >= 500 || *status == 429,
        ClientError::HttpRequest(e) => match e.status() {
            Some(status) => status.is_server_error() || status.as_u16() == 429,
            // No status means the request never completed (connect/timeout)
            None => true,
        },
        ClientError::Timeout(_)
        | ClientError::WebSocketConnection(_)
        | ClientError::WebSocketCommunication(_) => true,
        ClientError::JsonParse(_) | ClientError::InvalidResponse(_) => false,
        ClientError::Configuration(_) | ClientError::Internal(_) => false,
        ClientError::ChannelSend(_) => false,
    }
}

/// Backoff and attempt policy for one category of operation
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Additional attempts after the first (total attempts = max_retries + 1)
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Scale each delay by a uniform factor in [0.5, 1.0] so a fleet of
    /// clients does not retry in lockstep
    pub jitter: bool,
    pub retryable: fn(&ClientError) -> bool,
}

impl RetryConfig {
    /// Interactive API calls: quick, a few attempts
    pub fn api() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter: true,
            retryable: default_retryable,
        }
    }

    /// Storage-backed lookups: tight delays, more attempts
    pub fn database() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            jitter: true,
            retryable: default_retryable,
        }
    }

    /// Auth flows: one repeat at most, and the default predicate already
    /// refuses 401/403
    pub fn auth() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            jitter: false,
            retryable: default_retryable,
        }
    }

    /// Money-moving operations: patient, generous delay ceiling
    pub fn critical() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: true,
            retryable: default_retryable,
        }
    }

    /// Fire-and-forget housekeeping (heartbeats, feed refreshes)
    pub fn background() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: true,
            retryable: default_retryable,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retryable(mut self, retryable: fn(&ClientError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Delay before the given retry (attempt counts from 1)
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(exponent as i32);
        let capped = raw.min(self.max_delay.as_millis() as f64);
        let millis = if self.jitter {
            let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
            capped * factor
        } else {
            capped
        };
        Duration::from_millis(millis as u64)
    }
}

/// Run an operation with retries per the given config
///
/// The operation runs up to `max_retries + 1` times. An error failing the
/// config's retryable predicate stops immediately and is surfaced as-is.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt > config.max_retries {
                    warn!(attempt, error = %err, "Retries exhausted");
                    return Err(err);
                }
                if !(config.retryable)(&err) {
                    debug!(error = %err, "Error is not retryable, giving up");
                    return Err(err);
                }
                let delay = config.delay_for_attempt(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Retrying after delay");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Circuit breaker state for one named downstream service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// All calls pass through
    Closed,
    /// Calls fail fast until the reset timeout elapses
    Open,
    /// A probe batch is in flight; successes close, any failure re-opens
    HalfOpen,
}

/// Consecutive successes required in HALF_OPEN before closing.
///
/// Hard-wired independently of `failure_threshold`; flagged as a possible
/// inconsistency in DESIGN.md rather than silently unified.
const HALF_OPEN_PROBE_SUCCESSES: u32 = 3;

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
}

/// Per-service circuit breaker
///
/// Failures in CLOSED increment a counter; hitting `failure_threshold` opens
/// the breaker. While OPEN, calls are rejected without touching the wrapped
/// operation until `reset_timeout` has elapsed, after which a HALF_OPEN probe
/// batch decides between closing and re-opening.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                probe_successes: 0,
                opened_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Run the operation under the breaker
    ///
    /// One call records at most one success or one failure, regardless of
    /// how many internal retries the operation performs.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.before_call()?;
        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    fn before_call(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.reset_timeout {
                    debug!(service = %self.name, "Breaker cooldown elapsed, probing");
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_successes = 0;
                    Ok(())
                } else {
                    Err(ClientError::CircuitOpen(self.name.clone()))
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= HALF_OPEN_PROBE_SUCCESSES {
                    debug!(service = %self.name, "Breaker closed after probe batch");
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.opened_at = None;
                }
            }
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                warn!(service = %self.name, "Probe failed, breaker re-opened");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_successes = 0;
            }
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    warn!(
                        service = %self.name,
                        failures = inner.failure_count,
                        "Failure threshold reached, breaker opened"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {}
        }
    }
}

/// Breaker outside, retry inside
///
/// The breaker sees the retried operation as one call: internal attempts do
/// not each count against the failure threshold.
pub async fn with_retry_and_breaker<T, F, Fut>(
    breaker: &CircuitBreaker,
    config: &RetryConfig,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    breaker.execute(|| with_retry(config, operation)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn flaky(fail_times: u32) -> (Arc<AtomicU32>, impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32>> + Send>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let op = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < fail_times {
                    Err(ClientError::Timeout("simulated".to_string()))
                } else {
                    Ok(n)
                }
            }) as std::pin::Pin<Box<dyn Future<Output = Result<u32>> + Send>>
        };
        (calls, op)
    }

    #[test]
    fn test_preset_attempt_counts() {
        assert_eq!(RetryConfig::api().max_retries, 3);
        assert_eq!(RetryConfig::database().max_retries, 5);
        assert_eq!(RetryConfig::auth().max_retries, 1);
        assert_eq!(RetryConfig::critical().max_retries, 5);
        assert_eq!(RetryConfig::background().max_retries, 2);
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let config = RetryConfig::api().with_jitter(false);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(2000));
        // Far enough out, the cap wins
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let config = RetryConfig::api();
        for _ in 0..50 {
            let delay = config.delay_for_attempt(2).as_millis();
            assert!((500..=1000).contains(&delay), "delay {} out of band", delay);
        }
    }

    #[test]
    fn test_auth_errors_never_retryable() {
        assert!(!default_retryable(&ClientError::Authentication(
            "bad token".to_string()
        )));
        assert!(!default_retryable(&ClientError::Authorization(
            "forbidden".to_string()
        )));
        assert!(!default_retryable(&ClientError::Cancelled(
            "torn down".to_string()
        )));
    }

    #[test]
    fn test_server_errors_retryable() {
        assert!(default_retryable(&ClientError::Api {
            status: 503,
            code: "unavailable".to_string(),
            message: None,
        }));
        assert!(!default_retryable(&ClientError::Api {
            status: 400,
            code: "invalid_amount".to_string(),
            message: None,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let config = RetryConfig::api().with_jitter(false);
        let (calls, op) = flaky(2);

        let result = with_retry(&config, op).await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_surfaces_last_error() {
        let config = RetryConfig::api().with_jitter(false).with_max_retries(2);
        let (calls, op) = flaky(100);

        let result = with_retry(&config, op).await;
        assert!(matches!(result, Err(ClientError::Timeout(_))));
        // 1 initial + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_non_retryable() {
        let config = RetryConfig::api();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = with_retry(&config, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ClientError::Authentication("expired".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(ClientError::Authentication(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_breaker_opens_at_threshold_and_fails_fast() {
        let breaker = CircuitBreaker::new("wallet", 3, Duration::from_secs(60));

        for _ in 0..3 {
            let _ = breaker
                .execute(|| async { Err::<(), _>(ClientError::Timeout("down".to_string())) })
                .await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        // Next call must fail without invoking the operation
        let invoked = Arc::new(AtomicU32::new(0));
        let counter = invoked.clone();
        let result = breaker
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(ClientError::CircuitOpen(_))));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_breaker_probe_batch_closes_after_three_successes() {
        let breaker = CircuitBreaker::new("wallet", 1, Duration::from_millis(10));

        let _ = breaker
            .execute(|| async { Err::<(), _>(ClientError::Timeout("down".to_string())) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(20));

        // First probe call is allowed through
        for i in 0..3 {
            let result = breaker.execute(|| async { Ok(i) }).await;
            assert!(result.is_ok());
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_breaker_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("wallet", 1, Duration::from_millis(10));

        let _ = breaker
            .execute(|| async { Err::<(), _>(ClientError::Timeout("down".to_string())) })
            .await;
        std::thread::sleep(Duration::from_millis(20));

        // Probe fails: straight back to OPEN
        let _ = breaker
            .execute(|| async { Err::<(), _>(ClientError::Timeout("still down".to_string())) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Open);

        let result = breaker.execute(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(ClientError::CircuitOpen(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_composed_breaker_records_one_failure_per_retried_call() {
        let breaker = CircuitBreaker::new("wallet", 5, Duration::from_secs(60));
        let config = RetryConfig::api().with_jitter(false).with_max_retries(2);

        let result: Result<()> = with_retry_and_breaker(&breaker, &config, || async {
            Err(ClientError::Timeout("down".to_string()))
        })
        .await;

        assert!(result.is_err());
        // Three attempts inside, but the breaker saw exactly one failure
        assert_eq!(breaker.failure_count(), 1);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
