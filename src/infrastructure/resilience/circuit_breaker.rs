//! Circuit breaker guarding one fallible cache dependency
//!
//! - **Closed**: calls pass through; consecutive failures are counted
//! - **Open**: calls fail fast with `CacheError::Unavailable`
//! - **Half-Open**: a bounded number of trial calls probe for recovery
//!
//! Every transition happens under a single lock acquisition, so concurrent
//! callers never observe a half-applied state change.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::semantic_cache::{BreakerSnapshot, CacheSettings, CircuitState};
use crate::domain::CacheError;

/// Configuration for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Time after the last failure before a trial call is allowed
    pub recovery_timeout: Duration,
    /// Trial calls admitted while half-open
    pub half_open_max_calls: u32,
    /// Consecutive half-open successes needed to close
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
            success_threshold: 1,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            failure_threshold: settings.breaker_failure_threshold,
            recovery_timeout: settings.breaker_recovery_timeout(),
            half_open_max_calls: settings.breaker_half_open_max_calls,
            success_threshold: settings.breaker_success_threshold,
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn with_half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = calls;
        self
    }

    pub fn with_success_threshold(mut self, successes: u32) -> Self {
        self.success_threshold = successes;
        self
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    last_failure_time: Option<Instant>,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            half_open_calls: 0,
            last_failure_time: None,
        }
    }
}

/// Circuit breaker for a single dependency
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Admission ticket for one guarded call
///
/// A half-open trial slot is handed back if the call is dropped before it
/// settles, so cancelled callers cannot wedge the breaker half-open.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    fn success(mut self) {
        self.settled = true;
        self.breaker.on_success();
    }

    fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.release_trial();
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::closed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // State is plain counters; a panicking holder cannot leave it torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move an open circuit to half-open once the recovery timeout has elapsed
    fn refresh(&self, state: &mut BreakerState) {
        if state.state != CircuitState::Open {
            return;
        }

        let elapsed = state
            .last_failure_time
            .map(|at| at.elapsed())
            .unwrap_or(Duration::MAX);

        if elapsed >= self.config.recovery_timeout {
            tracing::info!(
                breaker = %self.name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Circuit transitioning from Open to HalfOpen"
            );
            state.state = CircuitState::HalfOpen;
            state.success_count = 0;
            state.half_open_calls = 0;
        }
    }

    /// Current state, applying a pending Open → HalfOpen transition
    pub fn state(&self) -> CircuitState {
        let mut state = self.lock();
        self.refresh(&mut state);
        state.state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut state = self.lock();
        self.refresh(&mut state);

        BreakerSnapshot {
            name: self.name.clone(),
            state: state.state,
            failure_count: state.failure_count,
        }
    }

    fn acquire(&self) -> Result<Permit<'_>, CacheError> {
        let mut state = self.lock();
        self.refresh(&mut state);

        match state.state {
            CircuitState::Closed => Ok(Permit {
                breaker: self,
                trial: false,
                settled: false,
            }),
            CircuitState::Open => Err(CacheError::unavailable(
                self.name.clone(),
                "circuit breaker is open",
            )),
            CircuitState::HalfOpen => {
                if state.half_open_calls >= self.config.half_open_max_calls {
                    return Err(CacheError::unavailable(
                        self.name.clone(),
                        "circuit breaker half-open trial limit reached",
                    ));
                }

                state.half_open_calls += 1;

                Ok(Permit {
                    breaker: self,
                    trial: true,
                    settled: false,
                })
            }
        }
    }

    fn release_trial(&self) {
        let mut state = self.lock();

        if state.state == CircuitState::HalfOpen {
            state.half_open_calls = state.half_open_calls.saturating_sub(1);
        }
    }

    fn on_success(&self) {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                state.success_count += 1;

                if state.success_count >= self.config.success_threshold {
                    tracing::info!(
                        breaker = %self.name,
                        successes = state.success_count,
                        "Circuit transitioning from HalfOpen to Closed"
                    );
                    *state = BreakerState::closed();
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut state = self.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_time = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        breaker = %self.name,
                        failures = state.failure_count,
                        "Circuit transitioning from Closed to Open"
                    );
                    state.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(
                    breaker = %self.name,
                    "Circuit transitioning from HalfOpen to Open after failure"
                );
                state.state = CircuitState::Open;
                state.success_count = 0;
                state.half_open_calls = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Run `f` through the breaker
    ///
    /// Fails fast with `CacheError::Unavailable` while open. Only errors for
    /// which [`CacheError::counts_as_failure`] holds are counted; other
    /// errors pass through without touching the state.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let permit = self.acquire()?;

        match f().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(error) => {
                if error.counts_as_failure() {
                    tracing::debug!(breaker = %self.name, error = %error, "Guarded call failed");
                    permit.failure();
                }

                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(failures: u32, recovery_ms: u64) -> CircuitBreaker {
        CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig::default()
                .with_failure_threshold(failures)
                .with_recovery_timeout(Duration::from_millis(recovery_ms)),
        )
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), CacheError> {
        cb.call(|| async { Err::<(), _>(CacheError::transient("boom")) })
            .await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<u32, CacheError> {
        cb.call(|| async { Ok(7) }).await
    }

    #[tokio::test]
    async fn test_opens_after_threshold_failures() {
        let cb = breaker(3, 60_000);

        for _ in 0..2 {
            assert!(fail(&cb).await.is_err());
            assert_eq!(cb.state(), CircuitState::Closed);
        }

        assert!(fail(&cb).await.is_err());
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.snapshot().failure_count, 3);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast() {
        let cb = breaker(1, 60_000);
        let _ = fail(&cb).await;

        let calls = AtomicUsize::new(0);
        let result = cb
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_unavailable());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(3, 60_000);

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(succeed(&cb).await.unwrap(), 7);
        let _ = fail(&cb).await;

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_non_counting_errors_do_not_trip() {
        let cb = breaker(1, 60_000);

        let result = cb
            .call(|| async { Err::<(), _>(CacheError::validation("bad input")) })
            .await;

        assert!(result.unwrap_err().is_validation());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_after_recovery_timeout_then_closes() {
        let cb = breaker(2, 20);
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(1, 20);
        let _ = fail(&cb).await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_success_threshold_requires_consecutive_successes() {
        let cb = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_recovery_timeout(Duration::from_millis(20))
                .with_half_open_max_calls(3)
                .with_success_threshold(2),
        );
        let _ = fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_limits_trial_calls() {
        let cb = Arc::new(CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_recovery_timeout(Duration::from_millis(20))
                .with_half_open_max_calls(1),
        ));
        let _ = fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let slow = {
            let cb = cb.clone();
            tokio::spawn(async move {
                cb.call(|| async move {
                    let _ = rx.await;
                    Ok(())
                })
                .await
            })
        };

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let rejected = succeed(&cb).await;
        assert!(rejected.unwrap_err().is_unavailable());

        let _ = tx.send(());
        assert!(slow.await.unwrap().is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_cancelled_trial_releases_slot() {
        let cb = CircuitBreaker::with_config(
            "test",
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_recovery_timeout(Duration::from_millis(20))
                .with_half_open_max_calls(1),
        );
        let _ = fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let pending = cb.call(|| std::future::pending::<Result<(), CacheError>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(5), pending).await;
        assert!(timed_out.is_err());

        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
