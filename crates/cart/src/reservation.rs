//! Reservation and release of ledger stock.
//!
//! Both operations are an optimistic read-compare-write loop:
//!
//! 1. Read the counter.
//! 2. Compute the new value from what was read.
//! 3. Write it only if the counter still holds the value read.
//! 4. On a lost race, start over with a fresh read.
//!
//! The loop is bounded by [`RetryPolicy::max_attempts`]. The engine keeps no
//! state between calls and takes no locks; the ledger's conditional write is
//! the only thing that orders concurrent shoppers.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use veloure_core::ProductId;

use crate::ledger::{CasOutcome, LedgerError, StockLedger};

/// Message surfaced when every attempt lost its race.
pub const CONFLICT_MESSAGE: &str = "Stock update conflict. Please try again.";

/// Retry and timeout settings for ledger round-trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Read-compare-write attempts before giving up with a conflict.
    pub max_attempts: u32,
    /// Upper bound on every individual ledger call.
    pub call_timeout: Duration,
    /// Base delay between attempts after a lost race. Zero retries immediately.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            call_timeout: Duration::from_secs(5),
            base_backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Delay before the `retry`-th retry (1-based).
    ///
    /// Exponential in `base_backoff` with uniform jitter of up to one base
    /// interval.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        if self.base_backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1).min(16));
        let base_ms = u64::try_from(self.base_backoff.as_millis()).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(rand::rng().random_range(0..=base_ms));
        self.base_backoff.saturating_mul(factor).saturating_add(jitter)
    }
}

/// Why a reservation or release did not change stock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    /// The ledger rejected or failed the call.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Every attempt lost its compare-and-swap race.
    #[error("{}", CONFLICT_MESSAGE)]
    Conflict,
}

impl StockError {
    /// Whether the ledger refused the caller's write authority.
    #[must_use]
    pub fn is_policy_denied(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_policy_denied(),
            Self::Conflict => false,
        }
    }

    /// Whether trying again later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict | Self::Ledger(LedgerError::Timeout(_)))
    }
}

/// Result of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveOutcome {
    /// Units claimed. May be fewer than requested when supply is short.
    pub reserved: u32,
    /// Remaining ledger stock after the claim (or as observed, when nothing
    /// was claimed). Zero when `error` is set.
    pub stock: u32,
    pub error: Option<StockError>,
    /// Units whose conditional write timed out. The ledger may have applied
    /// it, in which case these units are taken without a cart line.
    pub unconfirmed: Option<u32>,
}

impl ReserveOutcome {
    fn failed(error: StockError) -> Self {
        Self {
            reserved: 0,
            stock: 0,
            error: Some(error),
            unconfirmed: None,
        }
    }

    /// Nothing reserved because the ledger had nothing left.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.reserved == 0 && self.error.is_none()
    }
}

/// Result of a release attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOutcome {
    /// Ledger stock after the release. `None` when the ledger was not
    /// updated (error, or nothing to release).
    pub stock: Option<u32>,
    pub error: Option<StockError>,
}

/// Runs the reserve/release loops against a ledger.
#[derive(Debug, Clone)]
pub struct ReservationEngine<L> {
    ledger: L,
    policy: RetryPolicy,
}

impl<L: StockLedger> ReservationEngine<L> {
    /// Create an engine over a ledger.
    #[must_use]
    pub const fn new(ledger: L, policy: RetryPolicy) -> Self {
        Self { ledger, policy }
    }

    /// Get a reference to the ledger.
    #[must_use]
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Claim up to `wanted` units (at least one).
    ///
    /// Read failures and write failures return immediately; only lost races
    /// are retried.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn reserve(&self, id: ProductId, wanted: u32) -> ReserveOutcome {
        let wanted = wanted.max(1);
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let current = match self.call(self.ledger.read_stock(id)).await {
                Ok(stock) => stock,
                Err(err) => {
                    debug!(error = %err, "stock read failed");
                    return ReserveOutcome::failed(err.into());
                }
            };

            let claim = current.min(wanted);
            if claim == 0 {
                debug!("stock exhausted");
                return ReserveOutcome {
                    reserved: 0,
                    stock: current,
                    error: None,
                    unconfirmed: None,
                };
            }

            match self
                .call(
                    self.ledger
                        .conditional_set_stock(id, current, current - claim),
                )
                .await
            {
                Ok(CasOutcome::Applied(stock)) => {
                    debug!(reserved = claim, stock, attempt, "stock reserved");
                    return ReserveOutcome {
                        reserved: claim,
                        stock,
                        error: None,
                        unconfirmed: None,
                    };
                }
                Ok(CasOutcome::NoMatch) => {
                    debug!(attempt, observed = current, "lost reservation race");
                    self.pause_before_retry(attempt, attempts).await;
                }
                Err(err) => {
                    debug!(error = %err, "stock write failed");
                    let unconfirmed = matches!(err, LedgerError::Timeout(_)).then_some(claim);
                    return ReserveOutcome {
                        unconfirmed,
                        ..ReserveOutcome::failed(err.into())
                    };
                }
            }
        }

        warn!(attempts, "reservation abandoned after repeated conflicts");
        ReserveOutcome::failed(StockError::Conflict)
    }

    /// Return `qty` units to the ledger.
    ///
    /// Releasing zero units is a no-op that never contacts the ledger. A lost
    /// race never loses inventory; it only forces another read.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn release(&self, id: ProductId, qty: u32) -> ReleaseOutcome {
        if qty == 0 {
            return ReleaseOutcome {
                stock: None,
                error: None,
            };
        }
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let current = match self.call(self.ledger.read_stock(id)).await {
                Ok(stock) => stock,
                Err(err) => {
                    debug!(error = %err, "stock read failed");
                    return ReleaseOutcome {
                        stock: None,
                        error: Some(err.into()),
                    };
                }
            };

            match self
                .call(
                    self.ledger
                        .conditional_set_stock(id, current, current.saturating_add(qty)),
                )
                .await
            {
                Ok(CasOutcome::Applied(stock)) => {
                    debug!(released = qty, stock, attempt, "stock released");
                    return ReleaseOutcome {
                        stock: Some(stock),
                        error: None,
                    };
                }
                Ok(CasOutcome::NoMatch) => {
                    debug!(attempt, observed = current, "lost release race");
                    self.pause_before_retry(attempt, attempts).await;
                }
                Err(err) => {
                    debug!(error = %err, "stock write failed");
                    return ReleaseOutcome {
                        stock: None,
                        error: Some(err.into()),
                    };
                }
            }
        }

        warn!(attempts, "release abandoned after repeated conflicts");
        ReleaseOutcome {
            stock: None,
            error: Some(StockError::Conflict),
        }
    }

    /// Bound a ledger call by the policy's timeout.
    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        let limit = self.policy.call_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| LedgerError::Timeout(limit))?
    }

    async fn pause_before_retry(&self, attempt: u32, attempts: u32) {
        if attempt >= attempts {
            return;
        }
        let delay = self.policy.backoff(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ledger::MemoryStockLedger;

    const ID: ProductId = ProductId::new(1);

    async fn engine_with_stock(stock: u32) -> ReservationEngine<MemoryStockLedger> {
        let ledger = MemoryStockLedger::new();
        ledger.insert(ID, stock).await;
        ReservationEngine::new(ledger, RetryPolicy::default())
    }

    #[tokio::test]
    async fn test_reserve_full_quantity() {
        let engine = engine_with_stock(5).await;
        let outcome = engine.reserve(ID, 3).await;

        assert_eq!(outcome.reserved, 3);
        assert_eq!(outcome.stock, 2);
        assert!(outcome.error.is_none());
        assert_eq!(engine.ledger().stock(ID).await, Some(2));
    }

    #[tokio::test]
    async fn test_reserve_caps_at_available() {
        let engine = engine_with_stock(2).await;
        let outcome = engine.reserve(ID, 4).await;

        assert_eq!(outcome.reserved, 2);
        assert_eq!(outcome.stock, 0);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_reserve_zero_is_one() {
        let engine = engine_with_stock(5).await;
        let outcome = engine.reserve(ID, 0).await;

        assert_eq!(outcome.reserved, 1);
        assert_eq!(outcome.stock, 4);
    }

    #[tokio::test]
    async fn test_reserve_exhausted_is_not_an_error() {
        let engine = engine_with_stock(0).await;
        let outcome = engine.reserve(ID, 1).await;

        assert!(outcome.is_exhausted());
        assert_eq!(outcome.stock, 0);
        assert_eq!(engine.ledger().write_count().await, 0);
    }

    #[tokio::test]
    async fn test_reserve_not_found_is_not_retried() {
        let engine = ReservationEngine::new(MemoryStockLedger::new(), RetryPolicy::default());
        let outcome = engine.reserve(ID, 1).await;

        assert_eq!(outcome.reserved, 0);
        assert_eq!(outcome.stock, 0);
        assert_eq!(
            outcome.error,
            Some(StockError::Ledger(LedgerError::NotFound(ID)))
        );
        assert_eq!(engine.ledger().read_count().await, 1);
    }

    #[tokio::test]
    async fn test_reserve_retries_with_fresh_read() {
        let engine = engine_with_stock(5).await;
        engine.ledger().queue_rival_write(1).await;

        let outcome = engine.reserve(ID, 3).await;

        // The rival left one unit; the retry claims exactly that.
        assert_eq!(outcome.reserved, 1);
        assert_eq!(outcome.stock, 0);
        assert_eq!(engine.ledger().read_count().await, 2);
    }

    #[tokio::test]
    async fn test_reserve_conflict_after_max_attempts() {
        let engine = engine_with_stock(5).await;
        engine.ledger().force_conflicts(3).await;

        let outcome = engine.reserve(ID, 1).await;

        assert_eq!(outcome.reserved, 0);
        assert_eq!(outcome.stock, 0);
        assert_eq!(outcome.error, Some(StockError::Conflict));
        assert_eq!(outcome.error.unwrap().to_string(), CONFLICT_MESSAGE);
        assert_eq!(engine.ledger().write_count().await, 3);
        assert_eq!(engine.ledger().stock(ID).await, Some(5));
    }

    #[tokio::test]
    async fn test_reserve_write_denial_returns_immediately() {
        let engine = engine_with_stock(5).await;
        engine
            .ledger()
            .fail_writes(LedgerError::PolicyDenied("permission denied".to_string()))
            .await;

        let outcome = engine.reserve(ID, 2).await;

        assert!(outcome.error.as_ref().unwrap().is_policy_denied());
        assert_eq!(engine.ledger().write_count().await, 1);
    }

    #[tokio::test]
    async fn test_reserve_times_out_slow_ledger() {
        let ledger = MemoryStockLedger::new();
        ledger.insert(ID, 5).await;
        ledger.set_latency(Duration::from_millis(200)).await;
        let policy = RetryPolicy {
            call_timeout: Duration::from_millis(20),
            ..RetryPolicy::default()
        };
        let engine = ReservationEngine::new(ledger, policy);

        let outcome = engine.reserve(ID, 1).await;

        let err = outcome.error.unwrap();
        assert!(matches!(err, StockError::Ledger(LedgerError::Timeout(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_write_timeout_marks_claim_unconfirmed() {
        let ledger = MemoryStockLedger::new();
        ledger.insert(ID, 5).await;
        ledger.delay_write_acks(Duration::from_millis(200)).await;
        let policy = RetryPolicy {
            call_timeout: Duration::from_millis(20),
            ..RetryPolicy::default()
        };
        let engine = ReservationEngine::new(ledger, policy);

        let outcome = engine.reserve(ID, 3).await;

        assert_eq!(outcome.reserved, 0);
        assert_eq!(outcome.unconfirmed, Some(3));
        assert!(matches!(
            outcome.error,
            Some(StockError::Ledger(LedgerError::Timeout(_)))
        ));
        // The write landed even though its reply never arrived.
        assert_eq!(engine.ledger().stock(ID).await, Some(2));
        assert_eq!(engine.ledger().write_count().await, 1);
    }

    #[tokio::test]
    async fn test_read_timeout_leaves_nothing_unconfirmed() {
        let ledger = MemoryStockLedger::new();
        ledger.insert(ID, 5).await;
        ledger.set_latency(Duration::from_millis(200)).await;
        let policy = RetryPolicy {
            call_timeout: Duration::from_millis(20),
            ..RetryPolicy::default()
        };
        let engine = ReservationEngine::new(ledger, policy);

        let outcome = engine.reserve(ID, 3).await;

        assert_eq!(outcome.unconfirmed, None);
        assert_eq!(engine.ledger().write_count().await, 0);
    }

    #[tokio::test]
    async fn test_reserve_then_release_restores_counter() {
        let engine = engine_with_stock(7).await;
        let reserved = engine.reserve(ID, 4).await;
        let released = engine.release(ID, reserved.reserved).await;

        assert_eq!(released.stock, Some(7));
        assert_eq!(engine.ledger().stock(ID).await, Some(7));
    }

    #[tokio::test]
    async fn test_release_zero_is_noop() {
        let engine = engine_with_stock(3).await;
        let outcome = engine.release(ID, 0).await;

        assert_eq!(outcome.stock, None);
        assert!(outcome.error.is_none());
        assert_eq!(engine.ledger().read_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_conflict_keeps_inventory() {
        let engine = engine_with_stock(3).await;
        engine.ledger().force_conflicts(3).await;

        let outcome = engine.release(ID, 2).await;

        assert_eq!(outcome.error, Some(StockError::Conflict));
        assert_eq!(outcome.stock, None);
        assert_eq!(engine.ledger().stock(ID).await, Some(3));
    }

    #[tokio::test]
    async fn test_max_attempts_is_configurable() {
        let ledger = MemoryStockLedger::new();
        ledger.insert(ID, 5).await;
        ledger.force_conflicts(4).await;
        let policy = RetryPolicy {
            max_attempts: 5,
            ..RetryPolicy::default()
        };
        let engine = ReservationEngine::new(ledger, policy);

        let outcome = engine.reserve(ID, 1).await;

        assert_eq!(outcome.reserved, 1);
        assert_eq!(engine.ledger().write_count().await, 5);
    }

    #[test]
    fn test_backoff_disabled_by_default() {
        assert_eq!(RetryPolicy::default().backoff(1), Duration::ZERO);
    }

    #[test]
    fn test_backoff_grows_with_jitter_bound() {
        let policy = RetryPolicy {
            base_backoff: Duration::from_millis(10),
            ..RetryPolicy::default()
        };
        let first = policy.backoff(1);
        let third = policy.backoff(3);

        assert!(first >= Duration::from_millis(10) && first <= Duration::from_millis(20));
        assert!(third >= Duration::from_millis(40) && third <= Duration::from_millis(50));
    }

    #[test]
    fn test_stock_error_classification() {
        assert!(StockError::Conflict.is_retryable());
        assert!(!StockError::Conflict.is_policy_denied());
        let denied = StockError::Ledger(LedgerError::PolicyDenied("jwt expired".to_string()));
        assert!(denied.is_policy_denied());
        assert!(!denied.is_retryable());
    }
}
