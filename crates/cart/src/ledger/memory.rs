//! In-memory stock ledger.
//!
//! Counters live behind an async mutex, so every compare-and-swap is atomic
//! with respect to other callers sharing the ledger (wrap it in an `Arc`).
//! Fault injection hooks simulate rival shoppers, access-policy rejections and
//! slow backends for tests and local development.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use veloure_core::ProductId;

use super::{CasOutcome, LedgerError, StockLedger};

#[derive(Debug, Default)]
struct LedgerState {
    counters: HashMap<ProductId, u32>,
    read_failure: Option<LedgerError>,
    write_failure: Option<LedgerError>,
    forced_conflicts: u32,
    rival_writes: VecDeque<u32>,
    latency: Duration,
    write_ack_delay: Duration,
    reads: u64,
    writes: u64,
}

/// Stock ledger held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStockLedger {
    state: Mutex<LedgerState>,
}

impl MemoryStockLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite a product's counter.
    pub async fn insert(&self, id: ProductId, stock: u32) {
        self.state.lock().await.counters.insert(id, stock);
    }

    /// Current counter value, bypassing fault injection.
    pub async fn stock(&self, id: ProductId) -> Option<u32> {
        self.state.lock().await.counters.get(&id).copied()
    }

    /// Make every read fail with `err` until faults are cleared.
    pub async fn fail_reads(&self, err: LedgerError) {
        self.state.lock().await.read_failure = Some(err);
    }

    /// Make every conditional write fail with `err` until faults are cleared.
    ///
    /// Reads keep working, which is how a client without write authority
    /// experiences the ledger.
    pub async fn fail_writes(&self, err: LedgerError) {
        self.state.lock().await.write_failure = Some(err);
    }

    /// Make the next `n` conditional writes lose their race.
    pub async fn force_conflicts(&self, n: u32) {
        self.state.lock().await.forced_conflicts = n;
    }

    /// Simulate a rival shopper setting the counter to `value` right before
    /// the next conditional write. Queued values apply one per write.
    pub async fn queue_rival_write(&self, value: u32) {
        self.state.lock().await.rival_writes.push_back(value);
    }

    /// Delay every call by `latency` before it touches the counters.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Apply conditional writes immediately but hold their reply for
    /// `delay`, like a backend whose acknowledgement is lost in transit.
    pub async fn delay_write_acks(&self, delay: Duration) {
        self.state.lock().await.write_ack_delay = delay;
    }

    /// Remove all injected faults.
    pub async fn clear_faults(&self) {
        let mut state = self.state.lock().await;
        state.read_failure = None;
        state.write_failure = None;
        state.forced_conflicts = 0;
        state.rival_writes.clear();
        state.latency = Duration::ZERO;
        state.write_ack_delay = Duration::ZERO;
    }

    /// Number of `read_stock` calls served.
    pub async fn read_count(&self) -> u64 {
        self.state.lock().await.reads
    }

    /// Number of `conditional_set_stock` calls served.
    pub async fn write_count(&self) -> u64 {
        self.state.lock().await.writes
    }

    async fn simulate_latency(&self) {
        let latency = self.state.lock().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn apply_write(
        state: &mut LedgerState,
        id: ProductId,
        expected: u32,
        new: u32,
    ) -> Result<CasOutcome, LedgerError> {
        if let Some(err) = &state.write_failure {
            return Err(err.clone());
        }
        if !state.counters.contains_key(&id) {
            return Ok(CasOutcome::NoMatch);
        }
        if state.forced_conflicts > 0 {
            state.forced_conflicts -= 1;
            return Ok(CasOutcome::NoMatch);
        }
        if let Some(rival) = state.rival_writes.pop_front() {
            state.counters.insert(id, rival);
        }

        match state.counters.get_mut(&id) {
            Some(current) if *current == expected => {
                *current = new;
                Ok(CasOutcome::Applied(new))
            }
            _ => Ok(CasOutcome::NoMatch),
        }
    }
}

#[async_trait]
impl StockLedger for MemoryStockLedger {
    async fn read_stock(&self, id: ProductId) -> Result<u32, LedgerError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.reads += 1;
        if let Some(err) = &state.read_failure {
            return Err(err.clone());
        }
        state
            .counters
            .get(&id)
            .copied()
            .ok_or(LedgerError::NotFound(id))
    }

    async fn conditional_set_stock(
        &self,
        id: ProductId,
        expected: u32,
        new: u32,
    ) -> Result<CasOutcome, LedgerError> {
        self.simulate_latency().await;
        let (outcome, ack_delay) = {
            let mut state = self.state.lock().await;
            state.writes += 1;
            let delay = state.write_ack_delay;
            (Self::apply_write(&mut state, id, expected, new), delay)
        };
        if matches!(outcome, Ok(CasOutcome::Applied(_))) && !ack_delay.is_zero() {
            tokio::time::sleep(ack_delay).await;
        }
        outcome
    }
}
