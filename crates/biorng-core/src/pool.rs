//! Shared FIFO entropy pool and the consumer API.
//!
//! Architecture:
//! 1. The producer appends one normalized scalar per staging cycle (tail)
//! 2. Consumers remove scalars in strict FIFO order (head)
//! 3. Every append/remove is a single locked operation on one `VecDeque`
//! 4. An empty pool makes `rand` wait, re-checking every poll interval
//! 5. Pushes also wake waiters through a `Notify`, so the poll interval is
//!    an upper bound on latency rather than the typical case
//! 6. Shutdown and producer exit wake every waiter with a distinct error
//!
//! Without a timeout, `rand` on a starved pool waits for as long as the
//! producer takes. Callers that need a bound use [`EntropyPool::rand_timeout`]
//! or raise the shared [`Shutdown`].

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Notify;

use crate::shutdown::Shutdown;

/// Default re-check interval for a waiting `rand`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors surfaced to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The shutdown signal was raised while waiting.
    #[error("entropy request cancelled by shutdown")]
    Cancelled,
    /// The producer has stopped and the pool is drained.
    #[error("entropy pool closed: producer stopped and no entropy remains")]
    Closed,
    /// No entropy became available within the caller's bound.
    #[error("no entropy available within {0:?}")]
    Timeout(Duration),
    /// `rand_int` was called with `min > max`.
    #[error("invalid range: min {min} > max {max}")]
    InvalidRange { min: i64, max: i64 },
}

/// Thread-safe FIFO queue of uniformly distributed scalars in `[0, 1]`.
pub struct EntropyPool {
    queue: Mutex<VecDeque<f64>>,
    available: Notify,
    shutdown: Shutdown,
    poll_interval: Duration,
    closed: AtomicBool,
    produced: AtomicU64,
    consumed: AtomicU64,
    rejected: AtomicU64,
}

impl EntropyPool {
    /// Create an empty pool observing `shutdown`.
    pub fn new(shutdown: Shutdown, poll_interval: Duration) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            shutdown,
            poll_interval,
            closed: AtomicBool::new(false),
            produced: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn shutdown_signal(&self) -> &Shutdown {
        &self.shutdown
    }

    // -----------------------------------------------------------------------
    // Producer side
    // -----------------------------------------------------------------------

    /// Append one scalar at the tail.
    ///
    /// Values that are not finite members of `[0, 1]`, or that arrive after
    /// [`close`](Self::close), are refused and counted; the pool never holds
    /// anything a consumer could not use. Returns whether the value was
    /// accepted.
    pub fn push(&self, value: f64) -> bool {
        if !(0.0..=1.0).contains(&value) || self.is_closed() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            log::warn!("entropy pool refused value {value}");
            return false;
        }
        self.lock_queue().push_back(value);
        self.produced.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
        true
    }

    /// Mark the producer as gone. Waiters drain what is left, then get
    /// [`PoolError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Consumer side
    // -----------------------------------------------------------------------

    /// Remove and return the head scalar without waiting.
    pub fn try_rand(&self) -> Option<f64> {
        let value = self.lock_queue().pop_front();
        if value.is_some() {
            self.consumed.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Remove and return the head scalar, waiting while the pool is empty.
    ///
    /// Entries already in the pool are still served after shutdown; only a
    /// caller that would have to wait observes [`PoolError::Cancelled`].
    pub async fn rand(&self) -> Result<f64, PoolError> {
        loop {
            // Register for a wake-up before looking, so a push between the
            // check and the wait is not missed.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.try_rand() {
                return Ok(value);
            }
            if self.shutdown.is_triggered() {
                return Err(PoolError::Cancelled);
            }
            if self.is_closed() {
                return Err(PoolError::Closed);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.shutdown.triggered() => {}
            }
        }
    }

    /// [`rand`](Self::rand) bounded by `limit`.
    pub async fn rand_timeout(&self, limit: Duration) -> Result<f64, PoolError> {
        tokio::time::timeout(limit, self.rand())
            .await
            .map_err(|_| PoolError::Timeout(limit))?
    }

    /// Uniform integer in the inclusive range `[min, max]`.
    ///
    /// The range is checked before any entropy is consumed.
    pub async fn rand_int(&self, min: i64, max: i64) -> Result<i64, PoolError> {
        check_range(min, max)?;
        let scalar = self.rand().await?;
        scale_to_range(scalar, min, max)
    }

    /// [`rand_int`](Self::rand_int) bounded by `limit`.
    pub async fn rand_int_timeout(
        &self,
        min: i64,
        max: i64,
        limit: Duration,
    ) -> Result<i64, PoolError> {
        check_range(min, max)?;
        let scalar = self.rand_timeout(limit).await?;
        scale_to_range(scalar, min, max)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Number of scalars ready for consumption.
    pub fn len(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters as structured data.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            available: self.len(),
            produced: self.produced.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            closed: self.is_closed(),
            cancelled: self.shutdown.is_triggered(),
        }
    }

    /// The queue holds plain `f64`s, so a panic elsewhere cannot leave it
    /// half-updated; recover the guard instead of propagating poison.
    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<f64>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EntropyPool {
    fn default() -> Self {
        Self::new(Shutdown::new(), DEFAULT_POLL_INTERVAL)
    }
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Scalars currently queued.
    pub available: usize,
    /// Scalars accepted from the producer.
    pub produced: u64,
    /// Scalars handed to consumers.
    pub consumed: u64,
    /// Values refused by `push`.
    pub rejected: u64,
    /// Producer has stopped.
    pub closed: bool,
    /// Shutdown signal raised.
    pub cancelled: bool,
}

fn check_range(min: i64, max: i64) -> Result<(), PoolError> {
    if min > max {
        Err(PoolError::InvalidRange { min, max })
    } else {
        Ok(())
    }
}

/// Map a scalar in `[0, 1]` onto the inclusive integer range `[min, max]`.
///
/// Computes `floor(scalar * (max - min + 1)) + min` in 128-bit arithmetic so
/// the full `i64` range cannot overflow. A scalar of exactly `1.0` (or one
/// that rounds up to the span) maps to `max`, never past it.
pub fn scale_to_range(scalar: f64, min: i64, max: i64) -> Result<i64, PoolError> {
    check_range(min, max)?;
    let span = (i128::from(max) - i128::from(min) + 1) as f64;
    let offset = (scalar.clamp(0.0, 1.0) * span).floor() as i128;
    let value = (i128::from(min) + offset).min(i128::from(max));
    Ok(value as i64)
}
