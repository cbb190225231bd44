//! [`BioRng`]: a running producer bound to its pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{ConfigError, RngConfig};
use crate::pool::{EntropyPool, PoolError, PoolStatus};
use crate::producer::{Producer, ProducerError, ProducerStats};
use crate::shutdown::Shutdown;
use crate::source::SampleSource;

/// Random number generator fed by a background producer.
///
/// The pool starts empty and the producer task starts immediately, so the
/// first draws wait for the first staging cycle to complete.
///
/// Dropping a `BioRng` raises its shutdown signal. Pool handles obtained
/// through [`pool`](Self::pool) then see [`PoolError::Cancelled`] once drained.
pub struct BioRng {
    pool: Arc<EntropyPool>,
    shutdown: Shutdown,
    producer: JoinHandle<Result<ProducerStats, ProducerError>>,
    config: RngConfig,
    source_name: &'static str,
}

impl BioRng {
    /// Start a producer for `source` on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn<S>(source: S, config: RngConfig) -> Result<Self, ConfigError>
    where
        S: SampleSource + 'static,
    {
        let producer = Producer::new(&config)?;
        let shutdown = Shutdown::new();
        let pool = Arc::new(EntropyPool::new(shutdown.clone(), config.poll_interval()));
        let source_name = source.name();

        let task = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { producer.run(&source, &pool).await })
        };

        Ok(Self {
            pool,
            shutdown,
            producer: task,
            config,
            source_name,
        })
    }

    /// Next scalar in `[0, 1]`, waiting while the pool is empty.
    pub async fn rand(&self) -> Result<f64, PoolError> {
        self.pool.rand().await
    }

    pub async fn rand_timeout(&self, limit: Duration) -> Result<f64, PoolError> {
        self.pool.rand_timeout(limit).await
    }

    /// Uniform integer in `[min, max]`.
    pub async fn rand_int(&self, min: i64, max: i64) -> Result<i64, PoolError> {
        self.pool.rand_int(min, max).await
    }

    pub async fn rand_int_timeout(
        &self,
        min: i64,
        max: i64,
        limit: Duration,
    ) -> Result<i64, PoolError> {
        self.pool.rand_int_timeout(min, max, limit).await
    }

    /// Shared handle to the pool, for consumers that outlive a borrow.
    pub fn pool(&self) -> Arc<EntropyPool> {
        Arc::clone(&self.pool)
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    pub fn config(&self) -> &RngConfig {
        &self.config
    }

    pub fn source_name(&self) -> &'static str {
        self.source_name
    }

    /// Whether the producer task is still running.
    pub fn is_running(&self) -> bool {
        !self.producer.is_finished()
    }

    /// Raise the shutdown signal without waiting for the producer.
    pub fn cancel(&self) {
        self.shutdown.trigger();
    }

    /// Stop the producer and wait for it to finish its current request.
    ///
    /// Waiting consumers receive [`PoolError::Cancelled`].
    pub async fn shutdown(self) -> Result<ProducerStats, ProducerError> {
        self.shutdown.trigger();
        self.join().await
    }

    /// Wait for the producer to exit on its own (fatal source failure or an
    /// earlier [`cancel`](Self::cancel)).
    pub async fn join(mut self) -> Result<ProducerStats, ProducerError> {
        match (&mut self.producer).await {
            Ok(result) => result,
            Err(e) => Err(ProducerError::Task(e.to_string())),
        }
    }
}

/// Dropping the handle stops the producer; otherwise the detached task
/// would keep filling a pool nobody drains.
impl Drop for BioRng {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
