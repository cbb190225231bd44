//! Entropy producer: raw batches in, one decorrelated scalar per cycle out.
//!
//! # Cycle
//!
//! ```text
//! request batch → normalize each channel → flatten → staging buffer
//!                                                         │ len ≥ sample_size
//!                                                         ▼
//!                                   pick one sample uniformly → pool tail
//!                                   clear staging buffer
//! ```
//!
//! Many samples are accumulated before one is chosen. Consecutive readings
//! from an electrode are strongly correlated; choosing a single sample from a
//! large window keeps short correlated bursts from dominating the pool.
//!
//! The producer is the only writer of the pool. Failed requests and
//! degenerate batches are logged and skipped. The loop ends only when the
//! shutdown signal is raised or, if configured, after too many consecutive
//! source failures; in both cases the pool is closed so waiting consumers
//! wake up.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, RngConfig};
use crate::normalize::normalize;
use crate::pool::EntropyPool;
use crate::source::{SampleBatch, SampleSource, SourceError};

/// Reasons a cycle or the whole producer fails.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProducerError {
    /// No channel of a batch could be normalized. The batch is dropped.
    #[error("degenerate batch: {0}")]
    DegenerateBatch(String),
    /// The source failed too many times in a row.
    #[error("sample source gave up after {failures} consecutive failures: {last}")]
    SourceExhausted { failures: u32, last: SourceError },
    /// The producer task panicked or was aborted.
    #[error("producer task failed: {0}")]
    Task(String),
}

/// Running counters for one producer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProducerStats {
    /// Batches received from the source.
    pub batches: u64,
    /// Normalized samples appended to the staging buffer.
    pub samples: u64,
    /// Scalars moved into the pool.
    pub emitted: u64,
    /// Failed or timed-out sample requests.
    pub failures: u64,
    /// Channels dropped by the normalizer.
    pub degenerate_channels: u64,
    /// Batches dropped because no channel survived normalization.
    pub skipped_batches: u64,
}

/// Per-cycle accumulator. Never leaves the producer.
#[derive(Debug, Default)]
struct StagingBuffer {
    samples: Vec<f64>,
}

impl StagingBuffer {
    fn extend(&mut self, samples: Vec<f64>) {
        self.samples.extend(samples);
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    /// Pick one sample uniformly and reset the buffer.
    fn take_selection<R: Rng>(&mut self, rng: &mut R) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.samples.len());
        let value = self.samples[index];
        self.samples.clear();
        Some(value)
    }
}

/// Closes the pool when the producer future finishes, unwinds or is dropped.
struct CloseOnDrop<'a>(&'a EntropyPool);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        if !self.0.is_closed() {
            log::debug!("producer exiting, closing entropy pool");
        }
        self.0.close();
    }
}

/// The sole writer of an [`EntropyPool`].
pub struct Producer {
    config: RngConfig,
    staging: StagingBuffer,
    rng: StdRng,
    stats: ProducerStats,
}

impl Producer {
    pub fn new(config: &RngConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            config: config.clone(),
            staging: StagingBuffer::default(),
            rng,
            stats: ProducerStats::default(),
        })
    }

    pub fn stats(&self) -> &ProducerStats {
        &self.stats
    }

    /// Samples currently waiting in the staging buffer.
    pub fn staged(&self) -> usize {
        self.staging.len()
    }

    /// Fold one batch into the staging buffer.
    ///
    /// Each channel is normalized on its own; channels the normalizer
    /// refuses are dropped. Returns the selected scalar when the buffer has
    /// reached `sample_size`.
    pub fn ingest(&mut self, batch: &SampleBatch) -> Result<Option<f64>, ProducerError> {
        self.stats.batches += 1;

        let mut accepted = Vec::with_capacity(batch.sample_count());
        for (channel, trace) in batch.channels.iter().enumerate() {
            match normalize(trace) {
                Ok(normalized) => accepted.extend(normalized),
                Err(e) => {
                    self.stats.degenerate_channels += 1;
                    log::warn!("{}: dropping channel {channel}: {e}", self.config.mea);
                }
            }
        }

        if accepted.is_empty() {
            self.stats.skipped_batches += 1;
            return Err(ProducerError::DegenerateBatch(format!(
                "none of {} channels usable",
                batch.channels.len()
            )));
        }

        self.stats.samples += accepted.len() as u64;
        self.staging.extend(accepted);

        if self.staging.len() < self.config.sample_size {
            return Ok(None);
        }
        let staged = self.staging.len();
        let selected = self.staging.take_selection(&mut self.rng);
        if let Some(value) = selected {
            self.stats.emitted += 1;
            log::debug!("{}: selected {value:.6} from {staged} staged samples", self.config.mea);
        }
        Ok(selected)
    }

    /// Drive the cycle until shutdown or a fatal source failure.
    ///
    /// Shutdown is checked between iterations: a request already in flight
    /// completes (or times out) and its batch is processed before the loop
    /// exits. The pool is closed on every exit path, including a panicking
    /// source and the future being dropped mid-request.
    pub async fn run<S: SampleSource>(
        mut self,
        source: &S,
        pool: &EntropyPool,
    ) -> Result<ProducerStats, ProducerError> {
        log::info!(
            "producer started: source={} {} sample_size={}",
            source.name(),
            self.config.mea,
            self.config.sample_size
        );

        let closer = CloseOnDrop(pool);
        let result = self.run_loop(source, pool).await;
        drop(closer);

        match &result {
            Ok(stats) => log::info!(
                "producer stopped: {} batches, {} emitted, {} failures",
                stats.batches,
                stats.emitted,
                stats.failures
            ),
            Err(e) => log::error!("producer terminated: {e}"),
        }
        result
    }

    async fn run_loop<S: SampleSource>(
        &mut self,
        source: &S,
        pool: &EntropyPool,
    ) -> Result<ProducerStats, ProducerError> {
        let shutdown = pool.shutdown_signal().clone();
        let mut consecutive_failures = 0u32;

        while !shutdown.is_triggered() {
            let outcome = match self.config.request_timeout() {
                Some(limit) => tokio::time::timeout(limit, source.request_batch(self.config.mea))
                    .await
                    .unwrap_or(Err(SourceError::Timeout(limit))),
                None => source.request_batch(self.config.mea).await,
            };

            match outcome {
                Ok(batch) => {
                    consecutive_failures = 0;
                    match self.ingest(&batch) {
                        Ok(Some(value)) => {
                            pool.push(value);
                        }
                        Ok(None) => {}
                        Err(e) => log::warn!("{}: {e}", self.config.mea),
                    }
                }
                Err(e) => {
                    self.stats.failures += 1;
                    consecutive_failures += 1;
                    log::warn!(
                        "{}: sample request failed ({consecutive_failures} in a row): {e}",
                        self.config.mea
                    );
                    if let Some(max) = self.config.max_consecutive_failures {
                        if consecutive_failures >= max {
                            return Err(ProducerError::SourceExhausted {
                                failures: consecutive_failures,
                                last: e,
                            });
                        }
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.retry_delay()) => {}
                        _ = shutdown.triggered() => {}
                    }
                }
            }

            // Sources that answer without suspending must not starve
            // consumers sharing this thread.
            tokio::task::yield_now().await;
        }

        Ok(self.stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Shutdown;
    use crate::source::{MeaId, SourceInfo, SourceKind};
    use crate::sources::ReplaySource;
    use std::time::Duration;

    static FAULTY_INFO: SourceInfo = SourceInfo {
        name: "faulty",
        description: "Source whose driver panics mid-request",
        physics: "None.",
        kind: SourceKind::Replay,
    };

    struct FaultySource;

    impl SampleSource for FaultySource {
        fn info(&self) -> &SourceInfo {
            &FAULTY_INFO
        }

        async fn request_batch(&self, _mea: MeaId) -> Result<SampleBatch, SourceError> {
            panic!("driver fault");
        }
    }

    fn config(sample_size: usize) -> RngConfig {
        RngConfig {
            sample_size,
            seed: Some(1234),
            retry_delay_ms: 1,
            poll_interval_ms: 1,
            ..RngConfig::default()
        }
    }

    fn ramp(len: usize) -> SampleBatch {
        SampleBatch::new(vec![(0..len).map(|i| i as f64).collect()])
    }

    // -----------------------------------------------------------------------
    // Staging tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_staging_selection_clears_buffer() {
        let mut staging = StagingBuffer::default();
        staging.extend(vec![0.1, 0.2, 0.3]);
        let mut rng = StdRng::seed_from_u64(0);
        let v = staging.take_selection(&mut rng).unwrap();
        assert!([0.1, 0.2, 0.3].contains(&v));
        assert_eq!(staging.len(), 0);
        assert_eq!(staging.take_selection(&mut rng), None);
    }

    #[test]
    fn test_staging_selection_covers_every_index() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut hits = [0usize; 4];
        for _ in 0..4000 {
            let mut staging = StagingBuffer::default();
            staging.extend(vec![0.0, 1.0, 2.0, 3.0]);
            let v = staging.take_selection(&mut rng).unwrap();
            hits[v as usize] += 1;
        }
        for (i, &h) in hits.iter().enumerate() {
            assert!(h > 800 && h < 1200, "index {i} hit {h} times");
        }
    }

    // -----------------------------------------------------------------------
    // Ingest tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_ingest_emits_once_per_threshold() {
        let mut producer = Producer::new(&config(10)).unwrap();
        let mut emitted = 0;
        for _ in 0..10 {
            if producer.ingest(&ramp(5)).unwrap().is_some() {
                emitted += 1;
                assert_eq!(producer.staged(), 0);
            }
        }
        // 50 samples at 10 per emission.
        assert_eq!(emitted, 5);
        assert_eq!(producer.stats().emitted, 5);
        assert_eq!(producer.stats().samples, 50);
    }

    #[test]
    fn test_ingest_overshoot_resets_buffer() {
        let mut producer = Producer::new(&config(3)).unwrap();
        for _ in 0..4 {
            assert!(producer.ingest(&ramp(5)).unwrap().is_some());
            assert_eq!(producer.staged(), 0);
        }
        assert_eq!(producer.stats().emitted, 4);
    }

    #[test]
    fn test_ingest_selects_a_normalized_sample() {
        let mut producer = Producer::new(&config(5)).unwrap();
        let v = producer.ingest(&ramp(5)).unwrap().unwrap();
        assert!([0.0, 0.25, 0.5, 0.75, 1.0].contains(&v), "got {v}");
    }

    #[test]
    fn test_ingest_normalizes_channels_independently() {
        let mut producer = Producer::new(&config(4)).unwrap();
        // Each channel maps to {0, 1} on its own scale.
        let batch = SampleBatch::new(vec![vec![-100.0, 100.0], vec![3.0, 4.0]]);
        let v = producer.ingest(&batch).unwrap().unwrap();
        assert!(v == 0.0 || v == 1.0);
    }

    #[test]
    fn test_ingest_drops_degenerate_channels() {
        let mut producer = Producer::new(&config(100)).unwrap();
        let batch = SampleBatch::new(vec![vec![], vec![f64::NAN, 1.0], vec![1.0, 2.0, 3.0]]);
        assert_eq!(producer.ingest(&batch), Ok(None));
        assert_eq!(producer.staged(), 3);
        assert_eq!(producer.stats().degenerate_channels, 2);
    }

    #[test]
    fn test_ingest_all_degenerate_leaves_staging_untouched() {
        let mut producer = Producer::new(&config(100)).unwrap();
        producer.ingest(&ramp(4)).unwrap();
        let batch = SampleBatch::new(vec![vec![], vec![f64::INFINITY]]);
        assert!(matches!(
            producer.ingest(&batch),
            Err(ProducerError::DegenerateBatch(_))
        ));
        assert!(matches!(
            producer.ingest(&SampleBatch::default()),
            Err(ProducerError::DegenerateBatch(_))
        ));
        assert_eq!(producer.staged(), 4);
        assert_eq!(producer.stats().skipped_batches, 2);
    }

    #[test]
    fn test_ingest_constant_channel_contributes_zeros() {
        let mut producer = Producer::new(&config(3)).unwrap();
        let v = producer
            .ingest(&SampleBatch::new(vec![vec![7.0, 7.0, 7.0]]))
            .unwrap();
        assert_eq!(v, Some(0.0));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(Producer::new(&config(0)).is_err());
    }

    // -----------------------------------------------------------------------
    // Loop tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_run_fills_pool_until_shutdown() {
        let shutdown = Shutdown::new();
        let pool = EntropyPool::new(shutdown.clone(), Duration::from_millis(1));
        let source = ReplaySource::from_batches(vec![ramp(5)]);
        let producer = Producer::new(&config(10)).unwrap();

        let (stats, values) = tokio::join!(producer.run(&source, &pool), async {
            let mut values = Vec::new();
            for _ in 0..3 {
                values.push(pool.rand_timeout(Duration::from_secs(2)).await.unwrap());
            }
            shutdown.trigger();
            values
        });

        let stats = stats.unwrap();
        assert_eq!(values.len(), 3);
        assert!(stats.emitted >= 3);
        // Two 5-sample batches per emission.
        assert_eq!(stats.samples, stats.batches * 5);
        assert!(stats.emitted <= stats.batches / 2);
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_run_survives_source_failures() {
        let shutdown = Shutdown::new();
        let pool = EntropyPool::new(shutdown.clone(), Duration::from_millis(1));
        let source = ReplaySource::new(vec![
            Err(SourceError::Unavailable("link down".to_string())),
            Ok(SampleBatch::new(vec![vec![]])),
            Ok(ramp(8)),
        ]);
        let producer = Producer::new(&config(8)).unwrap();

        let (stats, value) = tokio::join!(producer.run(&source, &pool), async {
            let v = pool.rand_timeout(Duration::from_secs(2)).await;
            shutdown.trigger();
            v
        });

        assert!(value.is_ok());
        let stats = stats.unwrap();
        assert!(stats.failures >= 1);
        assert!(stats.skipped_batches >= 1);
    }

    #[tokio::test]
    async fn test_run_times_out_slow_source() {
        let shutdown = Shutdown::new();
        let pool = EntropyPool::new(shutdown.clone(), Duration::from_millis(1));
        let source = ReplaySource::from_batches(vec![ramp(4)]).with_delay(Duration::from_secs(30));
        let producer = Producer::new(&RngConfig {
            request_timeout_ms: Some(5),
            max_consecutive_failures: Some(2),
            ..config(4)
        })
        .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), producer.run(&source, &pool))
            .await
            .expect("timeouts must bound each request");
        assert_eq!(
            result,
            Err(ProducerError::SourceExhausted {
                failures: 2,
                last: SourceError::Timeout(Duration::from_millis(5)),
            })
        );
    }

    #[tokio::test]
    async fn test_run_exhausted_source_closes_pool() {
        let pool = EntropyPool::new(Shutdown::new(), Duration::from_millis(1));
        let source = ReplaySource::new(vec![Err(SourceError::Unavailable("gone".to_string()))]);
        let producer = Producer::new(&RngConfig {
            max_consecutive_failures: Some(3),
            ..config(4)
        })
        .unwrap();

        let result = producer.run(&source, &pool).await;
        assert!(matches!(
            result,
            Err(ProducerError::SourceExhausted { failures: 3, .. })
        ));
        assert_eq!(source.requests(), 3);
        assert!(pool.is_closed());
        assert_eq!(
            pool.rand().await,
            Err(crate::pool::PoolError::Closed)
        );
    }

    #[tokio::test]
    async fn test_run_exits_immediately_when_already_cancelled() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let pool = EntropyPool::new(shutdown, Duration::from_millis(1));
        let source = ReplaySource::from_batches(vec![ramp(4)]);
        let stats = Producer::new(&config(4))
            .unwrap()
            .run(&source, &pool)
            .await
            .unwrap();
        assert_eq!(source.requests(), 0);
        assert_eq!(stats, ProducerStats::default());
    }

    #[tokio::test]
    async fn test_run_finishes_in_flight_request_before_exit() {
        let shutdown = Shutdown::new();
        let pool = EntropyPool::new(shutdown.clone(), Duration::from_millis(1));
        let source = ReplaySource::from_batches(vec![ramp(4)]).with_delay(Duration::from_millis(50));
        let producer = Producer::new(&config(4)).unwrap();

        let (stats, _) = tokio::join!(producer.run(&source, &pool), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            shutdown.trigger();
        });

        let stats = stats.unwrap();
        assert_eq!(source.requests(), 1);
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.emitted, 1);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_run_records_from_configured_mea() {
        let shutdown = Shutdown::new();
        let pool = EntropyPool::new(shutdown.clone(), Duration::from_millis(1));
        let source = ReplaySource::from_batches(vec![ramp(4)]);
        let producer = Producer::new(&RngConfig {
            mea: MeaId::new(2).unwrap(),
            ..config(4)
        })
        .unwrap();

        let (stats, _) = tokio::join!(producer.run(&source, &pool), async {
            let _ = pool.rand_timeout(Duration::from_secs(2)).await;
            shutdown.trigger();
        });
        stats.unwrap();
        assert_eq!(source.last_mea(), MeaId::new(2).ok());
    }

    #[tokio::test]
    async fn test_panicking_source_closes_pool() {
        let pool = std::sync::Arc::new(EntropyPool::new(Shutdown::new(), Duration::from_millis(1)));
        let task = {
            let pool = std::sync::Arc::clone(&pool);
            tokio::spawn(async move {
                Producer::new(&config(4))
                    .unwrap()
                    .run(&FaultySource, &pool)
                    .await
            })
        };
        assert!(task.await.unwrap_err().is_panic());
        assert!(pool.is_closed());
        assert_eq!(pool.rand().await, Err(crate::pool::PoolError::Closed));
    }

    #[tokio::test]
    async fn test_dropped_run_future_closes_pool() {
        let pool = EntropyPool::new(Shutdown::new(), Duration::from_millis(1));
        let source = ReplaySource::from_batches(vec![ramp(4)]).with_delay(Duration::from_secs(30));
        let producer = Producer::new(&RngConfig {
            request_timeout_ms: None,
            ..config(4)
        })
        .unwrap();

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), producer.run(&source, &pool)).await;
        assert!(outcome.is_err());
        assert!(pool.is_closed());
    }
}
