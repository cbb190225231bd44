//! # biorng-core
//!
//! **Random numbers from living neurons.**
//!
//! `biorng-core` turns the electrical noise recorded by multi-electrode
//! arrays (MEAs) under brain organoids into a stream of uniformly distributed
//! scalars, and serves them through a small async API.
//!
//! ## Quick Start
//!
//! ```no_run
//! use biorng_core::{BioRng, RngConfig, SimulatedMea};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let rng = BioRng::spawn(SimulatedMea::default(), RngConfig::from_env()?)?;
//!
//! let x = rng.rand().await?;          // f64 in [0, 1]
//! let die = rng.rand_int(1, 6).await?; // i64 in [1, 6]
//! println!("{x:.6} {die}");
//!
//! let stats = rng.shutdown().await?;
//! println!("{} values produced", stats.emitted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Source → Normalize (per channel) → Staging buffer → Pool → Consumers
//!
//! - A single [`Producer`] task requests [`SampleBatch`]es from a
//!   [`SampleSource`], min-max [`normalize`]s every electrode trace, and
//!   stages the results. Once `sample_size` samples are staged, one is picked
//!   uniformly at random and appended to the [`EntropyPool`].
//! - Consumers pop from the pool head in FIFO order. An empty pool makes
//!   `rand` wait, polling every `poll_interval` and woken early on push.
//! - A shared [`Shutdown`] signal stops the producer at the next iteration
//!   boundary and turns pending waits into [`PoolError::Cancelled`].
//!
//! This is not a CSPRNG. Output quality is only as good as the recording.

pub mod config;
pub mod normalize;
pub mod pool;
pub mod producer;
pub mod quality;
pub mod rng;
pub mod shutdown;
pub mod source;
pub mod sources;

pub use config::{ConfigError, RngConfig};
pub use normalize::{NormalizeError, normalize};
pub use pool::{DEFAULT_POLL_INTERVAL, EntropyPool, PoolError, PoolStatus, scale_to_range};
pub use producer::{Producer, ProducerError, ProducerStats};
pub use quality::{QualityReport, summarize};
pub use rng::BioRng;
pub use shutdown::Shutdown;
pub use source::{
    InvalidMeaId, MEA_COUNT, MeaId, SampleBatch, SampleSource, SourceError, SourceInfo, SourceKind,
};
pub use sources::{ReplaySource, SimulatedMea, SimulatedMeaConfig};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
