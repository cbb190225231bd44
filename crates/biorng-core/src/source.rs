//! Abstract sample source trait and the data it yields.
//!
//! Every sample provider implements the [`SampleSource`] trait, which provides
//! metadata via [`SourceInfo`] and asynchronous batch acquisition from one of
//! the multi-electrode arrays addressed by [`MeaId`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of MEAs a recording site exposes.
pub const MEA_COUNT: u8 = 4;

/// Kind of sample source based on where its signal comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Live electrical activity from neural tissue.
    Biological,
    /// Synthetic signal generated in-process.
    Simulated,
    /// Pre-recorded or scripted batches.
    Replay,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Biological => write!(f, "biological"),
            Self::Simulated => write!(f, "simulated"),
            Self::Replay => write!(f, "replay"),
        }
    }
}

/// Metadata about a sample source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Unique identifier (e.g. `"simulated_mea"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    /// Where the noise physically comes from.
    pub physics: &'static str,
    /// Source kind for classification.
    pub kind: SourceKind,
}

/// Identifier of a multi-electrode array, `1..=MEA_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MeaId(u8);

impl MeaId {
    /// The last available MEA, used when nothing else is configured.
    pub const DEFAULT: MeaId = MeaId(MEA_COUNT);

    /// Validate an MEA number.
    pub fn new(id: u8) -> Result<Self, InvalidMeaId> {
        if (1..=MEA_COUNT).contains(&id) {
            Ok(Self(id))
        } else {
            Err(InvalidMeaId(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for MeaId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for MeaId {
    type Error = InvalidMeaId;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<MeaId> for u8 {
    fn from(id: MeaId) -> u8 {
        id.0
    }
}

impl std::fmt::Display for MeaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MEA {}", self.0)
    }
}

/// An MEA number outside `1..=MEA_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("MEA id {0} out of range 1..={MEA_COUNT}")]
pub struct InvalidMeaId(pub u8);

/// One raw recording event: a trace per electrode.
///
/// Consumed and dropped within a single producer cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBatch {
    pub channels: Vec<Vec<f64>>,
}

impl SampleBatch {
    pub fn new(channels: Vec<Vec<f64>>) -> Self {
        Self { channels }
    }

    /// Total raw samples across every channel.
    pub fn sample_count(&self) -> usize {
        self.channels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }
}

/// Failure to obtain a batch. Always recoverable from the producer's view.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The source could not be reached or refused the request.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The request did not complete in time.
    #[error("sample request timed out after {0:?}")]
    Timeout(Duration),
    /// The source answered with something that is not a batch.
    #[error("malformed batch: {0}")]
    Malformed(String),
}

/// Trait that every sample provider must implement.
///
/// `request_batch` is the producer's only suspension point tied to the
/// outside world. Implementations may take arbitrarily long; the producer
/// applies its own timeout around the call.
pub trait SampleSource: Send + Sync {
    /// Source metadata.
    fn info(&self) -> &SourceInfo;

    /// Record one batch from the given MEA.
    fn request_batch(
        &self,
        mea: MeaId,
    ) -> impl Future<Output = Result<SampleBatch, SourceError>> + Send;

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}
