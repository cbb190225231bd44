//! ReplaySource: plays back a fixed script of batches and failures.
//!
//! Each request returns the next scripted step, wrapping around at the end.
//! Useful for deterministic pipelines and for exercising failure handling.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::source::{MeaId, SampleBatch, SampleSource, SourceError, SourceInfo, SourceKind};

static REPLAY_INFO: SourceInfo = SourceInfo {
    name: "replay",
    description: "Scripted playback of recorded or synthetic batches",
    physics: "None; replays whatever it was given.",
    kind: SourceKind::Replay,
};

/// Sample source that cycles through a fixed script.
pub struct ReplaySource {
    script: Vec<Result<SampleBatch, SourceError>>,
    cursor: AtomicUsize,
    requests: AtomicUsize,
    last_mea: Mutex<Option<MeaId>>,
    delay: Duration,
}

impl ReplaySource {
    /// Replay `script` in order, forever.
    pub fn new(script: Vec<Result<SampleBatch, SourceError>>) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            last_mea: Mutex::new(None),
            delay: Duration::ZERO,
        }
    }

    /// Replay only successful batches.
    pub fn from_batches(batches: Vec<SampleBatch>) -> Self {
        Self::new(batches.into_iter().map(Ok).collect())
    }

    /// Delay every request by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// MEA named by the most recent request.
    pub fn last_mea(&self) -> Option<MeaId> {
        self.last_mea.lock().ok().and_then(|m| *m)
    }

    fn next_step(&self) -> Result<SampleBatch, SourceError> {
        if self.script.is_empty() {
            return Err(SourceError::Unavailable("replay script is empty".to_string()));
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) % self.script.len();
        self.script[i].clone()
    }
}

impl SampleSource for ReplaySource {
    fn info(&self) -> &SourceInfo {
        &REPLAY_INFO
    }

    async fn request_batch(&self, mea: MeaId) -> Result<SampleBatch, SourceError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_mea.lock() {
            *last = Some(mea);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next_step()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_cycles_script() {
        let a = SampleBatch::new(vec![vec![1.0, 2.0]]);
        let b = SampleBatch::new(vec![vec![3.0]]);
        let source = ReplaySource::from_batches(vec![a.clone(), b.clone()]);
        let mea = MeaId::DEFAULT;
        assert_eq!(source.request_batch(mea).await.unwrap(), a);
        assert_eq!(source.request_batch(mea).await.unwrap(), b);
        assert_eq!(source.request_batch(mea).await.unwrap(), a);
        assert_eq!(source.requests(), 3);
    }

    #[tokio::test]
    async fn test_replay_scripted_failure() {
        let source = ReplaySource::new(vec![
            Err(SourceError::Unavailable("offline".to_string())),
            Ok(SampleBatch::new(vec![vec![0.5]])),
        ]);
        let mea = MeaId::new(1).unwrap();
        assert!(source.request_batch(mea).await.is_err());
        assert!(source.request_batch(mea).await.is_ok());
        assert_eq!(source.last_mea(), Some(mea));
    }

    #[tokio::test]
    async fn test_replay_empty_script_is_unavailable() {
        let source = ReplaySource::new(Vec::new());
        let err = source.request_batch(MeaId::DEFAULT).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
