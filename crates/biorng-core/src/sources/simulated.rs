//! SimulatedMea: synthetic multi-electrode array recordings.
//!
//! Stands in for a live organoid MEA. Each electrode trace is Gaussian
//! background noise (Box–Muller over the `rand` uniform generator) riding on
//! a slow sinusoidal drift, with occasional action-potential-like spikes.
//! Values are in microvolts.

use std::f64::consts::TAU;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::source::{MeaId, SampleBatch, SampleSource, SourceError, SourceInfo, SourceKind};

static SIMULATED_MEA_INFO: SourceInfo = SourceInfo {
    name: "simulated_mea",
    description: "Synthetic organoid MEA recording (Gaussian noise, drift, spikes)",
    physics: "Models extracellular field potentials picked up by planar electrodes: \
              thermal and biological background noise of a few microvolts, slow \
              baseline wander from electrode polarisation, and sparse spikes from \
              neurons firing near an electrode.",
    kind: SourceKind::Simulated,
};

/// Shape of the simulated recording.
#[derive(Debug, Clone)]
pub struct SimulatedMeaConfig {
    /// Electrodes per MEA; one trace per electrode in every batch.
    pub electrodes: usize,
    /// Samples recorded per electrode per batch.
    pub samples_per_electrode: usize,
    /// Standard deviation of background noise (µV).
    pub noise_uv: f64,
    /// Amplitude of the slow baseline drift (µV).
    pub drift_uv: f64,
    /// Probability that any given sample starts a spike.
    pub spike_probability: f64,
    /// Peak spike amplitude (µV, negative-going).
    pub spike_uv: f64,
    /// Simulated acquisition time per batch.
    pub latency: Duration,
    /// Fixed seed for reproducible recordings.
    pub seed: Option<u64>,
}

impl Default for SimulatedMeaConfig {
    fn default() -> Self {
        Self {
            electrodes: 8,
            samples_per_electrode: 64,
            noise_uv: 6.0,
            drift_uv: 15.0,
            spike_probability: 0.002,
            spike_uv: 80.0,
            latency: Duration::from_millis(5),
            seed: None,
        }
    }
}

/// Sample source producing synthetic MEA traces.
pub struct SimulatedMea {
    config: SimulatedMeaConfig,
    rng: Mutex<StdRng>,
    /// Per-MEA running sample clock, so drift continues across batches.
    clocks: [AtomicU64; crate::source::MEA_COUNT as usize],
}

impl SimulatedMea {
    pub fn new(config: SimulatedMeaConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
            clocks: Default::default(),
        }
    }

    pub fn config(&self) -> &SimulatedMeaConfig {
        &self.config
    }

    fn record(&self, mea: MeaId) -> Result<SampleBatch, SourceError> {
        let cfg = &self.config;
        if cfg.electrodes == 0 || cfg.samples_per_electrode == 0 {
            return Err(SourceError::Malformed(
                "simulated MEA configured with no samples".to_string(),
            ));
        }

        let clock = &self.clocks[usize::from(mea.get() - 1)];
        let t0 = clock.fetch_add(cfg.samples_per_electrode as u64, Ordering::Relaxed);

        let mut rng = self
            .rng
            .lock()
            .map_err(|_| SourceError::Unavailable("simulator state poisoned".to_string()))?;

        let mut channels = Vec::with_capacity(cfg.electrodes);
        for electrode in 0..cfg.electrodes {
            // Each electrode drifts with its own phase.
            let phase = electrode as f64 * 0.7 + f64::from(mea.get());
            let mut trace = Vec::with_capacity(cfg.samples_per_electrode);
            let mut spike_left = 0usize;
            for i in 0..cfg.samples_per_electrode {
                let t = (t0 + i as u64) as f64;
                let drift = cfg.drift_uv * (TAU * t / 5000.0 + phase).sin();
                let mut v = drift + cfg.noise_uv * gaussian(&mut *rng);

                if spike_left == 0 && rng.random_bool(cfg.spike_probability.clamp(0.0, 1.0)) {
                    spike_left = 3;
                }
                if spike_left > 0 {
                    v -= cfg.spike_uv * spike_left as f64 / 3.0;
                    spike_left -= 1;
                }
                trace.push(v);
            }
            channels.push(trace);
        }
        Ok(SampleBatch::new(channels))
    }
}

impl Default for SimulatedMea {
    fn default() -> Self {
        Self::new(SimulatedMeaConfig::default())
    }
}

impl SampleSource for SimulatedMea {
    fn info(&self) -> &SourceInfo {
        &SIMULATED_MEA_INFO
    }

    async fn request_batch(&self, mea: MeaId) -> Result<SampleBatch, SourceError> {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        self.record(mea)
    }
}

/// Standard normal deviate via Box–Muller.
fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    // (0, 1] keeps ln() finite.
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}
