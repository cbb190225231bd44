pub mod bench;
pub mod int;
pub mod rand;
pub mod server;

use std::time::Duration;

use biorng_core::{BioRng, MeaId, RngConfig, SimulatedMea, SimulatedMeaConfig};

use crate::SourceArgs;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Resolve the generator config: defaults, then `BIORNG_*`, then flags.
pub fn make_config(args: &SourceArgs) -> Result<RngConfig, Box<dyn std::error::Error>> {
    let mut config = RngConfig::from_env()?;
    if let Some(sample_size) = args.sample_size {
        config.sample_size = sample_size;
    }
    if let Some(mea) = args.mea {
        config.mea = MeaId::new(mea)?;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    config.validate()?;
    Ok(config)
}

/// Start a generator over the simulated MEA. Must run inside a tokio runtime.
pub fn make_rng(args: &SourceArgs) -> Result<BioRng, Box<dyn std::error::Error>> {
    let config = make_config(args)?;
    let source = SimulatedMea::new(SimulatedMeaConfig {
        electrodes: args.electrodes,
        samples_per_electrode: args.samples_per_electrode,
        latency: Duration::from_millis(args.latency_ms),
        // Decouple the simulator stream from the selection stream.
        seed: config.seed.map(|s| s.wrapping_add(1)),
        ..SimulatedMeaConfig::default()
    });
    log::debug!("generator config: {config:?}");
    Ok(BioRng::spawn(source, config)?)
}

/// `None` for 0, meaning no bound.
pub fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
}

/// Stop the generator and log what it did.
pub async fn finish(rng: BioRng) -> CommandResult {
    let stats = rng.shutdown().await?;
    log::info!(
        "producer: {} batches, {} samples, {} emitted, {} failures",
        stats.batches,
        stats.samples,
        stats.emitted,
        stats.failures
    );
    Ok(())
}
