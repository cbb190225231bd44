use std::time::Duration;

use super::{CommandResult, make_rng, runtime};
use crate::SourceArgs;

pub fn run(args: &SourceArgs, host: &str, port: u16, draw_timeout_ms: u64) -> CommandResult {
    runtime()?.block_on(async {
        let rng = make_rng(args)?;
        let base = format!("http://{host}:{port}");
        let config = rng.config();

        println!("🧠 BioRNG Server v{}", biorng_core::VERSION);
        println!("   {base}");
        println!(
            "   source: {} ({}), sample size {}",
            rng.source_name(),
            config.mea,
            config.sample_size
        );
        println!();
        println!("   Endpoints:");
        println!("     GET /                 API index (try: curl {base})");
        println!("     GET /api/v1/rand      Uniform floats in [0, 1]");
        println!("     GET /api/v1/randint   Uniform integers in [min, max]");
        println!("     GET /health           Pool and producer status");
        println!();
        println!("   Examples:");
        println!("     curl {base}/api/v1/rand?count=8");
        println!("     curl '{base}/api/v1/randint?min=1&max=6&count=10'");
        println!();

        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for Ctrl-C: {e}");
            }
        };
        biorng_server::run_server(
            &rng,
            host,
            port,
            Duration::from_millis(draw_timeout_ms.max(1)),
            ctrl_c,
        )
        .await?;

        log::info!("server stopped, shutting down producer");
        super::finish(rng).await
    })
}
