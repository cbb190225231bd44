use std::time::{Duration, Instant};

use biorng_core::summarize;

use super::{CommandResult, make_rng, runtime};
use crate::SourceArgs;

/// Per-draw limit; a bench that stalls this long is broken, not slow.
const DRAW_TIMEOUT: Duration = Duration::from_secs(30);

pub fn run(args: &SourceArgs, draws: usize, output: Option<&str>) -> CommandResult {
    if draws == 0 {
        return Err("--draws must be at least 1".into());
    }
    runtime()?.block_on(async {
        let rng = make_rng(args)?;
        println!(
            "Benchmarking {draws} draws from {} ({}, sample size {})...\n",
            rng.source_name(),
            rng.config().mea,
            rng.config().sample_size
        );

        let start = Instant::now();
        let mut first = None;
        let mut values = Vec::with_capacity(draws);
        for _ in 0..draws {
            values.push(rng.rand_timeout(DRAW_TIMEOUT).await?);
            if first.is_none() {
                first = Some(start.elapsed());
            }
        }
        let elapsed = start.elapsed();
        let first = first.unwrap_or_default();
        let pool = rng.status();
        let stats = rng.shutdown().await?;
        let report = summarize(&values);
        let rate = draws as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

        println!("  first value      {:>10.1} ms", first.as_secs_f64() * 1e3);
        println!("  total            {:>10.1} ms", elapsed.as_secs_f64() * 1e3);
        println!("  throughput       {rate:>10.1} values/s");
        println!(
            "  pool             {} queued, {} produced, {} rejected",
            pool.available, pool.produced, pool.rejected
        );
        println!(
            "  producer         {} batches, {} samples, {} failures",
            stats.batches, stats.samples, stats.failures
        );
        if stats.degenerate_channels > 0 || stats.skipped_batches > 0 {
            println!(
                "                   {} degenerate channels, {} skipped batches",
                stats.degenerate_channels, stats.skipped_batches
            );
        }

        println!("\n{}", "=".repeat(48));
        println!("  Quality grade    {}  ({:.1}/100)", report.grade, report.quality_score);
        println!("{}", "-".repeat(48));
        println!("  mean             {:>10.4}   (ideal 0.5)", report.mean);
        println!("  variance         {:>10.4}   (ideal 0.0833)", report.variance);
        println!("  chi-square       {:>10.2}   (9 dof)", report.chi_square);
        println!("  lag-1 autocorr   {:>10.4}   (ideal 0)", report.lag1_autocorrelation);
        println!("\nQuality checks are smoke tests, not a certification battery.");

        if let Some(path) = output {
            let doc = serde_json::json!({
                "version": biorng_core::VERSION,
                "source": rng_source_label(args),
                "draws": draws,
                "first_value_ms": first.as_secs_f64() * 1e3,
                "elapsed_ms": elapsed.as_secs_f64() * 1e3,
                "values_per_second": rate,
                "producer": stats,
                "quality": report,
            });
            std::fs::write(path, serde_json::to_string_pretty(&doc)?)?;
            println!("Results written to {path}");
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn rng_source_label(args: &SourceArgs) -> String {
    format!(
        "simulated ({} electrodes x {} samples)",
        args.electrodes, args.samples_per_electrode
    )
}
