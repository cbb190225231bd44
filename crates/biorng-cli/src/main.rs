//! CLI for biorng: random numbers from organoid electrical noise.

mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "biorng")]
#[command(about = "biorng: random numbers harvested from living neurons")]
#[command(version = biorng_core::VERSION)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Generator settings. Each flag overrides the matching `BIORNG_*` variable.
#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Normalized samples staged per pool entry (default: 100)
    #[arg(long, global = true)]
    sample_size: Option<usize>,

    /// MEA to record from, 1-4 (default: 4)
    #[arg(long, global = true)]
    mea: Option<u8>,

    /// Seed the staging selection and the simulator for reproducible output
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Electrodes per simulated MEA
    #[arg(long, global = true, default_value = "8")]
    electrodes: usize,

    /// Samples per electrode per simulated recording
    #[arg(long, global = true, default_value = "64")]
    samples_per_electrode: usize,

    /// Simulated acquisition latency per recording in milliseconds
    #[arg(long, global = true, default_value = "5")]
    latency_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw uniform floats in [0, 1]
    Rand {
        /// Number of values to print
        #[arg(long, short = 'n', default_value = "1")]
        count: usize,

        /// Give up on a draw after this many milliseconds (0 = wait forever)
        #[arg(long, default_value = "10000")]
        timeout_ms: u64,
    },

    /// Draw uniform integers in [min, max]
    Int {
        /// Inclusive lower bound
        #[arg(long, allow_hyphen_values = true)]
        min: i64,

        /// Inclusive upper bound
        #[arg(long, allow_hyphen_values = true)]
        max: i64,

        /// Number of values to print
        #[arg(long, short = 'n', default_value = "1")]
        count: usize,

        /// Give up on a draw after this many milliseconds (0 = wait forever)
        #[arg(long, default_value = "10000")]
        timeout_ms: u64,
    },

    /// Draw a run of values and report throughput and uniformity
    Bench {
        /// Number of values to draw
        #[arg(long, default_value = "2000")]
        draws: usize,

        /// Write the report as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Start the HTTP entropy server
    Server {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port
        #[arg(long, default_value = "8042")]
        port: u16,

        /// Per-draw timeout in milliseconds before answering 503
        #[arg(long, default_value = "2000")]
        draw_timeout_ms: u64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Rand { count, timeout_ms } => commands::rand::run(&cli.source, count, timeout_ms),
        Commands::Int {
            min,
            max,
            count,
            timeout_ms,
        } => commands::int::run(&cli.source, min, max, count, timeout_ms),
        Commands::Bench { draws, output } => {
            commands::bench::run(&cli.source, draws, output.as_deref())
        }
        Commands::Server {
            host,
            port,
            draw_timeout_ms,
        } => commands::server::run(&cli.source, &host, port, draw_timeout_ms),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
