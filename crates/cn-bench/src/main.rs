//! The cannon-matmul benchmark driver.
//!
//! Multiplies two N x N matrices with Cannon's algorithm on a grid of
//! in-process workers, verifies the result and prints
//! `N, elapsed_seconds, flops, workers`.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use env_logger::{Builder, Target};
use log::LevelFilter;

use cn_block::{Block, KernelKind};
use cn_grid::{CannonConfig, IdentityFixture, MatrixSource, RandomIntegerFixture, RunReport};

/// Matrices smaller than this are printed in full.
const PRINT_LIMIT: usize = 32;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Fixture {
    /// A(r, c) = r·N + c, B = I
    Identity,
    /// Seeded random small integers
    Random,
}

#[derive(Parser)]
#[command(name = "cn-bench", author, version, about, long_about = None)]
struct Cli {
    /// Side length N of the matrices
    #[arg(short = 'n', long, default_value_t = cn_grid::config::DEFAULT_MATRIX_DIM)]
    matrix_dim: usize,

    /// Number of workers; must be a perfect square dividing N evenly
    #[arg(short, long, default_value_t = cn_grid::config::DEFAULT_WORKERS)]
    workers: usize,

    /// Local multiply backend [ sequential, parallel, offload ]
    #[arg(short, long, default_value_t = KernelKind::Sequential)]
    kernel: KernelKind,

    /// Threads for the parallel/offload backends (default: one per core)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Input matrices
    #[arg(long, value_enum, default_value_t = Fixture::Identity)]
    fixture: Fixture,

    /// Seed for the random fixture
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Set log filter value [ off, error, warn, info, debug, trace ]
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

/// Process exit status for a finished run: 0 on a verified product, 1 when
/// the product disagrees with the reference, 2 for every other failure.
fn exit_status(result: &cn_grid::Result<RunReport>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(e) if e.is_mismatch() => 1,
        Err(_) => 2,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    Builder::new()
        .filter_level(cli.log_level)
        .parse_default_env()
        .target(Target::Stderr)
        .init();

    let config = CannonConfig::new(cli.matrix_dim, cli.workers)
        .with_kernel(cli.kernel)
        .with_threads(cli.threads);
    let source: Arc<dyn MatrixSource> = match cli.fixture {
        Fixture::Identity => Arc::new(IdentityFixture::new(cli.matrix_dim)),
        Fixture::Random => Arc::new(RandomIntegerFixture::new(cli.matrix_dim, cli.seed)),
    };

    println!("initializing blocks");
    if cli.matrix_dim < PRINT_LIMIT {
        println!("\nInitial array");
        print!("{}", Block::from_fn(cli.matrix_dim, |i, j| source.a(i, j)));
    }
    let result = cn_grid::run(&config, source);
    match &result {
        Ok(report) => {
            if report.matrix_dim < PRINT_LIMIT {
                println!("\nFinal array");
                print!("{}", report.assemble());
            }
            println!("{}", report.csv_line());
        }
        Err(e) if e.is_mismatch() => println!("{}", e),
        Err(e) => log::error!("{}", e),
    }
    ExitCode::from(exit_status(&result))
}
