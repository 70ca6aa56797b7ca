//! Command-line driver.
//!
//! Owns everything the core treats as external: argument parsing, logger
//! setup, the progress bar, kernel selection, the CSV report, and the
//! in-process group bootstrap for distributed runs. The core only ever
//! sees a store, a kernel, and (for distributed fills) a communicator.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use log::info;

use trifront::Kernel;
use trifront::sequential::SequentialKernel;
use trifront::store::{StoragePolicy, TriangularStore};
use trifront::sweep::{self, Mode, SweepConfig};

/// Largest size worth dumping to the terminal.
const PRINT_LIMIT: usize = 64;

#[derive(Parser, Debug)]
#[clap(
    name = "trifront",
    version,
    about = "Wavefront fill engine for packed upper-triangular matrices."
)]
struct Args {
    /// Execution model: sequential, parallel or distributed.
    #[clap(long, default_value = "sequential")]
    mode: Mode,

    /// Matrix sizes to sweep.
    #[clap(long, value_delimiter = ',', default_value = "1024,2048,4096,8192")]
    sizes: Vec<usize>,

    /// Worker threads for the parallel kernel; 0 = all hardware threads.
    #[clap(long, default_value_t = 0)]
    workers: usize,

    /// Process-group size for the distributed kernel; 0 = all hardware threads.
    #[clap(long, default_value_t = 0)]
    procs: usize,

    /// Split storage across this many memory nodes; 0 = one buffer.
    #[clap(long, default_value_t = 0)]
    nodes: usize,

    /// Write a CSV report to this path.
    #[clap(long)]
    csv: Option<PathBuf>,

    /// Print each filled matrix (sequential reference, sizes up to 64).
    #[clap(long)]
    print: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(error) = run(&args) {
        eprintln!("error: {error}");
        process::exit(1);
    }
}

fn run(args: &Args) -> trifront::Result<()> {
    let policy = if args.nodes == 0 {
        StoragePolicy::Contiguous
    } else {
        StoragePolicy::Partitioned { nodes: args.nodes }
    };
    let config = SweepConfig {
        mode: args.mode,
        sizes: args.sizes.clone(),
        workers: args.workers,
        procs: args.procs,
        policy,
    };
    info!(
        "sweeping sizes [{}] with the {} kernel",
        config.sizes.iter().join(", "),
        config.mode
    );

    let bar = ProgressBar::new(config.sizes.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("[{bar:50}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let records = sweep::run_sweep(&config, |record| {
        bar.set_message(format!("size {} done", record.size));
        bar.inc(1);
    })?;
    bar.finish_with_message("sweep complete");

    if let Some(path) = &args.csv {
        sweep::write_report(path, &records)?;
        info!("report written to {}", path.display());
    }

    if args.print {
        for &size in args.sizes.iter().filter(|&&size| size <= PRINT_LIMIT) {
            let mut store = TriangularStore::with_policy(size, policy)?;
            SequentialKernel.fill(&mut store)?;
            println!("{store}");
        }
    }
    Ok(())
}
