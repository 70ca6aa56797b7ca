//! Benchmark sweeps and CSV reports.
//!
//! This layer consumes the core (final matrices, wall-clock times) and
//! contributes no algorithmic behavior: it iterates matrix sizes, runs the
//! selected kernel, and records one row per size. Distributed sweeps form
//! an in-process group, one thread per rank, and average the per-rank
//! times, since every rank clocks its own fill between the same barriers.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use log::{debug, info};

use crate::comm::{ChannelComm, CommError, Communicator};
use crate::distributed::DistributedKernel;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::parallel::ParallelKernel;
use crate::sequential::SequentialKernel;
use crate::store::{StoragePolicy, TriangularStore};

/// Execution model selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sequential,
    Parallel,
    Distributed,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Sequential => "sequential",
            Mode::Parallel => "parallel",
            Mode::Distributed => "distributed",
        })
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "sequential" => Ok(Mode::Sequential),
            "parallel" => Ok(Mode::Parallel),
            "distributed" => Ok(Mode::Distributed),
            other => Err(format!(
                "unknown mode '{other}' (expected sequential, parallel or distributed)"
            )),
        }
    }
}

/// One timed fill.
#[derive(Debug, Clone)]
pub struct SweepRecord {
    pub size: usize,
    pub mode: Mode,
    /// Worker threads (parallel) or group size (distributed); 1 otherwise.
    pub workers: usize,
    pub seconds: f64,
}

/// What to run: which kernel, how wide, over which sizes.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub mode: Mode,
    pub sizes: Vec<usize>,
    /// Worker count for the parallel kernel; 0 selects all hardware threads.
    pub workers: usize,
    /// Group size for the distributed kernel; 0 selects all hardware threads.
    pub procs: usize,
    pub policy: StoragePolicy,
}

/// Run the configured sweep, invoking `observe` after each size completes.
pub fn run_sweep(
    config: &SweepConfig,
    mut observe: impl FnMut(&SweepRecord),
) -> Result<Vec<SweepRecord>> {
    let mut records = Vec::with_capacity(config.sizes.len());
    for &size in &config.sizes {
        let record = match config.mode {
            Mode::Sequential => {
                time_fill(Mode::Sequential, size, config.policy, 1, &SequentialKernel)?
            }
            Mode::Parallel => {
                let kernel = ParallelKernel::new(config.workers)?;
                time_fill(Mode::Parallel, size, config.policy, kernel.workers(), &kernel)?
            }
            Mode::Distributed => time_distributed(size, config.policy, config.procs)?,
        };
        info!(
            "{} fill of size {} took {:.6} s",
            record.mode, record.size, record.seconds
        );
        observe(&record);
        records.push(record);
    }
    Ok(records)
}

fn time_fill(
    mode: Mode,
    size: usize,
    policy: StoragePolicy,
    workers: usize,
    kernel: &dyn Kernel,
) -> Result<SweepRecord> {
    debug!("timing {} fill of size {size}", kernel.name());
    let mut store = TriangularStore::with_policy(size, policy)?;
    let started = Instant::now();
    kernel.fill(&mut store)?;
    let seconds = started.elapsed().as_secs_f64();
    Ok(SweepRecord {
        size,
        mode,
        workers,
        seconds,
    })
}

fn time_distributed(size: usize, policy: StoragePolicy, procs: usize) -> Result<SweepRecord> {
    let procs = if procs == 0 { num_cpus::get() } else { procs };
    let group = ChannelComm::group(procs);
    let times: Vec<f64> = thread::scope(|scope| {
        let handles: Vec<_> = group
            .into_iter()
            .map(|comm| {
                scope.spawn(move || -> Result<f64> {
                    let mut store = TriangularStore::with_policy(size, policy)?;
                    let kernel = DistributedKernel::new(comm);
                    debug!(
                        "rank {} timing {} fill of size {size}",
                        kernel.communicator().rank(),
                        kernel.name()
                    );
                    let started = Instant::now();
                    kernel.fill(&mut store)?;
                    Ok(started.elapsed().as_secs_f64())
                })
            })
            .collect();
        let mut times = Vec::with_capacity(procs);
        for handle in handles {
            let seconds = handle
                .join()
                .map_err(|_| Error::from(CommError::Disconnected { op: "fill" }))??;
            times.push(seconds);
        }
        Ok::<_, Error>(times)
    })?;
    let seconds = times.iter().sum::<f64>() / times.len() as f64;
    Ok(SweepRecord {
        size,
        mode: Mode::Distributed,
        workers: procs,
        seconds,
    })
}

/// Write one CSV row per record, newest report replacing any previous file.
pub fn write_report(path: &Path, records: &[SweepRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["dimension", "mode", "workers", "seconds"])?;
    for record in records {
        writer.write_record([
            record.size.to_string(),
            record.mode.to_string(),
            record.workers.to_string(),
            format!("{:.9}", record.seconds),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_strings() {
        for mode in [Mode::Sequential, Mode::Parallel, Mode::Distributed] {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
        assert!("turbo".parse::<Mode>().is_err());
    }

    #[test]
    fn sequential_sweep_records_every_size() {
        let config = SweepConfig {
            mode: Mode::Sequential,
            sizes: vec![1, 4, 8],
            workers: 0,
            procs: 0,
            policy: StoragePolicy::Contiguous,
        };
        let mut observed = 0;
        let records = run_sweep(&config, |_| observed += 1).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(observed, 3);
        assert!(records.iter().all(|r| r.seconds >= 0.0));
        assert_eq!(records[1].size, 4);
    }

    #[test]
    fn distributed_sweep_averages_rank_times() {
        let config = SweepConfig {
            mode: Mode::Distributed,
            sizes: vec![6],
            workers: 0,
            procs: 2,
            policy: StoragePolicy::Contiguous,
        };
        let records = run_sweep(&config, |_| {}).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].workers, 2);
    }

    #[test]
    fn csv_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let records = vec![
            SweepRecord {
                size: 64,
                mode: Mode::Sequential,
                workers: 1,
                seconds: 0.001,
            },
            SweepRecord {
                size: 128,
                mode: Mode::Parallel,
                workers: 4,
                seconds: 0.002,
            },
        ];
        write_report(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("dimension,mode,workers,seconds"));
        assert_eq!(lines.clone().count(), 2);
        assert!(lines.next().unwrap().starts_with("64,sequential,1,"));
    }
}
