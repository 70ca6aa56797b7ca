//! Shared-memory wavefront kernel.
//!
//! One fork-join per diagonal over a bounded, dedicated thread pool. The
//! workers never touch the store mutably: each computes a disjoint span of
//! a staging buffer while reading entries from strictly lower diagonals,
//! which are immutable for the rest of the diagonal. The pool join plus
//! [`TriangularStore::apply_diagonal`] form the barrier between diagonals;
//! nothing of diagonal k+1 starts before every value of k is published.
//!
//! Static chunking distributes rows evenly. With node-partitioned storage
//! the segments align with contiguous row ranges, so a worker's chunk stays
//! mostly inside one node's memory; reads that cross a segment remain
//! correct, only placement differs.

use log::debug;
use rayon::prelude::*;

use crate::error::Result;
use crate::kernel::{self, Kernel};
use crate::store::TriangularStore;

/// Data-parallel kernel over a bounded worker pool.
///
/// The worker count is fixed for the lifetime of the kernel; build a new
/// instance to reconfigure parallelism.
pub struct ParallelKernel {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl ParallelKernel {
    /// A pool of `workers` threads; `0` selects all available hardware
    /// parallelism.
    pub fn new(workers: usize) -> Result<Self> {
        let workers = if workers == 0 {
            num_cpus::get()
        } else {
            workers
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Kernel for ParallelKernel {
    fn fill(&self, store: &mut TriangularStore) -> Result<()> {
        let n = store.size();
        debug!("parallel fill: size {n}, {} workers", self.workers);
        if n < 2 {
            return Ok(());
        }
        let mut staging = vec![0.0_f64; n - 1];
        for k in 1..n {
            let len = n - k;
            let chunk = len.div_ceil(self.workers);
            {
                let shared: &TriangularStore = store;
                let diagonal = &mut staging[..len];
                self.pool.install(|| {
                    diagonal
                        .par_chunks_mut(chunk)
                        .enumerate()
                        .for_each(|(index, span)| {
                            let start = index * chunk;
                            kernel::compute_span(shared, k, start..start + span.len(), span);
                        });
                });
            }
            // The fork-join above has completed every span; publishing the
            // diagonal is what allows k+1 to begin.
            store.apply_diagonal(k, &staging[..len]);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}
