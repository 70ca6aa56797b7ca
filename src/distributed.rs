//! Distributed wavefront kernel over collective communication.
//!
//! Rows are sharded across the group by [`partition::split_rows`]; every
//! rank keeps a full-size store because later diagonals read entries that
//! other ranks computed. Per diagonal k the state machine is:
//!
//! 1. local compute of the rank's surviving rows into the exchange buffer;
//! 2. variable-count gather of all contributions to rank 0, in rank order;
//! 3. broadcast of the completed diagonal to every rank;
//! 4. apply into the local store.
//!
//! The gather/broadcast pair is the barrier: a rank cannot apply, and so
//! cannot start k+1, before the diagonal is complete everywhere it looks.
//! Exchange buffers are sized exactly to the diagonal, and both collective
//! boundaries validate the length, so stale tails can neither be sent nor
//! trusted.

use log::debug;

use crate::comm::{CommError, Communicator, ROOT};
use crate::error::Result;
use crate::kernel::{self, Kernel};
use crate::partition;
use crate::store::TriangularStore;

/// Wavefront fill cooperating across a process group.
///
/// Ranks with an empty row share (more ranks than rows) still join every
/// collective with zero-length contributions. When `fill` returns, the full
/// matrix is present identically in every rank's store; no merge step is
/// needed.
pub struct DistributedKernel<C: Communicator> {
    comm: C,
}

impl<C: Communicator> DistributedKernel<C> {
    pub fn new(comm: C) -> Self {
        Self { comm }
    }

    pub fn communicator(&self) -> &C {
        &self.comm
    }

    /// Gather the local contribution and broadcast the completed diagonal,
    /// validating the payload length at both boundaries.
    fn exchange(&self, expected: usize, local: &[f64], diagonal: &mut Vec<f64>) -> Result<()> {
        self.comm.gather_varcount(local, ROOT, diagonal)?;
        if self.comm.rank() == ROOT && diagonal.len() != expected {
            return Err(CommError::Shape {
                op: "gather",
                expected,
                got: diagonal.len(),
            }
            .into());
        }
        self.comm.broadcast(ROOT, diagonal)?;
        if diagonal.len() != expected {
            return Err(CommError::Shape {
                op: "broadcast",
                expected,
                got: diagonal.len(),
            }
            .into());
        }
        Ok(())
    }
}

impl<C: Communicator> Kernel for DistributedKernel<C> {
    fn fill(&self, store: &mut TriangularStore) -> Result<()> {
        let n = store.size();
        let share = partition::split_rows(n, self.comm.rank(), self.comm.size());
        debug!(
            "distributed fill: size {n}, rank {}/{}, rows {}..{}",
            self.comm.rank(),
            self.comm.size(),
            share.start,
            share.end
        );
        let mut local = Vec::with_capacity(share.len());
        let mut diagonal = Vec::new();
        for k in 1..n {
            let len = n - k;
            // The share shrinks as diagonals get shorter, possibly to nothing.
            let mine = share.below(len);
            local.clear();
            local.resize(mine.len(), 0.0);
            kernel::compute_span(store, k, mine.start..mine.end, &mut local);
            self.exchange(len, &local, &mut diagonal)?;
            store.apply_diagonal(k, &diagonal);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "distributed"
    }
}
