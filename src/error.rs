//! Crate-wide error taxonomy.
//!
//! Every failure here is structural rather than transient: bad input,
//! resource exhaustion, or an unreachable peer. Nothing is retried and
//! nothing is silently ignored.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::comm::CommError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The matrix size was zero; no partial state is created.
    #[error("matrix size must be at least 1")]
    InvalidSize,

    /// The packed length N*(N+1)/2 does not fit the address space.
    #[error("matrix size {0} overflows packed storage addressing")]
    SizeOverflow(usize),

    /// The backing buffer (or one node-local segment of it) could not be
    /// obtained. Memory pressure is not treated as transient.
    #[error("failed to allocate a {len}-entry storage segment: {source}")]
    Allocation {
        len: usize,
        source: TryReserveError,
    },

    #[error("failed to build the worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// A collective call failed; the whole distributed fill is abandoned.
    #[error(transparent)]
    Comm(#[from] CommError),

    #[error("report I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("report serialization failed: {0}")]
    Csv(#[from] csv::Error),
}
