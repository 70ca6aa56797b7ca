//! Wavefront fill engine for packed upper-triangular matrices.
//!
//! Every entry above the main diagonal of an N×N triangular matrix is
//! computed by a recurrence over strictly lower anti-diagonals, which makes
//! each diagonal a synchronization frontier. The same fill is provided in
//! three execution models with identical numeric results:
//!
//! - [`sequential::SequentialKernel`], the single-threaded reference;
//! - [`parallel::ParallelKernel`], data-parallel rows per diagonal over a
//!   bounded thread pool, one fork-join barrier per diagonal;
//! - [`distributed::DistributedKernel`], row-sharded across a process
//!   group, with a gather/broadcast exchange per diagonal.
//!
//! The driver binary and [`sweep`] module time these kernels across matrix
//! sizes and write CSV reports.
#![deny(unused_imports)]

pub mod comm;
pub mod distributed;
pub mod error;
pub mod kernel;
pub mod parallel;
pub mod partition;
pub mod sequential;
pub mod store;
pub mod sweep;

pub use error::{Error, Result};
pub use kernel::Kernel;
pub use store::{StoragePolicy, TriangularStore};
