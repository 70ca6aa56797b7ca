//! The recurrence core shared by every execution model.
//!
//! Each entry above the main diagonal is the cube root of a dot product
//! over previously filled entries: for diagonal k and row i,
//!
//! ```text
//! M(i, i+k) = cbrt( sum_{j<k} M(i, i+j) * M(i+1+j, i+k) )
//! ```
//!
//! Both operands are contiguous runs thanks to the store's two planes, so
//! the dot product streams over slices. The routine is identical for the
//! sequential, shared-memory and distributed kernels, which is why their
//! per-entry results agree exactly: parallelism never splits a single dot
//! product, it only distributes whole rows.

use std::ops::Range;

use crate::error::Result;
use crate::store::TriangularStore;

/// Independent accumulators in the unrolled dot product.
const LANES: usize = 4;

/// A wavefront fill strategy over a [`TriangularStore`].
///
/// `fill` is the sole mutating operation of a run: it computes every entry
/// above the main diagonal, strictly in increasing diagonal order.
pub trait Kernel {
    fn fill(&self, store: &mut TriangularStore) -> Result<()>;

    /// Name used in logs and reports.
    fn name(&self) -> &'static str;
}

/// Dot product with four independent accumulators and a scalar tail.
///
/// Reassociates the sum relative to a naive left-to-right loop; callers
/// accept the different rounding.
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let split = a.len() - a.len() % LANES;
    let (a_body, a_tail) = a.split_at(split);
    let (b_body, b_tail) = b.split_at(split);

    let mut acc = [0.0_f64; LANES];
    for (xs, ys) in a_body.chunks_exact(LANES).zip(b_body.chunks_exact(LANES)) {
        for lane in 0..LANES {
            acc[lane] = xs[lane].mul_add(ys[lane], acc[lane]);
        }
    }
    let mut sum = (acc[0] + acc[1]) + (acc[2] + acc[3]);
    for (x, y) in a_tail.iter().zip(b_tail) {
        sum += x * y;
    }
    sum
}

/// Value of M(i, i+k): row i's first k entries against column (i+k)'s k
/// entries directly below the diagonal, then a sign-preserving cube root.
#[inline]
pub(crate) fn diagonal_value(store: &TriangularStore, i: usize, k: usize) -> f64 {
    let row = store.row_run(i, k);
    let col = store.col_run(i + k, i + 1, k);
    dot(row, col).cbrt()
}

/// Compute the entries of diagonal `k` for `rows` into `out`, where
/// `out[j]` receives the value for row `rows.start + j`. Reads only
/// diagonals strictly below `k`.
pub(crate) fn compute_span(store: &TriangularStore, k: usize, rows: Range<usize>, out: &mut [f64]) {
    debug_assert_eq!(rows.len(), out.len());
    for (slot, i) in out.iter_mut().zip(rows) {
        *slot = diagonal_value(store, i, k);
    }
}
