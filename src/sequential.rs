//! Reference wavefront fill.
//!
//! Processes diagonals strictly in increasing order; within a diagonal,
//! rows in increasing order. Every parallel variant must reproduce this
//! result (and does so exactly, since all of them share the same dot
//! product over whole rows).

use log::debug;

use crate::error::Result;
use crate::kernel::{self, Kernel};
use crate::store::TriangularStore;

/// Single-threaded kernel; defines the semantics of the fill.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialKernel;

impl Kernel for SequentialKernel {
    fn fill(&self, store: &mut TriangularStore) -> Result<()> {
        let n = store.size();
        debug!("sequential fill: size {n}");
        for k in 1..n {
            for i in 0..n - k {
                let value = kernel::diagonal_value(store, i, k);
                store.write(i, i + k, value);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn golden_four_by_four() {
        let mut store = TriangularStore::new(4).unwrap();
        SequentialKernel.fill(&mut store).unwrap();
        let expected = [
            (0, 0, 0.25),
            (1, 1, 0.5),
            (2, 2, 0.75),
            (3, 3, 1.0),
            (0, 1, 0.5),
            (1, 2, 0.7211247851537042),
            (2, 3, 0.9085602964160698),
            (0, 2, 0.8219353435332124),
            (1, 3, 1.0553483522379672),
            (0, 3, 1.1548134928199623),
        ];
        for (row, col, value) in expected {
            assert_abs_diff_eq!(store.read(row, col), value, epsilon = 1e-12);
        }
    }

    #[test]
    fn two_by_two_single_entry() {
        let mut store = TriangularStore::new(2).unwrap();
        SequentialKernel.fill(&mut store).unwrap();
        // The only off-diagonal entry: cbrt(0.5 * 1.0).
        assert_abs_diff_eq!(store.read(0, 1), 0.5_f64.cbrt(), epsilon = 1e-12);
    }

    #[test]
    fn size_one_has_nothing_to_fill() {
        let mut store = TriangularStore::new(1).unwrap();
        SequentialKernel.fill(&mut store).unwrap();
        assert_eq!(store.read(0, 0), 1.0);
    }
}
