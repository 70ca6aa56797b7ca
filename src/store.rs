//! Packed storage for the upper triangle of an N×N matrix.
//!
//! Only the `row <= column` half is stored, in a linear buffer of
//! N*(N+1)/2 values. Two planes are kept in lockstep:
//!
//! - the row plane, packed row-major, so the already-filled prefix of a row
//!   is one contiguous run;
//! - the column mirror plane, packed column-major, so the run of a column
//!   directly below the diagonal is contiguous as well.
//!
//! The recurrence reads one run from each plane, which is what lets the dot
//! product stream over plain slices instead of strided indices. Every write
//! updates both planes.
//!
//! Allocation placement is a policy, not a type: a plane is either one
//! contiguous segment or a set of per-node segments whose boundaries align
//! with whole rows (row plane) or whole columns (mirror plane), so a run
//! never straddles a segment.

use std::fmt;

use crate::error::{Error, Result};
use crate::partition;

/// Number of stored entries for an N×N upper triangle.
pub const fn packed_len(size: usize) -> usize {
    size * (size + 1) / 2
}

/// Linear offset of (row, col) in the row-major packed triangle.
#[inline]
fn row_offset(size: usize, row: usize, col: usize) -> usize {
    row * (2 * size - row + 1) / 2 + col - row
}

/// Linear offset of (row, col) in the column-major mirror.
#[inline]
fn col_offset(col: usize, row: usize) -> usize {
    col * (col + 1) / 2 + row
}

/// Allocation layout for the two planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoragePolicy {
    /// One contiguous heap buffer per plane.
    #[default]
    Contiguous,
    /// Split each plane into `nodes` segments on row (respectively column)
    /// boundaries, one per memory node. The node count is clamped to
    /// `1..=size`. Readers may still cross segments; only placement changes.
    Partitioned { nodes: usize },
}

/// One packed buffer behind the storage policy.
#[derive(Debug)]
struct Plane {
    segments: Vec<Box<[f64]>>,
    /// Linear offset at which each segment starts; `starts[0] == 0`.
    starts: Vec<usize>,
}

impl Plane {
    /// `bounds` holds the ascending segment start offsets, beginning at 0.
    fn allocate(bounds: &[usize], total: usize) -> Result<Self> {
        let mut segments = Vec::with_capacity(bounds.len());
        for (index, &start) in bounds.iter().enumerate() {
            let end = bounds.get(index + 1).copied().unwrap_or(total);
            segments.push(alloc_zeroed(end - start)?);
        }
        Ok(Self {
            segments,
            starts: bounds.to_vec(),
        })
    }

    #[inline]
    fn locate(&self, offset: usize) -> (usize, usize) {
        if self.starts.len() == 1 {
            return (0, offset);
        }
        let segment = self.starts.partition_point(|&start| start <= offset) - 1;
        (segment, offset - self.starts[segment])
    }

    #[inline]
    fn get(&self, offset: usize) -> f64 {
        let (segment, local) = self.locate(offset);
        self.segments[segment][local]
    }

    #[inline]
    fn set(&mut self, offset: usize, value: f64) {
        let (segment, local) = self.locate(offset);
        self.segments[segment][local] = value;
    }

    /// Contiguous run of `len` values starting at `offset`. Callers only
    /// request runs inside one row or one column, which segment boundaries
    /// never split.
    #[inline]
    fn run(&self, offset: usize, len: usize) -> &[f64] {
        let (segment, local) = self.locate(offset);
        &self.segments[segment][local..local + len]
    }
}

fn alloc_zeroed(len: usize) -> Result<Box<[f64]>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|source| Error::Allocation { len, source })?;
    buffer.resize(len, 0.0);
    Ok(buffer.into_boxed_slice())
}

/// The upper triangle of an N×N matrix, diagonal entries seeded to
/// `(row+1)/N` at construction. Created once per run; mutated only by a
/// kernel's fill, diagonal by diagonal.
#[derive(Debug)]
pub struct TriangularStore {
    size: usize,
    rows: Plane,
    cols: Plane,
    policy: StoragePolicy,
}

impl TriangularStore {
    pub fn new(size: usize) -> Result<Self> {
        Self::with_policy(size, StoragePolicy::Contiguous)
    }

    pub fn with_policy(size: usize, policy: StoragePolicy) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidSize);
        }
        // size*(size+1) also bounds every intermediate of row_offset.
        let doubled = size
            .checked_add(1)
            .and_then(|n| n.checked_mul(size))
            .ok_or(Error::SizeOverflow(size))?;
        let total = doubled / 2;

        let nodes = match policy {
            StoragePolicy::Contiguous => 1,
            StoragePolicy::Partitioned { nodes } => nodes.clamp(1, size),
        };
        let shares: Vec<_> = (0..nodes)
            .map(|node| partition::split_rows(size, node, nodes))
            .filter(|share| !share.is_empty())
            .collect();
        let row_bounds: Vec<usize> = shares
            .iter()
            .map(|share| row_offset(size, share.start, share.start))
            .collect();
        let col_bounds: Vec<usize> = shares
            .iter()
            .map(|share| col_offset(share.start, 0))
            .collect();

        let mut store = Self {
            size,
            rows: Plane::allocate(&row_bounds, total)?,
            cols: Plane::allocate(&col_bounds, total)?,
            policy,
        };
        for i in 0..size {
            let seed = (i + 1) as f64 / size as f64;
            store.rows.set(row_offset(size, i, i), seed);
            store.cols.set(col_offset(i, i), seed);
        }
        Ok(store)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn policy(&self) -> StoragePolicy {
        self.policy
    }

    /// Value at (row, col). Requires `row <= col < size`; entries above the
    /// diagonal are undefined until their diagonal has been filled.
    #[inline]
    pub fn read(&self, row: usize, col: usize) -> f64 {
        debug_assert!(row <= col && col < self.size);
        self.rows.get(row_offset(self.size, row, col))
    }

    /// Store `value` at (row, col) in both planes.
    #[inline]
    pub fn write(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row <= col && col < self.size);
        self.rows.set(row_offset(self.size, row, col), value);
        self.cols.set(col_offset(col, row), value);
    }

    /// First `len` stored entries of `row`: M(row, row+j) for j < len.
    #[inline]
    pub(crate) fn row_run(&self, row: usize, len: usize) -> &[f64] {
        self.rows.run(row_offset(self.size, row, row), len)
    }

    /// `len` entries of `col` starting at `start_row`: M(start_row+j, col).
    #[inline]
    pub(crate) fn col_run(&self, col: usize, start_row: usize, len: usize) -> &[f64] {
        debug_assert!(start_row + len <= col + 1);
        self.cols.run(col_offset(col, start_row), len)
    }

    /// Publish diagonal `k`: write all its entries at once. This is the
    /// phase boundary between diagonals; callers must not start computing
    /// diagonal `k + 1` before it returns.
    pub fn apply_diagonal(&mut self, k: usize, values: &[f64]) {
        assert!(k >= 1 && k < self.size, "diagonal {k} out of range");
        assert_eq!(
            values.len(),
            self.size - k,
            "diagonal {k} expects {} values",
            self.size - k
        );
        for (i, &value) in values.iter().enumerate() {
            self.write(i, i + k, value);
        }
    }
}

impl fmt::Display for TriangularStore {
    /// Render the full square with zeros below the diagonal, for debugging
    /// small matrices.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.size {
            for col in 0..self.size {
                if col >= row {
                    write!(f, "{:9.6} ", self.read(row, col))?;
                } else {
                    write!(f, "{:>9} ", "0")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
