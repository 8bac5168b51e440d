//! Read-only access to binned contact matrices.
//!
//! The dot caller only needs a handful of operations from a contact matrix:
//! chromosome extents, dense blocks of raw or balanced counts, and balancing
//! weights. [`ContactMatrix`] captures exactly that so that any backend can be
//! plugged in. [`InMemoryContacts`] is a sparse, symmetric, in-memory backend
//! built from upper-triangle pixels.

use fxhash::FxHashMap;
use ndarray::{Array1, Array2};

use crate::errors::{HicError, Result};
use crate::models::{BinTable, Span};

/// Read-only contact-matrix store. Implementations are shared by all tile
/// workers and must be safe for concurrent fetches.
pub trait ContactMatrix: Sync {
    /// The bin table of the matrix.
    fn bins(&self) -> &BinTable;

    /// Absolute bin range of a chromosome.
    fn extent(&self, chrom: &str) -> Result<Span> {
        self.bins().extent(chrom)
    }

    /// Absolute bin offset of the chromosome start.
    fn offset(&self, chrom: &str) -> Result<u64> {
        self.bins().offset(chrom)
    }

    /// Dense block of the symmetric matrix over `rows x cols`.
    ///
    /// `balance` selects the weight column used to balance the counts;
    /// `None` returns raw counts.
    fn fetch_matrix(&self, rows: Span, cols: Span, balance: Option<&str>) -> Result<Array2<f64>>;

    /// Per-bin balancing weights; NaN marks excluded bins.
    fn fetch_bin_weights(&self, span: Span, column: &str) -> Result<Array1<f64>> {
        self.bins().weights(column, span)
    }
}

///
/// Sparse in-memory contact matrix. Only the upper triangle is stored, the
/// lower triangle is served by symmetry.
///
#[derive(Clone, Debug)]
pub struct InMemoryContacts {
    bins: BinTable,
    pixels: FxHashMap<(u64, u64), f64>,
}

impl InMemoryContacts {
    ///
    /// Build a store from `(bin1_id, bin2_id, count)` triplets. Lower-triangle
    /// triplets are folded onto the upper triangle and duplicates are summed.
    ///
    pub fn from_pixels<I>(bins: BinTable, pixels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, u64, f64)>,
    {
        let n_bins = bins.len() as u64;
        let mut map: FxHashMap<(u64, u64), f64> = FxHashMap::default();

        for (bin1, bin2, count) in pixels {
            let (lo, hi) = if bin1 <= bin2 { (bin1, bin2) } else { (bin2, bin1) };
            if hi >= n_bins {
                return Err(HicError::SpanOutOfBounds {
                    start: lo,
                    end: hi + 1,
                    n_bins,
                });
            }
            *map.entry((lo, hi)).or_insert(0.0) += count;
        }

        Ok(InMemoryContacts { bins, pixels: map })
    }

    pub fn nnz(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    fn raw(&self, bin1: u64, bin2: u64) -> f64 {
        let key = if bin1 <= bin2 { (bin1, bin2) } else { (bin2, bin1) };
        self.pixels.get(&key).copied().unwrap_or(0.0)
    }
}

impl ContactMatrix for InMemoryContacts {
    fn bins(&self) -> &BinTable {
        &self.bins
    }

    fn fetch_matrix(&self, rows: Span, cols: Span, balance: Option<&str>) -> Result<Array2<f64>> {
        self.bins.check_span(rows)?;
        self.bins.check_span(cols)?;

        let mut block = Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| {
            self.raw(rows.start + i as u64, cols.start + j as u64)
        });

        if let Some(column) = balance {
            let row_weights = self.bins.weights(column, rows)?;
            let col_weights = self.bins.weights(column, cols)?;
            for ((i, j), value) in block.indexed_iter_mut() {
                *value *= row_weights[i] * col_weights[j];
            }
        }

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bin;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn store() -> InMemoryContacts {
        let bins: Vec<Bin> = (0..4)
            .map(|i| Bin {
                chrom: "chr1".to_string(),
                start: i * 100,
                end: (i + 1) * 100,
            })
            .collect();
        let table = BinTable::new(bins)
            .with_weights("weight", vec![1.0, 2.0, f64::NAN, 0.5])
            .unwrap();
        InMemoryContacts::from_pixels(
            table,
            vec![(0, 1, 3.0), (1, 1, 7.0), (3, 1, 2.0), (1, 3, 1.0)],
        )
        .unwrap()
    }

    #[rstest]
    fn test_fetch_raw_is_symmetric(store: InMemoryContacts) {
        let block = store
            .fetch_matrix(Span::new(0, 4), Span::new(0, 4), None)
            .unwrap();
        assert_eq!(block[[0, 1]], 3.0);
        assert_eq!(block[[1, 0]], 3.0);
        assert_eq!(block[[1, 3]], 3.0);
        assert_eq!(block[[3, 1]], 3.0);
        assert_eq!(block[[2, 2]], 0.0);
        assert_eq!(store.nnz(), 3);
    }

    #[rstest]
    fn test_fetch_balanced(store: InMemoryContacts) {
        let block = store
            .fetch_matrix(Span::new(0, 2), Span::new(1, 4), Some("weight"))
            .unwrap();
        assert_eq!(block.dim(), (2, 3));
        // (0, 1): 3 * 1.0 * 2.0
        assert_eq!(block[[0, 0]], 6.0);
        // (1, 2): bad bin
        assert!(block[[1, 1]].is_nan());
        // (1, 3): 3 * 2.0 * 0.5
        assert_eq!(block[[1, 2]], 3.0);
    }

    #[rstest]
    fn test_fetch_out_of_bounds(store: InMemoryContacts) {
        assert!(store
            .fetch_matrix(Span::new(0, 5), Span::new(0, 4), None)
            .is_err());
        assert!(store
            .fetch_matrix(Span::new(0, 2), Span::new(0, 2), Some("KR"))
            .is_err());
    }
}
