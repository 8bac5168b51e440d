use std::collections::HashMap;

use ndarray::Array2;

use crate::errors::{HicError, Result};
use crate::models::Span;

///
/// Per-chromosome 1-D expected (background) profiles, indexed by the
/// diagonal offset `|bin2 - bin1|`.
///
#[derive(Clone, Debug, Default)]
pub struct ExpectedTable {
    profiles: HashMap<String, Vec<f64>>,
}

impl ExpectedTable {
    pub fn new() -> Self {
        ExpectedTable::default()
    }

    pub fn insert(&mut self, chrom: &str, profile: Vec<f64>) {
        self.profiles.insert(chrom.to_string(), profile);
    }

    pub fn with_profile(mut self, chrom: &str, profile: Vec<f64>) -> Self {
        self.insert(chrom, profile);
        self
    }

    ///
    /// Get the expected profile of a chromosome
    ///
    pub fn profile(&self, chrom: &str) -> Result<&[f64]> {
        self.profiles
            .get(chrom)
            .map(|p| p.as_slice())
            .ok_or_else(|| HicError::UnknownChromosome(chrom.to_string()))
    }

    /// Chromosomes that have a profile, sorted by name.
    pub fn chromnames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, chrom: &str) -> bool {
        self.profiles.contains_key(chrom)
    }
}

///
/// Expand a diagonal-indexed profile into a dense block of a Toeplitz
/// matrix: `block[i, j] = profile[|row_i - col_j|]`.
///
/// Offsets beyond the end of the profile are NaN. `rows` and `cols` must be
/// spans of the same chromosome; absolute bin ids work because only their
/// difference matters.
///
pub fn toeplitz_block(profile: &[f64], rows: Span, cols: Span) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| {
        let row = rows.start + i as u64;
        let col = cols.start + j as u64;
        let diag = row.abs_diff(col) as usize;
        profile.get(diag).copied().unwrap_or(f64::NAN)
    })
}
