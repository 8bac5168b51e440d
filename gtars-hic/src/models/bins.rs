use std::collections::HashMap;
use std::fmt::{self, Display};

use ndarray::Array1;

use crate::errors::{HicError, Result};
use crate::models::Span;

///
/// Bin struct, one indivisible genomic interval of a binned contact matrix
///
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bin {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl Bin {
    ///
    /// Get length of the bin
    ///
    pub fn width(&self) -> u64 {
        self.end - self.start
    }

    ///
    /// Get file string of Bin
    ///
    pub fn as_string(&self) -> String {
        format!("{}\t{}\t{}", self.chrom, self.start, self.end)
    }
}

impl Display for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

///
/// BinTable struct, the ordered bins of a contact matrix together with
/// named balancing-weight columns. Bin ids are positions in `bins`.
///
#[derive(Clone, Debug)]
pub struct BinTable {
    pub bins: Vec<Bin>,
    weights: HashMap<String, Vec<f64>>,
    chrom_extents: Vec<(String, Span)>,
}

impl BinTable {
    ///
    /// Create a new [BinTable] from bins sorted by chromosome and start.
    ///
    /// Chromosome extents are derived from contiguous runs of the same
    /// chromosome name.
    pub fn new(bins: Vec<Bin>) -> Self {
        let mut chrom_extents: Vec<(String, Span)> = Vec::new();

        for (bin_id, bin) in bins.iter().enumerate() {
            let bin_id = bin_id as u64;
            match chrom_extents.last_mut() {
                Some((chrom, span)) if *chrom == bin.chrom => span.end = bin_id + 1,
                _ => chrom_extents.push((bin.chrom.clone(), Span::new(bin_id, bin_id + 1))),
            }
        }

        BinTable {
            bins,
            weights: HashMap::new(),
            chrom_extents,
        }
    }

    ///
    /// Attach a balancing-weight column. The column must have one value per bin.
    ///
    pub fn with_weights(mut self, name: &str, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.bins.len() {
            return Err(HicError::SpanOutOfBounds {
                start: 0,
                end: values.len() as u64,
                n_bins: self.bins.len() as u64,
            });
        }
        self.weights.insert(name.to_string(), values);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Chromosome names in table order.
    pub fn chromnames(&self) -> impl Iterator<Item = &str> {
        self.chrom_extents.iter().map(|(chrom, _)| chrom.as_str())
    }

    ///
    /// Absolute bin range of a chromosome
    ///
    pub fn extent(&self, chrom: &str) -> Result<Span> {
        self.chrom_extents
            .iter()
            .find(|(name, _)| name == chrom)
            .map(|(_, span)| *span)
            .ok_or_else(|| HicError::UnknownChromosome(chrom.to_string()))
    }

    ///
    /// Absolute bin offset of the chromosome start
    ///
    pub fn offset(&self, chrom: &str) -> Result<u64> {
        Ok(self.extent(chrom)?.start)
    }

    ///
    /// Width of the first bin. Contact matrices are binned uniformly, the
    /// last bin of each chromosome may be shorter.
    ///
    pub fn binsize(&self) -> Option<u64> {
        self.bins.first().map(|bin| bin.width())
    }

    pub fn has_weight_column(&self, name: &str) -> bool {
        self.weights.contains_key(name)
    }

    pub fn weight_columns(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(|name| name.as_str())
    }

    ///
    /// Slice a balancing-weight column over a span of bins.
    ///
    pub fn weights(&self, name: &str, span: Span) -> Result<Array1<f64>> {
        let column = self
            .weights
            .get(name)
            .ok_or_else(|| HicError::MissingWeightColumn(name.to_string()))?;

        self.check_span(span)?;

        Ok(Array1::from(
            column[span.start as usize..span.end as usize].to_vec(),
        ))
    }

    ///
    /// Join bin metadata onto a bin id.
    ///
    pub fn annotate(&self, bin_id: u64) -> Option<&Bin> {
        self.bins.get(bin_id as usize)
    }

    pub fn check_span(&self, span: Span) -> Result<()> {
        if span.start > span.end || span.end > self.bins.len() as u64 {
            return Err(HicError::SpanOutOfBounds {
                start: span.start,
                end: span.end,
                n_bins: self.bins.len() as u64,
            });
        }
        Ok(())
    }
}
