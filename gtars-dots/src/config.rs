use std::fmt::{self, Display};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::errors::{DotCallerError, Result};

/// Multiple-testing strategy used to call significant pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FdrMode {
    /// Per-pixel Poisson p-values, genome-wide Benjamini-Hochberg per kernel.
    Global,
    /// HiCCUPS-like lambda-chunking: histograms, per-chunk thresholds and a
    /// second extraction pass.
    LambdaChunk,
}

impl FromStr for FdrMode {
    type Err = DotCallerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "global" | "bh" => Ok(FdrMode::Global),
            "lambda-chunk" | "lambda_chunk" | "lambdachunk" => Ok(FdrMode::LambdaChunk),
            _ => Err(DotCallerError::InvalidConfig(format!(
                "Invalid FDR mode: {}",
                s
            ))),
        }
    }
}

impl Display for FdrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FdrMode::Global => write!(f, "global"),
            FdrMode::LambdaChunk => write!(f, "lambda-chunk"),
        }
    }
}

///
/// Every tunable of a dot-calling run. Distances are in bins.
///
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DotCallerConfig {
    /// Name of the balancing-weight column in the bin table.
    pub weight_name: String,
    /// Pixels need strictly fewer NaNs than this in every kernel footprint.
    pub max_nans_tolerated: u32,
    /// Smallest `bin2 - bin1` reported.
    pub min_loci_separation: u64,
    /// Pixels must satisfy `bin2 - bin1 < max_loci_separation`.
    pub max_loci_separation: u64,
    pub fdr_mode: FdrMode,
    pub fdr: f64,
    /// Clustering radius, in bins.
    pub clustering_radius: f64,
    /// Side of the square tiles, in bins.
    pub tile_size: u64,
    /// Size of the worker pool; 1 runs serially.
    pub n_threads: usize,
    /// Tiles per unit of work. Defaults to `ceil(n_tiles / (4 * n_threads))`.
    pub chunk_size: Option<usize>,
    /// Number of `2^(1/3)` steps in the lambda ladder.
    pub lambda_w1_max_index: u32,
    /// Balancing factor for the `factor_balance.lowleft.KerObs` column.
    pub balance_factor: Option<f64>,
    /// Optional tab-separated dump of the scored pixels.
    pub scores_dump: Option<PathBuf>,
    pub progress: bool,
}

impl Default for DotCallerConfig {
    fn default() -> Self {
        DotCallerConfig {
            weight_name: DEFAULT_WEIGHT_NAME.to_string(),
            max_nans_tolerated: DEFAULT_MAX_NANS_TOLERATED,
            min_loci_separation: 0,
            max_loci_separation: 200,
            fdr_mode: FdrMode::LambdaChunk,
            fdr: DEFAULT_FDR,
            clustering_radius: 2.0,
            tile_size: 500,
            n_threads: 1,
            chunk_size: None,
            lambda_w1_max_index: HICCUPS_W1_MAX_INDX,
            balance_factor: None,
            scores_dump: None,
            progress: false,
        }
    }
}

impl DotCallerConfig {
    /// Reject values no run could make sense of.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DotCallerError::InvalidConfig(msg));

        if !(0.0..=1.0).contains(&self.fdr) {
            return invalid(format!("fdr must lie in [0, 1], got {}", self.fdr));
        }
        if self.n_threads == 0 {
            return invalid("n_threads must be at least 1".to_string());
        }
        if self.tile_size == 0 {
            return invalid("tile_size must be positive".to_string());
        }
        if self.chunk_size == Some(0) {
            return invalid("chunk_size must be positive".to_string());
        }
        if self.max_loci_separation <= self.min_loci_separation {
            return invalid(format!(
                "max_loci_separation ({}) must exceed min_loci_separation ({})",
                self.max_loci_separation, self.min_loci_separation
            ));
        }
        if self.clustering_radius.is_nan() || self.clustering_radius <= 0.0 {
            return invalid(format!(
                "clustering_radius must be positive, got {}",
                self.clustering_radius
            ));
        }
        if self.lambda_w1_max_index == 0 {
            return invalid("lambda_w1_max_index must be positive".to_string());
        }
        Ok(())
    }
}
