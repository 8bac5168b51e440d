use thiserror::Error;

use gtars_hic::HicError;

#[derive(Error, Debug)]
pub enum DotCallerError {
    #[error("Kernel '{kernel}' is malformed: {reason}")]
    MalformedKernel { kernel: String, reason: String },

    #[error("Kernel '{0}' is required but missing from the kernel set")]
    MissingKernel(String),

    #[error("Balancing weights of shape {weights:?} don't match a tile of shape {tile:?}")]
    WeightShape {
        weights: (usize, usize),
        tile: (usize, usize),
    },

    #[error("Expected block of shape {expected:?} doesn't match observed block of shape {observed:?}")]
    TileShape {
        observed: (usize, usize),
        expected: (usize, usize),
    },

    #[error(
        "Lambda ladder does not cover the data: {count} la_exp.{kernel}.value in {bin}, please check the histogram"
    )]
    LadderOverflow {
        kernel: String,
        bin: String,
        count: u64,
    },

    #[error("Balancing weight column not found in bin table: {0}")]
    MissingWeightColumn(String),

    #[error("No expected profile for chromosome: {0}")]
    MissingExpected(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Hic(#[from] HicError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for gtars-dots operations.
pub type Result<T> = std::result::Result<T, DotCallerError>;
