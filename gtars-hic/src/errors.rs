use thiserror::Error;

#[derive(Error, Debug)]
pub enum HicError {
    #[error("Can't read file: {0}")]
    FileReadError(String),

    #[error("Error parsing line {line} of {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("Missing column '{column}' in header of {file}")]
    MissingColumn { file: String, column: String },

    #[error("Balancing weight column not found in bin table: {0}")]
    MissingWeightColumn(String),

    #[error("Unknown chromosome: {0}")]
    UnknownChromosome(String),

    #[error("Bin span {start}..{end} is out of bounds for a table of {n_bins} bins")]
    SpanOutOfBounds { start: u64, end: u64, n_bins: u64 },

    #[error("Corrupted file. 0 records found in the file: {0}")]
    EmptyFile(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for gtars-hic operations.
pub type Result<T> = std::result::Result<T, HicError>;
