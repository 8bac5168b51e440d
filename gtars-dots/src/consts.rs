// HiCCUPS constants that dictate how the lambda-chunking histograms are
// built: W1 is the number of log-spaced lambda bins. HFF combined exceeded 40.
pub const HICCUPS_W1_MAX_INDX: u32 = 46;
pub const LAMBDA_LADDER_STEPS_PER_OCTAVE: u32 = 3;

pub const DEFAULT_WEIGHT_NAME: &str = "weight";
pub const DEFAULT_EXPECTED_COLUMN: &str = "balanced.avg";
pub const DEFAULT_FDR: f64 = 0.1;
pub const DEFAULT_MAX_NANS_TOLERATED: u32 = 1;
pub const DEFAULT_MAX_LOCI_SEPARATION_BP: u64 = 2_000_000;
pub const DEFAULT_CLUSTERING_RADIUS_BP: u64 = 39_000;
pub const DEFAULT_TILE_SIZE_BP: u64 = 6_000_000;

// final thresholding of cluster representatives
pub const ENRICHMENT_FACTOR_1: f64 = 1.5;
pub const ENRICHMENT_FACTOR_2: f64 = 1.75;
pub const ENRICHMENT_FACTOR_3: f64 = 2.0;
pub const FDR_ORPHAN_THRESHOLD: f64 = 0.02;

pub const DONUT: &str = "donut";
pub const VERTICAL: &str = "vertical";
pub const HORIZONTAL: &str = "horizontal";
pub const LOWLEFT: &str = "lowleft";
