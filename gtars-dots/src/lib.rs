//! # Tiled convolution-based dot calling for Hi-C contact matrices.
//!
//! Dots are pixels enriched over their neighbourhood: chromatin loops,
//! typically. The caller splits the diagonal band of every chromosome into
//! padded tiles, convolves observed and expected counts with a set of
//! neighbourhood kernels to obtain a locally-adjusted expected per pixel, and
//! tests observed counts against it with a Poisson model. Significant pixels
//! are clustered and each cluster is represented by its brightest pixel,
//! which then goes through the HiCCUPS enrichment filter.
//!
//! Two significance procedures are available:
//!
//! * [`FdrMode::Global`] computes a p-value per pixel and kernel and controls
//!   the FDR genome-wide with Benjamini-Hochberg.
//! * [`FdrMode::LambdaChunk`] groups pixels by the magnitude of their
//!   adjusted expected, derives per-group observed-count thresholds from
//!   summed histograms, and extracts the pixels above threshold in a second
//!   pass over the tiles.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gtars_dots::{call_dots, DotCallerConfig, KernelSet};
//! use gtars_dots::tiling::heatmap_tiles_generator_diag;
//!
//! let kernels = KernelSet::hiccups(3, 1)?;
//! let config = DotCallerConfig::default();
//! let tiles = heatmap_tiles_generator_diag(&store, &["chr1"], 3, 500, 200)?;
//! let dots = call_dots(&store, &expected, &tiles, &kernels, &config)?;
//! ```
//!
pub mod clustering;
pub mod config;
pub mod consts;
pub mod errors;
pub mod filter;
pub mod kernels;
pub mod lambda_chunking;
pub mod pipeline;
pub mod scoring;
pub mod stats;
pub mod tiling;
pub mod writing;

use log::info;

use gtars_hic::{ContactMatrix, ExpectedTable};

use crate::clustering::clustering_step;
use crate::filter::check_filter_kernels;
use crate::lambda_chunking::{LambdaLadder, ThresholdTable};
use crate::pipeline::{scoring_and_extraction_step, scoring_and_histogramming_step, scoring_step};
use crate::scoring::ScoringContext;
use crate::stats::{annotate_qvalues, comply_fdr};

// re-exports
pub use config::{DotCallerConfig, FdrMode};
pub use errors::{DotCallerError, Result};
pub use filter::{Dot, thresholding_step};
pub use kernels::{Kernel, KernelSet, KernelType, recommend_kernel_params};
pub use scoring::{KernelScore, ScoredPixel};
pub use tiling::Tile;
pub use writing::{ScoredPixelWriter, write_dots};

fn check_inputs<S>(
    store: &S,
    expected: &ExpectedTable,
    tiles: &[Tile],
    kernels: &KernelSet,
    config: &DotCallerConfig,
) -> Result<()>
where
    S: ContactMatrix + ?Sized,
{
    config.validate()?;
    if kernels.is_empty() {
        return Err(DotCallerError::InvalidConfig(
            "at least one kernel is required".to_string(),
        ));
    }
    check_filter_kernels(kernels)?;
    if !store.bins().has_weight_column(&config.weight_name) {
        return Err(DotCallerError::MissingWeightColumn(config.weight_name.clone()));
    }
    if let Some(tile) = tiles.iter().find(|t| !expected.contains(&t.chrom)) {
        return Err(DotCallerError::MissingExpected(tile.chrom.clone()));
    }
    Ok(())
}

///
/// Call dots over `tiles`.
///
/// Inputs are checked before any tile is scored: the configuration, the
/// kernel set (it must hold a donut or a lowleft kernel), the balancing
/// weight column and the expected profile of every tiled chromosome.
///
/// # Arguments
/// - store: contact matrix, shared read-only by all workers
/// - expected: expected profile of every tiled chromosome
/// - tiles: padded tiles covering the band to scan, see [`tiling`]
/// - kernels: neighbourhood kernels, in output column order
/// - config: tunables of the run
///
pub fn call_dots<S>(
    store: &S,
    expected: &ExpectedTable,
    tiles: &[Tile],
    kernels: &KernelSet,
    config: &DotCallerConfig,
) -> Result<Vec<Dot>>
where
    S: ContactMatrix + ?Sized,
{
    check_inputs(store, expected, tiles, kernels, config)?;
    info!(
        "Calling dots over {} tiles with kernels [{}], {} FDR at {}",
        tiles.len(),
        kernels.names().collect::<Vec<_>>().join(", "),
        config.fdr_mode,
        config.fdr
    );

    let ctx = ScoringContext {
        store,
        expected,
        kernels,
        config,
    };

    let significant = match config.fdr_mode {
        FdrMode::Global => {
            let mut pixels = scoring_step(&ctx, tiles)?;
            annotate_qvalues(&mut pixels, kernels.len());
            pixels.retain(|px| comply_fdr(px, config.fdr));
            info!("{} pixels comply with FDR {}", pixels.len(), config.fdr);
            pixels
        }
        FdrMode::LambdaChunk => {
            let ladder = LambdaLadder::new(config.lambda_w1_max_index);
            let hists = scoring_and_histogramming_step(&ctx, tiles, &ladder)?;
            let thresholds = ThresholdTable::from_histograms(&hists, &ladder, config.fdr);
            scoring_and_extraction_step(&ctx, tiles, &ladder, &thresholds)?
        }
    };

    let centroids = clustering_step(&significant, store.bins(), config.clustering_radius)?;
    let dots = thresholding_step(centroids, kernels)?;
    info!("Called {} dots", dots.len());
    Ok(dots)
}
