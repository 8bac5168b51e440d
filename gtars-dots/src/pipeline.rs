//! Map the tile jobs over a worker pool and reduce their results.
//!
//! Tile jobs share nothing but read-only inputs. Results are combined with
//! order-preserving concatenation or with the associative histogram sum, so
//! the serial and the parallel paths produce identical output.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rayon::prelude::*;

use gtars_hic::ContactMatrix;

use crate::config::DotCallerConfig;
use crate::errors::{DotCallerError, Result};
use crate::lambda_chunking::{HistogramSet, LambdaLadder, ThresholdTable, extract_scored_pixels};
use crate::scoring::{ScoredPixel, ScoringContext, score_tile};
use crate::stats::annotate_pvalues;
use crate::tiling::Tile;
use crate::writing::ScoredPixelWriter;

fn progress_bar(n_tiles: usize, enabled: bool, message: &'static str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(n_tiles as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar
}

/// Tiles per unit of work handed to a worker.
pub fn chunk_size(n_tiles: usize, config: &DotCallerConfig) -> usize {
    config
        .chunk_size
        .unwrap_or_else(|| n_tiles.div_ceil(4 * config.n_threads.max(1)))
        .max(1)
}

///
/// Run `job` on every tile and fold the results with `op`, starting from
/// `identity`. One worker runs serially on the calling thread; more build a
/// dedicated pool that is torn down on return. The first failing tile
/// aborts the run.
///
fn map_reduce_tiles<T, F, ID, OP>(
    tiles: &[Tile],
    config: &DotCallerConfig,
    message: &'static str,
    job: F,
    identity: ID,
    op: OP,
) -> Result<T>
where
    T: Send,
    F: Fn(&Tile) -> Result<T> + Sync + Send,
    ID: Fn() -> T + Sync + Send,
    OP: Fn(T, T) -> T + Sync + Send,
{
    let bar = progress_bar(tiles.len(), config.progress, message);
    let run = |tile: &Tile| {
        let out = job(tile);
        bar.inc(1);
        out
    };

    let result = if config.n_threads <= 1 {
        debug!("Fallback to serial implementation");
        tiles
            .iter()
            .try_fold(identity(), |acc, tile| Ok(op(acc, run(tile)?)))
    } else {
        let chunk = chunk_size(tiles.len(), config);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.n_threads)
            .build()?;
        info!(
            "Created a pool of {} workers to tackle {} tiles in chunks of {}",
            config.n_threads,
            tiles.len(),
            chunk
        );
        pool.install(|| {
            tiles
                .par_iter()
                .with_min_len(chunk)
                .map(run)
                .try_reduce(&identity, |a, b| Ok(op(a, b)))
        })
    };

    bar.finish_and_clear();
    result
}

fn concat(mut a: Vec<ScoredPixel>, b: Vec<ScoredPixel>) -> Vec<ScoredPixel> {
    a.extend(b);
    a
}

fn poisoned_dump() -> DotCallerError {
    DotCallerError::Io(std::io::Error::other("scores dump writer was poisoned"))
}

///
/// Score every tile and attach per-kernel Poisson p-values. When
/// `config.scores_dump` is set, each tile's pixels are appended to the dump as
/// soon as the tile is scored, so parallel runs write rows in completion
/// order.
///
pub fn scoring_step<S>(ctx: &ScoringContext<S>, tiles: &[Tile]) -> Result<Vec<ScoredPixel>>
where
    S: ContactMatrix + ?Sized,
{
    info!("Preparing to convolve {} tiles", tiles.len());
    let dump = ctx
        .config
        .scores_dump
        .as_ref()
        .map(|path| ScoredPixelWriter::create(path, ctx.kernels, false).map(Mutex::new))
        .transpose()?;

    let pixels = map_reduce_tiles(
        tiles,
        ctx.config,
        "scoring",
        |tile| {
            let mut pixels = score_tile(tile, ctx)?;
            annotate_pvalues(&mut pixels);
            if let Some(dump) = &dump {
                dump.lock()
                    .map_err(|_| poisoned_dump())?
                    .write_pixels(&pixels)?;
            }
            Ok(pixels)
        },
        Vec::new,
        concat,
    )?;

    if let (Some(dump), Some(path)) = (dump, &ctx.config.scores_dump) {
        dump.into_inner().map_err(|_| poisoned_dump())?.finish()?;
        info!("Scored pixels dumped to {}", path.display());
    }

    info!("Scored {} pixels", pixels.len());
    Ok(pixels)
}

///
/// First lambda-chunking pass: score every tile and sum the per-tile
/// histograms. The top ladder bin is checked and dropped.
///
pub fn scoring_and_histogramming_step<S>(
    ctx: &ScoringContext<S>,
    tiles: &[Tile],
    ladder: &LambdaLadder,
) -> Result<HistogramSet>
where
    S: ContactMatrix + ?Sized,
{
    info!("Histogramming scored pixels of {} tiles", tiles.len());
    let n_kernels = ctx.kernels.len();
    let mut hists = map_reduce_tiles(
        tiles,
        ctx.config,
        "histogramming",
        |tile| {
            let pixels = score_tile(tile, ctx)?;
            Ok(HistogramSet::from_pixels(&pixels, n_kernels, ladder))
        },
        || HistogramSet::empty(n_kernels, ladder),
        HistogramSet::merge,
    )?;

    hists.check_and_drop_top_bin(ctx.kernels, ladder)?;
    Ok(hists)
}

///
/// Second lambda-chunking pass: re-score every tile and keep the pixels
/// passing the thresholds. Sorted by `(chrom1, chrom2, start1, start2)`.
///
pub fn scoring_and_extraction_step<S>(
    ctx: &ScoringContext<S>,
    tiles: &[Tile],
    ladder: &LambdaLadder,
    thresholds: &ThresholdTable,
) -> Result<Vec<ScoredPixel>>
where
    S: ContactMatrix + ?Sized,
{
    info!("Extracting significant pixels from {} tiles", tiles.len());
    let mut pixels = map_reduce_tiles(
        tiles,
        ctx.config,
        "extraction",
        |tile| {
            let pixels = score_tile(tile, ctx)?;
            Ok(extract_scored_pixels(pixels, ladder, thresholds))
        },
        Vec::new,
        concat,
    )?;

    let bins = ctx.store.bins();
    let key = |px: &ScoredPixel| {
        let b1 = bins.annotate(px.bin1_id);
        let b2 = bins.annotate(px.bin2_id);
        (
            b1.map(|b| b.chrom.clone()),
            b2.map(|b| b.chrom.clone()),
            b1.map(|b| b.start),
            b2.map(|b| b.start),
        )
    };
    pixels.sort_by_cached_key(key);

    info!("{} pixels pass the lambda-chunk thresholds", pixels.len());
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::KernelSet;
    use crate::tiling::heatmap_tiles_generator_diag;

    use gtars_hic::{Bin, BinTable, ExpectedTable, InMemoryContacts};

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(100, 4, None, 7)]
    #[case(3, 8, None, 1)]
    #[case(100, 4, Some(10), 10)]
    fn test_chunk_size(
        #[case] n_tiles: usize,
        #[case] n_threads: usize,
        #[case] chunk: Option<usize>,
        #[case] expected: usize,
    ) {
        let config = DotCallerConfig {
            n_threads,
            chunk_size: chunk,
            ..Default::default()
        };
        assert_eq!(chunk_size(n_tiles, &config), expected);
    }

    fn tiles(n: u64) -> Vec<Tile> {
        use gtars_hic::Span;
        (0..n)
            .map(|i| Tile::unpadded("chr1", Span::new(i, i + 1), Span::new(i, i + 1)))
            .collect()
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    fn test_map_reduce_preserves_tile_order(#[case] n_threads: usize) {
        let config = DotCallerConfig {
            n_threads,
            ..Default::default()
        };
        let starts = map_reduce_tiles(
            &tiles(50),
            &config,
            "test",
            |tile| Ok(vec![tile.rows.start]),
            Vec::new,
            |mut a, b| {
                a.extend(b);
                a
            },
        )
        .unwrap();
        assert_eq!(starts, (0..50).collect::<Vec<u64>>());
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    fn test_failing_tile_aborts(#[case] n_threads: usize) {
        let config = DotCallerConfig {
            n_threads,
            ..Default::default()
        };
        let result = map_reduce_tiles(
            &tiles(20),
            &config,
            "test",
            |tile| {
                if tile.rows.start == 13 {
                    Err(DotCallerError::InvalidConfig("tile 13".to_string()))
                } else {
                    Ok(1u64)
                }
            },
            || 0,
            |a, b| a + b,
        );
        assert!(matches!(result, Err(DotCallerError::InvalidConfig(_))));
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    fn test_scores_dump_is_streamed_per_tile(#[case] n_threads: usize) {
        let n_bins = 30u64;
        let bins = (0..n_bins)
            .map(|i| Bin {
                chrom: "chr1".to_string(),
                start: i * 1000,
                end: (i + 1) * 1000,
            })
            .collect();
        let bins = BinTable::new(bins)
            .with_weights("weight", vec![1.0; n_bins as usize])
            .unwrap();
        let pixels: Vec<(u64, u64, f64)> = (0..n_bins)
            .flat_map(|i| (i..n_bins).map(move |j| (i, j, 1.0 + ((i * 7 + j * 3) % 5) as f64)))
            .collect();
        let store = InMemoryContacts::from_pixels(bins, pixels).unwrap();
        let expected = ExpectedTable::new().with_profile("chr1", vec![2.0; n_bins as usize]);
        let kernels = KernelSet::hiccups(3, 1).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.tsv");
        let config = DotCallerConfig {
            n_threads,
            max_nans_tolerated: 100,
            scores_dump: Some(path.clone()),
            ..Default::default()
        };
        let tiles = heatmap_tiles_generator_diag(&store, &["chr1"], 3, 8, 200).unwrap();
        let ctx = ScoringContext {
            store: &store,
            expected: &expected,
            kernels: &kernels,
            config: &config,
        };

        let scored = scoring_step(&ctx, &tiles).unwrap();
        assert!(!scored.is_empty());

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("bin1_id\tbin2_id"));
        let mut dumped: Vec<(u64, u64)> = lines
            .map(|line| {
                let mut fields = line.split('\t');
                let bin1 = fields.next().unwrap().parse().unwrap();
                let bin2 = fields.next().unwrap().parse().unwrap();
                (bin1, bin2)
            })
            .collect();
        dumped.sort();
        let mut returned: Vec<(u64, u64)> = scored.iter().map(|px| (px.bin1_id, px.bin2_id)).collect();
        returned.sort();
        assert_eq!(dumped, returned);
    }
}
