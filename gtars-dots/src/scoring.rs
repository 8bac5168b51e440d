//! Locally-adjusted expected for every pixel of a tile.
//!
//! For a kernel `K`, the locally-adjusted expected of a pixel is the raw
//! expected scaled by the ratio of kernel-weighted sums of balanced observed
//! and balanced expected around it:
//!
//! ```text
//! Ek_raw = E_raw * (K * O_bal) / (K * E_bal)
//! ```
//!
//! Everything below the main diagonal is treated as missing so that pixels
//! near the diagonal are penalised by their NaN count instead of borrowing
//! counts from the mirrored triangle.

use log::debug;
use ndarray::{Array1, Array2, Zip, s};

use gtars_hic::{ContactMatrix, ExpectedTable, toeplitz_block};

use crate::config::DotCallerConfig;
use crate::consts::LOWLEFT;
use crate::errors::{DotCallerError, Result};
use crate::kernels::KernelSet;
use crate::tiling::Tile;

///
/// `ndimage.convolve` with `mode='constant'`: the kernel is flipped and every
/// position outside `input` reads as `cval`.
///
pub fn convolve(input: &Array2<f64>, kernel: &Array2<f64>, cval: f64) -> Array2<f64> {
    let (n, m) = input.dim();
    let (kr, kc) = kernel.dim();
    let (hr, hc) = (kr / 2, kc / 2);

    let mut padded = Array2::from_elem((n + 2 * hr, m + 2 * hc), cval);
    padded.slice_mut(s![hr..hr + n, hc..hc + m]).assign(input);

    let mut out = Array2::<f64>::zeros((n, m));
    for ((a, b), &weight) in kernel.indexed_iter() {
        if weight == 0.0 {
            continue;
        }
        // kernel[a, b] weighs input[i + hr - a, j + hc - b]
        let (ra, cb) = (kr - 1 - a, kc - 1 - b);
        out.scaled_add(weight, &padded.slice(s![ra..ra + n, cb..cb + m]));
    }
    out
}

///
/// Balancing weights of a tile: one vector for tiles on the main diagonal,
/// one per axis otherwise.
///
#[derive(Debug, Clone)]
pub enum BalanceWeights {
    Symmetric(Array1<f64>),
    Rectangular(Array1<f64>, Array1<f64>),
}

impl BalanceWeights {
    fn axes(&self) -> (&Array1<f64>, &Array1<f64>) {
        match self {
            BalanceWeights::Symmetric(w) => (w, w),
            BalanceWeights::Rectangular(rows, cols) => (rows, cols),
        }
    }

    /// `outer(w_row, w_col)` for a tile of the given shape.
    pub fn outer(&self, shape: (usize, usize)) -> Result<Array2<f64>> {
        let (rows, cols) = self.axes();
        if (rows.len(), cols.len()) != shape {
            return Err(DotCallerError::WeightShape {
                weights: (rows.len(), cols.len()),
                tile: shape,
            });
        }
        Ok(Array2::from_shape_fn(shape, |(i, j)| rows[i] * cols[j]))
    }
}

///
/// Per-kernel statistics of one pixel.
///
#[derive(Debug, Clone, PartialEq)]
pub struct KernelScore {
    /// Locally-adjusted expected, raw units.
    pub value: f64,
    /// Missing pixels in the kernel footprint; the outside of a tile counts.
    pub nnans: u32,
    pub pval: Option<f64>,
    pub qval: Option<f64>,
}

impl KernelScore {
    pub fn new(value: f64, nnans: u32) -> Self {
        KernelScore {
            value,
            nnans,
            pval: None,
            qval: None,
        }
    }
}

///
/// One upper-triangle pixel with its raw counts and per-kernel scores, in
/// the order of the kernel set.
///
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPixel {
    pub bin1_id: u64,
    pub bin2_id: u64,
    pub obs_raw: f64,
    pub exp_raw: f64,
    pub kernels: Vec<KernelScore>,
    /// `balance_factor * (K_lowleft * O_bal)`, when requested.
    pub lowleft_kerobs: Option<f64>,
}

impl ScoredPixel {
    pub fn separation(&self) -> u64 {
        self.bin2_id - self.bin1_id
    }
}

///
/// Locally-adjusted expected of every strictly upper-triangle pixel of a
/// tile.
///
/// `origin` is the absolute `(row, col)` bin of the tile's top-left corner;
/// the lower triangle is masked with respect to it. Pixels for which any
/// kernel yields a non-finite value are dropped.
///
pub fn adjusted_expected_tile(
    origin: (u64, u64),
    observed: &Array2<f64>,
    expected: &Array2<f64>,
    weights: &BalanceWeights,
    kernels: &KernelSet,
    balance_factor: Option<f64>,
) -> Result<Vec<ScoredPixel>> {
    let shape = observed.dim();
    if expected.dim() != shape {
        return Err(DotCallerError::TileShape {
            observed: shape,
            expected: expected.dim(),
        });
    }
    if kernels.is_empty() {
        return Err(DotCallerError::InvalidConfig(
            "at least one kernel is required".to_string(),
        ));
    }

    let (row0, col0) = origin;
    let outer = weights.outer(shape)?;
    let mut o_bal = observed * &outer;
    let mut e_bal = expected.clone();

    Zip::indexed(&mut o_bal)
        .and(&mut e_bal)
        .for_each(|(i, j), o, e| {
            if row0 + i as u64 > col0 + j as u64 {
                *o = f64::NAN;
                *e = f64::NAN;
            }
        });

    let e_raw = &e_bal / &outer;

    let mut nan_mask = Array2::<f64>::zeros(shape);
    Zip::from(&mut nan_mask)
        .and(&mut o_bal)
        .and(&mut e_bal)
        .for_each(|n, o, e| {
            if o.is_nan() || e.is_nan() {
                *n = 1.0;
                *o = 0.0;
                *e = 0.0;
            }
        });

    let mut la_exp = Vec::with_capacity(kernels.len());
    let mut la_nans = Vec::with_capacity(kernels.len());
    let mut kerobs = None;
    for (name, kernel) in kernels.iter() {
        let ko = convolve(&o_bal, kernel.weights(), 0.0);
        let ke = convolve(&e_bal, kernel.weights(), 0.0);
        let nn = convolve(&nan_mask, &kernel.footprint(), 1.0);

        let ratio = &ko / &ke;
        la_exp.push(&e_raw * &ratio);
        la_nans.push(nn);

        if name == LOWLEFT {
            kerobs = balance_factor.map(|factor| ko * factor);
        }
    }

    let mut pixels = Vec::new();
    for ((i, j), &obs) in observed.indexed_iter() {
        let (bin1_id, bin2_id) = (row0 + i as u64, col0 + j as u64);
        if bin1_id >= bin2_id {
            continue;
        }
        if la_exp.iter().any(|ek| !ek[[i, j]].is_finite()) {
            continue;
        }
        pixels.push(ScoredPixel {
            bin1_id,
            bin2_id,
            obs_raw: obs,
            exp_raw: e_raw[[i, j]],
            kernels: la_exp
                .iter()
                .zip(la_nans.iter())
                .map(|(ek, nn)| KernelScore::new(ek[[i, j]], nn[[i, j]].round() as u32))
                .collect(),
            lowleft_kerobs: kerobs.as_ref().map(|k| k[[i, j]]),
        });
    }

    Ok(pixels)
}

///
/// Shared read-only inputs of every tile job.
///
pub struct ScoringContext<'a, S: ContactMatrix + ?Sized> {
    pub store: &'a S,
    pub expected: &'a ExpectedTable,
    pub kernels: &'a KernelSet,
    pub config: &'a DotCallerConfig,
}

impl<S: ContactMatrix + ?Sized> Clone for ScoringContext<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ContactMatrix + ?Sized> Copy for ScoringContext<'_, S> {}

///
/// Fetch a tile and score the pixels it owns. Pixels outside the separation
/// band, or with too many missing neighbours for any kernel, are dropped.
///
pub fn score_tile<S>(tile: &Tile, ctx: &ScoringContext<S>) -> Result<Vec<ScoredPixel>>
where
    S: ContactMatrix + ?Sized,
{
    let config = ctx.config;

    let observed = ctx.store.fetch_matrix(tile.rows, tile.cols, None)?;
    let profile = ctx
        .expected
        .profile(&tile.chrom)
        .map_err(|_| DotCallerError::MissingExpected(tile.chrom.clone()))?;
    let expected = toeplitz_block(profile, tile.rows, tile.cols);

    let weights = if tile.is_symmetric() {
        BalanceWeights::Symmetric(ctx.store.fetch_bin_weights(tile.rows, &config.weight_name)?)
    } else {
        BalanceWeights::Rectangular(
            ctx.store.fetch_bin_weights(tile.rows, &config.weight_name)?,
            ctx.store.fetch_bin_weights(tile.cols, &config.weight_name)?,
        )
    };

    let mut pixels = adjusted_expected_tile(
        (tile.rows.start, tile.cols.start),
        &observed,
        &expected,
        &weights,
        ctx.kernels,
        config.balance_factor,
    )?;

    pixels.retain(|px| {
        let sep = px.separation();
        tile.owns(px.bin1_id, px.bin2_id)
            && sep >= config.min_loci_separation
            && sep < config.max_loci_separation
            && px
                .kernels
                .iter()
                .all(|k| k.nnans < config.max_nans_tolerated)
    });

    debug!("Scored {} pixels in tile {}", pixels.len(), tile);

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{Kernel, KernelType};

    use gtars_hic::{Bin, BinTable, InMemoryContacts, Span};
    use ndarray::array;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn uniform(n: usize, value: f64) -> Array2<f64> {
        Array2::from_elem((n, n), value)
    }

    fn ones(n: usize) -> BalanceWeights {
        BalanceWeights::Symmetric(Array1::from_elem(n, 1.0))
    }

    #[fixture]
    fn donut() -> KernelSet {
        KernelSet::new()
            .with_kernel("donut", Kernel::build(KernelType::Donut, 3, 1).unwrap())
            .unwrap()
    }

    #[rstest]
    fn test_convolve_flips_kernel() {
        let input = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let kernel = array![[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]];
        let out = convolve(&input, &kernel, 0.0);
        assert_eq!(
            out,
            array![[5.0, 6.0, 0.0], [8.0, 9.0, 0.0], [0.0, 0.0, 0.0]]
        );
    }

    #[rstest]
    fn test_convolve_boundary_value() {
        let input = Array2::<f64>::zeros((2, 2));
        let out = convolve(&input, &uniform(3, 1.0), 1.0);
        assert_eq!(out, uniform(2, 5.0));
    }

    #[rstest]
    fn test_weight_shape_mismatch(donut: KernelSet) {
        let weights = BalanceWeights::Symmetric(Array1::from_elem(3, 1.0));
        let result = adjusted_expected_tile(
            (0, 0),
            &uniform(4, 1.0),
            &uniform(4, 1.0),
            &weights,
            &donut,
            None,
        );
        assert!(matches!(result, Err(DotCallerError::WeightShape { .. })));
    }

    #[rstest]
    fn test_matching_observed_gives_raw_expected(donut: KernelSet) {
        let n = 20;
        let expected = Array2::from_shape_fn((n, n), |(i, j)| 8.0 / (1.0 + (i as f64 - j as f64).abs()));
        let observed = expected.mapv(|e| e / 4.0);
        let weights = BalanceWeights::Symmetric(Array1::from_elem(n, 2.0));

        let pixels = adjusted_expected_tile((0, 0), &observed, &expected, &weights, &donut, None).unwrap();
        assert!(!pixels.is_empty());
        for px in &pixels {
            assert_eq!(px.kernels[0].value, px.exp_raw);
        }
    }

    #[rstest]
    fn test_rescaling_both_matrices_scales_adjusted_expected(donut: KernelSet) {
        let n = 20;
        let expected = uniform(n, 3.0);
        let observed = Array2::from_shape_fn((n, n), |(i, j)| ((i * 7 + j * 3) % 5) as f64);

        let base = adjusted_expected_tile((0, 0), &observed, &expected, &ones(n), &donut, None).unwrap();
        let scaled = adjusted_expected_tile(
            (0, 0),
            &(&observed * 3.0),
            &(&expected * 3.0),
            &ones(n),
            &donut,
            None,
        )
        .unwrap();

        assert_eq!(base.len(), scaled.len());
        for (a, b) in base.iter().zip(scaled.iter()) {
            assert!((3.0 * a.kernels[0].value - b.kernels[0].value).abs() < 1e-9);
        }
    }

    #[rstest]
    #[case((0, 0))]
    #[case((10, 5))]
    #[case((30, 0))]
    fn test_nothing_emitted_on_or_below_diagonal(#[case] origin: (u64, u64), donut: KernelSet) {
        let n = 20;
        let pixels =
            adjusted_expected_tile(origin, &uniform(n, 4.0), &uniform(n, 4.0), &ones(n), &donut, None)
                .unwrap();
        assert!(pixels.iter().all(|px| px.bin1_id < px.bin2_id));
        if origin == (30, 0) {
            assert!(pixels.is_empty());
        }
    }

    #[rstest]
    fn test_lower_triangle_counts_as_missing(donut: KernelSet) {
        let n = 20;
        let pixels =
            adjusted_expected_tile((0, 0), &uniform(n, 4.0), &uniform(n, 4.0), &ones(n), &donut, None)
                .unwrap();
        let nnans = |b1: u64, b2: u64| {
            pixels
                .iter()
                .find(|px| px.bin1_id == b1 && px.bin2_id == b2)
                .map(|px| px.kernels[0].nnans)
                .unwrap()
        };
        assert_eq!(nnans(5, 14), 0);
        assert!(nnans(5, 6) > 0);
        assert!(nnans(0, 14) > 0);
    }

    #[rstest]
    fn test_zero_expected_is_dropped(donut: KernelSet) {
        let n = 12;
        let pixels = adjusted_expected_tile(
            (0, 0),
            &uniform(n, 1.0),
            &Array2::zeros((n, n)),
            &ones(n),
            &donut,
            None,
        )
        .unwrap();
        assert!(pixels.is_empty());
    }

    #[rstest]
    fn test_lowleft_kerobs_needs_factor() {
        let kernels = KernelSet::hiccups(3, 1).unwrap();
        let n = 16;
        let (obs, exp) = (uniform(n, 2.0), uniform(n, 2.0));

        let without = adjusted_expected_tile((0, 0), &obs, &exp, &ones(n), &kernels, None).unwrap();
        assert!(without.iter().all(|px| px.lowleft_kerobs.is_none()));

        let with = adjusted_expected_tile((0, 0), &obs, &exp, &ones(n), &kernels, Some(0.5)).unwrap();
        let px = with
            .iter()
            .find(|px| px.bin1_id == 3 && px.bin2_id == 12)
            .unwrap();
        // eight lowleft cells of value 2, all inside the tile and above the diagonal
        assert_eq!(px.lowleft_kerobs, Some(8.0));
    }

    #[rstest]
    fn test_score_tile_applies_band_and_nan_filters(donut: KernelSet) {
        let n = 30u64;
        let bins: Vec<Bin> = (0..n)
            .map(|i| Bin {
                chrom: "chr1".to_string(),
                start: i * 1000,
                end: (i + 1) * 1000,
            })
            .collect();
        let table = BinTable::new(bins)
            .with_weights("weight", vec![1.0; n as usize])
            .unwrap();
        let pixels: Vec<(u64, u64, f64)> = (0..n)
            .flat_map(|i| (i..n).map(move |j| (i, j, 5.0)))
            .collect();
        let store = InMemoryContacts::from_pixels(table, pixels).unwrap();
        let expected = ExpectedTable::new().with_profile("chr1", vec![5.0; n as usize]);
        let config = DotCallerConfig {
            max_loci_separation: 10,
            ..Default::default()
        };
        let ctx = ScoringContext {
            store: &store,
            expected: &expected,
            kernels: &donut,
            config: &config,
        };

        let tile = Tile::unpadded("chr1", Span::new(0, n), Span::new(0, n));
        let scored = score_tile(&tile, &ctx).unwrap();

        assert!(scored.iter().any(|px| (px.bin1_id, px.bin2_id) == (5, 14)));
        for px in &scored {
            assert!(px.separation() > 0 && px.separation() < 10);
            assert_eq!(px.kernels[0].nnans, 0);
            assert_eq!(px.kernels[0].value, 5.0);
        }

        let missing = ScoringContext {
            config: &DotCallerConfig {
                weight_name: "KR".to_string(),
                ..Default::default()
            },
            ..ctx
        };
        assert!(score_tile(&tile, &missing).is_err());
    }
}
