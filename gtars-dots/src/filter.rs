use log::info;

use crate::clustering::Centroid;
use crate::consts::*;
use crate::errors::{DotCallerError, Result};
use crate::kernels::KernelSet;

///
/// One called dot: the peak pixel of a cluster and its statistics.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Dot {
    pub chrom1: String,
    pub start1: u64,
    pub end1: u64,
    pub chrom2: String,
    pub start2: u64,
    pub end2: u64,
    pub cstart1: f64,
    pub cstart2: f64,
    pub c_label: usize,
    pub c_size: usize,
    pub obs_raw: f64,
    pub exp_raw: f64,
    /// Locally-adjusted expected per kernel, in kernel-set order.
    pub la_exp: Vec<f64>,
    pub lowleft_kerobs: Option<f64>,
    /// Q-value per kernel, NaN when unknown.
    pub qvals: Vec<f64>,
}

impl From<Centroid> for Dot {
    fn from(centroid: Centroid) -> Self {
        let Centroid {
            pixel,
            bin1,
            bin2,
            cstart1,
            cstart2,
            c_label,
            c_size,
        } = centroid;
        Dot {
            chrom1: bin1.chrom,
            start1: bin1.start,
            end1: bin1.end,
            chrom2: bin2.chrom,
            start2: bin2.start,
            end2: bin2.end,
            cstart1,
            cstart2,
            c_label,
            c_size,
            obs_raw: pixel.obs_raw,
            exp_raw: pixel.exp_raw,
            la_exp: pixel.kernels.iter().map(|k| k.value).collect(),
            lowleft_kerobs: pixel.lowleft_kerobs,
            qvals: pixel
                .kernels
                .iter()
                .map(|k| k.qval.unwrap_or(f64::NAN))
                .collect(),
        }
    }
}

/// Positions of the HiCCUPS kernels in a kernel set.
struct FilterKernels {
    donut: Option<usize>,
    vertical: Option<usize>,
    horizontal: Option<usize>,
    lowleft: Option<usize>,
}

impl FilterKernels {
    fn locate(kernels: &KernelSet) -> Result<Self> {
        let located = FilterKernels {
            donut: kernels.position(DONUT),
            vertical: kernels.position(VERTICAL),
            horizontal: kernels.position(HORIZONTAL),
            lowleft: kernels.position(LOWLEFT),
        };
        if located.donut.is_none() && located.lowleft.is_none() {
            return Err(DotCallerError::MissingKernel(format!("{} or {}", DONUT, LOWLEFT)));
        }
        Ok(located)
    }

    fn all(&self) -> impl Iterator<Item = usize> {
        [self.donut, self.vertical, self.horizontal, self.lowleft]
            .into_iter()
            .flatten()
    }
}

///
/// Fails unless the kernel set allows the final filter to run.
///
pub fn check_filter_kernels(kernels: &KernelSet) -> Result<()> {
    FilterKernels::locate(kernels).map(|_| ())
}

fn enriched(centroid: &Centroid, k: usize, factor: f64) -> bool {
    centroid.pixel.obs_raw > factor * centroid.pixel.kernels[k].value
}

fn passes(centroid: &Centroid, kernels: &FilterKernels) -> bool {
    let strong = |k: Option<usize>, factor: f64| k.is_none_or(|k| enriched(centroid, k, factor));

    let enrichment = strong(kernels.lowleft, ENRICHMENT_FACTOR_2)
        && strong(kernels.donut, ENRICHMENT_FACTOR_2)
        && strong(kernels.vertical, ENRICHMENT_FACTOR_1)
        && strong(kernels.horizontal, ENRICHMENT_FACTOR_1)
        && [kernels.lowleft, kernels.donut]
            .into_iter()
            .flatten()
            .any(|k| enriched(centroid, k, ENRICHMENT_FACTOR_3));

    let qsum: f64 = kernels
        .all()
        .map(|k| centroid.pixel.kernels[k].qval.unwrap_or(f64::NAN))
        .sum();

    enrichment && (centroid.c_size > 1 || qsum <= FDR_ORPHAN_THRESHOLD)
}

///
/// Enrichment and orphan rules applied to cluster representatives.
///
/// Representatives must exceed the donut and lowleft expecteds by 1.75x,
/// the vertical and horizontal ones by 1.5x, and one of donut or lowleft by
/// 2x. Singletons must also have q-values summing to at most 0.02.
///
pub fn thresholding_step(centroids: Vec<Centroid>, kernels: &KernelSet) -> Result<Vec<Dot>> {
    let located = FilterKernels::locate(kernels)?;
    let n_in = centroids.len();

    let dots: Vec<Dot> = centroids
        .into_iter()
        .filter(|c| passes(c, &located))
        .map(Dot::from)
        .collect();

    info!("{} of {} cluster representatives pass the final filter", dots.len(), n_in);
    Ok(dots)
}
