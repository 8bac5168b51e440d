//! HiCCUPS-style lambda-chunking.
//!
//! Hypotheses are grouped by the magnitude of their locally-adjusted
//! expected on a logarithmic ladder, and each group is tested against a
//! single Poisson rate: the upper edge of its ladder bin. Per tile, the
//! observed counts of every group are bincounted. The tile histograms are
//! summed, FDR thresholds are derived per group, and a second pass over the
//! tiles keeps the pixels above threshold for every kernel.

use log::debug;
use statrs::distribution::{DiscreteCDF, Poisson};

use crate::consts::LAMBDA_LADDER_STEPS_PER_OCTAVE;
use crate::errors::{DotCallerError, Result};
use crate::kernels::KernelSet;
use crate::scoring::ScoredPixel;

///
/// Edges `2^(k/3)` for `k = 0..=w1_max_index`. Bins are left-open and
/// right-closed: `(-inf, 1]`, `(1, 2^(1/3)]`, ..., `(last, +inf)`.
///
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaLadder {
    edges: Vec<f64>,
}

impl LambdaLadder {
    pub fn new(w1_max_index: u32) -> Self {
        let step = LAMBDA_LADDER_STEPS_PER_OCTAVE as f64;
        let edges = (0..=w1_max_index)
            .map(|k| 2f64.powf(k as f64 / step))
            .collect();
        LambdaLadder { edges }
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins, the open-ended top bin included.
    pub fn n_bins(&self) -> usize {
        self.edges.len() + 1
    }

    pub fn top_bin(&self) -> usize {
        self.edges.len()
    }

    /// Bin containing `value`.
    pub fn bin_index(&self, value: f64) -> usize {
        self.edges.partition_point(|&edge| edge < value)
    }

    /// Closed upper edge of a bin, the Poisson rate of its hypotheses.
    pub fn upper_edge(&self, bin: usize) -> f64 {
        self.edges.get(bin).copied().unwrap_or(f64::INFINITY)
    }

    pub fn describe(&self, bin: usize) -> String {
        let lower = match bin {
            0 => f64::NEG_INFINITY,
            _ => self.upper_edge(bin - 1),
        };
        format!("({}, {}]", lower, self.upper_edge(bin))
    }
}

///
/// Bin-by-observed count table of one kernel. Observed vectors grow on
/// demand; absent entries are zero.
///
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KernelHistogram {
    bins: Vec<Vec<u64>>,
}

impl KernelHistogram {
    pub fn new(n_bins: usize) -> Self {
        KernelHistogram {
            bins: vec![Vec::new(); n_bins],
        }
    }

    pub fn add(&mut self, bin: usize, observed: usize) {
        if bin >= self.bins.len() {
            self.bins.resize(bin + 1, Vec::new());
        }
        let counts = &mut self.bins[bin];
        if observed >= counts.len() {
            counts.resize(observed + 1, 0);
        }
        counts[observed] += 1;
    }

    /// Element-wise sum with zero fill.
    pub fn merge(mut self, other: KernelHistogram) -> KernelHistogram {
        if other.bins.len() > self.bins.len() {
            self.bins.resize(other.bins.len(), Vec::new());
        }
        for (mine, theirs) in self.bins.iter_mut().zip(other.bins) {
            if theirs.len() > mine.len() {
                mine.resize(theirs.len(), 0);
            }
            for (m, t) in mine.iter_mut().zip(theirs) {
                *m += t;
            }
        }
        self
    }

    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn bin(&self, bin: usize) -> &[u64] {
        self.bins.get(bin).map(|b| b.as_slice()).unwrap_or(&[])
    }

    pub fn total(&self, bin: usize) -> u64 {
        self.bin(bin).iter().sum()
    }

    /// Length of the longest observed vector.
    pub fn max_len(&self) -> usize {
        self.bins.iter().map(|b| b.len()).max().unwrap_or(0)
    }
}

///
/// One histogram per kernel, in kernel-set order.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramSet {
    kernels: Vec<KernelHistogram>,
}

impl HistogramSet {
    pub fn empty(n_kernels: usize, ladder: &LambdaLadder) -> Self {
        HistogramSet {
            kernels: vec![KernelHistogram::new(ladder.n_bins()); n_kernels],
        }
    }

    ///
    /// Histogram the pixels of one tile.
    ///
    pub fn from_pixels(pixels: &[ScoredPixel], n_kernels: usize, ladder: &LambdaLadder) -> Self {
        let mut set = HistogramSet::empty(n_kernels, ladder);
        for px in pixels {
            let observed = px.obs_raw.round().max(0.0) as usize;
            for (hist, score) in set.kernels.iter_mut().zip(px.kernels.iter()) {
                hist.add(ladder.bin_index(score.value), observed);
            }
        }
        set
    }

    /// Associative, commutative sum of two partial histograms.
    pub fn merge(self, other: HistogramSet) -> HistogramSet {
        let n = self.kernels.len().max(other.kernels.len());
        let mut left = self.kernels.into_iter();
        let mut right = other.kernels.into_iter();
        let kernels = (0..n)
            .map(|_| match (left.next(), right.next()) {
                (Some(a), Some(b)) => a.merge(b),
                (Some(a), None) | (None, Some(a)) => a,
                (None, None) => KernelHistogram::default(),
            })
            .collect();
        HistogramSet { kernels }
    }

    pub fn kernel(&self, k: usize) -> Option<&KernelHistogram> {
        self.kernels.get(k)
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    ///
    /// The open-ended top bin must hold no pixel: otherwise the ladder does
    /// not reach the data. The top bin is dropped once checked.
    ///
    pub fn check_and_drop_top_bin(&mut self, kernels: &KernelSet, ladder: &LambdaLadder) -> Result<()> {
        let top = ladder.top_bin();
        for (name, hist) in kernels.names().zip(self.kernels.iter()) {
            let count = hist.total(top);
            if count > 0 {
                return Err(DotCallerError::LadderOverflow {
                    kernel: name.to_string(),
                    bin: ladder.describe(top),
                    count,
                });
            }
        }
        for hist in self.kernels.iter_mut() {
            hist.bins.truncate(top);
        }
        Ok(())
    }
}

///
/// FDR thresholds and lambda-chunk q-values of one kernel, per ladder bin.
///
#[derive(Debug, Clone, PartialEq)]
pub struct KernelThresholds {
    /// A pixel is significant if its observed count is strictly larger.
    pub thresholds: Vec<u64>,
    /// `qvalues[bin][obs]`, NaN where no hypothesis was observed.
    pub qvalues: Vec<Vec<f64>>,
}

impl KernelThresholds {
    pub fn threshold(&self, bin: usize) -> Option<u64> {
        self.thresholds.get(bin).copied()
    }

    pub fn qvalue(&self, bin: usize, observed: usize) -> f64 {
        self.qvalues
            .get(bin)
            .and_then(|q| q.get(observed))
            .copied()
            .unwrap_or(f64::NAN)
    }
}

///
/// Per-bin thresholds for one kernel.
///
/// Within a bin the reverse-cumulative histogram (hypotheses with at least
/// `o` counts) is compared to the number expected under a Poisson of rate
/// equal to the bin's upper edge. The threshold is the first `o` where
/// `fdr * observed_tail - poisson_tail > 0`, or the histogram length when
/// there is none.
///
pub fn determine_thresholds(hist: &KernelHistogram, ladder: &LambdaLadder, fdr: f64) -> KernelThresholds {
    let very_high = hist.max_len();
    let mut thresholds = Vec::with_capacity(hist.n_bins());
    let mut qvalues = Vec::with_capacity(hist.n_bins());

    for bin in 0..hist.n_bins() {
        let counts = hist.bin(bin);
        let total = hist.total(bin) as f64;
        let poisson = Poisson::new(ladder.upper_edge(bin)).ok();

        let mut rcs_hist = vec![0.0; very_high];
        let mut running = 0u64;
        for o in (0..very_high).rev() {
            running += counts.get(o).copied().unwrap_or(0);
            rcs_hist[o] = running as f64;
        }

        let rcs_poisson: Vec<f64> = (0..very_high)
            .map(|o| {
                let tail = match (o, &poisson) {
                    (0, _) => 1.0,
                    (_, Some(p)) => p.sf(o as u64 - 1),
                    (_, None) => 0.0,
                };
                total * tail
            })
            .collect();

        let threshold = (0..very_high)
            .find(|&o| fdr * rcs_hist[o] - rcs_poisson[o] > 0.0)
            .unwrap_or(very_high);

        thresholds.push(threshold as u64);
        qvalues.push(
            rcs_poisson
                .iter()
                .zip(rcs_hist.iter())
                .map(|(p, h)| p / h)
                .collect(),
        );
    }

    KernelThresholds {
        thresholds,
        qvalues,
    }
}

///
/// Thresholds of every kernel, in kernel-set order.
///
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    kernels: Vec<KernelThresholds>,
}

impl ThresholdTable {
    pub fn from_histograms(hists: &HistogramSet, ladder: &LambdaLadder, fdr: f64) -> Self {
        let kernels = hists
            .kernels
            .iter()
            .map(|hist| determine_thresholds(hist, ladder, fdr))
            .collect();
        ThresholdTable { kernels }
    }

    pub fn kernel(&self, k: usize) -> Option<&KernelThresholds> {
        self.kernels.get(k)
    }
}

///
/// Keep the pixels whose observed count exceeds the threshold of every
/// kernel, looked up in the ladder bin of that kernel's adjusted expected.
/// Kept pixels carry the lambda-chunk q-value of each kernel.
///
pub fn extract_scored_pixels(
    pixels: Vec<ScoredPixel>,
    ladder: &LambdaLadder,
    thresholds: &ThresholdTable,
) -> Vec<ScoredPixel> {
    let n_in = pixels.len();
    let kept: Vec<ScoredPixel> = pixels
        .into_iter()
        .filter_map(|mut px| {
            let observed = px.obs_raw.round().max(0.0) as usize;
            for (k, score) in px.kernels.iter_mut().enumerate() {
                let bin = ladder.bin_index(score.value);
                let table = thresholds.kernel(k)?;
                let threshold = table.threshold(bin)?;
                if px.obs_raw <= threshold as f64 {
                    return None;
                }
                score.qval = Some(table.qvalue(bin, observed));
            }
            Some(px)
        })
        .collect();
    debug!("Extracted {} of {} pixels", kept.len(), n_in);
    kept
}
