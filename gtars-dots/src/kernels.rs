use std::fmt::{self, Display};
use std::str::FromStr;

use ndarray::Array2;

use crate::consts::{DONUT, HORIZONTAL, LOWLEFT, VERTICAL};
use crate::errors::{DotCallerError, Result};

///
/// The HiCCUPS neighbourhood shapes.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelType {
    Donut,
    Vertical,
    Horizontal,
    LowLeft,
}

impl KernelType {
    pub fn all() -> [KernelType; 4] {
        [
            KernelType::Donut,
            KernelType::Vertical,
            KernelType::Horizontal,
            KernelType::LowLeft,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            KernelType::Donut => DONUT,
            KernelType::Vertical => VERTICAL,
            KernelType::Horizontal => HORIZONTAL,
            KernelType::LowLeft => LOWLEFT,
        }
    }
}

impl FromStr for KernelType {
    type Err = DotCallerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            DONUT => Ok(KernelType::Donut),
            VERTICAL => Ok(KernelType::Vertical),
            HORIZONTAL => Ok(KernelType::Horizontal),
            LOWLEFT => Ok(KernelType::LowLeft),
            _ => Err(DotCallerError::MalformedKernel {
                kernel: s.to_string(),
                reason: "unknown kernel type".to_string(),
            }),
        }
    }
}

impl Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

///
/// A square, odd-sized convolution kernel. Only the kernel's non-zero entries
/// make up its footprint.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: Array2<f64>,
}

impl Kernel {
    ///
    /// Validate a kernel matrix. `name` is only used to report problems.
    ///
    pub fn new(name: &str, weights: Array2<f64>) -> Result<Self> {
        let malformed = |reason: String| DotCallerError::MalformedKernel {
            kernel: name.to_string(),
            reason,
        };

        let (nrows, ncols) = weights.dim();
        if nrows != ncols {
            return Err(malformed(format!("kernel must be square, got {}x{}", nrows, ncols)));
        }
        if nrows % 2 == 0 {
            return Err(malformed(format!("kernel side must be odd, got {}", nrows)));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(malformed("kernel contains non-finite weights".to_string()));
        }
        if weights.iter().all(|w| *w == 0.0) {
            return Err(malformed("kernel footprint is empty".to_string()));
        }

        Ok(Kernel { weights })
    }

    ///
    /// Build one of the HiCCUPS kernels of half-width `w` with an inner
    /// `(2p+1) x (2p+1)` square masked around the centre.
    ///
    pub fn build(ktype: KernelType, w: usize, p: usize) -> Result<Self> {
        if p >= w {
            return Err(DotCallerError::MalformedKernel {
                kernel: ktype.name().to_string(),
                reason: format!("peak half-width {} must be below kernel half-width {}", p, w),
            });
        }

        let width = 2 * w + 1;
        let (w, p) = (w as i64, p as i64);
        let weights = Array2::from_shape_fn((width, width), |(r, c)| {
            // y runs along rows, x along columns, both centred on the pixel
            let y = r as i64 - w;
            let x = c as i64 - w;
            let inner = x.abs() <= p && y.abs() <= p;
            let masked = match ktype {
                KernelType::Donut => inner || x == 0 || y == 0,
                KernelType::Vertical => inner || x.abs() > 1,
                KernelType::Horizontal => inner || y.abs() > 1,
                KernelType::LowLeft => inner || x >= 0 || y <= 0,
            };
            if masked { 0.0 } else { 1.0 }
        });

        Kernel::new(ktype.name(), weights)
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn width(&self) -> usize {
        self.weights.nrows()
    }

    pub fn half_width(&self) -> usize {
        (self.width() - 1) / 2
    }

    /// Indicator matrix of the non-zero entries.
    pub fn footprint(&self) -> Array2<f64> {
        self.weights.mapv(|w| if w != 0.0 { 1.0 } else { 0.0 })
    }

    pub fn footprint_size(&self) -> usize {
        self.weights.iter().filter(|w| **w != 0.0).count()
    }
}

///
/// Ordered name to kernel table. The order is the order of the per-kernel
/// output columns.
///
#[derive(Debug, Clone, Default)]
pub struct KernelSet {
    kernels: Vec<(String, Kernel)>,
}

impl KernelSet {
    pub fn new() -> Self {
        KernelSet::default()
    }

    pub fn insert(&mut self, name: &str, kernel: Kernel) -> Result<()> {
        if self.contains(name) {
            return Err(DotCallerError::MalformedKernel {
                kernel: name.to_string(),
                reason: "duplicate kernel name".to_string(),
            });
        }
        self.kernels.push((name.to_string(), kernel));
        Ok(())
    }

    pub fn with_kernel(mut self, name: &str, kernel: Kernel) -> Result<Self> {
        self.insert(name, kernel)?;
        Ok(self)
    }

    ///
    /// The four HiCCUPS kernels: donut, vertical, horizontal and lowleft.
    ///
    pub fn hiccups(w: usize, p: usize) -> Result<Self> {
        let mut set = KernelSet::new();
        for ktype in KernelType::all() {
            set.insert(ktype.name(), Kernel::build(ktype, w, p)?)?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.kernels.iter().position(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Kernel> {
        self.kernels.iter().find(|(n, _)| n == name).map(|(_, k)| k)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kernels.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Kernel)> {
        self.kernels.iter().map(|(n, k)| (n.as_str(), k))
    }

    /// Largest kernel half-width, the padding tiles need.
    pub fn max_half_width(&self) -> usize {
        self.kernels
            .iter()
            .map(|(_, k)| k.half_width())
            .max()
            .unwrap_or(0)
    }
}

///
/// Kernel half-width `w` and peak half-width `p` suited to a resolution.
///
pub fn recommend_kernel_params(binsize: u64) -> (usize, usize) {
    if binsize >= 25_000 {
        (3, 1)
    } else if binsize >= 10_000 {
        (5, 2)
    } else {
        (7, 4)
    }
}
