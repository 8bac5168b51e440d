//! Tile generators covering a diagonal band of a chromosome's contact matrix.
//!
//! Tiles are fetched with a padding `edge` so that the convolution of pixels
//! close to a tile boundary sees a complete neighbourhood. Padded tiles
//! overlap, so every tile also carries a *core*: the non-overlapping region it
//! is responsible for reporting. Cores of a tiling partition the tiled area.

use std::fmt::{self, Display};

use gtars_hic::{ContactMatrix, Span};

use crate::errors::Result;

///
/// Padded and core spans of one tile, in absolute bin coordinates.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpans {
    pub rows: Span,
    pub cols: Span,
    pub core_rows: Span,
    pub core_cols: Span,
}

///
/// A rectangular block of a chromosome's intra-chromosomal matrix.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub chrom: String,
    /// Padded row span that is fetched.
    pub rows: Span,
    /// Padded column span that is fetched.
    pub cols: Span,
    /// Rows whose pixels this tile reports.
    pub core_rows: Span,
    /// Columns whose pixels this tile reports.
    pub core_cols: Span,
}

impl Tile {
    pub fn new(chrom: &str, spans: TileSpans) -> Self {
        Tile {
            chrom: chrom.to_string(),
            rows: spans.rows,
            cols: spans.cols,
            core_rows: spans.core_rows,
            core_cols: spans.core_cols,
        }
    }

    /// A tile reporting every pixel it fetches.
    pub fn unpadded(chrom: &str, rows: Span, cols: Span) -> Self {
        Tile {
            chrom: chrom.to_string(),
            rows,
            cols,
            core_rows: rows,
            core_cols: cols,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    /// Is `(bin1, bin2)` reported by this tile?
    pub fn owns(&self, bin1: u64, bin2: u64) -> bool {
        self.core_rows.contains(bin1) && self.core_cols.contains(bin2)
    }

    pub fn is_symmetric(&self) -> bool {
        self.rows == self.cols
    }
}

impl Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}x{}", self.chrom, self.rows, self.cols)
    }
}

#[inline]
fn ceil_div(a: u64, b: u64) -> u64 {
    a / b + u64::from(a % b != 0)
}

///
/// Square tiles of side `2 * (bandwidth + edge)` marching along the diagonal
/// of `[start, stop)` in steps of `bandwidth`.
///
/// Yields `ceil(size / bandwidth) - 1` tiles: a span no longer than a single
/// `bandwidth` yields nothing.
///
#[derive(Debug, Clone)]
pub struct DiagonalTiling {
    start: u64,
    size: u64,
    bandwidth: u64,
    edge: u64,
    n_tiles: u64,
    next: u64,
}

impl DiagonalTiling {
    pub fn new(start: u64, stop: u64, bandwidth: u64, edge: u64) -> Self {
        let size = stop.saturating_sub(start);
        let n_tiles = if bandwidth == 0 {
            0
        } else {
            ceil_div(size, bandwidth)
        };
        DiagonalTiling {
            start,
            size,
            bandwidth,
            edge,
            n_tiles,
            next: 1,
        }
    }
}

impl Iterator for DiagonalTiling {
    type Item = TileSpans;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.n_tiles {
            return None;
        }
        let t = self.next;
        self.next += 1;

        let bw = self.bandwidth;
        let lw = (bw * (t - 1)).saturating_sub(self.edge);
        let rw = (bw * (t + 1) + self.edge).min(self.size);
        let span = Span::new(lw + self.start, rw + self.start);

        let core_start = bw * (t - 1);
        let core_row_end = if t + 1 == self.n_tiles {
            self.size
        } else {
            bw * t
        };
        let core_col_end = (bw * (t + 1)).min(self.size);

        Some(TileSpans {
            rows: span,
            cols: span,
            core_rows: Span::new(core_start + self.start, core_row_end + self.start),
            core_cols: Span::new(core_start + self.start, core_col_end + self.start),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.n_tiles.saturating_sub(self.next) as usize;
        (left, Some(left))
    }
}

///
/// Every `(row_tile, col_tile)` pair of a square grid of side `step` over
/// `[start, stop)`, each tile extended by `edge` and clipped to the span.
///
/// In `square` mode a tile touching the far boundary keeps its full side by
/// sliding its near boundary to `size - step - edge` instead of shrinking.
/// The resulting overlap with the neighbouring tile is not symmetric. The near
/// boundary is clamped at the span start when the span is shorter than
/// `step + edge`.
///
#[derive(Debug, Clone)]
pub struct SquareTiling {
    start: u64,
    size: u64,
    step: u64,
    edge: u64,
    square: bool,
    n_tiles: u64,
    tx: u64,
    ty: u64,
}

impl SquareTiling {
    pub fn new(start: u64, stop: u64, step: u64, edge: u64, square: bool) -> Self {
        let size = stop.saturating_sub(start);
        let n_tiles = if step == 0 { 0 } else { ceil_div(size, step) };
        SquareTiling {
            start,
            size,
            step,
            edge,
            square,
            n_tiles,
            tx: 0,
            ty: 0,
        }
    }

    fn padded(&self, t: u64) -> Span {
        let mut lw = (self.step * t).saturating_sub(self.edge);
        let rw = (self.step * (t + 1) + self.edge).min(self.size);
        if self.square && rw >= self.size {
            lw = self.size.saturating_sub(self.step + self.edge);
        }
        Span::new(lw + self.start, rw + self.start)
    }

    fn core(&self, t: u64) -> Span {
        let lo = self.step * t;
        let hi = (self.step * (t + 1)).min(self.size);
        Span::new(lo + self.start, hi + self.start)
    }
}

impl Iterator for SquareTiling {
    type Item = TileSpans;

    fn next(&mut self) -> Option<Self::Item> {
        if self.tx >= self.n_tiles {
            return None;
        }
        let (tx, ty) = (self.tx, self.ty);
        self.ty += 1;
        if self.ty == self.n_tiles {
            self.ty = 0;
            self.tx += 1;
        }

        Some(TileSpans {
            rows: self.padded(tx),
            cols: self.padded(ty),
            core_rows: self.core(tx),
            core_cols: self.core(ty),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let done = self.tx * self.n_tiles + self.ty;
        let left = (self.n_tiles * self.n_tiles).saturating_sub(done) as usize;
        (left, Some(left))
    }
}

///
/// Does a tile intersect the band `[0, band_to_cover)` of diagonal offsets by
/// more than twice the padding? The margin rejects tiles that only touch the
/// band through their padding, which also drops every tile lying below the
/// diagonal.
///
pub fn intersects_band(rows: Span, cols: Span, pad: u64, band_to_cover: u64) -> bool {
    let diag_from = cols.start as i64 - rows.end as i64;
    let diag_to = cols.end as i64 - rows.start as i64;
    let overlap = (band_to_cover as i64).min(diag_to) - diag_from.max(0);
    overlap > 2 * pad as i64
}

///
/// Does the core of a tile own at least one pixel `(i, j)` with
/// `0 <= j - i < band_to_cover`?
///
pub fn core_intersects_band(core_rows: Span, core_cols: Span, band_to_cover: u64) -> bool {
    if core_rows.is_empty() || core_cols.is_empty() {
        return false;
    }
    let max_offset = core_cols.end as i64 - 1 - core_rows.start as i64;
    let min_offset = core_cols.start as i64 - (core_rows.end as i64 - 1);
    max_offset >= 0 && min_offset < band_to_cover as i64
}

///
/// Keep a tile when it overlaps the band beyond its padding, or when its core
/// owns band pixels that no other tile reports. The second case catches a
/// short last block of a chromosome.
///
pub fn covers_band(spans: &TileSpans, pad: u64, band_to_cover: u64) -> bool {
    intersects_band(spans.rows, spans.cols, pad, band_to_cover)
        || core_intersects_band(spans.core_rows, spans.core_cols, band_to_cover)
}

///
/// Tiles of side `tile_size` (padded by `pad`) needed to cover the diagonal
/// band `[0, band_to_cover)` of every chromosome in `chroms`.
///
pub fn heatmap_tiles_generator_diag<S, C>(
    store: &S,
    chroms: &[C],
    pad: u64,
    tile_size: u64,
    band_to_cover: u64,
) -> Result<Vec<Tile>>
where
    S: ContactMatrix + ?Sized,
    C: AsRef<str>,
{
    let mut tiles = Vec::new();
    for chrom in chroms {
        let chrom = chrom.as_ref();
        let extent = store.extent(chrom)?;
        tiles.extend(
            SquareTiling::new(extent.start, extent.end, tile_size, pad, false)
                .filter(|spans| covers_band(spans, pad, band_to_cover))
                .map(|spans| Tile::new(chrom, spans)),
        );
    }
    Ok(tiles)
}
