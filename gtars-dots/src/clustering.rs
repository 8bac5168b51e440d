use std::collections::BTreeMap;

use log::{debug, info};

use gtars_hic::{Bin, BinTable, HicError};

use crate::errors::Result;
use crate::scoring::ScoredPixel;

///
/// Cluster membership of one point.
///
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    pub label: usize,
    pub centroid: (f64, f64),
    pub size: usize,
}

fn nearest(centers: &[(f64, f64)], point: (f64, f64)) -> Option<(usize, f64)> {
    centers
        .iter()
        .enumerate()
        .map(|(idx, c)| (idx, ((c.0 - point.0).powi(2) + (c.1 - point.1).powi(2)).sqrt()))
        .fold(None, |best, (idx, dist)| match best {
            Some((_, d)) if d <= dist => best,
            _ => Some((idx, dist)),
        })
}

///
/// Radius-bounded incremental clustering of 2D points.
///
/// Points are visited in order; each joins the nearest cluster when its
/// running centroid lies within `radius`, and opens a new cluster otherwise.
/// Every point is then relabelled to the nearest final centroid, so a
/// cluster may lose all its points: labels need not be contiguous.
///
pub fn clust_2d_pixels(points: &[(f64, f64)], radius: f64) -> Vec<ClusterAssignment> {
    let mut centers: Vec<(f64, f64)> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();

    for &point in points {
        match nearest(&centers, point) {
            Some((idx, dist)) if dist <= radius => {
                counts[idx] += 1;
                let n = counts[idx] as f64;
                let c = &mut centers[idx];
                c.0 += (point.0 - c.0) / n;
                c.1 += (point.1 - c.1) / n;
            }
            _ => {
                centers.push(point);
                counts.push(1);
            }
        }
    }

    let labels: Vec<usize> = points
        .iter()
        .filter_map(|&p| nearest(&centers, p).map(|(idx, _)| idx))
        .collect();

    let mut sizes = vec![0usize; centers.len()];
    for &label in &labels {
        sizes[label] += 1;
    }

    debug!(
        "Clustering is completed: {} clusters for {} points",
        sizes.iter().filter(|s| **s > 0).count(),
        points.len()
    );

    labels
        .into_iter()
        .map(|label| ClusterAssignment {
            label,
            centroid: centers[label],
            size: sizes[label],
        })
        .collect()
}

///
/// The peak pixel of a cluster, with the cluster it stands for.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Centroid {
    pub pixel: ScoredPixel,
    pub bin1: Bin,
    pub bin2: Bin,
    /// Centroid position, in bp.
    pub cstart1: f64,
    pub cstart2: f64,
    pub c_label: usize,
    pub c_size: usize,
}

/// Genomic position of a fractional bin coordinate, on a uniform grid of `binsize`.
fn bin_to_bp(bins: &BinTable, chrom: &str, coord: f64, binsize: u64) -> Result<f64> {
    let offset = bins.offset(chrom)?;
    let chrom_start = bins
        .annotate(offset)
        .map(|b| b.start)
        .ok_or_else(|| HicError::UnknownChromosome(chrom.to_string()))?;
    Ok(chrom_start as f64 + (coord - offset as f64) * binsize as f64)
}

///
/// Cluster significant pixels per chromosome pair and keep, for every
/// cluster, the member with the largest observed count.
///
/// `radius` is in bins. Output is ordered by chromosome pair, then label.
///
pub fn clustering_step(
    pixels: &[ScoredPixel],
    bins: &BinTable,
    radius: f64,
) -> Result<Vec<Centroid>> {
    // an empty bin table annotates nothing
    let Some(binsize) = bins.binsize() else {
        return Ok(Vec::new());
    };

    let mut groups: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
    for (idx, px) in pixels.iter().enumerate() {
        if let (Some(b1), Some(b2)) = (bins.annotate(px.bin1_id), bins.annotate(px.bin2_id)) {
            groups
                .entry((b1.chrom.clone(), b2.chrom.clone()))
                .or_default()
                .push(idx);
        }
    }

    let mut centroids = Vec::new();
    for ((chrom1, chrom2), members) in groups {
        let points: Vec<(f64, f64)> = members
            .iter()
            .map(|&i| (pixels[i].bin1_id as f64, pixels[i].bin2_id as f64))
            .collect();
        let assignments = clust_2d_pixels(&points, radius);

        // label -> (member index, assignment)
        let mut peaks: BTreeMap<usize, (usize, &ClusterAssignment)> = BTreeMap::new();
        for (&i, assignment) in members.iter().zip(assignments.iter()) {
            peaks
                .entry(assignment.label)
                .and_modify(|best| {
                    if pixels[i].obs_raw > pixels[best.0].obs_raw {
                        *best = (i, assignment);
                    }
                })
                .or_insert((i, assignment));
        }

        for (label, (i, assignment)) in peaks {
            let px = &pixels[i];
            let (Some(bin1), Some(bin2)) = (bins.annotate(px.bin1_id), bins.annotate(px.bin2_id))
            else {
                continue;
            };
            centroids.push(Centroid {
                pixel: px.clone(),
                bin1: bin1.clone(),
                bin2: bin2.clone(),
                cstart1: bin_to_bp(bins, &chrom1, assignment.centroid.0, binsize)?,
                cstart2: bin_to_bp(bins, &chrom2, assignment.centroid.1, binsize)?,
                c_label: label,
                c_size: assignment.size,
            });
        }
    }

    info!(
        "Clustered {} significant pixels into {} clusters",
        pixels.len(),
        centroids.len()
    );

    Ok(centroids)
}
