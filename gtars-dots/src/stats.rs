use statrs::distribution::{DiscreteCDF, Poisson};

use crate::scoring::ScoredPixel;

///
/// Upper tail `P(X > obs)` of a Poisson distribution of rate `lambda`.
/// A non-positive rate puts all the mass at zero, so the tail is empty.
///
pub fn poisson_sf(obs: f64, lambda: f64) -> f64 {
    if lambda.is_nan() || lambda <= 0.0 || obs.is_nan() {
        return 0.0;
    }
    if obs < 0.0 {
        return 1.0;
    }
    match Poisson::new(lambda) {
        Ok(poisson) => poisson.sf(obs.floor() as u64),
        Err(_) => 0.0,
    }
}

///
/// Benjamini-Hochberg q-values `p * N / rank`, returned in input order.
///
/// The raw per-rank values are reported as is: no running minimum is applied,
/// so they are not monotone in `p`.
///
pub fn get_qvals(pvals: &[f64]) -> Vec<f64> {
    let n = pvals.len() as f64;
    let mut order: Vec<usize> = (0..pvals.len()).collect();
    order.sort_by(|&a, &b| pvals[a].total_cmp(&pvals[b]));

    let mut qvals = vec![0.0; pvals.len()];
    for (rank, &idx) in order.iter().enumerate() {
        qvals[idx] = pvals[idx] * n / (rank + 1) as f64;
    }
    qvals
}

/// Attach a Poisson p-value to every kernel score of every pixel.
pub fn annotate_pvalues(pixels: &mut [ScoredPixel]) {
    for px in pixels.iter_mut() {
        let obs = px.obs_raw;
        for score in px.kernels.iter_mut() {
            score.pval = Some(poisson_sf(obs, score.value));
        }
    }
}

///
/// Genome-wide BH q-values, computed independently per kernel over all the
/// pixels given. P-values must already be attached.
///
pub fn annotate_qvalues(pixels: &mut [ScoredPixel], n_kernels: usize) {
    for k in 0..n_kernels {
        let pvals: Vec<f64> = pixels
            .iter()
            .map(|px| px.kernels[k].pval.unwrap_or(1.0))
            .collect();
        for (px, q) in pixels.iter_mut().zip(get_qvals(&pvals)) {
            px.kernels[k].qval = Some(q);
        }
    }
}

/// Is the pixel significant for every kernel at level `fdr`?
pub fn comply_fdr(pixel: &ScoredPixel, fdr: f64) -> bool {
    pixel
        .kernels
        .iter()
        .all(|k| k.qval.is_some_and(|q| q <= fdr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::KernelScore;

    use pretty_assertions::assert_eq;
    use rstest::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[rstest]
    fn test_qvals_raw_formula() {
        let q = get_qvals(&[0.01, 0.02, 0.03, 0.5]);
        assert!(close(&q, &[0.04, 0.04, 0.04, 0.5]));
    }

    #[rstest]
    fn test_qvals_keep_input_order() {
        let q = get_qvals(&[0.5, 0.01, 0.03, 0.02]);
        assert!(close(&q, &[0.5, 0.04, 0.04, 0.04]));
    }

    #[rstest]
    fn test_qvals_are_not_made_monotone() {
        // 0.05 * 3 / 2 exceeds 0.06 * 3 / 3
        let q = get_qvals(&[0.01, 0.05, 0.06]);
        assert!(q[1] > q[2]);
    }

    #[rstest]
    #[case(0.0, 1.0, 1.0 - (-1.0f64).exp())]
    #[case(2.0, 0.0, 0.0)]
    #[case(2.0, -1.0, 0.0)]
    fn test_poisson_sf(#[case] obs: f64, #[case] lambda: f64, #[case] expected: f64) {
        assert!((poisson_sf(obs, lambda) - expected).abs() < 1e-12);
    }

    #[rstest]
    fn test_poisson_sf_decreases_with_obs() {
        assert!(poisson_sf(20.0, 10.0) < poisson_sf(10.0, 10.0));
        assert!(poisson_sf(60.0, 10.0) > 0.0);
    }

    #[rstest]
    fn test_annotate_and_comply() {
        let pixel = |obs: f64| ScoredPixel {
            bin1_id: 0,
            bin2_id: obs as u64,
            obs_raw: obs,
            exp_raw: 5.0,
            kernels: vec![KernelScore::new(5.0, 0), KernelScore::new(5.0, 0)],
            lowleft_kerobs: None,
        };
        let mut pixels = vec![pixel(30.0), pixel(5.0), pixel(4.0)];
        annotate_pvalues(&mut pixels);
        annotate_qvalues(&mut pixels, 2);

        assert!(comply_fdr(&pixels[0], 0.1));
        assert!(!comply_fdr(&pixels[1], 0.1));
        assert_eq!(pixels[0].kernels[0].qval, pixels[0].kernels[1].qval);
        assert!(!comply_fdr(&pixels[0], 0.0));
    }
}
