//! Automatic thresholding: Otsu on a Z projection, calibrated per protocol.

use std::collections::HashMap;

use burn::tensor::backend::Backend;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::image::Image;

use super::projection::max_projection_z;

/// Per-acquisition-protocol divisors for the Otsu threshold.
///
/// Vessel contrast differs by sequence, so a raw Otsu level over-segments
/// some protocols. The table is supplied by the caller; library code never
/// hard-codes protocol names.
#[derive(Debug, Clone, Default)]
pub struct ProtocolCalibration {
    factors: HashMap<String, f64>,
}

impl ProtocolCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            factors: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn insert(&mut self, protocol: impl Into<String>, factor: f64) {
        self.factors.insert(protocol.into(), factor);
    }

    pub fn factor(&self, protocol: &str) -> Result<f64> {
        self.factors
            .get(protocol)
            .copied()
            .ok_or_else(|| CoreError::UnknownProtocol(protocol.to_string()))
    }
}

/// Otsu's threshold over a 256-bin histogram of `values`.
///
/// Returns the physical intensity separating the two classes.
pub fn otsu_threshold(values: &[f32], bins: usize) -> Result<f64> {
    if values.is_empty() {
        return Err(CoreError::DegenerateInput("empty value buffer".into()));
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        let v = v as f64;
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    if !(max - min).is_finite() || max <= min {
        return Err(CoreError::DegenerateInput(
            "constant or non-finite intensities".into(),
        ));
    }

    let scale = bins as f64 / (max - min);
    let mut histogram = vec![0u64; bins];
    for &v in values {
        let bin = (((v as f64 - min) * scale) as usize).min(bins - 1);
        histogram[bin] += 1;
    }

    let total = values.len() as f64;
    let total_mean: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum::<f64>()
        / total;

    let mut best_bin = 0;
    let mut best_variance = -1.0;
    let mut weight_bg = 0.0;
    let mut sum_bg = 0.0;

    for (i, &count) in histogram.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += i as f64 * count as f64;

        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (total_mean * total - sum_bg) / weight_fg;
        let between = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
        if between > best_variance {
            best_variance = between;
            best_bin = i;
        }
    }

    Ok(min + (best_bin as f64 + 0.5) / scale)
}

/// Pick a vessel threshold for `image` acquired with `protocol`.
///
/// Projects along Z (vessels are bright across few slices, so the
/// projection concentrates them), runs Otsu on the projection and divides
/// by the protocol's calibration factor.
pub fn auto_threshold<B: Backend>(
    image: &Image<B, 3>,
    protocol: &str,
    calibration: &ProtocolCalibration,
) -> Result<f64> {
    let factor = calibration.factor(protocol)?;
    let (projection, _) = max_projection_z(image);
    let otsu = otsu_threshold(&projection, 256)?;
    let threshold = otsu / factor;
    debug!(protocol, otsu, factor, threshold, "auto threshold");
    Ok(threshold)
}

/// Binary mask of voxels in `[lower, upper]`, inside value 1.0.
pub fn binarize<B: Backend>(image: &Image<B, 3>, lower: f64, upper: f64) -> Image<B, 3> {
    let values = image.to_vec();
    let mask: Vec<f32> = values
        .iter()
        .map(|&v| {
            if (v as f64) >= lower && (v as f64) <= upper {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    Image::from_raw(
        mask,
        image.shape(),
        *image.origin(),
        *image.spacing(),
        *image.direction(),
        &image.data().device(),
    )
}
