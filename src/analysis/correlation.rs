//! CrossCorrelationMatcher - lag-scanned time-domain template matching
//!
//! Algorithm:
//! 1. `L = min(len(template), len(live), max_len)`
//! 2. For each lag `k` in `[0, L/2)`: `sum_k = Σ_{i=0}^{L-k-1} template[i] * live[i+k]`
//! 3. Normalize the lag sums (see [`CorrelationNormalization`])
//! 4. Score = `max_k |normalized_sum_k|`
//!
//! Percussive transients rarely align sample-exactly, so scanning lags and
//! keeping the best-aligned magnitude gives position tolerance. No spectral
//! analysis is performed.

use crate::analysis::level::sanitize;
use crate::config::{CorrelationNormalization, DetectionConfig};

/// Compares live frames against stored templates
#[derive(Debug, Clone)]
pub struct CrossCorrelationMatcher {
    max_len: usize,
    normalization: CorrelationNormalization,
}

impl Default for CrossCorrelationMatcher {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

impl CrossCorrelationMatcher {
    /// Create a matcher
    ///
    /// # Arguments
    /// * `max_len` - Hard cap on the correlated span (bounds per-tick cost)
    /// * `normalization` - How lag sums are scaled into [0, 1]
    pub fn new(max_len: usize, normalization: CorrelationNormalization) -> Self {
        Self {
            max_len,
            normalization,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.max_correlation_len, config.normalization)
    }

    /// Normalized correlation for every scanned lag
    ///
    /// Returns `L/2` values. All zeros when there is no correlation energy.
    pub fn correlate(&self, template: &[f32], live: &[f32]) -> Vec<f32> {
        let len = template.len().min(live.len()).min(self.max_len);
        let lags = len / 2;
        if lags == 0 {
            return Vec::new();
        }

        let template = &template[..len];
        let live = &live[..len];

        let sums: Vec<f64> = (0..lags)
            .map(|lag| {
                template[..len - lag]
                    .iter()
                    .zip(&live[lag..])
                    .map(|(&a, &b)| sanitize(a) as f64 * sanitize(b) as f64)
                    .sum()
            })
            .collect();

        match self.normalization {
            CorrelationNormalization::PeakLag => normalize_by_peak(&sums),
            CorrelationNormalization::Energy => normalize_by_energy(&sums, template, live),
        }
    }

    /// Similarity score in [0, 1]
    ///
    /// Empty inputs score 0 (no match), never an error.
    pub fn score(&self, template: &[f32], live: &[f32]) -> f32 {
        self.correlate(template, live)
            .iter()
            .fold(0.0f32, |best, value| best.max(value.abs()))
            .clamp(0.0, 1.0)
    }
}

fn normalize_by_peak(sums: &[f64]) -> Vec<f32> {
    let max_abs = sums.iter().fold(0.0f64, |best, sum| best.max(sum.abs()));
    if max_abs > 0.0 {
        sums.iter().map(|sum| (sum / max_abs) as f32).collect()
    } else {
        vec![0.0; sums.len()]
    }
}

fn normalize_by_energy(sums: &[f64], template: &[f32], live: &[f32]) -> Vec<f32> {
    let len = template.len();
    let template_energy = prefix_energy(template);
    let live_energy = prefix_energy(live);

    sums.iter()
        .enumerate()
        .map(|(lag, sum)| {
            // template[0..len-lag] against live[lag..len]
            let t = template_energy[len - lag];
            let l = live_energy[len] - live_energy[lag];
            let denom = (t * l).sqrt();
            if denom > 0.0 {
                (sum / denom).clamp(-1.0, 1.0) as f32
            } else {
                0.0
            }
        })
        .collect()
}

/// `out[n] = Σ_{i<n} x[i]^2`
fn prefix_energy(samples: &[f32]) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len() + 1);
    let mut acc = 0.0f64;
    out.push(acc);
    for &sample in samples {
        let s = sanitize(sample) as f64;
        acc += s * s;
        out.push(acc);
    }
    out
}
