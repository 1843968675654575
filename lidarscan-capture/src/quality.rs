//! Scan quality estimation
//!
//! Quality blends three coverage signals into `[0, 1]`: point progress
//! towards the cloud's soft target, mesh-anchor coverage and mean sensor
//! confidence. [`QualityTracker`] only ever raises the reported value.

use serde::{Deserialize, Serialize};

/// Weights of the quality blend; they are normalised before use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub points: f32,
    pub anchors: f32,
    pub confidence: f32,
    /// Anchor count at which anchor coverage saturates
    pub target_anchors: usize,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            points: 0.6,
            anchors: 0.25,
            confidence: 0.15,
            target_anchors: 20,
        }
    }
}

/// Inputs to one quality estimate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoverageSample {
    /// Point progress, already in `[0, 1]`
    pub progress: f32,
    pub anchor_count: usize,
    pub mean_confidence: f32,
}

/// Instantaneous quality of a coverage sample
pub fn estimate_quality(sample: &CoverageSample, weights: &QualityWeights) -> f32 {
    let total = weights.points + weights.anchors + weights.confidence;
    if !(total > 0.0) {
        return sample.progress.clamp(0.0, 1.0);
    }

    let anchors = if weights.target_anchors == 0 {
        0.0
    } else {
        (sample.anchor_count as f32 / weights.target_anchors as f32).min(1.0)
    };

    let blended = weights.points * sample.progress.clamp(0.0, 1.0)
        + weights.anchors * anchors
        + weights.confidence * sample.mean_confidence.clamp(0.0, 1.0);

    (blended / total).clamp(0.0, 1.0)
}

/// Monotone quality accumulator for one scan session
#[derive(Debug, Clone, Default)]
pub struct QualityTracker {
    weights: QualityWeights,
    current: f32,
}

impl QualityTracker {
    pub fn new(weights: QualityWeights) -> Self {
        Self { weights, current: 0.0 }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Fold in a new sample; the result never decreases until [`reset`](Self::reset)
    pub fn update(&mut self, sample: &CoverageSample) -> f32 {
        let estimate = estimate_quality(sample, &self.weights);
        if estimate > self.current {
            self.current = estimate;
        }
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_full_coverage_is_one() {
        let sample = CoverageSample { progress: 1.0, anchor_count: 50, mean_confidence: 1.0 };
        assert_relative_eq!(estimate_quality(&sample, &QualityWeights::default()), 1.0);
    }

    #[test]
    fn test_points_only() {
        let sample = CoverageSample { progress: 0.5, anchor_count: 0, mean_confidence: 0.0 };
        assert_relative_eq!(estimate_quality(&sample, &QualityWeights::default()), 0.3);
    }

    #[test]
    fn test_tracker_is_monotone() {
        let mut tracker = QualityTracker::default();
        let high = CoverageSample { progress: 0.8, anchor_count: 10, mean_confidence: 1.0 };
        let low = CoverageSample { progress: 0.1, anchor_count: 0, mean_confidence: 0.2 };

        let first = tracker.update(&high);
        assert_eq!(tracker.update(&low), first);

        tracker.reset();
        assert_eq!(tracker.current(), 0.0);
    }

    #[test]
    fn test_zero_weights_fall_back_to_progress() {
        let weights = QualityWeights { points: 0.0, anchors: 0.0, confidence: 0.0, target_anchors: 0 };
        let sample = CoverageSample { progress: 0.4, ..Default::default() };
        assert_relative_eq!(estimate_quality(&sample, &weights), 0.4);
    }
}
