//! Accuracy evaluation of multi-asset, multi-horizon probability outputs.
//!
//! Predictions and ground truth are `[N, S·h]` matrices in the
//! [`LabelLayout`] order. A probability counts as a predicted rise when it is
//! strictly greater than [`DECISION_THRESHOLD`]; the same strict rule decides a
//! timeline entry from the fraction of horizons predicted correctly, so with
//! `h = 2` a single correct horizon marks the sample incorrect.

use crate::error::{PipelineError, Result};
use crate::layout::LabelLayout;
use crate::types::DateKey;
use serde::Serialize;
use tracing::{debug, warn};

/// Probability above which a rise is predicted.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Binary decision for a probability; exactly 0.5 is a fall.
#[inline]
pub fn threshold(p: f64) -> u8 {
    u8::from(p > DECISION_THRESHOLD)
}

/// Aggregated accuracy of one evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    /// Fraction of correct (sample, horizon) predictions per asset.
    pub per_stock_accuracy: Vec<f64>,
    /// Fraction of correct predictions over all samples, assets and horizons.
    pub overall_accuracy: f64,
    /// `[S][h]` fraction of correct predictions per asset and horizon.
    pub per_horizon_accuracy: Vec<Vec<f64>>,
    /// `[S][N]` majority-of-horizons correctness, in sample order.
    pub per_stock_timeline: Vec<Vec<u8>>,
    /// `[N][S][h]` probabilities as received.
    pub raw_predictions: Vec<Vec<Vec<f64>>>,
    /// `[N][S][h]` ground truth.
    pub raw_truths: Vec<Vec<Vec<f64>>>,
    /// Anchor dates of the evaluated samples, when known.
    pub anchor_dates: Vec<DateKey>,
    pub num_assets: usize,
    pub num_horizons: usize,
}

impl EvaluationResult {
    pub fn num_samples(&self) -> usize {
        self.raw_predictions.len()
    }

    /// Fraction of samples marked correct in an asset's timeline.
    ///
    /// None when `asset` is out of range; 0.0 for an empty timeline.
    pub fn timeline_hit_rate(&self, asset: usize) -> Option<f64> {
        let timeline = self.per_stock_timeline.get(asset)?;
        Some(if timeline.is_empty() {
            0.0
        } else {
            timeline.iter().map(|&b| b as f64).sum::<f64>() / timeline.len() as f64
        })
    }
}

/// Evaluates probability matrices against ground truth.
#[derive(Debug, Clone, Copy)]
pub struct AccuracyEvaluator {
    layout: LabelLayout,
}

impl AccuracyEvaluator {
    pub fn new(layout: LabelLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> LabelLayout {
        self.layout
    }

    /// Evaluate `predictions` against `truths`, both `[N, S·h]`.
    ///
    /// With no samples the accuracies are 0.0 and the timelines empty.
    pub fn evaluate(
        &self,
        predictions: &[Vec<f64>],
        truths: &[Vec<f64>],
    ) -> Result<EvaluationResult> {
        if predictions.len() != truths.len() {
            return Err(PipelineError::shape(
                "prediction rows",
                format!("{} (ground truth rows)", truths.len()),
                predictions.len(),
            ));
        }
        self.layout.check_rows("predictions", predictions)?;
        self.layout.check_rows("ground truth", truths)?;

        let num_samples = predictions.len();
        let num_assets = self.layout.num_assets();
        let num_horizons = self.layout.num_horizons();

        let out_of_range = predictions
            .iter()
            .flatten()
            .filter(|p| !(0.0..=1.0).contains(*p))
            .count();
        if out_of_range > 0 {
            warn!("{} predicted probabilities outside [0, 1]", out_of_range);
        }
        let non_binary = truths
            .iter()
            .flatten()
            .filter(|t| **t != 0.0 && **t != 1.0)
            .count();
        if non_binary > 0 {
            warn!("{} ground-truth values are not 0 or 1; thresholding them", non_binary);
        }

        // correct[n][s][t]
        let mut correct_per_asset = vec![0usize; num_assets];
        let mut correct_per_horizon = vec![vec![0usize; num_horizons]; num_assets];
        let mut timelines = vec![Vec::with_capacity(num_samples); num_assets];

        for (pred_row, truth_row) in predictions.iter().zip(truths) {
            for asset in 0..num_assets {
                let mut correct_here = 0usize;
                for horizon in 0..num_horizons {
                    let idx = self.layout.label_index(asset, horizon);
                    if threshold(pred_row[idx]) == threshold(truth_row[idx]) {
                        correct_here += 1;
                        correct_per_horizon[asset][horizon] += 1;
                    }
                }
                correct_per_asset[asset] += correct_here;
                let fraction = correct_here as f64 / num_horizons as f64;
                timelines[asset].push(u8::from(fraction > DECISION_THRESHOLD));
            }
        }

        let mean = |count: usize, total: usize| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            }
        };

        let per_stock_accuracy: Vec<f64> = correct_per_asset
            .iter()
            .map(|&c| mean(c, num_samples * num_horizons))
            .collect();
        let overall_accuracy = mean(
            correct_per_asset.iter().sum(),
            num_samples * num_assets * num_horizons,
        );
        let per_horizon_accuracy = correct_per_horizon
            .iter()
            .map(|row| row.iter().map(|&c| mean(c, num_samples)).collect())
            .collect();

        if num_samples == 0 {
            warn!("Evaluating an empty prediction batch");
        }
        debug!(
            "Evaluated {} samples: overall accuracy {:.4}",
            num_samples, overall_accuracy
        );

        Ok(EvaluationResult {
            per_stock_accuracy,
            overall_accuracy,
            per_horizon_accuracy,
            per_stock_timeline: timelines,
            raw_predictions: predictions.iter().map(|r| self.layout.unflatten(r)).collect(),
            raw_truths: truths.iter().map(|r| self.layout.unflatten(r)).collect(),
            anchor_dates: Vec::new(),
            num_assets,
            num_horizons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(threshold(0.5), 0);
        assert_eq!(threshold(0.500001), 1);
        assert_eq!(threshold(0.0), 0);
        assert_eq!(threshold(f64::NAN), 0);
    }

    #[test]
    fn test_hand_computed_two_assets_two_horizons() {
        let evaluator = AccuracyEvaluator::new(LabelLayout::new(2, 2));
        // [A+1, A+2, B+1, B+2]
        let predictions = vec![
            vec![0.9, 0.2, 0.5, 0.7],
            vec![0.1, 0.6, 0.8, 0.3],
            vec![0.7, 0.7, 0.2, 0.1],
        ];
        let truths = vec![
            vec![1.0, 0.0, 1.0, 1.0], // A: 2/2, B: 1/2
            vec![1.0, 1.0, 1.0, 0.0], // A: 1/2, B: 2/2
            vec![1.0, 1.0, 0.0, 0.0], // A: 2/2, B: 2/2
        ];
        let result = evaluator.evaluate(&predictions, &truths).unwrap();

        assert!((result.per_stock_accuracy[0] - 5.0 / 6.0).abs() < 1e-12);
        assert!((result.per_stock_accuracy[1] - 5.0 / 6.0).abs() < 1e-12);
        assert!((result.overall_accuracy - 10.0 / 12.0).abs() < 1e-12);
        // Half the horizons correct is not a majority
        assert_eq!(result.per_stock_timeline[0], vec![1, 0, 1]);
        assert_eq!(result.per_stock_timeline[1], vec![0, 1, 1]);
        assert_eq!(result.per_horizon_accuracy[0], vec![2.0 / 3.0, 1.0]);
        assert_eq!(result.per_horizon_accuracy[1], vec![2.0 / 3.0, 1.0]);
        assert_eq!(result.raw_predictions[1], vec![vec![0.1, 0.6], vec![0.8, 0.3]]);
        assert_eq!(result.raw_truths[0][1], vec![1.0, 1.0]);
    }

    #[test]
    fn test_axis_order_distinguishes_assets() {
        // Asset 0 always right, asset 1 always wrong
        let evaluator = AccuracyEvaluator::new(LabelLayout::new(2, 3));
        let predictions = vec![vec![0.9, 0.9, 0.9, 0.9, 0.9, 0.9]];
        let truths = vec![vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]];
        let result = evaluator.evaluate(&predictions, &truths).unwrap();
        assert_eq!(result.per_stock_accuracy, vec![1.0, 0.0]);
        assert_eq!(result.per_stock_timeline, vec![vec![1], vec![0]]);
        assert_eq!(result.overall_accuracy, 0.5);
    }

    #[test]
    fn test_shape_mismatch() {
        let evaluator = AccuracyEvaluator::new(LabelLayout::new(2, 2));
        let err = evaluator
            .evaluate(&[vec![0.5; 4]], &[vec![0.0; 4], vec![0.0; 4]])
            .unwrap_err();
        assert!(matches!(err, PipelineError::ShapeError { .. }));

        let err = evaluator.evaluate(&[vec![0.5; 3]], &[vec![0.0; 4]]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeError { .. }));

        let err = evaluator.evaluate(&[vec![0.5; 4]], &[vec![0.0; 5]]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeError { .. }));
    }

    #[test]
    fn test_empty_batch() {
        let evaluator = AccuracyEvaluator::new(LabelLayout::new(2, 1));
        let result = evaluator.evaluate(&[], &[]).unwrap();
        assert_eq!(result.per_stock_accuracy, vec![0.0, 0.0]);
        assert_eq!(result.overall_accuracy, 0.0);
        assert_eq!(result.per_stock_timeline, vec![Vec::<u8>::new(), Vec::new()]);
        assert_eq!(result.num_samples(), 0);
    }

    #[test]
    fn test_overall_is_mean_of_per_stock() {
        let evaluator = AccuracyEvaluator::new(LabelLayout::new(3, 2));
        let predictions = vec![
            vec![0.9, 0.1, 0.6, 0.4, 0.2, 0.8],
            vec![0.3, 0.7, 0.5, 0.51, 0.99, 0.0],
        ];
        let truths = vec![
            vec![1.0, 1.0, 0.0, 0.0, 1.0, 1.0],
            vec![0.0, 1.0, 0.0, 1.0, 1.0, 1.0],
        ];
        let result = evaluator.evaluate(&predictions, &truths).unwrap();
        let mean = result.per_stock_accuracy.iter().sum::<f64>() / 3.0;
        assert!((result.overall_accuracy - mean).abs() < 1e-12);
        assert_eq!(result.per_stock_timeline[0], vec![0, 1]);
        assert_eq!(result.timeline_hit_rate(0), Some(0.5));
        assert_eq!(result.timeline_hit_rate(3), None);
    }
}
