//! Stateful owner of a prepared dataset and its latest prediction batch.
//!
//! The loader runs the whole preparation chain (align → normalize → window →
//! split) and keeps the result until the next `prepare` call. Evaluation is
//! only possible after a prepare and a recorded prediction batch for the test
//! subset; asking earlier is a state error.

use crate::align::{AlignedSeries, SeriesAligner};
use crate::config::PipelineConfig;
use crate::data::load_source;
use crate::error::{PipelineError, Result};
use crate::evaluate::{AccuracyEvaluator, EvaluationResult};
use crate::normalize::{NormalizationScope, Normalizer};
use crate::predictor::{predict_checked, Predictor};
use crate::split::{Dataset, DatasetSplitter};
use crate::types::RawObservation;
use crate::window::{Sample, WindowBuilder, WindowStats};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug)]
struct Prepared {
    aligned: AlignedSeries,
    normalizer: Normalizer,
    window_stats: WindowStats,
    dataset: Dataset,
}

/// Prepares datasets and evaluates predictions against them.
#[derive(Debug)]
pub struct DatasetLoader {
    config: PipelineConfig,
    prepared: Option<Prepared>,
    predictions: Option<Vec<Vec<f64>>>,
}

impl DatasetLoader {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            prepared: None,
            predictions: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the configured data path and prepare it.
    pub fn prepare_from_path(&mut self, path: impl AsRef<Path>) -> Result<&Dataset> {
        let rows = load_source(path, &self.config.data_config())?;
        self.prepare(&rows)
    }

    /// Build a fresh dataset from raw observations, replacing any previous
    /// dataset and prediction batch.
    pub fn prepare(&mut self, rows: &[RawObservation]) -> Result<&Dataset> {
        self.prepared = None;
        self.predictions = None;

        let aligned = SeriesAligner::new(self.config.align_config()).align(rows)?;
        let builder = WindowBuilder::new(self.config.window_config());
        let splitter = DatasetSplitter::new(self.config.split.train_split_percent)?;

        let mut normalizer = Normalizer::fit(&aligned)?;
        let (mut samples, mut window_stats) = builder.build_with_stats(&aligned, &normalizer)?;

        if self.config.split.normalization == NormalizationScope::TrainOnly {
            // Anchor validity does not depend on scaling, so the rebuilt
            // samples keep the same anchors and split point.
            match splitter.train_count(samples.len()).checked_sub(1) {
                Some(last) => {
                    let end = samples[last].anchor_index + 1;
                    info!("Fitting normalization on dates 0..{} (train only)", end);
                    normalizer = Normalizer::fit_range(&aligned, 0..end)?;
                    (samples, window_stats) = builder.build_with_stats(&aligned, &normalizer)?;
                }
                None => warn!("Empty training set; normalizing over the full series"),
            }
        }

        let layout = builder.layout(&aligned);
        let dataset = splitter.split(
            aligned.symbols().to_vec(),
            layout,
            builder.config().sequence_length,
            samples,
        )?;

        let prepared = self.prepared.insert(Prepared {
            aligned,
            normalizer,
            window_stats,
            dataset,
        });
        Ok(&prepared.dataset)
    }

    fn prepared(&self) -> Result<&Prepared> {
        self.prepared.as_ref().ok_or_else(|| {
            PipelineError::StateError("Dataset requested before prepare".to_string())
        })
    }

    pub fn dataset(&self) -> Result<&Dataset> {
        self.prepared().map(|p| &p.dataset)
    }

    pub fn train(&self) -> Result<&[Sample]> {
        self.dataset().map(Dataset::train)
    }

    pub fn test(&self) -> Result<&[Sample]> {
        self.dataset().map(Dataset::test)
    }

    pub fn aligned(&self) -> Result<&AlignedSeries> {
        self.prepared().map(|p| &p.aligned)
    }

    pub fn normalizer(&self) -> Result<&Normalizer> {
        self.prepared().map(|p| &p.normalizer)
    }

    pub fn window_stats(&self) -> Result<WindowStats> {
        self.prepared().map(|p| p.window_stats)
    }

    /// Record a `[N_test, S·h]` probability matrix for the test subset.
    pub fn record_predictions(&mut self, predictions: Vec<Vec<f64>>) -> Result<()> {
        let dataset = self.dataset()?;
        let expected = dataset.test().len();
        if predictions.len() != expected {
            return Err(PipelineError::shape(
                "prediction rows for the test set",
                expected,
                predictions.len(),
            ));
        }
        dataset.layout().check_rows("predictions", &predictions)?;
        self.predictions = Some(predictions);
        Ok(())
    }

    /// Run a predictor over the test inputs and record its output.
    pub fn predict_test(&mut self, predictor: &dyn Predictor) -> Result<&[Vec<f64>]> {
        let dataset = self.dataset()?;
        let inputs = Dataset::inputs(dataset.test());
        let output = predict_checked(
            predictor,
            &inputs,
            dataset.sequence_length(),
            dataset.layout(),
        )?;
        Ok(self.predictions.insert(output))
    }

    /// The recorded prediction batch, if any.
    pub fn predictions(&self) -> Option<&[Vec<f64>]> {
        self.predictions.as_deref()
    }

    /// Evaluate the recorded predictions against the test labels.
    pub fn evaluate(&self) -> Result<EvaluationResult> {
        let dataset = self.dataset()?;
        let predictions = self.predictions.as_ref().ok_or_else(|| {
            PipelineError::StateError(
                "Evaluation requested before predictions were recorded".to_string(),
            )
        })?;

        let test = dataset.test();
        let truths = Dataset::labels(test);
        let mut result = AccuracyEvaluator::new(dataset.layout()).evaluate(predictions, &truths)?;
        result.anchor_dates = test.iter().map(|s| s.anchor_date.clone()).collect();
        info!(
            "Evaluated {} test samples: overall accuracy {:.2}%",
            test.len(),
            result.overall_accuracy * 100.0
        );
        Ok(result)
    }

    /// Drop the prepared dataset and predictions.
    pub fn reset(&mut self) {
        self.prepared = None;
        self.predictions = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::predictor::BaseRatePredictor;

    fn rows() -> Vec<RawObservation> {
        let a = [10.0, 11.0, 9.0, 12.0, 13.0, 14.0];
        let b = [5.0, 5.0, 6.0, 6.0, 7.0, 8.0];
        let mut rows = Vec::new();
        for (i, (ca, cb)) in a.iter().zip(b).enumerate() {
            let date = format!("2024-01-{:02}", i + 1);
            rows.push(RawObservation::new("A", date.clone(), ca - 1.0, *ca));
            rows.push(RawObservation::new("B", date, cb + 1.0, cb));
        }
        rows
    }

    fn config(p: f64, scope: NormalizationScope) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.window.sequence_length = 2;
        config.window.forecast_horizon = 1;
        config.split.train_split_percent = p;
        config.split.normalization = scope;
        config
    }

    #[test]
    fn test_state_errors() {
        let mut loader = DatasetLoader::new(config(75.0, NormalizationScope::FullSeries)).unwrap();
        assert_eq!(loader.dataset().unwrap_err().kind(), ErrorKind::State);
        assert_eq!(loader.evaluate().unwrap_err().kind(), ErrorKind::State);
        assert_eq!(
            loader.record_predictions(vec![]).unwrap_err().kind(),
            ErrorKind::State
        );

        loader.prepare(&rows()).unwrap();
        assert_eq!(loader.evaluate().unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_prepare_and_evaluate() {
        let mut loader = DatasetLoader::new(config(75.0, NormalizationScope::FullSeries)).unwrap();
        let dataset = loader.prepare(&rows()).unwrap();
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.train().len(), 3);

        assert_eq!(
            loader.record_predictions(vec![vec![0.5, 0.5]; 2]).unwrap_err().kind(),
            ErrorKind::Shape
        );
        loader.record_predictions(vec![vec![0.8, 0.2]]).unwrap();
        let result = loader.evaluate().unwrap();
        // anchor 4: A 13 -> 14 rises, B 7 -> 8 rises
        assert_eq!(result.per_stock_accuracy, vec![1.0, 0.0]);
        assert_eq!(result.anchor_dates[0].to_string(), "2024-01-05");
    }

    #[test]
    fn test_prepare_clears_predictions() {
        let mut loader = DatasetLoader::new(config(75.0, NormalizationScope::FullSeries)).unwrap();
        loader.prepare(&rows()).unwrap();
        loader.record_predictions(vec![vec![0.8, 0.2]]).unwrap();
        loader.prepare(&rows()).unwrap();
        assert!(loader.predictions().is_none());
        assert_eq!(loader.evaluate().unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn test_predict_test_with_base_rate() {
        let mut loader = DatasetLoader::new(config(75.0, NormalizationScope::FullSeries)).unwrap();
        let dataset = loader.prepare(&rows()).unwrap();
        let labels = Dataset::labels(dataset.train());
        let predictor = BaseRatePredictor::fit(&labels, dataset.layout()).unwrap();
        let output = loader.predict_test(&predictor).unwrap();
        assert_eq!(output.len(), 1);
        assert!(loader.evaluate().is_ok());
    }

    #[test]
    fn test_train_only_normalization() {
        let mut loader = DatasetLoader::new(config(75.0, NormalizationScope::TrainOnly)).unwrap();
        loader.prepare(&rows()).unwrap();
        // Last train anchor is date index 3, so stats cover dates 0..4
        let stats = loader.normalizer().unwrap().stats(0).unwrap();
        assert_eq!(stats.close_max, 12.0);
        let dataset = loader.dataset().unwrap();
        assert_eq!(dataset.len(), 4);
        // The test window reaches close 13, above the train-only max
        let last_step = dataset.test()[0].window.last().unwrap();
        assert!(last_step[1] > 1.0);
    }

    #[test]
    fn test_prepare_propagates_data_errors() {
        let mut loader = DatasetLoader::new(config(75.0, NormalizationScope::FullSeries)).unwrap();
        assert_eq!(loader.prepare(&[]).unwrap_err().kind(), ErrorKind::Data);
        assert!(loader.dataset().is_err());
    }
}
