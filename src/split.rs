//! Chronological train/test splitting.
//!
//! Samples are never shuffled: the first `round(p/100 × n)` samples train, the
//! rest test, so every training anchor precedes or equals every test anchor.

use crate::error::{PipelineError, Result};
use crate::layout::LabelLayout;
use crate::window::Sample;
use serde::Serialize;
use tracing::{info, warn};

/// Ordered samples with a single chronological split point.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    symbols: Vec<String>,
    layout: LabelLayout,
    sequence_length: usize,
    samples: Vec<Sample>,
    split_index: usize,
}

impl Dataset {
    /// Assemble a dataset, checking anchor order and sample shapes.
    pub fn new(
        symbols: Vec<String>,
        layout: LabelLayout,
        sequence_length: usize,
        samples: Vec<Sample>,
        split_index: usize,
    ) -> Result<Self> {
        if symbols.len() != layout.num_assets() {
            return Err(PipelineError::shape(
                "dataset symbols",
                layout.num_assets(),
                symbols.len(),
            ));
        }
        if split_index > samples.len() {
            return Err(PipelineError::shape(
                "split index",
                format!("<= {}", samples.len()),
                split_index,
            ));
        }
        if let Some(pair) = samples
            .windows(2)
            .find(|w| w[1].anchor_date < w[0].anchor_date)
        {
            return Err(PipelineError::DataError(format!(
                "Samples out of chronological order: {} after {}",
                pair[1].anchor_date, pair[0].anchor_date
            )));
        }
        for (n, sample) in samples.iter().enumerate() {
            if sample.label.len() != layout.label_len() {
                return Err(PipelineError::shape(
                    format!("label of sample {}", n),
                    layout.label_len(),
                    sample.label.len(),
                ));
            }
            if sample.window.len() != sequence_length
                || sample.window.iter().any(|v| v.len() != layout.feature_len())
            {
                return Err(PipelineError::shape(
                    format!("window of sample {}", n),
                    format!("[{}, {}]", sequence_length, layout.feature_len()),
                    format!("[{}, ?]", sample.window.len()),
                ));
            }
        }

        Ok(Self {
            symbols,
            layout,
            sequence_length,
            samples,
            split_index,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn layout(&self) -> LabelLayout {
        self.layout
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of training samples; test samples start here.
    pub fn split_index(&self) -> usize {
        self.split_index
    }

    pub fn train(&self) -> &[Sample] {
        &self.samples[..self.split_index]
    }

    pub fn test(&self) -> &[Sample] {
        &self.samples[self.split_index..]
    }

    /// Input batch `[N, L, 2·S]` of a subset.
    pub fn inputs(samples: &[Sample]) -> Vec<Vec<Vec<f64>>> {
        samples.iter().map(|s| s.window.clone()).collect()
    }

    /// Label matrix `[N, S·h]` of a subset.
    pub fn labels(samples: &[Sample]) -> Vec<Vec<f64>> {
        samples.iter().map(|s| s.label.clone()).collect()
    }

    /// Date index of the last training anchor, if any.
    pub fn last_train_anchor(&self) -> Option<usize> {
        self.train().last().map(|s| s.anchor_index)
    }
}

/// Splits ordered samples by a train percentage.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSplitter {
    train_percent: f64,
}

impl DatasetSplitter {
    /// `train_percent` must lie in `[0, 100]`; the useful range is `(0, 100)`.
    pub fn new(train_percent: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&train_percent) {
            return Err(PipelineError::ConfigError(format!(
                "train_split_percent must be within 0..=100, got {}",
                train_percent
            )));
        }
        Ok(Self { train_percent })
    }

    pub fn train_percent(&self) -> f64 {
        self.train_percent
    }

    /// Number of training samples out of `total`.
    pub fn train_count(&self, total: usize) -> usize {
        let count = (self.train_percent / 100.0 * total as f64).round() as usize;
        count.min(total)
    }

    /// Split samples into a [`Dataset`].
    pub fn split(
        &self,
        symbols: Vec<String>,
        layout: LabelLayout,
        sequence_length: usize,
        samples: Vec<Sample>,
    ) -> Result<Dataset> {
        let split_index = self.train_count(samples.len());
        let test_count = samples.len() - split_index;
        if split_index == 0 || test_count == 0 {
            warn!(
                "Split at {}% leaves an empty subset ({} train, {} test)",
                self.train_percent, split_index, test_count
            );
        }
        info!("Split {} samples: {} train, {} test", samples.len(), split_index, test_count);
        Dataset::new(symbols, layout, sequence_length, samples, split_index)
    }
}
