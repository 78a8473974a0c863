//! Sliding-window sample construction.
//!
//! Each anchor date `i` yields at most one [`Sample`]: the `L` feature vectors
//! ending at `i` as input, and one rise/fall label per (asset, horizon offset)
//! looking `1..=h` dates ahead. An anchor is emitted only when every asset has
//! an observation on every date from `i - L + 1` to `i + h`; there are no
//! partial samples.

use crate::align::AlignedSeries;
use crate::error::{PipelineError, Result};
use crate::layout::LabelLayout;
use crate::normalize::Normalizer;
use crate::types::{DateKey, PriceField};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Window construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Number of time steps per input window (L).
    pub sequence_length: usize,
    /// Number of future offsets labelled per asset (h).
    pub forecast_horizon: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            sequence_length: 20,
            forecast_horizon: 5,
        }
    }
}

impl WindowConfig {
    pub fn new(sequence_length: usize, forecast_horizon: usize) -> Self {
        Self {
            sequence_length,
            forecast_horizon,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(PipelineError::ConfigError(
                "sequence_length must be greater than 0".to_string(),
            ));
        }
        if self.forecast_horizon == 0 {
            return Err(PipelineError::ConfigError(
                "forecast_horizon must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// One training/test example.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Index of the anchor on the global date axis.
    pub anchor_index: usize,
    /// Calendar date of the anchor.
    pub anchor_date: DateKey,
    /// `L` feature vectors of length `2 × assets`, oldest first.
    pub window: Vec<Vec<f64>>,
    /// `assets × horizons` binary labels, asset-major.
    pub label: Vec<f64>,
}

/// Counts of anchors considered and rejected during a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    pub candidates: usize,
    pub insufficient_history: usize,
    pub insufficient_future: usize,
    pub missing_data: usize,
    pub emitted: usize,
}

/// Builds samples from an aligned, normalized series.
#[derive(Debug, Clone, Copy)]
pub struct WindowBuilder {
    config: WindowConfig,
}

impl WindowBuilder {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Label layout for an aligned series with this builder's horizon.
    pub fn layout(&self, aligned: &AlignedSeries) -> LabelLayout {
        LabelLayout::new(aligned.num_assets(), self.config.forecast_horizon)
    }

    /// Build every valid sample in anchor order.
    ///
    /// Fails with a data error when no anchor survives.
    pub fn build(&self, aligned: &AlignedSeries, normalizer: &Normalizer) -> Result<Vec<Sample>> {
        self.build_with_stats(aligned, normalizer).map(|(samples, _)| samples)
    }

    /// Like [`WindowBuilder::build`], also returning rejection counts.
    pub fn build_with_stats(
        &self,
        aligned: &AlignedSeries,
        normalizer: &Normalizer,
    ) -> Result<(Vec<Sample>, WindowStats)> {
        self.config.validate()?;
        if normalizer.symbols() != aligned.symbols() {
            return Err(PipelineError::shape(
                "normalizer symbols",
                format!("{:?}", aligned.symbols()),
                format!("{:?}", normalizer.symbols()),
            ));
        }

        let seq_len = self.config.sequence_length;
        let horizon = self.config.forecast_horizon;
        let num_dates = aligned.num_dates();
        let num_assets = aligned.num_assets();
        let layout = self.layout(aligned);

        // incomplete_before[d] = number of dates in [0, d) missing any asset
        let mut incomplete_before = vec![0usize; num_dates + 1];
        for d in 0..num_dates {
            incomplete_before[d + 1] = incomplete_before[d] + usize::from(!aligned.is_complete(d));
        }

        // Normalized feature vector of every complete date
        let features: Vec<Option<Vec<f64>>> = (0..num_dates)
            .map(|d| {
                aligned.is_complete(d).then(|| {
                    let mut row = vec![0.0; layout.feature_len()];
                    for asset in 0..num_assets {
                        if let Some(p) = aligned.get(asset, d) {
                            for field in [PriceField::Open, PriceField::Close] {
                                row[layout.feature_index(asset, field)] =
                                    normalizer.normalize_asset(asset, field, p.get(field));
                            }
                        }
                    }
                    row
                })
            })
            .collect();

        let mut stats = WindowStats {
            candidates: num_dates,
            ..Default::default()
        };
        let mut samples = Vec::new();

        for anchor in 0..num_dates {
            if anchor + 1 < seq_len {
                stats.insufficient_history += 1;
                continue;
            }
            if anchor + horizon >= num_dates {
                stats.insufficient_future += 1;
                continue;
            }
            let seq_start = anchor + 1 - seq_len;
            let future_end = anchor + horizon;

            if incomplete_before[future_end + 1] - incomplete_before[seq_start] > 0 {
                stats.missing_data += 1;
                continue;
            }

            let window: Vec<Vec<f64>> = features[seq_start..=anchor]
                .iter()
                .flatten()
                .cloned()
                .collect();

            let mut label = vec![0.0; layout.label_len()];
            for asset in 0..num_assets {
                let Some(base) = aligned.get(asset, anchor) else {
                    continue;
                };
                for offset in 1..=horizon {
                    if let Some(future) = aligned.get(asset, anchor + offset) {
                        if future.close > base.close {
                            label[layout.label_index(asset, offset - 1)] = 1.0;
                        }
                    }
                }
            }

            samples.push(Sample {
                anchor_index: anchor,
                anchor_date: aligned.dates()[anchor].clone(),
                window,
                label,
            });
        }
        stats.emitted = samples.len();

        debug!("Window stats: {:?}", stats);
        if samples.is_empty() {
            return Err(PipelineError::DataError(format!(
                "No valid windows: {} dates, sequence_length={}, forecast_horizon={} \
                 ({} short of history, {} short of future, {} touching missing data)",
                num_dates,
                seq_len,
                horizon,
                stats.insufficient_history,
                stats.insufficient_future,
                stats.missing_data
            )));
        }

        info!(
            "Built {} samples of {}x{} with {} labels each",
            samples.len(),
            seq_len,
            layout.feature_len(),
            layout.label_len()
        );
        Ok((samples, stats))
    }
}
