//! Per-symbol min–max normalization of open and close prices.
//!
//! ```text
//! normalized = (value - min) / (max - min)
//! ```
//!
//! Statistics are computed independently for open and close, per symbol, over
//! the present slots of an [`AlignedSeries`]. When a symbol's values are all
//! equal, `max` is bumped just above `min` so the scale never divides by zero.
//! The bump is `RANGE_EPSILON` or a few ulps of `min`, whichever is larger.

use crate::align::AlignedSeries;
use crate::error::{PipelineError, Result};
use crate::types::PriceField;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Smallest amount added to `max` when a field has zero range.
pub const RANGE_EPSILON: f64 = 1e-9;

/// Which dates contribute to the normalization statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationScope {
    /// Every date on the axis, including those that end up in the test set.
    #[default]
    FullSeries,
    /// Only dates up to and including the last training anchor.
    TrainOnly,
}

/// Min and max of open and close for one symbol. `max > min` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub open_min: f64,
    pub open_max: f64,
    pub close_min: f64,
    pub close_max: f64,
}

fn bump(min: f64, max: f64) -> f64 {
    if max > min {
        max
    } else {
        // 1e-9 vanishes in rounding once |min| passes ~1.7e7
        min + RANGE_EPSILON.max(min.abs() * f64::EPSILON * 4.0)
    }
}

impl NormalizationStats {
    /// Stats over (open, close) pairs. Returns None for an empty input.
    pub fn from_values(values: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut acc: Option<(f64, f64, f64, f64)> = None;
        for (open, close) in values {
            acc = Some(match acc {
                None => (open, open, close, close),
                Some((omin, omax, cmin, cmax)) => (
                    omin.min(open),
                    omax.max(open),
                    cmin.min(close),
                    cmax.max(close),
                ),
            });
        }
        acc.map(|(open_min, open_max, close_min, close_max)| Self {
            open_min,
            open_max: bump(open_min, open_max),
            close_min,
            close_max: bump(close_min, close_max),
        })
    }

    /// (min, max) of a field.
    pub fn bounds(&self, field: PriceField) -> (f64, f64) {
        match field {
            PriceField::Open => (self.open_min, self.open_max),
            PriceField::Close => (self.close_min, self.close_max),
        }
    }

    pub fn normalize(&self, field: PriceField, value: f64) -> f64 {
        let (min, max) = self.bounds(field);
        (value - min) / (max - min)
    }

    pub fn denormalize(&self, field: PriceField, normalized: f64) -> f64 {
        let (min, max) = self.bounds(field);
        normalized * (max - min) + min
    }
}

/// Fitted normalization statistics for every symbol of an aligned series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalizer {
    symbols: Vec<String>,
    stats: Vec<NormalizationStats>,
}

impl Normalizer {
    /// Fit on every date of the aligned series.
    pub fn fit(aligned: &AlignedSeries) -> Result<Self> {
        Self::fit_range(aligned, 0..aligned.num_dates())
    }

    /// Fit on a sub-range of the date axis.
    ///
    /// Fails with a data error if some symbol has no observation in the range.
    pub fn fit_range(aligned: &AlignedSeries, dates: Range<usize>) -> Result<Self> {
        let end = dates.end.min(aligned.num_dates());
        let start = dates.start.min(end);

        let stats = (0..aligned.num_assets())
            .map(|asset| {
                let window = aligned.series(asset).map(|s| &s[start..end]).unwrap_or_default();
                NormalizationStats::from_values(window.iter().flatten().map(|p| (p.open, p.close)))
                    .ok_or_else(|| {
                        PipelineError::DataError(format!(
                            "No observations for {} in date range {}..{}",
                            aligned.symbols()[asset],
                            start,
                            end
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Fitted normalization for {} symbols over dates {}..{}",
            stats.len(),
            start,
            end
        );
        Ok(Self {
            symbols: aligned.symbols().to_vec(),
            stats,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Stats of an asset by position in the asset order.
    pub fn stats(&self, asset: usize) -> Option<&NormalizationStats> {
        self.stats.get(asset)
    }

    pub fn stats_for(&self, symbol: &str) -> Option<&NormalizationStats> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| &self.stats[i])
    }

    fn lookup(&self, symbol: &str) -> Result<&NormalizationStats> {
        self.stats_for(symbol)
            .ok_or_else(|| PipelineError::DataError(format!("Unknown symbol: {}", symbol)))
    }

    /// Scale a present value of `symbol` into its observed range.
    pub fn normalize(&self, symbol: &str, field: PriceField, value: f64) -> Result<f64> {
        Ok(self.lookup(symbol)?.normalize(field, value))
    }

    /// Inverse of [`Normalizer::normalize`].
    pub fn denormalize(&self, symbol: &str, field: PriceField, normalized: f64) -> Result<f64> {
        Ok(self.lookup(symbol)?.denormalize(field, normalized))
    }

    /// Scale by asset position; used on the hot path of window construction.
    ///
    /// # Panics
    ///
    /// Panics if `asset` is not below the number of fitted symbols.
    pub fn normalize_asset(&self, asset: usize, field: PriceField, value: f64) -> f64 {
        self.stats[asset].normalize(field, value)
    }
}
