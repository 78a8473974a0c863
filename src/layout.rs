//! Axis order shared by label construction and evaluation.
//!
//! Labels and predictions are flat rows of length `assets × horizons`, laid out
//! asset-major and horizon-minor:
//!
//! ```text
//! [a0 h1, a0 h2, ..., a0 hH, a1 h1, ..., a(S-1) hH]
//! ```
//!
//! Feature vectors are flat rows of length `2 × assets`, asset-major with
//! `(open, close)` per asset. Both the window builder and the accuracy
//! evaluator index through [`LabelLayout`] so the two sites cannot disagree.

use crate::error::{PipelineError, Result};
use crate::types::PriceField;
use serde::{Deserialize, Serialize};

/// Number of features per asset per time step (normalized open and close).
pub const FEATURES_PER_ASSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelLayout {
    num_assets: usize,
    num_horizons: usize,
}

impl LabelLayout {
    pub fn new(num_assets: usize, num_horizons: usize) -> Self {
        Self {
            num_assets,
            num_horizons,
        }
    }

    pub fn num_assets(&self) -> usize {
        self.num_assets
    }

    pub fn num_horizons(&self) -> usize {
        self.num_horizons
    }

    /// Length of a label or prediction row.
    pub fn label_len(&self) -> usize {
        self.num_assets * self.num_horizons
    }

    /// Length of one time step of the input window.
    pub fn feature_len(&self) -> usize {
        self.num_assets * FEATURES_PER_ASSET
    }

    /// Flat position of `(asset, horizon)`; `horizon` is zero-based, so
    /// horizon 0 is the offset `+1` from the anchor.
    #[inline]
    pub fn label_index(&self, asset: usize, horizon: usize) -> usize {
        debug_assert!(asset < self.num_assets && horizon < self.num_horizons);
        asset * self.num_horizons + horizon
    }

    /// Inverse of [`LabelLayout::label_index`].
    #[inline]
    pub fn label_position(&self, index: usize) -> (usize, usize) {
        (index / self.num_horizons, index % self.num_horizons)
    }

    /// Flat position of a price field of an asset within a feature vector.
    #[inline]
    pub fn feature_index(&self, asset: usize, field: PriceField) -> usize {
        asset * FEATURES_PER_ASSET
            + match field {
                PriceField::Open => 0,
                PriceField::Close => 1,
            }
    }

    /// Check that every row of a matrix has the label length.
    pub fn check_rows(&self, context: &str, rows: &[Vec<f64>]) -> Result<()> {
        match rows.iter().position(|r| r.len() != self.label_len()) {
            None => Ok(()),
            Some(n) => Err(PipelineError::shape(
                format!("{} row {}", context, n),
                format!(
                    "{} = {} assets x {} horizons",
                    self.label_len(),
                    self.num_assets,
                    self.num_horizons
                ),
                rows[n].len(),
            )),
        }
    }

    /// Reinterpret a flat row as `[assets][horizons]`.
    pub fn unflatten(&self, row: &[f64]) -> Vec<Vec<f64>> {
        (0..self.num_assets)
            .map(|a| {
                (0..self.num_horizons)
                    .map(|h| row[self.label_index(a, h)])
                    .collect()
            })
            .collect()
    }

    /// Column names for labels, e.g. `AAPL_t+1`.
    pub fn label_names(&self, symbols: &[String]) -> Vec<String> {
        symbols
            .iter()
            .flat_map(|s| (1..=self.num_horizons).map(move |o| format!("{}_t+{}", s, o)))
            .collect()
    }

    /// Column names for one feature vector, e.g. `AAPL_open`.
    pub fn feature_names(&self, symbols: &[String]) -> Vec<String> {
        symbols
            .iter()
            .flat_map(|s| {
                [PriceField::Open, PriceField::Close]
                    .into_iter()
                    .map(move |f| format!("{}_{}", s, f))
            })
            .collect()
    }
}
