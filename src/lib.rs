//! risewin - multi-asset, multi-horizon rise/fall datasets for sequence models.
//!
//! # Overview
//!
//! risewin turns long-format daily price rows (date, symbol, open, close) for a
//! fixed set of assets into sliding-window samples for a sequence classifier,
//! and scores the classifier's rise probabilities against ground truth:
//!
//! - **Alignment**: every symbol on one global, sorted date axis; gaps stay
//!   explicit instead of being filled
//! - **Normalization**: per-symbol, per-field min-max scaling
//! - **Windows**: `L` past dates of features, `h` future rise/fall labels per
//!   asset, never touching a missing observation
//! - **Split**: chronological train/test split, no shuffling
//! - **Evaluation**: per-asset, per-horizon and overall accuracy plus per-asset
//!   correctness timelines
//!
//! # Quick Start
//!
//! ```no_run
//! use risewin::{DatasetLoader, PipelineConfig, BaseRatePredictor, Dataset};
//!
//! let mut config = PipelineConfig::default();
//! config.window.sequence_length = 20;
//! config.window.forecast_horizon = 5;
//!
//! let mut loader = DatasetLoader::new(config).unwrap();
//! let dataset = loader.prepare_from_path("data/prices.csv").unwrap();
//! println!("{} train / {} test", dataset.train().len(), dataset.test().len());
//!
//! let labels = Dataset::labels(dataset.train());
//! let baseline = BaseRatePredictor::fit(&labels, dataset.layout()).unwrap();
//! loader.predict_test(&baseline).unwrap();
//!
//! let result = loader.evaluate().unwrap();
//! println!("Overall accuracy: {:.2}%", result.overall_accuracy * 100.0);
//! ```
//!
//! # Plugging in a model
//!
//! Implement [`Predictor`] to score test windows with your own model:
//!
//! ```
//! use risewin::predictor::Predictor;
//! use risewin::error::Result;
//!
//! struct AlwaysUp {
//!     outputs: usize,
//! }
//!
//! impl Predictor for AlwaysUp {
//!     fn name(&self) -> &str {
//!         "always-up"
//!     }
//!
//!     fn predict(&self, batch: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<f64>>> {
//!         Ok(vec![vec![1.0; self.outputs]; batch.len()])
//!     }
//! }
//! ```
//!
//! # Axis order
//!
//! Labels and predictions are flat rows in asset-major, horizon-minor order;
//! see [`layout::LabelLayout`].

pub mod align;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod export;
pub mod layout;
pub mod loader;
pub mod metadata;
pub mod normalize;
pub mod predictor;
pub mod report;
pub mod split;
pub mod types;
pub mod window;

// Re-exports for convenience
pub use align::{AlignConfig, AlignedSeries, AlignmentReport, SeriesAligner, SymbolCoverage};
pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, Result};
pub use evaluate::{AccuracyEvaluator, EvaluationResult, DECISION_THRESHOLD};
pub use layout::LabelLayout;
pub use loader::DatasetLoader;
pub use normalize::{NormalizationScope, NormalizationStats, Normalizer};
pub use predictor::{BaseRatePredictor, FilePredictor, Predictor};
pub use report::ResultFormatter;
pub use split::{Dataset, DatasetSplitter};
pub use types::{DateKey, PriceField, PricePoint, RawObservation};
pub use window::{Sample, WindowBuilder, WindowConfig, WindowStats};

// Data loading re-exports
pub use data::{load_csv, load_dir, load_source, DataConfig};
