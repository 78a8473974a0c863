//! The external prediction capability and its shape contract.
//!
//! A [`Predictor`] receives an input batch `[N, L, 2·S]` and returns a
//! probability matrix `[N, S·h]` in the asset-major, horizon-minor order of
//! [`LabelLayout`]. The model itself lives outside this crate; offline model
//! outputs can be replayed from CSV or JSON with [`FilePredictor`].

use crate::error::{PipelineError, Result};
use crate::layout::LabelLayout;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Anything that maps an input batch to rise probabilities.
pub trait Predictor {
    /// Name used in logs and reports.
    fn name(&self) -> &str {
        "predictor"
    }

    /// Predict `[N, S·h]` probabilities for a `[N, L, 2·S]` batch.
    fn predict(&self, batch: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<f64>>>;
}

/// Run a predictor and check both sides of the shape contract.
pub fn predict_checked(
    predictor: &dyn Predictor,
    batch: &[Vec<Vec<f64>>],
    sequence_length: usize,
    layout: LabelLayout,
) -> Result<Vec<Vec<f64>>> {
    if let Some(n) = batch.iter().position(|w| {
        w.len() != sequence_length || w.iter().any(|v| v.len() != layout.feature_len())
    }) {
        return Err(PipelineError::shape(
            format!("input batch sample {}", n),
            format!("[{}, {}]", sequence_length, layout.feature_len()),
            format!("[{}, ?]", batch[n].len()),
        ));
    }

    debug!("Running {} on {} samples", predictor.name(), batch.len());
    let output = predictor.predict(batch)?;
    if output.len() != batch.len() {
        return Err(PipelineError::shape(
            format!("{} output rows", predictor.name()),
            batch.len(),
            output.len(),
        ));
    }
    layout.check_rows(&format!("{} output", predictor.name()), &output)?;
    Ok(output)
}

/// Replays a precomputed probability matrix.
#[derive(Debug, Clone)]
pub struct FilePredictor {
    name: String,
    probabilities: Vec<Vec<f64>>,
}

impl FilePredictor {
    pub fn new(name: impl Into<String>, probabilities: Vec<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            probabilities,
        }
    }

    /// Load from a `.json` or `.csv` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self::new(path.display().to_string(), load_predictions(path)?))
    }

    pub fn probabilities(&self) -> &[Vec<f64>] {
        &self.probabilities
    }
}

impl Predictor for FilePredictor {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, batch: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<f64>>> {
        if batch.len() != self.probabilities.len() {
            return Err(PipelineError::shape(
                format!("stored predictions in {}", self.name),
                batch.len(),
                self.probabilities.len(),
            ));
        }
        Ok(self.probabilities.clone())
    }
}

/// Predicts the training-set rise frequency of every label column.
#[derive(Debug, Clone)]
pub struct BaseRatePredictor {
    rates: Vec<f64>,
}

impl BaseRatePredictor {
    /// Fit on a training label matrix `[N, S·h]`.
    pub fn fit(labels: &[Vec<f64>], layout: LabelLayout) -> Result<Self> {
        layout.check_rows("training labels", labels)?;
        if labels.is_empty() {
            return Err(PipelineError::DataError(
                "Cannot fit base rates on an empty training set".to_string(),
            ));
        }
        let mut rates = vec![0.0; layout.label_len()];
        for row in labels {
            for (rate, value) in rates.iter_mut().zip(row) {
                *rate += value;
            }
        }
        for rate in &mut rates {
            *rate /= labels.len() as f64;
        }
        Ok(Self { rates })
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }
}

impl Predictor for BaseRatePredictor {
    fn name(&self) -> &str {
        "base-rate"
    }

    fn predict(&self, batch: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<f64>>> {
        Ok(vec![self.rates.clone(); batch.len()])
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PredictionFile {
    Matrix(Vec<Vec<f64>>),
    Object { predictions: Vec<Vec<f64>> },
}

/// Load a probability matrix from JSON (`[[..], ..]` or `{"predictions": ..}`)
/// or CSV (one row per sample, optional header row).
pub fn load_predictions(path: impl AsRef<Path>) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let content = fs::read_to_string(path)?;
    let matrix = if is_json {
        match serde_json::from_str::<PredictionFile>(&content)? {
            PredictionFile::Matrix(m) | PredictionFile::Object { predictions: m } => m,
        }
    } else {
        parse_prediction_csv(&content)?
    };
    info!("Loaded {} prediction rows from {}", matrix.len(), path.display());
    Ok(matrix)
}

/// Parse a CSV probability matrix. A first row with any non-numeric cell is
/// treated as a header.
pub fn parse_prediction_csv(content: &str) -> Result<Vec<Vec<f64>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (n, record) in reader.records().enumerate() {
        let record = record?;
        let parsed: std::result::Result<Vec<f64>, _> =
            record.iter().map(|c| c.parse::<f64>()).collect();
        match parsed {
            Ok(row) => rows.push(row),
            Err(_) if n == 0 => debug!("Treating first prediction row as header"),
            Err(e) => {
                return Err(PipelineError::DataError(format!(
                    "Non-numeric prediction on line {}: {}",
                    n + 1,
                    e
                )))
            }
        }
    }
    Ok(rows)
}
