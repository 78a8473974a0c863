//! Export utilities for prepared datasets and evaluation results.
//!
//! | Output | Format |
//! |--------|--------|
//! | Dataset tensors, names, anchor dates, provenance | JSON |
//! | Evaluation result | JSON |
//! | Per-asset timelines | CSV |
//! | Prediction matrix | CSV (readable by [`crate::predictor::load_predictions`]) |

use crate::error::Result;
use crate::evaluate::EvaluationResult;
use crate::layout::LabelLayout;
use crate::metadata::DatasetProvenance;
use crate::split::Dataset;
use crate::window::Sample;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// One subset of a dataset in tensor form.
#[derive(Debug, Clone, Serialize)]
pub struct SubsetExport {
    pub anchor_dates: Vec<String>,
    /// `[N, L, 2·S]`
    pub inputs: Vec<Vec<Vec<f64>>>,
    /// `[N, S·h]`
    pub labels: Vec<Vec<f64>>,
}

impl SubsetExport {
    fn from_samples(samples: &[Sample]) -> Self {
        Self {
            anchor_dates: samples.iter().map(|s| s.anchor_date.to_string()).collect(),
            inputs: Dataset::inputs(samples),
            labels: Dataset::labels(samples),
        }
    }
}

/// Self-describing JSON form of a [`Dataset`].
#[derive(Debug, Clone, Serialize)]
pub struct DatasetExport {
    pub symbols: Vec<String>,
    pub sequence_length: usize,
    pub forecast_horizon: usize,
    pub feature_names: Vec<String>,
    pub label_names: Vec<String>,
    pub num_train: usize,
    pub num_test: usize,
    pub train: SubsetExport,
    pub test: SubsetExport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<DatasetProvenance>,
}

impl DatasetExport {
    pub fn new(dataset: &Dataset, provenance: Option<DatasetProvenance>) -> Self {
        let layout = dataset.layout();
        Self {
            symbols: dataset.symbols().to_vec(),
            sequence_length: dataset.sequence_length(),
            forecast_horizon: layout.num_horizons(),
            feature_names: layout.feature_names(dataset.symbols()),
            label_names: layout.label_names(dataset.symbols()),
            num_train: dataset.train().len(),
            num_test: dataset.test().len(),
            train: SubsetExport::from_samples(dataset.train()),
            test: SubsetExport::from_samples(dataset.test()),
            provenance,
        }
    }
}

/// Evaluation result with the symbol names of its asset axis.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationExport<'a> {
    pub symbols: &'a [String],
    #[serde(flatten)]
    pub result: &'a EvaluationResult,
}

/// Write a dataset to pretty JSON.
pub fn export_dataset_json(
    dataset: &Dataset,
    provenance: Option<DatasetProvenance>,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let export = DatasetExport::new(dataset, provenance);
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, &export)?;
    info!(
        "Exported dataset ({} train, {} test) to {}",
        export.num_train,
        export.num_test,
        path.display()
    );
    Ok(())
}

/// Write an evaluation result to pretty JSON.
pub fn export_evaluation_json(
    result: &EvaluationResult,
    symbols: &[String],
    path: impl AsRef<Path>,
) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, &EvaluationExport { symbols, result })?;
    Ok(())
}

/// Write per-asset timelines: one row per evaluated sample, one 0/1 column per
/// asset. Samples without a known anchor date are keyed by position.
pub fn write_timelines_csv<W: Write>(
    writer: &mut W,
    result: &EvaluationResult,
    symbols: &[String],
) -> Result<()> {
    writeln!(writer, "anchor_date,{}", symbols.join(","))?;
    for n in 0..result.num_samples() {
        let key = result
            .anchor_dates
            .get(n)
            .map(|d| d.to_string())
            .unwrap_or_else(|| n.to_string());
        let cells: Vec<String> = result
            .per_stock_timeline
            .iter()
            .map(|timeline| timeline[n].to_string())
            .collect();
        writeln!(writer, "{},{}", key, cells.join(","))?;
    }
    Ok(())
}

pub fn timelines_to_csv(result: &EvaluationResult, symbols: &[String]) -> Result<String> {
    let mut buf = Vec::new();
    write_timelines_csv(&mut buf, result, symbols)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn export_timelines_csv(
    result: &EvaluationResult,
    symbols: &[String],
    path: impl AsRef<Path>,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_timelines_csv(&mut writer, result, symbols)?;
    writer.flush()?;
    Ok(())
}

/// Write a `[N, S·h]` probability matrix with label-name headers.
pub fn export_predictions_csv(
    predictions: &[Vec<f64>],
    layout: LabelLayout,
    symbols: &[String],
    path: impl AsRef<Path>,
) -> Result<()> {
    layout.check_rows("exported predictions", predictions)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", layout.label_names(symbols).join(","))?;
    for row in predictions {
        let cells: Vec<String> = row.iter().map(|p| format!("{:.6}", p)).collect();
        writeln!(writer, "{}", cells.join(","))?;
    }
    writer.flush()?;
    Ok(())
}
