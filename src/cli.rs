//! Command-line interface for the dataset pipeline.

use risewin::align::SeriesAligner;
use risewin::config::PipelineConfig;
use risewin::data::load_source;
use risewin::error::{PipelineError, Result};
use risewin::export::{
    export_dataset_json, export_evaluation_json, export_timelines_csv, EvaluationExport,
};
use risewin::loader::DatasetLoader;
use risewin::metadata::DatasetProvenance;
use risewin::normalize::NormalizationScope;
use risewin::predictor::{BaseRatePredictor, FilePredictor, Predictor};
use risewin::report::ResultFormatter;
use risewin::split::Dataset;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// risewin - multi-asset rise/fall window datasets and accuracy evaluation.
#[derive(Parser)]
#[command(name = "risewin")]
#[command(version)]
#[command(about = "Build sliding-window rise/fall datasets and evaluate predictions")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Align, normalize, window and split a data set
    Prepare {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Write the prepared dataset as JSON
        #[arg(short = 'x', long)]
        export: Option<PathBuf>,
    },

    /// Evaluate predictions for the test subset of a prepared data set
    Evaluate {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Prediction matrix (CSV or JSON), one row per test sample
        #[arg(short, long)]
        predictions: Option<PathBuf>,

        /// Predict the training-set rise frequency of every label
        #[arg(long, conflicts_with = "predictions")]
        baseline: bool,

        /// Write per-asset timelines as CSV
        #[arg(long)]
        timelines: Option<PathBuf>,

        /// Write the full evaluation result as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check a data file or directory and report per-symbol coverage
    Validate {
        /// CSV file or directory of per-symbol CSV files
        #[arg(short, long)]
        data: PathBuf,

        /// Date format tried before the built-in ones
        #[arg(long)]
        date_format: Option<String>,
    },

    /// Generate an example configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "risewin.toml")]
        output: PathBuf,
    },
}

/// Data source and overrides shared by `prepare` and `evaluate`.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// CSV file or directory (overrides the config's data path)
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Window length in dates
    #[arg(long)]
    pub sequence_length: Option<usize>,

    /// Number of future offsets to label
    #[arg(long)]
    pub horizon: Option<usize>,

    /// Percentage of samples used for training
    #[arg(long)]
    pub train_split: Option<f64>,

    /// Fit normalization on training dates only
    #[arg(long)]
    pub train_only_normalization: bool,
}

impl PipelineArgs {
    /// Merge the config file with command-line overrides.
    fn resolve(&self) -> Result<(PipelineConfig, PathBuf)> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(l) = self.sequence_length {
            config.window.sequence_length = l;
        }
        if let Some(h) = self.horizon {
            config.window.forecast_horizon = h;
        }
        if let Some(p) = self.train_split {
            config.split.train_split_percent = p;
        }
        if self.train_only_normalization {
            config.split.normalization = NormalizationScope::TrainOnly;
        }
        config.validate()?;

        let data = match (&self.data, &config.data.path) {
            (Some(path), _) => path.clone(),
            (None, Some(path)) => PathBuf::from(path),
            (None, None) => {
                return Err(PipelineError::ConfigError(
                    "No data path given (use --data or [data] path)".to_string(),
                ))
            }
        };
        Ok((config, data))
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Initialize logging based on verbosity level.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match &cli.command {
        Commands::Prepare { pipeline, export } => {
            run_prepare(pipeline, export.as_deref(), cli.output)
        }

        Commands::Evaluate {
            pipeline,
            predictions,
            baseline,
            timelines,
            report,
        } => run_evaluate(
            pipeline,
            predictions.as_deref(),
            *baseline,
            timelines.as_deref(),
            report.as_deref(),
            cli.output,
        ),

        Commands::Validate { data, date_format } => {
            validate_data(data, date_format.clone(), cli.output)
        }

        Commands::Init { output } => init_config(output),
    }
}

fn prepare_loader(
    pipeline: &PipelineArgs,
) -> Result<(DatasetLoader, PipelineConfig, PathBuf)> {
    let (config, data) = pipeline.resolve()?;
    info!("Preparing dataset from: {}", data.display());
    let mut loader = DatasetLoader::new(config.clone())?;
    loader.prepare_from_path(&data)?;
    Ok((loader, config, data))
}

fn run_prepare(
    pipeline: &PipelineArgs,
    export: Option<&Path>,
    output: OutputFormat,
) -> Result<()> {
    let (loader, config, data) = prepare_loader(pipeline)?;
    let dataset = loader.dataset()?;
    let alignment = loader.aligned()?.quality_report();
    let stats = loader.window_stats()?;

    if let Some(path) = export {
        let provenance = DatasetProvenance::capture(&config, Some(&data))?;
        export_dataset_json(dataset, Some(provenance), path)?;
    }

    match output {
        OutputFormat::Text => {
            ResultFormatter::print_dataset_summary(dataset, &alignment, &stats);
            if let Some(path) = export {
                println!("Dataset written to {}", path.display());
            }
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "symbols": dataset.symbols(),
                "sequence_length": dataset.sequence_length(),
                "forecast_horizon": dataset.layout().num_horizons(),
                "num_samples": dataset.len(),
                "num_train": dataset.train().len(),
                "num_test": dataset.test().len(),
                "window_stats": stats,
                "alignment": alignment,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

fn run_evaluate(
    pipeline: &PipelineArgs,
    predictions: Option<&Path>,
    baseline: bool,
    timelines: Option<&Path>,
    report: Option<&Path>,
    output: OutputFormat,
) -> Result<()> {
    let (mut loader, _, _) = prepare_loader(pipeline)?;

    let predictor: Box<dyn Predictor> = match predictions {
        Some(path) => Box::new(FilePredictor::load(path)?),
        None if baseline => {
            let dataset = loader.dataset()?;
            let labels = Dataset::labels(dataset.train());
            Box::new(BaseRatePredictor::fit(&labels, dataset.layout())?)
        }
        None => {
            return Err(PipelineError::ConfigError(
                "Nothing to evaluate (use --predictions or --baseline)".to_string(),
            ))
        }
    };
    info!("Evaluating predictions from {}", predictor.name());
    loader.predict_test(predictor.as_ref())?;

    let result = loader.evaluate()?;
    let symbols = loader.dataset()?.symbols();

    if let Some(path) = timelines {
        export_timelines_csv(&result, symbols, path)?;
    }
    if let Some(path) = report {
        export_evaluation_json(&result, symbols, path)?;
    }

    match output {
        OutputFormat::Text => ResultFormatter::print_evaluation(&result, symbols),
        OutputFormat::Json => {
            let export = EvaluationExport {
                symbols,
                result: &result,
            };
            println!("{}", serde_json::to_string_pretty(&export)?);
        }
    }
    Ok(())
}

fn validate_data(
    data_path: &Path,
    date_format: Option<String>,
    output: OutputFormat,
) -> Result<()> {
    let mut config = PipelineConfig::default();
    config.data.date_format = date_format;

    let rows = load_source(data_path, &config.data_config())?;
    let aligned = SeriesAligner::new(config.align_config()).align(&rows)?;
    let report = aligned.quality_report();

    match output {
        OutputFormat::Text => {
            println!("Validating data: {}", data_path.display());
            println!("\nData Summary:");
            println!("  Rows: {}", rows.len());
            println!("  {}", report.summary());
            if let (Some(first), Some(last)) = (aligned.dates().first(), aligned.dates().last()) {
                println!("  Start: {}", first);
                println!("  End: {}", last);
            }
            println!("\n{}", ResultFormatter::coverage_table(&report));
            println!("\nValidation: PASSED");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn init_config(output: &PathBuf) -> Result<()> {
    fs::write(output, PipelineConfig::example())?;
    println!("Created example configuration file: {}", output.display());
    println!("\nEdit this file to point at your data, then run:");
    println!("  risewin prepare -c {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_prepare() {
        let cli = Cli::try_parse_from([
            "risewin",
            "prepare",
            "-d",
            "prices.csv",
            "--sequence-length",
            "10",
            "--horizon",
            "3",
        ]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_evaluate_conflicts() {
        let ok = Cli::try_parse_from(["risewin", "evaluate", "-d", "x.csv", "--baseline"]);
        assert!(ok.is_ok());

        let conflict = Cli::try_parse_from([
            "risewin", "evaluate", "-d", "x.csv", "--baseline", "-p", "preds.csv",
        ]);
        assert!(conflict.is_err());
    }

    #[test]
    fn test_resolve_overrides() {
        let args = PipelineArgs {
            config: None,
            data: Some(PathBuf::from("prices.csv")),
            sequence_length: Some(7),
            horizon: None,
            train_split: Some(60.0),
            train_only_normalization: true,
        };
        let (config, data) = args.resolve().unwrap();
        assert_eq!(data, PathBuf::from("prices.csv"));
        assert_eq!(config.window.sequence_length, 7);
        assert_eq!(config.window.forecast_horizon, 5);
        assert_eq!(config.split.train_split_percent, 60.0);
        assert_eq!(config.split.normalization, NormalizationScope::TrainOnly);
    }

    #[test]
    fn test_resolve_requires_data() {
        let args = PipelineArgs {
            config: None,
            data: None,
            sequence_length: None,
            horizon: None,
            train_split: None,
            train_only_normalization: false,
        };
        assert!(args.resolve().is_err());
    }
}
