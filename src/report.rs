//! Terminal reports for prepared datasets and evaluation results.

use crate::align::AlignmentReport;
use crate::evaluate::{EvaluationResult, DECISION_THRESHOLD};
use crate::split::Dataset;
use crate::window::WindowStats;
use colored::Colorize;
use tabled::{builder::Builder, settings::Style};

/// Pretty-printer for pipeline outputs.
pub struct ResultFormatter;

impl ResultFormatter {
    /// Print the dataset produced by a prepare run.
    pub fn print_dataset_summary(
        dataset: &Dataset,
        alignment: &AlignmentReport,
        stats: &WindowStats,
    ) {
        let layout = dataset.layout();

        println!();
        println!("{}", "═".repeat(60).blue());
        println!("{}", " PREPARED DATASET ".bold().blue());
        println!("{}", "═".repeat(60).blue());
        println!();

        println!("{}", "Alignment".bold().underline());
        println!("  Symbols:         {}", dataset.symbols().join(", "));
        println!("  Dates:           {:>8}", alignment.num_dates);
        println!("  Complete Dates:  {:>8}", alignment.complete_dates);
        if alignment.unparsed_dates > 0 {
            println!(
                "  Unparsed Dates:  {:>8}  {}",
                alignment.unparsed_dates,
                "(sorted after parsed dates)".yellow()
            );
        }
        println!();

        println!("{}", "Windows".bold().underline());
        println!("  Sequence Length: {:>8}", dataset.sequence_length());
        println!("  Horizon:         {:>8}", layout.num_horizons());
        println!("  Input Shape:     [N, {}, {}]", dataset.sequence_length(), layout.feature_len());
        println!("  Label Shape:     [N, {}]", layout.label_len());
        println!("  Samples:         {:>8}", stats.emitted);
        println!(
            "  Skipped:         {:>8}  (history {}, future {}, missing {})",
            stats.insufficient_history + stats.insufficient_future + stats.missing_data,
            stats.insufficient_history,
            stats.insufficient_future,
            stats.missing_data
        );
        println!();

        println!("{}", "Split".bold().underline());
        println!("  Train:           {:>8}", dataset.train().len());
        println!("  Test:            {:>8}", dataset.test().len());
        if let (Some(first), Some(last)) = (dataset.test().first(), dataset.test().last()) {
            println!("  Test Period:     {} to {}", first.anchor_date, last.anchor_date);
        }
        println!();

        println!("{}", Self::coverage_table(alignment));
        println!("{}", "═".repeat(60).blue());
    }

    /// Print accuracy of an evaluation run.
    pub fn print_evaluation(result: &EvaluationResult, symbols: &[String]) {
        println!();
        println!("{}", "═".repeat(60).blue());
        println!("{}", " EVALUATION RESULTS ".bold().blue());
        println!("{}", "═".repeat(60).blue());
        println!();

        println!("  Samples:          {:>8}", result.num_samples());
        println!(
            "  Overall Accuracy: {:>7.2}%  {}",
            result.overall_accuracy * 100.0,
            Self::format_edge(result.overall_accuracy)
        );
        println!();

        println!("{}", Self::accuracy_table(result, symbols));
        println!("{}", "═".repeat(60).blue());
    }

    /// Distance from coin-flip accuracy, coloured by sign.
    fn format_edge(accuracy: f64) -> String {
        let edge = (accuracy - DECISION_THRESHOLD) * 100.0;
        if edge >= 0.0 {
            format!("(+{:.2} pts vs 50%)", edge).green().to_string()
        } else {
            format!("({:.2} pts vs 50%)", edge).red().to_string()
        }
    }

    /// Per-asset table: overall, per-horizon and timeline hit rate.
    pub fn accuracy_table(result: &EvaluationResult, symbols: &[String]) -> String {
        let mut builder = Builder::new();
        let mut header = vec!["Symbol".to_string(), "Accuracy".to_string()];
        header.extend((1..=result.num_horizons).map(|o| format!("t+{}", o)));
        header.push("Timeline".to_string());
        builder.push_record(header);

        for (asset, symbol) in symbols.iter().enumerate().take(result.num_assets) {
            let mut row = vec![
                symbol.clone(),
                format!("{:.2}%", result.per_stock_accuracy[asset] * 100.0),
            ];
            row.extend(
                result.per_horizon_accuracy[asset]
                    .iter()
                    .map(|a| format!("{:.2}%", a * 100.0)),
            );
            let hit_rate = result.timeline_hit_rate(asset).unwrap_or_default();
            row.push(format!("{:.2}%", hit_rate * 100.0));
            builder.push_record(row);
        }

        builder.build().with(Style::rounded()).to_string()
    }

    /// Per-symbol coverage over the global date axis.
    pub fn coverage_table(report: &AlignmentReport) -> String {
        let mut builder = Builder::new();
        builder.push_record(["Symbol", "Present", "Missing", "Coverage", "First", "Last"]);

        for s in &report.symbols {
            builder.push_record([
                s.symbol.clone(),
                s.present.to_string(),
                s.missing.to_string(),
                format!("{:.1}%", s.coverage_pct),
                s.first_date.clone().unwrap_or_else(|| "-".to_string()),
                s.last_date.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }

        builder.build().with(Style::rounded()).to_string()
    }
}
