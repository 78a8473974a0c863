//! Multi-symbol alignment onto a shared global date axis.
//!
//! Every symbol ends up with one slot per global date. A slot holds the
//! observed [`PricePoint`] or `None` when the symbol has no row for that date;
//! gaps are never filled.

use crate::data::{infer_date_format, parse_date, parse_date_as};
use crate::error::{PipelineError, Result};
use crate::types::{DateKey, PricePoint, RawObservation};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Alignment options.
#[derive(Debug, Clone, Default)]
pub struct AlignConfig {
    /// Date format tried before the built-in formats.
    pub date_format: Option<String>,
    /// Expected number of distinct symbols. A mismatch only logs a warning.
    pub expected_symbol_count: Option<usize>,
    /// Fail instead of keeping dates that cannot be parsed.
    pub strict_dates: bool,
}

/// Per-symbol series indexed by a shared date axis.
///
/// `slots[asset][date]` is the observation of `symbols[asset]` on `dates[date]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    symbols: Vec<String>,
    dates: Vec<DateKey>,
    slots: Vec<Vec<Option<PricePoint>>>,
}

impl AlignedSeries {
    /// Build from parts, checking that every series spans the full date axis.
    pub fn from_parts(
        symbols: Vec<String>,
        dates: Vec<DateKey>,
        slots: Vec<Vec<Option<PricePoint>>>,
    ) -> Result<Self> {
        if slots.len() != symbols.len() {
            return Err(PipelineError::shape("aligned series", symbols.len(), slots.len()));
        }
        if let Some((asset, series)) = slots
            .iter()
            .enumerate()
            .find(|(_, s)| s.len() != dates.len())
        {
            return Err(PipelineError::shape(
                format!("aligned series for {}", symbols[asset]),
                dates.len(),
                series.len(),
            ));
        }
        Ok(Self {
            symbols,
            dates,
            slots,
        })
    }

    /// Symbols in the fixed asset order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// The global date axis, ascending.
    pub fn dates(&self) -> &[DateKey] {
        &self.dates
    }

    pub fn num_assets(&self) -> usize {
        self.symbols.len()
    }

    pub fn num_dates(&self) -> usize {
        self.dates.len()
    }

    /// Position of a symbol in the asset order.
    pub fn asset_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Observation of an asset at a date index.
    pub fn get(&self, asset: usize, date: usize) -> Option<PricePoint> {
        self.slots.get(asset).and_then(|s| s.get(date)).copied().flatten()
    }

    /// Full slot sequence of an asset.
    pub fn series(&self, asset: usize) -> Option<&[Option<PricePoint>]> {
        self.slots.get(asset).map(Vec::as_slice)
    }

    /// Full slot sequence of a symbol.
    pub fn series_for(&self, symbol: &str) -> Option<&[Option<PricePoint>]> {
        self.asset_index(symbol).map(|i| self.slots[i].as_slice())
    }

    /// Whether every asset has an observation at the date index.
    pub fn is_complete(&self, date: usize) -> bool {
        self.slots.iter().all(|s| s[date].is_some())
    }

    /// Coverage statistics for each symbol.
    pub fn quality_report(&self) -> AlignmentReport {
        let symbols = self
            .symbols
            .iter()
            .zip(&self.slots)
            .map(|(symbol, series)| {
                let present = series.iter().filter(|s| s.is_some()).count();
                let first = series.iter().position(|s| s.is_some());
                let last = series.iter().rposition(|s| s.is_some());
                SymbolCoverage {
                    symbol: symbol.clone(),
                    present,
                    missing: series.len() - present,
                    coverage_pct: if series.is_empty() {
                        0.0
                    } else {
                        present as f64 / series.len() as f64 * 100.0
                    },
                    first_date: first.map(|i| self.dates[i].to_string()),
                    last_date: last.map(|i| self.dates[i].to_string()),
                }
            })
            .collect();

        AlignmentReport {
            num_dates: self.dates.len(),
            complete_dates: (0..self.dates.len()).filter(|&d| self.is_complete(d)).count(),
            unparsed_dates: self.dates.iter().filter(|d| !d.is_parsed()).count(),
            symbols,
        }
    }
}

/// Coverage of one symbol over the global date axis.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolCoverage {
    pub symbol: String,
    pub present: usize,
    pub missing: usize,
    pub coverage_pct: f64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

/// Summary of an alignment run.
#[derive(Debug, Clone, Serialize)]
pub struct AlignmentReport {
    pub num_dates: usize,
    /// Dates on which every symbol has an observation.
    pub complete_dates: usize,
    /// Dates kept verbatim because they could not be parsed.
    pub unparsed_dates: usize,
    pub symbols: Vec<SymbolCoverage>,
}

impl AlignmentReport {
    pub fn summary(&self) -> String {
        format!(
            "Symbols: {}, Dates: {}, Complete dates: {}, Unparsed dates: {}",
            self.symbols.len(),
            self.num_dates,
            self.complete_dates,
            self.unparsed_dates
        )
    }
}

/// Turns raw observations into an [`AlignedSeries`].
#[derive(Debug, Clone, Default)]
pub struct SeriesAligner {
    config: AlignConfig,
}

impl SeriesAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    /// `load_format` is the single format chosen for the whole load, if any.
    fn date_key(&self, raw: &str, load_format: Option<&str>) -> DateKey {
        let parsed = match load_format {
            Some(format) => parse_date_as(raw, format),
            None => parse_date(raw, self.config.date_format.as_deref()),
        };
        match parsed {
            Some(dt) => DateKey::Parsed(dt),
            None => DateKey::Unparsed(raw.trim().to_string()),
        }
    }

    /// Align observations onto the sorted union of their dates.
    ///
    /// Duplicate (symbol, date) rows keep the last occurrence.
    pub fn align(&self, rows: &[RawObservation]) -> Result<AlignedSeries> {
        let valid: Vec<&RawObservation> = rows.iter().filter(|r| r.validate()).collect();
        if valid.is_empty() {
            return Err(PipelineError::DataError(
                "No valid rows: every row is missing a symbol, date, open or close".to_string(),
            ));
        }
        if valid.len() < rows.len() {
            debug!("Ignoring {} invalid observations", rows.len() - valid.len());
        }

        // Day/month order is decided once for every date in the load
        let preferred = self.config.date_format.as_deref();
        let raw_dates: BTreeSet<&str> = valid.iter().map(|r| r.date.as_str()).collect();
        let readable: Vec<&str> = raw_dates
            .iter()
            .copied()
            .filter(|d| parse_date(d, preferred).is_some())
            .collect();
        let load_format = infer_date_format(&readable, preferred);
        if load_format.is_none() && !readable.is_empty() {
            warn!("Dates mix several formats; each date is parsed on its own");
        }

        let keys: HashMap<&str, DateKey> = raw_dates
            .iter()
            .map(|&raw| (raw, self.date_key(raw, load_format)))
            .collect();

        let unparsed: BTreeSet<&str> = keys
            .iter()
            .filter(|(_, k)| !k.is_parsed())
            .map(|(raw, _)| *raw)
            .collect();
        if !unparsed.is_empty() {
            let sample: Vec<&str> = unparsed.iter().take(5).copied().collect();
            if self.config.strict_dates {
                return Err(PipelineError::DataError(format!(
                    "{} unparseable date(s), e.g. {:?}",
                    unparsed.len(),
                    sample
                )));
            }
            warn!(
                "{} date(s) could not be parsed and are ordered after all parsed dates, e.g. {:?}",
                unparsed.len(),
                sample
            );
        }

        let symbols: Vec<String> = valid
            .iter()
            .map(|r| r.symbol.trim())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let dates: Vec<DateKey> = keys
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if let Some(expected) = self.config.expected_symbol_count {
            if expected != symbols.len() {
                warn!(
                    "Expected {} symbols but found {}: {:?}",
                    expected,
                    symbols.len(),
                    symbols
                );
            }
        }

        let symbol_index: HashMap<&str, usize> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let date_index: HashMap<&DateKey, usize> =
            dates.iter().enumerate().map(|(i, d)| (d, i)).collect();

        let mut slots = vec![vec![None; dates.len()]; symbols.len()];
        let mut duplicates = 0;
        for row in &valid {
            let asset = symbol_index[row.symbol.trim()];
            let date = date_index[&keys[row.date.as_str()]];
            let slot = &mut slots[asset][date];
            if slot.is_some() {
                duplicates += 1;
                debug!("Duplicate row for {} on {}, keeping the last", row.symbol, row.date);
            }
            *slot = Some(PricePoint::new(row.open, row.close));
        }
        if duplicates > 0 {
            warn!("Replaced {} duplicate (symbol, date) rows", duplicates);
        }

        info!(
            "Aligned {} symbols over {} dates ({} to {})",
            symbols.len(),
            dates.len(),
            dates.first().map(|d| d.to_string()).unwrap_or_default(),
            dates.last().map(|d| d.to_string()).unwrap_or_default()
        );

        AlignedSeries::from_parts(symbols, dates, slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(symbol: &str, date: &str, close: f64) -> RawObservation {
        RawObservation::new(symbol, date, close - 0.5, close)
    }

    #[test]
    fn test_align_sorts_chronologically_not_lexically() {
        let rows = vec![
            obs("B", "10/01/2024", 3.0),
            obs("A", "2/01/2024", 1.0),
            obs("A", "10/01/2024", 2.0),
        ];
        let aligned = SeriesAligner::default().align(&rows).unwrap();

        assert_eq!(aligned.symbols(), &["A".to_string(), "B".to_string()]);
        assert_eq!(aligned.num_dates(), 2);
        // %d/%m/%Y: 2 Jan before 10 Jan, although "10" < "2" as strings
        assert_eq!(aligned.dates()[0].to_string(), "2024-01-02");
        assert_eq!(aligned.get(0, 0).unwrap().close, 1.0);
        assert_eq!(aligned.get(0, 1).unwrap().close, 2.0);
        assert!(aligned.get(1, 0).is_none());
        assert_eq!(aligned.get(1, 1).unwrap().close, 3.0);
    }

    #[test]
    fn test_align_month_first_dates_in_order() {
        let mut rows = vec![obs("A", "01/05/2024", 5.0)];
        for day in 10..=15 {
            rows.push(obs("A", &format!("01/{}/2024", day), day as f64));
        }
        let aligned = SeriesAligner::default().align(&rows).unwrap();

        let dates: Vec<String> = aligned.dates().iter().map(|d| d.to_string()).collect();
        assert_eq!(dates[0], "2024-01-05");
        assert_eq!(dates[6], "2024-01-15");
        let closes: Vec<f64> = (0..7).map(|d| aligned.get(0, d).unwrap().close).collect();
        assert_eq!(closes, vec![5.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
    }

    #[test]
    fn test_align_month_first_across_symbols() {
        let rows = vec![
            obs("A", "01/13/2024", 2.0),
            obs("B", "01/05/2024", 1.0),
            obs("A", "01/05/2024", 1.0),
        ];
        let aligned = SeriesAligner::default().align(&rows).unwrap();
        assert_eq!(aligned.num_dates(), 2);
        assert_eq!(aligned.dates()[0].to_string(), "2024-01-05");
        assert_eq!(aligned.dates()[1].to_string(), "2024-01-13");
        assert!(aligned.is_complete(0));
        assert!(aligned.get(1, 1).is_none());
    }

    #[test]
    fn test_align_explicit_format_overrides_day_first() {
        let rows = vec![obs("A", "03/02/2024", 2.0), obs("A", "02/03/2024", 1.0)];
        let us = SeriesAligner::new(AlignConfig {
            date_format: Some("%m/%d/%Y".to_string()),
            ..Default::default()
        });
        let aligned = us.align(&rows).unwrap();
        assert_eq!(aligned.dates()[0].to_string(), "2024-02-03");
        assert_eq!(aligned.get(0, 0).unwrap().close, 1.0);

        let aligned = SeriesAligner::default().align(&rows).unwrap();
        assert_eq!(aligned.dates()[0].to_string(), "2024-02-03");
        assert_eq!(aligned.get(0, 0).unwrap().close, 2.0);
    }

    #[test]
    fn test_series_out_of_range_is_none() {
        let aligned = SeriesAligner::default().align(&[obs("A", "2024-01-02", 1.0)]).unwrap();
        assert_eq!(aligned.series(0).map(<[_]>::len), Some(1));
        assert!(aligned.series(1).is_none());
    }

    #[test]
    fn test_align_merges_equivalent_date_spellings() {
        let rows = vec![obs("A", "2024-01-02", 1.0), obs("B", "2024.01.02", 2.0)];
        let aligned = SeriesAligner::default().align(&rows).unwrap();
        assert_eq!(aligned.num_dates(), 1);
        assert!(aligned.is_complete(0));
    }

    #[test]
    fn test_align_duplicates_keep_last() {
        let rows = vec![obs("A", "2024-01-02", 1.0), obs("A", "2024-01-02", 9.0)];
        let aligned = SeriesAligner::default().align(&rows).unwrap();
        assert_eq!(aligned.get(0, 0).unwrap().close, 9.0);
    }

    #[test]
    fn test_align_no_valid_rows() {
        let rows = vec![RawObservation::new("", "2024-01-02", 1.0, 1.0)];
        let err = SeriesAligner::default().align(&rows).unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));
        assert!(SeriesAligner::default().align(&[]).is_err());
    }

    #[test]
    fn test_unparsed_dates_kept_after_parsed() {
        let rows = vec![obs("A", "someday", 1.0), obs("A", "2024-01-02", 2.0)];
        let aligned = SeriesAligner::default().align(&rows).unwrap();
        assert_eq!(aligned.dates()[1], DateKey::Unparsed("someday".into()));
        assert_eq!(aligned.quality_report().unparsed_dates, 1);
    }

    #[test]
    fn test_strict_dates_rejects_unparsed() {
        let aligner = SeriesAligner::new(AlignConfig {
            strict_dates: true,
            ..Default::default()
        });
        let rows = vec![obs("A", "someday", 1.0), obs("A", "2024-01-02", 2.0)];
        assert!(matches!(
            aligner.align(&rows),
            Err(PipelineError::DataError(_))
        ));
    }

    #[test]
    fn test_expected_symbol_count_mismatch_is_not_fatal() {
        let aligner = SeriesAligner::new(AlignConfig {
            expected_symbol_count: Some(5),
            ..Default::default()
        });
        let aligned = aligner.align(&[obs("A", "2024-01-02", 1.0)]).unwrap();
        assert_eq!(aligned.num_assets(), 1);
    }

    #[test]
    fn test_quality_report() {
        let rows = vec![
            obs("A", "2024-01-02", 1.0),
            obs("A", "2024-01-03", 1.0),
            obs("B", "2024-01-03", 1.0),
        ];
        let report = SeriesAligner::default().align(&rows).unwrap().quality_report();
        assert_eq!(report.num_dates, 2);
        assert_eq!(report.complete_dates, 1);
        assert_eq!(report.symbols[1].missing, 1);
        assert_eq!(report.symbols[1].first_date.as_deref(), Some("2024-01-03"));
        assert!((report.symbols[0].coverage_pct - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_parts_rejects_ragged_series() {
        let dates = vec![DateKey::Unparsed("a".into()), DateKey::Unparsed("b".into())];
        let result = AlignedSeries::from_parts(vec!["A".into()], dates, vec![vec![None]]);
        assert!(matches!(result, Err(PipelineError::ShapeError { .. })));
    }
}
