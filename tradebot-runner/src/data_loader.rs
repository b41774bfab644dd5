//! Daily bar loading from CSV files.
//!
//! One file per symbol, `<dir>/<SYMBOL>.csv`, with a header row
//! `date,open,high,low,close,volume` and optional `bid,ask` columns. Dates are
//! `YYYY-MM-DD` and must be strictly increasing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the bar loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no bar file for '{symbol}' at {path}")]
    MissingFile { symbol: String, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{symbol}: file has no bars")]
    Empty { symbol: String },

    #[error("{symbol}: dates not strictly increasing at {date}")]
    OutOfOrder { symbol: String, date: NaiveDate },

    #[error("{symbol}: invalid bar on {date}: {reason}")]
    InvalidBar {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },
}

/// One trading day for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
}

impl DailyBar {
    /// `ask - bid` when both sides are quoted.
    pub fn spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid.is_finite() && ask.is_finite() => Some(ask - bid),
            _ => None,
        }
    }
}

/// Bars per symbol, oldest first.
pub type BarSet = BTreeMap<String, Vec<DailyBar>>;

/// Path of a symbol's bar file inside `dir`.
pub fn bar_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("{symbol}.csv"))
}

/// Read and validate one symbol's CSV.
pub fn load_symbol_csv(symbol: &str, path: &Path) -> Result<Vec<DailyBar>, LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingFile {
            symbol: symbol.to_string(),
            path: path.to_path_buf(),
        });
    }
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    let bars = reader
        .deserialize::<DailyBar>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)?;

    validate_bars(symbol, &bars)?;
    tracing::debug!(%symbol, bars = bars.len(), path = %path.display(), "bars loaded");
    Ok(bars)
}

/// Load every symbol in `symbols` from `dir`. A missing file is an error.
pub fn load_dir(dir: &Path, symbols: &[String]) -> Result<BarSet, LoadError> {
    let mut set = BarSet::new();
    for symbol in symbols {
        let bars = load_symbol_csv(symbol, &bar_path(dir, symbol))?;
        set.insert(symbol.clone(), bars);
    }
    tracing::info!(dir = %dir.display(), symbols = set.len(), "bar set loaded");
    Ok(set)
}

fn validate_bars(symbol: &str, bars: &[DailyBar]) -> Result<(), LoadError> {
    if bars.is_empty() {
        return Err(LoadError::Empty {
            symbol: symbol.to_string(),
        });
    }
    let invalid = |date, reason: &str| LoadError::InvalidBar {
        symbol: symbol.to_string(),
        date,
        reason: reason.to_string(),
    };

    let mut prev: Option<NaiveDate> = None;
    for bar in bars {
        if prev.is_some_and(|p| bar.date <= p) {
            return Err(LoadError::OutOfOrder {
                symbol: symbol.to_string(),
                date: bar.date,
            });
        }
        if !bar.close.is_finite() || bar.close <= 0.0 {
            return Err(invalid(bar.date, "close must be positive"));
        }
        if let (Some(bid), Some(ask)) = (bar.bid, bar.ask) {
            if ask < bid {
                return Err(invalid(bar.date, "ask below bid"));
            }
        }
        prev = Some(bar.date);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, symbol: &str, body: &str) -> PathBuf {
        let path = bar_path(dir, symbol);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn reads_bars_with_optional_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "AAPL",
            "date,open,high,low,close,volume,bid,ask\n\
             2024-01-02,10,11,9,10.5,1000,10.49,10.51\n\
             2024-01-03,10.5,11,10,10.8,1200,,\n",
        );
        let bars = load_symbol_csv("AAPL", &path).unwrap();
        assert_eq!(bars.len(), 2);
        assert!((bars[0].spread().unwrap() - 0.02).abs() < 1e-9);
        assert_eq!(bars[1].spread(), None);
    }

    #[test]
    fn quote_columns_may_be_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "MSFT",
            "date,open,high,low,close,volume\n2024-01-02,1,1,1,1,5\n",
        );
        let bars = load_symbol_csv("MSFT", &path).unwrap();
        assert_eq!(bars[0].bid, None);
    }

    #[test]
    fn rejects_unsorted_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "X",
            "date,open,high,low,close,volume\n2024-01-03,1,1,1,1,1\n2024-01-02,1,1,1,1,1\n",
        );
        assert!(matches!(
            load_symbol_csv("X", &path),
            Err(LoadError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "X",
            "date,open,high,low,close,volume\n2024-01-02,1,1,1,0,1\n",
        );
        assert!(matches!(
            load_symbol_csv("X", &path),
            Err(LoadError::InvalidBar { .. })
        ));
    }

    #[test]
    fn missing_file_names_the_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dir(dir.path(), &["NVDA".to_string()]).unwrap_err();
        assert!(err.to_string().contains("NVDA"));
    }

    #[test]
    fn header_only_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "X", "date,open,high,low,close,volume\n");
        assert!(matches!(
            load_symbol_csv("X", &path),
            Err(LoadError::Empty { .. })
        ));
    }
}
