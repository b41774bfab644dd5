//! Tradebot runner: backtest replay, paper trading, journal and scheduling.
//!
//! This crate builds on `tradebot-core` to provide:
//! - CSV daily bar loading
//! - A historical market replay and paper broker implementing the collaborator traits
//! - A JSONL news archive for backtests
//! - The day-by-day backtest driver
//! - The JSONL iteration journal
//! - The live cadence scheduler

pub mod backtest;
pub mod data_loader;
pub mod historical;
pub mod journal;
pub mod news_archive;
pub mod paper;
pub mod scheduler;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use backtest::{
    run_backtest, BacktestResult, BacktestSetup, BacktestWindow, EquityPoint, IterationSummary,
};
pub use data_loader::{load_dir, load_symbol_csv, BarSet, DailyBar, LoadError};
pub use historical::HistoricalMarket;
pub use journal::IterationJournal;
pub use news_archive::{ArchivedHeadline, NewsArchive};
pub use paper::{Fill, PaperBroker};
pub use scheduler::Scheduler;

/// Errors from backtest and journal orchestration.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("news archive line {line}: {reason}")]
    NewsArchive { line: usize, reason: String },

    #[error("no bars loaded")]
    NoBars,

    #[error("no trading days in window {window}")]
    NoTradingDays { window: String },

    #[error("initial cash must be positive, got {0}")]
    InvalidCash(f64),

    #[error("failed to write iteration journal: {0}")]
    Journal(#[source] io::Error),

    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn collaborators_are_send_sync() {
        assert_send::<HistoricalMarket>();
        assert_sync::<HistoricalMarket>();
        assert_send::<PaperBroker>();
        assert_sync::<PaperBroker>();
        assert_send::<NewsArchive>();
        assert_sync::<NewsArchive>();
    }

    #[test]
    fn results_are_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }

    #[test]
    fn scheduler_is_send_sync() {
        assert_send::<Scheduler>();
        assert_sync::<Scheduler>();
        assert_send::<IterationJournal>();
        assert_sync::<IterationJournal>();
    }
}
