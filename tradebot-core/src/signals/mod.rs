//! Signal modules: independent strategies that write into a shared plan.
//!
//! Every module reads an immutable [`MarketContext`] plus its own settings and
//! mutates the [`TradingPlan`] in place. Modules never see broker state or the
//! registry; the aggregator hands them a settings snapshot per call.

mod momentum;
mod news;
mod random;
mod spread;

pub use momentum::MomentumSignal;
pub use news::NewsReactionSignal;
pub use random::RandomSignal;
pub use spread::SpreadFilterSignal;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SignalSettings;
use crate::data::SentimentClassifier;
use crate::domain::{PriceHistory, TradeLedger, TradingPlan};
use crate::rng::SeedHierarchy;

/// Log a per-symbol line at `info` when the module is verbose, `debug` otherwise.
macro_rules! symbol_log {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}
pub(crate) use symbol_log;

/// The four built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    NewsReaction,
    Momentum,
    SpreadFilter,
    RandomTrading,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewsReaction => "news_reaction",
            Self::Momentum => "momentum",
            Self::SpreadFilter => "spread_filter",
            Self::RandomTrading => "random_trading",
        }
    }

    /// Default priority: fundamental, technical, risk gate, then exploration.
    pub fn canonical_order() -> &'static [SignalKind] {
        &[
            Self::NewsReaction,
            Self::Momentum,
            Self::SpreadFilter,
            Self::RandomTrading,
        ]
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("sentiment classifier failed: {0}")]
    Classifier(String),

    #[error("invalid signal configuration: {0}")]
    InvalidConfig(String),
}

/// Read-only market state for one trading cycle.
pub struct MarketContext<'a> {
    pub date: NaiveDate,
    pub watchlist: &'a [String],
    pub prices: &'a PriceHistory,
    /// Headlines per symbol for the news window. Absent means none were found.
    pub headlines: &'a BTreeMap<String, Vec<String>>,
    /// Latest bid/ask spread per symbol. Absent means unknown.
    pub spreads: &'a BTreeMap<String, f64>,
    pub ledger: &'a TradeLedger,
    pub classifier: &'a dyn SentimentClassifier,
    pub seeds: &'a SeedHierarchy,
}

/// A strategy that proposes, overwrites or cancels plan entries.
pub trait SignalModule: Send + Sync {
    fn kind(&self) -> SignalKind;

    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Write this module's proposals into `plan`.
    ///
    /// On `Err` the module must not have modified entries for the symbols the
    /// error concerns; earlier writes for other symbols may stand.
    fn propose(
        &self,
        plan: &mut TradingPlan,
        ctx: &MarketContext<'_>,
        settings: &SignalSettings,
    ) -> Result<(), SignalError>;
}

pub fn create_signal(kind: SignalKind) -> Box<dyn SignalModule> {
    match kind {
        SignalKind::NewsReaction => Box::new(NewsReactionSignal),
        SignalKind::Momentum => Box::new(MomentumSignal),
        SignalKind::SpreadFilter => Box::new(SpreadFilterSignal),
        SignalKind::RandomTrading => Box::new(RandomSignal),
    }
}

/// Build modules in the configured priority order.
pub fn create_signals(order: &[SignalKind]) -> Vec<Box<dyn SignalModule>> {
    order.iter().copied().map(create_signal).collect()
}
