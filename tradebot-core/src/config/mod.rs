//! Bot configuration: TOML file layout, validation and runtime overrides.
//!
//! Secrets never live here; HTTP collaborators read them from the
//! environment when they are constructed.

pub mod registry;
pub mod signals;

pub use registry::ConfigRegistry;
pub use signals::{MomentumConfig, NewsConfig, RandomConfig, SignalSettings, SpreadConfig};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
    #[error("override must look like key=value, got '{0}'")]
    MalformedOverride(String),
}

/// The diversified default watchlist: tech, finance, healthcare, energy,
/// consumer goods, industrials.
pub const DEFAULT_WATCHLIST: &[&str] = &[
    "AAPL", "MSFT", "GOOG", "AMZN", "TSLA", // tech
    "JPM", "BAC", "HSBC", "GS", "V", // finance
    "PFE", "JNJ", "MRK", "GSK", "AZN", // healthcare
    "XOM", "CVX", "BP", "SHEL", "TTE", // energy
    "PG", "KO", "UL", // consumer goods
    "BA", "GE", // industrials
];

/// Trading-loop parameters (`[bot]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub watchlist: Vec<String>,
    /// Fraction of available cash allocated per cycle, in (0, 1].
    pub cash_at_risk: f64,
    /// Bars handed to the signal modules.
    pub price_lookback: usize,
    /// Bars handed to the portfolio optimizer.
    pub optimizer_lookback: usize,
    /// Headlines are fetched for `[date - news_window_days, date]`.
    pub news_window_days: i64,
    pub cadence_hours: u64,
    /// Master seed for the random module. Drawn at startup when absent.
    pub seed: Option<u64>,
    /// Only liquidate symbols whose last executed trade was a buy.
    pub gate_sells_on_last_buy: bool,
    pub risk_free_rate: f64,
    pub log_file: PathBuf,
    pub journal_file: PathBuf,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            cash_at_risk: 0.5,
            price_lookback: 30,
            optimizer_lookback: 100,
            news_window_days: 3,
            cadence_hours: 24,
            seed: None,
            gate_sells_on_last_buy: true,
            risk_free_rate: 0.02,
            log_file: PathBuf::from("logs/tradebot.log"),
            journal_file: PathBuf::from("logs/iterations.jsonl"),
        }
    }
}

impl TradingConfig {
    /// Lookback needed to serve both the signals and the optimizer.
    pub fn fetch_lookback(&self) -> usize {
        self.price_lookback.max(self.optimizer_lookback)
    }
}

/// Plan reviewer settings (`[reviewer]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewerConfig {
    pub enabled: bool,
    /// Azure OpenAI resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            deployment: String::new(),
            api_version: "2024-02-01".to_string(),
            max_tokens: 150,
            temperature: 0.5,
            timeout_secs: 30,
        }
    }
}

/// Sentiment classifier settings (`[sentiment]` table).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Hosted text-classification endpoint. `None` selects the neutral classifier.
    pub endpoint: Option<String>,
}

/// Brokerage and market data endpoints (`[alpaca]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlpacaConfig {
    pub trading_url: String,
    pub data_url: String,
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            trading_url: "https://paper-api.alpaca.markets".to_string(),
            data_url: "https://data.alpaca.markets".to_string(),
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub bot: TradingConfig,
    pub signals: SignalSettings,
    pub reviewer: ReviewerConfig,
    pub sentiment: SentimentConfig,
    pub alpaca: AlpacaConfig,
}

impl BotConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bot = &self.bot;
        if bot.watchlist.is_empty() {
            return Err(ConfigError::Invalid("bot.watchlist is empty".into()));
        }
        if !(bot.cash_at_risk > 0.0 && bot.cash_at_risk <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "bot.cash_at_risk must be in (0, 1], got {}",
                bot.cash_at_risk
            )));
        }
        if bot.price_lookback < 2 {
            return Err(ConfigError::Invalid(
                "bot.price_lookback must be at least 2".into(),
            ));
        }
        if bot.optimizer_lookback < 2 {
            return Err(ConfigError::Invalid(
                "bot.optimizer_lookback must be at least 2".into(),
            ));
        }
        if bot.news_window_days < 0 {
            return Err(ConfigError::Invalid(
                "bot.news_window_days must be >= 0".into(),
            ));
        }
        if bot.cadence_hours == 0 {
            return Err(ConfigError::Invalid("bot.cadence_hours must be > 0".into()));
        }
        self.signals.validate()?;
        if self.reviewer.enabled
            && (self.reviewer.endpoint.is_empty() || self.reviewer.deployment.is_empty())
        {
            return Err(ConfigError::Invalid(
                "reviewer.enabled requires reviewer.endpoint and reviewer.deployment".into(),
            ));
        }
        Ok(())
    }

    /// Apply a `key=value` override from the command line.
    ///
    /// Signal keys (`momentum.threshold`, ...) go through
    /// [`SignalSettings::set`]; a few `bot.*` and `reviewer.enabled` keys are
    /// handled here.
    pub fn apply_override(&mut self, assignment: &str) -> Result<(), ConfigError> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedOverride(assignment.to_string()))?;
        let key = key.trim();
        let mut next = self.clone();
        match key {
            "bot.cash_at_risk" => next.bot.cash_at_risk = signals::parse(key, value)?,
            "bot.price_lookback" => next.bot.price_lookback = signals::parse(key, value)?,
            "bot.optimizer_lookback" => {
                next.bot.optimizer_lookback = signals::parse(key, value)?
            }
            "bot.seed" => next.bot.seed = Some(signals::parse(key, value)?),
            "bot.gate_sells_on_last_buy" => {
                next.bot.gate_sells_on_last_buy = signals::parse(key, value)?
            }
            "bot.watchlist" => {
                next.bot.watchlist = value
                    .split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            }
            "reviewer.enabled" => next.reviewer.enabled = signals::parse(key, value)?,
            other => next.signals.set(other, value)?,
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalKind;

    #[test]
    fn empty_file_yields_defaults() {
        let config = BotConfig::from_toml_str("").unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.bot.watchlist.len(), 25);
        assert_eq!(config.signals.order, SignalKind::canonical_order().to_vec());
    }

    #[test]
    fn parses_partial_file() {
        let text = r#"
            [bot]
            watchlist = ["AAPL", "GOOG"]
            cash_at_risk = 0.25
            seed = 7

            [signals]
            order = ["momentum", "spread_filter"]

            [signals.spread]
            limit = 0.05
        "#;
        let config = BotConfig::from_toml_str(text).unwrap();
        assert_eq!(config.bot.watchlist, vec!["AAPL", "GOOG"]);
        assert_eq!(config.bot.cash_at_risk, 0.25);
        assert_eq!(config.bot.seed, Some(7));
        assert_eq!(
            config.signals.order,
            vec![SignalKind::Momentum, SignalKind::SpreadFilter]
        );
        assert_eq!(config.signals.spread.limit, 0.05);
        assert_eq!(config.signals.news.positive_threshold, 0.80);
    }

    #[test]
    fn rejects_out_of_range_cash_at_risk() {
        let err = BotConfig::from_toml_str("[bot]\ncash_at_risk = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(BotConfig::from_toml_str("[bot]\ncash_at_risk = 1.5\n").is_err());
        assert!(BotConfig::from_toml_str("[bot]\ncash_at_risk = 1.0\n").is_ok());
    }

    #[test]
    fn rejects_unknown_signal_kind() {
        let err = BotConfig::from_toml_str("[signals]\norder = [\"astrology\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn enabled_reviewer_needs_endpoint() {
        assert!(BotConfig::from_toml_str("[reviewer]\nenabled = true\n").is_err());
    }

    #[test]
    fn overrides_route_to_sections() {
        let mut config = BotConfig::default();
        config.apply_override("bot.cash_at_risk=0.1").unwrap();
        config.apply_override("momentum.threshold = 0.5").unwrap();
        config.apply_override("bot.watchlist=aapl, goog").unwrap();
        assert_eq!(config.bot.cash_at_risk, 0.1);
        assert_eq!(config.signals.momentum.threshold, 0.5);
        assert_eq!(config.bot.watchlist, vec!["AAPL", "GOOG"]);

        assert!(matches!(
            config.apply_override("no-equals-sign"),
            Err(ConfigError::MalformedOverride(_))
        ));
        assert!(config.apply_override("bot.cash_at_risk=2").is_err());
        assert_eq!(config.bot.cash_at_risk, 0.1);
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let mut config = BotConfig::default();
        config.bot.seed = Some(11);
        let text = config.to_toml().unwrap();
        assert_eq!(BotConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn fetch_lookback_covers_both_windows() {
        let config = TradingConfig::default();
        assert_eq!(config.fetch_lookback(), 100);
    }
}
