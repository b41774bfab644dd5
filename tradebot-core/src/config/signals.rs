//! Per-module signal parameters.
//!
//! Each signal module receives its parameters as an explicit argument; the
//! values here are plain data with defaults matching the production bot.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::signals::SignalKind;

/// Momentum module parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Dead band around zero: `|momentum|` must exceed this to produce a trade.
    pub threshold: f64,
    pub verbose: bool,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            verbose: false,
        }
    }
}

/// Random exploration module parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomConfig {
    pub buy_probability: f64,
    pub sell_probability: f64,
    pub min_quantity: u64,
    pub max_quantity: u64,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            buy_probability: 0.5,
            sell_probability: 0.5,
            min_quantity: 1,
            max_quantity: 10,
        }
    }
}

/// News sentiment module parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub positive_threshold: f64,
    pub negative_threshold: f64,
    pub verbose: bool,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            positive_threshold: 0.80,
            negative_threshold: 0.80,
            verbose: false,
        }
    }
}

/// Spread filter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadConfig {
    /// Maximum tolerated bid/ask spread; entries strictly above are cancelled.
    pub limit: f64,
    pub verbose: bool,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            limit: 0.02,
            verbose: false,
        }
    }
}

/// All signal parameters plus the module priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    /// Invocation order; later modules overwrite or cancel earlier entries.
    pub order: Vec<SignalKind>,
    pub momentum: MomentumConfig,
    pub random: RandomConfig,
    pub news: NewsConfig,
    pub spread: SpreadConfig,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            order: SignalKind::canonical_order().to_vec(),
            momentum: MomentumConfig::default(),
            random: RandomConfig::default(),
            news: NewsConfig::default(),
            spread: SpreadConfig::default(),
        }
    }
}

impl SignalSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, kind) in self.order.iter().enumerate() {
            if self.order[..i].contains(kind) {
                return Err(ConfigError::Invalid(format!(
                    "signal module '{kind}' listed twice in signals.order"
                )));
            }
        }

        non_negative("momentum.threshold", self.momentum.threshold)?;
        probability("random.buy_probability", self.random.buy_probability)?;
        probability("random.sell_probability", self.random.sell_probability)?;
        if self.random.min_quantity > self.random.max_quantity {
            return Err(ConfigError::Invalid(format!(
                "random.min_quantity ({}) exceeds random.max_quantity ({})",
                self.random.min_quantity, self.random.max_quantity
            )));
        }
        probability("news.positive_threshold", self.news.positive_threshold)?;
        probability("news.negative_threshold", self.news.negative_threshold)?;
        non_negative("spread.limit", self.spread.limit)?;
        Ok(())
    }

    /// Apply one `module.field = value` update.
    ///
    /// The result is validated before it is kept; on error `self` is unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut next = self.clone();
        match key {
            "momentum.threshold" => next.momentum.threshold = parse(key, value)?,
            "momentum.verbose" => next.momentum.verbose = parse(key, value)?,
            "random.buy_probability" => next.random.buy_probability = parse(key, value)?,
            "random.sell_probability" => next.random.sell_probability = parse(key, value)?,
            "random.min_quantity" => next.random.min_quantity = parse(key, value)?,
            "random.max_quantity" => next.random.max_quantity = parse(key, value)?,
            "news.positive_threshold" => next.news.positive_threshold = parse(key, value)?,
            "news.negative_threshold" => next.news.negative_threshold = parse(key, value)?,
            "news.verbose" => next.news.verbose = parse(key, value)?,
            "spread.limit" => next.spread.limit = parse(key, value)?,
            "spread.verbose" => next.spread.verbose = parse(key, value)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

pub(crate) fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn probability(key: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{key} must be in [0, 1], got {value}")))
    }
}

pub(crate) fn non_negative(key: &str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{key} must be >= 0, got {value}")))
    }
}
