//! Headline sentiment reaction.

use crate::config::SignalSettings;
use crate::data::SentimentLabel;
use crate::domain::{Action, TradingPlan};

use super::{symbol_log, MarketContext, SignalError, SignalKind, SignalModule};

/// Buys on confidently positive news, sells on confidently negative news.
///
/// Both comparisons are strict: a probability exactly at the threshold does
/// nothing. Symbols without headlines are skipped. A classifier failure skips
/// that symbol; the module only fails when every classification failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewsReactionSignal;

impl SignalModule for NewsReactionSignal {
    fn kind(&self) -> SignalKind {
        SignalKind::NewsReaction
    }

    fn propose(
        &self,
        plan: &mut TradingPlan,
        ctx: &MarketContext<'_>,
        settings: &SignalSettings,
    ) -> Result<(), SignalError> {
        let config = &settings.news;
        let mut attempted = 0usize;
        let mut failed = 0usize;
        let mut last_failure = String::new();

        for symbol in ctx.watchlist {
            let Some(headlines) = ctx.headlines.get(symbol).filter(|h| !h.is_empty()) else {
                symbol_log!(config.verbose, %symbol, "no headlines");
                continue;
            };

            attempted += 1;
            let estimate = match ctx.classifier.estimate(headlines) {
                Ok(estimate) => estimate,
                Err(e) => {
                    tracing::warn!(%symbol, error = %e, "sentiment classification failed");
                    failed += 1;
                    last_failure = format!("{symbol}: {e}");
                    continue;
                }
            };
            symbol_log!(
                config.verbose,
                %symbol,
                headlines = headlines.len(),
                label = %estimate.label,
                probability = estimate.probability,
                "sentiment estimate"
            );

            let action = match estimate.label {
                SentimentLabel::Positive if estimate.probability > config.positive_threshold => {
                    Action::buy()
                }
                SentimentLabel::Negative if estimate.probability > config.negative_threshold => {
                    Action::sell()
                }
                _ => continue,
            };
            plan.propose(symbol.clone(), action);
        }

        if attempted > 0 && failed == attempted {
            return Err(SignalError::Classifier(format!(
                "all {failed} classifications failed, last {last_failure}"
            )));
        }
        Ok(())
    }
}
