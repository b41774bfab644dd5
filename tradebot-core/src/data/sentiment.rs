//! Headline sentiment: the estimate type, a neutral fallback, and a client for
//! a hosted text-classification model (FinBERT-style labels).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DataError, SentimentClassifier};

/// Categorical sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        })
    }
}

/// Classifier output for a batch of headlines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentEstimate {
    /// Confidence in `label`, in [0, 1].
    pub probability: f64,
    pub label: SentimentLabel,
}

impl SentimentEstimate {
    pub fn new(probability: f64, label: SentimentLabel) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
            label,
        }
    }

    /// What the bot assumes when there is nothing to classify.
    pub fn neutral() -> Self {
        Self {
            probability: 0.0,
            label: SentimentLabel::Neutral,
        }
    }
}

/// Classifier that always answers neutral. Used when no model is configured.
#[derive(Debug, Clone, Default)]
pub struct NeutralClassifier;

impl SentimentClassifier for NeutralClassifier {
    fn name(&self) -> &str {
        "neutral"
    }

    fn estimate(&self, _headlines: &[String]) -> Result<SentimentEstimate, DataError> {
        Ok(SentimentEstimate::neutral())
    }
}

/// One label score in a classification response.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Combine per-headline label scores into one estimate.
///
/// Scores are averaged per label across headlines; the label with the highest
/// mean wins and its mean is the probability. Ties resolve in
/// positive → negative → neutral order. Unknown labels are ignored.
pub fn combine_scores(per_headline: &[Vec<LabelScore>]) -> Result<SentimentEstimate, DataError> {
    if per_headline.is_empty() {
        return Ok(SentimentEstimate::neutral());
    }

    let mut totals: BTreeMap<SentimentLabel, f64> = BTreeMap::new();
    for scores in per_headline {
        for s in scores {
            if let Some(label) = SentimentLabel::parse(&s.label) {
                *totals.entry(label).or_insert(0.0) += s.score;
            }
        }
    }
    if totals.is_empty() {
        return Err(DataError::ResponseFormatChanged(
            "classifier returned no recognised labels".into(),
        ));
    }

    let n = per_headline.len() as f64;
    let (label, total) = totals
        .into_iter()
        .fold(None, |best: Option<(SentimentLabel, f64)>, (label, total)| {
            match best {
                Some((_, best_total)) if best_total >= total => best,
                _ => Some((label, total)),
            }
        })
        .ok_or_else(|| DataError::Other("empty label totals".into()))?;

    Ok(SentimentEstimate::new(total / n, label))
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a [String],
    options: ClassifyOptions,
}

#[derive(Debug, Serialize)]
struct ClassifyOptions {
    wait_for_model: bool,
}

/// Client for a hosted text-classification endpoint.
///
/// Sends all headlines in one request and expects one list of label scores
/// per headline back.
pub struct HostedSentimentClassifier {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: Option<String>,
}

impl HostedSentimentClassifier {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    /// Read the API token from `SENTIMENT_API_TOKEN` when set.
    pub fn from_env(endpoint: impl Into<String>) -> Result<Self, DataError> {
        Self::new(endpoint, std::env::var("SENTIMENT_API_TOKEN").ok())
    }
}

impl SentimentClassifier for HostedSentimentClassifier {
    fn name(&self) -> &str {
        "hosted"
    }

    fn estimate(&self, headlines: &[String]) -> Result<SentimentEstimate, DataError> {
        if headlines.is_empty() {
            return Ok(SentimentEstimate::neutral());
        }

        let mut request = self.client.post(&self.endpoint).json(&ClassifyRequest {
            inputs: headlines,
            options: ClassifyOptions {
                wait_for_model: true,
            },
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::AuthenticationRequired(format!(
                "sentiment endpoint returned {status}"
            )));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                retry_after_secs: 60,
            });
        }
        if !status.is_success() {
            return Err(DataError::Other(format!(
                "sentiment endpoint returned {status}"
            )));
        }

        let scores: Vec<Vec<LabelScore>> = response
            .json()
            .map_err(|e| DataError::ResponseFormatChanged(e.to_string()))?;
        combine_scores(&scores)
    }
}
