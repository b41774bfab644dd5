//! Recorded headlines for backtests, one JSON object per line:
//! `{"date":"2024-01-02","symbol":"AAPL","headline":"..."}`.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tradebot_core::data::{DataError, NewsProvider};

use crate::RunError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedHeadline {
    pub date: NaiveDate,
    pub symbol: String,
    pub headline: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewsArchive {
    items: Vec<ArchivedHeadline>,
}

impl NewsArchive {
    /// No headlines at all; every symbol reads as neutral.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<ArchivedHeadline>) -> Self {
        Self { items }
    }

    /// Load a JSONL archive. Blank lines are skipped; a malformed line is an
    /// error naming its line number.
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let text = fs::read_to_string(path).map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut items = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let item: ArchivedHeadline = serde_json::from_str(line).map_err(|e| RunError::NewsArchive {
                line: i + 1,
                reason: e.to_string(),
            })?;
            items.push(item);
        }
        tracing::info!(path = %path.display(), headlines = items.len(), "news archive loaded");
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl NewsProvider for NewsArchive {
    fn name(&self) -> &str {
        "archive"
    }

    fn headlines(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, DataError> {
        Ok(self
            .items
            .iter()
            .filter(|h| h.symbol == symbol && h.date >= start && h.date <= end)
            .map(|h| h.headline.clone())
            .collect())
    }
}
