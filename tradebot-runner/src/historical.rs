//! Replay of loaded daily bars as a [`MarketData`] collaborator.
//!
//! A date cursor stands in for the clock. Everything the market reports is as
//! of the cursor: closes up to and including that day, that day's quote.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use tradebot_core::data::{DataError, MarketData};
use tradebot_core::domain::PriceHistory;

use crate::data_loader::{BarSet, DailyBar};

/// Hour (UTC) the replay clock reports for every trading day.
const CLOSE_HOUR_UTC: u32 = 20;

pub struct HistoricalMarket {
    bars: BarSet,
    calendar: Vec<NaiveDate>,
    cursor: Mutex<NaiveDate>,
}

impl HistoricalMarket {
    /// Returns `None` when no symbol has any bar.
    pub fn new(bars: BarSet) -> Option<Self> {
        let calendar: Vec<NaiveDate> = bars
            .values()
            .flat_map(|b| b.iter().map(|bar| bar.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let first = *calendar.first()?;
        Some(Self {
            bars,
            calendar,
            cursor: Mutex::new(first),
        })
    }

    /// Every date on which at least one symbol traded, ascending.
    pub fn calendar(&self) -> &[NaiveDate] {
        &self.calendar
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }

    pub fn date(&self) -> NaiveDate {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_date(&self, date: NaiveDate) {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = date;
    }

    /// Bars of `symbol` up to and including the cursor.
    fn visible(&self, symbol: &str) -> &[DailyBar] {
        let date = self.date();
        match self.bars.get(symbol) {
            Some(bars) => {
                let end = bars.partition_point(|b| b.date <= date);
                &bars[..end]
            }
            None => &[],
        }
    }

    /// Close of the latest visible bar.
    pub fn close(&self, symbol: &str) -> Option<f64> {
        self.visible(symbol).last().map(|b| b.close)
    }
}

impl MarketData for HistoricalMarket {
    fn name(&self) -> &str {
        "historical"
    }

    fn now(&self) -> Result<DateTime<Utc>, DataError> {
        let date = self.date();
        date.and_hms_opt(CLOSE_HOUR_UTC, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| DataError::Other(format!("invalid replay date {date}")))
    }

    fn last_price(&self, symbol: &str) -> Result<f64, DataError> {
        self.close(symbol).ok_or_else(|| DataError::NoData {
            symbol: symbol.to_string(),
        })
    }

    fn daily_closes(
        &self,
        symbols: &[String],
        lookback: usize,
    ) -> Result<PriceHistory, DataError> {
        let mut history = PriceHistory::new();
        for symbol in symbols {
            let visible = self.visible(symbol);
            if visible.is_empty() {
                continue;
            }
            let start = visible.len().saturating_sub(lookback);
            let closes: Vec<f64> = visible[start..].iter().map(|b| b.close).collect();
            history.insert(symbol.clone(), closes);
        }
        Ok(history)
    }

    /// Only a quote from the cursor day counts; stale quotes are not reused.
    fn spread(&self, symbol: &str) -> Result<Option<f64>, DataError> {
        let date = self.date();
        Ok(self
            .visible(symbol)
            .last()
            .filter(|b| b.date == date)
            .and_then(DailyBar::spread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> DailyBar {
        DailyBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            bid: Some(close - 0.01),
            ask: Some(close + 0.01),
        }
    }

    fn market() -> HistoricalMarket {
        let mut bars = BarSet::new();
        bars.insert("AAPL".into(), vec![bar(2, 10.0), bar(3, 11.0), bar(4, 12.0)]);
        bars.insert("GOOG".into(), vec![bar(3, 50.0)]);
        HistoricalMarket::new(bars).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn calendar_is_union_of_dates() {
        assert_eq!(market().calendar(), &[d(2), d(3), d(4)]);
    }

    #[test]
    fn nothing_after_cursor_is_visible() {
        let m = market();
        assert_eq!(m.date(), d(2));
        assert_eq!(m.last_price("AAPL").unwrap(), 10.0);
        assert!(m.last_price("GOOG").is_err());

        let closes = m.daily_closes(&["AAPL".into(), "GOOG".into()], 10).unwrap();
        assert_eq!(closes.len(), 1);

        m.set_date(d(4));
        let closes = m.daily_closes(&["AAPL".into()], 2).unwrap();
        assert_eq!(closes.get("AAPL").unwrap().closes(), &[11.0, 12.0]);
    }

    #[test]
    fn clock_reports_cursor_day() {
        let m = market();
        m.set_date(d(3));
        assert_eq!(m.now().unwrap().date_naive(), d(3));
    }

    #[test]
    fn stale_quote_is_not_a_spread() {
        let m = market();
        m.set_date(d(4));
        assert!(m.spread("AAPL").unwrap().is_some());
        assert_eq!(m.spread("GOOG").unwrap(), None);
    }

    #[test]
    fn empty_bar_set_has_no_market() {
        assert!(HistoricalMarket::new(BarSet::new()).is_none());
    }
}
