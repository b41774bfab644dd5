//! Integration tests for the live scheduler against in-memory replay
//! collaborators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use tradebot_core::config::{ConfigRegistry, SignalSettings, TradingConfig};
use tradebot_core::data::NeutralClassifier;
use tradebot_core::engine::{Collaborators, TradingIterationController};
use tradebot_core::optimizer::MaxSharpeOptimizer;
use tradebot_core::rng::SeedHierarchy;
use tradebot_core::signals::SignalKind;
use tradebot_runner::{
    BarSet, DailyBar, HistoricalMarket, IterationJournal, NewsArchive, PaperBroker, Scheduler,
};

fn controller() -> TradingIterationController {
    let bar = |day, close| DailyBar {
        date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 10.0,
        bid: None,
        ask: None,
    };
    let mut bars = BarSet::new();
    bars.insert("AAPL".into(), vec![bar(1, 10.0), bar(4, 11.0)]);
    let market = Arc::new(HistoricalMarket::new(bars).unwrap());
    market.set_date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    let broker = Arc::new(PaperBroker::new(market.clone(), 1_000.0));

    let config = TradingConfig {
        watchlist: vec!["AAPL".into()],
        ..TradingConfig::default()
    };
    let settings = SignalSettings {
        order: vec![SignalKind::Momentum],
        ..SignalSettings::default()
    };
    TradingIterationController::new(
        config,
        Arc::new(ConfigRegistry::new(settings)),
        Collaborators {
            market,
            news: Arc::new(NewsArchive::empty()),
            classifier: Arc::new(NeutralClassifier),
            broker,
            optimizer: Arc::new(MaxSharpeOptimizer::default()),
        },
        SeedHierarchy::new(3),
    )
}

#[test]
fn runs_requested_number_of_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let journal = IterationJournal::new(dir.path().join("journal.jsonl"));
    let mut controller = controller();
    let cancel = AtomicBool::new(false);

    let cycles = Scheduler::new(Duration::from_millis(5))
        .with_max_cycles(3)
        .run(&mut controller, &cancel, |report| journal.append(report).unwrap());

    assert_eq!(cycles, 3);
    let reports = journal.read_all().unwrap();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| !r.is_aborted()));
}

#[test]
fn cancelled_before_start_runs_nothing() {
    let mut controller = controller();
    let cancel = AtomicBool::new(true);
    let mut seen = 0;
    let cycles = Scheduler::new(Duration::from_millis(1)).run(&mut controller, &cancel, |_| seen += 1);
    assert_eq!(cycles, 0);
    assert_eq!(seen, 0);
}

#[test]
fn cancel_during_wait_stops_before_next_cycle() {
    let mut controller = controller();
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::Relaxed);
    });

    let started = Instant::now();
    let cycles = Scheduler::new(Duration::from_secs(3600))
        .with_poll_interval(Duration::from_millis(5))
        .run(&mut controller, &cancel, |_| {});
    canceller.join().unwrap();

    assert_eq!(cycles, 1);
    assert!(started.elapsed() < Duration::from_secs(60));
}
