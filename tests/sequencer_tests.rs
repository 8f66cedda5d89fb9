// Integration tests for coverage checks and event sequencing

mod common;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

use common::{depth, request, t, ticker, trade, EXCHANGE};
use market_replay::{
    DataKind, EnabledKinds, EventPayload, EventSequencer, JsonlLoader, LoadRequest, MemoryLoader,
    ReplayError, Side, TimeRange,
};

fn tickers_only() -> EnabledKinds {
    EnabledKinds {
        ticker: true,
        ..Default::default()
    }
}

#[test]
fn test_missing_instrument_is_rejected() {
    let loader = MemoryLoader::new().with_tickers(
        EXCHANGE,
        "btc_usdt",
        vec![ticker(0, dec!(100)), ticker(100, dec!(100))],
    );
    let req = request(&["btc_usdt", "eth_usdt"], 0, 100, tickers_only());

    let err = EventSequencer::new(&loader).build(&req).unwrap_err();
    assert!(
        matches!(err, ReplayError::CoverageMissing { ref inst_id, kind: DataKind::Ticker, .. } if inst_id == "eth_usdt"),
        "unexpected error: {}",
        err
    );
    assert_eq!(err.category(), "load");
}

#[test]
fn test_short_coverage_is_rejected() {
    let loader = MemoryLoader::new().with_tickers(
        EXCHANGE,
        "btc_usdt",
        vec![ticker(10, dec!(100)), ticker(50, dec!(100))],
    );
    let req = request(&["btc_usdt"], 0, 100, tickers_only());

    match EventSequencer::new(&loader).build(&req) {
        Err(ReplayError::CoverageInsufficient {
            available,
            requested,
            ..
        }) => {
            assert_eq!(available, TimeRange::new(t(10), t(50)));
            assert_eq!(requested, req.range);
        }
        other => panic!("expected insufficient coverage, got {:?}", other.map(|s| s.len())),
    }
}

#[test]
fn test_undeterminable_range_is_rejected() {
    let mut loader = MemoryLoader::new();
    loader.insert(EXCHANGE, "btc_usdt", DataKind::Ticker, Vec::new());
    let req = request(&["btc_usdt"], 0, 100, tickers_only());

    let err = EventSequencer::new(&loader).build(&req).unwrap_err();
    assert!(matches!(err, ReplayError::CoverageUnknown { .. }), "unexpected error: {}", err);
}

#[test]
fn test_unknown_kline_interval_is_rejected() {
    let loader = MemoryLoader::new().with_tickers(
        EXCHANGE,
        "btc_usdt",
        vec![ticker(0, dec!(100)), ticker(100, dec!(100))],
    );
    let mut req = request(
        &["btc_usdt"],
        0,
        100,
        EnabledKinds {
            ticker: true,
            kline: true,
            ..Default::default()
        },
    );
    req.kline_interval_sec = Some(60);

    let err = EventSequencer::new(&loader).build(&req).unwrap_err();
    assert!(
        matches!(err, ReplayError::InvalidKlineInterval { interval_sec: 60, .. }),
        "unexpected error: {}",
        err
    );
}

#[test]
fn test_klines_without_interval_are_rejected() {
    let loader = MemoryLoader::new().with_tickers(
        EXCHANGE,
        "btc_usdt",
        vec![ticker(0, dec!(100)), ticker(50, dec!(101)), ticker(100, dec!(102))],
    );
    let req = request(
        &["btc_usdt"],
        0,
        100,
        EnabledKinds {
            ticker: true,
            kline: true,
            ..Default::default()
        },
    );
    assert_eq!(req.kline_interval_sec, None);

    let err = EventSequencer::new(&loader).build(&req).unwrap_err();
    assert!(
        matches!(err, ReplayError::MissingKlineInterval { ref exchange } if exchange == EXCHANGE),
        "unexpected error: {}",
        err
    );
    assert_eq!(err.category(), "load");
}

#[test]
fn test_empty_window_is_no_data() {
    let loader = MemoryLoader::new()
        .with_tickers(EXCHANGE, "btc_usdt", vec![ticker(500, dec!(100))])
        .with_range(
            EXCHANGE,
            "btc_usdt",
            DataKind::Ticker,
            TimeRange::new(t(0), t(1000)),
        );
    let req = request(&["btc_usdt"], 0, 100, tickers_only());

    let err = EventSequencer::new(&loader).build(&req).unwrap_err();
    assert!(matches!(err, ReplayError::NoData { .. }), "unexpected error: {}", err);
}

#[test]
fn test_events_are_time_ordered_with_stable_ties() {
    let loader = MemoryLoader::new()
        .with_tickers(
            EXCHANGE,
            "btc_usdt",
            vec![ticker(0, dec!(100)), ticker(20, dec!(101)), ticker(100, dec!(102))],
        )
        .with_tickers(
            EXCHANGE,
            "eth_usdt",
            vec![ticker(0, dec!(10)), ticker(100, dec!(11))],
        )
        .with_trades(
            EXCHANGE,
            "btc_usdt",
            vec![trade(0, dec!(100), dec!(1), Side::Buy), trade(100, dec!(102), dec!(1), Side::Sell)],
        )
        .with_trades(
            EXCHANGE,
            "eth_usdt",
            vec![
                trade(0, dec!(10), dec!(1), Side::Buy),
                trade(20, dec!(10.5), dec!(1), Side::Buy),
                trade(100, dec!(11), dec!(1), Side::Sell),
            ],
        );
    let req = request(
        &["btc_usdt", "eth_usdt"],
        0,
        100,
        EnabledKinds {
            ticker: true,
            trades: true,
            ..Default::default()
        },
    );

    let stream = EventSequencer::new(&loader).build(&req).unwrap();
    assert_eq!(stream.len(), 10);
    assert!(stream.events.windows(2).all(|w| w[0].time <= w[1].time));
    assert_eq!(stream.span(), Some(TimeRange::new(t(0), t(100))));

    // Equal timestamps: tickers before trades, then registry order
    let at_zero: Vec<(&str, usize)> = stream
        .events
        .iter()
        .filter(|e| e.time == t(0))
        .map(|e| (e.payload.variant_name(), e.inst_index))
        .collect();
    let ticker_name = EventPayload::Ticker(ticker(0, dec!(1))).variant_name();
    let trade_name = EventPayload::Trade(trade(0, dec!(1), dec!(1), Side::Buy)).variant_name();
    assert_eq!(
        at_zero,
        vec![(ticker_name, 0), (ticker_name, 1), (trade_name, 0), (trade_name, 1)]
    );

    let at_twenty: Vec<&str> = stream
        .events
        .iter()
        .filter(|e| e.time == t(20))
        .map(|e| e.payload.variant_name())
        .collect();
    assert_eq!(at_twenty, vec![ticker_name, trade_name]);
}

#[test]
fn test_progress_is_weighted_and_monotonic() {
    let book = |ms| depth(ms, &[(dec!(101), dec!(1))], &[(dec!(99), dec!(1))]);
    let loader = MemoryLoader::new()
        .with_tickers(EXCHANGE, "btc_usdt", vec![ticker(0, dec!(100)), ticker(100, dec!(100))])
        .with_tickers(EXCHANGE, "eth_usdt", vec![ticker(0, dec!(10)), ticker(100, dec!(10))])
        .with_depths(EXCHANGE, "btc_usdt", vec![book(0), book(100)])
        .with_depths(EXCHANGE, "eth_usdt", vec![book(0), book(100)]);
    let req = request(
        &["btc_usdt", "eth_usdt"],
        0,
        100,
        EnabledKinds {
            ticker: true,
            depth: true,
            ..Default::default()
        },
    );

    let expected_total = EventSequencer::total_weight(&req);
    assert_eq!(expected_total, 9.0);

    let mut calls: Vec<(f64, f64)> = Vec::new();
    let stream = EventSequencer::new(&loader)
        .build_with_progress(&req, &mut |done, total| calls.push((done, total)))
        .unwrap();
    assert_eq!(stream.len(), 8);

    assert!(calls.iter().all(|&(_, total)| total == expected_total));
    assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(calls.last().copied(), Some((9.0, 9.0)));
    // Two tickers (1 each) then two depth loads (3 each)
    assert!(calls.contains(&(1.0, 9.0)));
    assert!(calls.contains(&(2.0, 9.0)));
    assert!(calls.contains(&(5.0, 9.0)));
    assert!(calls.contains(&(8.0, 9.0)));
}

fn write_day(dir: &Path, day: &str, lines: &[String]) {
    fs::create_dir_all(dir).unwrap();
    let mut file = fs::File::create(dir.join(format!("{}.jsonl", day))).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
}

#[test]
fn test_jsonl_tree_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let day1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let day2 = day1 + Duration::days(1);
    let ms = |d: chrono::DateTime<Utc>, minutes: i64| (d + Duration::minutes(minutes)).timestamp_millis();

    let ticker_line = |time: i64, price: &str| {
        format!(
            r#"{{"time":{},"price":"{}","best_bid":"{}","best_ask":"{}"}}"#,
            time, price, price, price
        )
    };
    let trade_line = |time: i64, price: &str, side: &str| {
        format!(
            r#"{{"time":{},"price":"{}","size":"0.5","side":"{}"}}"#,
            time, price, side
        )
    };

    let ticker_dir = tmp.path().join("tickers/okx/btc_usdt_swap");
    write_day(
        &ticker_dir,
        "2024-01-01",
        &[ticker_line(ms(day1, 0), "42000"), ticker_line(ms(day1, 30), "42100")],
    );
    write_day(&ticker_dir, "2024-01-02", &[ticker_line(ms(day2, 15), "42200")]);

    let trade_dir = tmp.path().join("trades/okx/btc_usdt_swap");
    write_day(&trade_dir, "2024-01-01", &[trade_line(ms(day1, 10), "42050", "buy")]);
    write_day(
        &trade_dir,
        "2024-01-02",
        &[trade_line(ms(day2, 5), "42150", "sell"), trade_line(ms(day2, 15), "42200", "buy")],
    );

    let loader = JsonlLoader::new(tmp.path());
    let req = LoadRequest {
        exchange: "okx".to_string(),
        inst_ids: vec!["btc_usdt_swap".to_string()],
        range: TimeRange::new(day1, day2 + Duration::hours(12)),
        kinds: EnabledKinds {
            ticker: true,
            trades: true,
            ..Default::default()
        },
        kline_interval_sec: None,
    };

    let mut last = (0.0, 0.0);
    let stream = EventSequencer::new(&loader)
        .build_with_progress(&req, &mut |done, total| last = (done, total))
        .unwrap();

    assert_eq!(last, (3.0, 3.0));
    assert_eq!(stream.len(), 6);
    let times: Vec<i64> = stream.events.iter().map(|e| e.time.timestamp_millis()).collect();
    assert_eq!(
        times,
        vec![
            ms(day1, 0),
            ms(day1, 10),
            ms(day1, 30),
            ms(day2, 5),
            ms(day2, 15),
            ms(day2, 15),
        ]
    );
    // Tie at day2 + 15m: ticker loaded first
    assert!(matches!(stream.events[4].payload, EventPayload::Ticker(_)));
    assert!(matches!(stream.events[5].payload, EventPayload::Trade(_)));
}

#[test]
fn test_jsonl_request_beyond_files_is_insufficient() {
    let tmp = TempDir::new().unwrap();
    let day1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    write_day(
        &tmp.path().join("tickers/okx/btc_usdt"),
        "2024-01-01",
        &[format!(
            r#"{{"time":{},"price":"1","best_bid":"1","best_ask":"1"}}"#,
            day1.timestamp_millis()
        )],
    );

    let loader = JsonlLoader::new(tmp.path());
    let mut req = request(&["btc_usdt"], 0, 0, tickers_only());
    req.range = TimeRange::new(day1, day1 + Duration::days(2));

    let err = EventSequencer::new(&loader).build(&req).unwrap_err();
    assert!(matches!(err, ReplayError::CoverageInsufficient { .. }), "unexpected error: {}", err);
}
