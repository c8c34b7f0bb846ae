//! Integration tests for the FX rate pipeline
//!
//! Feed parsing, dense table construction, windowing and CSV export together.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use rusty_intrastat::error::IntrastatError;
use rusty_intrastat::fx::{
    build_dense_table, parse_ecb_xml, rates_from_xml, read_observations_csv, RateObservation,
    RateWindow,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn obs(date: &str, currency: &str, rate: &str) -> RateObservation {
    RateObservation::parse(date, currency, rate).unwrap()
}

/// Two weeks around new year: the ECB skips weekends and 2023-01-01 is a Sunday
const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gesmes:Envelope xmlns:gesmes="http://www.gesmes.org/xml/2002-08-01" xmlns="http://www.ecb.int/vocabulary/2002-08-01/eurofxref">
  <gesmes:subject>Reference rates</gesmes:subject>
  <gesmes:Sender><gesmes:name>European Central Bank</gesmes:name></gesmes:Sender>
  <Cube>
    <Cube time="2023-01-06"><Cube currency="USD" rate="1.0500"/><Cube currency="SEK" rate="11.2535"/></Cube>
    <Cube time="2023-01-05"><Cube currency="USD" rate="1.0599"/><Cube currency="SEK" rate="11.2270"/></Cube>
    <Cube time="2023-01-04"><Cube currency="USD" rate="1.0615"/><Cube currency="SEK" rate="11.1870"/></Cube>
    <Cube time="2023-01-03"><Cube currency="USD" rate="1.0545"/><Cube currency="SEK" rate="11.2060"/></Cube>
    <Cube time="2023-01-02"><Cube currency="USD" rate="1.0683"/><Cube currency="SEK" rate="11.1218"/></Cube>
    <Cube time="2022-12-30"><Cube currency="USD" rate="1.0666"/><Cube currency="SEK" rate="11.1218"/></Cube>
    <Cube time="2022-12-29"><Cube currency="USD" rate="1.0649"/><Cube currency="SEK" rate="11.1045"/></Cube>
  </Cube>
</gesmes:Envelope>"#;

#[test]
fn test_feed_to_dense_table() {
    let observations = parse_ecb_xml(FEED).unwrap();
    assert_eq!(observations.len(), 14);

    let table = build_dense_table(&observations).unwrap();

    // 2022-12-29 ..= 2023-01-06
    assert_eq!(table.len(), 9);
    assert_eq!(table.currencies(), ["SEK".to_string(), "USD".to_string()]);
    assert_eq!(table.max_date(), Some(d(2023, 1, 6)));
    assert_eq!(table.min_date(), Some(d(2022, 12, 29)));

    // Weekend carries Friday's quote
    assert_relative_eq!(table.get(d(2022, 12, 31), "USD").unwrap(), 1.0666);
    assert_relative_eq!(table.get(d(2023, 1, 1), "USD").unwrap(), 1.0666);
    assert_relative_eq!(table.get(d(2023, 1, 2), "USD").unwrap(), 1.0683);
}

#[test]
fn test_window_selection() {
    let window = RateWindow::resolve(Some(d(2022, 12, 31)), Some(d(2023, 1, 2)), d(2023, 6, 1))
        .unwrap();
    let table = rates_from_xml(FEED, window).unwrap();

    let dates: Vec<_> = table.dates().collect();
    assert_eq!(dates, vec![d(2023, 1, 2), d(2023, 1, 1), d(2022, 12, 31)]);
}

#[test]
fn test_window_outside_feed_is_empty() {
    let window = RateWindow::resolve(Some(d(2020, 1, 1)), Some(d(2020, 12, 31)), d(2023, 6, 1))
        .unwrap();
    let table = rates_from_xml(FEED, window).unwrap();
    assert!(table.is_empty());
    assert_eq!(table.max_date(), None);
}

#[test]
fn test_new_year_scenario() {
    let table = build_dense_table(&[
        obs("2022-12-30", "EUR", "1.00"),
        obs("2023-01-06", "EUR", "1.00"),
    ])
    .unwrap();

    let dates: Vec<_> = table.dates().collect();
    let expected: Vec<_> = (0..8).map(|i| d(2023, 1, 6) - chrono::Duration::days(i)).collect();
    assert_eq!(dates, expected);
    assert!(table.rows().iter().all(|row| row.values() == [Some(1.0)]));
}

#[test]
fn test_missing_sek_forward_filled() {
    let table = build_dense_table(&[
        obs("2023-01-01", "USD", "1.07"),
        obs("2023-01-01", "SEK", "11.10"),
        obs("2023-01-02", "USD", "1.08"),
        obs("2023-01-03", "USD", "1.09"),
        obs("2023-01-03", "SEK", "11.30"),
    ])
    .unwrap();

    // Carried forward, not interpolated to 11.20
    assert_relative_eq!(table.rate_on(d(2023, 1, 2), "SEK").unwrap(), 11.10);
}

#[test]
fn test_empty_observations() {
    assert!(matches!(
        build_dense_table(&[]),
        Err(IntrastatError::MissingDataError(_))
    ));
    // A feed without quotes reaches the builder as an empty list
    let observations = parse_ecb_xml("<Cube></Cube>").unwrap();
    assert!(matches!(
        build_dense_table(&observations),
        Err(IntrastatError::MissingDataError(_))
    ));
}

#[test]
fn test_reserved_date_column() {
    let date = d(2023, 1, 2);
    assert!(matches!(
        RateObservation::new(date, "Date", 1.0),
        Err(IntrastatError::SchemaError(_))
    ));
    assert!(matches!(
        RateObservation::new(date, "DATE", 1.0),
        Err(IntrastatError::SchemaError(_))
    ));
}

#[test]
fn test_csv_round_trip_through_pivot() {
    let input = "Date,Currency,Rate\n\
                 2023-01-03,SEK,11.2060\n\
                 2023-01-02,SEK,11.1218\n\
                 2023-01-02,USD,1.0683\n";
    let observations = read_observations_csv(input.as_bytes()).unwrap();
    let table = build_dense_table(&observations).unwrap();

    assert_eq!(
        table.to_csv_string().unwrap(),
        "Date,SEK,USD\n2023-01-03,11.206,1.0683\n2023-01-02,11.1218,1.0683\n"
    );
}

#[test]
fn test_idempotent() {
    let observations = parse_ecb_xml(FEED).unwrap();
    let first = build_dense_table(&observations).unwrap();
    let second = build_dense_table(&observations).unwrap();
    assert_eq!(first, second);
}
