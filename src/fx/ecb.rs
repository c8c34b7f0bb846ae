//! European Central Bank reference rate feed
//!
//! The ECB publishes euro reference rates as nested `Cube` elements:
//!
//! ```xml
//! <Cube>
//!   <Cube time="2023-01-06">
//!     <Cube currency="USD" rate="1.0500"/>
//!     <Cube currency="SEK" rate="11.2535"/>
//!   </Cube>
//! </Cube>
//! ```
//!
//! A dated cube supplies the date for every quote nested inside it.

use super::dense::{build_dense_table, RateTable};
use super::observation::{RateObservation, DATE_FORMAT};
use crate::error::{IntrastatError, Result};
use chrono::{Months, NaiveDate};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Full history of euro reference rates since 1999
pub const ECB_HIST_URL: &str = "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-hist.xml";

/// Rates from the last 90 days
pub const ECB_90D_URL: &str = "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-hist-90d.xml";

const CUBE: &[u8] = b"Cube";

#[derive(Debug, Default)]
struct CubeAttrs {
    time: Option<String>,
    currency: Option<String>,
    rate: Option<String>,
}

fn cube_attrs(element: &BytesStart) -> Result<CubeAttrs> {
    let mut attrs = CubeAttrs::default();
    for attr in element.attributes() {
        let attr = attr
            .map_err(|e| IntrastatError::ParseError(format!("Malformed Cube attribute: {}", e)))?;
        let value = std::str::from_utf8(&attr.value)
            .map_err(|e| IntrastatError::ParseError(format!("Cube attribute is not UTF-8: {}", e)))?
            .trim()
            .to_string();
        match attr.key.local_name().as_ref() {
            b"time" => attrs.time = Some(value),
            b"currency" => attrs.currency = Some(value),
            b"rate" => attrs.rate = Some(value),
            _ => {}
        }
    }
    Ok(attrs)
}

/// Handle one `Cube` element. Returns the date if the cube is a dated container.
fn visit_cube(
    attrs: CubeAttrs,
    current_date: Option<NaiveDate>,
    observations: &mut Vec<RateObservation>,
) -> Result<Option<NaiveDate>> {
    if let Some(time) = attrs.time {
        let date = NaiveDate::parse_from_str(&time, DATE_FORMAT).map_err(|e| {
            IntrastatError::SchemaError(format!("Invalid Cube time '{}': {}", time, e))
        })?;
        return Ok(Some(date));
    }

    match (attrs.currency, attrs.rate) {
        (Some(currency), Some(rate)) => {
            let date = current_date.ok_or_else(|| {
                IntrastatError::SchemaError(format!(
                    "Quote for {} is not nested in a dated Cube",
                    currency
                ))
            })?;
            let rate: f64 = rate.parse().map_err(|_| {
                IntrastatError::SchemaError(format!(
                    "Rate '{}' for {} on {} is not numeric",
                    rate, currency, date
                ))
            })?;
            observations.push(RateObservation::new(date, currency, rate)?);
        }
        (Some(currency), None) => {
            return Err(IntrastatError::SchemaError(format!(
                "Quote for {} has no rate",
                currency
            )))
        }
        (None, Some(rate)) => {
            return Err(IntrastatError::SchemaError(format!(
                "Rate {} has no currency",
                rate
            )))
        }
        (None, None) => {}
    }
    Ok(None)
}

/// Parse the ECB XML feed into observations, in document order
pub fn parse_ecb_xml(xml: &str) -> Result<Vec<RateObservation>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut observations = Vec::new();
    let mut current_date: Option<NaiveDate> = None;
    // One entry per open Cube: whether it set the current date
    let mut open_cubes: Vec<bool> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == CUBE => {
                let dated = visit_cube(cube_attrs(&e)?, current_date, &mut observations)?;
                if let Some(date) = dated {
                    current_date = Some(date);
                }
                open_cubes.push(dated.is_some());
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == CUBE => {
                visit_cube(cube_attrs(&e)?, current_date, &mut observations)?;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == CUBE => {
                if open_cubes.pop().unwrap_or(false) {
                    current_date = None;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(IntrastatError::ParseError(format!(
                    "Xml data parsing failed at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    log::debug!("Parsed {} ECB rate observations", observations.len());
    Ok(observations)
}

/// Inclusive date window applied to a rate table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl RateWindow {
    /// Fill in missing bounds: `end` defaults to `today`, `start` to a year before `end`
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self> {
        let end = end.unwrap_or(today);
        let start = match start {
            Some(start) => start,
            None => end.checked_sub_months(Months::new(12)).ok_or_else(|| {
                IntrastatError::InvalidData(format!("Cannot go back a year from {}", end))
            })?,
        };

        if start > end {
            return Err(IntrastatError::InvalidData(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }

        Ok(Self { start, end })
    }

    pub fn apply(&self, table: &RateTable) -> RateTable {
        table.between(self.start, self.end)
    }
}

/// Parse a `YYYY-MM-DD` date given on the command line or in a config file
pub fn parse_date_arg(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        IntrastatError::InvalidData(format!(
            "Dates must be provided in YYYY-MM-DD format, got '{}'",
            value
        ))
    })
}

/// Parse a feed document and build the dense table for a window
pub fn rates_from_xml(xml: &str, window: RateWindow) -> Result<RateTable> {
    let observations = parse_ecb_xml(xml)?;
    let table = build_dense_table(&observations)?;
    Ok(window.apply(&table))
}

#[cfg(feature = "async")]
pub use client::EcbClient;

#[cfg(feature = "async")]
mod client {
    use super::*;
    use crate::config::HttpSettings;
    use crate::http;
    use reqwest::Client;

    /// Downloads the ECB feed
    pub struct EcbClient {
        client: Client,
        url: String,
    }

    impl EcbClient {
        pub fn new(settings: &HttpSettings, url: impl Into<String>) -> Result<Self> {
            Ok(Self {
                client: http::build_client(settings)?,
                url: url.into(),
            })
        }

        pub fn url(&self) -> &str {
            &self.url
        }

        /// Download the feed document
        pub async fn fetch_xml(&self) -> Result<String> {
            let (status, body) = http::get_text(&self.client, &self.url).await?;
            match status {
                200 => Ok(body),
                404 => Err(IntrastatError::HttpError(format!(
                    "Requested fx rate url is invalid: {}",
                    self.url
                ))),
                other => Err(IntrastatError::HttpError(format!(
                    "ECB feed returned status {}",
                    other
                ))),
            }
        }

        pub async fn fetch_observations(&self) -> Result<Vec<RateObservation>> {
            let xml = self.fetch_xml().await?;
            parse_ecb_xml(&xml)
        }

        /// Dense rate table for a window
        pub async fn get_rates(&self, window: RateWindow) -> Result<RateTable> {
            log::info!(
                "Fetching ECB rates from {} for {} to {}",
                self.url,
                window.start,
                window.end
            );
            let xml = self.fetch_xml().await?;
            rates_from_xml(&xml, window)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gesmes:Envelope xmlns:gesmes="http://www.gesmes.org/xml/2002-08-01" xmlns="http://www.ecb.int/vocabulary/2002-08-01/eurofxref">
  <gesmes:subject>Reference rates</gesmes:subject>
  <Cube>
    <Cube time="2023-01-06">
      <Cube currency="USD" rate="1.0500"/>
      <Cube currency="SEK" rate="11.2535"/>
    </Cube>
    <Cube time="2023-01-02">
      <Cube currency="USD" rate="1.0683"/>
      <Cube currency="SEK" rate="11.1218"/>
    </Cube>
  </Cube>
</gesmes:Envelope>"#;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_feed() {
        let obs = parse_ecb_xml(FEED).unwrap();
        assert_eq!(obs.len(), 4);
        assert_eq!(obs[0].date(), d(2023, 1, 6));
        assert_eq!(obs[0].currency(), "USD");
        assert_eq!(obs[3].date(), d(2023, 1, 2));
        assert_eq!(obs[3].rate(), 11.1218);
    }

    #[test]
    fn test_quote_outside_dated_cube() {
        let xml = r#"<Cube><Cube currency="USD" rate="1.05"/></Cube>"#;
        let err = parse_ecb_xml(xml).unwrap_err();
        assert!(matches!(err, IntrastatError::SchemaError(_)));
    }

    #[test]
    fn test_quote_without_rate() {
        let xml = r#"<Cube><Cube time="2023-01-02"><Cube currency="USD"/></Cube></Cube>"#;
        let err = parse_ecb_xml(xml).unwrap_err();
        assert!(matches!(err, IntrastatError::SchemaError(_)));
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_ecb_xml(r#"<Cube><Cube time="2023-01-02"></Rate></Cube>"#).unwrap_err();
        assert!(matches!(err, IntrastatError::ParseError(_)));
    }

    #[test]
    fn test_feed_without_quotes_yields_nothing() {
        let obs = parse_ecb_xml("<Cube></Cube>").unwrap();
        assert!(obs.is_empty());
    }

    #[test]
    fn test_rates_from_xml_window() {
        let window = RateWindow::resolve(Some(d(2023, 1, 3)), Some(d(2023, 1, 4)), d(2023, 6, 1))
            .unwrap();
        let table = rates_from_xml(FEED, window).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(d(2023, 1, 4), "SEK"), Some(11.1218));
    }

    #[test]
    fn test_window_defaults() {
        let window = RateWindow::resolve(None, None, d(2023, 3, 15)).unwrap();
        assert_eq!(window.end, d(2023, 3, 15));
        assert_eq!(window.start, d(2022, 3, 15));
    }

    #[test]
    fn test_window_inverted() {
        assert!(RateWindow::resolve(Some(d(2023, 2, 1)), Some(d(2023, 1, 1)), d(2023, 6, 1)).is_err());
    }

    #[test]
    fn test_parse_date_arg() {
        assert_eq!(parse_date_arg("2022-01-01").unwrap(), d(2022, 1, 1));
        assert!(matches!(
            parse_date_arg("01/01/2022"),
            Err(IntrastatError::InvalidData(_))
        ));
    }
}
