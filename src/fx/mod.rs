//! Foreign exchange reference rates
//!
//! # Components
//!
//! - **observation**: typed `(date, currency, rate)` quotes and CSV input
//! - **dense**: calendar-dense, forward-filled rate table
//! - **ecb**: ECB XML feed parsing, rate windows and the feed client
//!
//! # Example
//!
//! ```rust
//! use rusty_intrastat::fx::{build_dense_table, RateObservation};
//!
//! let table = build_dense_table(&[
//!     RateObservation::parse("2022-12-30", "EUR", "1.00").unwrap(),
//!     RateObservation::parse("2023-01-06", "EUR", "1.00").unwrap(),
//! ])
//! .unwrap();
//!
//! assert_eq!(table.len(), 8);
//! ```

pub mod dense;
pub mod ecb;
pub mod observation;

pub use dense::{build_dense_table, format_rate, RateRow, RateTable};
#[cfg(feature = "async")]
pub use ecb::EcbClient;
pub use ecb::{parse_date_arg, parse_ecb_xml, rates_from_xml, RateWindow};
pub use observation::{read_observations_csv, RateObservation, DATE_COLUMN};
