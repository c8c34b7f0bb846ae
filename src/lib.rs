//! # rusty_intrastat
//!
//! Data preparation for Intrastat trade declarations.
//!
//! The centre of the crate is the calendar-dense FX rate table: a sparse
//! list of ECB reference quotes becomes one row per calendar day with
//! weekend and holiday gaps forward-filled, ready to be joined against
//! shipping dates. Around it sit small pipelines for commodity codes,
//! VIES VAT checks, EU VAT rates, country codes, transport modes, bucket
//! ETL and the declaration itself.
//!
//! ## Example
//!
//! ```rust
//! use rusty_intrastat::prelude::*;
//! use chrono::NaiveDate;
//!
//! let table = build_dense_table(&[
//!     RateObservation::parse("2023-01-01", "SEK", "11.00").unwrap(),
//!     RateObservation::parse("2023-01-03", "SEK", "12.00").unwrap(),
//! ])
//! .unwrap();
//!
//! let monday = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
//! assert_eq!(table.get(monday, "SEK"), Some(11.0));
//! ```

pub mod commodity;
pub mod config;
pub mod country;
pub mod declaration;
pub mod error;
pub mod fx;
#[cfg(feature = "async")]
pub mod http;
pub mod population;
pub mod storage;
pub mod table;
pub mod transport;
pub mod vatr;
pub mod vies;

pub mod prelude {
    //! Commonly used types and functions
    pub use crate::commodity::{normalize_query_code, CodeStatus, CommodityCodeTable};
    pub use crate::config::{AppConfig, DeclarationSettings, HttpSettings};
    pub use crate::country::CountryLookup;
    pub use crate::declaration::{build_declaration, DeclarationLine, Shipment};
    pub use crate::error::{IntrastatError, Result};
    pub use crate::fx::{build_dense_table, RateObservation, RateTable, RateWindow};
    pub use crate::transport::ModeOfTransport;
    pub use crate::vies::VatId;
}
