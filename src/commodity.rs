//! Combined Nomenclature (CN8) commodity codes
//!
//! Two sources are supported: a published lookup table of valid codes
//! (CSV export of the national statistics office spreadsheet) and the UK
//! trade tariff API, which answers per 10-digit commodity.

use crate::error::{IntrastatError, Result};
use crate::table::Table;
use hashbrown::HashSet;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::{Read, Write};

pub const TARIFF_API_URL: &str = "https://www.trade-tariff.service.gov.uk/api/v2/commodities/";

/// Suffixes tried, in order, to turn a CN8 into a 10-digit tariff query.
/// `XX` is never a real commodity and ends the search.
pub const TARIFF_SUFFIXES: [&str; 12] = [
    "00", "10", "20", "30", "40", "50", "60", "70", "80", "90", "99", "XX",
];

pub const CN8_COLUMN: &str = "CN8";

/// Supplementary unit reported for commodities without one
pub const NO_SUPPLEMENTARY_UNIT: &str = "-";

/// Query form of a code: first 8 characters, right-padded with zeros
pub fn normalize_query_code(raw: &str) -> String {
    let code: String = raw.trim().chars().take(8).collect();
    format!("{:0<8}", code)
}

/// Lookup-table form of a code: left-padded with zeros to 8 characters.
/// Spreadsheets store codes as numbers and drop the leading zeros.
pub fn restore_leading_zeros(raw: &str) -> String {
    format!("{:0>8}", raw.trim())
}

/// Distinct query codes in first-seen order
pub fn unique_query_codes<S: AsRef<str>>(codes: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    codes
        .iter()
        .map(|c| normalize_query_code(c.as_ref()))
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Result of matching a code against the lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CodeStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

impl fmt::Display for CodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodeStatus::Ok => write!(f, "OK"),
            CodeStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Official list of valid CN8 codes
#[derive(Debug, Clone)]
pub struct CommodityCodeTable {
    table: Table,
    codes: HashSet<String>,
}

impl CommodityCodeTable {
    /// Take the first column as the code column, rename it `CN8` and restore
    /// its leading zeros. Other columns are kept as they are.
    pub fn from_table(mut table: Table) -> Result<Self> {
        let first = table.headers.first_mut().ok_or_else(|| {
            IntrastatError::SchemaError("Commodity code table has no columns".to_string())
        })?;
        *first = CN8_COLUMN.to_string();

        for row in table.rows.iter_mut() {
            if let Some(code) = row.first_mut() {
                *code = restore_leading_zeros(code);
            }
        }

        let codes = table
            .rows
            .iter()
            .filter_map(|row| row.first().cloned())
            .collect();

        Ok(Self { table, codes })
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        Self::from_table(Table::read_csv(reader, b',')?)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        self.table.write_csv(writer)
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(&restore_leading_zeros(code))
    }

    pub fn check(&self, code: &str) -> CodeStatus {
        if self.contains(code) {
            CodeStatus::Ok
        } else {
            CodeStatus::Error
        }
    }
}

/// Outcome of a tariff API lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommodityCheck {
    #[serde(rename = "CN8")]
    pub cn8: String,
    #[serde(rename = "Response Code")]
    pub status_code: u16,
    #[serde(rename = "Valid")]
    pub valid: bool,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "SU")]
    pub supplementary_unit: Option<String>,
}

/// Extract the description and supplementary unit from a tariff API document
pub fn parse_commodity_response(json: &Value) -> Result<(String, String)> {
    let description = json
        .pointer("/data/attributes/formatted_description")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            IntrastatError::SchemaError(
                "Tariff response has no data.attributes.formatted_description".to_string(),
            )
        })?
        .to_string();

    let included = json
        .get("included")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            IntrastatError::SchemaError("Tariff response has no included section".to_string())
        })?;

    let unit = included
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("duty_expression"))
        .filter_map(|item| item.get("attributes"))
        .filter(|attrs| {
            !attrs
                .get("formatted_base")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .contains("span")
        })
        .filter_map(|attrs| attrs.get("base").and_then(Value::as_str))
        .find(|base| !base.is_empty())
        .unwrap_or(NO_SUPPLEMENTARY_UNIT)
        .to_string();

    Ok((description, unit))
}

/// Interpret the final tariff API response for a code
pub fn commodity_check_from_response(cn8: &str, status: u16, body: &str) -> Result<CommodityCheck> {
    let (valid, description, supplementary_unit) = match status {
        200 => {
            let json: Value = serde_json::from_str(body)?;
            let (description, unit) = parse_commodity_response(&json)?;
            (true, description, Some(unit))
        }
        404 => (
            false,
            "Invalid commodity code - no description".to_string(),
            None,
        ),
        _ => (false, "Unexpected request error".to_string(), None),
    };

    Ok(CommodityCheck {
        cn8: cn8.to_string(),
        status_code: status,
        valid,
        description,
        supplementary_unit,
    })
}

/// URL of one tariff query
pub fn tariff_url(base: &str, cn8: &str, suffix: &str) -> String {
    format!("{}/{}{}", base.trim_end_matches('/'), cn8, suffix)
}

pub fn write_checks_csv<W: Write>(checks: &[CommodityCheck], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for check in checks {
        writer.serialize(check)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(feature = "async")]
pub use client::TariffClient;

#[cfg(feature = "async")]
mod client {
    use super::*;
    use crate::config::HttpSettings;
    use crate::http;
    use reqwest::Client;

    /// Trade tariff API client
    pub struct TariffClient {
        client: Client,
        base_url: String,
    }

    impl TariffClient {
        pub fn new(settings: &HttpSettings, base_url: impl Into<String>) -> Result<Self> {
            Ok(Self {
                client: http::build_client(settings)?,
                base_url: base_url.into(),
            })
        }

        /// Look up one code, trying suffixes until the API knows the commodity
        pub async fn lookup(&self, code: &str) -> Result<CommodityCheck> {
            let cn8 = normalize_query_code(code);
            let mut last = None;

            for suffix in TARIFF_SUFFIXES {
                let url = tariff_url(&self.base_url, &cn8, suffix);
                let (status, body) = http::get_text(&self.client, &url).await?;
                if status == 200 {
                    return commodity_check_from_response(&cn8, status, &body);
                }
                last = Some((status, body));
            }

            let (status, body) = last.ok_or_else(|| {
                IntrastatError::MissingDataError(format!("No tariff query sent for {}", cn8))
            })?;
            log::warn!("Commodity code {} not found (status {})", cn8, status);
            commodity_check_from_response(&cn8, status, &body)
        }

        /// Check each distinct code once. `on_progress` gets `(done, total)`
        /// after every lookup.
        pub async fn check_codes<S, F>(
            &self,
            codes: &[S],
            mut on_progress: F,
        ) -> Result<Vec<CommodityCheck>>
        where
            S: AsRef<str>,
            F: FnMut(usize, usize),
        {
            let unique = unique_query_codes(codes);
            let mut checks = Vec::with_capacity(unique.len());
            for code in &unique {
                checks.push(self.lookup(code).await?);
                on_progress(checks.len(), unique.len());
            }
            Ok(checks)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_query_code() {
        assert_eq!(normalize_query_code("46012110"), "46012110");
        assert_eq!(normalize_query_code("4601211099"), "46012110");
        assert_eq!(normalize_query_code("460121"), "46012100");
    }

    #[test]
    fn test_restore_leading_zeros() {
        assert_eq!(restore_leading_zeros("1022910"), "01022910");
        assert_eq!(restore_leading_zeros("22021000"), "22021000");
    }

    #[test]
    fn test_unique_query_codes() {
        let codes = unique_query_codes(&["46012110", "46012110", "61041990", "4601211000"]);
        assert_eq!(codes, vec!["46012110", "61041990"]);
    }

    #[test]
    fn test_lookup_table() {
        let csv = "Code,Description\n1022910,Live cattle\n22021000,Waters\n";
        let table = CommodityCodeTable::read_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.table().headers[0], "CN8");
        assert_eq!(table.len(), 2);
        assert_eq!(table.check("01022910"), CodeStatus::Ok);
        assert_eq!(table.check("1022910"), CodeStatus::Ok);
        assert_eq!(table.check("99999999"), CodeStatus::Error);

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("CN8,Description\n01022910,Live cattle\n"));
    }

    #[test]
    fn test_parse_response_with_unit() {
        let doc = json!({
            "data": {"attributes": {"formatted_description": "Cattle"}},
            "included": [
                {"type": "measure", "attributes": {}},
                {"type": "duty_expression", "attributes": {"base": "", "formatted_base": "0.00 %"}},
                {"type": "duty_expression", "attributes": {"base": "80 GBP / 100 kg", "formatted_base": "<span>80</span>"}},
                {"type": "duty_expression", "attributes": {"base": "p/st", "formatted_base": "p/st"}}
            ]
        });
        let (description, unit) = parse_commodity_response(&doc).unwrap();
        assert_eq!(description, "Cattle");
        assert_eq!(unit, "p/st");
    }

    #[test]
    fn test_parse_response_without_unit() {
        let doc = json!({
            "data": {"attributes": {"formatted_description": "Waters"}},
            "included": []
        });
        let (_, unit) = parse_commodity_response(&doc).unwrap();
        assert_eq!(unit, NO_SUPPLEMENTARY_UNIT);
    }

    #[test]
    fn test_parse_response_missing_description() {
        let err = parse_commodity_response(&json!({"data": {}})).unwrap_err();
        assert!(matches!(err, IntrastatError::SchemaError(_)));
    }

    #[test]
    fn test_check_from_status() {
        let missing = commodity_check_from_response("99999999", 404, "").unwrap();
        assert!(!missing.valid);
        assert_eq!(missing.description, "Invalid commodity code - no description");
        assert_eq!(missing.supplementary_unit, None);

        let broken = commodity_check_from_response("99999999", 500, "").unwrap();
        assert_eq!(broken.description, "Unexpected request error");
    }

    #[test]
    fn test_tariff_url() {
        assert_eq!(
            tariff_url(TARIFF_API_URL, "46012110", "00"),
            "https://www.trade-tariff.service.gov.uk/api/v2/commodities/4601211000"
        );
        assert_eq!(
            tariff_url("http://localhost/commodities", "46012110", "XX"),
            "http://localhost/commodities/46012110XX"
        );
    }
}
