//! VAT number validation through the EU VIES service

use crate::error::{IntrastatError, Result};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

pub const VIES_API_URL: &str = "https://ec.europa.eu/taxation_customs/vies/rest-api/ms/";

/// Partner VAT reported for business-to-consumer transactions
pub const B2C_VAT_PLACEHOLDER: &str = "QV999999999999";

/// VAT identifier split into member-state prefix and number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VatId {
    country: String,
    number: String,
}

impl VatId {
    /// Parse `ATU25700701`-style identifiers. Whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        if compact.len() < 3 || !compact.is_ascii() {
            return Err(IntrastatError::InvalidData(format!(
                "VAT number '{}' is too short or not ASCII",
                raw
            )));
        }

        let (country, number) = compact.split_at(2);
        if !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(IntrastatError::InvalidData(format!(
                "VAT number '{}' does not start with a country prefix",
                raw
            )));
        }

        Ok(Self {
            country: country.to_string(),
            number: number.to_string(),
        })
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    /// Endpoint for this identifier under a VIES base URL
    pub fn url(&self, base: &str) -> String {
        format!(
            "{}/{}/vat/{}",
            base.trim_end_matches('/'),
            self.country,
            self.number
        )
    }
}

impl fmt::Display for VatId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.country, self.number)
    }
}

/// Body returned by the VIES REST API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViesResponse {
    pub is_valid: Option<bool>,
    pub request_date: Option<String>,
    pub vat_number: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// One row of the VAT check report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VatCheck {
    #[serde(rename = "Vat Number")]
    pub vat_number: String,
    #[serde(rename = "Response Code")]
    pub status_code: u16,
    #[serde(rename = "Valid")]
    pub valid: bool,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Company")]
    pub company: Option<String>,
    #[serde(rename = "Address")]
    pub address: Option<String>,
    #[serde(rename = "Request Date")]
    pub request_date: Option<String>,
}

impl VatCheck {
    pub fn from_response(id: &VatId, status: u16, response: ViesResponse) -> Self {
        let valid = status == 200 && response.is_valid == Some(true);
        let description = match (status, response.is_valid) {
            (200, Some(true)) => "OK - Valid VAT number",
            (200, Some(false)) => "Warning - invalid VAT number",
            _ => "Error - unexpected request issue.",
        };

        Self {
            vat_number: response
                .vat_number
                .unwrap_or_else(|| id.number().to_string()),
            status_code: status,
            valid,
            description: description.to_string(),
            company: response.name,
            address: response.address,
            request_date: response
                .request_date
                .map(|d| d.chars().take(10).collect()),
        }
    }

    /// Interpret a raw response body. Non-JSON bodies count as a failed request.
    pub fn from_body(id: &VatId, status: u16, body: &str) -> Self {
        let response = match serde_json::from_str::<ViesResponse>(body) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Unreadable VIES response for {}: {}", id, e);
                ViesResponse::default()
            }
        };
        Self::from_response(id, status, response)
    }
}

/// Distinct identifiers in first-seen order
pub fn unique_vat_ids<S: AsRef<str>>(raw: &[S]) -> Result<Vec<VatId>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for value in raw {
        let id = VatId::parse(value.as_ref())?;
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub fn write_checks_csv<W: Write>(checks: &[VatCheck], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for check in checks {
        writer.serialize(check)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(feature = "async")]
pub use client::ViesClient;

#[cfg(feature = "async")]
mod client {
    use super::*;
    use crate::config::HttpSettings;
    use crate::http;
    use reqwest::Client;

    pub struct ViesClient {
        client: Client,
        base_url: String,
    }

    impl ViesClient {
        pub fn new(settings: &HttpSettings, base_url: impl Into<String>) -> Result<Self> {
            Ok(Self {
                client: http::build_client(settings)?,
                base_url: base_url.into(),
            })
        }

        pub async fn check(&self, id: &VatId) -> Result<VatCheck> {
            let (status, body) = http::get_text(&self.client, &id.url(&self.base_url)).await?;
            Ok(VatCheck::from_body(id, status, &body))
        }

        /// Check each distinct identifier once. `on_progress` gets
        /// `(done, total)` after every request.
        pub async fn check_all<S, F>(&self, raw: &[S], mut on_progress: F) -> Result<Vec<VatCheck>>
        where
            S: AsRef<str>,
            F: FnMut(usize, usize),
        {
            let ids = unique_vat_ids(raw)?;
            let mut checks = Vec::with_capacity(ids.len());
            for id in &ids {
                checks.push(self.check(id).await?);
                on_progress(checks.len(), ids.len());
            }
            Ok(checks)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vat_id() {
        let id = VatId::parse("ATU25700701").unwrap();
        assert_eq!(id.country(), "AT");
        assert_eq!(id.number(), "U25700701");
        assert_eq!(id.to_string(), "ATU25700701");

        let spaced = VatId::parse(" sk 2020229618 ").unwrap();
        assert_eq!(spaced.country(), "SK");
        assert_eq!(spaced.number(), "2020229618");
    }

    #[test]
    fn test_parse_invalid_vat_id() {
        assert!(matches!(VatId::parse("AT"), Err(IntrastatError::InvalidData(_))));
        assert!(matches!(VatId::parse("12345678"), Err(IntrastatError::InvalidData(_))));
    }

    #[test]
    fn test_url() {
        let id = VatId::parse("FI15601431").unwrap();
        assert_eq!(
            id.url(VIES_API_URL),
            "https://ec.europa.eu/taxation_customs/vies/rest-api/ms/FI/vat/15601431"
        );
    }

    #[test]
    fn test_valid_response() {
        let id = VatId::parse("ATU25700701").unwrap();
        let body = r#"{"isValid":true,"requestDate":"2023-01-10T09:12:44.123Z","userError":"VALID","name":"ACME GMBH","address":"WIEN","vatNumber":"U25700701"}"#;
        let check = VatCheck::from_body(&id, 200, body);
        assert!(check.valid);
        assert_eq!(check.description, "OK - Valid VAT number");
        assert_eq!(check.request_date.as_deref(), Some("2023-01-10"));
        assert_eq!(check.company.as_deref(), Some("ACME GMBH"));
    }

    #[test]
    fn test_invalid_response() {
        let id = VatId::parse("PL52200000XX").unwrap();
        let check = VatCheck::from_body(&id, 200, r#"{"isValid":false,"vatNumber":"52200000XX"}"#);
        assert!(!check.valid);
        assert_eq!(check.description, "Warning - invalid VAT number");
    }

    #[test]
    fn test_failed_request() {
        let id = VatId::parse("QV999999999999").unwrap();
        let check = VatCheck::from_body(&id, 500, "<html>down</html>");
        assert!(!check.valid);
        assert_eq!(check.description, "Error - unexpected request issue.");
        assert_eq!(check.vat_number, "999999999999");
    }

    #[test]
    fn test_unique_ids() {
        let ids = unique_vat_ids(&["ATU25700701", "ATU25700701", "FI15601431"]).unwrap();
        assert_eq!(ids.len(), 2);
    }
}
