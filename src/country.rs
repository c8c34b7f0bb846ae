//! Country name and ISO 3166 code translation
//!
//! Intrastat does not follow ISO 3166 everywhere: Great Britain (Northern
//! Ireland protocol) is reported as `XU` and Serbia as `XS`.

use crate::error::{IntrastatError, Result};
use hashbrown::HashMap;
use serde::Deserialize;

pub const COUNTRIES_API_URL: &str =
    "https://restcountries.com/v3.1/all?fields=name,cca2,cca3,continents";

/// One country from the restcountries service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryRecord {
    pub common: String,
    pub official: String,
    pub cca2: String,
    pub cca3: String,
    pub continent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawName {
    common: String,
    official: String,
}

#[derive(Debug, Deserialize)]
struct RawCountry {
    name: RawName,
    cca2: String,
    cca3: String,
    #[serde(default)]
    continents: Vec<String>,
}

/// Parse the restcountries JSON array
pub fn parse_countries(json: &str) -> Result<Vec<CountryRecord>> {
    let raw: Vec<RawCountry> = serde_json::from_str(json).map_err(|e| {
        IntrastatError::SchemaError(format!("Unexpected country list format: {}", e))
    })?;

    Ok(raw
        .into_iter()
        .map(|c| CountryRecord {
            common: c.name.common,
            official: c.name.official,
            cca2: c.cca2.to_uppercase(),
            cca3: c.cca3.to_uppercase(),
            continent: c.continents.into_iter().next(),
        })
        .collect())
}

/// Intrastat reporting code for an ISO alpha-2 code
pub fn intrastat_code(iso2: &str) -> String {
    match iso2.trim().to_uppercase().as_str() {
        "GB" | "UK" => "XU".to_string(),
        "RS" => "XS".to_string(),
        other => other.to_string(),
    }
}

/// Country lookups keyed by name, alpha-2 and alpha-3
#[derive(Debug, Clone, Default)]
pub struct CountryLookup {
    by_name: HashMap<String, String>,
    by_alpha3: HashMap<String, String>,
    alpha2: HashMap<String, String>,
}

impl CountryLookup {
    pub fn from_records(records: &[CountryRecord]) -> Self {
        let mut lookup = Self::default();
        for record in records {
            lookup
                .by_name
                .insert(record.common.to_lowercase(), record.cca2.clone());
            lookup
                .by_alpha3
                .insert(record.cca3.clone(), record.cca2.clone());
            lookup
                .alpha2
                .insert(record.cca2.clone(), record.cca2.clone());
        }
        lookup
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_records(&parse_countries(json)?))
    }

    pub fn len(&self) -> usize {
        self.alpha2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha2.is_empty()
    }

    /// Common English name (case-insensitive) to Intrastat code
    pub fn country_to_iso2(&self, name: &str) -> Option<String> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|iso2| intrastat_code(iso2))
    }

    pub fn alpha3_to_iso2(&self, code: &str) -> Option<String> {
        self.by_alpha3
            .get(&code.trim().to_uppercase())
            .map(|iso2| intrastat_code(iso2))
    }

    /// Validate an alpha-2 code and translate it. `UK` is accepted for `GB`.
    pub fn alpha2_to_iso2(&self, code: &str) -> Option<String> {
        let mut code = code.trim().to_uppercase();
        if code == "UK" {
            code = "GB".to_string();
        }
        self.alpha2.get(&code).map(|iso2| intrastat_code(iso2))
    }
}

#[cfg(feature = "async")]
pub use client::CountriesClient;

#[cfg(feature = "async")]
mod client {
    use super::*;
    use crate::config::HttpSettings;
    use crate::http;
    use reqwest::Client;

    pub struct CountriesClient {
        client: Client,
        url: String,
    }

    impl CountriesClient {
        pub fn new(settings: &HttpSettings, url: impl Into<String>) -> Result<Self> {
            Ok(Self {
                client: http::build_client(settings)?,
                url: url.into(),
            })
        }

        pub async fn fetch_json(&self) -> Result<String> {
            let (status, body) = http::get_text(&self.client, &self.url).await?;
            if status != 200 {
                return Err(IntrastatError::HttpError(format!(
                    "Country service returned status {}",
                    status
                )));
            }
            Ok(body)
        }

        pub async fn fetch_lookup(&self) -> Result<CountryLookup> {
            let lookup = CountryLookup::from_json(&self.fetch_json().await?)?;
            log::info!("Loaded {} countries", lookup.len());
            Ok(lookup)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTRIES: &str = r#"[
        {"name": {"common": "Spain", "official": "Kingdom of Spain"}, "cca2": "ES", "cca3": "ESP", "continents": ["Europe"]},
        {"name": {"common": "United Kingdom", "official": "United Kingdom of Great Britain and Northern Ireland"}, "cca2": "GB", "cca3": "GBR", "continents": ["Europe"]},
        {"name": {"common": "Serbia", "official": "Republic of Serbia"}, "cca2": "RS", "cca3": "SRB", "continents": ["Europe"]},
        {"name": {"common": "Antarctica", "official": "Antarctica"}, "cca2": "AQ", "cca3": "ATA"}
    ]"#;

    #[test]
    fn test_parse_countries() {
        let records = parse_countries(COUNTRIES).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].continent.as_deref(), Some("Europe"));
        assert_eq!(records[3].continent, None);
    }

    #[test]
    fn test_country_to_iso2() {
        let lookup = CountryLookup::from_json(COUNTRIES).unwrap();
        assert_eq!(lookup.country_to_iso2("Spain").as_deref(), Some("ES"));
        assert_eq!(lookup.country_to_iso2("united kingdom").as_deref(), Some("XU"));
        assert_eq!(lookup.country_to_iso2("Atlantis"), None);
    }

    #[test]
    fn test_alpha_codes() {
        let lookup = CountryLookup::from_json(COUNTRIES).unwrap();
        assert_eq!(lookup.alpha3_to_iso2("srb").as_deref(), Some("XS"));
        assert_eq!(lookup.alpha2_to_iso2("UK").as_deref(), Some("XU"));
        assert_eq!(lookup.alpha2_to_iso2("GB").as_deref(), Some("XU"));
        assert_eq!(lookup.alpha2_to_iso2("RS").as_deref(), Some("XS"));
        assert_eq!(lookup.alpha2_to_iso2("es").as_deref(), Some("ES"));
        assert_eq!(lookup.alpha2_to_iso2("ZZ"), None);
    }

    #[test]
    fn test_bad_payload() {
        assert!(matches!(
            parse_countries(r#"{"status": 404}"#),
            Err(IntrastatError::SchemaError(_))
        ));
    }
}
