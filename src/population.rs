//! US population export from the datausa.io API

use crate::error::{IntrastatError, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

pub const POPULATION_API_URL: &str =
    "https://datausa.io/api/data?drilldowns=Nation&measures=Population";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationRecord {
    #[serde(rename = "ID Nation")]
    pub nation_id: String,
    #[serde(rename = "Nation")]
    pub nation: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Population")]
    pub population: u64,
}

fn text_field(item: &Value, name: &str) -> Result<String> {
    match item.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(IntrastatError::SchemaError(format!(
            "Population record has no '{}' field",
            name
        ))),
    }
}

/// Parse the `data` array, most recent year first
pub fn parse_population(json: &str) -> Result<Vec<PopulationRecord>> {
    let doc: Value = serde_json::from_str(json)?;
    let data = doc.get("data").and_then(Value::as_array).ok_or_else(|| {
        IntrastatError::SchemaError("Population response has no data array".to_string())
    })?;

    let mut records = data
        .iter()
        .map(|item| {
            let year = text_field(item, "Year")?;
            let population = text_field(item, "Population")?;
            Ok(PopulationRecord {
                nation_id: text_field(item, "ID Nation")?,
                nation: text_field(item, "Nation")?,
                year: year.parse().map_err(|_| {
                    IntrastatError::SchemaError(format!("Year '{}' is not a number", year))
                })?,
                population: population.parse::<f64>().map(|p| p as u64).map_err(|_| {
                    IntrastatError::SchemaError(format!(
                        "Population '{}' is not a number",
                        population
                    ))
                })?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    records.sort_by(|a, b| b.year.cmp(&a.year));
    Ok(records)
}

pub fn write_population_csv<W: Write>(records: &[PopulationRecord], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(feature = "async")]
pub async fn fetch_population(
    settings: &crate::config::HttpSettings,
    url: &str,
) -> Result<Vec<PopulationRecord>> {
    let client = crate::http::build_client(settings)?;
    let (status, body) = crate::http::get_text(&client, url).await?;
    if status != 200 {
        return Err(IntrastatError::HttpError(format!(
            "The API call failed - the data is unavailable (status {})",
            status
        )));
    }
    parse_population(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{"data": [
        {"ID Nation": "01000US", "Nation": "United States", "ID Year": 2018, "Year": "2018", "Population": 322903030, "Slug Nation": "united-states"},
        {"ID Nation": "01000US", "Nation": "United States", "ID Year": 2020, "Year": "2020", "Population": 326569308, "Slug Nation": "united-states"},
        {"ID Nation": "01000US", "Nation": "United States", "ID Year": 2019, "Year": "2019", "Population": 324697795, "Slug Nation": "united-states"}
    ]}"#;

    #[test]
    fn test_sorted_descending() {
        let records = parse_population(RESPONSE).unwrap();
        let years: Vec<i32> = records.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2020, 2019, 2018]);
        assert_eq!(records[0].population, 326_569_308);
    }

    #[test]
    fn test_csv_drops_slug_and_year_id() {
        let records = parse_population(RESPONSE).unwrap();
        let mut out = Vec::new();
        write_population_csv(&records, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("ID Nation,Nation,Year,Population\n"));
        assert!(!out.contains("united-states"));
    }

    #[test]
    fn test_missing_data() {
        assert!(matches!(
            parse_population(r#"{"source": []}"#),
            Err(IntrastatError::SchemaError(_))
        ));
    }
}
